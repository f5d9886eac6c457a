use std::fmt;

use anyhow::Result;
use log::{info, warn};

use crate::config::{MarkerConfig, PolygonConfig};
use crate::corners::extract_all_markers;
use crate::intersection_polygon::{build_intersection_polygons, PolygonOutcome};
use crate::network::RoadNetwork;
use crate::store::Datastore;

/// What happened to each unit of work in one offline pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub processed: usize,
    /// Processed, but with a partial result
    pub degraded: usize,
    pub skipped: usize,
    /// (unit, error message)
    pub failed: Vec<(String, String)>,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} processed ({} degraded), {} skipped, {} failed",
            self.processed,
            self.degraded,
            self.skipped,
            self.failed.len()
        )
    }
}

/// Extract corner and side-center markers for every road footprint in the store and save them.
/// Roads without a footprint, or with too few vertices, are skipped.
pub fn run_marker_pass<S: Datastore + ?Sized>(
    store: &mut S,
    cfg: &MarkerConfig,
) -> Result<BatchSummary> {
    let network = RoadNetwork::load(&*store)?;
    info!("Extracting markers from {} roads", network.roads.len());

    let results = extract_all_markers(&network, cfg);
    let mut summary = BatchSummary {
        skipped: network.roads.len() - results.len(),
        ..Default::default()
    };
    for (id, mut markers) in results {
        if markers.is_degraded() {
            summary.degraded += 1;
        }
        network.projection.to_wgs84_in_place(&mut markers);
        match store.save_markers(&markers) {
            Ok(()) => summary.processed += 1,
            Err(err) => {
                warn!("Couldn't save markers for road {}: {err:#}", id.0);
                summary.failed.push((format!("road {}", id.0), format!("{err:#}")));
            }
        }
    }

    info!("Marker pass: {summary}");
    Ok(summary)
}

/// Build and save the polygon of every intersection in the store.
pub fn run_polygon_pass<S: Datastore + ?Sized>(
    store: &mut S,
    cfg: &PolygonConfig,
) -> Result<BatchSummary> {
    let network = RoadNetwork::load(&*store)?;
    info!("Building polygons for {} intersections", network.intersections.len());

    let mut summary = BatchSummary::default();
    for (id, outcome) in build_intersection_polygons(&network, cfg) {
        match outcome {
            PolygonOutcome::Built(mut polygon) => {
                network.projection.to_wgs84_in_place(&mut polygon);
                match store.save_intersection_polygon(&polygon) {
                    Ok(()) => summary.processed += 1,
                    Err(err) => {
                        warn!("Couldn't save polygon for {}: {err:#}", polygon.name);
                        summary
                            .failed
                            .push((format!("intersection {}", id.0), format!("{err:#}")));
                    }
                }
            }
            PolygonOutcome::Rejected(_) => summary.skipped += 1,
        }
    }

    info!("Polygon pass: {summary}");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::corners::{RoadMarkers, SideCenterMarker};
    use crate::intersection_polygon::IntersectionPolygon;
    use crate::network::{Intersection, IntersectionID, Location, Road, RoadGeometry, RoadID};
    use crate::planner::{PlanOutcome, TurnPath, TurnPlanner, TurnRequest, TurnStatus};
    use crate::projection::{reproject_geometry, Projection};
    use crate::store::{MarkerID, MemoryStore};
    use crate::vehicle::{VehicleProfile, VehicleProfiles};
    use anyhow::bail;
    use geo::{coord, line_string, point, polygon, Area, Coord, LineString, Polygon};

    // Somewhere in the Pilbara
    const ZONE: Projection = Projection::Utm {
        zone: 50,
        north: false,
    };
    const ORIGIN: Coord = Coord {
        x: 500_000.0,
        y: 7_400_000.0,
    };

    fn to_lonlat(pt: Coord) -> Coord {
        ZONE.to_wgs84(pt + ORIGIN)
    }

    // Two footprint roads butting up against a 40m square junction, one from the south and one
    // from the east
    fn junction_store(geographic: bool) -> MemoryStore {
        let frame = |mut polygon: Polygon| {
            if geographic {
                reproject_geometry(&mut polygon, &to_lonlat);
            }
            polygon
        };
        let mut store = MemoryStore::new(geographic);
        store.insert_road(Road::new(
            RoadID(1),
            RoadGeometry::Footprint(frame(
                polygon![(x: 14., y: -60.), (x: 26., y: -60.), (x: 26., y: 0.), (x: 14., y: 0.)],
            )),
        ));
        store.insert_road(Road::new(
            RoadID(2),
            RoadGeometry::Footprint(frame(
                polygon![(x: 40., y: 14.), (x: 100., y: 14.), (x: 100., y: 26.), (x: 40., y: 26.)],
            )),
        ));
        store.insert_intersection(
            Intersection::from_placeholder(
                IntersectionID(1),
                "ore pass junction".to_string(),
                frame(polygon![(x: 0., y: 0.), (x: 40., y: 0.), (x: 40., y: 40.), (x: 0., y: 40.)]),
            )
            .unwrap(),
        );
        store
    }

    fn crossing(store: &mut MemoryStore, id: usize, name: &str, center: Coord) {
        for (road, ls) in [
            (
                2 * id - 1,
                line_string![(x: center.x - 100., y: center.y), (x: center.x + 100., y: center.y)],
            ),
            (
                2 * id,
                line_string![(x: center.x, y: center.y - 100.), (x: center.x, y: center.y + 100.)],
            ),
        ] {
            let mut road = Road::new(RoadID(road), RoadGeometry::Centerline(ls));
            road.width = Some(10.0);
            store.insert_road(road);
        }
        store.insert_intersection(Intersection {
            id: IntersectionID(id),
            name: name.to_string(),
            center: point!(x: center.x + 1., y: center.y - 1.),
            connected_roads: Vec::new(),
            geometry: None,
        });
    }

    // Refuses to save anything for one road or one intersection
    struct FlakyStore {
        inner: MemoryStore,
        bad_road: RoadID,
        bad_intersection: IntersectionID,
    }

    impl Datastore for FlakyStore {
        fn is_geographic(&self) -> bool {
            self.inner.is_geographic()
        }
        fn roads(&self) -> Result<Vec<Road>> {
            self.inner.roads()
        }
        fn intersections(&self) -> Result<Vec<Intersection>> {
            self.inner.intersections()
        }
        fn locations(&self) -> Result<Vec<Location>> {
            self.inner.locations()
        }
        fn side_centers(&self, road: RoadID) -> Result<Vec<(MarkerID, SideCenterMarker)>> {
            self.inner.side_centers(road)
        }
        fn save_markers(&mut self, markers: &RoadMarkers) -> Result<()> {
            if markers.road == self.bad_road {
                bail!("disk full");
            }
            self.inner.save_markers(markers)
        }
        fn save_intersection_polygon(&mut self, polygon: &IntersectionPolygon) -> Result<()> {
            if polygon.intersection == self.bad_intersection {
                bail!("disk full");
            }
            self.inner.save_intersection_polygon(polygon)
        }
        fn upsert_turn_path(&mut self, path: &TurnPath) -> Result<()> {
            self.inner.upsert_turn_path(path)
        }
    }

    #[test]
    fn test_polygon_pass() {
        let mut store = MemoryStore::new(false);
        crossing(&mut store, 1, "crossing", coord! { x: 0., y: 0. });
        store.insert_intersection(Intersection {
            id: IntersectionID(2),
            name: "far away".to_string(),
            center: point!(x: 900., y: 900.),
            connected_roads: Vec::new(),
            geometry: None,
        });

        let summary = run_polygon_pass(&mut store, &PolygonConfig::default()).unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                processed: 1,
                degraded: 0,
                skipped: 1,
                failed: Vec::new(),
            }
        );
        let crossing = store.intersection_by_name("crossing").unwrap().unwrap();
        let area = crossing.geometry.unwrap().unsigned_area();
        assert!(area > 1200.0 && area < 1500.0, "{area}");
        assert_eq!(
            store
                .intersection_polygon(IntersectionID(1))
                .unwrap()
                .branches
                .len(),
            4
        );
    }

    #[test]
    fn test_failures_dont_stop_the_pass() {
        let mut inner = junction_store(false);
        crossing(&mut inner, 5, "north crossing", coord! { x: 0., y: 500. });
        crossing(&mut inner, 6, "south crossing", coord! { x: 0., y: -500. });
        let mut store = FlakyStore {
            inner,
            bad_road: RoadID(2),
            bad_intersection: IntersectionID(5),
        };

        let summary = run_marker_pass(&mut store, &MarkerConfig::default()).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(
            summary.failed,
            vec![("road 2".to_string(), "disk full".to_string())]
        );
        assert!(store.inner.markers(RoadID(1)).is_some());
        assert!(store.inner.markers(RoadID(2)).is_none());

        let summary = run_polygon_pass(&mut store, &PolygonConfig::default()).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(
            summary.failed,
            vec![("intersection 5".to_string(), "disk full".to_string())]
        );
        assert!(store.inner.intersection_polygon(IntersectionID(6)).is_some());
        assert!(store.inner.intersection_polygon(IntersectionID(5)).is_none());
    }

    // The whole pipeline on lon/lat input: markers, then a turn through the placeholder polygon
    #[test]
    fn test_geographic_pipeline() {
        let mut store = junction_store(true);

        let summary = run_marker_pass(&mut store, &MarkerConfig::default()).unwrap();
        assert_eq!(summary.processed, 2);
        // Only two corners of each road are near the junction
        assert_eq!(summary.degraded, 2);
        assert!(summary.failed.is_empty());

        // Footprints aren't centerlines, so there's nothing to build a polygon from
        let summary = run_polygon_pass(&mut store, &PolygonConfig::default()).unwrap();
        assert_eq!(summary.skipped, 1);

        let vehicles: VehicleProfiles = vec![VehicleProfile {
            class: "haul truck".to_string(),
            width_m: 6.0,
            min_turning_radius_m: 12.0,
            lateral_buffer_m: 1.0,
        }]
        .into_iter()
        .collect();
        let cfg = PlannerConfig::default();
        let req = TurnRequest {
            from_road: RoadID(1),
            to_road: RoadID(2),
            intersection: "ore pass junction".to_string(),
            vehicle_class: "haul truck".to_string(),
            from_marker: None,
            to_marker: None,
        };
        let outcome = TurnPlanner::new(&vehicles, &cfg)
            .plan_and_store(&mut store, &req)
            .unwrap();
        let PlanOutcome::Planned(path) = outcome else {
            panic!("{outcome:?}");
        };
        assert_eq!(path.status, TurnStatus::Ok);

        // The result comes back in lon/lat, starting and ending on the markers
        let samples: &LineString = &path.curve.samples;
        for (actual, expected) in [
            (samples.0[0], to_lonlat(coord! { x: 20., y: 0. })),
            (samples.0[samples.0.len() - 1], to_lonlat(coord! { x: 40., y: 20. })),
        ] {
            assert!((actual.x - expected.x).abs() < 1e-7, "{actual:?} vs {expected:?}");
            assert!((actual.y - expected.y).abs() < 1e-7, "{actual:?} vs {expected:?}");
        }
        assert!(store.outputs_to_geojson().unwrap().contains("\"turn_path\""));
    }
}
