use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use geo::Geometry;
use geojson::{Feature, FeatureCollection, GeoJson, JsonValue};
use log::{info, warn};

use crate::corners::{MarkerQuality, RoadMarkers, SideCenterMarker, SideCenterSource, SideRole};
use crate::intersection_polygon::IntersectionPolygon;
use crate::network::{
    Intersection, IntersectionID, Location, LocationID, Road, RoadGeometry, RoadID,
};
use crate::planner::TurnPath;

/// Assigned by the datastore to each persisted side-center marker
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct MarkerID(pub usize);

/// Where roads, intersections, and locations come from, and where computed geometry goes. All
/// geometry crossing this boundary is in the store's own frame, which is lon/lat when
/// `is_geographic` is true.
pub trait Datastore {
    fn is_geographic(&self) -> bool;

    fn roads(&self) -> Result<Vec<Road>>;
    fn intersections(&self) -> Result<Vec<Intersection>>;
    fn locations(&self) -> Result<Vec<Location>>;

    /// Every side-center marker previously saved for a road
    fn side_centers(&self, road: RoadID) -> Result<Vec<(MarkerID, SideCenterMarker)>>;

    fn intersection_by_name(&self, name: &str) -> Result<Option<Intersection>> {
        Ok(self.intersections()?.into_iter().find(|i| i.name == name))
    }

    /// Replaces any markers previously saved for the same road.
    fn save_markers(&mut self, markers: &RoadMarkers) -> Result<()>;
    /// Overwrites the intersection's geometry with the computed polygon.
    fn save_intersection_polygon(&mut self, polygon: &IntersectionPolygon) -> Result<()>;
    /// Keyed by (from road, to road, intersection name)
    fn upsert_turn_path(&mut self, path: &TurnPath) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    geographic: bool,
    roads: BTreeMap<RoadID, Road>,
    intersections: BTreeMap<IntersectionID, Intersection>,
    locations: BTreeMap<LocationID, Location>,

    markers: BTreeMap<RoadID, RoadMarkers>,
    side_centers: BTreeMap<MarkerID, SideCenterMarker>,
    next_marker: usize,
    polygons: BTreeMap<IntersectionID, IntersectionPolygon>,
    turn_paths: BTreeMap<(RoadID, RoadID, String), TurnPath>,
}

impl MemoryStore {
    pub fn new(geographic: bool) -> Self {
        Self {
            geographic,
            ..Default::default()
        }
    }

    pub fn insert_road(&mut self, road: Road) {
        self.roads.insert(road.id, road);
    }

    pub fn insert_intersection(&mut self, intersection: Intersection) {
        self.intersections.insert(intersection.id, intersection);
    }

    pub fn insert_location(&mut self, location: Location) {
        self.locations.insert(location.id, location);
    }

    pub fn markers(&self, road: RoadID) -> Option<&RoadMarkers> {
        self.markers.get(&road)
    }

    pub fn intersection_polygon(&self, id: IntersectionID) -> Option<&IntersectionPolygon> {
        self.polygons.get(&id)
    }

    pub fn turn_path(&self, from: RoadID, to: RoadID, intersection: &str) -> Option<&TurnPath> {
        self.turn_paths.get(&(from, to, intersection.to_string()))
    }

    pub fn turn_paths(&self) -> impl Iterator<Item = &TurnPath> {
        self.turn_paths.values()
    }

    /// Load a FeatureCollection where each feature has a `kind` property of `road`,
    /// `intersection`, or `location`. Features may also carry `id`, `name`, `width`, `length`,
    /// `from`, `to`, and (for intersections) `connected_roads`. Anything else is ignored.
    /// A feature without an `id` uses its position in the collection. Ids must be unique per kind.
    pub fn from_geojson(input: &str, geographic: bool) -> Result<Self> {
        let GeoJson::FeatureCollection(collection) = input.parse::<GeoJson>()? else {
            bail!("expected a FeatureCollection");
        };
        let mut store = Self::new(geographic);

        for (idx, mut feature) in collection.features.into_iter().enumerate() {
            let kind = feature
                .property("kind")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();
            let id = feature
                .property("id")
                .and_then(JsonValue::as_u64)
                .map(|id| id as usize)
                .unwrap_or(idx);
            let name = string_property(&feature, "name");

            let Some(geometry) = feature.geometry.take() else {
                bail!("feature {idx} has no geometry");
            };
            let geometry = Geometry::<f64>::try_from(geometry.value)
                .with_context(|| format!("feature {idx} has unsupported geometry"))?;

            match kind.as_str() {
                "road" => {
                    let geometry = match geometry {
                        Geometry::LineString(ls) => RoadGeometry::Centerline(ls),
                        Geometry::Polygon(poly) => RoadGeometry::Footprint(poly),
                        _ => bail!("road {id} must be a LineString or Polygon"),
                    };
                    if store.roads.contains_key(&RoadID(id)) {
                        bail!("feature {idx} reuses road id {id}");
                    }
                    let mut road = Road::new(RoadID(id), geometry);
                    road.name = name;
                    road.width = feature.property("width").and_then(JsonValue::as_f64);
                    road.declared_length = feature.property("length").and_then(JsonValue::as_f64);
                    road.from_location = string_property(&feature, "from");
                    road.to_location = string_property(&feature, "to");
                    store.insert_road(road);
                }
                "intersection" => {
                    if store.intersections.contains_key(&IntersectionID(id)) {
                        bail!("feature {idx} reuses intersection id {id}");
                    }
                    let name = name.unwrap_or_else(|| format!("intersection {id}"));
                    let mut intersection = match geometry {
                        Geometry::Point(center) => Intersection {
                            id: IntersectionID(id),
                            name,
                            center,
                            connected_roads: Vec::new(),
                            geometry: None,
                        },
                        Geometry::Polygon(poly) => {
                            Intersection::from_placeholder(IntersectionID(id), name, poly)
                                .with_context(|| format!("intersection {id} has an empty polygon"))?
                        }
                        _ => bail!("intersection {id} must be a Point or Polygon"),
                    };
                    if let Some(roads) = feature
                        .property("connected_roads")
                        .and_then(JsonValue::as_array)
                    {
                        intersection.connected_roads = roads
                            .iter()
                            .filter_map(JsonValue::as_u64)
                            .map(|r| RoadID(r as usize))
                            .collect();
                    }
                    store.insert_intersection(intersection);
                }
                "location" => {
                    if store.locations.contains_key(&LocationID(id)) {
                        bail!("feature {idx} reuses location id {id}");
                    }
                    store.insert_location(Location {
                        id: LocationID(id),
                        name: name.unwrap_or_else(|| format!("location {id}")),
                        geometry,
                    });
                }
                _ => warn!("Ignoring feature {idx} with kind {kind:?}"),
            }
        }

        info!(
            "Read {} roads, {} intersections, {} locations from GeoJSON",
            store.roads.len(),
            store.intersections.len(),
            store.locations.len()
        );
        Ok(store)
    }

    /// Everything computed so far, as a FeatureCollection with a `kind` property per feature
    pub fn outputs_to_geojson(&self) -> Result<String> {
        let mut features = Vec::new();

        for markers in self.markers.values() {
            let quality = quality_name(&markers.quality);
            for corner in &markers.corners {
                let mut f = feature(Geometry::Point(corner.position.into()), "corner");
                f.set_property("road", corner.road.0);
                f.set_property("ring_index", corner.ring_index);
                f.set_property("angle", corner.angle_degrees);
                f.set_property("angle_diff", corner.angle_diff);
                f.set_property("proximity", corner.proximity_m);
                if let Some(ref entity) = corner.nearest_entity {
                    f.set_property("nearest", entity.name());
                }
                f.set_property("quality", quality);
                features.push(f);
            }
        }

        for (id, side) in &self.side_centers {
            let mut f = feature(Geometry::Point(side.position.into()), "side_center");
            f.set_property("marker_id", id.0);
            f.set_property("road", side.road.0);
            f.set_property(
                "role",
                match side.role {
                    SideRole::Primary => "primary",
                    SideRole::Opposite => "opposite",
                },
            );
            f.set_property(
                "corners",
                vec![side.corners[0].ring_index, side.corners[1].ring_index],
            );
            f.set_property("edge_length", side.edge_length);
            f.set_property("overlap", side.overlap_m);
            if let Some(ref entity) = side.overlapping_entity {
                f.set_property("overlaps", entity.name());
            }
            f.set_property("width", side.width_estimate);
            f.set_property("length", side.length_estimate);
            f.set_property(
                "source",
                match side.source {
                    SideCenterSource::Midpoint => "midpoint",
                    SideCenterSource::OverlapSnapped => "overlap_snapped",
                },
            );
            if let Some(markers) = self.markers.get(&side.road) {
                f.set_property("quality", quality_name(&markers.quality));
            }
            features.push(f);
        }

        for polygon in self.polygons.values() {
            let mut f = feature(Geometry::Polygon(polygon.polygon.clone()), "intersection_polygon");
            f.set_property("name", polygon.name.clone());
            f.set_property(
                "roads",
                polygon
                    .contributing_roads
                    .iter()
                    .map(|r| r.0)
                    .collect::<Vec<_>>(),
            );
            f.set_property("rounded_corners", polygon.rounded_corners);
            features.push(f);

            for branch in &polygon.branches {
                let mut f = feature(Geometry::Point(branch.position.into()), "branch");
                f.set_property("intersection", polygon.name.clone());
                f.set_property("angle", branch.angle_degrees);
                f.set_property("distance", branch.distance_m);
                f.set_property("snapped", branch.snapped);
                features.push(f);
            }
        }

        for path in self.turn_paths.values() {
            let mut f = feature(Geometry::LineString(path.curve.samples.clone()), "turn_path");
            f.set_property("from", path.from_road.0);
            f.set_property("to", path.to_road.0);
            f.set_property("intersection", path.intersection.clone());
            f.set_property("vehicle", path.vehicle.class.clone());
            f.set_property("status", path.status.as_str());
            f.set_property("acceptable", path.clearance.acceptable);
            f.set_property("strict", path.clearance.strict);
            f.set_property("outside_area_sqm", path.clearance.outside_area_sqm);
            f.set_property("min_clearance_m", path.clearance.min_clearance_m);
            f.set_property("iterations", path.clearance.iterations);
            features.push(f);

            if path.reference.samples.0.len() >= 2 {
                let mut f = feature(
                    Geometry::LineString(path.reference.samples.clone()),
                    "reference_path",
                );
                f.set_property("from", path.from_road.0);
                f.set_property("to", path.to_road.0);
                if let Some(word) = path.reference.word {
                    f.set_property("word", word.to_string());
                }
                f.set_property("length", path.reference.length_m);
                features.push(f);
            }
        }

        let gj = GeoJson::from(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        });
        Ok(gj.to_string())
    }
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(JsonValue::as_str)
        .map(|s| s.to_string())
}

fn quality_name(quality: &MarkerQuality) -> &'static str {
    match quality {
        MarkerQuality::Full => "full",
        MarkerQuality::Degraded(_) => "degraded",
    }
}

fn feature(geometry: Geometry, kind: &str) -> Feature {
    let mut f = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&geometry))),
        id: None,
        properties: None,
        foreign_members: None,
    };
    f.set_property("kind", kind);
    f
}

impl Datastore for MemoryStore {
    fn is_geographic(&self) -> bool {
        self.geographic
    }

    fn roads(&self) -> Result<Vec<Road>> {
        Ok(self.roads.values().cloned().collect())
    }

    fn intersections(&self) -> Result<Vec<Intersection>> {
        Ok(self.intersections.values().cloned().collect())
    }

    fn locations(&self) -> Result<Vec<Location>> {
        Ok(self.locations.values().cloned().collect())
    }

    fn side_centers(&self, road: RoadID) -> Result<Vec<(MarkerID, SideCenterMarker)>> {
        Ok(self
            .side_centers
            .iter()
            .filter(|(_, side)| side.road == road)
            .map(|(id, side)| (*id, side.clone()))
            .collect())
    }

    fn save_markers(&mut self, markers: &RoadMarkers) -> Result<()> {
        if !self.roads.contains_key(&markers.road) {
            bail!("can't save markers for unknown {:?}", markers.road);
        }
        self.side_centers.retain(|_, side| side.road != markers.road);
        for side in &markers.side_centers {
            self.side_centers.insert(MarkerID(self.next_marker), side.clone());
            self.next_marker += 1;
        }
        self.markers.insert(markers.road, markers.clone());
        Ok(())
    }

    fn save_intersection_polygon(&mut self, polygon: &IntersectionPolygon) -> Result<()> {
        let Some(intersection) = self.intersections.get_mut(&polygon.intersection) else {
            bail!("can't save polygon for unknown {:?}", polygon.intersection);
        };
        intersection.geometry = Some(polygon.polygon.clone());
        self.polygons.insert(polygon.intersection, polygon.clone());
        Ok(())
    }

    fn upsert_turn_path(&mut self, path: &TurnPath) -> Result<()> {
        self.turn_paths.insert(
            (path.from_road, path.to_road, path.intersection.clone()),
            path.clone(),
        );
        Ok(())
    }
}
