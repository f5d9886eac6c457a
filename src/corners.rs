use std::collections::{BTreeMap, HashSet};

use geo::{
    BooleanOps, BoundingRect, Buffer, Coord, Geometry, Intersects, LineString, MultiLineString,
    Point, Polygon,
};
use log::{debug, warn};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::config::MarkerConfig;
use crate::network::{EntityRef, Neighbor, RoadID, RoadNetwork};
use crate::projection::{reproject_geometry, Reproject};
use crate::ring::{
    closest_point_on_segment, interior_angle_degrees, midpoint_along, open_ring, polyline_length,
    project_onto_polyline, right_angle_diff, ring_slice,
};

/// One of a road footprint's physical corners
#[derive(Clone, Debug, PartialEq)]
pub struct CornerMarker {
    pub road: RoadID,
    /// Index into the footprint's exterior ring, after consecutive duplicates are removed
    pub ring_index: usize,
    pub position: Coord,
    pub angle_degrees: f64,
    /// Distance from the ideal convex (90) or reflex (270) right angle
    pub angle_diff: f64,
    pub proximity_m: f64,
    pub nearest_entity: Option<EntityRef>,
    pub width_estimate: Option<f64>,
    pub length_estimate: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideRole {
    /// The edge overlapping a neighbor the most
    Primary,
    /// The edge across the road from the primary one
    Opposite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideCenterSource {
    Midpoint,
    OverlapSnapped,
}

/// A fixed point on one width-edge of a road footprint, used as the endpoint of turn paths
#[derive(Clone, Debug, PartialEq)]
pub struct SideCenterMarker {
    pub road: RoadID,
    pub corners: [CornerMarker; 2],
    /// Always somewhere on `edge`
    pub position: Coord,
    /// The footprint boundary between the two corners
    pub edge: LineString,
    pub edge_length: f64,
    pub overlap_m: f64,
    pub overlapping_entity: Option<EntityRef>,
    pub role: SideRole,
    pub source: SideCenterSource,
    pub width_estimate: f64,
    pub length_estimate: f64,
}

impl SideCenterMarker {
    /// Does this edge touch a particular intersection or location?
    pub fn touches(&self, name: &str) -> bool {
        self.overlapping_entity
            .as_ref()
            .map(|e| e.name() == name)
            .unwrap_or(false)
    }
}

/// How the corners were chosen
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CornerSelection {
    /// Every corner is within this many degrees of a right angle
    Tolerance(f64),
    /// Nothing on the ladder produced 4 corners near neighbors, so the best 4 anywhere were used
    Fallback,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DegradedReason {
    FallbackSelection,
    FewerThanFourCorners(usize),
    NoOverlappingEdge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MarkerQuality {
    Full,
    Degraded(Vec<DegradedReason>),
}

/// Everything extracted for one road footprint
#[derive(Clone, Debug, PartialEq)]
pub struct RoadMarkers {
    pub road: RoadID,
    pub corners: Vec<CornerMarker>,
    pub side_centers: Vec<SideCenterMarker>,
    pub selection: CornerSelection,
    pub quality: MarkerQuality,
    pub width_estimate: Option<f64>,
    pub length_estimate: Option<f64>,
}

impl RoadMarkers {
    pub fn is_degraded(&self) -> bool {
        matches!(self.quality, MarkerQuality::Degraded(_))
    }
}

/// Spatial index over intersections and locations, answering "what's closest to this corner?"
pub struct NeighborIndex {
    neighbors: Vec<Neighbor>,
    segments: RTree<NeighborSegment>,
    areas: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

struct NeighborSegment {
    a: [f64; 2],
    b: [f64; 2],
    neighbor: usize,
}

impl RTreeObject for NeighborSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

impl PointDistance for NeighborSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let pt = Coord {
            x: point[0],
            y: point[1],
        };
        let (closest, _) = closest_point_on_segment(
            Coord {
                x: self.a[0],
                y: self.a[1],
            },
            Coord {
                x: self.b[0],
                y: self.b[1],
            },
            pt,
        );
        (closest.x - pt.x).powi(2) + (closest.y - pt.y).powi(2)
    }
}

impl NeighborIndex {
    pub fn new(neighbors: Vec<Neighbor>) -> Self {
        let mut segments = Vec::new();
        let mut areas = Vec::new();
        for (idx, n) in neighbors.iter().enumerate() {
            let mut pairs = Vec::new();
            geometry_segments(&n.geometry, &mut pairs);
            segments.extend(pairs.into_iter().map(|(a, b)| NeighborSegment {
                a: [a.x, a.y],
                b: [b.x, b.y],
                neighbor: idx,
            }));
            if has_area(&n.geometry) {
                if let Some(rect) = n.geometry.bounding_rect() {
                    areas.push(GeomWithData::new(
                        Rectangle::from_corners(
                            [rect.min().x, rect.min().y],
                            [rect.max().x, rect.max().y],
                        ),
                        idx,
                    ));
                }
            }
        }
        Self {
            neighbors,
            segments: RTree::bulk_load(segments),
            areas: RTree::bulk_load(areas),
        }
    }

    pub fn from_network(network: &RoadNetwork) -> Self {
        Self::new(network.neighbors())
    }

    /// The closest neighbor and the distance to it. Points inside an area are at distance 0.
    pub fn nearest(&self, pt: Coord) -> Option<(f64, &Neighbor)> {
        let query = [pt.x, pt.y];
        for area in self.areas.locate_all_at_point(&query) {
            let n = &self.neighbors[area.data];
            if n.geometry.intersects(&Point::from(pt)) {
                return Some((0.0, n));
            }
        }
        let seg = self.segments.nearest_neighbor(&query)?;
        Some((seg.distance_2(&query).sqrt(), &self.neighbors[seg.neighbor]))
    }

    /// Neighbors with some part within `buffer` of a bounding box
    fn near_box(&self, min: Coord, max: Coord, buffer: f64) -> Vec<&Neighbor> {
        let envelope = AABB::from_corners(
            [min.x - buffer, min.y - buffer],
            [max.x + buffer, max.y + buffer],
        );
        let mut ids: Vec<usize> = self
            .segments
            .locate_in_envelope_intersecting(&envelope)
            .map(|s| s.neighbor)
            .chain(
                self.areas
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|a| a.data),
            )
            .collect();
        ids.sort();
        ids.dedup();
        ids.into_iter().map(|idx| &self.neighbors[idx]).collect()
    }
}

fn has_area(geometry: &Geometry) -> bool {
    match geometry {
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => true,
        Geometry::GeometryCollection(gc) => gc.iter().any(has_area),
        _ => false,
    }
}

fn geometry_segments(geometry: &Geometry, out: &mut Vec<(Coord, Coord)>) {
    fn linestring(ls: &LineString, out: &mut Vec<(Coord, Coord)>) {
        out.extend(ls.0.windows(2).map(|pair| (pair[0], pair[1])));
    }
    fn polygon(poly: &Polygon, out: &mut Vec<(Coord, Coord)>) {
        linestring(poly.exterior(), out);
        for hole in poly.interiors() {
            linestring(hole, out);
        }
    }

    match geometry {
        Geometry::Point(pt) => out.push((pt.0, pt.0)),
        Geometry::MultiPoint(pts) => out.extend(pts.iter().map(|pt| (pt.0, pt.0))),
        Geometry::Line(line) => out.push((line.start, line.end)),
        Geometry::LineString(ls) => linestring(ls, out),
        Geometry::MultiLineString(mls) => {
            for ls in mls {
                linestring(ls, out);
            }
        }
        Geometry::Polygon(poly) => polygon(poly, out),
        Geometry::MultiPolygon(mp) => {
            for poly in mp {
                polygon(poly, out);
            }
        }
        Geometry::Rect(rect) => polygon(&rect.to_polygon(), out),
        Geometry::Triangle(tri) => polygon(&tri.to_polygon(), out),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                geometry_segments(g, out);
            }
        }
    }
}

#[derive(Clone)]
struct Candidate {
    idx: usize,
    pos: Coord,
    angle: f64,
    angle_diff: f64,
    proximity: f64,
    entity: Option<EntityRef>,
}

// Positions at the configured precision, so nearly-equal corners hash the same
#[derive(PartialEq, Eq, Hash)]
struct HashedPoint(isize, isize);

impl HashedPoint {
    fn new(pt: Coord, precision: f64) -> Self {
        let precision = if precision > 0.0 { precision } else { 0.01 };
        Self(
            (pt.x / precision).round() as isize,
            (pt.y / precision).round() as isize,
        )
    }
}

/// Find the corners and side-centers of one road footprint. Returns None only when the footprint
/// has fewer than 3 distinct vertices; every other problem degrades the result instead.
pub fn extract_markers(
    road: RoadID,
    footprint: &Polygon,
    index: &NeighborIndex,
    cfg: &MarkerConfig,
) -> Option<RoadMarkers> {
    let mut ring = open_ring(footprint);
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        warn!("{:?} has only {} ring vertices, skipping", road, ring.len());
        return None;
    }

    let mut candidates: Vec<Candidate> = (0..ring.len())
        .filter_map(|idx| {
            let angle = interior_angle_degrees(&ring, idx)?;
            let (proximity, entity) = match index.nearest(ring[idx]) {
                Some((dist, n)) => (dist, Some(n.entity.clone())),
                None => (f64::INFINITY, None),
            };
            Some(Candidate {
                idx,
                pos: ring[idx],
                angle,
                angle_diff: right_angle_diff(angle),
                proximity,
                entity,
            })
        })
        .collect();
    candidates.sort_by(|a, b| {
        a.angle_diff
            .total_cmp(&b.angle_diff)
            .then(a.proximity.total_cmp(&b.proximity))
    });
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(HashedPoint::new(c.pos, cfg.dedup_precision_m)));

    let (mut chosen, selection) = select_corners(&candidates, cfg);
    chosen.sort_by_key(|c| c.idx);

    let mut reasons = Vec::new();
    if selection == CornerSelection::Fallback {
        warn!(
            "{:?}: no angle tolerance found 4 corners near neighbors; using the best {} anywhere",
            road,
            chosen.len()
        );
        reasons.push(DegradedReason::FallbackSelection);
    }

    let mut corners: Vec<CornerMarker> = chosen
        .iter()
        .map(|c| CornerMarker {
            road,
            ring_index: c.idx,
            position: c.pos,
            angle_degrees: c.angle,
            angle_diff: c.angle_diff,
            proximity_m: c.proximity,
            nearest_entity: c.entity.clone(),
            width_estimate: None,
            length_estimate: None,
        })
        .collect();

    if corners.len() < 4 {
        warn!("{:?}: only found {} corners", road, corners.len());
        reasons.push(DegradedReason::FewerThanFourCorners(corners.len()));
        return Some(RoadMarkers {
            road,
            corners,
            side_centers: Vec::new(),
            selection,
            quality: MarkerQuality::Degraded(reasons),
            width_estimate: None,
            length_estimate: None,
        });
    }

    let edges: Vec<Edge> = (0..4)
        .map(|i| {
            let from = corners[i].ring_index;
            let to = corners[(i + 1) % 4].ring_index;
            Edge::new(&ring, from, to, index, cfg)
        })
        .collect();

    // The first edge with the most overlap wins
    let mut best = 0;
    for (i, edge) in edges.iter().enumerate() {
        if edge.overlap > edges[best].overlap {
            best = i;
        }
    }
    let opposite = (best + 2) % 4;
    let width = (edges[best].length + edges[opposite].length) / 2.0;
    let length = (edges[(best + 1) % 4].length + edges[(best + 3) % 4].length) / 2.0;
    for c in &mut corners {
        c.width_estimate = Some(width);
        c.length_estimate = Some(length);
    }

    let mut side_centers = Vec::new();
    if edges[best].overlap > 0.0 {
        for (i, role) in [(best, SideRole::Primary), (opposite, SideRole::Opposite)] {
            let edge = &edges[i];
            side_centers.push(SideCenterMarker {
                road,
                corners: [corners[i].clone(), corners[(i + 1) % 4].clone()],
                position: edge.center,
                edge: LineString::new(edge.pts.clone()),
                edge_length: edge.length,
                overlap_m: edge.overlap,
                overlapping_entity: edge.entity.clone(),
                role,
                source: edge.source,
                width_estimate: width,
                length_estimate: length,
            });
        }
        debug!(
            "{:?}: width {:.1}m, length {:.1}m, primary edge overlaps {:?} by {:.1}m",
            road,
            width,
            length,
            edges[best].entity.as_ref().map(|e| e.name()),
            edges[best].overlap
        );
    } else {
        warn!("{:?} doesn't overlap any intersection or location", road);
        reasons.push(DegradedReason::NoOverlappingEdge);
    }

    Some(RoadMarkers {
        road,
        corners,
        side_centers,
        selection,
        quality: if reasons.is_empty() {
            MarkerQuality::Full
        } else {
            MarkerQuality::Degraded(reasons)
        },
        width_estimate: Some(width),
        length_estimate: Some(length),
    })
}

/// Extract markers for every road with a footprint.
pub fn extract_all_markers(
    network: &RoadNetwork,
    cfg: &MarkerConfig,
) -> BTreeMap<RoadID, RoadMarkers> {
    let index = NeighborIndex::from_network(network);
    network
        .roads
        .values()
        .filter_map(|r| {
            let footprint = r.footprint()?;
            extract_markers(r.id, footprint, &index, cfg).map(|m| (r.id, m))
        })
        .collect()
}

fn select_corners(
    candidates: &[Candidate],
    cfg: &MarkerConfig,
) -> (Vec<Candidate>, CornerSelection) {
    let near: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.proximity <= cfg.proximity_threshold_m)
        .collect();
    for tolerance in &cfg.angle_tolerance_ladder {
        let chosen: Vec<Candidate> = near
            .iter()
            .filter(|c| c.angle_diff <= *tolerance)
            .take(4)
            .map(|c| (*c).clone())
            .collect();
        if chosen.len() == 4 {
            return (chosen, CornerSelection::Tolerance(*tolerance));
        }
    }
    (
        candidates.iter().take(4).cloned().collect(),
        CornerSelection::Fallback,
    )
}

struct Edge {
    pts: Vec<Coord>,
    length: f64,
    center: Coord,
    source: SideCenterSource,
    overlap: f64,
    entity: Option<EntityRef>,
}

impl Edge {
    fn new(
        ring: &[Coord],
        from: usize,
        to: usize,
        index: &NeighborIndex,
        cfg: &MarkerConfig,
    ) -> Self {
        let pts = ring_slice(ring, from, to);
        let length = polyline_length(&pts);
        let midpoint = midpoint_along(&pts).unwrap_or(ring[from]);

        let mut overlap = 0.0;
        let mut entity = None;
        let mut region = None;
        let mut longest_piece: Option<LineString> = None;

        let mut min = pts[0];
        let mut max = pts[0];
        for pt in &pts {
            min.x = min.x.min(pt.x);
            min.y = min.y.min(pt.y);
            max.x = max.x.max(pt.x);
            max.y = max.y.max(pt.y);
        }
        let path = MultiLineString::new(vec![LineString::new(pts.clone())]);
        for n in index.near_box(min, max, cfg.overlap_tolerance_m) {
            let widened = n.geometry.buffer(cfg.overlap_tolerance_m);
            let inside = widened.clip(&path, false);
            let amount: f64 = inside.iter().map(|ls| polyline_length(&ls.0)).sum();
            if amount > overlap {
                overlap = amount;
                entity = Some(n.entity.clone());
                longest_piece = inside
                    .into_iter()
                    .max_by(|a, b| polyline_length(&a.0).total_cmp(&polyline_length(&b.0)));
                region = Some(widened);
            }
        }

        let mut center = midpoint;
        let mut source = SideCenterSource::Midpoint;
        if cfg.snap_to_overlap {
            if let (Some(region), Some(piece)) = (region, longest_piece) {
                if !region.intersects(&Point::from(midpoint)) {
                    let snapped = midpoint_along(&piece.0)
                        .and_then(|pt| project_onto_polyline(&pts, pt))
                        .map(|p| p.pt);
                    if let Some(pt) = snapped {
                        center = pt;
                        source = SideCenterSource::OverlapSnapped;
                    }
                }
            }
        }

        Self {
            pts,
            length,
            center,
            source,
            overlap,
            entity,
        }
    }
}

impl Reproject for CornerMarker {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        self.position = f(self.position);
    }
}

impl Reproject for SideCenterMarker {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        self.position = f(self.position);
        reproject_geometry(&mut self.edge, f);
        for c in &mut self.corners {
            c.reproject(f);
        }
    }
}

impl Reproject for RoadMarkers {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        for c in &mut self.corners {
            c.reproject(f);
        }
        for s in &mut self.side_centers {
            s.reproject(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{IntersectionID, LocationID};
    use geo::polygon;

    fn neighbors(top_offset: f64) -> NeighborIndex {
        NeighborIndex::new(vec![
            Neighbor {
                entity: EntityRef::Intersection(IntersectionID(1), "pit ramp junction".to_string()),
                geometry: polygon![
                    (x: -14., y: -30.),
                    (x: 26., y: -30.),
                    (x: 26., y: 0.),
                    (x: -14., y: 0.)
                ]
                .into(),
            },
            Neighbor {
                entity: EntityRef::Location(LocationID(2), "crusher".to_string()),
                geometry: polygon![
                    (x: top_offset + 3., y: 40.),
                    (x: top_offset + 9., y: 40.),
                    (x: top_offset + 9., y: 50.),
                    (x: top_offset + 3., y: 50.)
                ]
                .into(),
            },
        ])
    }

    // 12m wide, 40m long, with a redundant vertex halfway along each long side
    fn straight_road() -> Polygon {
        polygon![
            (x: 0., y: 0.),
            (x: 12., y: 0.),
            (x: 12., y: 20.),
            (x: 12., y: 40.),
            (x: 0., y: 40.),
            (x: 0., y: 20.)
        ]
    }

    #[test]
    fn test_straight_road_between_neighbors() {
        let markers = extract_markers(
            RoadID(5),
            &straight_road(),
            &neighbors(0.0),
            &MarkerConfig::default(),
        )
        .unwrap();
        assert_eq!(markers.quality, MarkerQuality::Full);
        assert_eq!(markers.selection, CornerSelection::Tolerance(3.0));
        let indices: Vec<usize> = markers.corners.iter().map(|c| c.ring_index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4]);
        assert!((markers.width_estimate.unwrap() - 12.0).abs() < 1e-9);
        assert!((markers.length_estimate.unwrap() - 40.0).abs() < 1e-9);

        assert_eq!(markers.side_centers.len(), 2);
        let primary = &markers.side_centers[0];
        assert_eq!(primary.role, SideRole::Primary);
        assert!(primary.touches("pit ramp junction"));
        assert!(primary.overlap_m > 11.9);
        assert!((primary.position.x - 6.0).abs() < 1e-9 && primary.position.y.abs() < 1e-9);
        assert_eq!(primary.source, SideCenterSource::Midpoint);

        let opposite = &markers.side_centers[1];
        assert_eq!(opposite.role, SideRole::Opposite);
        assert!(opposite.touches("crusher"));
        assert!((opposite.position.y - 40.0).abs() < 1e-9);
        assert!(markers.corners.iter().all(|c| c.width_estimate == Some(12.0)));
    }

    #[test]
    fn test_side_centers_lie_on_their_edge() {
        for offset in [0.0, 5.0] {
            let markers = extract_markers(
                RoadID(5),
                &straight_road(),
                &neighbors(offset),
                &MarkerConfig::default(),
            )
            .unwrap();
            for side in &markers.side_centers {
                let projected = project_onto_polyline(&side.edge.0, side.position).unwrap();
                assert!(projected.dist_away < 1e-6, "{side:?}");
            }
        }
    }

    #[test]
    fn test_snaps_to_overlap() {
        // The crusher only covers x = 10 to 16 at the top, missing the midpoint at x = 6. The
        // overlapping stretch (within 1m tolerance) is x = 9 to 12.
        let cfg = MarkerConfig {
            proximity_threshold_m: 10.0,
            ..Default::default()
        };
        let markers = extract_markers(RoadID(5), &straight_road(), &neighbors(7.0), &cfg).unwrap();
        assert_eq!(markers.quality, MarkerQuality::Full);
        let opposite = &markers.side_centers[1];
        assert_eq!(opposite.source, SideCenterSource::OverlapSnapped);
        assert!((opposite.position.x - 10.5).abs() < 0.1, "{:?}", opposite.position);

        let cfg = MarkerConfig {
            snap_to_overlap: false,
            ..cfg
        };
        let markers = extract_markers(RoadID(5), &straight_road(), &neighbors(7.0), &cfg).unwrap();
        assert_eq!(markers.side_centers[1].source, SideCenterSource::Midpoint);
    }

    #[test]
    fn test_tolerance_ladder() {
        // A parallelogram skewed by 4 degrees
        let s = 40.0 * 4.0_f64.to_radians().tan();
        let footprint = polygon![
            (x: 0., y: 0.),
            (x: 12., y: 0.),
            (x: 12. + s, y: 40.),
            (x: s, y: 40.)
        ];
        let markers = extract_markers(
            RoadID(9),
            &footprint,
            &neighbors(s),
            &MarkerConfig::default(),
        )
        .unwrap();
        assert_eq!(markers.selection, CornerSelection::Tolerance(5.0));
        assert!(markers.corners.iter().all(|c| c.angle_diff <= 15.0));
    }

    #[test]
    fn test_isolated_road_degrades() {
        let far_away = NeighborIndex::new(vec![Neighbor {
            entity: EntityRef::Location(LocationID(3), "workshop".to_string()),
            geometry: Point::new(500.0, 500.0).into(),
        }]);
        let markers = extract_markers(
            RoadID(5),
            &straight_road(),
            &far_away,
            &MarkerConfig::default(),
        )
        .unwrap();
        assert_eq!(markers.selection, CornerSelection::Fallback);
        assert_eq!(markers.corners.len(), 4);
        assert!(markers.side_centers.is_empty());
        assert_eq!(
            markers.quality,
            MarkerQuality::Degraded(vec![
                DegradedReason::FallbackSelection,
                DegradedReason::NoOverlappingEdge
            ])
        );
    }

    #[test]
    fn test_duplicate_vertices() {
        let footprint = polygon![
            (x: 0., y: 0.),
            (x: 12., y: 0.),
            (x: 12., y: 0.),
            (x: 12., y: 40.),
            (x: 0., y: 40.)
        ];
        let markers = extract_markers(
            RoadID(5),
            &footprint,
            &neighbors(0.0),
            &MarkerConfig::default(),
        )
        .unwrap();
        assert_eq!(markers.corners.len(), 4);
        let positions: HashSet<HashedPoint> = markers
            .corners
            .iter()
            .map(|c| HashedPoint::new(c.position, 0.01))
            .collect();
        assert_eq!(positions.len(), 4);
    }

    #[test]
    fn test_too_few_vertices() {
        let footprint = polygon![(x: 0., y: 0.), (x: 12., y: 0.)];
        assert!(extract_markers(
            RoadID(5),
            &footprint,
            &neighbors(0.0),
            &MarkerConfig::default()
        )
        .is_none());
    }

    #[test]
    fn test_nearest_neighbor() {
        let index = neighbors(0.0);
        let (dist, n) = index.nearest(Coord { x: 5., y: -5. }).unwrap();
        assert_eq!(dist, 0.0);
        assert_eq!(n.entity.name(), "pit ramp junction");
        let (dist, n) = index.nearest(Coord { x: 6., y: 37. }).unwrap();
        assert!((dist - 3.0).abs() < 1e-9);
        assert_eq!(n.entity.name(), "crusher");
    }
}
