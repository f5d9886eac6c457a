use std::collections::BTreeMap;

use geo::algorithm::buffer::{BufferStyle, LineJoin};
use geo::{Area, BooleanOps, Buffer, Coord, Line, LineString, MultiPolygon, Point, Polygon};
use log::{debug, info, warn};

use crate::buffer_linestring::buffer_linestring;
use crate::config::{BranchConfig, PolygonConfig};
use crate::network::{Intersection, IntersectionID, Road, RoadID, RoadNetwork};
use crate::projection::{reproject_geometry, Reproject};
use crate::ring::{
    distance, distance_to_polyline, interior_angle_degrees, open_ring, project_away,
    project_onto_polyline, right_angle_diff, segments_intersection, slice_between,
    vertex_angle_degrees,
};

/// The drivable area of one intersection
#[derive(Clone, Debug, PartialEq)]
pub struct IntersectionPolygon {
    pub intersection: IntersectionID,
    pub name: String,
    pub polygon: Polygon,
    pub contributing_roads: Vec<RoadID>,
    pub rounded_corners: usize,
    pub branches: Vec<BranchCenter>,
}

/// Where one road arm leaves the intersection
#[derive(Clone, Debug, PartialEq)]
pub struct BranchCenter {
    pub angle_degrees: f64,
    pub distance_m: f64,
    pub position: Coord,
    /// True when moved onto a nearby right-angle vertex of the polygon
    pub snapped: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    NoNearbyRoads,
    /// Every contributing road runs along one axis, so this is a lane split, not a crossing
    SingleAxis { heading_degrees: f64 },
    EmptyUnion,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PolygonOutcome {
    Built(IntersectionPolygon),
    Rejected(RejectReason),
}

struct Slice {
    road: RoadID,
    pts: Vec<Coord>,
    width: f64,
    /// Folded into [0, 180)
    heading_degrees: f64,
}

/// Build polygons for every intersection in the network.
pub fn build_intersection_polygons(
    network: &RoadNetwork,
    cfg: &PolygonConfig,
) -> BTreeMap<IntersectionID, PolygonOutcome> {
    let mut results = BTreeMap::new();
    for i in network.intersections.values() {
        let outcome = build_intersection_polygon(network, i, cfg);
        if let PolygonOutcome::Rejected(ref reason) = outcome {
            warn!("Skipping intersection {} ({:?}): {:?}", i.name, i.id, reason);
        }
        results.insert(i.id, outcome);
    }
    let built = results
        .values()
        .filter(|o| matches!(o, PolygonOutcome::Built(_)))
        .count();
    info!(
        "Built {} intersection polygons, rejected {}",
        built,
        results.len() - built
    );
    results
}

pub fn build_intersection_polygon(
    network: &RoadNetwork,
    intersection: &Intersection,
    cfg: &PolygonConfig,
) -> PolygonOutcome {
    let center = intersection.center.0;

    let nearby: Vec<&Road> = if intersection.connected_roads.is_empty() {
        network.roads_near(center, cfg.nearby_distance_m)
    } else {
        intersection
            .connected_roads
            .iter()
            .filter_map(|id| network.roads.get(id))
            .filter(|r| {
                r.centerline()
                    .map(|ls| distance_to_polyline(&ls.0, center) <= cfg.nearby_distance_m)
                    .unwrap_or(false)
            })
            .collect()
    };

    let slices: Vec<Slice> = nearby
        .into_iter()
        .filter_map(|r| make_slice(r, center, cfg))
        .collect();
    if slices.is_empty() {
        return PolygonOutcome::Rejected(RejectReason::NoNearbyRoads);
    }

    let axes = cluster_headings(
        slices.iter().map(|s| s.heading_degrees),
        cfg.axis_tolerance_degrees,
    );
    if axes.len() < 2 {
        return PolygonOutcome::Rejected(RejectReason::SingleAxis {
            heading_degrees: axes[0],
        });
    }

    let mut union = MultiPolygon::new(Vec::new());
    for slice in &slices {
        if let Some(poly) = buffer_linestring(
            &LineString::new(slice.pts.clone()),
            slice.width / 2.0,
            cfg.miter_threshold_m,
        ) {
            union = union.union(&poly);
        }
    }
    let Some(unioned) = largest(union) else {
        return PolygonOutcome::Rejected(RejectReason::EmptyUnion);
    };

    let widest = slices.iter().map(|s| s.width).fold(0.0, f64::max);
    let expanded = if cfg.expansion_factor > 0.0 {
        largest(unioned.buffer_with_style(
            BufferStyle::new(cfg.expansion_factor * widest).line_join(LineJoin::Miter(2.0)),
        ))
        .unwrap_or(unioned)
    } else {
        unioned
    };

    let (polygon, rounded_corners) = round_near_corners(expanded, center, cfg);
    debug!(
        "{}: {} roads, {} axes, {} corners rounded, area {:.0}",
        intersection.name,
        slices.len(),
        axes.len(),
        rounded_corners,
        polygon.unsigned_area()
    );

    let branches = if cfg.branches.enabled {
        extract_branches(&polygon, center, &cfg.branches)
    } else {
        Vec::new()
    };

    PolygonOutcome::Built(IntersectionPolygon {
        intersection: intersection.id,
        name: intersection.name.clone(),
        polygon,
        contributing_roads: slices.iter().map(|s| s.road).collect(),
        rounded_corners,
        branches,
    })
}

fn make_slice(road: &Road, center: Coord, cfg: &PolygonConfig) -> Option<Slice> {
    let pts = &road.centerline()?.0;
    let projected = project_onto_polyline(pts, center)?;
    let pts = slice_between(
        pts,
        projected.dist_along - cfg.slice_half_length_m,
        projected.dist_along + cfg.slice_half_length_m,
    );
    if pts.len() < 2 {
        return None;
    }
    let first = pts[0];
    let last = *pts.last()?;
    if distance(first, last) == 0.0 {
        return None;
    }
    Some(Slice {
        road: road.id,
        heading_degrees: (last.y - first.y)
            .atan2(last.x - first.x)
            .to_degrees()
            .rem_euclid(180.0),
        pts,
        width: road.width.unwrap_or(cfg.default_road_width_m) * cfg.width_factor,
    })
}

fn axis_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 180.0;
    diff.min(180.0 - diff)
}

/// Group headings (folded to [0, 180)) into axes. Returns one representative heading per axis.
fn cluster_headings(headings: impl Iterator<Item = f64>, tolerance: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = headings.collect();
    sorted.sort_by(f64::total_cmp);
    let mut axes: Vec<f64> = Vec::new();
    for h in sorted {
        if !axes.iter().any(|axis| axis_difference(*axis, h) <= tolerance) {
            axes.push(h);
        }
    }
    axes
}

fn largest(mp: MultiPolygon) -> Option<Polygon> {
    mp.0
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

// Fillet the sharp corners near the center by closing (growing then shrinking) the polygon, but
// only keep the closed version inside small disks around those corners. Corners farther away,
// where a through-road just leaves the intersection, stay sharp.
fn round_near_corners(polygon: Polygon, center: Coord, cfg: &PolygonConfig) -> (Polygon, usize) {
    let ring = open_ring(&polygon);
    let sharp: Vec<Coord> = (0..ring.len())
        .filter(|idx| {
            vertex_angle_degrees(&ring, *idx)
                .map(|angle| angle < cfg.blunt_angle_degrees)
                .unwrap_or(false)
                && distance(ring[*idx], center) <= cfg.rounding_radius_m
        })
        .map(|idx| ring[idx])
        .collect();
    if sharp.is_empty() || cfg.fillet_radius_m <= 0.0 {
        return (polygon, 0);
    }

    let mut disks = MultiPolygon::new(Vec::new());
    for pt in &sharp {
        disks = disks.union(&Point::from(*pt).buffer(cfg.fillet_disk_radius_m));
    }
    let closed = polygon
        .buffer(cfg.fillet_radius_m)
        .buffer(-cfg.fillet_radius_m);

    let rest = polygon.difference(&disks);
    let rounded = closed.intersection(&disks);
    match largest(rest.union(&rounded)) {
        Some(result) => (result, sharp.len()),
        None => (polygon, 0),
    }
}

/// Cast rays outward from the center and find one point per road arm, where the distance to the
/// polygon's edge peaks.
pub fn extract_branches(polygon: &Polygon, center: Coord, cfg: &BranchConfig) -> Vec<BranchCenter> {
    let n = cfg.ray_count.max(4);
    let step = 360.0 / n as f64;
    let edges: Vec<Line> = polygon
        .exterior()
        .lines()
        .chain(polygon.interiors().iter().flat_map(|ring| ring.lines()))
        .collect();
    let profile: Vec<f64> = (0..n)
        .map(|i| cast_ray(&edges, center, i as f64 * step, cfg.ray_length_m))
        .collect();

    let mut sorted = profile.clone();
    sorted.sort_by(f64::total_cmp);
    let percentile = sorted[((n - 1) as f64 * cfg.percentile.clamp(0.0, 1.0)).round() as usize];
    let mean = profile.iter().sum::<f64>() / n as f64;
    let threshold = percentile.max(mean);

    let maxima: Vec<f64> = (0..n)
        .filter(|i| {
            let d = profile[*i];
            d > threshold && d >= profile[(i + n - 1) % n] && d >= profile[(i + 1) % n]
        })
        .map(|i| i as f64 * step)
        .collect();

    // Group maxima separated by less than the minimum angle, including across 0 degrees
    let mut groups: Vec<Vec<f64>> = Vec::new();
    for angle in maxima {
        match groups.last_mut() {
            Some(group) if angle - group[group.len() - 1] < cfg.min_branch_separation_degrees => {
                group.push(angle)
            }
            _ => groups.push(vec![angle]),
        }
    }
    if groups.len() > 1 {
        let first = groups[0][0];
        let last = groups[groups.len() - 1].last().copied().unwrap_or(first);
        if first + 360.0 - last < cfg.min_branch_separation_degrees {
            if let Some(last) = groups.pop() {
                groups[0].extend(last.into_iter().map(|a| a - 360.0));
            }
        }
    }

    let ring = open_ring(polygon);
    let corners: Vec<Coord> = (0..ring.len())
        .filter(|idx| {
            interior_angle_degrees(&ring, *idx)
                .map(|angle| right_angle_diff(angle) <= cfg.corner_snap_angle_tolerance_degrees)
                .unwrap_or(false)
        })
        .map(|idx| ring[idx])
        .collect();

    groups
        .into_iter()
        .filter_map(|group| {
            let (sin, cos) = group.iter().fold((0.0, 0.0), |(s, c), a| {
                (s + a.to_radians().sin(), c + a.to_radians().cos())
            });
            let angle = sin.atan2(cos).to_degrees().rem_euclid(360.0);
            let dist = cast_ray(&edges, center, angle, cfg.ray_length_m);
            if dist == 0.0 {
                return None;
            }
            let hit = project_away(center, angle, dist);
            let snap = corners
                .iter()
                .map(|c| (distance(*c, hit), *c))
                .filter(|(d, _)| *d <= cfg.corner_snap_distance_m)
                .min_by(|a, b| a.0.total_cmp(&b.0));
            Some(BranchCenter {
                angle_degrees: angle,
                distance_m: dist,
                position: snap.map(|(_, c)| c).unwrap_or(hit),
                snapped: snap.is_some(),
            })
        })
        .collect()
}

// Distance to the farthest boundary crossing along a ray, or 0 if it doesn't hit anything
fn cast_ray(edges: &[Line], center: Coord, angle_degrees: f64, length: f64) -> f64 {
    let ray = Line::new(center, project_away(center, angle_degrees, length));
    edges
        .iter()
        .filter_map(|edge| segments_intersection(ray, *edge))
        .map(|(_, frac)| frac * length)
        .fold(0.0, f64::max)
}

impl Reproject for IntersectionPolygon {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        reproject_geometry(&mut self.polygon, f);
        for b in &mut self.branches {
            b.position = f(b.position);
        }
    }
}
