use std::fmt;

use anyhow::Result;
use geo::algorithm::buffer::{BufferStyle, LineCap};
use geo::{Area, BooleanOps, Buffer, Centroid, Contains, Coord, LineString, Point, Polygon};
use log::{debug, info, warn};

use crate::bezier::sample_bezier;
use crate::config::PlannerConfig;
use crate::corners::SideCenterMarker;
use crate::dubins::{dubins_path, sample_dubins, DubinsWord, Pose};
use crate::network::RoadID;
use crate::projection::{reproject_geometry, Projection, Reproject};
use crate::ring::{distance, distance_to_boundary, normalize};
use crate::store::{Datastore, MarkerID};
use crate::vehicle::{VehicleProfile, VehicleRegistry};

#[derive(Clone, Debug, PartialEq)]
pub struct TurnRequest {
    pub from_road: RoadID,
    pub to_road: RoadID,
    pub intersection: String,
    pub vehicle_class: String,
    /// Use these side-center markers instead of looking them up by intersection
    pub from_marker: Option<MarkerID>,
    pub to_marker: Option<MarkerID>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    Ok,
    /// Even the best attempt leaks too much of the vehicle's envelope outside the intersection
    EnvelopeOutsideIntersection,
}

impl TurnStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnStatus::Ok => "ok",
            TurnStatus::EnvelopeOutsideIntersection => "envelope_outside_intersection",
        }
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClearanceReport {
    pub acceptable: bool,
    pub strict: bool,
    pub outside_area_sqm: f64,
    /// Smallest distance between the envelope's edge and the intersection boundary. Negative when
    /// the envelope crosses it.
    pub min_clearance_m: f64,
    pub iterations: usize,
}

/// The curvature-bounded path between the endpoints. Only used for its length and shape.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferencePath {
    /// None when the vehicle has no usable turning radius
    pub word: Option<DubinsWord>,
    pub length_m: f64,
    pub samples: LineString,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SmoothCurve {
    pub control_points: [Coord; 4],
    pub samples: LineString,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnPath {
    pub from_road: RoadID,
    pub to_road: RoadID,
    pub intersection: String,
    pub vehicle: VehicleProfile,
    pub status: TurnStatus,
    pub reference: ReferencePath,
    pub curve: SmoothCurve,
    pub clearance: ClearanceReport,
    /// Radians, 0 along +x
    pub start_heading: f64,
    pub end_heading: f64,
    /// Area outside the intersection of the curve kept after each iteration. Never increases.
    pub leak_history: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlanOutcome {
    Planned(TurnPath),
    /// Markers, the intersection polygon, or the vehicle profile haven't been set up yet
    DataMissing(String),
}

struct Attempt {
    controls: [Coord; 4],
    samples: Vec<Coord>,
    outside_area: f64,
    min_clearance: f64,
}

/// Find a smooth path from one road's side-center marker to another's through an intersection
/// polygon, keeping the vehicle's envelope inside the polygon if possible. Everything must be in
/// the same planar frame.
pub fn plan_turn(
    from: &SideCenterMarker,
    to: &SideCenterMarker,
    intersection: &str,
    polygon: &Polygon,
    vehicle: &VehicleProfile,
    cfg: &PlannerConfig,
) -> TurnPath {
    let p0 = from.position;
    let p3 = to.position;
    let centroid = polygon
        .centroid()
        .map(|pt| pt.0)
        .unwrap_or_else(|| (p0 + p3) / 2.0);

    let start_heading = estimate_heading(p0, &from.edge.0, centroid, true);
    let end_heading = estimate_heading(p3, &to.edge.0, centroid, false);
    let reference = reference_path(
        Pose::new(p0, start_heading),
        Pose::new(p3, end_heading),
        vehicle.min_turning_radius_m,
        cfg.dubins_step_m,
    );

    let arm = (distance(p0, p3) * 0.5)
        .max(vehicle.min_turning_radius_m * cfg.min_control_radius_factor);
    let controls = [
        p0,
        p0 + direction(start_heading) * arm,
        p3 - direction(end_heading) * arm,
        p3,
    ];

    let half_width = vehicle.envelope_half_width();
    let tolerance = cfg.leak_tolerance(vehicle.width_m);
    let evaluate = |controls: [Coord; 4]| {
        let samples = sample_bezier(
            controls[0],
            controls[1],
            controls[2],
            controls[3],
            cfg.bezier_samples.max(1),
        );
        let (outside_area, min_clearance) = measure_clearance(&samples, polygon, half_width);
        Attempt {
            controls,
            samples,
            outside_area,
            min_clearance,
        }
    };

    let mut best = evaluate(controls);
    let mut leak_history = vec![best.outside_area];
    let mut accepted = best.outside_area < tolerance;
    let mut step_scale = 1.0;
    while !accepted && leak_history.len() < cfg.iteration_cap {
        // Only the interior control points move
        let mut controls = best.controls;
        controls[1] = pull_toward(controls[1], centroid, step_scale, cfg);
        controls[2] = pull_toward(controls[2], centroid, step_scale, cfg);

        let attempt = evaluate(controls);
        debug!(
            "Road {} -> {} at {}, iteration {}: {:.2} sqm outside, clearance {:.2}m",
            from.road.0,
            to.road.0,
            intersection,
            leak_history.len() + 1,
            attempt.outside_area,
            attempt.min_clearance
        );
        if attempt.outside_area <= best.outside_area {
            accepted = attempt.outside_area < tolerance;
            best = attempt;
        } else {
            // Pulled past the tightest curve. Stay put and try a smaller step next time.
            step_scale /= 2.0;
        }
        leak_history.push(best.outside_area);
    }

    let iterations = leak_history.len();
    let status = if accepted {
        TurnStatus::Ok
    } else {
        TurnStatus::EnvelopeOutsideIntersection
    };
    if status != TurnStatus::Ok {
        warn!(
            "No acceptable turn from road {} to road {} at {} for {}: {:.1} sqm outside after {} iterations",
            from.road.0, to.road.0, intersection, vehicle.class, best.outside_area, iterations
        );
    }

    TurnPath {
        from_road: from.road,
        to_road: to.road,
        intersection: intersection.to_string(),
        vehicle: vehicle.clone(),
        status,
        reference,
        curve: SmoothCurve {
            control_points: best.controls,
            samples: LineString::new(best.samples),
        },
        clearance: ClearanceReport {
            acceptable: accepted,
            strict: best.outside_area < cfg.strict_tolerance_sqm,
            outside_area_sqm: best.outside_area,
            min_clearance_m: best.min_clearance,
            iterations,
        },
        start_heading,
        end_heading,
        leak_history,
    }
}

/// The direction to drive through a side-center marker, perpendicular to its edge. Entering
/// points toward the intersection's centroid, exiting points away from it. Falls back to the
/// direction of the centroid itself if the edge is degenerate.
pub fn estimate_heading(pt: Coord, edge: &[Coord], centroid: Coord, entering: bool) -> f64 {
    let toward = centroid - pt;
    let normal = nearest_tangent(pt, edge).map(|t| {
        let n = Coord { x: -t.y, y: t.x };
        if n.x * toward.x + n.y * toward.y < 0.0 {
            -n
        } else {
            n
        }
    });
    let inward = normal.or_else(|| normalize(toward));
    match inward {
        Some(dir) => {
            let dir = if entering { dir } else { -dir };
            dir.y.atan2(dir.x)
        }
        None => 0.0,
    }
}

// The edge's direction around the vertex closest to a point
fn nearest_tangent(pt: Coord, edge: &[Coord]) -> Option<Coord> {
    let idx = edge
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance(**a, pt).total_cmp(&distance(**b, pt)))?
        .0;
    let prev = edge[idx.saturating_sub(1)];
    let next = edge[(idx + 1).min(edge.len() - 1)];
    normalize(next - prev)
}

fn direction(heading: f64) -> Coord {
    Coord {
        x: heading.cos(),
        y: heading.sin(),
    }
}

// Moves a bounded step toward the target, stopping at it
fn pull_toward(pt: Coord, target: Coord, scale: f64, cfg: &PlannerConfig) -> Coord {
    let dist = distance(pt, target);
    if dist == 0.0 {
        return pt;
    }
    let step = ((cfg.pull_fraction * dist).min(cfg.max_pull_step_m) * scale).min(dist);
    pt + (target - pt) * (step / dist)
}

fn reference_path(start: Pose, goal: Pose, radius: f64, step_m: f64) -> ReferencePath {
    match dubins_path(start, goal, radius) {
        Some(path) => ReferencePath {
            word: Some(path.word),
            length_m: path.length(),
            samples: LineString::new(sample_dubins(&path, start, radius, step_m)),
        },
        None => ReferencePath {
            word: None,
            length_m: distance(start.pt(), goal.pt()),
            samples: LineString::new(vec![start.pt(), goal.pt()]),
        },
    }
}

/// Buffers the path by the envelope's half width, with flat ends at the endpoints, and measures
/// how much of it falls outside the polygon.
fn measure_clearance(samples: &[Coord], polygon: &Polygon, half_width: f64) -> (f64, f64) {
    let path = LineString::new(samples.to_vec());
    let envelope = path.buffer_with_style(BufferStyle::new(half_width).line_cap(LineCap::Butt));
    let outside_area = envelope.difference(polygon).unsigned_area();

    let min_clearance = samples
        .iter()
        .map(|pt| {
            let d = distance_to_boundary(polygon, *pt);
            if polygon.contains(&Point::from(*pt)) {
                d
            } else {
                -d
            }
        })
        .fold(f64::INFINITY, f64::min);
    let min_clearance = if min_clearance.is_finite() {
        min_clearance - half_width
    } else {
        -half_width
    };
    (outside_area, min_clearance)
}

/// Looks up everything a turn needs from a datastore, plans it in a local planar frame, and
/// returns it in the datastore's frame.
pub struct TurnPlanner<'a, V: VehicleRegistry + ?Sized> {
    vehicles: &'a V,
    cfg: &'a PlannerConfig,
}

impl<'a, V: VehicleRegistry + ?Sized> TurnPlanner<'a, V> {
    pub fn new(vehicles: &'a V, cfg: &'a PlannerConfig) -> Self {
        Self { vehicles, cfg }
    }

    pub fn plan<S: Datastore + ?Sized>(&self, store: &S, req: &TurnRequest) -> Result<PlanOutcome> {
        let Some(vehicle) = self.vehicles.profile(&req.vehicle_class) else {
            return Ok(PlanOutcome::DataMissing(format!(
                "no profile for vehicle class {}",
                req.vehicle_class
            )));
        };
        let Some(intersection) = store.intersection_by_name(&req.intersection)? else {
            return Ok(PlanOutcome::DataMissing(format!(
                "no intersection named {}",
                req.intersection
            )));
        };
        let Some(mut polygon) = intersection.geometry else {
            return Ok(PlanOutcome::DataMissing(format!(
                "intersection {} has no polygon",
                req.intersection
            )));
        };
        let Some(mut from) = find_marker(store, req.from_road, req.from_marker, &req.intersection)?
        else {
            return Ok(PlanOutcome::DataMissing(format!(
                "no side-center marker for road {} at {}",
                req.from_road.0, req.intersection
            )));
        };
        let Some(mut to) = find_marker(store, req.to_road, req.to_marker, &req.intersection)? else {
            return Ok(PlanOutcome::DataMissing(format!(
                "no side-center marker for road {} at {}",
                req.to_road.0, req.intersection
            )));
        };

        let projection = if store.is_geographic() {
            Projection::from_geometry(&polygon)?
        } else {
            Projection::Identity
        };
        reproject_geometry(&mut polygon, &|pt| projection.to_local(pt));
        projection.to_local_in_place(&mut from);
        projection.to_local_in_place(&mut to);

        let mut path = plan_turn(&from, &to, &req.intersection, &polygon, &vehicle, self.cfg);
        projection.to_wgs84_in_place(&mut path);
        info!(
            "Planned turn from road {} to road {} at {}: {}",
            req.from_road.0, req.to_road.0, req.intersection, path.status
        );
        Ok(PlanOutcome::Planned(path))
    }

    /// Plans the turn and upserts the result when there is one.
    pub fn plan_and_store<S: Datastore + ?Sized>(
        &self,
        store: &mut S,
        req: &TurnRequest,
    ) -> Result<PlanOutcome> {
        let outcome = self.plan(store, req)?;
        match outcome {
            PlanOutcome::Planned(ref path) => store.upsert_turn_path(path)?,
            PlanOutcome::DataMissing(ref reason) => warn!("Can't plan turn: {reason}"),
        }
        Ok(outcome)
    }
}

fn find_marker<S: Datastore + ?Sized>(
    store: &S,
    road: RoadID,
    explicit: Option<MarkerID>,
    intersection: &str,
) -> Result<Option<SideCenterMarker>> {
    let markers = store.side_centers(road)?;
    Ok(markers
        .into_iter()
        .find(|(id, side)| match explicit {
            Some(want) => *id == want,
            None => side.touches(intersection),
        })
        .map(|(_, side)| side))
}

impl Reproject for TurnPath {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        reproject_geometry(&mut self.reference.samples, f);
        reproject_geometry(&mut self.curve.samples, f);
        for pt in &mut self.curve.control_points {
            *pt = f(*pt);
        }
    }
}
