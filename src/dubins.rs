use std::f64::consts::PI;
use std::fmt;

use geo::Coord;

const EPSILON: f64 = 1e-9;

/// A position with a heading in radians, 0 along +x, counter-clockwise positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(pt: Coord, heading: f64) -> Self {
        Self {
            x: pt.x,
            y: pt.y,
            heading,
        }
    }

    pub fn pt(&self) -> Coord {
        Coord {
            x: self.x,
            y: self.y,
        }
    }
}

/// The maneuver family. L and R are arcs at the minimum radius turning left or right, S is
/// straight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DubinsWord {
    LSL,
    LSR,
    RSL,
    RSR,
    RLR,
    LRL,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Segment {
    Left,
    Straight,
    Right,
}

impl DubinsWord {
    pub const ALL: [DubinsWord; 6] = [
        DubinsWord::LSL,
        DubinsWord::LSR,
        DubinsWord::RSL,
        DubinsWord::RSR,
        DubinsWord::RLR,
        DubinsWord::LRL,
    ];

    fn segments(self) -> [Segment; 3] {
        use Segment::*;
        match self {
            DubinsWord::LSL => [Left, Straight, Left],
            DubinsWord::LSR => [Left, Straight, Right],
            DubinsWord::RSL => [Right, Straight, Left],
            DubinsWord::RSR => [Right, Straight, Right],
            DubinsWord::RLR => [Right, Left, Right],
            DubinsWord::LRL => [Left, Right, Left],
        }
    }
}

impl fmt::Display for DubinsWord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DubinsPath {
    pub word: DubinsWord,
    /// Lengths of the three segments, normalized by the radius
    pub params: [f64; 3],
    pub radius: f64,
}

impl DubinsPath {
    /// Total length in meters
    pub fn length(&self) -> f64 {
        self.params.iter().sum::<f64>() * self.radius
    }
}

/// The shortest path between two poses for a vehicle that only drives forwards and can't turn
/// tighter than `radius`. None only when the radius isn't positive.
pub fn dubins_path(start: Pose, goal: Pose, radius: f64) -> Option<DubinsPath> {
    if !(radius > 0.0) {
        return None;
    }
    let dx = goal.x - start.x;
    let dy = goal.y - start.y;
    let d = dx.hypot(dy) / radius;
    let theta = if d > 0.0 { mod2pi(dy.atan2(dx)) } else { 0.0 };
    let alpha = mod2pi(start.heading - theta);
    let beta = mod2pi(goal.heading - theta);

    DubinsWord::ALL
        .into_iter()
        .filter_map(|word| {
            word_params(word, alpha, beta, d).map(|params| DubinsPath {
                word,
                params,
                radius,
            })
        })
        .min_by(|a, b| a.length().total_cmp(&b.length()))
}

/// Sample a path every `step_m` meters of arc length. The final pose is always included.
pub fn sample_dubins(path: &DubinsPath, start: Pose, radius: f64, step_m: f64) -> Vec<Coord> {
    let total = path.params.iter().sum::<f64>() * radius;
    let mut pts = Vec::new();
    if !(radius > 0.0) {
        return pts;
    }
    let step = if step_m > 0.0 { step_m } else { total.max(1.0) };
    let mut dist = 0.0;
    while dist < total {
        pts.push(pose_along(path, start, radius, dist).pt());
        dist += step;
    }
    pts.push(pose_along(path, start, radius, total).pt());
    pts
}

/// The pose after driving `dist` meters along the path
pub fn pose_along(path: &DubinsPath, start: Pose, radius: f64, dist: f64) -> Pose {
    // Work in the normalized frame: start at the origin, unit radius
    let mut remaining = (dist / radius).max(0.0);
    let mut q = (0.0, 0.0, start.heading);
    for (segment, param) in path.word.segments().into_iter().zip(path.params) {
        let t = remaining.min(param);
        q = step_segment(segment, t, q);
        remaining -= t;
        if remaining <= 0.0 {
            break;
        }
    }
    Pose {
        x: start.x + q.0 * radius,
        y: start.y + q.1 * radius,
        heading: mod2pi(q.2),
    }
}

fn step_segment(segment: Segment, t: f64, (x, y, th): (f64, f64, f64)) -> (f64, f64, f64) {
    match segment {
        Segment::Left => (
            x + (th + t).sin() - th.sin(),
            y - (th + t).cos() + th.cos(),
            th + t,
        ),
        Segment::Right => (
            x - (th - t).sin() + th.sin(),
            y + (th - t).cos() - th.cos(),
            th - t,
        ),
        Segment::Straight => (x + th.cos() * t, y + th.sin() * t, th),
    }
}

fn word_params(word: DubinsWord, alpha: f64, beta: f64, d: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let c_ab = (alpha - beta).cos();

    match word {
        DubinsWord::LSL => {
            let p = checked_sqrt(2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sa - sb))?;
            let tmp = (cb - ca).atan2(d + sa - sb);
            Some([mod2pi(tmp - alpha), p, mod2pi(beta - tmp)])
        }
        DubinsWord::RSR => {
            let p = checked_sqrt(2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sb - sa))?;
            let tmp = (ca - cb).atan2(d - sa + sb);
            Some([mod2pi(alpha - tmp), p, mod2pi(tmp - beta)])
        }
        DubinsWord::LSR => {
            let p = checked_sqrt(-2.0 + d * d + 2.0 * c_ab + 2.0 * d * (sa + sb))?;
            let tmp = (-ca - cb).atan2(d + sa + sb) - (-2.0f64).atan2(p);
            Some([mod2pi(tmp - alpha), p, mod2pi(tmp - beta)])
        }
        DubinsWord::RSL => {
            let p = checked_sqrt(-2.0 + d * d + 2.0 * c_ab - 2.0 * d * (sa + sb))?;
            let tmp = (ca + cb).atan2(d - sa - sb) - 2.0f64.atan2(p);
            Some([mod2pi(alpha - tmp), p, mod2pi(beta - tmp)])
        }
        DubinsWord::RLR => {
            let tmp = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sa - sb)) / 8.0;
            if tmp.abs() > 1.0 {
                return None;
            }
            let phi = (ca - cb).atan2(d - sa + sb);
            let p = mod2pi(2.0 * PI - tmp.acos());
            let t = mod2pi(alpha - phi + mod2pi(p / 2.0));
            Some([t, p, mod2pi(alpha - beta - t + mod2pi(p))])
        }
        DubinsWord::LRL => {
            let tmp = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sb - sa)) / 8.0;
            if tmp.abs() > 1.0 {
                return None;
            }
            let phi = (ca - cb).atan2(d + sa - sb);
            let p = mod2pi(2.0 * PI - tmp.acos());
            let t = mod2pi(-alpha - phi + p / 2.0);
            Some([t, p, mod2pi(mod2pi(beta) - alpha - t + mod2pi(p))])
        }
    }
}

// Rounding noise shouldn't turn a zero-length arc into a full circle
fn mod2pi(angle: f64) -> f64 {
    let a = angle.rem_euclid(2.0 * PI);
    if 2.0 * PI - a < EPSILON {
        0.0
    } else {
        a
    }
}

fn checked_sqrt(value: f64) -> Option<f64> {
    if value < -EPSILON {
        None
    } else {
        Some(value.max(0.0).sqrt())
    }
}
