use geo::{Coord, Line, LineString, Polygon};

// Planar helpers over raw coordinate slices. A "ring" here never repeats its first point at the
// end; `open_ring` strips that from geo's closed rings.

pub fn distance(a: Coord, b: Coord) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// The exterior of a polygon as an open ring
pub fn open_ring(polygon: &Polygon) -> Vec<Coord> {
    let mut pts = polygon.exterior().0.clone();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

/// Shoelace formula. Positive when the ring is counter-clockwise.
pub fn signed_area(ring: &[Coord]) -> f64 {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// The interior angle in degrees (0 to 360) at `ring[idx]`, using only its immediate neighbors.
/// Returns None for zero-length neighboring edges.
pub fn interior_angle_degrees(ring: &[Coord], idx: usize) -> Option<f64> {
    let n = ring.len();
    if n < 3 {
        return None;
    }
    let pt = ring[idx];
    let prev = ring[(idx + n - 1) % n];
    let next = ring[(idx + 1) % n];
    if distance(pt, prev) == 0.0 || distance(pt, next) == 0.0 {
        return None;
    }
    let to_next = (next.y - pt.y).atan2(next.x - pt.x).to_degrees();
    let to_prev = (prev.y - pt.y).atan2(prev.x - pt.x).to_degrees();
    let ccw_angle = (to_prev - to_next).rem_euclid(360.0);
    if signed_area(ring) >= 0.0 {
        Some(ccw_angle)
    } else {
        Some(360.0 - ccw_angle)
    }
}

/// The unsigned angle in degrees (0 to 180) between the two edges meeting at `ring[idx]`. A
/// reflex corner and a convex corner of the same sharpness have the same value.
pub fn vertex_angle_degrees(ring: &[Coord], idx: usize) -> Option<f64> {
    let n = ring.len();
    if n < 3 {
        return None;
    }
    let pt = ring[idx];
    let a = ring[(idx + n - 1) % n] - pt;
    let b = ring[(idx + 1) % n] - pt;
    let len = a.x.hypot(a.y) * b.x.hypot(b.y);
    if len == 0.0 {
        return None;
    }
    let cos = ((a.x * b.x + a.y * b.y) / len).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// How far an interior angle is from a right angle, either convex (90) or reflex (270).
pub fn right_angle_diff(angle_degrees: f64) -> f64 {
    (angle_degrees - 90.0).abs().min((angle_degrees - 270.0).abs())
}

/// Walk forwards around the ring from `from` to `to`, inclusive of both. When they're equal, the
/// whole ring is returned, closed.
pub fn ring_slice(ring: &[Coord], from: usize, to: usize) -> Vec<Coord> {
    let n = ring.len();
    let mut pts = vec![ring[from]];
    let mut idx = from;
    loop {
        idx = (idx + 1) % n;
        pts.push(ring[idx]);
        if idx == to {
            break;
        }
    }
    pts
}

pub fn polyline_length(pts: &[Coord]) -> f64 {
    pts.windows(2).map(|pair| distance(pair[0], pair[1])).sum()
}

/// The point `dist` along a polyline, clamped to its ends
pub fn point_along(pts: &[Coord], dist: f64) -> Option<Coord> {
    let first = *pts.first()?;
    if dist <= 0.0 {
        return Some(first);
    }
    let mut so_far = 0.0;
    for pair in pts.windows(2) {
        let len = distance(pair[0], pair[1]);
        if so_far + len >= dist && len > 0.0 {
            let frac = (dist - so_far) / len;
            return Some(pair[0] + (pair[1] - pair[0]) * frac);
        }
        so_far += len;
    }
    pts.last().copied()
}

/// The arc-length midpoint of a polyline
pub fn midpoint_along(pts: &[Coord]) -> Option<Coord> {
    point_along(pts, polyline_length(pts) / 2.0)
}

/// The sub-polyline between two distances along
pub fn slice_between(pts: &[Coord], start: f64, end: f64) -> Vec<Coord> {
    let total = polyline_length(pts);
    let start = start.clamp(0.0, total);
    let end = end.clamp(start, total);
    let mut result = Vec::new();
    if let Some(pt) = point_along(pts, start) {
        result.push(pt);
    }
    let mut so_far = 0.0;
    for pair in pts.windows(2) {
        so_far += distance(pair[0], pair[1]);
        if so_far > start && so_far < end {
            result.push(pair[1]);
        }
    }
    if let Some(pt) = point_along(pts, end) {
        result.push(pt);
    }
    result.dedup();
    result
}

pub fn closest_point_on_segment(a: Coord, b: Coord, pt: Coord) -> (Coord, f64) {
    let ab = b - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq == 0.0 {
        return (a, 0.0);
    }
    let t = (((pt.x - a.x) * ab.x + (pt.y - a.y) * ab.y) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Where a point lands on a polyline
#[derive(Clone, Copy, Debug)]
pub struct Projected {
    pub pt: Coord,
    pub dist_along: f64,
    pub dist_away: f64,
    /// Index of the segment containing `pt`
    pub segment: usize,
}

pub fn project_onto_polyline(pts: &[Coord], pt: Coord) -> Option<Projected> {
    let mut best: Option<Projected> = None;
    let mut so_far = 0.0;
    for (segment, pair) in pts.windows(2).enumerate() {
        let (closest, t) = closest_point_on_segment(pair[0], pair[1], pt);
        let len = distance(pair[0], pair[1]);
        let dist_away = distance(closest, pt);
        if best.map(|b| dist_away < b.dist_away).unwrap_or(true) {
            best = Some(Projected {
                pt: closest,
                dist_along: so_far + t * len,
                dist_away,
                segment,
            });
        }
        so_far += len;
    }
    best
}

pub fn distance_to_polyline(pts: &[Coord], pt: Coord) -> f64 {
    if pts.len() == 1 {
        return distance(pts[0], pt);
    }
    project_onto_polyline(pts, pt)
        .map(|p| p.dist_away)
        .unwrap_or(f64::INFINITY)
}

/// Distance from a point to the nearest edge of a polygon, including holes
pub fn distance_to_boundary(polygon: &Polygon, pt: Coord) -> f64 {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring: &LineString| distance_to_polyline(&ring.0, pt))
        .fold(f64::INFINITY, f64::min)
}

pub fn normalize(v: Coord) -> Option<Coord> {
    let len = v.x.hypot(v.y);
    if len == 0.0 || !len.is_finite() {
        return None;
    }
    Some(v / len)
}

pub fn project_away(pt: Coord, angle_degrees: f64, distance: f64) -> Coord {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    Coord {
        x: pt.x + distance * cos,
        y: pt.y + distance * sin,
    }
}

/// Where two bounded segments cross, and the fraction along `line1` where it happens. Parallel
/// segments never cross.
// https://stackoverflow.com/a/565282
pub fn segments_intersection(line1: Line, line2: Line) -> Option<(Coord, f64)> {
    fn cross(a: Coord, b: Coord) -> f64 {
        a.x * b.y - a.y * b.x
    }

    let r = line1.end - line1.start;
    let s = line2.end - line2.start;
    let r_cross_s = cross(r, s);
    if r_cross_s == 0.0 {
        return None;
    }
    let q_minus_p = line2.start - line1.start;
    let t = cross(q_minus_p, s) / r_cross_s;
    let u = cross(q_minus_p, r) / r_cross_s;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }
    Some((line1.start + r * t, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    fn square() -> Vec<Coord> {
        vec![
            coord! { x: 0., y: 0. },
            coord! { x: 10., y: 0. },
            coord! { x: 10., y: 10. },
            coord! { x: 0., y: 10. },
        ]
    }

    #[test]
    fn test_interior_angles_either_orientation() {
        let ccw = square();
        for idx in 0..4 {
            assert!((interior_angle_degrees(&ccw, idx).unwrap() - 90.0).abs() < 1e-9);
        }
        let mut cw = square();
        cw.reverse();
        for idx in 0..4 {
            assert!((interior_angle_degrees(&cw, idx).unwrap() - 90.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reflex_angle() {
        // An L shape; (5, 5) is the reflex corner
        let ring = vec![
            coord! { x: 0., y: 0. },
            coord! { x: 10., y: 0. },
            coord! { x: 10., y: 5. },
            coord! { x: 5., y: 5. },
            coord! { x: 5., y: 10. },
            coord! { x: 0., y: 10. },
        ];
        assert!((interior_angle_degrees(&ring, 3).unwrap() - 270.0).abs() < 1e-9);
        assert!((vertex_angle_degrees(&ring, 3).unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(right_angle_diff(268.0), 2.0);
        assert_eq!(right_angle_diff(100.0), 10.0);
    }

    #[test]
    fn test_ring_slice_wraps() {
        let ring = square();
        assert_eq!(ring_slice(&ring, 3, 1), vec![ring[3], ring[0], ring[1]]);
        assert_eq!(ring_slice(&ring, 1, 2), vec![ring[1], ring[2]]);
    }

    #[test]
    fn test_midpoint_of_bent_edge() {
        let pts = vec![
            coord! { x: 0., y: 0. },
            coord! { x: 4., y: 0. },
            coord! { x: 4., y: 4. },
        ];
        let mid = midpoint_along(&pts).unwrap();
        assert_eq!(mid, coord! { x: 4., y: 0. });
        let projected = project_onto_polyline(&pts, mid).unwrap();
        assert!(projected.dist_away < 1e-9);
        assert!((projected.dist_along - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_slice_between() {
        let pts = vec![
            coord! { x: 0., y: 0. },
            coord! { x: 10., y: 0. },
            coord! { x: 10., y: 10. },
        ];
        let slice = slice_between(&pts, 5.0, 15.0);
        assert_eq!(
            slice,
            vec![
                coord! { x: 5., y: 0. },
                coord! { x: 10., y: 0. },
                coord! { x: 10., y: 5. }
            ]
        );
    }

    #[test]
    fn test_distance_to_boundary() {
        let poly = polygon![(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)];
        assert!((distance_to_boundary(&poly, coord! { x: 5., y: 3. }) - 3.0).abs() < 1e-9);
        assert!((distance_to_boundary(&poly, coord! { x: 15., y: 5. }) - 5.0).abs() < 1e-9);
        assert_eq!(open_ring(&poly).len(), 4);
    }

    #[test]
    fn test_segments_intersection() {
        let a = Line::new(coord! { x: 0., y: 0. }, coord! { x: 10., y: 0. });
        let b = Line::new(coord! { x: 4., y: -1. }, coord! { x: 4., y: 1. });
        let (pt, frac) = segments_intersection(a, b).unwrap();
        assert!((pt.x - 4.0).abs() < 1e-9);
        assert!((frac - 0.4).abs() < 1e-9);

        let c = Line::new(coord! { x: 14., y: -1. }, coord! { x: 14., y: 1. });
        assert!(segments_intersection(a, c).is_none());
        assert!(segments_intersection(a, a).is_none());

        let away = project_away(coord! { x: 1., y: 1. }, 90.0, 3.0);
        assert!((away.x - 1.0).abs() < 1e-9 && (away.y - 4.0).abs() < 1e-9);
    }
}
