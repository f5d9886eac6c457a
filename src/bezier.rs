use geo::Coord;

/// A point on the cubic Bézier curve defined by four control points, at parameter `t` in [0, 1].
pub fn bezier_point(p0: Coord, p1: Coord, p2: Coord, p3: Coord, t: f64) -> Coord {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Coord {
        x: a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        y: a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    }
}

/// `n + 1` points, evenly spaced in `t` (not in arc length). The first and last are exactly `p0`
/// and `p3`.
pub fn sample_bezier(p0: Coord, p1: Coord, p2: Coord, p3: Coord, n: usize) -> Vec<Coord> {
    let n = n.max(1);
    (0..=n)
        .map(|i| {
            if i == 0 {
                p0
            } else if i == n {
                p3
            } else {
                bezier_point(p0, p1, p2, p3, i as f64 / n as f64)
            }
        })
        .collect()
}
