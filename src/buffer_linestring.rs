use geo::algorithm::buffer::{BufferStyle, LineCap, LineJoin};
use geo::{Area, Buffer, LineString, Polygon};

/// Buffer a linestring symmetrically by `half_width`, with square end caps and mitred joins. A
/// mitre that would poke out further than `miter_threshold` from the bend is bevelled instead.
pub fn buffer_linestring(
    linestring: &LineString,
    half_width: f64,
    miter_threshold: f64,
) -> Option<Polygon> {
    if half_width <= 0.0 {
        return None;
    }
    let mut pts = linestring.0.clone();
    pts.dedup();
    if pts.len() < 2 {
        return None;
    }

    let style = BufferStyle::new(half_width)
        .line_cap(LineCap::Square)
        .line_join(LineJoin::Miter(min_miter_angle(half_width, miter_threshold)));
    LineString::new(pts)
        .buffer_with_style(style)
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

// A mitre at a corner with angle `a` reaches `half_width / sin(a / 2)` from the bend, so sharper
// corners than this get bevelled.
fn min_miter_angle(half_width: f64, miter_threshold: f64) -> f64 {
    if miter_threshold <= half_width {
        return std::f64::consts::PI;
    }
    2.0 * (half_width / miter_threshold).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string, BoundingRect, Contains, Point};

    use crate::ring::point_along;

    #[test]
    fn test_square_caps() {
        let input = line_string![(x: 0., y: 0.), (x: 10., y: 0.)];
        let poly = buffer_linestring(&input, 2.0, 10.0).unwrap();
        // 14 x 4
        assert!((poly.unsigned_area() - 56.0).abs() < 1e-3);
        let rect = poly.bounding_rect().unwrap();
        assert!((rect.min().x + 2.0).abs() < 1e-3);
        assert!((rect.max().x - 12.0).abs() < 1e-3);
    }

    #[test]
    fn test_sharp_bend_covers_centerline() {
        // Doubles back on itself at (30, 0)
        let input = line_string![(x: 0., y: 0.), (x: 30., y: 0.), (x: 0., y: 8.)];
        let poly = buffer_linestring(&input, 5.5, 10.0).unwrap();
        let total = 30.0 + 30.0_f64.hypot(8.0);
        for i in 0..=60 {
            let pt = point_along(&input.0, total * i as f64 / 60.0).unwrap();
            assert!(poly.contains(&Point::from(pt)), "{pt:?} isn't covered");
        }
        // Bevelled, but still past the bend
        assert!(poly.contains(&Point::from(coord! { x: 30.5, y: 0. })));
    }

    #[test]
    fn test_degenerate() {
        let input = line_string![(x: 3., y: 3.), (x: 3., y: 3.)];
        assert!(buffer_linestring(&input, 2.0, 10.0).is_none());
        let input = line_string![(x: 0., y: 0.), (x: 1., y: 0.)];
        assert!(buffer_linestring(&input, 0.0, 10.0).is_none());
    }
}
