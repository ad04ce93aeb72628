use route_map_model::Direction;

use crate::route::{Point, Route};

/// Anchors for middle glyphs. With `interval <= 1` every interior vertex gets one; otherwise the
/// polyline is walked and a glyph is dropped each time the distance since the last one exceeds
/// `total_length / num_points * interval`. The first and last points never get a middle glyph.
pub fn middle_points(route: &Route, interval: f64) -> Vec<Point> {
    let pts = &route.points;
    if pts.len() <= 2 {
        return Vec::new();
    }
    if interval <= 1.0 || interval.is_nan() {
        return pts[1..pts.len() - 1].to_vec();
    }

    let lengths: Vec<f64> = pts
        .windows(2)
        .map(|pair| {
            let dx = pair[0].x - pair[1].x;
            let dy = pair[0].y - pair[1].y;
            (dx * dx + dy * dy).sqrt()
        })
        .collect();
    let total: f64 = lengths.iter().sum();
    let step = total / pts.len() as f64 * interval;

    let mut result = Vec::new();
    let mut dist = lengths[0];
    for curr in 1..pts.len() - 1 {
        if dist > step {
            result.push(pts[curr]);
            dist = lengths[curr];
        } else {
            dist += lengths[curr];
        }
    }
    result
}

pub fn start_point(route: &Route) -> Option<Point> {
    route.points.first().copied()
}

pub fn end_point(route: &Route) -> Option<Point> {
    route.points.last().copied()
}

/// Heading of the tangent in degrees, clockwise from east in screen space.
pub fn heading(pt: &Point) -> f64 {
    pt.uy.atan2(pt.ux).to_degrees()
}

/// Rotation for an end glyph drawn pointing `direction`, so it follows the route.
pub fn end_rotation(pt: &Point, direction: Direction) -> f64 {
    let offset = match direction {
        Direction::Right => 0.0,
        Direction::Up => 90.0,
        Direction::Left => 180.0,
        Direction::Down => 270.0,
    };
    heading(pt) + offset
}

/// A chevron pointing along the tangent, centered on the origin.
pub fn arrow_path(pt: &Point, size: f64) -> String {
    let (ux, uy) = (pt.ux, pt.uy);
    let (x1, y1) = (-uy * size, ux * size);
    let (x2, y2) = (uy * size, -ux * size);
    let (tx, ty) = (ux * size * 2.0, uy * size * 2.0);
    format!("M {},{} {},{} {},{}", x1, y1, tx, ty, x2, y2)
}
