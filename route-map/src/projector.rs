use std::f64::consts::PI;

use geo::{BoundingRect, Coord, LineString};
use serde::Serialize;

use route_map_model::Location;

/// Every route is projected once at this zoom, then rescaled for the live zoom.
pub const REFERENCE_ZOOM: f64 = 20.0;
pub const TILE_SIZE: f64 = 256.0;
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Tangent used when a route has no two distinct points.
pub const DEFAULT_TANGENT: (f64, f64) = (0.0, 1.0);

/// Where a route sits: `anchor` is the north-west corner of its extent, `margin` the extent
/// itself in reference-zoom pixels.
#[derive(Serialize, Clone, Copy, PartialEq, Debug)]
pub struct BoundingBox {
    pub anchor: Location,
    pub margin: Margin,
}

#[derive(Serialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct Margin {
    pub width: f64,
    pub height: f64,
}

pub struct Projection {
    pub bound: BoundingBox,
    /// Pixel positions relative to the anchor, at the projector's zoom
    pub points: Vec<Coord>,
}

/// Spherical web mercator at one fixed zoom level.
#[derive(Clone, Copy, Debug)]
pub struct Projector {
    zoom: f64,
    size: f64,
}

impl Projector {
    pub fn new(zoom: f64) -> Projector {
        Projector {
            zoom,
            size: TILE_SIZE * 2f64.powf(zoom),
        }
    }

    pub fn reference() -> Projector {
        Projector::new(REFERENCE_ZOOM)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pixel(&self, loc: Location) -> Coord {
        let lat = loc.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let sin = (lat * PI / 180.0).sin();
        let x = (loc.longitude + 180.0) / 360.0 * self.size;
        let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * self.size;
        Coord { x, y }
    }

    pub fn location(&self, pixel: Coord) -> Location {
        let longitude = pixel.x / self.size * 360.0 - 180.0;
        let y = 0.5 - pixel.y / self.size;
        let latitude = 90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI;
        Location {
            latitude,
            longitude,
        }
    }

    /// Projects a polyline. An empty polyline gets a zero-sized box at the map origin.
    pub fn project(&self, locations: &[Location]) -> Projection {
        let pixels: Vec<Coord> = locations.iter().map(|loc| self.pixel(*loc)).collect();
        let Some(rect) = LineString::new(pixels.clone()).bounding_rect() else {
            return Projection {
                bound: BoundingBox {
                    anchor: self.location(Coord { x: 0.0, y: 0.0 }),
                    margin: Margin::default(),
                },
                points: Vec::new(),
            };
        };
        let min = rect.min();
        Projection {
            bound: BoundingBox {
                anchor: self.location(min),
                margin: Margin {
                    width: rect.width(),
                    height: rect.height(),
                },
            },
            points: pixels.into_iter().map(|pt| pt - min).collect(),
        }
    }

    /// Multiplier turning distances at this projector's zoom into distances at `zoom`.
    pub fn factor(&self, zoom: f64) -> f64 {
        2f64.powf(zoom - self.zoom)
    }
}

/// The reference-zoom factor for `zoom`.
pub fn factor(zoom: f64) -> f64 {
    Projector::reference().factor(zoom)
}

/// Normalized direction from `p1` to `p2`. Coincident points keep the `previous` direction.
pub fn unit_tangent(p1: Coord, p2: Coord, previous: (f64, f64)) -> (f64, f64) {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 || !len.is_finite() {
        return previous;
    }
    (dx / len, dy / len)
}

/// The tangent at every point: towards the next distinct point, and the last one repeats.
pub fn tangents(points: &[Coord]) -> Vec<(f64, f64)> {
    let mut current = DEFAULT_TANGENT;
    let mut result = Vec::with_capacity(points.len());
    for (idx, pt) in points.iter().enumerate() {
        if let Some(next) = points.get(idx + 1) {
            current = unit_tangent(*pt, *next, current);
        }
        result.push(current);
    }
    result
}

impl BoundingBox {
    /// Extent in reference-zoom pixels: (min, max).
    pub fn pixel_extent(&self) -> (Coord, Coord) {
        let min = Projector::reference().pixel(self.anchor);
        let max = min
            + Coord {
                x: self.margin.width,
                y: self.margin.height,
            };
        (min, max)
    }

    pub fn union(boxes: &[BoundingBox]) -> Option<BoundingBox> {
        let mut extent: Option<(Coord, Coord)> = None;
        for b in boxes {
            let (lo, hi) = b.pixel_extent();
            extent = Some(match extent {
                None => (lo, hi),
                Some((min, max)) => (
                    Coord {
                        x: min.x.min(lo.x),
                        y: min.y.min(lo.y),
                    },
                    Coord {
                        x: max.x.max(hi.x),
                        y: max.y.max(hi.y),
                    },
                ),
            });
        }
        let (min, max) = extent?;
        Some(BoundingBox {
            anchor: Projector::reference().location(min),
            margin: Margin {
                width: max.x - min.x,
                height: max.y - min.y,
            },
        })
    }
}
