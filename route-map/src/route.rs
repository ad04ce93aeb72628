use log::debug;
use serde::Serialize;

use route_map_model::{DataOptions, DashStyle, Location, RouteTable};

use crate::projector::{tangents, BoundingBox, Projector, MAX_LATITUDE};

/// How the route builder reads the host's rows.
pub trait RowAccessor {
    /// `None` or NaN means missing
    fn lat(&self, row: usize) -> Option<f64>;
    fn lon(&self, row: usize) -> Option<f64>;
    fn color(&self, row: usize) -> String;
    fn thick(&self, row: usize) -> f64;
    fn style(&self, row: usize) -> DashStyle;
}

impl RowAccessor for RouteTable {
    fn lat(&self, row: usize) -> Option<f64> {
        self.row(row).latitude
    }
    fn lon(&self, row: usize) -> Option<f64> {
        self.row(row).longitude
    }
    fn color(&self, row: usize) -> String {
        self.row(row).color.clone()
    }
    fn thick(&self, row: usize) -> f64 {
        self.row(row).thick
    }
    fn style(&self, row: usize) -> DashStyle {
        self.row(row).style
    }
}

#[derive(Serialize, Clone, Copy, PartialEq, Debug)]
pub struct Point {
    pub row: usize,
    /// Index into the owning route's per-segment arrays
    pub segment: usize,
    pub latitude: f64,
    pub longitude: f64,
    // Reference-zoom pixels, relative to the route's anchor
    pub x: f64,
    pub y: f64,
    pub ux: f64,
    pub uy: f64,
}

/// The validated, segmented and projected form of one route's rows. Never mutated; rebuild it
/// instead.
#[derive(Clone, PartialEq, Debug)]
pub struct Route {
    pub points: Vec<Point>,
    pub color: Vec<String>,
    pub thick: Vec<f64>,
    pub style: Vec<DashStyle>,
    /// Exclusive end index into `points` for each segment
    pub segments: Vec<usize>,
    pub bound: BoundingBox,
}

impl Route {
    pub fn build(rows: &[usize], data: &dyn RowAccessor, options: DataOptions) -> Route {
        let mut points = Vec::new();
        let mut color = Vec::new();
        let mut thick = Vec::new();
        let mut style = Vec::new();
        let mut segments = Vec::new();

        let mut current: Option<(String, f64, DashStyle)> = None;
        for &row in rows {
            let Some((latitude, longitude)) = validate(data.lat(row), data.lon(row), options)
            else {
                continue;
            };
            let key = (data.color(row), data.thick(row), data.style(row));
            if current.as_ref() != Some(&key) {
                // Close the previous run
                if let Some((c, t, s)) = current.take() {
                    color.push(c);
                    thick.push(t);
                    style.push(s);
                    segments.push(points.len());
                }
                current = Some(key);
            }
            points.push(Point {
                row,
                segment: segments.len(),
                latitude,
                longitude,
                x: 0.0,
                y: 0.0,
                ux: 0.0,
                uy: 0.0,
            });
        }
        if let Some((c, t, s)) = current {
            color.push(c);
            thick.push(t);
            style.push(s);
            segments.push(points.len());
        }
        if points.len() < rows.len() {
            debug!("Dropped {} of {} rows", rows.len() - points.len(), rows.len());
        }

        let locations: Vec<Location> = points
            .iter()
            .map(|p| Location::new(p.latitude, p.longitude))
            .collect();
        let projection = Projector::reference().project(&locations);
        for ((pt, pixel), (ux, uy)) in points
            .iter_mut()
            .zip(&projection.points)
            .zip(tangents(&projection.points))
        {
            pt.x = pixel.x;
            pt.y = pixel.y;
            pt.ux = ux;
            pt.uy = uy;
        }

        Route {
            points,
            color,
            thick,
            style,
            segments,
            bound: projection.bound,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Point index range of a segment, without the shared vertex from the previous segment.
    pub fn segment_range(&self, segment: usize) -> std::ops::Range<usize> {
        let start = if segment == 0 {
            0
        } else {
            self.segments[segment - 1]
        };
        start..self.segments[segment]
    }
}

/// Applies the row rules in order, returning the coordinates to keep, or `None` to drop the row.
pub fn validate(lat: Option<f64>, lon: Option<f64>, options: DataOptions) -> Option<(f64, f64)> {
    let (mut lat, mut lon) = (lat?, lon?);
    if lat.is_nan() || lon.is_nan() {
        return None;
    }
    // TODO Confirm with product whether nonzero should only drop rows where both are zero
    if options.nonzero && (lat == 0.0 || lon == 0.0) {
        return None;
    }
    if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&lat) {
        if options.onlyvalid {
            return None;
        }
        lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    }
    if !(-180.0..=180.0).contains(&lon) {
        if options.onlyvalid {
            return None;
        }
        lon = lon.clamp(-180.0, 180.0);
    }
    Some((lat, lon))
}
