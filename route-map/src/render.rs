use std::collections::HashSet;

use geo::Coord;
use log::debug;
use serde::Serialize;

use route_map_model::{DashStyle, EndGlyph, EndShape, GlyphConfig, Location};

use crate::glyph::{arrow_path, end_point, end_rotation, heading, middle_points, start_point};
use crate::projector::{factor, BoundingBox, Projector};
use crate::route::{Point, Route};
use crate::shape::{builtin, image_markup, Dimensions, ImageLookup, ShapeCache, ShapeMeasure};

/// Segments and glyphs of routes outside the current selection.
pub const GRAY: &str = "#aaaaaa";

/// The host's map: current zoom, where locations land on screen, and view fitting.
pub trait MapView {
    fn zoom(&self) -> f64;
    /// Screen pixel of a location at the current zoom and pan
    fn pixel(&self, loc: Location) -> Coord;
    fn fit_view(&mut self, bounds: &[BoundingBox]);
}

/// Notifications for host-owned chrome: tooltips and the bad-shape banner.
pub trait RouteEvents {
    fn on_glyph_created(&mut self, _route: &str, _glyphs: &[Glyph]) {}
    fn on_bad_shape(&mut self, _bad: bool) {}
}

/// A notification held back until the caller is done mutating routes, so host handlers can
/// safely read the scene again.
#[derive(Clone, PartialEq, Debug)]
pub enum RouteEvent {
    GlyphCreated { route: String, glyphs: Vec<Glyph> },
    BadShape(bool),
}

impl RouteEvent {
    pub fn dispatch(self, sink: &mut dyn RouteEvents) {
        match self {
            RouteEvent::GlyphCreated { route, glyphs } => sink.on_glyph_created(&route, &glyphs),
            RouteEvent::BadShape(bad) => sink.on_bad_shape(bad),
        }
    }
}

impl RouteEvents for Vec<RouteEvent> {
    fn on_glyph_created(&mut self, route: &str, glyphs: &[Glyph]) {
        self.push(RouteEvent::GlyphCreated {
            route: route.to_string(),
            glyphs: glyphs.to_vec(),
        });
    }

    fn on_bad_shape(&mut self, bad: bool) {
        self.push(RouteEvent::BadShape(bad));
    }
}

/// Dash lengths as multiples of the stroke width, so dashes look the same at every zoom.
pub fn dash_pattern(style: DashStyle, width: f64) -> Vec<f64> {
    let units: &[f64] = match style {
        DashStyle::Solid => &[],
        DashStyle::Dash => &[4.0, 2.0],
        DashStyle::Dot => &[1.0, 2.0],
        DashStyle::DashDot => &[4.0, 2.0, 1.0, 2.0],
        DashStyle::LongDash => &[8.0, 3.0],
    };
    units.iter().map(|u| u * width).collect()
}

/// `None` for solid lines
pub fn dash_array(style: DashStyle, width: f64) -> Option<String> {
    let pattern = dash_pattern(style, width);
    if pattern.is_empty() {
        return None;
    }
    Some(
        pattern
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct SegmentPath {
    pub segment: usize,
    /// Reference-zoom pixels relative to the route anchor. Never changes with zoom.
    pub d: String,
    pub stroke: String,
    pub stroke_width: f64,
    pub dash_array: Option<String>,
    pub scale: f64,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub enum GlyphKind {
    Start { radius: f64 },
    Middle { d: String },
    End(EndMark),
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct EndMark {
    pub markup: String,
    /// Degrees
    pub rotate: Option<f64>,
    pub scale: f64,
    pub icon_width: f64,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct Glyph {
    pub kind: GlyphKind,
    pub row: usize,
    pub segment: usize,
    pub fill: String,
    /// Screen offset from the route anchor at the current zoom
    pub translate: (f64, f64),
    #[serde(skip)]
    anchor: (f64, f64),
}

/// Everything needed to draw one route: one group translated to the route's anchor.
#[derive(Serialize, Clone, PartialEq, Debug, Default)]
pub struct RouteGroup {
    pub translate: (f64, f64),
    /// Back to front, so earlier segments are drawn on top
    pub segments: Vec<SegmentPath>,
    pub glyphs: Vec<Glyph>,
}

/// What glyph drawing needs from the route set.
pub struct Painter<'a> {
    pub config: &'a GlyphConfig,
    pub shapes: &'a ShapeCache,
    pub measure: &'a dyn ShapeMeasure,
    pub events: &'a mut dyn RouteEvents,
}

pub struct VisualRoute {
    route: Route,
    zoom: f64,
    // Route color, or dimmed because it's outside the selection
    shown: bool,
    middle: Option<Vec<Point>>,
    group: RouteGroup,
}

impl VisualRoute {
    pub fn new(route: Route, zoom: f64) -> VisualRoute {
        let mut visual = VisualRoute {
            route,
            zoom,
            shown: true,
            middle: None,
            group: RouteGroup::default(),
        };
        visual.draw_route();
        visual
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn group(&self) -> &RouteGroup {
        &self.group
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// The route's extent, or the extent of just the selected rows. `None` if nothing is selected.
    pub fn bound(&self, rows: Option<&HashSet<usize>>) -> Option<BoundingBox> {
        if self.route.is_empty() {
            return None;
        }
        let Some(rows) = rows else {
            return Some(self.route.bound);
        };
        let locs: Vec<Location> = self
            .route
            .points
            .iter()
            .filter(|p| rows.contains(&p.row))
            .map(|p| Location::new(p.latitude, p.longitude))
            .collect();
        if locs.is_empty() {
            return None;
        }
        Some(Projector::reference().project(&locs).bound)
    }

    /// Follows a map move. Zoom changes only touch scales and widths; panning only the translation.
    pub fn transform(&mut self, map: &dyn MapView) {
        let zoom = map.zoom();
        if zoom != self.zoom {
            self.rescale(zoom);
        }
        let origin = map.pixel(self.route.bound.anchor);
        self.group.translate = (origin.x, origin.y);
    }

    pub fn rescale(&mut self, zoom: f64) {
        self.zoom = zoom;
        let factor = factor(zoom);
        for path in &mut self.group.segments {
            let width = self.route.thick[path.segment] / factor;
            path.scale = factor;
            path.stroke_width = width;
            path.dash_array = dash_array(self.route.style[path.segment], width);
        }
        for glyph in &mut self.group.glyphs {
            glyph.translate = (glyph.anchor.0 * factor, glyph.anchor.1 * factor);
        }
    }

    /// Dims the whole route unless its first row is selected. `None` shows everything.
    pub fn set_highlight(&mut self, rows: Option<&HashSet<usize>>) {
        self.shown = match (rows, self.route.points.first()) {
            (None, _) => true,
            (Some(rows), Some(first)) => rows.contains(&first.row),
            (Some(_), None) => false,
        };
        let strokes: Vec<String> = self
            .group
            .segments
            .iter()
            .map(|p| self.color(p.segment))
            .collect();
        for (path, stroke) in self.group.segments.iter_mut().zip(strokes) {
            path.stroke = stroke;
        }
        let fills: Vec<String> = self
            .group
            .glyphs
            .iter()
            .map(|g| self.color(g.segment))
            .collect();
        for (glyph, fill) in self.group.glyphs.iter_mut().zip(fills) {
            glyph.fill = fill;
        }
    }

    fn color(&self, segment: usize) -> String {
        if self.shown {
            self.route.color[segment].clone()
        } else {
            GRAY.to_string()
        }
    }

    fn draw_route(&mut self) {
        let pts = &self.route.points;
        let mut segments = Vec::with_capacity(self.route.num_segments());
        for segment in (0..self.route.num_segments()).rev() {
            // Start from the previous segment's last point, so neighbors join without a gap
            let range = self.route.segment_range(segment);
            let first = range.start.saturating_sub(1);
            let last = range.end - 1;
            let mut d = format!("M {} {}", pts[first].x, pts[first].y);
            for pt in &pts[(first + 1).min(last)..last] {
                d.push_str(&format!(" L {} {}", pt.x, pt.y));
            }
            d.push_str(&format!(" L {} {}", pts[last].x, pts[last].y));
            segments.push(SegmentPath {
                segment,
                d,
                stroke: self.color(segment),
                stroke_width: 0.0,
                dash_array: None,
                scale: 1.0,
            });
        }
        self.group.segments = segments;
        self.rescale(self.zoom);
    }

    /// Glyph anchors change with the route or the interval, never with zoom.
    pub fn invalidate_glyphs(&mut self) {
        self.middle = None;
    }

    /// Redraws every glyph. Returns the image URL the end glyph is waiting on, if any.
    pub fn draw_glyphs(&mut self, key: &str, painter: &mut Painter) -> Option<String> {
        self.group.glyphs.clear();
        let config = painter.config;
        let first = start_point(&self.route)?;
        if !config.active(first.row) {
            return None;
        }

        let mut pending = None;
        if let Some(middle) = &config.middle {
            let middle_pts = self
                .middle
                .get_or_insert_with(|| middle_points(&self.route, middle.interval))
                .clone();
            for pt in middle_pts {
                let size = middle.scale * self.route.thick[pt.segment];
                self.push_glyph(
                    &pt,
                    GlyphKind::Middle {
                        d: arrow_path(&pt, size),
                    },
                );
            }
        }
        if let Some(start) = &config.start {
            let radius = start.scale * self.route.thick[first.segment] / 2.0;
            self.push_glyph(&first, GlyphKind::Start { radius });
        }
        if let Some(end) = &config.end {
            pending = self.draw_end(end, painter);
        }
        painter.events.on_glyph_created(key, &self.group.glyphs);
        pending
    }

    /// Draws just the end glyph, replacing any previous one. Used again once an image arrives.
    pub fn draw_end(&mut self, end: &EndGlyph, painter: &mut Painter) -> Option<String> {
        self.group
            .glyphs
            .retain(|g| !matches!(g.kind, GlyphKind::End(_)));
        let pt = end_point(&self.route)?;
        let size = end.scale * self.route.thick[pt.segment];

        let (markup, rotate, icon_width) = match &end.shape {
            EndShape::Builtin(name) => {
                let shape = builtin(*name);
                let rotate = shape.directional.then(|| heading(&pt) + 90.0);
                (shape.markup.to_string(), rotate, shape.width)
            }
            EndShape::Custom(markup) => match painter.shapes.measure_markup(markup, painter.measure)
            {
                Ok(dims) => (
                    markup.clone(),
                    Some(end_rotation(&pt, end.direction)),
                    icon_width(dims, end),
                ),
                Err(_) => {
                    painter.events.on_bad_shape(true);
                    return None;
                }
            },
            EndShape::Image(url) => match painter.shapes.request(url) {
                ImageLookup::Ready(dims) => (
                    image_markup(url, dims),
                    Some(end_rotation(&pt, end.direction)),
                    icon_width(dims, end),
                ),
                ImageLookup::Failed => {
                    painter.events.on_bad_shape(true);
                    return None;
                }
                ImageLookup::Fetching => {
                    debug!("End glyph waits for {}", url);
                    return Some(url.clone());
                }
            },
        };
        painter.events.on_bad_shape(false);
        self.push_glyph(
            &pt,
            GlyphKind::End(EndMark {
                markup,
                rotate,
                scale: size / icon_width,
                icon_width,
            }),
        );
        None
    }

    fn push_glyph(&mut self, pt: &Point, kind: GlyphKind) {
        let factor = factor(self.zoom);
        self.group.glyphs.push(Glyph {
            kind,
            row: pt.row,
            segment: pt.segment,
            fill: self.color(pt.segment),
            translate: (pt.x * factor, pt.y * factor),
            anchor: (pt.x, pt.y),
        });
    }
}

fn icon_width(dims: Dimensions, end: &EndGlyph) -> f64 {
    if end.direction.is_vertical() {
        dims.width
    } else {
        dims.height
    }
}
