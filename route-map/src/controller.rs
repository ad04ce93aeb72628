use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use geojson::{Feature, FeatureCollection, Geometry};
use log::info;

use route_map_model::{DataOptions, GlyphConfig, RouteConfig};

use crate::projector::BoundingBox;
use crate::render::{MapView, Painter, RouteEvent, RouteEvents, RouteGroup, VisualRoute};
use crate::route::{Route, RowAccessor};
use crate::shape::{ShapeCache, ShapeMeasure};

/// Every route currently on the map, keyed by route id.
pub struct RouteSet {
    config: RouteConfig,
    // The last rows seen, so bindings can change without new data
    input: BTreeMap<String, Vec<usize>>,
    routes: BTreeMap<String, VisualRoute>,
    shapes: Rc<ShapeCache>,
    measure: Box<dyn ShapeMeasure>,
    // Raised while drawing; the owner hands them on through `take_events`
    events: Vec<RouteEvent>,
    // End glyphs waiting on an image, in request order: (route, url)
    waiting: Vec<(String, String)>,
}

impl RouteSet {
    pub fn new(shapes: Rc<ShapeCache>, measure: Box<dyn ShapeMeasure>) -> RouteSet {
        RouteSet {
            config: RouteConfig::default(),
            input: BTreeMap::new(),
            routes: BTreeMap::new(),
            shapes,
            measure,
            events: Vec::new(),
            waiting: Vec::new(),
        }
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    pub fn shapes(&self) -> &Rc<ShapeCache> {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, route: &str) -> Option<&VisualRoute> {
        self.routes.get(route)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VisualRoute)> {
        self.routes.iter()
    }

    pub fn groups(&self) -> BTreeMap<&str, &RouteGroup> {
        self.routes
            .iter()
            .map(|(key, visual)| (key.as_str(), visual.group()))
            .collect()
    }

    /// Throws away every route and builds them again from `rows_by_route`. Fits the view to the
    /// result if autofit is on.
    pub fn reset(
        &mut self,
        rows_by_route: BTreeMap<String, Vec<usize>>,
        data: &dyn RowAccessor,
        config: RouteConfig,
        map: &mut dyn MapView,
    ) {
        self.config = config;
        self.input = rows_by_route;
        self.rebuild(data, map);
        if self.config.autofit {
            self.fit_view(map);
        }
    }

    /// The color, thickness or style bindings or the data options changed, but not the rows.
    pub fn restyle(&mut self, data: &dyn RowAccessor, options: DataOptions, map: &dyn MapView) {
        self.config.data = options;
        self.rebuild(data, map);
    }

    /// Applies a new configuration that doesn't touch the data. Turning autofit on fits the view.
    pub fn update_config(&mut self, config: RouteConfig, map: &mut dyn MapView) {
        let turned_on = !self.config.autofit && config.autofit;
        let glyphs_changed = self.config.glyph != config.glyph;
        self.config.autofit = config.autofit;
        if glyphs_changed {
            self.repaint_glyphs_only(config.glyph);
        }
        if turned_on {
            self.fit_view(map);
        }
    }

    fn rebuild(&mut self, data: &dyn RowAccessor, map: &dyn MapView) {
        let zoom = map.zoom();
        self.waiting.clear();
        self.routes.clear();
        for (key, rows) in &self.input {
            let route = Route::build(rows, data, self.config.data);
            let mut visual = VisualRoute::new(route, zoom);
            visual.transform(map);
            self.routes.insert(key.clone(), visual);
        }
        info!("Built {} routes", self.routes.len());
        self.draw_all_glyphs();
    }

    /// Only glyph settings changed. Route geometry is kept; glyph anchors are recomputed.
    pub fn repaint_glyphs_only(&mut self, glyph: GlyphConfig) {
        self.config.glyph = glyph;
        for visual in self.routes.values_mut() {
            visual.invalidate_glyphs();
        }
        self.waiting.clear();
        self.draw_all_glyphs();
    }

    fn draw_all_glyphs(&mut self) {
        let mut painter = Painter {
            config: &self.config.glyph,
            shapes: &self.shapes,
            measure: &*self.measure,
            events: &mut self.events,
        };
        for (key, visual) in &mut self.routes {
            if let Some(url) = visual.draw_glyphs(key, &mut painter) {
                self.waiting.push((key.clone(), url));
            }
        }
    }

    /// Glyph and bad-shape notifications raised since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<RouteEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn dispatch_events(&mut self, sink: &mut dyn RouteEvents) {
        for event in self.take_events() {
            event.dispatch(sink);
        }
    }

    /// Forwards a map move to every route before returning.
    pub fn transform(&mut self, map: &dyn MapView) {
        for visual in self.routes.values_mut() {
            visual.transform(map);
        }
    }

    pub fn highlight(&mut self, rows: Option<&HashSet<usize>>) {
        for visual in self.routes.values_mut() {
            visual.set_highlight(rows);
        }
    }

    /// One box per non-empty route.
    pub fn bounds(&self) -> Vec<BoundingBox> {
        self.routes
            .values()
            .filter_map(|visual| visual.bound(None))
            .collect()
    }

    /// Boxes around just the selected rows, skipping routes with none selected.
    pub fn bounds_of(&self, rows: &HashSet<usize>) -> Vec<BoundingBox> {
        self.routes
            .values()
            .filter_map(|visual| visual.bound(Some(rows)))
            .collect()
    }

    pub fn fit_view(&self, map: &mut dyn MapView) {
        let bounds = self.bounds();
        if !bounds.is_empty() {
            map.fit_view(&bounds);
        }
    }

    /// Distinct image URLs that end glyphs are waiting on. Await `ShapeCache::resolve` on each,
    /// then call `apply_image`.
    pub fn pending_images(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for (_, url) in &self.waiting {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    /// Replays the end glyphs that were waiting on `url`, in the order they asked. Routes that
    /// asked for a URL that's no longer configured are redrawn with the current configuration.
    pub fn apply_image(&mut self, url: &str) {
        let (ready, still_waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.waiting)
                .into_iter()
                .partition(|(_, waiting_for)| waiting_for == url);
        self.waiting = still_waiting;

        let Some(end) = self.config.glyph.end.clone() else {
            return;
        };
        let mut painter = Painter {
            config: &self.config.glyph,
            shapes: &self.shapes,
            measure: &*self.measure,
            events: &mut self.events,
        };
        for (key, _) in ready {
            let Some(visual) = self.routes.get_mut(&key) else {
                continue;
            };
            match visual.draw_end(&end, &mut painter) {
                // Another image took over the cache in the meantime; wait again
                Some(next) => self.waiting.push((key, next)),
                None => painter.events.on_glyph_created(&key, &visual.group().glyphs),
            }
        }
    }

    /// Every non-empty route as a GeoJSON LineString.
    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::new();
        for (key, visual) in &self.routes {
            let route = visual.route();
            if route.is_empty() {
                continue;
            }
            let coords: Vec<Vec<f64>> = route
                .points
                .iter()
                .map(|p| vec![p.longitude, p.latitude])
                .collect();
            let mut f = Feature::from(Geometry::new(geojson::Value::LineString(coords)));
            f.set_property("route", key.clone());
            f.set_property("points", route.points.len());
            f.set_property("segments", route.num_segments());
            features.push(f);
        }
        features.into_iter().collect()
    }
}
