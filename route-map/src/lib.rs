use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Once;

use futures::future::{FutureExt, LocalBoxFuture};
use geo::Coord;
use js_sys::{Function, Promise, Reflect};
use log::{info, warn};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use route_map_model::{LegendConfig, Location, RouteConfig, RouteTable};

pub use controller::RouteSet;
pub use legend::{Legend, TextMeasure};
pub use projector::{factor, BoundingBox, Projector, REFERENCE_ZOOM};
pub use render::{MapView, RouteEvents, VisualRoute};
pub use route::{Point, Route, RowAccessor};
pub use shape::{Dimensions, ImageLoader, ShapeCache, ShapeError, ShapeMeasure};
pub use view::StaticView;

pub mod controller;
pub mod glyph;
pub mod legend;
pub mod projector;
pub mod render;
pub mod route;
pub mod shape;
pub mod svg;
pub mod view;


static START: Once = Once::new();

/// The route map as seen from a browser host. The host owns the map control and the DOM; this
/// owns the routes and legend and hands back what to draw.
#[wasm_bindgen]
pub struct JsRouteMap {
    table: RouteTable,
    routes: Rc<RefCell<RouteSet>>,
    legend: Legend,
    view: JsMapView,
    host: Host,
}

#[wasm_bindgen]
impl JsRouteMap {
    /// `host` is an object with the callbacks `project`, `fitView`, `measureText`,
    /// `measureShape` and `loadImage`, and optionally `onGlyphCreated`, `onBadShape` and
    /// `redraw`.
    #[wasm_bindgen(constructor)]
    pub fn new(host: JsValue, zoom: f64) -> Result<JsRouteMap, JsValue> {
        START.call_once(|| {
            // Panics shouldn't happen, but if they do, console.log them.
            console_error_panic_hook::set_once();
            let _ = console_log::init_with_level(log::Level::Info);
        });

        let host = Host {
            project: required(&host, "project")?,
            fit_view: required(&host, "fitView")?,
            measure_text: required(&host, "measureText")?,
            measure_shape: required(&host, "measureShape")?,
            load_image: required(&host, "loadImage")?,
            on_glyph_created: optional(&host, "onGlyphCreated")?,
            on_bad_shape: optional(&host, "onBadShape")?,
            redraw: optional(&host, "redraw")?,
        };
        let shapes = Rc::new(ShapeCache::new(Box::new(host.clone())));
        let routes = RouteSet::new(shapes, Box::new(host.clone()));
        Ok(JsRouteMap {
            table: RouteTable::default(),
            routes: Rc::new(RefCell::new(routes)),
            legend: Legend::new(),
            view: JsMapView {
                zoom,
                host: host.clone(),
            },
            host,
        })
    }

    /// Replaces every row and the route configuration, rebuilding all routes. The caller should
    /// redraw.
    pub fn reset(&mut self, rows: JsValue, config: JsValue) -> Result<(), JsValue> {
        self.table = RouteTable {
            rows: serde_wasm_bindgen::from_value(rows)?,
        };
        let config: RouteConfig = serde_wasm_bindgen::from_value(config)?;
        info!("Resetting with {} rows", self.table.rows.len());
        self.routes.borrow_mut().reset(
            self.table.group_by_route(),
            &self.table,
            config,
            &mut self.view,
        );
        self.flush_events();
        self.load_pending_images();
        Ok(())
    }

    /// Updates configuration without new rows. Rebuilds routes only if the data options changed.
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&mut self, input: JsValue) {
        match serde_wasm_bindgen::from_value::<RouteConfig>(input) {
            Ok(config) => {
                let mut routes = self.routes.borrow_mut();
                if routes.config().data != config.data {
                    routes.restyle(&self.table, config.data, &self.view);
                }
                routes.update_config(config, &mut self.view);
            }
            Err(err) => {
                warn!("Bad input to setConfig: {}", err);
            }
        }
        self.flush_events();
        self.load_pending_images();
    }

    #[wasm_bindgen(js_name = setLegend)]
    pub fn set_legend(&mut self, input: JsValue) {
        match serde_wasm_bindgen::from_value::<LegendConfig>(input) {
            Ok(config) => self.legend.update(config, &self.host),
            Err(err) => {
                warn!("Bad input to setLegend: {}", err);
            }
        }
    }

    /// Call on every map move, with the zoom after the move.
    #[wasm_bindgen(js_name = onTransform)]
    pub fn on_transform(&mut self, zoom: f64) {
        self.view.zoom = zoom;
        self.routes.borrow_mut().transform(&self.view);
    }

    /// Dims every route outside `rows`. Pass nothing to show all.
    pub fn highlight(&mut self, rows: Option<Vec<u32>>) {
        let rows: Option<HashSet<usize>> =
            rows.map(|rows| rows.into_iter().map(|r| r as usize).collect());
        self.routes.borrow_mut().highlight(rows.as_ref());
    }

    #[wasm_bindgen(js_name = fitView)]
    pub fn fit_view(&mut self) {
        self.routes.borrow().fit_view(&mut self.view);
    }

    #[wasm_bindgen(js_name = renderRoutes)]
    pub fn render_routes(&self) -> Result<JsValue, JsValue> {
        to_js(&self.routes.borrow().groups())
    }

    #[wasm_bindgen(js_name = renderLegend)]
    pub fn render_legend(&self) -> Result<JsValue, JsValue> {
        to_js(self.legend.items())
    }

    #[wasm_bindgen(js_name = legendHeight)]
    pub fn legend_height(&self) -> f64 {
        self.legend.height()
    }

    #[wasm_bindgen(js_name = legendTop)]
    pub fn legend_top(&self, view_height: f64) -> f64 {
        self.legend.offset_top(view_height)
    }

    pub fn bounds(&self) -> Result<JsValue, JsValue> {
        to_js(&self.routes.borrow().bounds())
    }

    #[wasm_bindgen(js_name = toGeojson)]
    pub fn to_geojson(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.routes.borrow().to_geojson()).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = toSvg)]
    pub fn to_svg(&self, width: f64, height: f64) -> String {
        svg::to_svg(&self.routes.borrow(), &self.legend, width, height)
    }
}

impl JsRouteMap {
    // Host handlers may read the scene again, so they only run once the routes are released
    fn flush_events(&self) {
        let events = self.routes.borrow_mut().take_events();
        let mut host = self.host.clone();
        for event in events {
            event.dispatch(&mut host);
        }
    }

    // Every end glyph waiting on an image is redrawn when its load finishes
    fn load_pending_images(&self) {
        let urls = self.routes.borrow().pending_images();
        for url in urls {
            let routes = Rc::clone(&self.routes);
            let mut host = self.host.clone();
            spawn_local(async move {
                let shapes = Rc::clone(routes.borrow().shapes());
                let _ = shapes.resolve(&url).await;
                let events = {
                    let mut routes = routes.borrow_mut();
                    routes.apply_image(&url);
                    routes.take_events()
                };
                for event in events {
                    event.dispatch(&mut host);
                }
                if let Some(redraw) = &host.redraw {
                    let _ = redraw.call0(&JsValue::NULL);
                }
            });
        }
    }
}

#[derive(Clone)]
struct Host {
    project: Function,
    fit_view: Function,
    measure_text: Function,
    measure_shape: Function,
    load_image: Function,
    on_glyph_created: Option<Function>,
    on_bad_shape: Option<Function>,
    redraw: Option<Function>,
}

struct JsMapView {
    zoom: f64,
    host: Host,
}

impl MapView for JsMapView {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn pixel(&self, loc: Location) -> Coord {
        let result = to_js(&loc)
            .and_then(|arg| self.host.project.call1(&JsValue::NULL, &arg))
            .and_then(|pixel| serde_wasm_bindgen::from_value::<Pixel>(pixel).map_err(JsValue::from));
        match result {
            Ok(pixel) => Coord {
                x: pixel.x,
                y: pixel.y,
            },
            Err(err) => {
                warn!("project failed: {:?}", err);
                Coord { x: 0.0, y: 0.0 }
            }
        }
    }

    fn fit_view(&mut self, bounds: &[BoundingBox]) {
        if let Err(err) = to_js(bounds).and_then(|arg| self.host.fit_view.call1(&JsValue::NULL, &arg))
        {
            warn!("fitView failed: {:?}", err);
        }
    }
}

#[derive(serde::Deserialize)]
struct Pixel {
    x: f64,
    y: f64,
}

impl TextMeasure for Host {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        self.measure_text
            .call2(
                &JsValue::NULL,
                &JsValue::from_str(text),
                &JsValue::from_f64(font_size),
            )
            .ok()
            .and_then(|width| width.as_f64())
            .unwrap_or(0.0)
    }
}

impl ShapeMeasure for Host {
    fn measure(&self, markup: &str) -> Option<Dimensions> {
        let dims = self
            .measure_shape
            .call1(&JsValue::NULL, &JsValue::from_str(markup))
            .ok()?;
        serde_wasm_bindgen::from_value(dims).ok()
    }
}

impl ImageLoader for Host {
    fn load(&self, url: &str) -> LocalBoxFuture<'static, Result<Dimensions, ShapeError>> {
        let started = self
            .load_image
            .call1(&JsValue::NULL, &JsValue::from_str(url))
            .and_then(|promise| promise.dyn_into::<Promise>().map_err(JsValue::from));
        let url = url.to_string();
        async move {
            let promise = started.map_err(|err| ShapeError::Host(format!("{:?}", err)))?;
            let dims = JsFuture::from(promise)
                .await
                .map_err(|_| ShapeError::ImageFailed(url.clone()))?;
            serde_wasm_bindgen::from_value(dims).map_err(|_| ShapeError::ImageFailed(url))
        }
        .boxed_local()
    }
}

impl RouteEvents for Host {
    fn on_glyph_created(&mut self, route: &str, glyphs: &[render::Glyph]) {
        if let Some(f) = &self.on_glyph_created {
            if let Ok(glyphs) = to_js(glyphs) {
                let _ = f.call2(&JsValue::NULL, &JsValue::from_str(route), &glyphs);
            }
        }
    }

    fn on_bad_shape(&mut self, bad: bool) {
        if let Some(f) = &self.on_bad_shape {
            let _ = f.call1(&JsValue::NULL, &JsValue::from_bool(bad));
        }
    }
}

fn required(host: &JsValue, name: &str) -> Result<Function, JsValue> {
    optional(host, name)?.ok_or_else(|| JsValue::from_str(&format!("host is missing {}", name)))
}

fn optional(host: &JsValue, name: &str) -> Result<Option<Function>, JsValue> {
    let value = Reflect::get(host, &JsValue::from_str(name))?;
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    value
        .dyn_into::<Function>()
        .map(Some)
        .map_err(|_| JsValue::from_str(&format!("host.{} isn't a function", name)))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(err_to_js)
}

fn err_to_js<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}
