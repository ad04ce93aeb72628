use std::rc::Rc;

use anyhow::{bail, Result};
use futures::executor::block_on;
use futures::future::{FutureExt, LocalBoxFuture};
use log::{info, warn};
use serde::Deserialize;

use route_map::render::Glyph;
use route_map::{
    Dimensions, ImageLoader, Legend, RouteEvents, RouteSet, ShapeCache, ShapeError, ShapeMeasure,
    StaticView, TextMeasure,
};
use route_map_model::{LegendConfig, RouteConfig, RouteRow, RouteTable};

/// Everything needed to draw one map: the rows plus the same configuration a browser host would
/// pass in.
#[derive(Deserialize)]
pub struct Scene {
    pub rows: Vec<RouteRow>,
    #[serde(default)]
    pub config: RouteConfig,
    #[serde(default)]
    pub legend: LegendConfig,
}

impl Scene {
    pub fn parse(input: &str) -> Result<Scene> {
        let scene: Scene = serde_json::from_str(input)?;
        if scene.rows.is_empty() {
            bail!("No rows in the input");
        }
        Ok(scene)
    }
}

/// The routes and legend of `scene` drawn in a `width` by `height` view.
pub fn render_svg(scene: Scene, width: f64, height: f64) -> Result<String> {
    let mut view = StaticView::new(width, height);
    let (routes, legend) = build(scene, &mut view)?;
    Ok(route_map::svg::to_svg(&routes, &legend, width, height))
}

/// Just the valid points of each route, as a GeoJSON FeatureCollection.
pub fn export_geojson(scene: Scene) -> Result<String> {
    let mut view = StaticView::new(1.0, 1.0);
    let (routes, _) = build(scene, &mut view)?;
    Ok(serde_json::to_string(&routes.to_geojson())?)
}

fn build(scene: Scene, view: &mut StaticView) -> Result<(RouteSet, Legend)> {
    let table = RouteTable { rows: scene.rows };
    let shapes = Rc::new(ShapeCache::new(Box::new(NoImages)));
    let mut routes = RouteSet::new(Rc::clone(&shapes), Box::new(NoMarkup));
    routes.reset(table.group_by_route(), &table, scene.config, view);
    routes.dispatch_events(&mut LogEvents);
    if routes.bounds().is_empty() {
        bail!("None of the {} rows have usable coordinates", table.rows.len());
    }
    routes.transform(&*view);

    // Nothing loads offline, but the end glyphs still need to hear the outcome
    for url in routes.pending_images() {
        if let Err(err) = block_on(shapes.resolve(&url)) {
            warn!("{}", err);
        }
        routes.apply_image(&url);
        routes.dispatch_events(&mut LogEvents);
    }

    let mut legend = Legend::new();
    legend.update(scene.legend, &EstimatedText);
    info!(
        "Drew {} routes at zoom {} with {} legend items",
        routes.len(),
        view.zoom,
        legend.items().len()
    );
    Ok((routes, legend))
}

// No font metrics here, so assume an average glyph is a bit over half an em wide
struct EstimatedText;

impl TextMeasure for EstimatedText {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * font_size * 0.6
    }
}

struct NoMarkup;

impl ShapeMeasure for NoMarkup {
    fn measure(&self, _: &str) -> Option<Dimensions> {
        None
    }
}

struct NoImages;

impl ImageLoader for NoImages {
    fn load(&self, url: &str) -> LocalBoxFuture<'static, Result<Dimensions, ShapeError>> {
        let err = ShapeError::Host(format!("can't load {} when rendering offline", url));
        async move { Err(err) }.boxed_local()
    }
}

struct LogEvents;

impl RouteEvents for LogEvents {
    fn on_glyph_created(&mut self, route: &str, glyphs: &[Glyph]) {
        log::debug!("{} has {} glyphs", route, glyphs.len());
    }

    fn on_bad_shape(&mut self, bad: bool) {
        if bad {
            warn!("The end shape can't be drawn; routes will have no end glyph");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"{
        "rows": [
            {"route": "a", "latitude": 51.50, "longitude": -0.12, "color": "red"},
            {"route": "a", "latitude": 51.51, "longitude": -0.10, "color": "red"},
            {"route": "a", "latitude": 51.52, "longitude": -0.08, "color": "blue", "style": "dash"},
            {"route": "b", "latitude": 51.49, "longitude": -0.15, "thick": 5},
            {"route": "b", "latitude": 51.47, "longitude": -0.11, "thick": 5}
        ],
        "config": {
            "glyph": {
                "start": {"scale": 2},
                "end": {"scale": 4, "image": "pin.png"}
            }
        },
        "legend": {
            "show": true,
            "color": [{"key": "red", "label": "Northbound"}],
            "position": "bottom"
        }
    }"#;

    #[test]
    fn test_render_svg() {
        let svg = render_svg(Scene::parse(INPUT).unwrap(), 640.0, 480.0).unwrap();
        assert_eq!(svg.matches(r#"class="route""#).count(), 2);
        assert_eq!(svg.matches(r#"class="start glyph""#).count(), 2);
        // The image never loads, so there are no end glyphs
        assert!(!svg.contains("end glyph"));
        assert!(svg.contains("Northbound"));
        assert!(svg.contains("stroke-dasharray"));
    }

    #[test]
    fn test_export_geojson() {
        let gj: serde_json::Value =
            serde_json::from_str(&export_geojson(Scene::parse(INPUT).unwrap()).unwrap()).unwrap();
        let features = gj["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["route"], "a");
        assert_eq!(features[0]["properties"]["segments"], 2);
    }

    #[test]
    fn test_bad_input() {
        assert!(Scene::parse(r#"{"rows": []}"#).is_err());
        let zeros = Scene::parse(r#"{"rows": [{"route": "a", "latitude": 0, "longitude": 0}]}"#)
            .unwrap();
        assert!(render_svg(zeros, 100.0, 100.0).is_err());
    }
}
