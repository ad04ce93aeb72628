use geo::Coord;
use log::info;

use route_map_model::Location;

use crate::projector::{BoundingBox, Projector, REFERENCE_ZOOM};
use crate::render::MapView;

pub const MIN_ZOOM: f64 = 1.0;

/// A fixed-size viewport with no interaction, for rendering snapshots.
#[derive(Clone, Copy, Debug)]
pub struct StaticView {
    pub center: Location,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
    /// Fraction of the viewport left empty around fitted content
    pub padding: f64,
}

impl StaticView {
    pub fn new(width: f64, height: f64) -> StaticView {
        StaticView {
            center: Location::new(0.0, 0.0),
            zoom: MIN_ZOOM,
            width,
            height,
            padding: 0.1,
        }
    }

    pub fn pan_to(&mut self, center: Location) {
        self.center = center;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, REFERENCE_ZOOM);
    }
}

impl MapView for StaticView {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn pixel(&self, loc: Location) -> Coord {
        let projector = Projector::new(self.zoom);
        let center = projector.pixel(self.center);
        projector.pixel(loc) - center
            + Coord {
                x: self.width / 2.0,
                y: self.height / 2.0,
            }
    }

    /// Centers on the union of `bounds` at the largest whole zoom that still shows all of it.
    fn fit_view(&mut self, bounds: &[BoundingBox]) {
        let Some(all) = BoundingBox::union(bounds) else {
            return;
        };
        let (min, max) = all.pixel_extent();
        let reference = Projector::reference();
        self.center = reference.location(Coord {
            x: (min.x + max.x) / 2.0,
            y: (min.y + max.y) / 2.0,
        });

        let usable = 1.0 - 2.0 * self.padding;
        let mut zoom = REFERENCE_ZOOM;
        for (extent, room) in [
            (all.margin.width, self.width * usable),
            (all.margin.height, self.height * usable),
        ] {
            if extent > 0.0 {
                zoom = zoom.min(REFERENCE_ZOOM + (room / extent).log2());
            }
        }
        self.set_zoom(zoom.floor());
        info!(
            "Fit view to {},{} at zoom {}",
            self.center.latitude, self.center.longitude, self.zoom
        );
    }
}
