//! End glyph shapes: the built-in library, measured custom markup, and host-loaded images.
//!
//! Images are fetched at most once at a time for the whole process. The first request for a URL
//! starts the load; anyone else asking while it's in flight waits on the same shared future. The
//! last outcome is remembered until a different URL is requested.

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use route_map_model::ShapeName;

use crate::svg::escape;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

#[derive(Error, Clone, PartialEq, Debug)]
pub enum ShapeError {
    #[error("image {0} couldn't be loaded")]
    ImageFailed(String),
    #[error("custom shape has no measurable size")]
    EmptyMarkup,
    #[error("{0}")]
    Host(String),
}

pub struct BuiltinShape {
    pub markup: &'static str,
    pub width: f64,
    /// Rotate with the route; otherwise the shape is always drawn upright
    pub directional: bool,
}

// All of these point up and are centered on the origin.
pub fn builtin(name: ShapeName) -> BuiltinShape {
    match name {
        ShapeName::Triangle => BuiltinShape {
            markup: r#"<path d="M 0,-5 L 5,5 L -5,5 Z"/>"#,
            width: 10.0,
            directional: true,
        },
        ShapeName::Arrow => BuiltinShape {
            markup: r#"<path d="M 0,-6 L 5,0 L 2,0 L 2,6 L -2,6 L -2,0 L -5,0 Z"/>"#,
            width: 10.0,
            directional: true,
        },
        ShapeName::Chevron => BuiltinShape {
            markup: r#"<path d="M -5,4 L 0,-4 L 5,4 L 0,1 Z"/>"#,
            width: 10.0,
            directional: true,
        },
        ShapeName::Circle => BuiltinShape {
            markup: r#"<circle cx="0" cy="0" r="5"/>"#,
            width: 10.0,
            directional: false,
        },
        ShapeName::Square => BuiltinShape {
            markup: r#"<rect x="-5" y="-5" width="10" height="10"/>"#,
            width: 10.0,
            directional: false,
        },
        ShapeName::Diamond => BuiltinShape {
            markup: r#"<path d="M 0,-6 L 4,0 L 0,6 L -4,0 Z"/>"#,
            width: 8.0,
            directional: true,
        },
    }
}

/// Measures inline markup the way the host would render it. `None` if it can't be rendered.
pub trait ShapeMeasure {
    fn measure(&self, markup: &str) -> Option<Dimensions>;
}

pub trait ImageLoader {
    fn load(&self, url: &str) -> LocalBoxFuture<'static, Result<Dimensions, ShapeError>>;
}

type ImageFuture = Shared<LocalBoxFuture<'static, Result<Dimensions, ShapeError>>>;

enum ImageState {
    Idle,
    Fetching { url: String, done: ImageFuture },
    Resolved { url: String, dims: Dimensions },
    Failed { url: String },
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ImageLookup {
    Ready(Dimensions),
    Failed,
    /// Some image is loading. Ask again once `ShapeCache::resolve` finishes.
    Fetching,
}

pub struct ShapeCache {
    loader: Box<dyn ImageLoader>,
    image: Rc<RefCell<ImageState>>,
    // The last custom markup measured, and its size if it had one
    markup: RefCell<Option<(String, Option<Dimensions>)>>,
}

impl ShapeCache {
    pub fn new(loader: Box<dyn ImageLoader>) -> ShapeCache {
        ShapeCache {
            loader,
            image: Rc::new(RefCell::new(ImageState::Idle)),
            markup: RefCell::new(None),
        }
    }

    /// Checks the cache for `url`, starting a load if nothing is in flight.
    pub fn request(&self, url: &str) -> ImageLookup {
        // The check and the transition to Fetching happen under one borrow
        let mut state = self.image.borrow_mut();
        match &*state {
            ImageState::Resolved { url: cached, dims } if cached == url => {
                return ImageLookup::Ready(*dims);
            }
            ImageState::Failed { url: cached } if cached == url => {
                return ImageLookup::Failed;
            }
            ImageState::Fetching { .. } => {
                return ImageLookup::Fetching;
            }
            _ => {}
        }

        info!("Loading image {}", url);
        let fetch = self.loader.load(url);
        // The state owns this future, so the future must not own the state
        let slot: Weak<RefCell<ImageState>> = Rc::downgrade(&self.image);
        let key = url.to_string();
        let done = async move {
            let result = fetch.await.and_then(|dims| {
                if usable(dims) {
                    Ok(dims)
                } else {
                    Err(ShapeError::ImageFailed(key.clone()))
                }
            });
            let Some(slot) = slot.upgrade() else {
                return result;
            };
            *slot.borrow_mut() = match &result {
                Ok(dims) => {
                    info!("Image {} is {}x{}", key, dims.width, dims.height);
                    ImageState::Resolved {
                        url: key,
                        dims: *dims,
                    }
                }
                Err(err) => {
                    warn!("{}", err);
                    ImageState::Failed { url: key }
                }
            };
            result
        }
        .boxed_local()
        .shared();
        *state = ImageState::Fetching {
            url: url.to_string(),
            done,
        };
        ImageLookup::Fetching
    }

    /// Waits for the outcome for `url`. If another image is loading, that finishes first.
    pub fn resolve(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Dimensions, ShapeError>> + '_ {
        let url = url.to_string();
        async move {
            loop {
                let waiting = match self.request(&url) {
                    ImageLookup::Ready(dims) => return Ok(dims),
                    ImageLookup::Failed => return Err(ShapeError::ImageFailed(url)),
                    ImageLookup::Fetching => match &*self.image.borrow() {
                        ImageState::Fetching { done, .. } => done.clone(),
                        _ => continue,
                    },
                };
                // Whatever it was, the state has moved on; look again
                let _ = waiting.await;
            }
        }
    }

    /// The URL currently loading, if any.
    pub fn in_flight(&self) -> Option<String> {
        match &*self.image.borrow() {
            ImageState::Fetching { url, .. } => Some(url.clone()),
            _ => None,
        }
    }

    /// Measures custom markup, remembering the last answer so repeated draws don't re-measure.
    pub fn measure_markup(
        &self,
        markup: &str,
        measure: &dyn ShapeMeasure,
    ) -> Result<Dimensions, ShapeError> {
        let mut cached = self.markup.borrow_mut();
        if let Some((key, dims)) = &*cached {
            if key == markup {
                return dims.ok_or(ShapeError::EmptyMarkup);
            }
        }
        let dims = measure.measure(markup).filter(|d| usable(*d));
        if dims.is_none() {
            warn!("Custom end shape can't be measured");
        }
        *cached = Some((markup.to_string(), dims));
        dims.ok_or(ShapeError::EmptyMarkup)
    }
}

// Anything else would make the end glyph's scale infinite or NaN
fn usable(dims: Dimensions) -> bool {
    dims.width > 0.0 && dims.height > 0.0 && dims.width.is_finite() && dims.height.is_finite()
}

/// Markup for a loaded image, centered on the origin.
pub fn image_markup(url: &str, dims: Dimensions) -> String {
    format!(
        r#"<image href="{}" height="{}" width="{}" transform="translate({},{})"/>"#,
        escape(url),
        dims.height,
        dims.width,
        -dims.width / 2.0,
        -dims.height / 2.0
    )
}
