use log::debug;
use serde::Serialize;

use route_map_model::{DashStyle, LegendConfig, LegendEntry, LegendPosition};

use crate::render::dash_array;

/// Measures rendered label text, in pixels.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum LegendGroup {
    Style,
    Thick,
    Color,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub enum Swatch {
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        fill: String,
    },
    Bar {
        y: f64,
        width: f64,
        height: f64,
    },
    Dash {
        x2: f64,
        y: f64,
        stroke_width: f64,
        dash_array: Option<String>,
    },
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct LegendItem {
    pub group: LegendGroup,
    pub key: String,
    pub label: String,
    /// Left edge of the item
    pub x: f64,
    pub swatch: Swatch,
    /// Text position relative to `x`
    pub text_x: f64,
    pub text_y: f64,
    pub text_width: f64,
}

#[derive(Default)]
pub struct Legend {
    config: LegendConfig,
    items: Vec<LegendItem>,
    width: f64,
}

impl Legend {
    pub fn new() -> Legend {
        Legend::default()
    }

    pub fn config(&self) -> &LegendConfig {
        &self.config
    }

    /// Replaces the configuration and lays every item out again.
    pub fn update(&mut self, config: LegendConfig, measure: &dyn TextMeasure) {
        self.config = config;
        self.items.clear();
        self.width = 0.0;
        if !self.config.show {
            return;
        }

        let style = self.config.style.clone();
        let thick = self.config.thick.clone();
        let color = self.config.color.clone();
        let mut start = 0.0;
        start = self.lay_out(LegendGroup::Style, &style, start, measure);
        start = self.lay_out(LegendGroup::Thick, &thick, start, measure);
        self.lay_out(LegendGroup::Color, &color, start, measure);
        debug!("Legend has {} items, {} wide", self.items.len(), self.width);
    }

    pub fn items(&self) -> &[LegendItem] {
        &self.items
    }

    pub fn is_visible(&self) -> bool {
        self.config.show
    }

    /// Right edge of the last item
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Depends only on the font size, so hosts can reserve space before any layout.
    pub fn height(&self) -> f64 {
        self.config.font_size * 1.35 + 4.0
    }

    /// Vertical offset of the legend strip in a view `view_height` tall.
    pub fn offset_top(&self, view_height: f64) -> f64 {
        match self.config.position {
            LegendPosition::Top => -1.0,
            LegendPosition::Bottom => view_height - self.height() + 2.0,
        }
    }

    fn text_base(&self) -> f64 {
        self.config.font_size + 2.0
    }

    // Returns where the next group starts
    fn lay_out(
        &mut self,
        group: LegendGroup,
        entries: &[LegendEntry],
        start: f64,
        measure: &dyn TextMeasure,
    ) -> f64 {
        if entries.is_empty() {
            return start;
        }
        let fsize = self.config.font_size;
        let mid = self.text_base() - fsize * 0.7 / 2.0;

        let mut offset = start;
        for entry in entries {
            let (swatch, padding) = match group {
                LegendGroup::Color => {
                    let r = fsize * 0.7 / 2.0;
                    (
                        Swatch::Circle {
                            cx: r + 2.0,
                            cy: self.text_base() - r + 1.0,
                            r,
                            fill: entry.key.clone(),
                        },
                        2.0 * r + 4.0,
                    )
                }
                LegendGroup::Thick => {
                    let width = 1.5 * fsize;
                    let height = entry.key.parse::<f64>().unwrap_or(0.0);
                    (
                        Swatch::Bar {
                            y: mid - height / 2.0,
                            width,
                            height,
                        },
                        width + 2.0,
                    )
                }
                LegendGroup::Style => {
                    let width = 2.0 * fsize;
                    let stroke_width = width / 12.0;
                    let style = DashStyle::from_name(&entry.key).unwrap_or_default();
                    (
                        Swatch::Dash {
                            x2: width,
                            y: mid,
                            stroke_width,
                            dash_array: dash_array(style, stroke_width),
                        },
                        width + 2.0,
                    )
                }
            };
            let text_width = measure.text_width(&entry.label, fsize);
            self.items.push(LegendItem {
                group,
                key: entry.key.clone(),
                label: entry.label.clone(),
                x: offset,
                swatch,
                text_x: padding,
                text_y: self.text_base(),
                text_width,
            });
            offset += padding + fsize * 1.2 + text_width;
        }
        self.width = offset;
        offset + 2.4 * fsize
    }
}
