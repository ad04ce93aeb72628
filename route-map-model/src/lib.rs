use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Location {
        Location {
            latitude,
            longitude,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum DashStyle {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    LongDash,
}

impl DashStyle {
    pub fn name(self) -> &'static str {
        match self {
            DashStyle::Solid => "solid",
            DashStyle::Dash => "dash",
            DashStyle::Dot => "dot",
            DashStyle::DashDot => "dashdot",
            DashStyle::LongDash => "longdash",
        }
    }

    pub fn from_name(name: &str) -> Option<DashStyle> {
        match name {
            "solid" => Some(DashStyle::Solid),
            "dash" => Some(DashStyle::Dash),
            "dot" => Some(DashStyle::Dot),
            "dashdot" => Some(DashStyle::DashDot),
            "longdash" => Some(DashStyle::LongDash),
            _ => None,
        }
    }
}

/// Which way the unrotated end glyph points.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ShapeName {
    Triangle,
    Arrow,
    Chevron,
    Circle,
    Square,
    Diamond,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum EndShape {
    Builtin(ShapeName),
    /// Inline SVG markup supplied by the user
    Custom(String),
    /// An image URL, loaded by the host
    Image(String),
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct StartGlyph {
    pub scale: f64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct MiddleGlyph {
    pub scale: f64,
    pub interval: f64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct EndGlyph {
    pub scale: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(flatten)]
    pub shape: EndShape,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct GlyphConfig {
    #[serde(default)]
    pub start: Option<StartGlyph>,
    #[serde(default)]
    pub middle: Option<MiddleGlyph>,
    #[serde(default)]
    pub end: Option<EndGlyph>,
    /// Rows whose route gets no glyphs at all. A route is judged by its first row.
    #[serde(default)]
    pub inactive: HashSet<usize>,
}

impl GlyphConfig {
    pub fn active(&self, row: usize) -> bool {
        !self.inactive.contains(&row)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct DataOptions {
    /// Drop rows with out-of-range coordinates instead of clamping them
    #[serde(default = "yes")]
    pub onlyvalid: bool,
    /// Drop rows with a coordinate of exactly zero
    #[serde(default = "yes")]
    pub nonzero: bool,
}

impl Default for DataOptions {
    fn default() -> Self {
        DataOptions {
            onlyvalid: true,
            nonzero: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct RouteConfig {
    #[serde(default)]
    pub glyph: GlyphConfig,
    #[serde(default)]
    pub data: DataOptions,
    #[serde(default = "yes")]
    pub autofit: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        RouteConfig {
            glyph: GlyphConfig::default(),
            data: DataOptions::default(),
            autofit: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum LegendPosition {
    #[default]
    Top,
    Bottom,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct LegendEntry {
    pub key: String,
    pub label: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LegendConfig {
    #[serde(default)]
    pub show: bool,
    #[serde(default)]
    pub color: Vec<LegendEntry>,
    #[serde(default)]
    pub thick: Vec<LegendEntry>,
    #[serde(default)]
    pub style: Vec<LegendEntry>,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub position: LegendPosition,
}

impl Default for LegendConfig {
    fn default() -> Self {
        LegendConfig {
            show: false,
            color: Vec::new(),
            thick: Vec::new(),
            style: Vec::new(),
            font_size: default_font_size(),
            position: LegendPosition::Top,
        }
    }
}

/// One input row. Coordinates may be missing; the route builder decides what to do with them.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct RouteRow {
    pub route: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_thick")]
    pub thick: f64,
    #[serde(default)]
    pub style: DashStyle,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct RouteTable {
    pub rows: Vec<RouteRow>,
}

impl RouteTable {
    pub fn row(&self, row: usize) -> &RouteRow {
        &self.rows[row]
    }

    /// Row indices grouped by route id, each group in input order.
    pub fn group_by_route(&self) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, row) in self.rows.iter().enumerate() {
            groups.entry(row.route.clone()).or_default().push(idx);
        }
        groups
    }
}

fn yes() -> bool {
    true
}

fn default_font_size() -> f64 {
    12.0
}

fn default_color() -> String {
    "#01B8AA".to_string()
}

fn default_thick() -> f64 {
    3.0
}
