//! Serializes the current scene into a standalone SVG document. Pure; no I/O.

use std::fmt::Write;

use crate::controller::RouteSet;
use crate::legend::{Legend, Swatch};
use crate::render::{GlyphKind, RouteGroup};

pub fn to_svg(routes: &RouteSet, legend: &Legend, width: f64, height: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    for (key, group) in routes.groups() {
        write_route(&mut out, key, group);
    }
    if legend.is_visible() {
        write_legend(&mut out, legend, width, height);
    }
    out.push_str("</svg>\n");
    out
}

fn write_route(out: &mut String, key: &str, group: &RouteGroup) {
    let _ = writeln!(
        out,
        r#"<g class="route" data-route="{}" transform="translate({},{})">"#,
        escape(key),
        group.translate.0,
        group.translate.1
    );
    for path in &group.segments {
        let _ = write!(
            out,
            r#"<path class="segment" d="{}" fill="none" transform="scale({})" stroke="{}" stroke-width="{}" stroke-opacity="1" stroke-linecap="round""#,
            path.d,
            path.scale,
            escape(&path.stroke),
            path.stroke_width
        );
        if let Some(dash) = &path.dash_array {
            let _ = write!(out, r#" stroke-dasharray="{}""#, dash);
        }
        out.push_str("/>\n");
    }
    for glyph in &group.glyphs {
        let (x, y) = glyph.translate;
        let fill = escape(&glyph.fill);
        match &glyph.kind {
            GlyphKind::Start { radius } => {
                let _ = writeln!(
                    out,
                    r#"<circle class="start glyph" cx="0" cy="0" r="{radius}" fill="{fill}" transform="translate({x},{y})"/>"#
                );
            }
            GlyphKind::Middle { d } => {
                let _ = writeln!(
                    out,
                    r#"<path class="arrow glyph" d="{d}" fill="{fill}" transform="translate({x},{y})"/>"#
                );
            }
            GlyphKind::End(mark) => {
                let rotate = mark
                    .rotate
                    .map(|angle| format!(r#" transform="rotate({angle})""#))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    r#"<g class="end glyph" fill="{fill}" transform="translate({x},{y})"><g class="rotate"{rotate}><g class="resize" transform="scale({})">{}</g></g></g>"#,
                    mark.scale, mark.markup
                );
            }
        }
    }
    out.push_str("</g>\n");
}

fn write_legend(out: &mut String, legend: &Legend, width: f64, height: f64) {
    let top = legend.offset_top(height).max(0.0);
    let font_size = legend.config().font_size;
    let _ = writeln!(
        out,
        r#"<g class="legend" transform="translate(0,{top})"><rect fill="white" width="{width}" height="{}"/>"#,
        legend.height()
    );
    for item in legend.items() {
        let _ = write!(out, r#"<g class="item" transform="translate({},0)">"#, item.x);
        match &item.swatch {
            Swatch::Circle { cx, cy, r, fill } => {
                let _ = write!(
                    out,
                    r#"<circle cx="{cx}" cy="{cy}" r="{r}" fill="{}"/>"#,
                    escape(fill)
                );
            }
            Swatch::Bar {
                y,
                width,
                height,
            } => {
                let _ = write!(
                    out,
                    r##"<rect y="{y}" width="{width}" height="{height}" fill="#555"/>"##
                );
            }
            Swatch::Dash {
                x2,
                y,
                stroke_width,
                dash_array,
            } => {
                let dash = dash_array
                    .as_ref()
                    .map(|d| format!(r#" stroke-dasharray="{d}""#))
                    .unwrap_or_default();
                let _ = write!(
                    out,
                    r#"<line x1="0" x2="{x2}" y1="{y}" y2="{y}" stroke="black" stroke-width="{stroke_width}"{dash}/>"#
                );
            }
        }
        let _ = writeln!(
            out,
            r#"<text x="{}" y="{}" font-size="{font_size}">{}</text></g>"#,
            item.text_x,
            item.text_y,
            escape(&item.label)
        );
    }
    out.push_str("</g>\n");
}

pub(crate) fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
