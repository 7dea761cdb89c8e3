//! SVG drawing surface.
//!
//! Every primitive becomes one SVG element carrying the current color,
//! stroke width and translation, so the document can be inspected or diffed
//! as text.

use std::path::Path;

use anyhow::Context;
use plot_shared::{
    color::Rgba,
    render::{DrawSurface, ScreenPoint},
};

/// Approximate glyph height for labels.
const FONT_SIZE: f64 = 11.0;

pub struct SvgSurface {
    width: u32,
    height: u32,
    origin: ScreenPoint,
    color: Rgba,
    stroke_width: f64,
    body: String,
    elements: usize,
}

impl SvgSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            origin: ScreenPoint::default(),
            color: Rgba::BLACK,
            stroke_width: 1.0,
            body: String::new(),
            elements: 0,
        }
    }

    /// Number of SVG elements emitted so far.
    pub fn element_count(&self) -> usize {
        self.elements
    }

    /// Returns the complete document.
    pub fn finish(&self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body,
        )
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.finish()).with_context(|| format!("writing {}", path.display()))
    }

    fn at(&self, p: ScreenPoint) -> (f64, f64) {
        (p.x + self.origin.x, p.y + self.origin.y)
    }

    fn points(&self, points: &[ScreenPoint]) -> String {
        points
            .iter()
            .map(|&p| {
                let (x, y) = self.at(p);
                format!("{x:.2},{y:.2}")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn paint(&self, attr: &str) -> String {
        let mut s = format!("{attr}=\"{}\"", self.color.to_hex());
        if self.color.a < 255 {
            s.push_str(&format!(" {attr}-opacity=\"{:.3}\"", self.color.opacity()));
        }
        s
    }

    fn push(&mut self, element: String) {
        self.body.push_str("  ");
        self.body.push_str(&element);
        self.body.push('\n');
        self.elements += 1;
    }
}

impl DrawSurface for SvgSurface {
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let (x, y) = self.at(ScreenPoint::new(x, y));
        let el = format!(
            "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" {}/>",
            self.paint("fill")
        );
        self.push(el);
    }

    fn draw_line(&mut self, a: ScreenPoint, b: ScreenPoint) {
        let ((x1, y1), (x2, y2)) = (self.at(a), self.at(b));
        let el = format!(
            "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" {} stroke-width=\"{:.2}\"/>",
            self.paint("stroke"),
            self.stroke_width
        );
        self.push(el);
    }

    fn fill_polygon(&mut self, points: &[ScreenPoint]) {
        let el = format!(
            "<polygon points=\"{}\" {}/>",
            self.points(points),
            self.paint("fill")
        );
        self.push(el);
    }

    fn draw_polygon_outline(&mut self, points: &[ScreenPoint]) {
        let el = format!(
            "<polygon points=\"{}\" fill=\"none\" {} stroke-width=\"{:.2}\"/>",
            self.points(points),
            self.paint("stroke"),
            self.stroke_width
        );
        self.push(el);
    }

    fn draw_text(&mut self, at: ScreenPoint, text: &str) {
        let (x, y) = self.at(at);
        let el = format!(
            "<text x=\"{x:.2}\" y=\"{y:.2}\" font-size=\"{FONT_SIZE}\" {}>{}</text>",
            self.paint("fill"),
            escape(text)
        );
        self.push(el);
    }

    fn set_color(&mut self, color: Rgba) {
        self.color = color;
    }

    fn set_stroke_width(&mut self, width: f64) {
        self.stroke_width = width;
    }

    fn translate(&mut self, origin: ScreenPoint) {
        self.origin = origin;
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_offsets_primitives() {
        let mut svg = SvgSurface::new(100, 80);
        svg.translate(ScreenPoint::new(50.0, 40.0));
        svg.set_color(Rgba::rgb(255, 0, 0));
        svg.draw_line(ScreenPoint::new(0.0, 0.0), ScreenPoint::new(10.0, -10.0));
        let doc = svg.finish();
        assert!(doc.contains("x1=\"50.00\" y1=\"40.00\" x2=\"60.00\" y2=\"30.00\""));
        assert!(doc.contains("stroke=\"#ff0000\""));
        assert_eq!(svg.element_count(), 1);
    }

    #[test]
    fn text_is_escaped() {
        let mut svg = SvgSurface::new(10, 10);
        svg.draw_text(ScreenPoint::default(), "a<b & c");
        assert!(svg.finish().contains(">a&lt;b &amp; c</text>"));
    }
}
