//! Rendering.
//!
//! This crate intentionally does not depend on a graphics backend. The host
//! implements [`DrawSurface`]; [`Renderer`] walks the scene and calls into it.
//!
//! - Solid mode collects every element, sorts far-to-near and paints in that
//!   order (painter's algorithm, no z-buffer).
//! - Wireframe mode clips and draws every axis segment and grid edge directly,
//!   unsorted and unfogged.

use tracing::debug;

use crate::{
    assemble::{assemble, axis_segments},
    color::Rgba,
    element::{Element, ViewContext, DEFAULT_NEAR_CLIP},
    math::Vec3,
    scene::{RenderMode, Scene},
};

/// How far wireframe colors are pushed toward white (axes) or black (curves).
const WIREFRAME_BLEND: f64 = 0.5;

/// A point in surface pixels, `+y` down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Primitive drawing operations supplied by the host.
pub trait DrawSurface {
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn draw_line(&mut self, a: ScreenPoint, b: ScreenPoint);
    fn fill_polygon(&mut self, points: &[ScreenPoint]);
    fn draw_polygon_outline(&mut self, points: &[ScreenPoint]);
    fn draw_text(&mut self, at: ScreenPoint, text: &str);
    fn set_color(&mut self, color: Rgba);
    fn set_stroke_width(&mut self, width: f64);
    /// Moves the origin of subsequent drawing.
    fn translate(&mut self, origin: ScreenPoint);
}

/// A no-op surface useful for headless runs.
#[derive(Default)]
pub struct NullSurface;

impl DrawSurface for NullSurface {
    fn fill_rect(&mut self, _x: f64, _y: f64, _width: f64, _height: f64) {}
    fn draw_line(&mut self, _a: ScreenPoint, _b: ScreenPoint) {}
    fn fill_polygon(&mut self, _points: &[ScreenPoint]) {}
    fn draw_polygon_outline(&mut self, _points: &[ScreenPoint]) {}
    fn draw_text(&mut self, _at: ScreenPoint, _text: &str) {}
    fn set_color(&mut self, _color: Rgba) {}
    fn set_stroke_width(&mut self, _width: f64) {}
    fn translate(&mut self, _origin: ScreenPoint) {}
}

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Line {
        a: ScreenPoint,
        b: ScreenPoint,
    },
    FillPolygon(Vec<ScreenPoint>),
    PolygonOutline(Vec<ScreenPoint>),
    Text {
        at: ScreenPoint,
        text: String,
    },
    Color(Rgba),
    StrokeWidth(f64),
    Translate(ScreenPoint),
}

/// Captures surface calls as a command list.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of drawing commands, ignoring state changes.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                !matches!(
                    c,
                    DrawCommand::Color(_) | DrawCommand::StrokeWidth(_) | DrawCommand::Translate(_)
                )
            })
            .count()
    }
}

impl DrawSurface for RecordingSurface {
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
        });
    }

    fn draw_line(&mut self, a: ScreenPoint, b: ScreenPoint) {
        self.commands.push(DrawCommand::Line { a, b });
    }

    fn fill_polygon(&mut self, points: &[ScreenPoint]) {
        self.commands.push(DrawCommand::FillPolygon(points.to_vec()));
    }

    fn draw_polygon_outline(&mut self, points: &[ScreenPoint]) {
        self.commands
            .push(DrawCommand::PolygonOutline(points.to_vec()));
    }

    fn draw_text(&mut self, at: ScreenPoint, text: &str) {
        self.commands.push(DrawCommand::Text {
            at,
            text: text.to_string(),
        });
    }

    fn set_color(&mut self, color: Rgba) {
        self.commands.push(DrawCommand::Color(color));
    }

    fn set_stroke_width(&mut self, width: f64) {
        self.commands.push(DrawCommand::StrokeWidth(width));
    }

    fn translate(&mut self, origin: ScreenPoint) {
        self.commands.push(DrawCommand::Translate(origin));
    }
}

/// Summary of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub mode: RenderMode,
    /// Elements (solid) or lines (wireframe) drawn.
    pub elements: usize,
    /// Primitives dropped by near-plane, NaN or fog culling.
    pub culled: usize,
}

/// Orders elements farthest first. Stable, so equal distances keep their
/// assembly order.
pub fn painter_sort(elements: &mut [Element]) {
    elements.sort_by(|a, b| b.distance().total_cmp(&a.distance()));
}

/// Renders with the default near plane.
pub fn render_scene(scene: &Scene, surface: &mut dyn DrawSurface) -> FrameStats {
    Renderer::default().render(scene, surface)
}

/// Scene renderer.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub near_clip: f64,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            near_clip: DEFAULT_NEAR_CLIP,
        }
    }
}

impl Renderer {
    pub fn new(near_clip: f64) -> Self {
        Self { near_clip }
    }

    /// Clears to the background, centres the origin and draws the scene in
    /// its current mode. Functions must already be tessellated.
    pub fn render(&self, scene: &Scene, surface: &mut dyn DrawSurface) -> FrameStats {
        let (w, h) = scene.camera.viewport();
        let (w, h) = (w as f64, h as f64);
        surface.set_color(scene.background);
        surface.fill_rect(0.0, 0.0, w, h);
        surface.translate(ScreenPoint::new(w / 2.0, h / 2.0));

        let stats = match scene.mode {
            RenderMode::Solid => self.render_solid(scene, surface),
            RenderMode::Wireframe => self.render_wireframe(scene, surface),
        };
        debug!(
            mode = ?stats.mode,
            elements = stats.elements,
            culled = stats.culled,
            "Frame rendered"
        );
        stats
    }

    /// Assemble, depth-sort, paint.
    pub fn render_solid(&self, scene: &Scene, surface: &mut dyn DrawSurface) -> FrameStats {
        let ctx = ViewContext::new(scene, self.near_clip);
        let mut frame = assemble(scene, &ctx);
        painter_sort(&mut frame.elements);
        for element in &frame.elements {
            element.render(surface);
        }
        FrameStats {
            mode: RenderMode::Solid,
            elements: frame.elements.len(),
            culled: frame.culled,
        }
    }

    /// Clip-and-draw every edge in a fixed style; no sort, no fog, no fills.
    pub fn render_wireframe(&self, scene: &Scene, surface: &mut dyn DrawSurface) -> FrameStats {
        let ctx = ViewContext::new(scene, self.near_clip);
        let mut stats = FrameStats {
            mode: RenderMode::Wireframe,
            elements: 0,
            culled: 0,
        };
        if scene.show_axes {
            surface.set_color(scene.axes.color.lerp(Rgba::WHITE, WIREFRAME_BLEND));
            surface.set_stroke_width(1.0);
            let increment = scene.axes.tick_increment();
            for axis in scene.axes.axes.iter().filter(|a| a.shown) {
                for (a, b) in axis_segments(axis, increment) {
                    stroke_clipped(&ctx, surface, a, b, &mut stats);
                }
            }
        }

        for f in scene.functions().iter().filter(|f| f.visible) {
            let Some(tess) = f.tessellation() else {
                continue;
            };
            surface.set_color(f.curve_color.lerp(Rgba::BLACK, WIREFRAME_BLEND));
            surface.set_stroke_width(1.0);
            for (a, b) in tess.grid.edges() {
                stroke_clipped(&ctx, surface, a, b, &mut stats);
            }
        }
        stats
    }
}

fn stroke_clipped(
    ctx: &ViewContext<'_>,
    surface: &mut dyn DrawSurface,
    a: Vec3,
    b: Vec3,
    stats: &mut FrameStats,
) {
    match ctx.clip_segment(a, b) {
        Some(seg) => {
            surface.draw_line(seg.a, seg.b);
            stats.elements += 1;
        }
        None => stats.culled += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{camera::Camera, element::Label};

    #[test]
    fn painter_sort_is_far_to_near() {
        let scene = Scene::new(
            "sort",
            Camera::new(Vec3::ZERO, Vec3::UNIT_Z, Vec3::UNIT_Y).unwrap(),
        );
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let mut elements: Vec<Element> = [5.0, 1.0, 3.0]
            .into_iter()
            .map(|d| Label::new(&ctx, Vec3::new(0.0, 0.0, d), format!("{d}"), Rgba::BLACK).into())
            .collect();
        painter_sort(&mut elements);
        let order: Vec<f64> = elements.iter().map(Element::distance).collect();
        assert_eq!(order, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn empty_scene_clears_and_centres() {
        let mut scene = Scene::default();
        scene.show_axes = false;
        let mut surface = RecordingSurface::default();
        let stats = Renderer::default().render(&scene, &mut surface);
        assert_eq!(stats.elements, 0);
        assert_eq!(
            surface.commands()[..3],
            [
                DrawCommand::Color(scene.background),
                DrawCommand::FillRect {
                    x: 0.0,
                    y: 0.0,
                    width: 800.0,
                    height: 600.0
                },
                DrawCommand::Translate(ScreenPoint::new(400.0, 300.0)),
            ]
        );
    }
}
