//! Scene assembly: turns the tessellated functions and the axes into one flat
//! list of [`Element`]s for the current camera.
//!
//! Order of emission is functions first (in scene order), then axes. Anything
//! that ends up non-renderable is counted and dropped here so the renderer
//! only sorts what it will paint.

use tracing::debug;

use crate::{
    element::{CurveSegment, Element, Label, Quad, StrokeWidth, ViewContext},
    math::Vec3,
    scene::{AxesDefinition, AxisSpec, ModelFunction, Scene},
};

/// Upper bound on tick segments or labels per axis.
pub const MAX_TICKS: usize = 10_000;

/// Axis name sits just past the max end.
const AXIS_NAME_OFFSET: f64 = 1.05;
/// Arrow head length as a fraction of the axis span.
const ARROW_FRACTION: f64 = 0.04;

/// Elements for one frame, in emission order.
#[derive(Debug, Default)]
pub struct Frame {
    pub elements: Vec<Element>,
    pub culled: usize,
}

impl Frame {
    fn push(&mut self, element: impl Into<Element>) {
        let element = element.into();
        if element.is_renderable() {
            self.elements.push(element);
        } else {
            self.culled += 1;
        }
    }
}

/// Builds every renderable element of `scene` as seen through `ctx`.
pub fn assemble(scene: &Scene, ctx: &ViewContext<'_>) -> Frame {
    let mut frame = Frame::default();
    for f in scene.functions().iter().filter(|f| f.visible) {
        function_elements(&mut frame, ctx, f);
    }
    if scene.show_axes {
        for axis in scene.axes.axes.iter().filter(|a| a.shown) {
            axis_elements(&mut frame, ctx, &scene.axes, axis);
        }
    }
    debug!(
        elements = frame.elements.len(),
        culled = frame.culled,
        "Scene assembled"
    );
    frame
}

fn function_elements(frame: &mut Frame, ctx: &ViewContext<'_>, f: &ModelFunction) {
    let Some(tess) = f.tessellation() else {
        debug!(name = %f.name, "Skipping function without tessellation");
        return;
    };
    if tess.grid.dims() != f.expected_dims() {
        debug!(name = %f.name, "Skipping stale tessellation");
        return;
    }
    let grid = &tess.grid;
    let width = StrokeWidth::from_setting(f.curve_width, f.absolute_width);

    if f.is_curve() || !f.fill_surface {
        for (a, b) in grid.edges() {
            frame.push(CurveSegment::new(ctx, a, b, f.curve_color, width));
        }
        return;
    }

    let outline = (f.curve_width > 0).then_some((f.curve_color, width));
    for (i, j) in grid.cells() {
        frame.push(Quad::new(
            ctx,
            grid.quad(i, j),
            Some(f.surface_color),
            outline,
        ));
    }
}

/// World-space tick segments from `min` to `max`, one per `increment`. The
/// last one is shortened to end exactly at `max`.
pub fn axis_segments(axis: &AxisSpec, increment: f64) -> Vec<(Vec3, Vec3)> {
    let (min, max) = axis.range();
    let dir = axis.direction;
    let mut segments = Vec::new();
    if !(increment > 0.0) {
        return segments;
    }
    let mut t = min;
    while t < max && segments.len() < MAX_TICKS {
        let next = (min + (segments.len() + 1) as f64 * increment).min(max);
        segments.push((dir * t, dir * next));
        t = next;
    }
    segments
}

/// Label positions: every multiple of `density` inside the range, zero
/// excluded.
pub fn tick_values(axis: &AxisSpec, density: f64) -> Vec<f64> {
    let (min, max) = axis.range();
    if !(density > 0.0) {
        return Vec::new();
    }
    // Tolerate float noise at the range ends.
    let first = (min / density - 1e-9).ceil();
    let last = (max / density + 1e-9).floor();
    let mut values = Vec::new();
    let mut k = first;
    while k <= last && values.len() < MAX_TICKS {
        if k != 0.0 {
            values.push(k * density);
        }
        k += 1.0;
    }
    values
}

/// Formats a tick value with at most six decimals and no trailing zeros.
pub fn format_tick(value: f64) -> String {
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn axis_elements(frame: &mut Frame, ctx: &ViewContext<'_>, axes: &AxesDefinition, axis: &AxisSpec) {
    let color = axes.color;
    let width = StrokeWidth::Pixels(axes.line_width as f64);
    let dir = axis.direction;
    let (min, max) = axis.range();

    let segments = axis_segments(axis, axes.tick_increment());
    if segments.len() == MAX_TICKS {
        debug!(axis = %axis.name, "Tick segments capped");
    }
    for (a, b) in segments {
        frame.push(CurveSegment::new(ctx, a, b, color, width));
    }

    for value in tick_values(axis, axes.tick_label_density()) {
        frame.push(Label::new(ctx, dir * value, format_tick(value), color));
    }

    if axes.arrows {
        let tip = dir * max;
        let len = (max - min) * ARROW_FRACTION;
        let back = dir * (max - len);
        let fin = arrow_fin(dir) * (len * 0.5);
        frame.push(CurveSegment::new(ctx, tip, back + fin, color, width));
        frame.push(CurveSegment::new(ctx, tip, back - fin, color, width));
    }

    frame.push(Label::new(
        ctx,
        dir * (AXIS_NAME_OFFSET * max),
        axis.name.clone(),
        color,
    ));
}

/// Unit vector perpendicular to `dir`, used to spread the arrow head.
fn arrow_fin(dir: Vec3) -> Vec3 {
    let helper = if dir.y.abs() > 0.9 {
        Vec3::UNIT_X
    } else {
        Vec3::UNIT_Y
    };
    let fin = dir.cross(helper).normalize();
    if fin.is_nan() {
        Vec3::ZERO
    } else {
        fin
    }
}

/// Convenience for callers that only want a count per element kind.
pub fn census(elements: &[Element]) -> (usize, usize, usize) {
    elements.iter().fold((0, 0, 0), |(c, r, l), e| match e {
        Element::Curve(_) => (c + 1, r, l),
        Element::Rect(_) => (c, r + 1, l),
        Element::Label(_) => (c, r, l + 1),
    })
}
