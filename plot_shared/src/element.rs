//! Renderable elements.
//!
//! Each element is built from world-space points and a [`ViewContext`]. It
//! projects once at construction, clips or culls against the near plane,
//! resolves its fog-blended color and records the camera-space `distance` the
//! painter's sort uses. Elements live for a single frame.

use crate::{
    camera::Camera,
    color::Rgba,
    math::Vec3,
    render::{DrawSurface, ScreenPoint},
    scene::{FogSettings, Scene},
};

/// Default near-plane depth.
pub const DEFAULT_NEAR_CLIP: f64 = 0.01;

/// Fill brightening for faces seen head-on.
const SHINE_STRENGTH: f64 = 0.6;
const SHINE_EXPONENT: i32 = 8;

/// Everything an element needs from the current frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    pub camera: &'a Camera,
    pub fog: FogSettings,
    pub background: Rgba,
    pub near_clip: f64,
}

impl<'a> ViewContext<'a> {
    pub fn new(scene: &'a Scene, near_clip: f64) -> Self {
        Self {
            camera: &scene.camera,
            fog: scene.fog,
            background: scene.background,
            near_clip,
        }
    }

    /// Blends `color` toward the background by depth. `None` once fully
    /// fogged out.
    pub fn fogged(&self, color: Rgba, distance: f64) -> Option<Rgba> {
        let blend = self.fog.blend(distance);
        if blend >= 1.0 {
            return None;
        }
        Some(color.lerp(self.background, blend))
    }

    fn to_screen(&self, projected: Vec3) -> ScreenPoint {
        // Surfaces draw with +y down.
        ScreenPoint::new(projected.x, -projected.y)
    }

    /// Clips a world segment against the near plane and projects it.
    /// Returns the screen endpoints and their depths.
    pub fn clip_segment(&self, a: Vec3, b: Vec3) -> Option<ClippedSegment> {
        if a.is_nan() || b.is_nan() {
            return None;
        }
        let near = self.near_clip;
        let (da, db) = (self.camera.depth_of(a), self.camera.depth_of(b));
        if da < near && db < near {
            return None;
        }
        let crossing = |from: Vec3, to: Vec3, d_from: f64, d_to: f64| {
            from + (to - from) * ((near - d_from) / (d_to - d_from))
        };
        let (a, b) = if da < near {
            (crossing(a, b, da, db), b)
        } else if db < near {
            (a, crossing(b, a, db, da))
        } else {
            (a, b)
        };
        let (pa, pb) = (self.camera.project(a), self.camera.project(b));
        if !pa.is_finite() || !pb.is_finite() {
            return None;
        }
        Some(ClippedSegment {
            a: self.to_screen(pa),
            b: self.to_screen(pb),
            depth_a: pa.z,
            depth_b: pb.z,
        })
    }

    /// Projects a point that must lie in front of the near plane.
    pub fn project_point(&self, p: Vec3) -> Option<(ScreenPoint, f64)> {
        if p.is_nan() {
            return None;
        }
        let projected = self.camera.project(p);
        if projected.z < self.near_clip || !projected.is_finite() {
            return None;
        }
        Some((self.to_screen(projected), projected.z))
    }

    fn stroke_pixels(&self, width: StrokeWidth, distance: f64) -> f64 {
        match width {
            StrokeWidth::Pixels(px) => px,
            StrokeWidth::World(w) => (w * self.camera.scale() / distance).max(1.0),
        }
    }
}

/// A segment after near-plane clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedSegment {
    pub a: ScreenPoint,
    pub b: ScreenPoint,
    pub depth_a: f64,
    pub depth_b: f64,
}

/// Line width, fixed on screen or scaling with perspective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeWidth {
    Pixels(f64),
    World(f64),
}

impl StrokeWidth {
    /// `absolute` widths are pixels; relative widths are hundredths of a
    /// world unit.
    pub fn from_setting(width: i32, absolute: bool) -> Self {
        if absolute {
            StrokeWidth::Pixels(width as f64)
        } else {
            StrokeWidth::World(width as f64 / 100.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurveSegment {
    pub a: ScreenPoint,
    pub b: ScreenPoint,
    pub color: Rgba,
    pub width: f64,
    distance: f64,
    renderable: bool,
}

impl CurveSegment {
    pub fn new(ctx: &ViewContext<'_>, a: Vec3, b: Vec3, color: Rgba, width: StrokeWidth) -> Self {
        let mut seg = Self {
            a: ScreenPoint::default(),
            b: ScreenPoint::default(),
            color,
            width: 1.0,
            distance: f64::NAN,
            renderable: false,
        };
        let Some(clipped) = ctx.clip_segment(a, b) else {
            return seg;
        };
        seg.a = clipped.a;
        seg.b = clipped.b;
        seg.distance = (clipped.depth_a + clipped.depth_b) / 2.0;
        seg.width = ctx.stroke_pixels(width, seg.distance);
        if let Some(c) = ctx.fogged(color, seg.distance) {
            seg.color = c;
            seg.renderable = true;
        }
        seg
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub corners: [ScreenPoint; 4],
    pub fill: Option<Rgba>,
    pub outline: Option<(Rgba, f64)>,
    distance: f64,
    renderable: bool,
}

impl Quad {
    /// A face with an optional fill (shined and fogged) and an optional
    /// outline. Any corner that is NaN or behind the near plane makes the
    /// whole quad non-renderable.
    pub fn new(
        ctx: &ViewContext<'_>,
        corners: [Vec3; 4],
        fill: Option<Rgba>,
        outline: Option<(Rgba, StrokeWidth)>,
    ) -> Self {
        let mut quad = Self {
            corners: [ScreenPoint::default(); 4],
            fill: None,
            outline: None,
            distance: f64::NAN,
            renderable: false,
        };

        let mut screen = [ScreenPoint::default(); 4];
        let mut depth_sum = 0.0;
        for (slot, p) in screen.iter_mut().zip(corners) {
            let Some((projected, depth)) = ctx.project_point(p) else {
                return quad;
            };
            *slot = projected;
            depth_sum += depth;
        }
        quad.corners = screen;
        quad.distance = depth_sum / 4.0;

        let blend = ctx.fog.blend(quad.distance);
        if blend >= 1.0 {
            return quad;
        }

        quad.fill = fill.map(|base| {
            let shine = shine(corners, ctx.camera.eye_direction());
            base.lerp(Rgba::WHITE, SHINE_STRENGTH * shine)
                .lerp(ctx.background, blend)
        });
        quad.outline = outline.map(|(color, width)| {
            (
                color.lerp(ctx.background, blend),
                ctx.stroke_pixels(width, quad.distance),
            )
        });
        quad.renderable = quad.fill.is_some() || quad.outline.is_some();
        quad
    }
}

/// Specular-like term in `[0, 1]`: peaks when the face normal is parallel
/// to the view direction.
fn shine(corners: [Vec3; 4], eye_direction: Vec3) -> f64 {
    let [a, b, c, d] = corners;
    let normal = (c - a).cross(d - b).normalize();
    if normal.is_nan() {
        return 0.0;
    }
    normal.dot(eye_direction).abs().powi(SHINE_EXPONENT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub at: ScreenPoint,
    pub text: String,
    pub color: Rgba,
    distance: f64,
    renderable: bool,
}

impl Label {
    pub fn new(ctx: &ViewContext<'_>, at: Vec3, text: impl Into<String>, color: Rgba) -> Self {
        let mut label = Self {
            at: ScreenPoint::default(),
            text: text.into(),
            color,
            distance: f64::NAN,
            renderable: false,
        };
        if let Some((screen, depth)) = ctx.project_point(at) {
            label.at = screen;
            label.distance = depth;
            if let Some(c) = ctx.fogged(color, depth) {
                label.color = c;
                label.renderable = true;
            }
        }
        label
    }
}

/// One drawable primitive of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Curve(CurveSegment),
    Rect(Quad),
    Label(Label),
}

impl Element {
    pub fn is_renderable(&self) -> bool {
        match self {
            Element::Curve(e) => e.renderable,
            Element::Rect(e) => e.renderable,
            Element::Label(e) => e.renderable,
        }
    }

    /// Camera-space depth used only for ordering.
    pub fn distance(&self) -> f64 {
        match self {
            Element::Curve(e) => e.distance,
            Element::Rect(e) => e.distance,
            Element::Label(e) => e.distance,
        }
    }

    pub fn render(&self, surface: &mut dyn DrawSurface) {
        if !self.is_renderable() {
            return;
        }
        match self {
            Element::Curve(seg) => {
                surface.set_color(seg.color);
                surface.set_stroke_width(seg.width);
                surface.draw_line(seg.a, seg.b);
            }
            Element::Rect(quad) => {
                if let Some(fill) = quad.fill {
                    surface.set_color(fill);
                    surface.fill_polygon(&quad.corners);
                }
                if let Some((color, width)) = quad.outline {
                    surface.set_color(color);
                    surface.set_stroke_width(width);
                    surface.draw_polygon_outline(&quad.corners);
                }
            }
            Element::Label(label) => {
                surface.set_color(label.color);
                surface.draw_text(label.at, &label.text);
            }
        }
    }
}

impl From<CurveSegment> for Element {
    fn from(e: CurveSegment) -> Self {
        Element::Curve(e)
    }
}

impl From<Quad> for Element {
    fn from(e: Quad) -> Self {
        Element::Rect(e)
    }
}

impl From<Label> for Element {
    fn from(e: Label) -> Self {
        Element::Label(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, RecordingSurface};

    fn scene_along_z() -> Scene {
        let mut scene = Scene::new(
            "along z",
            Camera::new(Vec3::ZERO, Vec3::UNIT_Z, Vec3::UNIT_Y).unwrap(),
        );
        scene.background = Rgba::WHITE;
        scene
    }

    #[test]
    fn segment_fully_behind_is_culled() {
        let scene = scene_along_z();
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let seg = CurveSegment::new(
            &ctx,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 0.005),
            Rgba::BLACK,
            StrokeWidth::Pixels(1.0),
        );
        assert!(!Element::from(seg).is_renderable());
    }

    #[test]
    fn segment_crossing_near_plane_is_clipped() {
        let scene = scene_along_z();
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let clipped = ctx
            .clip_segment(Vec3::new(1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 1.0))
            .unwrap();
        assert!((clipped.depth_a - DEFAULT_NEAR_CLIP).abs() < 1e-12);
        assert!((clipped.depth_b - 1.0).abs() < 1e-12);
        // Far endpoint is unchanged.
        assert!((clipped.b.x - scene.camera.scale()).abs() < 1e-9);
    }

    #[test]
    fn quad_with_nan_corner_is_not_renderable() {
        let scene = scene_along_z();
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let quad = Quad::new(
            &ctx,
            [
                Vec3::new(0.0, 0.0, 2.0),
                Vec3::new(1.0, 0.0, 2.0),
                Vec3::NAN,
                Vec3::new(0.0, 1.0, 2.0),
            ],
            Some(Rgba::BLACK),
            None,
        );
        assert!(!quad.renderable);
    }

    #[test]
    fn facing_quad_shines_and_fogs() {
        let mut scene = scene_along_z();
        let corners = [
            Vec3::new(-1.0, -1.0, 4.0),
            Vec3::new(1.0, -1.0, 4.0),
            Vec3::new(1.0, 1.0, 4.0),
            Vec3::new(-1.0, 1.0, 4.0),
        ];
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let lit = Quad::new(&ctx, corners, Some(Rgba::BLACK), None);
        assert_eq!(lit.fill, Some(Rgba::BLACK.lerp(Rgba::WHITE, SHINE_STRENGTH)));

        scene.fog = FogSettings::new(true, 1.0, 3.0).unwrap();
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let fogged = Quad::new(&ctx, corners, Some(Rgba::BLACK), None);
        assert!(!fogged.renderable);
    }

    #[test]
    fn relative_width_shrinks_with_distance() {
        let scene = scene_along_z();
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let width = StrokeWidth::from_setting(5, false);
        let at_depth = |d: f64| {
            CurveSegment::new(
                &ctx,
                Vec3::new(0.0, 0.0, d),
                Vec3::new(0.1, 0.0, d),
                Rgba::BLACK,
                width,
            )
        };
        let (near, far) = (at_depth(1.0), at_depth(8.0));
        assert!(near.width > far.width);
        assert!(far.width >= 1.0);
    }

    #[test]
    fn label_renders_text() {
        let scene = scene_along_z();
        let ctx = ViewContext::new(&scene, DEFAULT_NEAR_CLIP);
        let label = Label::new(&ctx, Vec3::new(0.0, 0.0, 3.0), "0.5", Rgba::BLACK);
        let label = Element::from(label);
        let mut surface = RecordingSurface::default();
        label.render(&mut surface);
        assert!(surface
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::Text { text, .. } if text == "0.5")));
    }
}
