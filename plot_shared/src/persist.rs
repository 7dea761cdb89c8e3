//! Persisted scene format.
//!
//! A flat big-endian stream, order-significant, with no version tag beyond a
//! leading `u32` signature word:
//!
//! - title
//! - camera: eye position, eye direction, up, screen up, screen right (3 × f64
//!   each), fov (f64)
//! - render mode flag (i32), background (4 × i32 RGBA)
//! - fog enabled (bool), fog start, fog end (f64)
//! - function count (i32), then per function: visible, name, expression,
//!   is_curve, curve width (i32), absolute width, grid divisions u/v (2 × i32),
//!   fill surface, curve color, surface color
//! - show axes (bool), then per axis: direction (3 × f64), shown, min, max;
//!   then tick increment, label density (f64), color (4 × i32), width (i32)
//!
//! Strings are a `u16` byte length followed by UTF-8. Booleans are one byte.
//! Histogram-backed functions reference external data and are not written.

use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{info, warn};

use crate::{
    camera::Camera,
    color::Rgba,
    error::PersistError,
    math::Vec3,
    scene::{FogSettings, ModelFunction, RenderMode, Scene},
};

/// Default signature word ("PLV3").
pub const SCENE_SIGNATURE: u32 = 0x504C_5633;

/// Serializes `scene` after `signature`.
pub fn encode_scene(scene: &Scene, signature: u32) -> Result<Bytes, PersistError> {
    let mut buf = BytesMut::with_capacity(512);
    buf.put_u32(signature);
    put_str(&mut buf, &scene.title)?;

    let cam = &scene.camera;
    for v in [
        cam.eye_position(),
        cam.eye_direction(),
        cam.up(),
        cam.screen_up(),
        cam.screen_right(),
    ] {
        put_vec3(&mut buf, v);
    }
    buf.put_f64(cam.fov_degrees());
    buf.put_i32(scene.mode.to_flag());
    put_color(&mut buf, scene.background);
    put_bool(&mut buf, scene.fog.enabled);
    buf.put_f64(scene.fog.start());
    buf.put_f64(scene.fog.end());

    let stored: Vec<(&ModelFunction, &str)> = scene
        .functions()
        .iter()
        .filter_map(|f| match f.expression() {
            Some(expr) => Some((f, expr)),
            None => {
                warn!(name = %f.name, "Histogram function not saved");
                None
            }
        })
        .collect();
    buf.put_i32(len_i32(stored.len())?);
    for (f, expr) in stored {
        let (divs_u, divs_v) = f.grid_divs();
        put_bool(&mut buf, f.visible);
        put_str(&mut buf, &f.name)?;
        put_str(&mut buf, expr)?;
        put_bool(&mut buf, f.is_curve());
        buf.put_i32(f.curve_width);
        put_bool(&mut buf, f.absolute_width);
        buf.put_i32(len_i32(divs_u)?);
        buf.put_i32(len_i32(divs_v)?);
        put_bool(&mut buf, f.fill_surface);
        put_color(&mut buf, f.curve_color);
        put_color(&mut buf, f.surface_color);
    }

    put_bool(&mut buf, scene.show_axes);
    for axis in &scene.axes.axes {
        let (min, max) = axis.range();
        put_vec3(&mut buf, axis.direction);
        put_bool(&mut buf, axis.shown);
        buf.put_f64(min);
        buf.put_f64(max);
    }
    buf.put_f64(scene.axes.tick_increment());
    buf.put_f64(scene.axes.tick_label_density());
    put_color(&mut buf, scene.axes.color);
    buf.put_i32(scene.axes.line_width);

    Ok(buf.freeze())
}

/// Parses a scene written by [`encode_scene`]. Builds a fresh [`Scene`]; on
/// error nothing outside this call has been touched.
pub fn decode_scene(data: &[u8], signature: u32) -> Result<Scene, PersistError> {
    let mut r = Reader { buf: data };
    let found = r.u32("signature")?;
    if found != signature {
        return Err(PersistError::BadSignature {
            found,
            expected: signature,
        });
    }

    let mut scene = Scene::new(r.string("title")?, Camera::default());

    let eye = r.vec3("eye position")?;
    let dir = r.vec3("eye direction")?;
    let up = r.vec3("up")?;
    let screen_up = r.vec3("screen up")?;
    let screen_right = r.vec3("screen right")?;
    let fov = r.f64("fov")?;
    scene.camera = Camera::restore(eye, dir, up, screen_up, screen_right, fov)
        .map_err(|e| invalid("camera", e))?;

    let flag = r.i32("render mode")?;
    scene.mode = RenderMode::from_flag(flag)
        .ok_or_else(|| invalid("render mode", format!("unknown flag {flag}")))?;
    scene.background = r.color("background")?;
    let fog_enabled = r.bool("fog enabled")?;
    let fog_start = r.f64("fog start")?;
    let fog_end = r.f64("fog end")?;
    scene.fog = FogSettings::new(fog_enabled, fog_start, fog_end).map_err(|e| invalid("fog", e))?;

    let count = r.i32("function count")?;
    let count = usize::try_from(count).map_err(|_| invalid("function count", count))?;
    for _ in 0..count {
        let visible = r.bool("function visible")?;
        let name = r.string("function name")?;
        let expression = r.string("function expression")?;
        let mut f = ModelFunction::new(name, expression);
        f.visible = visible;
        f.set_curve(r.bool("function is_curve")?);
        f.curve_width = r.i32("curve width")?;
        f.absolute_width = r.bool("absolute width")?;
        let divs_u = r.usize("grid divisions u")?;
        let divs_v = r.usize("grid divisions v")?;
        f.set_grid_divs(divs_u, divs_v)
            .map_err(|e| invalid("grid divisions", e))?;
        f.fill_surface = r.bool("fill surface")?;
        f.curve_color = r.color("curve color")?;
        f.surface_color = r.color("surface color")?;
        scene.push_function(f);
    }

    scene.show_axes = r.bool("show axes")?;
    for axis in scene.axes.axes.iter_mut() {
        axis.direction = r.vec3("axis direction")?;
        axis.shown = r.bool("axis shown")?;
        let min = r.f64("axis min")?;
        let max = r.f64("axis max")?;
        axis.set_range(min, max).map_err(|e| invalid("axis range", e))?;
    }
    let increment = r.f64("tick increment")?;
    let density = r.f64("tick label density")?;
    scene
        .axes
        .set_ticks(increment, density)
        .map_err(|e| invalid("ticks", e))?;
    scene.axes.color = r.color("axes color")?;
    scene.axes.line_width = r.i32("axes width")?;

    if !r.buf.is_empty() {
        return Err(PersistError::TrailingBytes(r.buf.len()));
    }
    Ok(scene)
}

/// Writes `scene` to `path` with [`SCENE_SIGNATURE`].
pub fn save_scene<P: AsRef<Path>>(path: P, scene: &Scene) -> Result<(), PersistError> {
    let path = path.as_ref();
    let bytes = encode_scene(scene, SCENE_SIGNATURE)?;
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "Scene saved");
    Ok(())
}

/// Reads a scene saved by [`save_scene`].
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<Scene, PersistError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let scene = decode_scene(&data, SCENE_SIGNATURE)?;
    info!(
        path = %path.display(),
        functions = scene.functions().len(),
        "Scene loaded"
    );
    Ok(scene)
}

fn invalid(field: &'static str, reason: impl ToString) -> PersistError {
    PersistError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn len_i32(n: usize) -> Result<i32, PersistError> {
    i32::try_from(n).map_err(|_| invalid("count", n))
}

fn put_str(buf: &mut BytesMut, s: &str) -> Result<(), PersistError> {
    let len = u16::try_from(s.len()).map_err(|_| PersistError::StringTooLong(s.len()))?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn put_bool(buf: &mut BytesMut, b: bool) {
    buf.put_u8(u8::from(b));
}

fn put_vec3(buf: &mut BytesMut, v: Vec3) {
    buf.put_f64(v.x);
    buf.put_f64(v.y);
    buf.put_f64(v.z);
}

fn put_color(buf: &mut BytesMut, c: Rgba) {
    for channel in c.to_ints() {
        buf.put_i32(channel);
    }
}

/// Bounds-checked reads; each names the field for the error.
struct Reader<'a> {
    buf: &'a [u8],
}

impl Reader<'_> {
    fn need(&self, n: usize, what: &'static str) -> Result<(), PersistError> {
        if self.buf.remaining() < n {
            return Err(PersistError::Truncated(what));
        }
        Ok(())
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, PersistError> {
        self.need(4, what)?;
        Ok(self.buf.get_u32())
    }

    fn i32(&mut self, what: &'static str) -> Result<i32, PersistError> {
        self.need(4, what)?;
        Ok(self.buf.get_i32())
    }

    fn usize(&mut self, what: &'static str) -> Result<usize, PersistError> {
        let v = self.i32(what)?;
        usize::try_from(v).map_err(|_| invalid(what, v))
    }

    fn f64(&mut self, what: &'static str) -> Result<f64, PersistError> {
        self.need(8, what)?;
        Ok(self.buf.get_f64())
    }

    fn bool(&mut self, what: &'static str) -> Result<bool, PersistError> {
        self.need(1, what)?;
        match self.buf.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(invalid(what, format!("byte {other} is not a boolean"))),
        }
    }

    fn vec3(&mut self, what: &'static str) -> Result<Vec3, PersistError> {
        Ok(Vec3::new(self.f64(what)?, self.f64(what)?, self.f64(what)?))
    }

    fn color(&mut self, what: &'static str) -> Result<Rgba, PersistError> {
        let [r, g, b, a] = [self.i32(what)?, self.i32(what)?, self.i32(what)?, self.i32(what)?];
        Ok(Rgba::from_ints(r, g, b, a))
    }

    fn string(&mut self, what: &'static str) -> Result<String, PersistError> {
        self.need(2, what)?;
        let len = self.buf.get_u16() as usize;
        self.need(len, what)?;
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        std::str::from_utf8(head)
            .map(str::to_string)
            .map_err(|_| PersistError::InvalidUtf8(what))
    }
}
