//! Pinhole camera and perspective projection.
//!
//! The camera keeps an orthonormal screen basis derived from `eye_direction`
//! and a reference `up` vector. All mutations go through [`Camera::apply`],
//! which renormalizes after every step and rolls back to the last valid state
//! if the result is degenerate.

use tracing::debug;

use crate::{error::SceneError, math::Vec3};

pub const DEFAULT_FOV_DEGREES: f64 = 45.0;
pub const DEFAULT_VIEWPORT: (u32, u32) = (800, 600);

/// Above this `|eye_direction.y|` free rotation holds `up = screen_up`
/// instead of re-deriving it from the old reference, so the basis cannot flip
/// at the poles.
pub const POLE_GUARD: f64 = 0.9;

const UNIT_TOLERANCE: f64 = 1e-6;

/// A single camera mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraOp {
    /// Dolly along the view direction.
    Forward(f64),
    /// Translate in the screen plane.
    Pan { dx: f64, dy: f64 },
    /// Rotate the view direction in place (radians).
    Rotate { dx: f64, dy: f64 },
    /// Orbit the point `distance` ahead of the eye (radians).
    Pivot { dx: f64, dy: f64, distance: f64 },
    /// Roll the up vector toward `screen_right`.
    Bank(f64),
}

/// Pinhole camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    eye_position: Vec3,
    eye_direction: Vec3,
    up: Vec3,
    screen_up: Vec3,
    screen_right: Vec3,
    fov_degrees: f64,
    scale: f64,
    viewport: (u32, u32),
}

impl Default for Camera {
    fn default() -> Self {
        let eye = Vec3::new(4.0, 3.0, -5.0);
        let mut cam = Self {
            eye_position: eye,
            eye_direction: (-eye).normalize(),
            up: Vec3::UNIT_Y,
            screen_up: Vec3::UNIT_Y,
            screen_right: Vec3::UNIT_X,
            fov_degrees: DEFAULT_FOV_DEGREES,
            scale: 1.0,
            viewport: DEFAULT_VIEWPORT,
        };
        cam.update_basis();
        cam.update_scale();
        cam
    }
}

impl Camera {
    /// Creates a camera at `eye_position` looking along `eye_direction`.
    pub fn new(eye_position: Vec3, eye_direction: Vec3, up: Vec3) -> Result<Self, SceneError> {
        let mut cam = Self {
            eye_position,
            eye_direction: eye_direction.normalize(),
            up,
            ..Self::default()
        };
        if !eye_position.is_finite() || !cam.update_basis() {
            return Err(SceneError::DegenerateCamera);
        }
        Ok(cam)
    }

    /// Rebuilds a camera from stored vectors without re-deriving the basis,
    /// so a saved scene reloads bit-for-bit.
    pub fn restore(
        eye_position: Vec3,
        eye_direction: Vec3,
        up: Vec3,
        screen_up: Vec3,
        screen_right: Vec3,
        fov_degrees: f64,
    ) -> Result<Self, SceneError> {
        let mut cam = Self {
            eye_position,
            eye_direction,
            up,
            screen_up,
            screen_right,
            ..Self::default()
        };
        cam.set_fov(fov_degrees)?;
        if !cam.is_valid() {
            return Err(SceneError::DegenerateCamera);
        }
        Ok(cam)
    }

    pub fn eye_position(&self) -> Vec3 {
        self.eye_position
    }

    pub fn eye_direction(&self) -> Vec3 {
        self.eye_direction
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn screen_up(&self) -> Vec3 {
        self.screen_up
    }

    pub fn screen_right(&self) -> Vec3 {
        self.screen_right
    }

    pub fn fov_degrees(&self) -> f64 {
        self.fov_degrees
    }

    /// Pixels per unit of perspective-divided offset.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn set_fov(&mut self, degrees: f64) -> Result<(), SceneError> {
        if !(degrees > 0.0 && degrees < 180.0) {
            return Err(SceneError::InvalidFov(degrees));
        }
        self.fov_degrees = degrees;
        self.update_scale();
        Ok(())
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), SceneError> {
        if width == 0 || height == 0 {
            return Err(SceneError::EmptyViewport { width, height });
        }
        self.viewport = (width, height);
        self.update_scale();
        Ok(())
    }

    /// Projects a world point to `(screen_x, screen_y, depth)`.
    ///
    /// Screen coordinates are centred on the view axis with `+y` up. Points
    /// with `depth <= 0` are behind the eye; callers clip against the near
    /// plane before trusting the screen coordinates.
    pub fn project(&self, p: Vec3) -> Vec3 {
        let v = p - self.eye_position;
        let depth = v.dot(self.eye_direction);
        let v = v / depth - self.eye_direction;
        Vec3::new(
            self.scale * self.screen_right.dot(v),
            self.scale * self.screen_up.dot(v),
            depth,
        )
    }

    /// Camera-space depth of a world point.
    pub fn depth_of(&self, p: Vec3) -> f64 {
        (p - self.eye_position).dot(self.eye_direction)
    }

    /// Applies one mutation. Returns `false` (and keeps the previous state)
    /// if the result would be degenerate.
    pub fn apply(&mut self, op: CameraOp) -> bool {
        self.guarded(|cam| match op {
            CameraOp::Forward(amount) => {
                cam.eye_position = cam.eye_position + cam.eye_direction * amount;
                true
            }
            CameraOp::Pan { dx, dy } => {
                cam.eye_position = cam.eye_position - cam.screen_right * dx + cam.screen_up * dy;
                true
            }
            CameraOp::Rotate { dx, dy } => cam.rotate_direction(dx, dy),
            CameraOp::Pivot { dx, dy, distance } => {
                let pivot = cam.eye_position + cam.eye_direction * distance;
                let turned = cam.rotate_direction(dx, dy);
                cam.eye_position = pivot - cam.eye_direction * distance;
                turned
            }
            CameraOp::Bank(amount) => {
                cam.up = (cam.screen_up + cam.screen_right * amount).normalize();
                cam.update_basis()
            }
        })
    }

    /// Turns the camera toward `target`, keeping the current `up`. Fails if
    /// the new direction is parallel to `up`.
    pub fn look_at(&mut self, target: Vec3) -> bool {
        self.guarded(|cam| {
            cam.eye_direction = (target - cam.eye_position).normalize();
            cam.update_basis()
        })
    }

    pub fn set_eye_position(&mut self, eye: Vec3) -> bool {
        self.guarded(|cam| {
            cam.eye_position = eye;
            true
        })
    }

    fn guarded<F: FnOnce(&mut Self) -> bool>(&mut self, f: F) -> bool {
        let before = self.clone();
        if f(self) && self.is_valid() {
            true
        } else {
            debug!(camera = ?self, "Degenerate camera state, restoring previous basis");
            *self = before;
            false
        }
    }

    /// Pitches toward `screen_up` by `dy`, then yaws toward `screen_right`
    /// by `dx`, and re-derives the basis.
    fn rotate_direction(&mut self, dx: f64, dy: f64) -> bool {
        let (dir, su, sr) = (self.eye_direction, self.screen_up, self.screen_right);

        let (s, c) = dy.sin_cos();
        let pitched = dir * c + su * s;
        let new_up = (su * c - dir * s).normalize();

        let (s, c) = dx.sin_cos();
        self.eye_direction = (pitched * c + sr * s).normalize();

        if self.eye_direction.y.abs() > POLE_GUARD {
            self.up = new_up;
        }
        if self.update_basis() {
            return true;
        }
        self.up = new_up;
        self.update_basis()
    }

    /// Re-derives `screen_up` and `screen_right` from `eye_direction` and
    /// `up`. Leaves the basis untouched and returns `false` if `up` is
    /// parallel to the view direction.
    fn update_basis(&mut self) -> bool {
        let dir = self.eye_direction.normalize();
        let screen_up = (self.up - dir * self.up.dot(dir)).normalize();
        let screen_right = screen_up.cross(dir).normalize();
        if dir.is_nan() || screen_up.is_nan() || screen_right.is_nan() {
            return false;
        }
        self.eye_direction = dir;
        self.screen_up = screen_up;
        self.screen_right = screen_right;
        true
    }

    fn update_scale(&mut self) {
        let (w, h) = self.viewport;
        let diag = ((w as f64).powi(2) + (h as f64).powi(2)).sqrt();
        self.scale = diag / (2.0 * (self.fov_degrees.to_radians() / 2.0).tan());
    }

    fn is_valid(&self) -> bool {
        let unit = |v: Vec3| v.is_finite() && (v.len() - 1.0).abs() < UNIT_TOLERANCE;
        let square = |a: Vec3, b: Vec3| a.dot(b).abs() < UNIT_TOLERANCE;
        let (dir, su, sr) = (self.eye_direction, self.screen_up, self.screen_right);
        self.eye_position.is_finite()
            && unit(dir)
            && unit(su)
            && unit(sr)
            && square(su, dir)
            && square(sr, dir)
            && square(su, sr)
            && self.up.is_finite()
            && !self.up.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn along_z() -> Camera {
        Camera::new(Vec3::ZERO, Vec3::UNIT_Z, Vec3::UNIT_Y).unwrap()
    }

    #[test]
    fn on_axis_point_projects_to_origin() {
        let cam = along_z();
        for d in [0.5, 1.0, 7.0, 1000.0] {
            let p = cam.project(Vec3::new(0.0, 0.0, d));
            assert!((p.z - d).abs() < EPS);
            assert!(p.x.abs() < EPS && p.y.abs() < EPS);
        }
    }

    #[test]
    fn scale_follows_viewport_diagonal() {
        let mut cam = along_z();
        cam.set_viewport(300, 400).unwrap();
        cam.set_fov(90.0).unwrap();
        assert!((cam.scale() - 250.0).abs() < 1e-9);
        let p = cam.project(Vec3::new(1.0, 0.0, 2.0));
        assert!((p.x - 125.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_fov_rejected() {
        let mut cam = along_z();
        assert!(cam.set_fov(0.0).is_err());
        assert!(cam.set_fov(180.0).is_err());
        assert_eq!(cam.fov_degrees(), DEFAULT_FOV_DEGREES);
    }

    #[test]
    fn forward_and_pan_move_eye() {
        let mut cam = along_z();
        cam.apply(CameraOp::Forward(2.0));
        assert!((cam.eye_position().z - 2.0).abs() < EPS);
        cam.apply(CameraOp::Pan { dx: 1.0, dy: 1.0 });
        let eye = cam.eye_position();
        assert!((eye - (Vec3::new(0.0, 1.0, 2.0) - cam.screen_right())).len() < EPS);
    }

    #[test]
    fn pivot_keeps_distance_to_target() {
        let mut cam = Camera::default();
        let target = cam.eye_position() + cam.eye_direction() * 5.0;
        for _ in 0..50 {
            cam.apply(CameraOp::Pivot {
                dx: 0.07,
                dy: 0.03,
                distance: 5.0,
            });
        }
        let new_target = cam.eye_position() + cam.eye_direction() * 5.0;
        assert!(new_target.distance(target) < 1e-6);
    }

    #[test]
    fn looking_straight_up_keeps_valid_basis() {
        let mut cam = along_z();
        for _ in 0..40 {
            assert!(cam.apply(CameraOp::Rotate { dx: 0.0, dy: 0.1 }));
        }
        assert!((cam.eye_direction().len() - 1.0).abs() < 1e-9);
        assert!(cam.screen_right().dot(cam.eye_direction()).abs() < 1e-9);
    }

    #[test]
    fn degenerate_op_is_rolled_back() {
        let mut cam = along_z();
        let before = cam.clone();
        assert!(!cam.apply(CameraOp::Forward(f64::NAN)));
        assert_eq!(cam, before);
        assert!(Camera::new(Vec3::ZERO, Vec3::UNIT_Y, Vec3::UNIT_Y).is_err());
    }

    #[test]
    fn look_at_along_up_is_refused() {
        let mut cam = Camera::default();
        let before = cam.clone();
        assert!(!cam.look_at(cam.eye_position() + Vec3::UNIT_Y * 3.0));
        assert_eq!(cam, before);
        assert!(cam.screen_up().dot(cam.eye_direction()).abs() < 1e-9);
    }

    #[test]
    fn restore_rejects_skewed_basis() {
        let skewed = Camera::restore(
            Vec3::ZERO,
            Vec3::UNIT_Z,
            Vec3::UNIT_Y,
            Vec3::UNIT_Z,
            Vec3::UNIT_Z,
            45.0,
        );
        assert!(skewed.is_err());

        let cam = along_z();
        let back = Camera::restore(
            cam.eye_position(),
            cam.eye_direction(),
            cam.up(),
            cam.screen_up(),
            cam.screen_right(),
            cam.fov_degrees(),
        )
        .unwrap();
        assert_eq!(back, cam);
    }
}
