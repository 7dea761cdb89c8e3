//! Camera controller with momentum.
//!
//! Drags and the wheel move the camera immediately. Held keys set velocity
//! targets instead; every tick blends the current velocities toward their
//! targets and applies them, so motion eases in while a key is held and
//! coasts to a stop after release. Once every target is zero and every
//! velocity is below `epsilon` the controller reports [`TickOutcome::Settled`]
//! and the animation loop stops rescheduling itself.

use std::{collections::BTreeSet, time::Duration};

use plot_shared::{
    camera::{Camera, CameraOp},
    config::{MotionSpeeds, ViewConfig},
};
use tracing::{debug, trace};

use crate::input::{DragAction, InputEvent, NavKey};

/// Pivot radius floor so orbiting near the target stays well-defined.
const MIN_PIVOT_DISTANCE: f64 = 0.1;

/// Momentum tuning, derived from [`ViewConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
    /// Fraction of the gap to the target kept per `decay_interval`.
    pub decay: f64,
    pub decay_interval: Duration,
    pub epsilon: f64,
    pub speeds: MotionSpeeds,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self::from(&ViewConfig::default())
    }
}

impl From<&ViewConfig> for MotionConfig {
    fn from(cfg: &ViewConfig) -> Self {
        Self {
            decay: cfg.decay,
            decay_interval: Duration::from_millis(cfg.decay_interval_ms.max(1)),
            epsilon: cfg.epsilon,
            speeds: cfg.motion.clone(),
        }
    }
}

impl MotionConfig {
    /// Share of the remaining gap kept after `dt`.
    pub fn retain(&self, dt: Duration) -> f64 {
        self.decay
            .clamp(0.0, 1.0)
            .powf(dt.as_secs_f64() / self.decay_interval.as_secs_f64())
    }
}

/// One velocity component and where it is heading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Channel {
    pub current: f64,
    pub target: f64,
}

impl Channel {
    fn blend(&mut self, retain: f64) {
        self.current = self.target + (self.current - self.target) * retain;
    }

    fn is_idle(&self, epsilon: f64) -> bool {
        self.target == 0.0 && self.current.abs() < epsilon
    }
}

/// Velocities for every kind of camera motion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraVelocity {
    pub forward: Channel,
    pub pan: [Channel; 2],
    pub rotate: [Channel; 2],
    pub pivot: [Channel; 2],
    pub bank: Channel,
}

impl CameraVelocity {
    fn channels(&self) -> [&Channel; 8] {
        [
            &self.forward,
            &self.pan[0],
            &self.pan[1],
            &self.rotate[0],
            &self.rotate[1],
            &self.pivot[0],
            &self.pivot[1],
            &self.bank,
        ]
    }

    fn channels_mut(&mut self) -> [&mut Channel; 8] {
        let [pan_x, pan_y] = &mut self.pan;
        let [rot_x, rot_y] = &mut self.rotate;
        let [piv_x, piv_y] = &mut self.pivot;
        [
            &mut self.forward,
            pan_x,
            pan_y,
            rot_x,
            rot_y,
            piv_x,
            piv_y,
            &mut self.bank,
        ]
    }

    pub fn is_settled(&self, epsilon: f64) -> bool {
        self.channels().iter().all(|c| c.is_idle(epsilon))
    }

    /// Largest absolute current velocity.
    pub fn magnitude(&self) -> f64 {
        self.channels()
            .iter()
            .map(|c| c.current.abs())
            .fold(0.0, f64::max)
    }
}

/// Result of one animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The camera moved; schedule another tick.
    Moving,
    /// Nothing left to do; stop ticking.
    Settled,
}

/// Turns input into camera motion.
#[derive(Debug, Clone, Default)]
pub struct CameraController {
    config: MotionConfig,
    velocity: CameraVelocity,
    held: BTreeSet<NavKey>,
}

impl CameraController {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            velocity: CameraVelocity::default(),
            held: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn velocity(&self) -> &CameraVelocity {
        &self.velocity
    }

    /// Seeds a velocity directly, e.g. to carry drag momentum.
    pub fn velocity_mut(&mut self) -> &mut CameraVelocity {
        &mut self.velocity
    }

    pub fn held_keys(&self) -> impl Iterator<Item = NavKey> + '_ {
        self.held.iter().copied()
    }

    /// True while ticks still have work to do.
    pub fn is_animating(&self) -> bool {
        !self.velocity.is_settled(self.config.epsilon)
    }

    /// Drops all momentum and releases every key.
    pub fn stop(&mut self) {
        self.held.clear();
        self.velocity = CameraVelocity::default();
    }

    /// Handles one input event. Returns `true` if the camera changed and a
    /// repaint is needed now; key events only change targets and report
    /// `false`.
    pub fn handle(&mut self, event: InputEvent, camera: &mut Camera) -> bool {
        let s = &self.config.speeds;
        match event {
            InputEvent::Drag {
                dx,
                dy,
                button,
                modifiers,
            } => {
                let op = match DragAction::classify(button, modifiers) {
                    DragAction::Pan => CameraOp::Pan {
                        dx: dx * s.drag_pan,
                        dy: dy * s.drag_pan,
                    },
                    DragAction::Dolly => CameraOp::Forward(-dy * s.drag_forward),
                    DragAction::Rotate => CameraOp::Rotate {
                        dx: dx * s.drag_rotate,
                        dy: -dy * s.drag_rotate,
                    },
                    DragAction::Pivot => CameraOp::Pivot {
                        dx: -dx * s.drag_rotate,
                        dy: dy * s.drag_rotate,
                        distance: pivot_distance(camera),
                    },
                };
                trace!(?op, "Drag");
                camera.apply(op)
            }
            InputEvent::Wheel { delta } => camera.apply(CameraOp::Forward(delta * s.wheel_forward)),
            InputEvent::KeyDown(key) => {
                if self.held.insert(key) {
                    debug!(%key, "Key down");
                    self.update_targets();
                }
                false
            }
            InputEvent::KeyUp(key) => {
                if self.held.remove(&key) {
                    debug!(%key, "Key up");
                    self.update_targets();
                }
                false
            }
        }
    }

    fn update_targets(&mut self) {
        let held = |key| if self.held.contains(&key) { 1.0 } else { 0.0 };
        let axis = |neg, pos| held(pos) - held(neg);
        let s = &self.config.speeds;
        let v = &mut self.velocity;

        v.forward.target = s.forward * axis(NavKey::Backward, NavKey::Forward);
        v.pan[0].target = s.pan * axis(NavKey::PanLeft, NavKey::PanRight);
        v.pan[1].target = s.pan * axis(NavKey::PanDown, NavKey::PanUp);
        v.rotate[0].target = s.rotate * axis(NavKey::RotateLeft, NavKey::RotateRight);
        v.rotate[1].target = s.rotate * axis(NavKey::RotateDown, NavKey::RotateUp);
        v.pivot[0].target = s.pivot * axis(NavKey::PivotLeft, NavKey::PivotRight);
        v.pivot[1].target = s.pivot * axis(NavKey::PivotDown, NavKey::PivotUp);
        v.bank.target = s.bank * axis(NavKey::BankLeft, NavKey::BankRight);
    }

    /// Advances momentum by `dt` and moves the camera.
    pub fn tick(&mut self, camera: &mut Camera, dt: Duration) -> TickOutcome {
        let retain = self.config.retain(dt);
        for channel in self.velocity.channels_mut() {
            channel.blend(retain);
        }

        if self.velocity.is_settled(self.config.epsilon) {
            for channel in self.velocity.channels_mut() {
                channel.current = 0.0;
            }
            return TickOutcome::Settled;
        }

        let secs = dt.as_secs_f64();
        let v = self.velocity;
        let mut ops = Vec::with_capacity(5);
        if v.forward.current != 0.0 {
            ops.push(CameraOp::Forward(v.forward.current * secs));
        }
        if v.pan.iter().any(|c| c.current != 0.0) {
            ops.push(CameraOp::Pan {
                dx: v.pan[0].current * secs,
                dy: v.pan[1].current * secs,
            });
        }
        if v.rotate.iter().any(|c| c.current != 0.0) {
            ops.push(CameraOp::Rotate {
                dx: v.rotate[0].current * secs,
                dy: v.rotate[1].current * secs,
            });
        }
        if v.pivot.iter().any(|c| c.current != 0.0) {
            ops.push(CameraOp::Pivot {
                dx: v.pivot[0].current * secs,
                dy: v.pivot[1].current * secs,
                distance: pivot_distance(camera),
            });
        }
        if v.bank.current != 0.0 {
            ops.push(CameraOp::Bank(v.bank.current * secs));
        }
        for op in ops {
            if !camera.apply(op) {
                debug!(?op, "Camera op rejected");
            }
        }
        TickOutcome::Moving
    }
}

/// Orbit radius: distance from the eye to the world origin.
fn pivot_distance(camera: &Camera) -> f64 {
    camera.eye_position().len().max(MIN_PIVOT_DISTANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plot_shared::math::Vec3;

    const TICK: Duration = Duration::from_millis(50);

    #[test]
    fn retain_matches_decay_per_interval() {
        let cfg = MotionConfig::default();
        assert!((cfg.retain(Duration::from_millis(100)) - 0.2).abs() < 1e-12);
        assert!((cfg.retain(TICK) - 0.2f64.sqrt()).abs() < 1e-12);
        assert_eq!(cfg.retain(Duration::ZERO), 1.0);
    }

    #[test]
    fn released_velocity_settles() {
        let mut ctl = CameraController::default();
        let mut cam = Camera::default();
        ctl.velocity_mut().pan[0].current = 3.0;
        assert!(ctl.is_animating());

        let mut ticks = 0;
        while ctl.tick(&mut cam, TICK) == TickOutcome::Moving {
            ticks += 1;
            assert!(ticks < 100, "momentum never settled");
        }
        assert!(!ctl.is_animating());
        assert_eq!(ctl.velocity().magnitude(), 0.0);
    }

    #[test]
    fn held_key_accelerates_then_coasts() {
        let mut ctl = CameraController::default();
        let mut cam = Camera::default();
        let start = cam.eye_position();

        ctl.handle(InputEvent::KeyDown(NavKey::Forward), &mut cam);
        let mut speeds = Vec::new();
        for _ in 0..5 {
            assert_eq!(ctl.tick(&mut cam, TICK), TickOutcome::Moving);
            speeds.push(ctl.velocity().forward.current);
        }
        assert!(speeds.windows(2).all(|w| w[0] < w[1]));
        let toward_origin = (-start).normalize();
        assert!((cam.eye_position() - start).dot(toward_origin) > 0.0);

        ctl.handle(InputEvent::KeyUp(NavKey::Forward), &mut cam);
        let mut ticks = 0;
        while ctl.tick(&mut cam, TICK) == TickOutcome::Moving {
            ticks += 1;
            assert!(ticks < 100);
        }
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut ctl = CameraController::default();
        let mut cam = Camera::default();
        ctl.handle(InputEvent::KeyDown(NavKey::PanLeft), &mut cam);
        ctl.handle(InputEvent::KeyDown(NavKey::PanRight), &mut cam);
        assert_eq!(ctl.velocity().pan[0].target, 0.0);
        assert!(!ctl.is_animating());
    }

    #[test]
    fn wheel_moves_immediately() {
        let mut ctl = CameraController::default();
        let mut cam = Camera::new(Vec3::ZERO, Vec3::UNIT_Z, Vec3::UNIT_Y).unwrap();
        assert!(ctl.handle(InputEvent::Wheel { delta: 2.0 }, &mut cam));
        assert!((cam.eye_position().z - 1.0).abs() < 1e-12);
    }
}
