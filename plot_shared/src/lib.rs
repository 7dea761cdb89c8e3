//! `plot_shared`
//!
//! The backend-independent core of the plot view.
//!
//! Design goals:
//! - Pure CPU rendering through a small drawing trait; no GPU, no z-buffer.
//! - Clear separation of concerns (camera, scene, tessellation, elements,
//!   rendering, persistence).
//! - Invalid input is rejected with a typed error and leaves state intact.
//! - No `unsafe`.

pub mod assemble;
pub mod camera;
pub mod color;
pub mod config;
pub mod element;
pub mod error;
pub mod expr;
pub mod math;
pub mod persist;
pub mod render;
pub mod scene;
pub mod tessellate;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::camera::{Camera, CameraOp};
    pub use crate::color::Rgba;
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::expr::{ExpressionEvaluator, MevalEvaluator};
    pub use crate::math::*;
    pub use crate::render::{render_scene, DrawSurface, Renderer, ScreenPoint};
    pub use crate::scene::*;
}
