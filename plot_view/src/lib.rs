//! `plot_view`
//!
//! Interactive side of the plot view:
//! - Navigation input model (drags, wheel, held keys)
//! - Camera controller with momentum
//! - The `PlotView` facade hosts talk to
//! - Console command interpreter
//! - SVG drawing surface

pub mod console;
pub mod controller;
pub mod input;
pub mod svg;
pub mod view;

pub use view::PlotView;
