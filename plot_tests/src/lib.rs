//! Shared fixtures for the integration tests.

use std::path::PathBuf;

use plot_shared::{color::Rgba, config::ViewConfig};
use plot_view::PlotView;

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A view with a saddle surface and a helix-like curve.
pub fn sample_view() -> anyhow::Result<PlotView> {
    let mut view = PlotView::new(ViewConfig::default())?;

    let saddle = view.add_function();
    view.set_expression(saddle, "z = x*x - y*y")?;
    view.set_grid(saddle, 12, 10)?;
    view.set_surface_color(saddle, Rgba::rgb(200, 80, 40))?;
    view.set_name(saddle, "saddle")?;

    let curve = view.add_function();
    view.set_expression(curve, "x = cos(6*u); y = sin(6*u); z = u")?;
    view.set_curve(curve, true)?;
    view.set_grid(curve, 64, 2)?;
    view.set_curve_width(curve, 4, false)?;
    view.set_name(curve, "spiral")?;

    Ok(view)
}

/// A path under the system temp dir unique to this process and `name`.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("plotview-{}-{}", std::process::id(), name))
}
