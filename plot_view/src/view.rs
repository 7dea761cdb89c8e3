//! The plot view facade.
//!
//! `PlotView` owns the scene, the expression evaluator and the camera
//! controller, and is the only thing hosts talk to. Every mutation that can
//! change the picture sets one `dirty` flag; the host polls
//! [`PlotView::take_dirty`] and repaints.

use std::{path::Path, time::Duration};

use anyhow::Context;
use plot_shared::{
    camera::Camera,
    color::Rgba,
    config::ViewConfig,
    error::SceneError,
    expr::MevalEvaluator,
    math::Vec3,
    persist,
    render::{DrawSurface, FrameStats, Renderer},
    scene::{FogSettings, ModelFunction, RenderMode, Scene},
    tessellate::BinGrid,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    controller::{CameraController, MotionConfig, TickOutcome},
    input::InputEvent,
};

pub struct PlotView {
    scene: Scene,
    evaluator: MevalEvaluator,
    controller: CameraController,
    renderer: Renderer,
    config: ViewConfig,
    dirty: bool,
}

impl PlotView {
    /// Builds an empty scene from `config`.
    pub fn new(config: ViewConfig) -> anyhow::Result<Self> {
        let mut scene = Scene::default();
        scene.background = config.background_color();
        scene.fog = FogSettings::new(config.fog.enabled, config.fog.start, config.fog.end)
            .context("fog configuration")?;
        scene
            .camera
            .set_fov(config.fov_degrees)
            .context("fov configuration")?;
        scene
            .camera
            .set_viewport(config.width, config.height)
            .context("viewport configuration")?;
        if !(config.near_clip > 0.0) {
            return Err(SceneError::NonPositive {
                what: "near clip",
                value: config.near_clip,
            })
            .context("near clip configuration");
        }

        Ok(Self {
            scene,
            evaluator: MevalEvaluator::new(),
            controller: CameraController::new(MotionConfig::from(&config)),
            renderer: Renderer::new(config.near_clip),
            config,
            dirty: true,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.scene.camera
    }

    pub fn camera_position(&self) -> Vec3 {
        self.scene.camera.eye_position()
    }

    pub fn controller(&self) -> &CameraController {
        &self.controller
    }

    /// Returns and clears the repaint flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn touched<T>(&mut self, result: Result<T, SceneError>) -> anyhow::Result<T> {
        let value = result?;
        self.dirty = true;
        Ok(value)
    }

    // ─── View settings ───

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.scene.title = title.into();
    }

    pub fn set_fov(&mut self, degrees: f64) -> anyhow::Result<()> {
        let r = self.scene.camera.set_fov(degrees);
        self.touched(r)
    }

    pub fn set_background(&mut self, color: Rgba) {
        self.scene.background = color;
        self.dirty = true;
    }

    pub fn set_fog(&mut self, enabled: bool, start: f64, end: f64) -> anyhow::Result<()> {
        let fog = FogSettings::new(enabled, start, end);
        let fog = self.touched(fog)?;
        self.scene.fog = fog;
        Ok(())
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if self.scene.mode != mode {
            self.scene.mode = mode;
            self.dirty = true;
        }
    }

    pub fn look_at(&mut self, target: Vec3) -> bool {
        let moved = self.scene.camera.look_at(target);
        self.dirty |= moved;
        moved
    }

    // ─── Functions ───

    /// Adds a surface with the default definition and returns its index.
    pub fn add_function(&mut self) -> usize {
        let index = self.scene.add_function();
        let divs = self.config.grid_divs;
        if let Ok(f) = self.scene.function_mut(index) {
            if let Err(e) = f.set_grid_divs(divs, divs) {
                debug!(error = %e, "Configured grid size not applied");
            }
        }
        self.dirty = true;
        info!(index, "Function added");
        index
    }

    /// Adds a histogram surface; the vertical axis is fitted on the next
    /// refresh.
    pub fn add_histogram(&mut self, name: impl Into<String>, bins: BinGrid) -> usize {
        let index = self.scene.add_bins_function(name, bins);
        self.dirty = true;
        info!(index, "Histogram added");
        index
    }

    pub fn remove_function(&mut self, index: usize) -> anyhow::Result<ModelFunction> {
        let r = self.scene.remove_function(index);
        self.touched(r)
    }

    pub fn function(&self, index: usize) -> anyhow::Result<&ModelFunction> {
        Ok(self.scene.function(index)?)
    }

    fn edit<T>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut ModelFunction) -> Result<T, SceneError>,
    ) -> anyhow::Result<T> {
        let r = self.scene.function_mut(index).and_then(f);
        self.touched(r)
    }

    /// Replaces a function's definition. A definition that does not parse is
    /// rejected and the previous one kept.
    pub fn set_expression(&mut self, index: usize, expression: &str) -> anyhow::Result<()> {
        self.scene.function(index)?;
        self.evaluator
            .check(expression)
            .with_context(|| format!("function {index}"))?;
        self.edit(index, |f| {
            f.set_expression(expression);
            Ok(())
        })
    }

    pub fn set_grid(&mut self, index: usize, divs_u: usize, divs_v: usize) -> anyhow::Result<()> {
        self.edit(index, |f| f.set_grid_divs(divs_u, divs_v))
    }

    pub fn set_curve(&mut self, index: usize, is_curve: bool) -> anyhow::Result<()> {
        self.edit(index, |f| {
            f.set_curve(is_curve);
            Ok(())
        })
    }

    pub fn set_fill(&mut self, index: usize, fill: bool) -> anyhow::Result<()> {
        self.edit(index, |f| {
            f.fill_surface = fill;
            Ok(())
        })
    }

    pub fn set_curve_color(&mut self, index: usize, color: Rgba) -> anyhow::Result<()> {
        self.edit(index, |f| {
            f.curve_color = color;
            Ok(())
        })
    }

    pub fn set_surface_color(&mut self, index: usize, color: Rgba) -> anyhow::Result<()> {
        self.edit(index, |f| {
            f.surface_color = color;
            Ok(())
        })
    }

    /// `absolute` widths are pixels; otherwise hundredths of a world unit.
    pub fn set_curve_width(&mut self, index: usize, width: i32, absolute: bool) -> anyhow::Result<()> {
        self.edit(index, |f| {
            if width < 0 {
                return Err(SceneError::NonPositive {
                    what: "curve width",
                    value: width as f64,
                });
            }
            f.curve_width = width;
            f.absolute_width = absolute;
            Ok(())
        })
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> anyhow::Result<()> {
        self.edit(index, |f| {
            f.visible = visible;
            Ok(())
        })
    }

    pub fn set_name(&mut self, index: usize, name: &str) -> anyhow::Result<()> {
        self.edit(index, |f| {
            f.name = name.to_string();
            Ok(())
        })
    }

    /// Tessellates stale functions. Returns how many were rebuilt.
    pub fn refresh(&mut self) -> usize {
        let functions = self.scene.functions();
        self.evaluator
            .retain(|source| functions.iter().any(|f| f.expression() == Some(source)));
        let rebuilt = self.scene.refresh(&mut self.evaluator);
        if rebuilt > 0 {
            debug!(rebuilt, cached = self.evaluator.cached(), "Functions tessellated");
        }
        rebuilt
    }

    /// Number of parsed definitions the evaluator is holding.
    pub fn cached_definitions(&self) -> usize {
        self.evaluator.cached()
    }

    /// Curve length or surface area of a tessellated function.
    pub fn measure(&mut self, index: usize) -> anyhow::Result<f64> {
        self.scene.function(index)?;
        self.refresh();
        let f = self.scene.function(index)?;
        f.measure()
            .with_context(|| format!("function {index} has no geometry"))
    }

    // ─── Axes ───

    pub fn set_axis_range(&mut self, axis: usize, min: f64, max: f64) -> anyhow::Result<()> {
        let r = self
            .scene
            .axes
            .axis_mut(axis)
            .and_then(|a| a.set_range(min, max));
        self.touched(r)
    }

    pub fn set_axis_shown(&mut self, axis: usize, shown: bool) -> anyhow::Result<()> {
        let r = self.scene.axes.axis_mut(axis).map(|a| a.shown = shown);
        self.touched(r)
    }

    pub fn set_axes_shown(&mut self, shown: bool) {
        self.scene.show_axes = shown;
        self.dirty = true;
    }

    pub fn set_ticks(&mut self, increment: f64, label_density: f64) -> anyhow::Result<()> {
        let r = self.scene.axes.set_ticks(increment, label_density);
        self.touched(r)
    }

    // ─── Rendering ───

    /// Renders at `width` × `height` into `surface`, tessellating stale
    /// functions first.
    pub fn render(
        &mut self,
        width: u32,
        height: u32,
        surface: &mut dyn DrawSurface,
    ) -> anyhow::Result<FrameStats> {
        if self.scene.camera.viewport() != (width, height) {
            self.scene
                .camera
                .set_viewport(width, height)
                .context("resize")?;
        }
        self.refresh();
        Ok(self.renderer.render(&self.scene, surface))
    }

    // ─── Navigation ───

    /// Feeds one input event to the controller. Returns `true` if the camera
    /// moved.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        let moved = self.controller.handle(event, &mut self.scene.camera);
        self.dirty |= moved;
        moved
    }

    /// One momentum step.
    pub fn tick(&mut self, dt: Duration) -> TickOutcome {
        let outcome = self.controller.tick(&mut self.scene.camera, dt);
        if outcome == TickOutcome::Moving {
            self.dirty = true;
        }
        outcome
    }

    pub fn is_animating(&self) -> bool {
        self.controller.is_animating()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_ms.max(1))
    }

    /// Runs the fixed-cadence momentum loop until it settles or `max_ticks`
    /// have elapsed. Returns the number of moving ticks.
    pub async fn run_momentum(&mut self, max_ticks: u32) -> u32 {
        let dt = self.tick_interval();
        let mut next = Instant::now();
        let mut moved = 0;
        while moved < max_ticks {
            next += dt;
            if self.tick(dt) == TickOutcome::Settled {
                break;
            }
            moved += 1;
            tokio::time::sleep_until(next).await;
        }
        debug!(ticks = moved, "Momentum loop stopped");
        moved
    }

    // ─── Persistence ───

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        persist::save_scene(path, &self.scene)
            .with_context(|| format!("saving scene to {}", path.display()))
    }

    /// Replaces the scene with the one at `path`. On any error the current
    /// scene is left exactly as it was.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut scene = persist::load_scene(path)
            .with_context(|| format!("loading scene from {}", path.display()))?;
        let (w, h) = self.scene.camera.viewport();
        scene.camera.set_viewport(w, h)?;
        self.scene = scene;
        self.controller.stop();
        self.dirty = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plot_shared::render::NullSurface;

    fn view() -> PlotView {
        PlotView::new(ViewConfig::default()).unwrap()
    }

    #[test]
    fn mutations_mark_dirty() {
        let mut v = view();
        assert!(v.take_dirty());
        assert!(!v.take_dirty());

        let i = v.add_function();
        assert!(v.take_dirty());
        v.set_curve_color(i, Rgba::BLACK).unwrap();
        assert!(v.take_dirty());

        assert!(v.set_grid(i, 1, 1).is_err());
        assert!(!v.take_dirty());
    }

    #[test]
    fn bad_expression_keeps_previous() {
        let mut v = view();
        let i = v.add_function();
        v.set_expression(i, "z = x*y").unwrap();
        assert!(v.set_expression(i, "z = (x").is_err());
        assert_eq!(v.function(i).unwrap().expression(), Some("z = x*y"));
    }

    #[test]
    fn render_tessellates_first() {
        let mut v = view();
        let i = v.add_function();
        v.set_grid(i, 5, 5).unwrap();
        let stats = v.render(320, 240, &mut NullSurface).unwrap();
        assert!(stats.elements > 0);
        assert_eq!(v.camera().viewport(), (320, 240));
        assert!(v.function(i).unwrap().tessellation().is_some());
    }

    #[test]
    fn histogram_grid_cannot_be_resized() {
        let mut v = view();
        let bins = BinGrid::new(vec![vec![1.0, 2.0, 3.0]; 2], (0.0, 1.0), (0.0, 1.0)).unwrap();
        let i = v.add_histogram("h", bins);
        v.take_dirty();
        assert!(v.set_grid(i, 8, 8).is_err());
        assert_eq!(v.function(i).unwrap().grid_divs(), (3, 2));
        assert!(!v.take_dirty());
    }

    #[test]
    fn parse_cache_tracks_live_definitions() {
        let mut v = view();
        let i = v.add_function();
        for k in 1..=20 {
            v.set_expression(i, &format!("z = {k} * x")).unwrap();
            assert!(v.set_expression(i, &format!("z = ({k}")).is_err());
        }
        v.refresh();
        assert_eq!(v.cached_definitions(), 1);
    }

    #[test]
    fn flat_square_has_area_four() {
        let mut v = view();
        let i = v.add_function();
        assert!((v.measure(i).unwrap() - 4.0).abs() < 1e-9);
    }
}
