//! Scene model: plotted functions, axes, fog and the camera.
//!
//! Mutators validate their input and leave the previous state in place on
//! error. Anything that changes the sampled geometry (definition, grid size,
//! curve flag, bin data) drops the cached tessellation; [`Scene::refresh`]
//! rebuilds stale caches.

use tracing::debug;

use crate::{
    camera::Camera,
    color::Rgba,
    error::SceneError,
    expr::ExpressionEvaluator,
    math::Vec3,
    tessellate::{tessellate_bins, tessellate_expression, BinGrid, Tessellation},
};

pub const MIN_GRID_DIVS: usize = 2;
pub const MAX_GRID_DIVS: usize = 2000;
pub const DEFAULT_GRID_DIVS: usize = 20;
pub const DEFAULT_EXPRESSION: &str = "x=x; y=y; z=0";

/// Where a function's points come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionSource {
    Expression(String),
    /// Histogram data supplied by the caller; not persisted.
    Bins(BinGrid),
}

/// A plotted curve or surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFunction {
    pub name: String,
    source: FunctionSource,
    is_curve: bool,
    grid_divs_u: usize,
    grid_divs_v: usize,
    pub fill_surface: bool,
    pub curve_color: Rgba,
    pub surface_color: Rgba,
    pub curve_width: i32,
    pub absolute_width: bool,
    pub visible: bool,
    cache: Option<Tessellation>,
}

impl ModelFunction {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FunctionSource::Expression(expression.into()),
            is_curve: false,
            grid_divs_u: DEFAULT_GRID_DIVS,
            grid_divs_v: DEFAULT_GRID_DIVS,
            fill_surface: true,
            curve_color: Rgba::rgb(20, 20, 90),
            surface_color: Rgba::rgb(90, 140, 220),
            curve_width: 1,
            absolute_width: true,
            visible: true,
            cache: None,
        }
    }

    /// A filled surface over histogram bins, one grid node per bin.
    pub fn from_bins(name: impl Into<String>, bins: BinGrid) -> Self {
        let mut f = Self::new(name, String::new());
        f.grid_divs_u = bins.cols();
        f.grid_divs_v = bins.rows();
        f.source = FunctionSource::Bins(bins);
        f
    }

    pub fn source(&self) -> &FunctionSource {
        &self.source
    }

    /// The definition text, or `None` for histogram-backed functions.
    pub fn expression(&self) -> Option<&str> {
        match &self.source {
            FunctionSource::Expression(e) => Some(e),
            FunctionSource::Bins(_) => None,
        }
    }

    pub fn is_curve(&self) -> bool {
        self.is_curve
    }

    pub fn grid_divs(&self) -> (usize, usize) {
        (self.grid_divs_u, self.grid_divs_v)
    }

    pub fn set_expression(&mut self, expression: impl Into<String>) {
        let expression = expression.into();
        if self.expression() != Some(expression.as_str()) {
            self.source = FunctionSource::Expression(expression);
            self.cache = None;
        }
    }

    /// Sets the sampling resolution. `divs_v` is ignored for curves but still
    /// validated and kept for when the function becomes a surface again.
    pub fn set_grid_divs(&mut self, divs_u: usize, divs_v: usize) -> Result<(), SceneError> {
        let ok = |n: usize| (MIN_GRID_DIVS..=MAX_GRID_DIVS).contains(&n);
        if !ok(divs_u) || !ok(divs_v) {
            return Err(SceneError::InvalidGrid {
                u: divs_u,
                v: divs_v,
                min: MIN_GRID_DIVS,
                max: MAX_GRID_DIVS,
            });
        }
        if let FunctionSource::Bins(_) = self.source {
            return Err(SceneError::HistogramGrid(self.name.clone()));
        }
        if (divs_u, divs_v) != (self.grid_divs_u, self.grid_divs_v) {
            self.grid_divs_u = divs_u;
            self.grid_divs_v = divs_v;
            self.cache = None;
        }
        Ok(())
    }

    pub fn set_curve(&mut self, is_curve: bool) {
        if matches!(self.source, FunctionSource::Bins(_)) {
            return;
        }
        if self.is_curve != is_curve {
            self.is_curve = is_curve;
            self.cache = None;
        }
    }

    /// Dimensions the cached grid must have.
    pub fn expected_dims(&self) -> (usize, usize) {
        let v = if self.is_curve { 1 } else { self.grid_divs_v };
        (self.grid_divs_u, v)
    }

    pub fn tessellation(&self) -> Option<&Tessellation> {
        self.cache.as_ref()
    }

    /// Length (curves) or area (surfaces) of the cached grid.
    pub fn measure(&self) -> Option<f64> {
        self.cache.as_ref().map(|t| t.measure)
    }

    pub fn needs_tessellation(&self) -> bool {
        self.cache
            .as_ref()
            .map_or(true, |t| t.grid.dims() != self.expected_dims())
    }

    /// Rebuilds the cached grid. Returns the vertical range for histogram
    /// sources so the caller can fit the axis.
    pub fn tessellate(&mut self, evaluator: &mut dyn ExpressionEvaluator) -> Option<(f64, f64)> {
        let (tess, z_range) = match &self.source {
            FunctionSource::Expression(expr) => (
                tessellate_expression(
                    expr,
                    self.grid_divs_u,
                    self.grid_divs_v,
                    self.is_curve,
                    evaluator,
                ),
                None,
            ),
            FunctionSource::Bins(bins) => {
                let (tess, range) = tessellate_bins(bins);
                (tess, Some(range))
            }
        };
        debug!(
            name = %self.name,
            dims = ?tess.grid.dims(),
            measure = tess.measure,
            "Tessellated function"
        );
        self.cache = Some(tess);
        z_range
    }
}

/// One coordinate axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub name: String,
    pub direction: Vec3,
    pub shown: bool,
    min: f64,
    max: f64,
}

impl AxisSpec {
    pub fn new(name: impl Into<String>, direction: Vec3, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            direction,
            shown: true,
            min,
            max,
        }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn set_range(&mut self, min: f64, max: f64) -> Result<(), SceneError> {
        if !(min < max) || !min.is_finite() || !max.is_finite() {
            return Err(SceneError::InvalidRange { min, max });
        }
        self.min = min;
        self.max = max;
        Ok(())
    }
}

/// The three axes and their shared tick styling.
#[derive(Debug, Clone, PartialEq)]
pub struct AxesDefinition {
    pub axes: [AxisSpec; 3],
    tick_increment: f64,
    tick_label_density: f64,
    pub color: Rgba,
    pub line_width: i32,
    /// Draw arrow heads at the max end.
    pub arrows: bool,
}

impl Default for AxesDefinition {
    fn default() -> Self {
        // World Y is vertical, so the evaluated `y` runs along world Z.
        Self {
            axes: [
                AxisSpec::new("x", Vec3::UNIT_X, -1.0, 1.0),
                AxisSpec::new("y", Vec3::UNIT_Z, -1.0, 1.0),
                AxisSpec::new("z", Vec3::UNIT_Y, -1.0, 1.0),
            ],
            tick_increment: 0.1,
            tick_label_density: 0.5,
            color: Rgba::rgb(60, 60, 60),
            line_width: 1,
            arrows: true,
        }
    }
}

impl AxesDefinition {
    pub fn tick_increment(&self) -> f64 {
        self.tick_increment
    }

    pub fn tick_label_density(&self) -> f64 {
        self.tick_label_density
    }

    pub fn set_ticks(&mut self, increment: f64, label_density: f64) -> Result<(), SceneError> {
        for (what, value) in [
            ("tick increment", increment),
            ("tick label density", label_density),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SceneError::NonPositive { what, value });
            }
        }
        self.tick_increment = increment;
        self.tick_label_density = label_density;
        Ok(())
    }

    pub fn axis_mut(&mut self, index: usize) -> Result<&mut AxisSpec, SceneError> {
        self.axes
            .get_mut(index)
            .ok_or(SceneError::NoSuchAxis(index))
    }
}

/// Distance-based blending toward the background color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogSettings {
    pub enabled: bool,
    start: f64,
    end: f64,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start: 5.0,
            end: 20.0,
        }
    }
}

impl FogSettings {
    pub fn new(enabled: bool, start: f64, end: f64) -> Result<Self, SceneError> {
        if !(start < end) || !start.is_finite() || !end.is_finite() {
            return Err(SceneError::InvalidRange {
                min: start,
                max: end,
            });
        }
        Ok(Self {
            enabled,
            start,
            end,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Blend factor in `[0, 1]`; always `0` when fog is off.
    pub fn blend(&self, depth: f64) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        ((depth - self.start) / (self.end - self.start)).clamp(0.0, 1.0)
    }
}

/// Render-time switch; does not affect tessellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Depth-sorted elements with fills and fog.
    #[default]
    Solid,
    /// Unsorted clipped lines.
    Wireframe,
}

impl RenderMode {
    pub fn to_flag(self) -> i32 {
        match self {
            RenderMode::Solid => 0,
            RenderMode::Wireframe => 1,
        }
    }

    pub fn from_flag(flag: i32) -> Option<Self> {
        match flag {
            0 => Some(RenderMode::Solid),
            1 => Some(RenderMode::Wireframe),
            _ => None,
        }
    }
}

/// Everything that is drawn, plus the viewpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub title: String,
    pub camera: Camera,
    pub background: Rgba,
    pub fog: FogSettings,
    pub mode: RenderMode,
    functions: Vec<ModelFunction>,
    pub show_axes: bool,
    pub axes: AxesDefinition,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            camera: Camera::default(),
            background: Rgba::WHITE,
            fog: FogSettings::default(),
            mode: RenderMode::Solid,
            functions: Vec::new(),
            show_axes: true,
            axes: AxesDefinition::default(),
        }
    }
}

impl Scene {
    /// An empty scene viewed through `camera`; other settings take their
    /// defaults.
    pub fn new(title: impl Into<String>, camera: Camera) -> Self {
        Self {
            title: title.into(),
            camera,
            ..Self::default()
        }
    }

    pub fn functions(&self) -> &[ModelFunction] {
        &self.functions
    }

    pub fn function(&self, index: usize) -> Result<&ModelFunction, SceneError> {
        let len = self.functions.len();
        self.functions
            .get(index)
            .ok_or(SceneError::NoSuchFunction { index, len })
    }

    pub fn function_mut(&mut self, index: usize) -> Result<&mut ModelFunction, SceneError> {
        let len = self.functions.len();
        self.functions
            .get_mut(index)
            .ok_or(SceneError::NoSuchFunction { index, len })
    }

    /// Appends a surface with the default definition; returns its index.
    pub fn add_function(&mut self) -> usize {
        let name = format!("f{}", self.functions.len() + 1);
        self.push_function(ModelFunction::new(name, DEFAULT_EXPRESSION))
    }

    pub fn add_bins_function(&mut self, name: impl Into<String>, bins: BinGrid) -> usize {
        self.push_function(ModelFunction::from_bins(name, bins))
    }

    pub fn push_function(&mut self, function: ModelFunction) -> usize {
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn remove_function(&mut self, index: usize) -> Result<ModelFunction, SceneError> {
        let len = self.functions.len();
        if index >= len {
            return Err(SceneError::NoSuchFunction { index, len });
        }
        Ok(self.functions.remove(index))
    }

    /// Tessellates every function whose cache is stale. A histogram source
    /// also refits the vertical axis to its range. Returns how many functions
    /// were rebuilt.
    pub fn refresh(&mut self, evaluator: &mut dyn ExpressionEvaluator) -> usize {
        let mut rebuilt = 0;
        for f in &mut self.functions {
            if !f.needs_tessellation() {
                continue;
            }
            if let Some((lo, hi)) = f.tessellate(evaluator) {
                // Vertical world axis.
                if let Err(e) = self.axes.axes[2].set_range(lo, hi) {
                    debug!(error = %e, "Histogram range not applied to axis");
                }
            }
            rebuilt += 1;
        }
        rebuilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MevalEvaluator;

    #[test]
    fn cache_invalidated_by_geometry_changes() {
        let mut scene = Scene::default();
        let mut ev = MevalEvaluator::new();
        let i = scene.add_function();
        assert_eq!(scene.refresh(&mut ev), 1);
        assert_eq!(scene.refresh(&mut ev), 0);

        scene.function_mut(i).unwrap().curve_color = Rgba::BLACK;
        assert_eq!(scene.refresh(&mut ev), 0);

        scene.function_mut(i).unwrap().set_grid_divs(5, 6).unwrap();
        assert_eq!(scene.refresh(&mut ev), 1);
        assert_eq!(
            scene.function(i).unwrap().tessellation().unwrap().grid.dims(),
            (5, 6)
        );

        scene.function_mut(i).unwrap().set_curve(true);
        scene.refresh(&mut ev);
        assert_eq!(
            scene.function(i).unwrap().tessellation().unwrap().grid.dims(),
            (5, 1)
        );
    }

    #[test]
    fn invalid_inputs_keep_previous_state() {
        let mut scene = Scene::default();
        let i = scene.add_function();
        let f = scene.function_mut(i).unwrap();
        assert!(f.set_grid_divs(1, 10).is_err());
        assert_eq!(f.grid_divs(), (DEFAULT_GRID_DIVS, DEFAULT_GRID_DIVS));

        assert!(scene.axes.axes[0].set_range(2.0, 2.0).is_err());
        assert_eq!(scene.axes.axes[0].range(), (-1.0, 1.0));
        assert!(scene.axes.set_ticks(0.0, 1.0).is_err());
        assert!(FogSettings::new(true, 10.0, 3.0).is_err());
        assert!(scene.remove_function(4).is_err());
    }

    #[test]
    fn fog_blend_clamped_and_monotone() {
        let fog = FogSettings::new(true, 2.0, 6.0).unwrap();
        let samples: Vec<f64> = (0..=80).map(|i| fog.blend(i as f64 * 0.1)).collect();
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fog.blend(0.0), 0.0);
        assert_eq!(fog.blend(4.0), 0.5);
        assert_eq!(fog.blend(100.0), 1.0);
        assert_eq!(FogSettings::default().blend(100.0), 0.0);
    }

    #[test]
    fn histogram_refresh_fits_vertical_axis() {
        let mut scene = Scene::default();
        let bins = BinGrid::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]], (0.0, 1.0), (0.0, 1.0))
            .unwrap();
        scene.add_bins_function("h", bins);
        scene.refresh(&mut MevalEvaluator::new());
        assert_eq!(scene.axes.axes[2].range(), (0.0, 5.0));
    }
}
