use std::ops::{Deref, DerefMut};

use glam::Vec2;

use crate::backend::ComputeBackend;
use crate::config::Sim2DConfig;
use crate::error::EngineResult;
use crate::grid::GridShape;
use crate::kernel::Dimension;
use crate::preset::{DisplaySettings, PresetRecord};
use crate::symmetry::SymmetrySet;

use super::Controller;

/// Surface automaton with up to four independent channels.
///
/// The grid tracks the display resolution and can be painted with a brush.
/// Shared controls come from [`Controller`] through `Deref`.
pub struct Sim2D<B: ComputeBackend> {
    core: Controller<B>,
    brush_radius: f32,
    display: DisplaySettings,
}

impl<B: ComputeBackend> Sim2D<B> {
    pub fn new(backend: B, config: Sim2DConfig) -> EngineResult<Self> {
        let shape = GridShape::surface(config.width.max(1), config.height.max(1), config.channels);
        let core = Controller::new(
            backend,
            Dimension::Two,
            shape,
            config.rule,
            config.edges,
            config.cadence,
            config.seed,
        )?;
        Ok(Self {
            core,
            brush_radius: config.brush_radius.max(0.0),
            display: DisplaySettings::surface(),
        })
    }

    /// Follow a display resolution change: reallocate and reset.
    ///
    /// Zero dimensions and surfaces the backend cannot hold are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            tracing::debug!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }
        let channels = self.core.shape().channels;
        self.core
            .reallocate(GridShape::surface(width, height, channels))
    }

    /// Change the channel count and reset. Ignored outside `1..=4`.
    pub fn set_channels(&mut self, channels: u32) -> EngineResult<()> {
        if !(1..=4).contains(&channels) {
            tracing::debug!("Ignoring channel count {}", channels);
            return Ok(());
        }
        let shape = self.core.shape();
        self.core
            .reallocate(GridShape::surface(shape.width, shape.height, channels))
    }

    pub fn brush_radius(&self) -> f32 {
        self.brush_radius
    }

    /// Brush radius in cells. Ignored if negative or not finite.
    pub fn set_brush_radius(&mut self, radius: f32) {
        if !radius.is_finite() || radius < 0.0 {
            tracing::debug!("Ignoring brush radius {}", radius);
            return;
        }
        self.brush_radius = radius;
    }

    /// Set every channel to 1 within the brush around `rel`.
    ///
    /// `rel` is the pointer position normalized to the grid, each axis in
    /// [0, 1]; positions outside wrap around.
    pub fn mouse_draw(&mut self, rel: Vec2) -> EngineResult<()> {
        self.paint(rel, 1.0)
    }

    /// Set every channel to 0 within the brush around `rel`.
    pub fn mouse_erase(&mut self, rel: Vec2) -> EngineResult<()> {
        self.paint(rel, 0.0)
    }

    fn paint(&mut self, rel: Vec2, value: f32) -> EngineResult<()> {
        if !rel.is_finite() {
            return Ok(());
        }
        let center = Vec2::new(rel.x.rem_euclid(1.0), rel.y.rem_euclid(1.0));
        self.core.brush(center, self.brush_radius, value)
    }

    pub fn display(&self) -> &DisplaySettings {
        &self.display
    }

    pub fn set_display(&mut self, display: DisplaySettings) {
        self.display = display;
    }

    /// Snapshot of the current configuration as a preset record.
    pub fn to_preset(&self) -> PresetRecord {
        PresetRecord {
            sim_mode: Dimension::Two,
            seed: self.core.seed().to_string(),
            kernel: self.core.kernel().weights().to_vec(),
            activation: self.core.activation().clone(),
            symmetry: self.core.symmetries().to_flags(),
            shader: self.display.shader.clone(),
            size: None,
            compute_delay: None,
            wrap: None,
            blend: None,
            skip: None,
        }
    }

    /// Apply a preset record and reset with its seed.
    ///
    /// 3-D records and 3-D-only fields are ignored.
    pub fn apply_preset(&mut self, record: &PresetRecord) -> EngineResult<()> {
        if record.sim_mode != Dimension::Two {
            tracing::debug!("Ignoring {:?} preset record", record.sim_mode);
            return Ok(());
        }
        self.core.set_activation(record.activation.source())?;
        self.core
            .set_symmetries(SymmetrySet::from_flags(Dimension::Two, &record.symmetry));
        self.core.set_kernel(&record.kernel);
        self.display.shader = record.shader.clone();
        self.core.reset(Some(&record.seed))
    }
}

impl<B: ComputeBackend> Deref for Sim2D<B> {
    type Target = Controller<B>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<B: ComputeBackend> DerefMut for Sim2D<B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::library::{self, FillMode};

    fn blank(width: u32, height: u32) -> Sim2D<CpuBackend> {
        let preset = library::find(Dimension::Two, "blank_canvas").unwrap();
        let config = Sim2DConfig::new(width, height)
            .with_preset(&preset)
            .with_brush_radius(1.5);
        let mut sim = Sim2D::new(CpuBackend::new(), config).unwrap();
        sim.reset(Some("2d")).unwrap();
        sim
    }

    #[test]
    fn test_blank_canvas_starts_empty() {
        let mut sim = blank(16, 8);
        assert_eq!(sim.randomize_settings().fill, FillMode::Empty);
        assert!(sim.read_visible().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_draw_then_erase() {
        let mut sim = blank(16, 16);
        sim.mouse_draw(Vec2::new(0.5, 0.5)).unwrap();
        let shape = sim.shape();
        let grid = sim.read_visible().unwrap();
        assert_eq!(grid[shape.index(8, 8, 0, 0)], 1.0);
        assert_eq!(grid[shape.index(0, 0, 0, 0)], 0.0);
        let painted = grid.iter().filter(|&&v| v == 1.0).count();
        assert!(painted > 1);

        sim.mouse_erase(Vec2::new(0.5, 0.5)).unwrap();
        assert!(sim.read_visible().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_draw_wraps_across_edges() {
        let mut sim = blank(16, 16);
        sim.mouse_draw(Vec2::new(0.0, 0.0)).unwrap();
        let shape = sim.shape();
        let grid = sim.read_visible().unwrap();
        assert_eq!(grid[shape.index(0, 0, 0, 0)], 1.0);
        assert_eq!(grid[shape.index(15, 15, 0, 0)], 1.0);
    }

    #[test]
    fn test_resize_and_channels() {
        let mut sim = blank(8, 8);
        sim.resize(0, 4).unwrap();
        assert_eq!(sim.shape(), GridShape::surface(8, 8, 1));
        sim.resize(12, 4).unwrap();
        assert_eq!(sim.shape(), GridShape::surface(12, 4, 1));
        sim.set_channels(5).unwrap();
        sim.set_channels(0).unwrap();
        assert_eq!(sim.shape().channels, 1);
        sim.set_channels(3).unwrap();
        assert_eq!(sim.shape(), GridShape::surface(12, 4, 3));
        assert_eq!(sim.read_visible().unwrap().len(), 12 * 4 * 3);
    }

    #[test]
    fn test_brush_radius_validation() {
        let mut sim = blank(4, 4);
        sim.set_brush_radius(-1.0);
        sim.set_brush_radius(f32::INFINITY);
        assert_eq!(sim.brush_radius(), 1.5);
        sim.set_brush_radius(3.0);
        assert_eq!(sim.brush_radius(), 3.0);
    }

    #[test]
    fn test_brush_works_while_paused() {
        let mut sim = blank(8, 8);
        sim.set_paused(true);
        sim.mouse_draw(Vec2::new(0.5, 0.5)).unwrap();
        let frame = sim.render().unwrap();
        assert_eq!(frame.steps, 0);
        assert!(sim.read_visible().unwrap().iter().any(|&v| v == 1.0));
    }

    #[test]
    fn test_resize_beyond_backend_limit_ignored() {
        let backend = CpuBackend::new().with_max_cells(64);
        let mut sim = Sim2D::new(backend, Sim2DConfig::new(8, 8)).unwrap();
        sim.reset(Some("limit")).unwrap();

        sim.resize(9, 8).unwrap();
        assert_eq!(sim.shape(), GridShape::surface(8, 8, 1));
        sim.set_channels(2).unwrap();
        assert_eq!(sim.shape().channels, 1);

        sim.resize(4, 8).unwrap();
        sim.set_channels(2).unwrap();
        assert_eq!(sim.shape(), GridShape::surface(4, 8, 2));
        assert_eq!(sim.read_visible().unwrap().len(), 64);
    }
}
