//! Simulation configuration builders.
//!
//! Builders clamp out-of-range values. The runtime setters on
//! [`Sim2D`](crate::sim::Sim2D) and [`Sim3D`](crate::sim::Sim3D) instead
//! ignore invalid input and leave state unchanged.

use crate::grid::Edges;
use crate::kernel::{Activation, Dimension, Kernel};
use crate::library::{self, FillMode, LibraryPreset};
use crate::stages::RandomizeSettings;
use crate::symmetry::SymmetrySet;

/// Largest 3-D side length.
pub const MAX_SIZE: u32 = 512;

/// 3-D side length used when none is given.
pub const DEFAULT_SIZE: u32 = 64;

/// Automaton rule and start settings shared by both dimensions.
#[derive(Clone, Debug)]
pub struct RuleConfig {
    pub kernel: Kernel,
    pub activation: Activation,
    pub symmetries: SymmetrySet,
    pub randomize: RandomizeSettings,
}

impl RuleConfig {
    /// Rule taken from a library preset.
    pub fn from_preset(preset: &LibraryPreset) -> Self {
        Self {
            kernel: preset.kernel.clone(),
            activation: preset.activation.clone(),
            symmetries: preset.symmetries.clone(),
            randomize: RandomizeSettings {
                fill: preset.fill,
                region: preset.region,
                density: preset.density,
            },
        }
    }

    /// The default preset for `dimension`.
    pub fn default_for(dimension: Dimension) -> Self {
        Self::from_preset(&library::default_preset(dimension))
    }
}

/// Step cadence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CadenceConfig {
    /// Render ticks per step; 0 and 1 both step every tick.
    pub compute_delay: u32,
    /// Run two steps per due tick.
    pub skip_every_other: bool,
}

/// Configuration for a [`Sim3D`](crate::sim::Sim3D).
#[derive(Clone, Debug)]
pub struct Sim3DConfig {
    /// Side length of the cubic volume.
    pub size: u32,
    /// Seed for the first reset; a time-derived seed if `None`.
    pub seed: Option<String>,
    pub edges: Edges,
    pub cadence: CadenceConfig,
    pub rule: RuleConfig,
}

impl Default for Sim3DConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl Sim3DConfig {
    /// Volume of side `size`, clamped to `1..=512`, running the default preset.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = Sim3DConfig::new(96)
    ///     .with_seed("clouds-1")
    ///     .with_region(0.5)
    ///     .with_skip_every_other(true);
    /// ```
    pub fn new(size: u32) -> Self {
        Self {
            size: size.clamp(1, MAX_SIZE),
            seed: None,
            edges: Edges::clamp(),
            cadence: CadenceConfig::default(),
            rule: RuleConfig::default_for(Dimension::Three),
        }
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_edges(mut self, edges: Edges) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_compute_delay(mut self, delay: u32) -> Self {
        self.cadence.compute_delay = delay;
        self
    }

    pub fn with_skip_every_other(mut self, skip: bool) -> Self {
        self.cadence.skip_every_other = skip;
        self
    }

    /// Use a library preset's kernel, activation and start settings.
    pub fn with_preset(mut self, preset: &LibraryPreset) -> Self {
        self.rule = RuleConfig::from_preset(preset);
        self
    }

    /// Replace the kernel. Ignored unless it has 27 weights.
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        if kernel.dimension() == Dimension::Three {
            self.rule.kernel = kernel;
        }
        self
    }

    pub fn with_activation(mut self, activation: impl Into<String>) -> Self {
        self.rule.activation = Activation::new(activation);
        self
    }

    pub fn with_fill(mut self, fill: FillMode) -> Self {
        self.rule.randomize.fill = fill;
        self
    }

    /// Seeded fraction of each axis, clamped to (0, 1].
    pub fn with_region(mut self, region: f32) -> Self {
        self.rule.randomize.region = region.clamp(f32::EPSILON, 1.0);
        self
    }

    /// Seeding probability, clamped to [0, 1].
    pub fn with_density(mut self, density: f32) -> Self {
        self.rule.randomize.density = density.clamp(0.0, 1.0);
        self
    }
}

/// Configuration for a [`Sim2D`](crate::sim::Sim2D).
#[derive(Clone, Debug)]
pub struct Sim2DConfig {
    pub width: u32,
    pub height: u32,
    /// Independent channels per cell, 1 to 4.
    pub channels: u32,
    pub seed: Option<String>,
    pub edges: Edges,
    pub cadence: CadenceConfig,
    /// Brush radius in cells.
    pub brush_radius: f32,
    pub rule: RuleConfig,
}

impl Default for Sim2DConfig {
    fn default() -> Self {
        Self::new(512, 512)
    }
}

impl Sim2DConfig {
    /// Single-channel surface of `width x height` cells (each at least 1).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            channels: 1,
            seed: None,
            edges: Edges::wrap(),
            cadence: CadenceConfig::default(),
            brush_radius: 10.0,
            rule: RuleConfig::default_for(Dimension::Two),
        }
    }

    /// Channels per cell, clamped to `1..=4`.
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = channels.clamp(1, 4);
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_edges(mut self, edges: Edges) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_compute_delay(mut self, delay: u32) -> Self {
        self.cadence.compute_delay = delay;
        self
    }

    pub fn with_skip_every_other(mut self, skip: bool) -> Self {
        self.cadence.skip_every_other = skip;
        self
    }

    /// Brush radius in cells, at least 0.
    pub fn with_brush_radius(mut self, radius: f32) -> Self {
        self.brush_radius = radius.max(0.0);
        self
    }

    pub fn with_preset(mut self, preset: &LibraryPreset) -> Self {
        self.rule = RuleConfig::from_preset(preset);
        self
    }

    /// Replace the kernel. Ignored unless it has 9 weights.
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        if kernel.dimension() == Dimension::Two {
            self.rule.kernel = kernel;
        }
        self
    }

    pub fn with_activation(mut self, activation: impl Into<String>) -> Self {
        self.rule.activation = Activation::new(activation);
        self
    }

    pub fn with_fill(mut self, fill: FillMode) -> Self {
        self.rule.randomize.fill = fill;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim3d_config_defaults() {
        let config = Sim3DConfig::default();
        assert_eq!(config.size, 64);
        assert_eq!(config.edges, Edges::clamp());
        assert_eq!(config.cadence, CadenceConfig::default());
        assert_eq!(config.rule.kernel.weights().len(), 27);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_sim3d_config_clamping() {
        assert_eq!(Sim3DConfig::new(0).size, 1);
        assert_eq!(Sim3DConfig::new(4096).size, MAX_SIZE);
        let config = Sim3DConfig::new(8).with_region(2.0).with_density(-1.0);
        assert_eq!(config.rule.randomize.region, 1.0);
        assert_eq!(config.rule.randomize.density, 0.0);
        assert!(Sim3DConfig::new(8).with_region(0.0).rule.randomize.region > 0.0);
    }

    #[test]
    fn test_kernel_of_wrong_dimension_ignored() {
        let config = Sim3DConfig::new(8).with_kernel(Kernel::identity(Dimension::Two));
        assert_eq!(config.rule.kernel.dimension(), Dimension::Three);
        let config = Sim2DConfig::new(8, 8).with_kernel(Kernel::identity(Dimension::Three));
        assert_eq!(config.rule.kernel.dimension(), Dimension::Two);
    }

    #[test]
    fn test_sim2d_config_builder() {
        let config = Sim2DConfig::new(0, 32)
            .with_channels(9)
            .with_seed("s")
            .with_compute_delay(3)
            .with_skip_every_other(true)
            .with_brush_radius(-2.0);
        assert_eq!(config.width, 1);
        assert_eq!(config.channels, 4);
        assert_eq!(config.seed.as_deref(), Some("s"));
        assert_eq!(config.cadence.compute_delay, 3);
        assert!(config.cadence.skip_every_other);
        assert_eq!(config.brush_radius, 0.0);
        assert_eq!(config.edges, Edges::wrap());
    }
}
