//! Built-in kernel and activation presets.
//!
//! # Example
//!
//! ```ignore
//! let worms = library::find(Dimension::Two, "worms").unwrap();
//! sim.load_preset(worms)?;
//! ```

use crate::kernel::{Activation, Dimension, Kernel};
use crate::symmetry::{Symmetry, SymmetrySet};

/// How a reset fills the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Seeded cells get a hashed value in `[0, 1)`.
    #[default]
    Uniform,
    /// Seeded cells are set to 1.
    Binary,
    /// The empty-start family: no randomization, the grid starts at zero.
    Empty,
}

impl FillMode {
    /// Value passed to programs in `StageParams::fill_mode`.
    pub fn code(&self) -> u32 {
        match self {
            FillMode::Uniform => 0,
            FillMode::Binary => 1,
            FillMode::Empty => 2,
        }
    }
}

/// A named automaton: kernel, activation and how it wants to start.
#[derive(Clone, Debug)]
pub struct LibraryPreset {
    pub name: &'static str,
    pub kernel: Kernel,
    pub activation: Activation,
    pub fill: FillMode,
    /// Randomizer density for this automaton.
    pub density: f32,
    /// Randomizer region for this automaton (3-D only).
    pub region: f32,
    /// Relations the preset's kernel was authored with.
    pub symmetries: SymmetrySet,
}

impl LibraryPreset {
    fn new_2d(name: &'static str, weights: [f32; 9], activation: &str) -> Self {
        Self {
            name,
            kernel: Kernel::new(Dimension::Two, &weights)
                .unwrap_or_else(|| Kernel::identity(Dimension::Two)),
            activation: Activation::new(activation),
            fill: FillMode::Uniform,
            density: 1.0,
            region: 1.0,
            symmetries: SymmetrySet::none(Dimension::Two),
        }
    }

    fn new_3d(name: &'static str, kernel: Kernel, activation: &str) -> Self {
        Self {
            name,
            kernel,
            activation: Activation::new(activation),
            fill: FillMode::Uniform,
            density: 1.0,
            region: 1.0,
            symmetries: SymmetrySet::none(Dimension::Three),
        }
    }

    /// Identity kernel and activation with an empty start.
    fn blank(name: &'static str, dimension: Dimension) -> Self {
        Self {
            name,
            kernel: Kernel::identity(dimension),
            activation: Activation::identity(),
            fill: FillMode::Empty,
            density: 0.0,
            region: 1.0,
            symmetries: SymmetrySet::none(dimension),
        }
    }

    fn fill(mut self, fill: FillMode, density: f32, region: f32) -> Self {
        self.fill = fill;
        self.density = density;
        self.region = region;
        self
    }

    fn symmetric(mut self, relations: &[Symmetry]) -> Self {
        self.symmetries = SymmetrySet::new(self.kernel.dimension(), relations);
        self
    }

    /// Dimension of the preset's kernel.
    pub fn dimension(&self) -> Dimension {
        self.kernel.dimension()
    }
}

const BELL: &str = "-1.0 / (0.89 * pow(x, 2.0) + 1.0) + 1.0";

/// Presets for the 2-D simulator.
pub fn presets_2d() -> Vec<LibraryPreset> {
    let mirrored = [
        Symmetry::Vertical,
        Symmetry::Horizontal,
        Symmetry::ForwardDiagonal,
        Symmetry::BackwardDiagonal,
    ];
    vec![
        LibraryPreset::new_2d(
            "worms",
            [0.68, -0.9, 0.68, -0.9, -0.66, -0.9, 0.68, -0.9, 0.68],
            "-1.0 / pow(2.0, 0.6 * pow(x, 2.0)) + 1.0",
        )
        .symmetric(&mirrored),
        LibraryPreset::new_2d(
            "waves",
            [0.565, -0.716, 0.565, -0.716, 0.627, -0.716, 0.565, -0.716, 0.565],
            "abs(1.2 * x)",
        )
        .symmetric(&mirrored),
        LibraryPreset::new_2d(
            "stars",
            [0.565, -0.716, 0.565, -0.759, 0.627, -0.759, 0.565, -0.716, 0.565],
            "abs(x)",
        )
        .symmetric(&[Symmetry::Vertical, Symmetry::Horizontal]),
        LibraryPreset::new_2d(
            "mitosis",
            [-0.939, 0.88, -0.939, 0.88, 0.4, 0.88, -0.939, 0.88, -0.939],
            "-1.0 / (0.9 * pow(x, 2.0) + 1.0) + 1.0",
        )
        .symmetric(&mirrored),
        LibraryPreset::new_2d("slime", [0.8, -0.85, 0.8, -0.85, -0.2, -0.85, 0.8, -0.85, 0.8], BELL)
            .symmetric(&mirrored),
        LibraryPreset::new_2d(
            "pathways",
            [0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0],
            "1.0 / pow(2.0, pow(x - 3.5, 2.0))",
        )
        .symmetric(&mirrored),
        LibraryPreset::new_2d(
            "game_of_life",
            [1.0, 1.0, 1.0, 1.0, 9.0, 1.0, 1.0, 1.0, 1.0],
            "select(0.0, 1.0, x == 3.0 || x == 11.0 || x == 12.0)",
        )
        .fill(FillMode::Binary, 0.5, 1.0)
        .symmetric(&[Symmetry::Full]),
        LibraryPreset::blank("blank_canvas", Dimension::Two),
    ]
}

/// Presets for the 3-D simulator.
pub fn presets_3d() -> Vec<LibraryPreset> {
    vec![
        LibraryPreset::new_3d("clouds", Kernel::radial_3d(0.2, 0.42, -0.09, -0.31), BELL)
            .fill(FillMode::Uniform, 1.0, 0.6),
        LibraryPreset::new_3d(
            "worms",
            Kernel::radial_3d(-0.66, -0.9, 0.68, -0.12),
            "-1.0 / pow(2.0, 0.6 * pow(x, 2.0)) + 1.0",
        ),
        // Survive on 4-5 live neighbors, born on 5.
        LibraryPreset::new_3d(
            "life_4555",
            Kernel::radial_3d(0.5, 1.0, 1.0, 1.0),
            "select(0.0, 1.0, x == 4.5 || x == 5.0 || x == 5.5)",
        )
        .fill(FillMode::Binary, 0.3, 0.5)
        .symmetric(&[Symmetry::Full]),
        LibraryPreset::blank("blank_volume", Dimension::Three),
    ]
}

/// Presets for a dimension.
pub fn presets(dimension: Dimension) -> Vec<LibraryPreset> {
    match dimension {
        Dimension::Two => presets_2d(),
        Dimension::Three => presets_3d(),
    }
}

/// Find a preset by name.
pub fn find(dimension: Dimension, name: &str) -> Option<LibraryPreset> {
    presets(dimension).into_iter().find(|p| p.name == name)
}

/// Preset a new simulation starts with: worms in 2-D, clouds in 3-D.
pub fn default_preset(dimension: Dimension) -> LibraryPreset {
    let name = match dimension {
        Dimension::Two => "worms",
        Dimension::Three => "clouds",
    };
    find(dimension, name).unwrap_or_else(|| LibraryPreset::blank("blank", dimension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::apply_symmetries;

    #[test]
    fn test_kernel_lengths_match_dimension() {
        for p in presets_2d() {
            assert_eq!(p.kernel.weights().len(), 9, "{}", p.name);
        }
        for p in presets_3d() {
            assert_eq!(p.kernel.weights().len(), 27, "{}", p.name);
        }
    }

    #[test]
    fn test_preset_kernels_already_satisfy_their_symmetries() {
        for dim in [Dimension::Two, Dimension::Three] {
            for p in presets(dim) {
                assert_eq!(apply_symmetries(&p.kernel, &p.symmetries), p.kernel, "{}", p.name);
            }
        }
    }

    #[test]
    fn test_find_by_name() {
        assert!(find(Dimension::Two, "worms").is_some());
        assert!(find(Dimension::Three, "worms").is_some());
        assert!(find(Dimension::Two, "life_4555").is_none());
        assert_eq!(find(Dimension::Two, "blank_canvas").map(|p| p.fill), Some(FillMode::Empty));
        assert_eq!(default_preset(Dimension::Three).name, "clouds");
    }

    #[test]
    fn test_life_activation_values() {
        use crate::expr::Expr;
        let p = find(Dimension::Two, "game_of_life").unwrap();
        let f = Expr::parse(p.activation.source()).unwrap();
        // Dead cell with 3 neighbors is born, live cell with 2 or 3 survives.
        assert_eq!(f.eval(3.0), 1.0);
        assert_eq!(f.eval(11.0), 1.0);
        assert_eq!(f.eval(12.0), 1.0);
        assert_eq!(f.eval(10.0), 0.0);
        assert_eq!(f.eval(2.0), 0.0);
    }
}
