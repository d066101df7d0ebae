//! Neighborhood kernels and activation expressions.
//!
//! A kernel is the 3×3 (2-D) or 3×3×3 (3-D) weight set applied around every
//! cell. Weights are ordered row-major within a depth slice, slices back to
//! front:
//!
//! ```text
//! 2-D                3-D (slice dz = -1, 0, +1)
//! 0 1 2              0  1  2 |  9 10 11 | 18 19 20
//! 3 4 5              3  4  5 | 12 13 14 | 21 22 23
//! 6 7 8              6  7  8 | 15 16 17 | 24 25 26
//! ```
//!
//! The activation is a WGSL expression in `x`, substituted into the
//! convolution program as `fn activation(x: f32) -> f32 { return <expr>; }`.

use serde::{Deserialize, Serialize};

use crate::rng::SeededRng;

/// Simulation dimensionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Single 2-D surface with up to four channels.
    #[serde(rename = "2d")]
    Two,
    /// Cubic volume with one channel.
    #[serde(rename = "3d")]
    Three,
}

impl Dimension {
    /// Number of kernel weights: 9 or 27.
    pub fn kernel_len(&self) -> usize {
        match self {
            Dimension::Two => 9,
            Dimension::Three => 27,
        }
    }

    /// Index of the center weight: 4 or 13.
    pub fn center_index(&self) -> usize {
        self.kernel_len() / 2
    }

    /// Kernel index of the neighbor at `(dx, dy, dz)`, each in `-1..=1`.
    ///
    /// `dz` is ignored in 2-D.
    pub fn offset_index(&self, dx: i32, dy: i32, dz: i32) -> usize {
        let planar = ((dy + 1) * 3 + (dx + 1)) as usize;
        match self {
            Dimension::Two => planar,
            Dimension::Three => (dz + 1) as usize * 9 + planar,
        }
    }

    /// Kernel coordinates `(x, y, z)` of a kernel index, each in `0..3`.
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        (index % 3, (index / 3) % 3, index / 9)
    }

    /// Inverse of [`Dimension::coords`].
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * 9 + y * 3 + x
    }
}

/// Fixed-length set of neighborhood weights.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    dimension: Dimension,
    weights: Vec<f32>,
}

impl Kernel {
    /// Build a kernel, returning `None` if `weights` has the wrong length.
    pub fn new(dimension: Dimension, weights: &[f32]) -> Option<Self> {
        if weights.len() != dimension.kernel_len() {
            return None;
        }
        Some(Self {
            dimension,
            weights: weights.to_vec(),
        })
    }

    /// All-zero kernel except a center weight of 1.
    pub fn identity(dimension: Dimension) -> Self {
        let mut weights = vec![0.0; dimension.kernel_len()];
        weights[dimension.center_index()] = 1.0;
        Self { dimension, weights }
    }

    /// 3-D kernel built from distance classes: the center, the 6 face
    /// neighbors, the 12 edge neighbors and the 8 corner neighbors.
    pub fn radial_3d(center: f32, face: f32, edge: f32, corner: f32) -> Self {
        let mut weights = Vec::with_capacity(27);
        for z in 0..3usize {
            for y in 0..3usize {
                for x in 0..3usize {
                    let off_center = [x, y, z].iter().filter(|&&c| c != 1).count();
                    weights.push(match off_center {
                        0 => center,
                        1 => face,
                        2 => edge,
                        _ => corner,
                    });
                }
            }
        }
        Self {
            dimension: Dimension::Three,
            weights,
        }
    }

    /// Kernel with every weight drawn uniformly from `[-1, 1)`.
    pub fn random(dimension: Dimension, rng: &mut SeededRng) -> Self {
        let weights = (0..dimension.kernel_len())
            .map(|_| rng.range(-1.0, 1.0))
            .collect();
        Self { dimension, weights }
    }

    /// The kernel's dimensionality.
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Weights in kernel index order.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Mutable weights; the length cannot change.
    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }
}

/// Activation function source: a WGSL expression in `x`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Activation(String);

impl Activation {
    /// Wrap expression text.
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into().trim().to_string())
    }

    /// `x`
    pub fn identity() -> Self {
        Self::new("x")
    }

    /// Expression text.
    pub fn source(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
