//! # NCA - Continuous Cellular Automata
//!
//! GPU compute engine for continuous cellular automata. Every step convolves
//! each cell's 3x3 (2-D) or 3x3x3 (3-D) neighborhood with a weight kernel and
//! passes the sum through an activation expression.
//!
//! NCA handles the double-buffered stepping, depth chunking, seeded
//! initialization and kernel symmetry so a front end only has to draw the
//! visible grid and forward user input.
//!
//! ## Quick Start
//!
//! ```ignore
//! use nca::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     let backend = WgpuBackend::new()?;
//!     let mut sim = Sim3D::new(backend, Sim3DConfig::new(96).with_seed("clouds"))?;
//!     sim.reset(None)?;
//!     loop {
//!         let frame = sim.render()?;
//!         // draw frame.buffer
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Kernels and activations
//!
//! A [`Kernel`] holds 9 or 27 weights indexed `(dz+1)*9 + (dy+1)*3 + (dx+1)`.
//! An [`Activation`] is a WGSL expression in `x`, the weighted sum:
//!
//! ```ignore
//! sim.set_kernel(&[0.68, -0.9, 0.68, -0.9, -0.66, -0.9, 0.68, -0.9, 0.68]);
//! sim.set_activation("-1.0 / pow(2.0, 0.6 * pow(x, 2.0)) + 1.0")?;
//! ```
//!
//! Cell values are clamped to [0, 1] after the activation.
//!
//! ### Symmetries
//!
//! A [`SymmetrySet`] ties kernel weights together. Every kernel change goes
//! through [`apply_symmetries`], and single-weight edits through
//! [`edit_coefficient`], so the kernel always satisfies the active relations.
//!
//! ### Backends
//!
//! Stages talk to a [`ComputeBackend`]. [`WgpuBackend`] runs the generated
//! WGSL as compute pipelines; [`CpuBackend`] runs the same programs on the
//! CPU after validating them with naga and is what the tests use.
//!
//! ## Chunking
//!
//! A backend can write at most `max_output_targets()` depth slices per
//! dispatch. 3-D volumes are stepped in chunks of that many slices, each
//! reading the whole previous volume, and the buffers swap only after every
//! chunk has been submitted.

pub mod backend;
pub mod config;
pub mod error;
mod expr;
pub mod grid;
pub mod kernel;
pub mod library;
pub mod preset;
pub mod rng;
pub mod shader;
pub mod shader_utils;
pub mod sim;
pub mod stages;
pub mod symmetry;
pub mod uniforms;

pub use backend::{
    BufferId, ComputeBackend, CpuBackend, Dispatch, Program, ProgramId, ProgramKind, WgpuBackend,
};
pub use config::{CadenceConfig, RuleConfig, Sim2DConfig, Sim3DConfig};
pub use error::{EngineError, EngineResult, GpuError};
pub use glam::Vec2;
pub use grid::{chunks_for, Chunk, EdgeMode, Edges, GridPair, GridShape};
pub use kernel::{Activation, Dimension, Kernel};
pub use library::{FillMode, LibraryPreset};
pub use preset::{DisplaySettings, PresetRecord};
pub use rng::SeededRng;
pub use sim::{Cadence, Controller, Frame, Sim2D, Sim3D, SimState};
pub use stages::RandomizeSettings;
pub use symmetry::{apply_symmetries, edit_coefficient, Symmetry, SymmetrySet};
pub use uniforms::StageParams;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use nca::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::{ComputeBackend, CpuBackend, WgpuBackend};
    pub use crate::config::{Sim2DConfig, Sim3DConfig};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::grid::{EdgeMode, Edges, GridShape};
    pub use crate::kernel::{Activation, Dimension, Kernel};
    pub use crate::library::{self, FillMode, LibraryPreset};
    pub use crate::preset::PresetRecord;
    pub use crate::sim::{Frame, Sim2D, Sim3D, SimState};
    pub use crate::symmetry::{Symmetry, SymmetrySet};
    pub use crate::Vec2;
}
