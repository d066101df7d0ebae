//! Compute backend abstraction.
//!
//! The engine never touches a device directly. Stages describe work as
//! [`Program`]s and [`Dispatch`]es, and a [`ComputeBackend`] executes them:
//!
//! - [`CpuBackend`] runs programs on the host. It is the reference
//!   implementation and what the tests use.
//! - [`WgpuBackend`] runs them as wgpu compute pipelines.
//!
//! Both validate the generated WGSL with naga before accepting a program, so
//! a malformed activation fails the same way on either.

mod cpu;
mod gpu;

pub use cpu::CpuBackend;
pub use gpu::WgpuBackend;

use crate::error::EngineResult;
use crate::grid::GridShape;
use crate::kernel::{Activation, Dimension};
use crate::shader;
use crate::uniforms::StageParams;

/// Handle to a grid buffer owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u64);

/// Handle to a compiled program owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u64);

/// What a program computes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Clear { layers: u32 },
    Randomize { layers: u32 },
    Convolve {
        dimension: Dimension,
        layers: u32,
        activation: Activation,
    },
    Brush,
}

impl ProgramKind {
    /// Depth slices one dispatch of this program writes.
    pub fn layers(&self) -> u32 {
        match self {
            ProgramKind::Clear { layers }
            | ProgramKind::Randomize { layers }
            | ProgramKind::Convolve { layers, .. } => *layers,
            ProgramKind::Brush => 1,
        }
    }
}

/// A generated program ready to compile.
#[derive(Clone, Debug)]
pub struct Program {
    pub label: String,
    pub kind: ProgramKind,
    pub wgsl: String,
}

impl Program {
    pub fn clear(layers: u32) -> Self {
        Self {
            label: format!("clear[{}]", layers),
            kind: ProgramKind::Clear { layers },
            wgsl: shader::clear_wgsl(layers),
        }
    }

    pub fn randomize(layers: u32) -> Self {
        Self {
            label: format!("randomize[{}]", layers),
            kind: ProgramKind::Randomize { layers },
            wgsl: shader::randomize_wgsl(layers),
        }
    }

    pub fn convolve(dimension: Dimension, layers: u32, activation: &Activation) -> Self {
        Self {
            label: format!("convolve[{}] {}", layers, activation),
            kind: ProgramKind::Convolve {
                dimension,
                layers,
                activation: activation.clone(),
            },
            wgsl: shader::convolve_wgsl(dimension, layers, activation),
        }
    }

    pub fn brush() -> Self {
        Self {
            label: "brush".to_string(),
            kind: ProgramKind::Brush,
            wgsl: shader::brush_wgsl(),
        }
    }
}

/// One program invocation over one chunk.
#[derive(Clone, Copy, Debug)]
pub struct Dispatch<'a> {
    pub program: ProgramId,
    /// Grid shape, chunk range and stage settings.
    pub params: StageParams,
    /// Kernel weights; empty for programs that do not convolve.
    pub kernel: &'a [f32],
    /// Buffer read as a whole volume, if the program reads one.
    pub source: Option<BufferId>,
    /// Buffer whose chunk range is written.
    pub target: BufferId,
}

/// Execution substrate for grid programs.
pub trait ComputeBackend {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Most depth slices one dispatch may write (`L`).
    fn max_output_targets(&self) -> u32;

    /// Most `f32` values one grid buffer may hold.
    fn max_cells(&self) -> u64;

    /// Compile a program. Failure is final; callers must not retry.
    fn compile(&mut self, program: &Program) -> EngineResult<ProgramId>;

    /// Allocate a zero-filled buffer of `shape`.
    fn allocate_buffer(&mut self, shape: GridShape) -> BufferId;

    /// Free a buffer. Unknown ids are ignored.
    fn release_buffer(&mut self, id: BufferId);

    /// Record one dispatch.
    fn dispatch(&mut self, dispatch: &Dispatch<'_>) -> EngineResult<()>;

    /// Complete every dispatch recorded so far before anything recorded later.
    fn submit(&mut self) -> EngineResult<()>;

    /// Copy a buffer back to the host. Pending dispatches are submitted first.
    fn read_buffer(&mut self, id: BufferId) -> EngineResult<Vec<f32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_labels_and_layers() {
        let p = Program::convolve(Dimension::Three, 6, &Activation::new("abs(x)"));
        assert_eq!(p.kind.layers(), 6);
        assert_eq!(p.label, "convolve[6] abs(x)");
        assert_eq!(Program::brush().kind.layers(), 1);
        assert_eq!(Program::clear(3).kind, ProgramKind::Clear { layers: 3 });
    }
}
