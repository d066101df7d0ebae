use crate::backend::{ComputeBackend, Program};
use crate::error::EngineResult;

use super::{run_chunked, ChunkPass, ProgramCache};

/// Fills a grid with a constant, chunk by chunk.
#[derive(Debug, Default)]
pub struct ClearStage {
    cache: ProgramCache<u32>,
}

impl ClearStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` into every channel of every cell of `pass.target`.
    pub fn run(
        &mut self,
        backend: &mut dyn ComputeBackend,
        pass: &ChunkPass<'_>,
        value: f32,
    ) -> EngineResult<()> {
        run_chunked(backend, &mut self.cache, pass, &[], |l| l, Program::clear, |params| {
            params.with_fill_value(value)
        })
    }
}
