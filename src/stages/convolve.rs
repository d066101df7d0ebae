use crate::backend::{ComputeBackend, Program};
use crate::error::EngineResult;
use crate::grid::{Chunk, Edges};
use crate::kernel::{Activation, Dimension, Kernel};

use super::{run_chunked, ChunkPass, ProgramCache};

/// One simulation step: neighborhood sum, activation, clamp to [0, 1].
///
/// Programs depend on the chunk's layer count and the activation text, so
/// the cache is keyed by both.
#[derive(Debug)]
pub struct ConvolveStage {
    dimension: Dimension,
    cache: ProgramCache<(u32, Activation)>,
}

impl ConvolveStage {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            cache: ProgramCache::new(),
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Compile every program `chunks` will need for `activation`.
    ///
    /// Lets a caller reject a bad activation before it replaces a good one.
    pub fn prepare(
        &mut self,
        backend: &mut dyn ComputeBackend,
        chunks: &[Chunk],
        activation: &Activation,
    ) -> EngineResult<()> {
        let dimension = self.dimension;
        for chunk in chunks {
            let layers = chunk.total_layers;
            self.cache
                .get_or_compile(backend, (layers, activation.clone()), || {
                    Program::convolve(dimension, layers, activation)
                })?;
        }
        Ok(())
    }

    /// Convolve `pass.source` into `pass.target`.
    pub fn run(
        &mut self,
        backend: &mut dyn ComputeBackend,
        pass: &ChunkPass<'_>,
        kernel: &Kernel,
        activation: &Activation,
        edges: Edges,
    ) -> EngineResult<()> {
        let dimension = self.dimension;
        run_chunked(
            backend,
            &mut self.cache,
            pass,
            kernel.weights(),
            |layers| (layers, activation.clone()),
            |layers| Program::convolve(dimension, layers, activation),
            |params| params.with_edges(edges),
        )
    }

    /// Number of distinct programs compiled so far.
    pub fn cached_programs(&self) -> usize {
        self.cache.len()
    }
}
