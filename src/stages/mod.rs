//! Grid stages and the chunked dispatch scheduler.
//!
//! A stage turns one grid operation into per-chunk dispatches. Each chunk
//! writes only its own depth range of the target and reads the whole source,
//! so chunk order within one pass does not matter. Programs are compiled on
//! first use and kept in the stage's [`ProgramCache`] for the session.

mod brush;
mod clear;
mod convolve;
mod randomize;

pub use brush::BrushStage;
pub use clear::ClearStage;
pub use convolve::ConvolveStage;
pub use randomize::{RandomizeSettings, RandomizeStage};

use std::collections::HashMap;
use std::hash::Hash;

use crate::backend::{BufferId, ComputeBackend, Dispatch, Program, ProgramId};
use crate::error::EngineResult;
use crate::grid::{Chunk, GridShape};
use crate::uniforms::StageParams;

/// Compiled programs keyed by whatever changes their generated code.
///
/// Entries are never evicted; the key space is small (distinct chunk depths,
/// typically one or two, times activations seen).
#[derive(Debug)]
pub struct ProgramCache<K> {
    programs: HashMap<K, ProgramId>,
}

impl<K> Default for ProgramCache<K> {
    fn default() -> Self {
        Self {
            programs: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> ProgramCache<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached program for `key`, compiling `build()` on a miss.
    ///
    /// A failed compile is not cached, and is returned as-is.
    pub fn get_or_compile(
        &mut self,
        backend: &mut dyn ComputeBackend,
        key: K,
        build: impl FnOnce() -> Program,
    ) -> EngineResult<ProgramId> {
        if let Some(id) = self.programs.get(&key) {
            return Ok(*id);
        }
        let program = build();
        tracing::debug!("Program cache miss, compiling '{}' on {}", program.label, backend.name());
        let id = backend.compile(&program)?;
        self.programs.insert(key, id);
        Ok(id)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.programs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

/// Buffers and layout one chunked pass runs over.
#[derive(Clone, Copy, Debug)]
pub struct ChunkPass<'a> {
    pub shape: GridShape,
    pub chunks: &'a [Chunk],
    pub source: Option<BufferId>,
    pub target: BufferId,
}

/// Dispatch one program per chunk, in `z_offset` order.
///
/// `key` and `build` map a chunk's layer count to its cache key and program;
/// `params` fills in the chunk's uniform block.
pub(crate) fn run_chunked<K: Eq + Hash>(
    backend: &mut dyn ComputeBackend,
    cache: &mut ProgramCache<K>,
    pass: &ChunkPass<'_>,
    kernel: &[f32],
    key: impl Fn(u32) -> K,
    build: impl Fn(u32) -> Program,
    mut params: impl FnMut(StageParams) -> StageParams,
) -> EngineResult<()> {
    for chunk in pass.chunks {
        let layers = chunk.total_layers;
        let program = cache.get_or_compile(backend, key(layers), || build(layers))?;
        backend.dispatch(&Dispatch {
            program,
            params: params(StageParams::new(pass.shape, *chunk)),
            kernel,
            source: pass.source,
            target: pass.target,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::grid::chunks_for;

    #[test]
    fn test_cache_compiles_once_per_key() {
        let mut cpu = CpuBackend::new();
        let mut cache = ProgramCache::new();
        let a = cache.get_or_compile(&mut cpu, 4u32, || Program::clear(4)).unwrap();
        let b = cache.get_or_compile(&mut cpu, 4u32, || Program::clear(4)).unwrap();
        let c = cache.get_or_compile(&mut cpu, 2u32, || Program::clear(2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.len(), 2);
        assert_eq!(cpu.program_count(), 2);
    }

    #[test]
    fn test_partial_last_chunk_gets_own_program() {
        let mut cpu = CpuBackend::with_max_output_targets(4);
        let shape = crate::grid::GridShape::cube(10);
        let target = cpu.allocate_buffer(shape);
        let chunks = chunks_for(10, 4);
        let mut cache = ProgramCache::new();
        let pass = ChunkPass {
            shape,
            chunks: &chunks,
            source: None,
            target,
        };
        run_chunked(&mut cpu, &mut cache, &pass, &[], |l| l, Program::clear, |p| {
            p.with_fill_value(1.0)
        })
        .unwrap();

        assert_eq!(cpu.dispatch_count(), 3);
        assert!(cache.contains(&4) && cache.contains(&2));
        assert_eq!(cache.len(), 2);
        assert!(cpu.read_buffer(target).unwrap().iter().all(|&v| v == 1.0));
    }
}
