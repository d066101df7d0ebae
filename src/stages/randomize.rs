use crate::backend::{ComputeBackend, Program};
use crate::error::EngineResult;
use crate::library::FillMode;
use crate::rng::SeededRng;

use super::{run_chunked, ChunkPass, ProgramCache};

/// How the randomizer seeds a grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomizeSettings {
    pub fill: FillMode,
    /// Centered fraction of each axis that gets seeded, in (0, 1].
    pub region: f32,
    /// Probability that a cell inside the region is seeded, in [0, 1].
    pub density: f32,
}

impl Default for RandomizeSettings {
    fn default() -> Self {
        Self {
            fill: FillMode::Uniform,
            region: 1.0,
            density: 1.0,
        }
    }
}

/// Seeds a grid from the RNG and a coordinate hash.
///
/// The RNG is drawn once per chunk; the drawn scalar salts a per-cell hash on
/// the backend, so no per-cell draws are needed and the result depends only
/// on the seed, the grid shape and the chunk layout.
#[derive(Debug, Default)]
pub struct RandomizeStage {
    cache: ProgramCache<u32>,
}

impl RandomizeStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &mut self,
        backend: &mut dyn ComputeBackend,
        pass: &ChunkPass<'_>,
        rng: &mut SeededRng,
        settings: RandomizeSettings,
    ) -> EngineResult<()> {
        run_chunked(
            backend,
            &mut self.cache,
            pass,
            &[],
            |layers| layers,
            Program::randomize,
            |params| {
                params
                    .with_fill(settings.fill, settings.region, settings.density)
                    .with_seed(rng.next_f32())
            },
        )
    }
}
