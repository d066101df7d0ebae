use glam::Vec2;

use crate::backend::{ComputeBackend, Program};
use crate::error::EngineResult;

use super::{run_chunked, ChunkPass, ProgramCache};

/// Paints or erases a disc on a 2-D grid.
///
/// Copies the source to the target with every channel inside the brush set
/// to `value`, through the same chunked write path as the other stages. The
/// surface is a single chunk.
#[derive(Debug, Default)]
pub struct BrushStage {
    cache: ProgramCache<()>,
}

impl BrushStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// `center` is normalized, `radius` is in cells.
    pub fn run(
        &mut self,
        backend: &mut dyn ComputeBackend,
        pass: &ChunkPass<'_>,
        center: Vec2,
        radius: f32,
        value: f32,
    ) -> EngineResult<()> {
        run_chunked(backend, &mut self.cache, pass, &[], |_| (), |_| Program::brush(), |params| {
            params.with_brush(center.x, center.y, radius, value)
        })
    }
}
