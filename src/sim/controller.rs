use glam::Vec2;

use crate::backend::ComputeBackend;
use crate::config::{CadenceConfig, RuleConfig};
use crate::error::{EngineError, EngineResult};
use crate::grid::{chunks_for, Chunk, Edges, GridPair, GridShape};
use crate::kernel::{Activation, Dimension, Kernel};
use crate::library::{FillMode, LibraryPreset};
use crate::rng::{time_seed, SeededRng};
use crate::stages::{
    BrushStage, ChunkPass, ClearStage, ConvolveStage, RandomizeSettings, RandomizeStage,
};
use crate::symmetry::{apply_symmetries, edit_coefficient, SymmetrySet};

use super::{Cadence, Frame, SimState};

/// Dimension-independent simulation core.
///
/// Owns the grid pair exclusively; only its stages write the buffers, and
/// every pass is submitted before the roles swap, so the visible grid is
/// always a completed step.
pub struct Controller<B: ComputeBackend> {
    backend: B,
    dimension: Dimension,
    grid: GridPair,
    state: SimState,
    paused: bool,

    kernel: Kernel,
    activation: Activation,
    symmetries: SymmetrySet,
    edges: Edges,
    randomize: RandomizeSettings,
    cadence: Cadence,
    seed: String,
    generation: u64,

    clear_stage: ClearStage,
    randomize_stage: RandomizeStage,
    convolve_stage: ConvolveStage,
    brush_stage: BrushStage,
}

impl<B: ComputeBackend> Controller<B> {
    /// Allocate the grid and compile the step programs.
    ///
    /// Fails if the activation does not compile or the grid is larger than
    /// the backend can hold. The grid is not seeded until the first
    /// [`reset`](Self::reset).
    pub fn new(
        mut backend: B,
        dimension: Dimension,
        shape: GridShape,
        rule: RuleConfig,
        edges: Edges,
        cadence: CadenceConfig,
        seed: Option<String>,
    ) -> EngineResult<Self> {
        tracing::info!(
            "Creating {:?} simulation {}x{}x{} on {} backend",
            dimension,
            shape.width,
            shape.height,
            shape.depth,
            backend.name()
        );
        if shape.len() as u64 > backend.max_cells() {
            return Err(EngineError::GridTooLarge {
                cells: shape.len() as u64,
                max_cells: backend.max_cells(),
            });
        }

        let symmetries = if rule.symmetries.dimension() == dimension {
            rule.symmetries
        } else {
            SymmetrySet::none(dimension)
        };
        let kernel = if rule.kernel.dimension() == dimension {
            apply_symmetries(&rule.kernel, &symmetries)
        } else {
            Kernel::identity(dimension)
        };

        let mut convolve_stage = ConvolveStage::new(dimension);
        let chunks = chunks_for(shape.depth, backend.max_output_targets());
        convolve_stage.prepare(&mut backend, &chunks, &rule.activation)?;
        let grid = GridPair::create(&mut backend, shape);

        Ok(Self {
            backend,
            dimension,
            grid,
            state: SimState::Uninitialized,
            paused: false,
            kernel,
            activation: rule.activation,
            symmetries,
            edges,
            randomize: rule.randomize,
            cadence: Cadence::new(cadence),
            seed: seed.unwrap_or_else(time_seed),
            generation: 0,
            clear_stage: ClearStage::new(),
            randomize_stage: RandomizeStage::new(),
            convolve_stage,
            brush_stage: BrushStage::new(),
        })
    }

    // ========== Lifecycle ==========

    /// Clear both grids, seed the old grid and publish it.
    ///
    /// Uses `seed`, or a time-derived seed if `None`. Works in any state,
    /// paused included, and always ends in [`SimState::Ready`].
    pub fn reset(&mut self, seed: Option<&str>) -> EngineResult<()> {
        let seed = seed.map(str::to_string).unwrap_or_else(time_seed);
        self.clear_grids(0.0)?;
        if self.randomize.fill != FillMode::Empty {
            self.seed_old(&seed)?;
        }
        self.backend.submit()?;

        tracing::debug!("Reset with seed '{}' ({:?} fill)", seed, self.randomize.fill);
        self.seed = seed;
        self.generation = 0;
        self.cadence.restart();
        self.state = SimState::Ready;
        Ok(())
    }

    /// Zero both grids.
    pub fn clear(&mut self) -> EngineResult<()> {
        self.clear_grids(0.0)?;
        self.backend.submit()?;
        if self.state == SimState::Uninitialized {
            self.state = SimState::Ready;
        }
        Ok(())
    }

    /// Re-seed the visible grid without clearing the other one.
    pub fn randomize(&mut self, seed: Option<&str>) -> EngineResult<()> {
        let seed = seed.map(str::to_string).unwrap_or_else(time_seed);
        self.seed_old(&seed)?;
        self.backend.submit()?;
        self.seed = seed;
        if self.state == SimState::Uninitialized {
            self.state = SimState::Ready;
        }
        Ok(())
    }

    /// Run the steps the cadence says are due, swapping after each.
    ///
    /// Returns the number of steps taken: always 0 before the first reset
    /// or while paused.
    pub fn step(&mut self) -> EngineResult<u32> {
        if self.state == SimState::Uninitialized || self.paused {
            return Ok(0);
        }
        let steps = self.cadence.tick();
        for _ in 0..steps {
            self.convolve_once()?;
        }
        if steps > 0 {
            self.state = SimState::Stepping;
        }
        Ok(steps)
    }

    /// One render tick: step if running, then report the visible grid.
    pub fn render(&mut self) -> EngineResult<Frame> {
        let steps = match self.state {
            SimState::Uninitialized => 0,
            _ if self.paused => {
                self.state = SimState::Paused;
                0
            }
            _ => self.step()?,
        };
        Ok(self.frame(steps))
    }

    /// The visible grid without stepping.
    pub fn frame(&self, steps: u32) -> Frame {
        Frame {
            buffer: self.grid.old(),
            shape: self.grid.shape(),
            generation: self.generation,
            steps,
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        match (paused, self.state) {
            (_, SimState::Uninitialized) => {}
            (true, _) => self.state = SimState::Paused,
            (false, SimState::Paused) => self.state = SimState::Stepping,
            (false, _) => {}
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Steps since the last reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ========== Rule ==========

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Replace the kernel, enforcing the active symmetries.
    ///
    /// Ignored unless `weights` has 9 (2-D) or 27 (3-D) entries.
    pub fn set_kernel(&mut self, weights: &[f32]) {
        match Kernel::new(self.dimension, weights) {
            Some(kernel) => self.kernel = apply_symmetries(&kernel, &self.symmetries),
            None => tracing::debug!(
                "Ignoring kernel of length {} (need {})",
                weights.len(),
                self.dimension.kernel_len()
            ),
        }
    }

    /// Set one coefficient and everything the active symmetries tie to it.
    pub fn edit_kernel(&mut self, index: usize, value: f32) {
        if index >= self.dimension.kernel_len() {
            tracing::debug!("Ignoring edit of kernel index {}", index);
            return;
        }
        self.kernel = edit_coefficient(&self.kernel, index, value, &self.symmetries);
    }

    /// Replace the kernel with seeded random weights in [-1, 1).
    pub fn randomize_kernel(&mut self, seed: Option<&str>) {
        let mut rng = seed.map(SeededRng::new).unwrap_or_else(SeededRng::from_time);
        self.kernel = apply_symmetries(&Kernel::random(self.dimension, &mut rng), &self.symmetries);
    }

    pub fn symmetries(&self) -> &SymmetrySet {
        &self.symmetries
    }

    /// Replace the active relations and re-apply them to the kernel.
    pub fn set_symmetries(&mut self, symmetries: SymmetrySet) {
        if symmetries.dimension() != self.dimension {
            tracing::debug!("Ignoring {:?} symmetry set", symmetries.dimension());
            return;
        }
        self.symmetries = symmetries;
        self.kernel = apply_symmetries(&self.kernel, &self.symmetries);
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    /// Compile and switch to a new activation.
    ///
    /// On a compile error the previous activation stays active and the error
    /// is returned.
    pub fn set_activation(&mut self, source: &str) -> EngineResult<()> {
        let activation = Activation::new(source);
        if let Err(e) = self
            .convolve_stage
            .prepare(&mut self.backend, self.grid.chunks(), &activation)
        {
            tracing::error!("Activation '{}' rejected: {}", activation, e);
            return Err(e);
        }
        self.activation = activation;
        Ok(())
    }

    /// Load a library preset's rule and start settings.
    ///
    /// Presets of the other dimension are ignored. Does not reset.
    pub fn load_preset(&mut self, preset: &LibraryPreset) -> EngineResult<()> {
        if preset.dimension() != self.dimension {
            tracing::debug!("Ignoring {:?} preset '{}'", preset.dimension(), preset.name);
            return Ok(());
        }
        self.set_activation(preset.activation.source())?;
        self.symmetries = preset.symmetries.clone();
        self.kernel = apply_symmetries(&preset.kernel, &self.symmetries);
        self.randomize = RandomizeSettings {
            fill: preset.fill,
            region: preset.region,
            density: preset.density,
        };
        tracing::debug!("Loaded preset '{}'", preset.name);
        Ok(())
    }

    // ========== Settings ==========

    pub fn edges(&self) -> Edges {
        self.edges
    }

    pub fn set_edges(&mut self, edges: Edges) {
        self.edges = edges;
    }

    pub fn randomize_settings(&self) -> RandomizeSettings {
        self.randomize
    }

    pub(crate) fn randomize_settings_mut(&mut self) -> &mut RandomizeSettings {
        &mut self.randomize
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    pub fn set_compute_delay(&mut self, delay: u32) {
        self.cadence.compute_delay = delay;
    }

    pub fn set_skip_every_other(&mut self, skip: bool) {
        self.cadence.skip_every_other = skip;
    }

    /// Seed of the last reset.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    // ========== Grid ==========

    pub fn shape(&self) -> GridShape {
        self.grid.shape()
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.grid.chunks()
    }

    /// Whether the backend can hold a grid of `shape`.
    pub fn fits(&self, shape: GridShape) -> bool {
        shape.len() as u64 <= self.backend.max_cells()
    }

    /// Replace the grid with one of `shape`, then reset with the current seed.
    ///
    /// Shapes the backend cannot hold are ignored. If the step programs for
    /// the new chunking fail to compile, the old grid stays.
    pub fn reallocate(&mut self, shape: GridShape) -> EngineResult<()> {
        if !self.fits(shape) {
            tracing::debug!(
                "Ignoring grid of {} values (backend holds {})",
                shape.len(),
                self.backend.max_cells()
            );
            return Ok(());
        }
        tracing::debug!(
            "Reallocating grid {}x{}x{}x{}",
            shape.width,
            shape.height,
            shape.depth,
            shape.channels
        );
        let chunks = chunks_for(shape.depth, self.backend.max_output_targets());
        self.convolve_stage
            .prepare(&mut self.backend, &chunks, &self.activation)?;
        let grid = GridPair::create(&mut self.backend, shape);
        let old = std::mem::replace(&mut self.grid, grid);
        old.release(&mut self.backend);
        let seed = self.seed.clone();
        self.reset(Some(&seed))
    }

    /// Read the visible grid back to the host.
    pub fn read_visible(&mut self) -> EngineResult<Vec<f32>> {
        self.backend.read_buffer(self.grid.old())
    }

    /// Copy old to new with a painted disc, then swap.
    pub(crate) fn brush(&mut self, center: Vec2, radius: f32, value: f32) -> EngineResult<()> {
        let pass = ChunkPass {
            shape: self.grid.shape(),
            chunks: self.grid.chunks(),
            source: Some(self.grid.old()),
            target: self.grid.new_buffer(),
        };
        self.brush_stage
            .run(&mut self.backend, &pass, center, radius, value)?;
        self.backend.submit()?;
        self.grid.swap();
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ========== Passes ==========

    fn clear_grids(&mut self, value: f32) -> EngineResult<()> {
        for target in self.grid.both() {
            let pass = ChunkPass {
                shape: self.grid.shape(),
                chunks: self.grid.chunks(),
                source: None,
                target,
            };
            self.clear_stage.run(&mut self.backend, &pass, value)?;
        }
        Ok(())
    }

    fn seed_old(&mut self, seed: &str) -> EngineResult<()> {
        let mut rng = SeededRng::new(seed);
        let pass = ChunkPass {
            shape: self.grid.shape(),
            chunks: self.grid.chunks(),
            source: None,
            target: self.grid.old(),
        };
        self.randomize_stage
            .run(&mut self.backend, &pass, &mut rng, self.randomize)
    }

    /// Convolve old into new, wait for every chunk, then swap.
    fn convolve_once(&mut self) -> EngineResult<()> {
        let pass = ChunkPass {
            shape: self.grid.shape(),
            chunks: self.grid.chunks(),
            source: Some(self.grid.old()),
            target: self.grid.new_buffer(),
        };
        self.convolve_stage.run(
            &mut self.backend,
            &pass,
            &self.kernel,
            &self.activation,
            self.edges,
        )?;
        self.backend.submit()?;
        self.grid.swap();
        self.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferId, CpuBackend, Dispatch, Program, ProgramId};
    use crate::config::Sim3DConfig;
    use crate::sim::Sim3D;

    /// CPU backend whose compiler can be switched off.
    struct Refusing {
        inner: CpuBackend,
        refuse: bool,
    }

    impl ComputeBackend for Refusing {
        fn name(&self) -> &str {
            "refusing"
        }

        fn max_output_targets(&self) -> u32 {
            self.inner.max_output_targets()
        }

        fn max_cells(&self) -> u64 {
            self.inner.max_cells()
        }

        fn compile(&mut self, program: &Program) -> EngineResult<ProgramId> {
            if self.refuse {
                return Err(EngineError::compile(&program.label, "compiler offline"));
            }
            self.inner.compile(program)
        }

        fn allocate_buffer(&mut self, shape: GridShape) -> BufferId {
            self.inner.allocate_buffer(shape)
        }

        fn release_buffer(&mut self, id: BufferId) {
            self.inner.release_buffer(id)
        }

        fn dispatch(&mut self, dispatch: &Dispatch<'_>) -> EngineResult<()> {
            self.inner.dispatch(dispatch)
        }

        fn submit(&mut self) -> EngineResult<()> {
            self.inner.submit()
        }

        fn read_buffer(&mut self, id: BufferId) -> EngineResult<Vec<f32>> {
            self.inner.read_buffer(id)
        }
    }

    fn refusing_volume(size: u32) -> Sim3D<Refusing> {
        let backend = Refusing {
            inner: CpuBackend::with_max_output_targets(4),
            refuse: false,
        };
        let mut sim = Sim3D::new(backend, Sim3DConfig::new(size)).unwrap();
        sim.reset(Some("realloc")).unwrap();
        sim
    }

    #[test]
    fn test_failed_reallocation_keeps_grid() {
        let mut sim = refusing_volume(8);
        let before = sim.read_visible().unwrap();
        sim.backend_mut().refuse = true;

        // 10 slices need a 2-layer program the backend will not build.
        let err = sim.set_size(10).unwrap_err();
        assert!(matches!(err, EngineError::Compile { .. }));
        assert_eq!(sim.size(), 8);
        assert_eq!(sim.shape(), GridShape::cube(8));
        assert_eq!(sim.chunks(), chunks_for(8, 4).as_slice());
        assert_eq!(sim.backend().inner.buffer_count(), 2);
        assert_eq!(sim.read_visible().unwrap(), before);

        // Cached programs still step the old grid.
        assert_eq!(sim.step().unwrap(), 1);
    }

    #[test]
    fn test_step_before_reset_does_nothing() {
        let backend = Refusing {
            inner: CpuBackend::new(),
            refuse: false,
        };
        let mut sim = Sim3D::new(backend, Sim3DConfig::new(4)).unwrap();
        let dispatches = sim.backend().inner.dispatch_count();
        assert_eq!(sim.step().unwrap(), 0);
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.state(), SimState::Uninitialized);
        assert_eq!(sim.backend().inner.dispatch_count(), dispatches);
    }

    #[test]
    fn test_step_while_paused_does_nothing() {
        let mut sim = refusing_volume(4);
        sim.set_paused(true);
        let before = sim.read_visible().unwrap();
        assert_eq!(sim.step().unwrap(), 0);
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.state(), SimState::Paused);
        assert_eq!(sim.read_visible().unwrap(), before);
    }

    #[test]
    fn test_reset_restarts_compute_delay() {
        let mut sim = refusing_volume(4);
        sim.set_compute_delay(3);
        assert_eq!(sim.render().unwrap().steps, 0);
        assert_eq!(sim.render().unwrap().steps, 0);
        assert_eq!(sim.cadence().current_delay(), 2);

        sim.reset(Some("again")).unwrap();
        assert_eq!(sim.cadence().current_delay(), 0);
        let steps: Vec<u32> = (0..3).map(|_| sim.render().unwrap().steps).collect();
        assert_eq!(steps, vec![0, 0, 1]);
    }
}
