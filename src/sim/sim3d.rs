use std::ops::{Deref, DerefMut};

use crate::backend::ComputeBackend;
use crate::config::{Sim3DConfig, MAX_SIZE};
use crate::error::EngineResult;
use crate::grid::{EdgeMode, Edges, GridShape};
use crate::kernel::Dimension;
use crate::preset::{DisplaySettings, PresetRecord};
use crate::symmetry::SymmetrySet;

use super::Controller;

/// Volumetric single-channel automaton.
///
/// The volume is stepped in depth chunks of at most the backend's output
/// target limit. Shared controls come from [`Controller`] through `Deref`.
///
/// # Example
///
/// ```ignore
/// let mut sim = Sim3D::new(CpuBackend::new(), Sim3DConfig::new(32).with_seed("abc"))?;
/// sim.reset(Some("abc"))?;
/// for _ in 0..10 {
///     sim.render()?;
/// }
/// ```
pub struct Sim3D<B: ComputeBackend> {
    core: Controller<B>,
    display: DisplaySettings,
}

impl<B: ComputeBackend> Sim3D<B> {
    pub fn new(backend: B, config: Sim3DConfig) -> EngineResult<Self> {
        let size = config.size.clamp(1, MAX_SIZE);
        let core = Controller::new(
            backend,
            Dimension::Three,
            GridShape::cube(size),
            config.rule,
            config.edges,
            config.cadence,
            config.seed,
        )?;
        Ok(Self {
            core,
            display: DisplaySettings::volume(),
        })
    }

    /// Side length of the volume.
    pub fn size(&self) -> u32 {
        self.core.shape().depth
    }

    /// Resize the volume, recompute chunks and reset.
    ///
    /// Ignored unless `1 <= size <= 512` and the backend can hold the volume.
    pub fn set_size(&mut self, size: i64) -> EngineResult<()> {
        if size <= 0 || size > MAX_SIZE as i64 {
            tracing::debug!("Ignoring volume size {}", size);
            return Ok(());
        }
        self.core.reallocate(GridShape::cube(size as u32))
    }

    /// Seeded fraction of each axis. Ignored outside (0, 1].
    pub fn set_region(&mut self, region: f32) {
        if !(region > 0.0 && region <= 1.0) {
            tracing::debug!("Ignoring randomizer region {}", region);
            return;
        }
        self.core.randomize_settings_mut().region = region;
    }

    /// Seeding probability. Ignored outside [0, 1].
    pub fn set_density(&mut self, density: f32) {
        if !(0.0..=1.0).contains(&density) {
            tracing::debug!("Ignoring randomizer density {}", density);
            return;
        }
        self.core.randomize_settings_mut().density = density;
    }

    /// Wrap or clamp on every axis.
    pub fn set_wrap(&mut self, wrap: bool) {
        let mode = if wrap { EdgeMode::Wrap } else { EdgeMode::Clamp };
        self.core.set_edges(Edges::uniform(mode));
    }

    pub fn display(&self) -> &DisplaySettings {
        &self.display
    }

    pub fn set_display(&mut self, display: DisplaySettings) {
        self.display = display;
    }

    /// Snapshot of the current configuration as a preset record.
    pub fn to_preset(&self) -> PresetRecord {
        let cadence = self.core.cadence();
        PresetRecord {
            sim_mode: Dimension::Three,
            seed: self.core.seed().to_string(),
            kernel: self.core.kernel().weights().to_vec(),
            activation: self.core.activation().clone(),
            symmetry: self.core.symmetries().to_flags(),
            shader: self.display.shader.clone(),
            size: Some(self.size()),
            compute_delay: Some(cadence.compute_delay),
            wrap: Some(self.core.edges().all_wrap()),
            blend: Some(self.display.blend),
            skip: Some(cadence.skip_every_other),
        }
    }

    /// Apply a preset record and reset with its seed.
    ///
    /// 2-D records are ignored. If the activation fails to compile nothing
    /// changes and the error is returned.
    pub fn apply_preset(&mut self, record: &PresetRecord) -> EngineResult<()> {
        if record.sim_mode != Dimension::Three {
            tracing::debug!("Ignoring {:?} preset record", record.sim_mode);
            return Ok(());
        }
        self.core.set_activation(record.activation.source())?;
        self.core
            .set_symmetries(SymmetrySet::from_flags(Dimension::Three, &record.symmetry));
        self.core.set_kernel(&record.kernel);
        if let Some(delay) = record.compute_delay {
            self.core.set_compute_delay(delay);
        }
        if let Some(skip) = record.skip {
            self.core.set_skip_every_other(skip);
        }
        if let Some(wrap) = record.wrap {
            self.set_wrap(wrap);
        }
        self.display.shader = record.shader.clone();
        if let Some(blend) = record.blend {
            self.display.blend = blend;
        }

        match record.size {
            Some(size) if size != self.size() && (1..=MAX_SIZE).contains(&size) => {
                self.core.reallocate(GridShape::cube(size))?;
            }
            _ => {}
        }
        self.core.reset(Some(&record.seed))
    }
}

impl<B: ComputeBackend> Deref for Sim3D<B> {
    type Target = Controller<B>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<B: ComputeBackend> DerefMut for Sim3D<B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}
