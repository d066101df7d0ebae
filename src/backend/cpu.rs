//! Host-side reference backend.
//!
//! Executes each program kind with the same arithmetic as its WGSL, one cell
//! at a time. Dispatches run eagerly, so `submit` has nothing to flush.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::expr::Expr;
use crate::grid::{texel_center, GridShape};
use crate::kernel::Dimension;
use crate::shader_utils::{cell_hash, rand01, validate_wgsl};
use crate::uniforms::StageParams;

use super::{BufferId, ComputeBackend, Dispatch, Program, ProgramId, ProgramKind};

/// Output-target limit used when none is given.
pub const DEFAULT_MAX_OUTPUT_TARGETS: u32 = 8;

enum CpuProgram {
    Clear { layers: u32 },
    Randomize { layers: u32 },
    Convolve {
        dimension: Dimension,
        layers: u32,
        activation: Expr,
    },
    Brush,
}

impl CpuProgram {
    fn layers(&self) -> u32 {
        match self {
            CpuProgram::Clear { layers }
            | CpuProgram::Randomize { layers }
            | CpuProgram::Convolve { layers, .. } => *layers,
            CpuProgram::Brush => 1,
        }
    }
}

struct CpuBuffer {
    shape: GridShape,
    data: Vec<f32>,
}

/// Reference backend executing programs on the CPU.
pub struct CpuBackend {
    max_output_targets: u32,
    max_cells: u64,
    programs: Vec<(String, CpuProgram)>,
    buffers: HashMap<BufferId, CpuBuffer>,
    next_buffer: u64,
    dispatch_count: u64,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::with_max_output_targets(DEFAULT_MAX_OUTPUT_TARGETS)
    }

    /// Backend that reports `max_output_targets` as its limit.
    pub fn with_max_output_targets(max_output_targets: u32) -> Self {
        Self {
            max_output_targets: max_output_targets.max(1),
            max_cells: u64::MAX,
            programs: Vec::new(),
            buffers: HashMap::new(),
            next_buffer: 0,
            dispatch_count: 0,
        }
    }

    /// Cap the values one buffer may hold, like a device storage limit.
    pub fn with_max_cells(mut self, max_cells: u64) -> Self {
        self.max_cells = max_cells;
        self
    }

    /// Number of programs compiled so far.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Number of dispatches executed so far.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn buffer(&self, id: BufferId) -> EngineResult<&CpuBuffer> {
        self.buffers
            .get(&id)
            .ok_or_else(|| EngineError::InvalidHandle(format!("buffer {:?}", id)))
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn max_output_targets(&self) -> u32 {
        self.max_output_targets
    }

    fn max_cells(&self) -> u64 {
        self.max_cells
    }

    fn compile(&mut self, program: &Program) -> EngineResult<ProgramId> {
        validate_wgsl(&program.wgsl).map_err(|msg| EngineError::compile(&program.label, msg))?;

        let compiled = match &program.kind {
            ProgramKind::Clear { layers } => CpuProgram::Clear { layers: *layers },
            ProgramKind::Randomize { layers } => CpuProgram::Randomize { layers: *layers },
            ProgramKind::Convolve {
                dimension,
                layers,
                activation,
            } => {
                let expr = Expr::parse(activation.source()).map_err(|e| {
                    let msg = format!("activation not supported on the CPU backend: {}", e);
                    EngineError::compile(&program.label, msg)
                })?;
                CpuProgram::Convolve {
                    dimension: *dimension,
                    layers: *layers,
                    activation: expr,
                }
            }
            ProgramKind::Brush => CpuProgram::Brush,
        };

        let id = ProgramId(self.programs.len() as u64);
        self.programs.push((program.label.clone(), compiled));
        Ok(id)
    }

    fn allocate_buffer(&mut self, shape: GridShape) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(
            id,
            CpuBuffer {
                shape,
                data: vec![0.0; shape.len()],
            },
        );
        id
    }

    fn release_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    fn dispatch(&mut self, dispatch: &Dispatch<'_>) -> EngineResult<()> {
        let (label, program) = self
            .programs
            .get(dispatch.program.0 as usize)
            .ok_or_else(|| EngineError::InvalidHandle(format!("program {:?}", dispatch.program)))?;

        let params = &dispatch.params;
        if program.layers() != params.total_layers {
            return Err(EngineError::InvalidHandle(format!(
                "program '{}' writes {} layers, dispatch covers {}",
                label,
                program.layers(),
                params.total_layers
            )));
        }
        if dispatch.source == Some(dispatch.target) {
            return Err(EngineError::InvalidHandle(format!(
                "buffer {:?} bound as both source and target",
                dispatch.target
            )));
        }

        let target_shape = self.buffer(dispatch.target)?.shape;
        if target_shape != params.shape() {
            return Err(EngineError::InvalidHandle(format!(
                "buffer {:?} is {:?}, params describe {:?}",
                dispatch.target,
                target_shape,
                params.shape()
            )));
        }
        let needs_source = matches!(program, CpuProgram::Convolve { .. } | CpuProgram::Brush);
        match dispatch.source {
            Some(id) => {
                let source_shape = self.buffer(id)?.shape;
                if source_shape != target_shape {
                    return Err(EngineError::InvalidHandle(format!(
                        "source {:?} is {:?}, target is {:?}",
                        id, source_shape, target_shape
                    )));
                }
            }
            None if needs_source => {
                return Err(EngineError::InvalidHandle(format!(
                    "program '{}' needs a source buffer",
                    label
                )));
            }
            None => {}
        }

        // Kernels write only the chunk's slices, straight into the target.
        let mut out = match self.buffers.get_mut(&dispatch.target) {
            Some(target) => std::mem::take(&mut target.data),
            None => return Err(EngineError::InvalidHandle(format!("buffer {:?}", dispatch.target))),
        };
        let source = dispatch
            .source
            .and_then(|id| self.buffers.get(&id))
            .map(|b| b.data.as_slice())
            .unwrap_or(&[]);
        match program {
            CpuProgram::Clear { .. } => clear(params, &mut out),
            CpuProgram::Randomize { .. } => randomize(params, &mut out),
            CpuProgram::Convolve {
                dimension,
                activation,
                ..
            } => convolve(params, *dimension, dispatch.kernel, activation, source, &mut out),
            CpuProgram::Brush => brush(params, source, &mut out),
        }
        if let Some(target) = self.buffers.get_mut(&dispatch.target) {
            target.data = out;
        }

        self.dispatch_count += 1;
        Ok(())
    }

    fn submit(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn read_buffer(&mut self, id: BufferId) -> EngineResult<Vec<f32>> {
        Ok(self.buffer(id)?.data.clone())
    }
}

/// Call `f(x, y, z)` for every cell of the dispatched chunk.
fn for_each_cell(params: &StageParams, mut f: impl FnMut(u32, u32, u32)) {
    for z in params.z_offset..params.z_offset + params.total_layers {
        for y in 0..params.height {
            for x in 0..params.width {
                f(x, y, z);
            }
        }
    }
}

fn clear(params: &StageParams, out: &mut [f32]) {
    let shape = params.shape();
    for_each_cell(params, |x, y, z| {
        for c in 0..shape.channels {
            out[shape.index(x, y, z, c)] = params.fill_value;
        }
    });
}

fn in_region(i: u32, n: u32, region: f32) -> bool {
    (texel_center(i, n) - 0.5).abs() <= region * 0.5
}

fn randomize(params: &StageParams, out: &mut [f32]) {
    let shape = params.shape();
    for_each_cell(params, |x, y, z| {
        let inside = in_region(x, shape.width, params.region)
            && in_region(y, shape.height, params.region)
            && in_region(z, shape.depth, params.region);
        for c in 0..shape.channels {
            let h = cell_hash(x, y, z, c, params.seed);
            let seeded = inside
                && params.fill_mode != 2
                && rand01(h ^ 0x9e37_79b9) < params.density;
            out[shape.index(x, y, z, c)] = match (seeded, params.fill_mode) {
                (false, _) => 0.0,
                (true, 1) => 1.0,
                (true, _) => rand01(h),
            };
        }
    });
}

fn convolve(
    params: &StageParams,
    dimension: Dimension,
    kernel: &[f32],
    activation: &Expr,
    src: &[f32],
    out: &mut [f32],
) {
    let shape = params.shape();
    let edges = params.edges();
    let dz_range = match dimension {
        Dimension::Two => 0,
        Dimension::Three => 1,
    };
    let weight = |dx: i32, dy: i32, dz: i32| {
        kernel
            .get(dimension.offset_index(dx, dy, dz))
            .copied()
            .unwrap_or(0.0)
    };

    for_each_cell(params, |x, y, z| {
        for c in 0..shape.channels {
            let mut sum = 0.0f32;
            for dz in -dz_range..=dz_range {
                let sz = edges.z.resolve(z as i64 + dz as i64, shape.depth);
                for dy in -1..=1 {
                    let sy = edges.y.resolve(y as i64 + dy as i64, shape.height);
                    for dx in -1..=1 {
                        let sx = edges.x.resolve(x as i64 + dx as i64, shape.width);
                        sum += src[shape.index(sx, sy, sz, c)] * weight(dx, dy, dz);
                    }
                }
            }
            out[shape.index(x, y, z, c)] = activation.eval(sum).clamp(0.0, 1.0);
        }
    });
}

fn axis_distance(i: u32, n: u32, center: f32) -> f32 {
    let d = (texel_center(i, n) - center).abs();
    d.min(1.0 - d) * n as f32
}

fn brush(params: &StageParams, src: &[f32], out: &mut [f32]) {
    let shape = params.shape();
    for_each_cell(params, |x, y, z| {
        let dx = axis_distance(x, shape.width, params.brush_x);
        let dy = axis_distance(y, shape.height, params.brush_y);
        let inside = (dx * dx + dy * dy).sqrt() <= params.brush_radius;
        for c in 0..shape.channels {
            let i = shape.index(x, y, z, c);
            out[i] = if inside { params.brush_value } else { src[i] };
        }
    });
}
