//! wgpu compute backend.
//!
//! Grids live in storage buffers. Every program shares one bind group
//! layout (params, weights, source, target); a dispatch without a source
//! binds a small placeholder buffer instead.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::error::{EngineError, EngineResult, GpuError};
use crate::grid::GridShape;
use crate::shader_utils::{validate_wgsl, WORKGROUP_SIZE};

use super::{BufferId, ComputeBackend, Dispatch, Program, ProgramId};

struct GpuGrid {
    buffer: wgpu::Buffer,
    shape: GridShape,
}

/// Backend running programs as wgpu compute pipelines.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    max_output_targets: u32,
    max_cells: u64,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: Vec<wgpu::ComputePipeline>,
    buffers: HashMap<BufferId, GpuGrid>,
    next_buffer: u64,
    placeholder: wgpu::Buffer,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    /// Open the default high-performance adapter.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        tracing::info!("Using adapter: {} ({:?})", info.name, info.backend);

        // A 512³ grid needs more storage than the default limits allow.
        let adapter_limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..Default::default()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("NCA Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self::from_device(device, queue, info.name))
    }

    /// Wrap an existing device, e.g. one shared with a renderer.
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_name: impl Into<String>,
    ) -> Self {
        let limits = device.limits();
        let max_output_targets = limits.max_color_attachments;
        let max_bytes = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        let max_cells = max_bytes / std::mem::size_of::<f32>() as u64;
        tracing::info!(
            "Device limits: {} output targets, {} cells per grid",
            max_output_targets,
            max_cells
        );
        let bind_group_layout = create_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grid Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let placeholder = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Placeholder Buffer"),
            size: 16,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            adapter_name: adapter_name.into(),
            max_output_targets,
            max_cells,
            bind_group_layout,
            pipeline_layout,
            pipelines: Vec::new(),
            buffers: HashMap::new(),
            next_buffer: 0,
            placeholder,
            encoder: None,
        }
    }

    /// Name of the adapter in use.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The storage buffer behind a grid, for binding in a renderer.
    pub fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(&id).map(|g| &g.buffer)
    }
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn max_output_targets(&self) -> u32 {
        self.max_output_targets
    }

    fn max_cells(&self) -> u64 {
        self.max_cells
    }

    fn compile(&mut self, program: &Program) -> EngineResult<ProgramId> {
        // naga first: its diagnostics point at the offending line.
        if let Err(message) = validate_wgsl(&program.wgsl) {
            tracing::error!("Program '{}' failed validation: {}", program.label, message);
            return Err(EngineError::compile(&program.label, message));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&program.label),
            source: wgpu::ShaderSource::Wgsl(program.wgsl.as_str().into()),
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&program.label),
            layout: Some(&self.pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::error!("Pipeline '{}' failed: {}", program.label, err);
            return Err(EngineError::compile(&program.label, err.to_string()));
        }

        tracing::debug!("Compiled pipeline '{}'", program.label);
        let id = ProgramId(self.pipelines.len() as u64);
        self.pipelines.push(pipeline);
        Ok(id)
    }

    fn allocate_buffer(&mut self, shape: GridShape) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        // wgpu zero-initializes new buffers.
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Grid Buffer {}", id.0)),
            size: shape.byte_size().max(4),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.buffers.insert(id, GpuGrid { buffer, shape });
        id
    }

    fn release_buffer(&mut self, id: BufferId) {
        if let Some(grid) = self.buffers.remove(&id) {
            grid.buffer.destroy();
        }
    }

    fn dispatch(&mut self, dispatch: &Dispatch<'_>) -> EngineResult<()> {
        let pipeline = self
            .pipelines
            .get(dispatch.program.0 as usize)
            .ok_or_else(|| EngineError::InvalidHandle(format!("program {:?}", dispatch.program)))?;
        let target = &grid(&self.buffers, dispatch.target)?.buffer;
        let source = match dispatch.source {
            Some(id) => &grid(&self.buffers, id)?.buffer,
            None => &self.placeholder,
        };

        let params_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Stage Params"),
            contents: bytemuck::bytes_of(&dispatch.params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let weights: &[f32] = if dispatch.kernel.is_empty() { &[0.0] } else { dispatch.kernel };
        let weights_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Weights"),
            contents: bytemuck::cast_slice(weights),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Grid Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: weights_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: source.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: target.as_entire_binding(),
                },
            ],
        });

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Grid Encoder"),
            })
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Grid Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                dispatch.params.width.div_ceil(WORKGROUP_SIZE),
                dispatch.params.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        Ok(())
    }

    fn submit(&mut self) -> EngineResult<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        Ok(())
    }

    fn read_buffer(&mut self, id: BufferId) -> EngineResult<Vec<f32>> {
        self.submit()?;
        let source = grid(&self.buffers, id)?;
        let size = source.shape.byte_size();
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Grid Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&source.buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, f32>(&view).to_vec()
        };
        staging.unmap();
        Ok(data)
    }
}

fn grid(buffers: &HashMap<BufferId, GpuGrid>, id: BufferId) -> EngineResult<&GpuGrid> {
    buffers
        .get(&id)
        .ok_or_else(|| EngineError::InvalidHandle(format!("buffer {:?}", id)))
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Grid Bind Group Layout"),
        entries: &[
            // Params
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Kernel weights
            storage_entry(1, true),
            // Source grid
            storage_entry(2, true),
            // Target grid
            storage_entry(3, false),
        ],
    })
}
