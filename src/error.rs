//! Error types for the automaton engine.
//!
//! Compile failures are fatal for the stage that needed the program: they are
//! returned to the caller as-is and never retried. Invalid setter input is not
//! an error at all; the controllers ignore it.

use std::fmt;

/// Errors that can occur while bringing up the wgpu device.
#[derive(Debug)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// Failed to map buffer for reading.
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => write!(
                f,
                "No compatible GPU adapter found. \
                 Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."
            ),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors surfaced by stages and controllers.
#[derive(Debug)]
pub enum EngineError {
    /// A program failed to compile or link. The simulation cannot advance.
    Compile {
        /// Label of the program that failed.
        program: String,
        /// Compiler diagnostic.
        message: String,
    },
    /// The GPU device failed.
    Gpu(GpuError),
    /// A buffer or program handle that the backend does not know.
    InvalidHandle(String),
    /// A grid has more values than one backend buffer may hold.
    GridTooLarge { cells: u64, max_cells: u64 },
}

impl EngineError {
    pub(crate) fn compile(program: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Compile {
            program: program.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Compile { program, message } => {
                write!(f, "Failed to compile program '{}': {}", program, message)
            }
            EngineError::Gpu(e) => write!(f, "GPU error: {}", e),
            EngineError::InvalidHandle(what) => write!(f, "Invalid handle: {}", what),
            EngineError::GridTooLarge { cells, max_cells } => write!(
                f,
                "Grid of {} values exceeds the backend limit of {}",
                cells, max_cells
            ),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for EngineError {
    fn from(e: GpuError) -> Self {
        EngineError::Gpu(e)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
