//! Uniform block shared by every generated program.
//!
//! Layout is four 16-byte rows so the struct matches WGSL uniform alignment
//! without explicit padding.

use bytemuck::{Pod, Zeroable};

use crate::grid::{Chunk, Edges, GridShape};
use crate::library::FillMode;

/// Per-dispatch parameters, uploaded as a uniform buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct StageParams {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub channels: u32,

    /// First depth slice written by this dispatch.
    pub z_offset: u32,
    /// Number of depth slices written by this dispatch.
    pub total_layers: u32,
    /// Packed [`Edges`].
    pub edges: u32,
    /// [`FillMode::code`].
    pub fill_mode: u32,

    /// Salt for the randomizer hash.
    pub seed: u32,
    /// Constant written by the clear program.
    pub fill_value: f32,
    pub region: f32,
    pub density: f32,

    /// Brush center, normalized.
    pub brush_x: f32,
    pub brush_y: f32,
    /// Brush radius in cells.
    pub brush_radius: f32,
    pub brush_value: f32,
}

impl StageParams {
    /// Params covering `chunk` of a grid of `shape`; everything else zeroed.
    pub fn new(shape: GridShape, chunk: Chunk) -> Self {
        Self {
            width: shape.width,
            height: shape.height,
            depth: shape.depth,
            channels: shape.channels,
            z_offset: chunk.z_offset,
            total_layers: chunk.total_layers,
            ..Self::zeroed()
        }
    }

    pub fn with_edges(mut self, edges: Edges) -> Self {
        self.edges = edges.bits();
        self
    }

    pub fn with_fill(mut self, mode: FillMode, region: f32, density: f32) -> Self {
        self.fill_mode = mode.code();
        self.region = region;
        self.density = density;
        self
    }

    /// Salt the randomizer hash with the bit pattern of a seeded scalar.
    pub fn with_seed(mut self, scalar: f32) -> Self {
        self.seed = scalar.to_bits();
        self
    }

    pub fn with_fill_value(mut self, value: f32) -> Self {
        self.fill_value = value;
        self
    }

    pub fn with_brush(mut self, x: f32, y: f32, radius: f32, value: f32) -> Self {
        self.brush_x = x;
        self.brush_y = y;
        self.brush_radius = radius;
        self.brush_value = value;
        self
    }

    /// Grid shape these params describe.
    pub fn shape(&self) -> GridShape {
        GridShape {
            width: self.width,
            height: self.height,
            depth: self.depth,
            channels: self.channels,
        }
    }

    /// Chunk these params describe.
    pub fn chunk(&self) -> Chunk {
        Chunk {
            z_offset: self.z_offset,
            total_layers: self.total_layers,
        }
    }

    pub fn edges(&self) -> Edges {
        Edges::from_bits(self.edges)
    }
}

/// WGSL declaration matching [`StageParams`].
pub const STAGE_PARAMS_WGSL: &str = r#"struct StageParams {
    width: u32,
    height: u32,
    depth: u32,
    channels: u32,
    z_offset: u32,
    total_layers: u32,
    edges: u32,
    fill_mode: u32,
    seed: u32,
    fill_value: f32,
    region: f32,
    density: f32,
    brush_x: f32,
    brush_y: f32,
    brush_radius: f32,
    brush_value: f32,
};
"#;
