//! Grid state store: double-buffered cell storage and depth chunking.
//!
//! Every simulation owns one [`GridPair`]. The pair holds two backend buffers
//! of identical [`GridShape`]; which one is "old" (read, displayed) and which
//! is "new" (written by the next stage) is a single slot index that
//! [`GridPair::swap`] toggles. No cell data moves on a swap.
//!
//! Volumes are also split into [`Chunk`]s, because a backend program can
//! write at most `L` depth slices per dispatch. A 2-D grid has depth 1 and so
//! always yields exactly one chunk.

use serde::{Deserialize, Serialize};

use crate::backend::{BufferId, ComputeBackend};

/// Dimensions of a grid buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridShape {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Independent scalar channels per cell, 1 to 4.
    pub channels: u32,
}

impl GridShape {
    /// 2-D surface with `channels` channels.
    pub fn surface(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
            channels: channels.clamp(1, 4),
        }
    }

    /// Single-channel cube of side `n`.
    pub fn cube(n: u32) -> Self {
        Self {
            width: n,
            height: n,
            depth: n,
            channels: 1,
        }
    }

    /// Number of cells.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Number of `f32` values in a buffer of this shape.
    pub fn len(&self) -> usize {
        self.cells() * self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer size in bytes.
    pub fn byte_size(&self) -> u64 {
        (self.len() * std::mem::size_of::<f32>()) as u64
    }

    /// Storage index of channel `c` of cell `(x, y, z)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32, c: u32) -> usize {
        let w = self.width as usize;
        let h = self.height as usize;
        ((z as usize * h + y as usize) * w + x as usize) * self.channels as usize + c as usize
    }
}

/// A run of consecutive depth slices written by one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub z_offset: u32,
    pub total_layers: u32,
}

impl Chunk {
    /// One past the last slice of this chunk.
    pub fn end(&self) -> u32 {
        self.z_offset + self.total_layers
    }
}

/// Partition `depth` slices into chunks of at most `max_layers` slices.
///
/// Chunks are ordered by `z_offset`, contiguous and non-overlapping, and
/// their layer counts sum to `depth`. Only the last chunk can be partial.
pub fn chunks_for(depth: u32, max_layers: u32) -> Vec<Chunk> {
    let step = max_layers.max(1);
    let mut chunks = Vec::with_capacity(depth.div_ceil(step) as usize);
    let mut z_offset = 0;
    while z_offset < depth {
        let total_layers = (depth - z_offset).min(step);
        chunks.push(Chunk {
            z_offset,
            total_layers,
        });
        z_offset += total_layers;
    }
    chunks
}

/// How neighbor coordinates past the grid boundary are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Clamp to `[0, n - 1]`.
    #[default]
    Clamp,
    /// Toroidal, modulo `n`.
    Wrap,
}

impl EdgeMode {
    /// Resolve a possibly out-of-range coordinate along an axis of length `n`.
    #[inline]
    pub fn resolve(&self, i: i64, n: u32) -> u32 {
        let n = n.max(1) as i64;
        match self {
            EdgeMode::Clamp => i.clamp(0, n - 1) as u32,
            EdgeMode::Wrap => i.rem_euclid(n) as u32,
        }
    }
}

/// Edge mode per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Edges {
    pub x: EdgeMode,
    pub y: EdgeMode,
    pub z: EdgeMode,
}

impl Edges {
    /// The same mode on every axis.
    pub fn uniform(mode: EdgeMode) -> Self {
        Self {
            x: mode,
            y: mode,
            z: mode,
        }
    }

    pub fn clamp() -> Self {
        Self::uniform(EdgeMode::Clamp)
    }

    pub fn wrap() -> Self {
        Self::uniform(EdgeMode::Wrap)
    }

    /// True if every axis wraps.
    pub fn all_wrap(&self) -> bool {
        *self == Self::wrap()
    }

    /// Packed form used in `StageParams::edges`: bit 0 = x wraps, bit 1 = y, bit 2 = z.
    pub fn bits(&self) -> u32 {
        let bit = |m: EdgeMode, shift: u32| match m {
            EdgeMode::Clamp => 0,
            EdgeMode::Wrap => 1 << shift,
        };
        bit(self.x, 0) | bit(self.y, 1) | bit(self.z, 2)
    }

    /// Inverse of [`Edges::bits`].
    pub fn from_bits(bits: u32) -> Self {
        let mode = |shift: u32| {
            if bits & (1 << shift) != 0 {
                EdgeMode::Wrap
            } else {
                EdgeMode::Clamp
            }
        };
        Self {
            x: mode(0),
            y: mode(1),
            z: mode(2),
        }
    }

    /// Mode for axis 0 (x), 1 (y) or 2 (z).
    pub fn axis(&self, axis: usize) -> EdgeMode {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

/// Normalized coordinate of the center of texel `i` along an axis of `n`.
///
/// Slice `z` maps to `(z + 0.5) / n`, not `z / n`.
#[inline]
pub fn texel_center(i: u32, n: u32) -> f32 {
    (i as f32 + 0.5) / n.max(1) as f32
}

/// Two same-shape buffers with an old/new role register.
#[derive(Debug)]
pub struct GridPair {
    shape: GridShape,
    buffers: [BufferId; 2],
    /// Slot holding the "old" buffer.
    old: usize,
    chunks: Vec<Chunk>,
}

impl GridPair {
    /// Allocate both buffers and compute the chunk layout for the backend's
    /// output-target limit.
    pub fn create(backend: &mut dyn ComputeBackend, shape: GridShape) -> Self {
        let buffers = [backend.allocate_buffer(shape), backend.allocate_buffer(shape)];
        let chunks = chunks_for(shape.depth, backend.max_output_targets());
        tracing::debug!(
            "Allocated grid pair {}x{}x{}x{} in {} chunk(s)",
            shape.width,
            shape.height,
            shape.depth,
            shape.channels,
            chunks.len()
        );
        Self {
            shape,
            buffers,
            old: 0,
            chunks,
        }
    }

    /// Give both buffers back to the backend.
    pub fn release(self, backend: &mut dyn ComputeBackend) {
        for id in self.buffers {
            backend.release_buffer(id);
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The buffer stages read from and the display shows.
    pub fn old(&self) -> BufferId {
        self.buffers[self.old]
    }

    /// The buffer the next stage writes.
    pub fn new_buffer(&self) -> BufferId {
        self.buffers[1 - self.old]
    }

    /// Exchange the old and new roles.
    pub fn swap(&mut self) {
        self.old = 1 - self.old;
    }

    /// Both buffers, old first.
    pub fn both(&self) -> [BufferId; 2] {
        [self.old(), self.new_buffer()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_cover_every_depth() {
        for max_layers in [1, 4, 8] {
            for n in 1..=512u32 {
                let chunks = chunks_for(n, max_layers);
                let total: u32 = chunks.iter().map(|c| c.total_layers).sum();
                assert_eq!(total, n, "n={} L={}", n, max_layers);

                let mut expected = 0;
                for c in &chunks {
                    assert_eq!(c.z_offset, expected);
                    assert!(c.total_layers >= 1 && c.total_layers <= max_layers);
                    expected = c.end();
                }
            }
        }
    }

    #[test]
    fn test_only_last_chunk_is_partial() {
        let chunks = chunks_for(10, 4);
        assert_eq!(
            chunks,
            vec![
                Chunk { z_offset: 0, total_layers: 4 },
                Chunk { z_offset: 4, total_layers: 4 },
                Chunk { z_offset: 8, total_layers: 2 },
            ]
        );
    }

    #[test]
    fn test_surface_is_one_chunk() {
        assert_eq!(chunks_for(1, 8), vec![Chunk { z_offset: 0, total_layers: 1 }]);
        assert!(chunks_for(0, 8).is_empty());
    }

    #[test]
    fn test_index_layout() {
        let s = GridShape::surface(5, 3, 2);
        assert_eq!(s.index(0, 0, 0, 1), 1);
        assert_eq!(s.index(1, 0, 0, 0), 2);
        assert_eq!(s.index(0, 1, 0, 0), 10);
        assert_eq!(s.index(4, 2, 0, 1), s.len() - 1);

        let v = GridShape::cube(4);
        assert_eq!(v.index(0, 0, 1, 0), 16);
        assert_eq!(v.len(), 64);
    }

    #[test]
    fn test_edge_resolve() {
        assert_eq!(EdgeMode::Clamp.resolve(-1, 8), 0);
        assert_eq!(EdgeMode::Clamp.resolve(8, 8), 7);
        assert_eq!(EdgeMode::Wrap.resolve(-1, 8), 7);
        assert_eq!(EdgeMode::Wrap.resolve(8, 8), 0);
        assert_eq!(EdgeMode::Wrap.resolve(3, 8), 3);
    }

    #[test]
    fn test_edge_bits() {
        let e = Edges {
            x: EdgeMode::Wrap,
            y: EdgeMode::Clamp,
            z: EdgeMode::Wrap,
        };
        assert_eq!(e.bits(), 0b101);
        assert_eq!(Edges::from_bits(e.bits()), e);
        assert_eq!(Edges::wrap().bits(), 0b111);
        assert_eq!(Edges::clamp().bits(), 0);
    }

    #[test]
    fn test_texel_center_half_offset() {
        assert_eq!(texel_center(0, 4), 0.125);
        assert_eq!(texel_center(3, 4), 0.875);
        assert_eq!(texel_center(0, 1), 0.5);
    }
}
