//! WGSL shared by every generated program.
//!
//! # Bindings
//!
//! | binding | WGSL name   | contents                          |
//! |---------|-------------|-----------------------------------|
//! | 0       | `params`    | [`StageParams`] uniform           |
//! | 1       | `weights`   | kernel weights, read-only storage |
//! | 2       | `cells_in`  | source grid, read-only storage    |
//! | 3       | `cells_out` | destination grid, read-write      |
//!
//! # Functions
//!
//! - `hash(n: u32) -> u32` - integer hash
//! - `rand01(n: u32) -> f32` - hash to a float in [0, 1)
//! - `resolve(i: i32, n: u32, wrap: bool) -> u32` - apply an edge mode
//! - `edge_wraps(axis: u32) -> bool` - read the packed edge bits
//! - `cell_index(x, y, z, c) -> u32` - storage index into a grid
//! - `texel_center(i: u32, n: u32) -> f32` - `(i + 0.5) / n`
//!
//! Each function has a CPU twin in this module so the reference backend
//! produces the same values as the GPU.
//!
//! [`StageParams`]: crate::uniforms::StageParams

use crate::uniforms::STAGE_PARAMS_WGSL;

/// Workgroup edge length; programs run `WORKGROUP_SIZE x WORKGROUP_SIZE` columns per group.
pub const WORKGROUP_SIZE: u32 = 8;

/// Binding declarations.
pub const BINDINGS_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> params: StageParams;
@group(0) @binding(1) var<storage, read> weights: array<f32>;
@group(0) @binding(2) var<storage, read> cells_in: array<f32>;
@group(0) @binding(3) var<storage, read_write> cells_out: array<f32>;
"#;

/// Hashing and addressing helpers.
pub const GRID_WGSL: &str = r#"
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn rand01(n: u32) -> f32 {
    return f32(hash(n) >> 8u) / 16777216.0;
}

fn resolve(i: i32, n: u32, wrap: bool) -> u32 {
    let m = i32(n);
    if (wrap) {
        return u32(((i % m) + m) % m);
    }
    return u32(clamp(i, 0, m - 1));
}

fn edge_wraps(axis: u32) -> bool {
    return (params.edges & (1u << axis)) != 0u;
}

fn cell_index(x: u32, y: u32, z: u32, c: u32) -> u32 {
    return ((z * params.height + y) * params.width + x) * params.channels + c;
}

fn texel_center(i: u32, n: u32) -> f32 {
    return (f32(i) + 0.5) / f32(n);
}
"#;

/// Everything a program needs before its own functions.
pub fn prelude_wgsl() -> String {
    format!("{}{}{}", STAGE_PARAMS_WGSL, BINDINGS_WGSL, GRID_WGSL)
}

/// CPU twin of WGSL `hash`.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// CPU twin of WGSL `rand01`.
#[inline]
pub fn rand01(n: u32) -> f32 {
    (hash(n) >> 8) as f32 / 16_777_216.0
}

/// Randomizer hash of channel `c` of cell `(x, y, z)` under `salt`.
#[inline]
pub fn cell_hash(x: u32, y: u32, z: u32, c: u32, salt: u32) -> u32 {
    hash(x.wrapping_add(hash(y.wrapping_add(hash(z.wrapping_add(hash(c.wrapping_add(salt))))))))
}

/// WGSL twin of [`cell_hash`].
pub const CELL_HASH_WGSL: &str = r#"
fn cell_hash(x: u32, y: u32, z: u32, c: u32) -> u32 {
    return hash(x + hash(y + hash(z + hash(c + params.seed))));
}
"#;

/// Validate a WGSL module with naga, returning a printable error.
pub fn validate_wgsl(source: &str) -> Result<(), String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map(|_| ())
        .map_err(|e| format!("{:?}", e))
}
