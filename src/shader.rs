//! WGSL program generation for the grid stages.
//!
//! Every program runs one invocation per `(x, y)` column and writes
//! `total_layers` depth slices starting at `params.z_offset`. The slice loop
//! is unrolled at generation time, so each distinct layer count is a distinct
//! program.

use crate::kernel::{Activation, Dimension};
use crate::shader_utils::{prelude_wgsl, CELL_HASH_WGSL, WORKGROUP_SIZE};

/// `main` calling `layer_fn(x, y, z)` once per written slice.
fn entry_point(layers: u32, layer_fn: &str) -> String {
    let mut code = format!(
        "\n@compute @workgroup_size({size}, {size}, 1)\nfn main(@builtin(global_invocation_id) gid: vec3<u32>) {{\n    if (gid.x >= params.width || gid.y >= params.height) {{\n        return;\n    }}\n",
        size = WORKGROUP_SIZE
    );
    for layer in 0..layers {
        code.push_str(&format!(
            "    {}(gid.x, gid.y, params.z_offset + {}u);\n",
            layer_fn, layer
        ));
    }
    code.push_str("}\n");
    code
}

/// Fill `layers` slices with `params.fill_value`.
pub fn clear_wgsl(layers: u32) -> String {
    let mut code = prelude_wgsl();
    code.push_str(
        r#"
fn clear_layer(x: u32, y: u32, z: u32) {
    for (var c = 0u; c < params.channels; c += 1u) {
        cells_out[cell_index(x, y, z, c)] = params.fill_value;
    }
}
"#,
    );
    code.push_str(&entry_point(layers, "clear_layer"));
    code
}

/// Seed `layers` slices from the salted coordinate hash.
///
/// A cell is seeded when it lies inside the centered `params.region` box on
/// every axis and its density draw falls under `params.density`. Seeded
/// cells get a hashed value in [0, 1) (`fill_mode` 0) or 1.0 (`fill_mode` 1).
pub fn randomize_wgsl(layers: u32) -> String {
    let mut code = prelude_wgsl();
    code.push_str(CELL_HASH_WGSL);
    code.push_str(
        r#"
fn in_region(i: u32, n: u32) -> bool {
    return abs(texel_center(i, n) - 0.5) <= params.region * 0.5;
}

fn randomize_layer(x: u32, y: u32, z: u32) {
    let inside = in_region(x, params.width) && in_region(y, params.height) && in_region(z, params.depth);
    for (var c = 0u; c < params.channels; c += 1u) {
        let h = cell_hash(x, y, z, c);
        var value = 0.0;
        if (inside && params.fill_mode != 2u && rand01(h ^ 0x9e3779b9u) < params.density) {
            if (params.fill_mode == 1u) {
                value = 1.0;
            } else {
                value = rand01(h);
            }
        }
        cells_out[cell_index(x, y, z, c)] = value;
    }
}
"#,
    );
    code.push_str(&entry_point(layers, "randomize_layer"));
    code
}

/// Convolve `layers` slices of `cells_in` with `weights`, then activate.
pub fn convolve_wgsl(dimension: Dimension, layers: u32, activation: &Activation) -> String {
    let (dz_range, weight_index) = match dimension {
        Dimension::Two => ("0", "(dy + 1) * 3 + (dx + 1)"),
        Dimension::Three => ("1", "(dz + 1) * 9 + (dy + 1) * 3 + (dx + 1)"),
    };

    let mut code = prelude_wgsl();
    code.push_str(&format!(
        r#"
fn activation(x: f32) -> f32 {{
    return {activation};
}}

fn sample(x: u32, y: u32, z: u32, dx: i32, dy: i32, dz: i32, c: u32) -> f32 {{
    let sx = resolve(i32(x) + dx, params.width, edge_wraps(0u));
    let sy = resolve(i32(y) + dy, params.height, edge_wraps(1u));
    let sz = resolve(i32(z) + dz, params.depth, edge_wraps(2u));
    return cells_in[cell_index(sx, sy, sz, c)];
}}

fn convolve(x: u32, y: u32, z: u32, c: u32) -> f32 {{
    var sum = 0.0;
    for (var dz = -{dz}; dz <= {dz}; dz += 1) {{
        for (var dy = -1; dy <= 1; dy += 1) {{
            for (var dx = -1; dx <= 1; dx += 1) {{
                sum += sample(x, y, z, dx, dy, dz, c) * weights[{index}];
            }}
        }}
    }}
    return clamp(activation(sum), 0.0, 1.0);
}}

fn convolve_layer(x: u32, y: u32, z: u32) {{
    for (var c = 0u; c < params.channels; c += 1u) {{
        cells_out[cell_index(x, y, z, c)] = convolve(x, y, z, c);
    }}
}}
"#,
        activation = activation.source(),
        dz = dz_range,
        index = weight_index,
    ));
    code.push_str(&entry_point(layers, "convolve_layer"));
    code
}

/// Copy `cells_in` to `cells_out`, painting `brush_value` inside the brush.
///
/// Distance is measured toroidally in cells between texel centers.
pub fn brush_wgsl() -> String {
    let mut code = prelude_wgsl();
    code.push_str(
        r#"
fn axis_distance(i: u32, n: u32, center: f32) -> f32 {
    let d = abs(texel_center(i, n) - center);
    return min(d, 1.0 - d) * f32(n);
}

fn brush_layer(x: u32, y: u32, z: u32) {
    let dx = axis_distance(x, params.width, params.brush_x);
    let dy = axis_distance(y, params.height, params.brush_y);
    let inside = sqrt(dx * dx + dy * dy) <= params.brush_radius;
    for (var c = 0u; c < params.channels; c += 1u) {
        let i = cell_index(x, y, z, c);
        if (inside) {
            cells_out[i] = params.brush_value;
        } else {
            cells_out[i] = cells_in[i];
        }
    }
}
"#,
    );
    code.push_str(&entry_point(1, "brush_layer"));
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader_utils::validate_wgsl;

    #[test]
    fn test_clear_validates() {
        for layers in [1, 3, 8] {
            validate_wgsl(&clear_wgsl(layers)).unwrap();
        }
    }

    #[test]
    fn test_randomize_validates() {
        for layers in [1, 8] {
            validate_wgsl(&randomize_wgsl(layers)).unwrap();
        }
    }

    #[test]
    fn test_brush_validates() {
        validate_wgsl(&brush_wgsl()).unwrap();
    }

    #[test]
    fn test_convolve_validates_for_every_preset() {
        for dim in [Dimension::Two, Dimension::Three] {
            for preset in crate::library::presets(dim) {
                let src = convolve_wgsl(dim, 4, &preset.activation);
                if let Err(e) = validate_wgsl(&src) {
                    panic!("{} failed to validate: {}", preset.name, e);
                }
            }
        }
    }

    #[test]
    fn test_layers_are_unrolled() {
        let src = convolve_wgsl(Dimension::Three, 3, &Activation::identity());
        assert!(src.contains("convolve_layer(gid.x, gid.y, params.z_offset + 0u);"));
        assert!(src.contains("convolve_layer(gid.x, gid.y, params.z_offset + 2u);"));
        assert!(!src.contains("params.z_offset + 3u"));
    }

    #[test]
    fn test_two_d_kernel_uses_nine_weights() {
        let src = convolve_wgsl(Dimension::Two, 1, &Activation::identity());
        assert!(src.contains("dz <= 0"));
        assert!(src.contains("weights[(dy + 1) * 3 + (dx + 1)]"));
    }

    #[test]
    fn test_malformed_activation_fails_validation() {
        let src = convolve_wgsl(Dimension::Two, 1, &Activation::new("x + ("));
        assert!(validate_wgsl(&src).is_err());
        let src = convolve_wgsl(Dimension::Two, 1, &Activation::new("nope(x)"));
        assert!(validate_wgsl(&src).is_err());
    }
}
