//! Persisted preset record.
//!
//! The engine produces and consumes [`PresetRecord`] values; reading and
//! writing files belongs to whatever embeds the engine.
//!
//! ```json
//! {
//!   "sim_mode": "3d",
//!   "seed": "abc",
//!   "kernel": [0.2, 0.42, ...],
//!   "activation": "exp(-pow(x - 1.0, 2.0) * 2.0) * 2.0 - 1.0",
//!   "symmetry": { "full": true },
//!   "shader": "viridis",
//!   "size": 64,
//!   "compute_delay": 0,
//!   "wrap": false,
//!   "blend": 0.5,
//!   "skip": false
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kernel::{Activation, Dimension};

/// Display-side settings the engine only stores.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplaySettings {
    /// Shader or colormap identifier.
    pub shader: String,
    /// Volume blend factor.
    pub blend: f32,
}

impl DisplaySettings {
    pub fn volume() -> Self {
        Self {
            shader: "viridis".to_string(),
            blend: 0.5,
        }
    }

    pub fn surface() -> Self {
        Self {
            shader: "grayscale".to_string(),
            blend: 1.0,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self::surface()
    }
}

/// Serialized simulation configuration.
///
/// The optional fields are written for 3-D simulations only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetRecord {
    pub sim_mode: Dimension,
    pub seed: String,
    pub kernel: Vec<f32>,
    pub activation: Activation,
    /// Symmetry name to enabled flag.
    #[serde(default)]
    pub symmetry: BTreeMap<String, bool>,
    #[serde(default)]
    pub shader: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_delay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::config::{Sim2DConfig, Sim3DConfig};
    use crate::sim::{Sim2D, Sim3D};

    #[test]
    fn test_2d_record_omits_volume_fields() {
        let mut sim = Sim2D::new(CpuBackend::new(), Sim2DConfig::new(8, 8)).unwrap();
        sim.reset(Some("flat")).unwrap();
        let json = serde_json::to_value(sim.to_preset()).unwrap();
        assert_eq!(json["sim_mode"], "2d");
        assert_eq!(json["seed"], "flat");
        assert_eq!(json["kernel"].as_array().unwrap().len(), 9);
        assert!(json.get("size").is_none());
        assert!(json.get("blend").is_none());
    }

    #[test]
    fn test_3d_record_json_roundtrip() {
        let mut sim = Sim3D::new(CpuBackend::new(), Sim3DConfig::new(4)).unwrap();
        sim.reset(Some("vol")).unwrap();
        let record = sim.to_preset();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"sim_mode\":\"3d\""));
        let parsed: PresetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.size, Some(4));
    }

    #[test]
    fn test_minimal_record_parses() {
        let json = r#"{
            "sim_mode": "2d",
            "seed": "s",
            "kernel": [0, 0, 0, 0, 1, 0, 0, 0, 0],
            "activation": "x"
        }"#;
        let record: PresetRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.activation.source(), "x");
        assert!(record.symmetry.is_empty());
        assert_eq!(record.compute_delay, None);
    }

    #[test]
    fn test_apply_ignores_other_dimension() {
        let mut flat = Sim2D::new(CpuBackend::new(), Sim2DConfig::new(4, 4)).unwrap();
        flat.reset(Some("a")).unwrap();
        let mut volume = Sim3D::new(CpuBackend::new(), Sim3DConfig::new(4)).unwrap();
        volume.reset(Some("b")).unwrap();

        let before = volume.kernel().clone();
        volume.apply_preset(&flat.to_preset()).unwrap();
        assert_eq!(volume.kernel(), &before);
        assert_eq!(volume.seed(), "b");
    }
}
