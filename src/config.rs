//! Run configuration (TOML) and camera presets (JSON) for the viewer.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_input_dir() -> PathBuf {
    PathBuf::from("../result/lm_aligned")
}

fn default_extension() -> String {
    "vtk".to_string()
}

fn default_pcs() -> usize {
    3
}

fn default_max_coef() -> f64 {
    3.0
}

fn default_morph_max() -> u32 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SsmConfig {
    /// Directory holding the corresponded meshes.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Number of principal components exposed to the sliders.
    #[serde(default = "default_pcs")]
    pub pcs: usize,
    /// Slider range in standard deviations.
    #[serde(default = "default_max_coef")]
    pub max_coef: f64,
    /// Resolution of the morph slider.
    #[serde(default = "default_morph_max")]
    pub morph_max: u32,
    #[serde(default)]
    pub cameras: Option<PathBuf>,
    /// Where to write the average mesh, if anywhere.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub reference_index: usize,
}

impl Default for SsmConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            extension: default_extension(),
            pcs: default_pcs(),
            max_coef: default_max_coef(),
            morph_max: default_morph_max(),
            cameras: None,
            output: None,
            reference_index: 0,
        }
    }
}

impl SsmConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SsmConfig = toml::from_str(text).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read configuration {:?}", path))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid configuration {:?}", path))
    }

    fn validate(&self) -> Result<()> {
        if self.extension.is_empty() {
            bail!("extension must not be empty");
        }
        if !(self.max_coef.is_finite() && self.max_coef > 0.0) {
            bail!("max_coef must be positive, got {}", self.max_coef);
        }
        if self.morph_max == 0 {
            bail!("morph_max must be at least 1");
        }
        Ok(())
    }

    /// Slider count for a model built from `sample_count` shapes with
    /// `mode_count` retained modes.
    pub fn effective_pcs(&self, sample_count: usize, mode_count: usize) -> usize {
        self.pcs
            .min(sample_count.saturating_sub(1))
            .min(mode_count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: [f64; 3],
    pub view_up: [f64; 3],
    pub focal_point: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPreset {
    pub name: String,
    pub camera: Camera,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPresets {
    pub presets: Vec<CameraPreset>,
}

impl CameraPresets {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let presets: CameraPresets =
            serde_json::from_str(text).context("Failed to parse camera presets")?;
        if presets.presets.is_empty() {
            bail!("camera preset list is empty");
        }
        Ok(presets)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read camera presets {:?}", path))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid camera presets {:?}", path))
    }

    pub fn get(&self, name: &str) -> Option<&Camera> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.camera)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SsmConfig::from_toml_str("").unwrap();
        assert_eq!(config, SsmConfig::default());
        assert_eq!(config.input_dir, PathBuf::from("../result/lm_aligned"));
        assert_eq!(config.pcs, 3);
    }

    #[test]
    fn test_partial_config() {
        let config = SsmConfig::from_toml_str(
            r#"
            input_dir = "data/aligned"
            pcs = 5
            output = "out/mean.vtk"
            "#,
        )
        .unwrap();
        assert_eq!(config.input_dir, PathBuf::from("data/aligned"));
        assert_eq!(config.pcs, 5);
        assert_eq!(config.output, Some(PathBuf::from("out/mean.vtk")));
        assert_eq!(config.extension, "vtk");
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(SsmConfig::from_toml_str("max_coef = -1.0").is_err());
        assert!(SsmConfig::from_toml_str("morph_max = 0").is_err());
        assert!(SsmConfig::from_toml_str("unknown = 1").is_err());
    }

    #[test]
    fn test_effective_pcs() {
        let config = SsmConfig::default();
        assert_eq!(config.effective_pcs(10, 9), 3);
        assert_eq!(config.effective_pcs(3, 2), 2);
        assert_eq!(config.effective_pcs(5, 1), 1);
        assert_eq!(config.effective_pcs(1, 0), 0);
    }

    #[test]
    fn test_camera_presets() {
        let json = r#"{"presets": [
            {"name": "front", "camera": {
                "position": [0.0, -200.0, 0.0],
                "view_up": [0.0, 0.0, 1.0],
                "focal_point": [0.0, 0.0, 0.0]}}
        ]}"#;
        let presets = CameraPresets::from_json_str(json).unwrap();
        assert_eq!(presets.get("front").unwrap().view_up, [0.0, 0.0, 1.0]);
        assert!(presets.get("side").is_none());

        assert!(CameraPresets::from_json_str(r#"{"presets": []}"#).is_err());
        assert!(CameraPresets::from_json_str(r#"{"presets": [{"name": "x"}]}"#).is_err());
    }
}
