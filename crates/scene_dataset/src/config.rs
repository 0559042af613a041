//! Dataset configuration: defaults, TOML file loading and env overrides.

use crate::aug::AugmentationConfig;
use crate::container::DEFAULT_CONTAINER_KEY;
use crate::manifest::{JsonManifest, ManifestDir, ManifestSource};
use crate::splits::DEFAULT_VAL_RATIO;
use crate::types::{DatasetResult, Mode, SceneDatasetError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "scene_dataset.toml";
pub const CONFIG_ENV: &str = "SCENE_DATASET_CONFIG";
pub const ROOT_ENV: &str = "SCENE_DATASET_ROOT";

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Directory every manifest path is joined onto.
    pub root: PathBuf,
    pub mode: Mode,
    /// Scene substrings to keep; empty keeps everything.
    pub scenes: Vec<String>,
    /// Manifest location: a `.json` document or a directory of three arrays.
    pub manifest: PathBuf,
    pub val_ratio: f64,
    /// Seed for reproducible per-sample augmentation. Each sample's draw is
    /// fixed per epoch; call `SceneDataset::set_epoch` to vary it across epochs.
    pub seed: Option<u64>,
    /// Array name inside keyed containers.
    pub container_key: String,
    pub augmentation: AugmentationConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("datasets/hypersim"),
            mode: Mode::Train,
            scenes: Vec::new(),
            manifest: PathBuf::from("cfg"),
            val_ratio: DEFAULT_VAL_RATIO,
            seed: None,
            container_key: DEFAULT_CONTAINER_KEY.to_string(),
            augmentation: AugmentationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DatasetConfigFile {
    root: Option<String>,
    mode: Option<String>,
    scenes: Option<Vec<String>>,
    manifest: Option<String>,
    val_ratio: Option<f64>,
    seed: Option<u64>,
    container_key: Option<String>,
    augmentation: Option<AugmentationSection>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AugmentationSection {
    output_size: Option<usize>,
    degrees: Option<f32>,
    flip_p: Option<f32>,
    jitter_bcsh: Option<[f32; 4]>,
}

impl DatasetConfig {
    /// Read the file named by `SCENE_DATASET_CONFIG` (or `scene_dataset.toml`);
    /// `SCENE_DATASET_ROOT` overrides the root.
    ///
    /// A missing file yields defaults. An unreadable or invalid one is an error.
    pub fn try_load() -> DatasetResult<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        let mut cfg = if path.exists() {
            Self::from_path(&path)?
        } else {
            Self::default()
        };
        cfg.apply_root_override();
        Ok(cfg)
    }

    /// Like [`DatasetConfig::try_load`], but an invalid file is logged and
    /// replaced by defaults.
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(|e| {
            tracing::warn!("scene_dataset config: {e}; using defaults");
            let mut cfg = Self::default();
            cfg.apply_root_override();
            cfg
        })
    }

    fn apply_root_override(&mut self) {
        if let Ok(root) = std::env::var(ROOT_ENV) {
            if !root.trim().is_empty() {
                self.root = expand_path(&root);
            }
        }
    }

    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let config_err = |msg: String| SceneDatasetError::Config {
            path: path.to_path_buf(),
            msg,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let file: DatasetConfigFile = toml::from_str(&raw).map_err(|e| config_err(e.to_string()))?;
        let cfg = Self::from_file(file)?;
        cfg.augmentation.validate().map_err(|e| match e {
            SceneDatasetError::InvalidArgument(msg) => config_err(msg),
            other => other,
        })?;
        Ok(cfg)
    }

    fn from_file(file: DatasetConfigFile) -> DatasetResult<Self> {
        let defaults = Self::default();
        let mode = match file.mode {
            Some(m) => m.parse::<Mode>()?,
            None => defaults.mode,
        };
        let aug = file.augmentation.unwrap_or_default();
        Ok(DatasetConfig {
            root: file
                .root
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.root),
            mode,
            scenes: file.scenes.unwrap_or_default(),
            manifest: file
                .manifest
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.manifest),
            val_ratio: file.val_ratio.unwrap_or(defaults.val_ratio),
            seed: file.seed,
            container_key: file
                .container_key
                .filter(|k| !k.trim().is_empty())
                .unwrap_or(defaults.container_key),
            augmentation: AugmentationConfig {
                output_size: aug.output_size.unwrap_or(defaults.augmentation.output_size),
                degrees: aug.degrees.unwrap_or(defaults.augmentation.degrees),
                flip_p: aug.flip_p.unwrap_or(defaults.augmentation.flip_p),
                jitter: aug.jitter_bcsh.unwrap_or(defaults.augmentation.jitter),
            },
        })
    }

    /// Manifest loader for the configured location.
    pub fn manifest_source(&self) -> Box<dyn ManifestSource> {
        if self.manifest.extension().and_then(|s| s.to_str()) == Some("json") {
            Box::new(JsonManifest::new(&self.manifest))
        } else {
            Box::new(ManifestDir::new(&self.manifest))
        }
    }
}

/// Expand a leading `~` and `${VAR}` references; unknown variables are kept verbatim.
fn expand_path(raw: &str) -> PathBuf {
    let home_expanded = match (raw.strip_prefix('~'), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}{rest}"),
        _ => raw.to_string(),
    };
    PathBuf::from(expand_env(&home_expanded))
}

fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&rest[start..start + 3 + end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
