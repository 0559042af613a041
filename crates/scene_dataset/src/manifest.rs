//! Manifest loading capabilities handed to the index builder.

use crate::types::{DatasetResult, SceneDatasetError};
use data_contracts::SceneManifest;
use std::fs;
use std::path::{Path, PathBuf};

pub const IMAGE_PATHS_FILE: &str = "image_pths.json";
pub const LABEL_PATHS_FILE: &str = "label_pths.json";
pub const SCENES_FILE: &str = "scenes.json";

/// Anything that can produce the three parallel manifest arrays.
pub trait ManifestSource: Send + Sync {
    fn load(&self) -> DatasetResult<SceneManifest>;

    /// Human-readable origin, used in errors and logs.
    fn describe(&self) -> String;
}

impl ManifestSource for SceneManifest {
    fn load(&self) -> DatasetResult<SceneManifest> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory manifest ({} entries)", self.len())
    }
}

/// A single JSON document with `image_paths`, `label_paths` and `scenes` arrays.
#[derive(Debug, Clone)]
pub struct JsonManifest {
    pub path: PathBuf,
}

impl JsonManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ManifestSource for JsonManifest {
    fn load(&self) -> DatasetResult<SceneManifest> {
        read_json(&self.path, &self.describe())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A directory holding the three arrays as separate JSON files
/// (`image_pths.json`, `label_pths.json`, `scenes.json`).
///
/// Manifests shipped as numpy string arrays (`cfg/*.npy`) must be converted
/// to these JSON files first, e.g. `json.dump(np.load(p).tolist(), f)`.
#[derive(Debug, Clone)]
pub struct ManifestDir {
    pub dir: PathBuf,
}

impl ManifestDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ManifestSource for ManifestDir {
    fn load(&self) -> DatasetResult<SceneManifest> {
        let desc = self.describe();
        let image_paths: Vec<String> = read_json(&self.dir.join(IMAGE_PATHS_FILE), &desc)?;
        let label_paths: Vec<String> = read_json(&self.dir.join(LABEL_PATHS_FILE), &desc)?;
        let scenes: Vec<String> = read_json(&self.dir.join(SCENES_FILE), &desc)?;
        Ok(SceneManifest::new(image_paths, label_paths, scenes))
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, desc: &str) -> DatasetResult<T> {
    let raw = fs::read(path).map_err(|e| SceneDatasetError::ManifestLoad {
        source_desc: desc.to_string(),
        msg: format!("{}: {e}", path.display()),
    })?;
    serde_json::from_slice(&raw).map_err(|e| SceneDatasetError::ManifestLoad {
        source_desc: desc.to_string(),
        msg: format!("{}: {e}", path.display()),
    })
}

/// Load a manifest and enforce its structural invariants.
pub(crate) fn load_validated(source: &dyn ManifestSource) -> DatasetResult<SceneManifest> {
    let manifest = source.load()?;
    manifest
        .validate()
        .map_err(|e| SceneDatasetError::ManifestLoad {
            source_desc: source.describe(),
            msg: e.to_string(),
        })?;
    Ok(manifest)
}
