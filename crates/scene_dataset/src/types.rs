//! Core types, error definitions, and data structures for scene_dataset.

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, SceneDatasetError>;

#[derive(Debug, Error)]
pub enum SceneDatasetError {
    #[error("manifest load failed ({source_desc}): {msg}")]
    ManifestLoad { source_desc: String, msg: String },
    #[error("invalid dataset mode: {0}")]
    InvalidMode(String),
    #[error("container read failed at {path}: {msg}")]
    ContainerRead { path: PathBuf, msg: String },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("config error at {path}: {msg}")]
    Config { path: PathBuf, msg: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SceneDatasetError {
    pub(crate) fn container(path: impl Into<PathBuf>, msg: impl fmt::Display) -> Self {
        SceneDatasetError::ContainerRead {
            path: path.into(),
            msg: msg.to_string(),
        }
    }
}

/// Which portion of a scene a dataset serves, and how samples are augmented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Val,
    Test,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Val => "val",
            Mode::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = SceneDatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Mode::Train),
            "val" => Ok(Mode::Val),
            "test" => Ok(Mode::Test),
            other => Err(SceneDatasetError::InvalidMode(other.to_string())),
        }
    }
}

/// One assembled sample, built fresh on every access.
#[derive(Debug, Clone)]
pub struct SceneSample {
    /// Image in CHW layout after augmentation and the output transform.
    pub image: Array3<f32>,
    /// Zero-indexed class codes, HxW.
    pub label: Array2<i64>,
    /// Augmented image in CHW layout before the output transform.
    pub raw_image: Array3<f32>,
}
