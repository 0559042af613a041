use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("parallel arrays differ in length: images={images} labels={labels} scenes={scenes}")]
    LengthMismatch {
        images: usize,
        labels: usize,
        scenes: usize,
    },
    #[error("empty {field} entry at position {position}")]
    EmptyEntry {
        field: &'static str,
        position: usize,
    },
}

/// Pre-generated listing of samples: three parallel arrays where position `i`
/// names the image container, label container and scene of one sample.
///
/// Paths are relative to the dataset root supplied at index-build time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneManifest {
    #[serde(alias = "image_pths")]
    pub image_paths: Vec<String>,
    #[serde(alias = "label_pths")]
    pub label_paths: Vec<String>,
    pub scenes: Vec<String>,
}

impl SceneManifest {
    pub fn new(image_paths: Vec<String>, label_paths: Vec<String>, scenes: Vec<String>) -> Self {
        Self {
            image_paths,
            label_paths,
            scenes,
        }
    }

    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    /// Checks the structural invariants: equal lengths and no blank entries.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let (images, labels, scenes) = (
            self.image_paths.len(),
            self.label_paths.len(),
            self.scenes.len(),
        );
        if images != labels || images != scenes {
            return Err(ManifestError::LengthMismatch {
                images,
                labels,
                scenes,
            });
        }
        let fields: [(&'static str, &[String]); 3] = [
            ("image path", &self.image_paths),
            ("label path", &self.label_paths),
            ("scene", &self.scenes),
        ];
        for (field, values) in fields {
            if let Some(position) = values.iter().position(|v| v.trim().is_empty()) {
                return Err(ManifestError::EmptyEntry { field, position });
            }
        }
        Ok(())
    }

    /// Sorted, de-duplicated scene identifiers.
    pub fn scene_types(&self) -> Vec<String> {
        self.scenes
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
