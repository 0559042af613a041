//! Building the parallel image/label/scene index from a manifest.

use crate::manifest::{load_validated, ManifestSource};
use crate::types::DatasetResult;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Three parallel arrays of equal length; position `i` is one sample in all of them.
///
/// The fields are read-only from outside the crate so the correspondence can
/// only be changed through [`DatasetIndex::project`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetIndex {
    image_paths: Vec<PathBuf>,
    label_paths: Vec<PathBuf>,
    scenes: Vec<String>,
    scene_types: Vec<String>,
}

/// Borrowed view of one indexed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry<'a> {
    pub image_path: &'a Path,
    pub label_path: &'a Path,
    pub scene: &'a str,
}

impl DatasetIndex {
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    pub fn image_paths(&self) -> &[PathBuf] {
        &self.image_paths
    }

    pub fn label_paths(&self) -> &[PathBuf] {
        &self.label_paths
    }

    pub fn scenes(&self) -> &[String] {
        &self.scenes
    }

    /// Sorted distinct scene identifiers of the manifest this index was built from.
    pub fn scene_types(&self) -> &[String] {
        &self.scene_types
    }

    pub fn entry(&self, i: usize) -> Option<IndexEntry<'_>> {
        Some(IndexEntry {
            image_path: self.image_paths.get(i)?,
            label_path: self.label_paths.get(i)?,
            scene: self.scenes.get(i)?,
        })
    }

    /// Number of entries per scene currently in the index.
    pub fn count_by_scene(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for scene in &self.scenes {
            *counts.entry(scene.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Build a new index holding `positions` of this one, in the given order.
    /// All three arrays go through the same position list.
    pub(crate) fn project(&self, positions: &[usize]) -> DatasetIndex {
        DatasetIndex {
            image_paths: positions.iter().map(|&p| self.image_paths[p].clone()).collect(),
            label_paths: positions.iter().map(|&p| self.label_paths[p].clone()).collect(),
            scenes: positions.iter().map(|&p| self.scenes[p].clone()).collect(),
            scene_types: self.scene_types.clone(),
        }
    }
}

/// Load the manifest and prefix every image and label path with `root`.
pub fn build_index(root: &Path, source: &dyn ManifestSource) -> DatasetResult<DatasetIndex> {
    let manifest = load_validated(source)?;
    let scene_types = manifest.scene_types();
    let index = DatasetIndex {
        image_paths: manifest.image_paths.iter().map(|p| root.join(p)).collect(),
        label_paths: manifest.label_paths.iter().map(|p| root.join(p)).collect(),
        scenes: manifest.scenes,
        scene_types,
    };
    tracing::info!(
        source = %source.describe(),
        samples = index.len(),
        scenes = index.scene_types.len(),
        "indexed manifest"
    );
    Ok(index)
}

/// Sorted distinct scene identifiers, without building an index.
pub fn list_scene_types(source: &dyn ManifestSource) -> DatasetResult<Vec<String>> {
    Ok(load_validated(source)?.scene_types())
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_contracts::SceneManifest;

    fn manifest() -> SceneManifest {
        SceneManifest::new(
            vec!["b/img_0.npy".into(), "a/img_0.npy".into(), "b/img_1.npy".into()],
            vec!["b/lbl_0.npy".into(), "a/lbl_0.npy".into(), "b/lbl_1.npy".into()],
            vec!["b".into(), "a".into(), "b".into()],
        )
    }

    #[test]
    fn joins_paths_onto_root() {
        let index = build_index(Path::new("/data/hypersim/"), &manifest()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.image_paths()[0],
            PathBuf::from("/data/hypersim/b/img_0.npy")
        );
        assert_eq!(
            index.label_paths()[1],
            PathBuf::from("/data/hypersim/a/lbl_0.npy")
        );
        assert_eq!(index.scenes(), ["b", "a", "b"]);
    }

    #[test]
    fn scene_types_are_sorted_and_distinct() {
        let index = build_index(Path::new("root"), &manifest()).unwrap();
        assert_eq!(index.scene_types(), ["a", "b"]);
        assert_eq!(list_scene_types(&manifest()).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn project_keeps_arrays_aligned() {
        let index = build_index(Path::new("r"), &manifest()).unwrap();
        let projected = index.project(&[2, 2, 1]);
        assert_eq!(projected.len(), 3);
        assert_eq!(projected.scenes(), ["b", "b", "a"]);
        let entry = projected.entry(2).unwrap();
        assert_eq!(entry.image_path, Path::new("r/a/img_0.npy"));
        assert_eq!(entry.label_path, Path::new("r/a/lbl_0.npy"));
        assert!(projected.entry(3).is_none());
    }

    #[test]
    fn counts_entries_per_scene() {
        let index = build_index(Path::new("r"), &manifest()).unwrap();
        let counts = index.count_by_scene();
        assert_eq!(counts.get("a"), Some(&1));
        assert_eq!(counts.get("b"), Some(&2));
    }
}
