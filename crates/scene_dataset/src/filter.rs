//! Restricting an index to a caller-chosen subset of scenes.

use crate::index::DatasetIndex;

/// Keep entries whose image path contains one of `subset` as a substring.
///
/// Matches are accumulated per requested scene, in request order; a path
/// matching several requested strings appears once per match. An empty
/// subset leaves the index unchanged.
pub fn filter_scenes<S: AsRef<str>>(index: &DatasetIndex, subset: &[S]) -> DatasetIndex {
    if subset.is_empty() {
        return index.clone();
    }
    let paths: Vec<_> = index
        .image_paths()
        .iter()
        .map(|p| p.to_string_lossy())
        .collect();
    let mut positions = Vec::new();
    for scene in subset {
        let scene = scene.as_ref();
        positions.extend(
            paths
                .iter()
                .enumerate()
                .filter(|(_, p)| p.contains(scene))
                .map(|(i, _)| i),
        );
    }
    let filtered = index.project(&positions);
    tracing::info!(
        requested = subset.len(),
        kept = filtered.len(),
        total = index.len(),
        "filtered index by scene"
    );
    filtered
}
