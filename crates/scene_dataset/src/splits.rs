//! Deterministic per-scene train/val partitioning.
//!
//! Each scene's entries are split positionally: the first
//! `floor((1 - ratio) * count)` go to train, the rest to val. This assumes the
//! manifest lists every scene's frames grouped and in capture order; an
//! unsorted manifest yields a split that is still deterministic but no longer
//! a clean temporal boundary.

use crate::index::DatasetIndex;
use crate::types::{DatasetResult, Mode, SceneDatasetError};
use std::collections::BTreeMap;

/// Fraction of each scene held out for validation.
pub const DEFAULT_VAL_RATIO: f64 = 0.2;

/// Number of leading entries of a `count`-sized scene that belong to train.
pub fn train_prefix_len(count: usize, ratio: f64) -> usize {
    ((1.0 - ratio) * count as f64) as usize
}

/// Keep only the `mode` portion of every scene.
///
/// Positions are gathered per scene against the unmodified input and turned
/// into one keep-mask, so removals in one scene never shift another's.
pub fn partition(index: &DatasetIndex, mode: Mode, ratio: f64) -> DatasetResult<DatasetIndex> {
    if !matches!(mode, Mode::Train | Mode::Val) {
        return Err(SceneDatasetError::InvalidMode(format!(
            "{mode} cannot be partitioned; expected train or val"
        )));
    }
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(SceneDatasetError::InvalidArgument(format!(
            "val ratio must lie in [0, 1], got {ratio}"
        )));
    }

    let mut by_scene: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (pos, scene) in index.scenes().iter().enumerate() {
        by_scene.entry(scene.as_str()).or_default().push(pos);
    }

    let mut keep = vec![false; index.len()];
    for (scene, positions) in &by_scene {
        let k = train_prefix_len(positions.len(), ratio);
        let kept = match mode {
            Mode::Train => &positions[..k],
            _ => &positions[k..],
        };
        for &pos in kept {
            keep[pos] = true;
        }
        tracing::debug!(
            scene = %scene,
            mode = %mode,
            kept = kept.len(),
            total = positions.len(),
            "partitioned scene"
        );
    }

    let survivors: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter_map(|(pos, &k)| k.then_some(pos))
        .collect();
    Ok(index.project(&survivors))
}
