//! The scene dataset: index construction and per-sample assembly.

use crate::aug::{Augment, Augmentation};
use crate::config::DatasetConfig;
use crate::container::{AutoReader, ContainerReader};
use crate::filter::filter_scenes;
use crate::index::{build_index, DatasetIndex};
use crate::manifest::ManifestSource;
use crate::splits::partition;
use crate::transform::OutputTransform;
use crate::types::{DatasetResult, Mode, SceneDatasetError, SceneSample};
use ndarray::{Array3, ArrayD, Axis, Ix2, Ix3};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Indexed image/label pairs of one split, immutable once built.
///
/// `get` only reads shared state, so workers may call it concurrently.
pub struct SceneDataset {
    index: DatasetIndex,
    mode: Mode,
    seed: Option<u64>,
    epoch: AtomicU64,
    augmenter: Box<dyn Augment>,
    output_transform: Option<Box<dyn OutputTransform>>,
    reader: Box<dyn ContainerReader>,
}

impl std::fmt::Debug for SceneDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneDataset")
            .field("mode", &self.mode)
            .field("len", &self.index.len())
            .field("seed", &self.seed)
            .field("epoch", &self.epoch())
            .field("output_transform", &self.output_transform.is_some())
            .finish_non_exhaustive()
    }
}

impl SceneDataset {
    /// Build with the default augmenter and reader and no output transform.
    pub fn new(cfg: &DatasetConfig, source: &dyn ManifestSource) -> DatasetResult<Self> {
        SceneDatasetBuilder::new(cfg.clone()).build(source)
    }

    pub fn builder(cfg: DatasetConfig) -> SceneDatasetBuilder {
        SceneDatasetBuilder::new(cfg)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    pub fn scene_types(&self) -> &[String] {
        self.index.scene_types()
    }

    /// Select the epoch mixed into seeded per-sample RNGs. Samples drawn
    /// under the same seed, epoch and index are identical.
    pub fn set_epoch(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::Relaxed);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Load, augment and normalize sample `i`.
    pub fn get(&self, i: usize) -> DatasetResult<SceneSample> {
        let entry = self
            .index
            .entry(i)
            .ok_or(SceneDatasetError::IndexOutOfRange {
                index: i,
                len: self.len(),
            })?;

        let image = load_image(self.reader.as_ref(), entry.image_path)?;
        let label = load_label(self.reader.as_ref(), entry.label_path)?;

        let only_crop = match self.mode {
            Mode::Train => false,
            Mode::Val | Mode::Test => true,
        };
        let mut rng = self.rng_for(i);
        let (image, label) = self.augmenter.apply(image, label, only_crop, &mut *rng)?;

        let raw_image = image.clone();
        let image = match &self.output_transform {
            Some(t) => t.apply(image),
            None => image,
        };

        let label = label
            .index_axis_move(Axis(0), 0)
            .mapv(|v| if v > 0.0 { (v - 1.0) as i64 } else { v as i64 });

        Ok(SceneSample {
            image,
            label,
            raw_image,
        })
    }

    /// Assemble several samples in parallel; results follow `indices` order
    /// and the first failure is returned.
    pub fn load_batch(&self, indices: &[usize]) -> DatasetResult<Vec<SceneSample>> {
        indices.par_iter().map(|&i| self.get(i)).collect()
    }

    fn rng_for(&self, i: usize) -> Box<dyn RngCore> {
        match self.seed {
            Some(seed) => {
                let epoch_mix = self.epoch().wrapping_mul(0x9E37_79B9_7F4A_7C15);
                Box::new(StdRng::seed_from_u64(seed ^ i as u64 ^ epoch_mix))
            }
            None => Box::new(rand::rng()),
        }
    }
}

pub struct SceneDatasetBuilder {
    cfg: DatasetConfig,
    augmenter: Option<Box<dyn Augment>>,
    output_transform: Option<Box<dyn OutputTransform>>,
    reader: Option<Box<dyn ContainerReader>>,
}

impl SceneDatasetBuilder {
    pub fn new(cfg: DatasetConfig) -> Self {
        Self {
            cfg,
            augmenter: None,
            output_transform: None,
            reader: None,
        }
    }

    pub fn augmenter(mut self, augmenter: impl Augment + 'static) -> Self {
        self.augmenter = Some(Box::new(augmenter));
        self
    }

    pub fn output_transform(mut self, transform: impl OutputTransform + 'static) -> Self {
        self.output_transform = Some(Box::new(transform));
        self
    }

    pub fn reader(mut self, reader: impl ContainerReader + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Index the manifest, keep the configured split, then apply the scene filter.
    ///
    /// Test mode serves the whole manifest; only train and val are partitioned.
    pub fn build(self, source: &dyn ManifestSource) -> DatasetResult<SceneDataset> {
        let cfg = self.cfg;
        let augmenter: Box<dyn Augment> = match self.augmenter {
            Some(a) => a,
            None => Box::new(Augmentation::new(cfg.augmentation.clone())?),
        };
        let reader: Box<dyn ContainerReader> = self
            .reader
            .unwrap_or_else(|| Box::new(AutoReader::with_key(cfg.container_key.clone())));

        let index = build_index(&cfg.root, source)?;
        let index = match cfg.mode {
            Mode::Train | Mode::Val => partition(&index, cfg.mode, cfg.val_ratio)?,
            Mode::Test => index,
        };
        let index = filter_scenes(&index, &cfg.scenes);
        tracing::info!(
            mode = %cfg.mode,
            samples = index.len(),
            root = %cfg.root.display(),
            "scene dataset ready"
        );

        Ok(SceneDataset {
            index,
            mode: cfg.mode,
            seed: cfg.seed,
            epoch: AtomicU64::new(0),
            augmenter,
            output_transform: self.output_transform,
            reader,
        })
    }
}

/// Read an HxWxC (or HxW) image, clip values above 1 and return it as CxHxW.
fn load_image(reader: &dyn ContainerReader, path: &Path) -> DatasetResult<Array3<f32>> {
    let mut raw = reader.read_array(path)?;
    if raw.ndim() == 2 {
        raw.insert_axis_inplace(Axis(2));
    }
    let mut hwc = into_3d(raw, path, "image")?;
    hwc.mapv_inplace(|v| if v > 1.0 { 1.0 } else { v });
    let chw = hwc.permuted_axes([2, 0, 1]);
    Ok(chw.as_standard_layout().into_owned())
}

/// Read an HxW (or HxWx1) label map and return it as 1xHxW.
fn load_label(reader: &dyn ContainerReader, path: &Path) -> DatasetResult<Array3<f32>> {
    let raw = reader.read_array(path)?;
    let hw = match raw.ndim() {
        2 => raw.into_dimensionality::<Ix2>().map_err(|e| SceneDatasetError::container(path, e))?,
        3 if raw.shape()[2] == 1 => into_3d(raw, path, "label")?.index_axis_move(Axis(2), 0),
        _ => {
            return Err(SceneDatasetError::container(
                path,
                format!("label must be HxW, got shape {:?}", raw.shape()),
            ))
        }
    };
    Ok(hw.insert_axis(Axis(0)))
}

fn into_3d(raw: ArrayD<f32>, path: &Path, what: &str) -> DatasetResult<Array3<f32>> {
    let shape = raw.shape().to_vec();
    raw.into_dimensionality::<Ix3>().map_err(|_| {
        SceneDatasetError::container(path, format!("{what} must be HxWxC, got shape {shape:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory container store keyed by path.
    #[derive(Default)]
    struct MemReader {
        arrays: Mutex<HashMap<PathBuf, ArrayD<f32>>>,
    }

    impl MemReader {
        fn insert(&self, path: &str, arr: ArrayD<f32>) {
            self.arrays.lock().unwrap().insert(PathBuf::from(path), arr);
        }
    }

    impl ContainerReader for MemReader {
        fn read_array(&self, path: &Path) -> DatasetResult<ArrayD<f32>> {
            self.arrays
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| SceneDatasetError::container(path, "not found"))
        }
    }

    #[test]
    fn image_is_clipped_and_channel_first() {
        let reader = MemReader::default();
        let hwc = ndarray::Array3::from_shape_fn((2, 3, 3), |(y, x, c)| {
            if (y, x, c) == (1, 2, 0) {
                1.5
            } else {
                0.1 * c as f32
            }
        });
        reader.insert("img.npy", hwc.into_dyn());
        let chw = load_image(&reader, Path::new("img.npy")).unwrap();
        assert_eq!(chw.dim(), (3, 2, 3));
        assert_eq!(chw[[0, 1, 2]], 1.0);
        assert_eq!(chw[[2, 0, 0]], 0.2);
        assert!(chw.iter().all(|&v| v <= 1.0));
    }

    #[test]
    fn grayscale_image_gets_one_channel() {
        let reader = MemReader::default();
        reader.insert("g.npy", Array2::<f32>::from_elem((4, 5), 0.5).into_dyn());
        assert_eq!(load_image(&reader, Path::new("g.npy")).unwrap().dim(), (1, 4, 5));
    }

    #[test]
    fn label_shapes() {
        let reader = MemReader::default();
        reader.insert("l2.npy", arr2(&[[0.0f32, 2.0], [3.0, 1.0]]).into_dyn());
        reader.insert(
            "l3.npy",
            ndarray::Array3::<f32>::zeros((2, 2, 1)).into_dyn(),
        );
        reader.insert(
            "bad.npy",
            ndarray::Array3::<f32>::zeros((2, 2, 3)).into_dyn(),
        );
        let l2 = load_label(&reader, Path::new("l2.npy")).unwrap();
        assert_eq!(l2.dim(), (1, 2, 2));
        assert_eq!(l2[[0, 1, 0]], 3.0);
        assert_eq!(load_label(&reader, Path::new("l3.npy")).unwrap().dim(), (1, 2, 2));
        assert!(load_label(&reader, Path::new("bad.npy")).is_err());
    }
}
