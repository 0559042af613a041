//! Scene-partitioned image/label dataset for dense prediction training.
//!
//! This crate provides utilities for:
//! - Indexing image/label/scene triples from a pre-generated manifest
//! - Deterministic per-scene train/val partitioning
//! - Scene-subset filtering
//! - Reading per-sample array containers (`.npy`, `.safetensors`, and `.hdf5`
//!   with the `hdf5` feature)
//! - Synchronized image/label augmentation and output normalization

pub mod aug;
pub mod config;
pub mod container;
pub mod dataset;
pub mod filter;
pub mod index;
pub mod manifest;
pub mod splits;
pub mod transform;
pub mod types;

pub use aug::{Augment, Augmentation, AugmentationBuilder, AugmentationConfig};
pub use config::DatasetConfig;
pub use container::{AutoReader, ContainerReader, NpyReader, SafetensorsReader};
#[cfg(feature = "hdf5")]
pub use container::Hdf5Reader;
pub use dataset::{SceneDataset, SceneDatasetBuilder};
pub use filter::filter_scenes;
pub use index::{build_index, list_scene_types, DatasetIndex, IndexEntry};
pub use manifest::{JsonManifest, ManifestDir, ManifestSource};
pub use splits::{partition, train_prefix_len, DEFAULT_VAL_RATIO};
pub use transform::{Compose, Normalize, OutputTransform};
pub use types::*;

pub use data_contracts::SceneManifest;
