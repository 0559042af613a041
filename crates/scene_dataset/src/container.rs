//! Reading the dense array stored in a per-sample container file.

use crate::types::{DatasetResult, SceneDatasetError};
use memmap2::MmapOptions;
use ndarray::{ArrayD, IxDyn};
use ndarray_npy::ReadNpyError;
use safetensors::{Dtype, SafeTensors};
use std::fs::File;
use std::path::Path;

/// Name of the array inside a keyed container.
pub const DEFAULT_CONTAINER_KEY: &str = "dataset";

/// Reads one dense numeric array from a container, as `f32`.
///
/// File handles must not outlive the call.
pub trait ContainerReader: Send + Sync {
    fn read_array(&self, path: &Path) -> DatasetResult<ArrayD<f32>>;
}

/// `.npy` files; `f32` and `f64` payloads are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpyReader;

impl ContainerReader for NpyReader {
    fn read_array(&self, path: &Path) -> DatasetResult<ArrayD<f32>> {
        match ndarray_npy::read_npy::<_, ArrayD<f32>>(path) {
            Ok(arr) => Ok(arr),
            Err(ReadNpyError::WrongDescriptor(_)) => {
                ndarray_npy::read_npy::<_, ArrayD<f64>>(path)
                    .map(|arr| arr.mapv(|v| v as f32))
                    .map_err(|e| SceneDatasetError::container(path, e))
            }
            Err(e) => Err(SceneDatasetError::container(path, e)),
        }
    }
}

/// `.safetensors` files holding the array under `key`.
#[derive(Debug, Clone)]
pub struct SafetensorsReader {
    pub key: String,
}

impl Default for SafetensorsReader {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER_KEY)
    }
}

impl SafetensorsReader {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ContainerReader for SafetensorsReader {
    fn read_array(&self, path: &Path) -> DatasetResult<ArrayD<f32>> {
        let file = File::open(path).map_err(|e| SceneDatasetError::container(path, e))?;
        // The map is dropped before returning; the file is not expected to change meanwhile.
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .map_err(|e| SceneDatasetError::container(path, e))?;
        let tensors =
            SafeTensors::deserialize(&mmap).map_err(|e| SceneDatasetError::container(path, e))?;
        let view = tensors.tensor(&self.key).map_err(|e| {
            SceneDatasetError::container(path, format!("array `{}`: {e}", self.key))
        })?;
        let data = view.data();
        let values: Vec<f32> = match view.dtype() {
            Dtype::F32 => data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::F64 => data
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
                .collect(),
            Dtype::I64 => data
                .chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
                .collect(),
            Dtype::U8 => data.iter().map(|&v| v as f32).collect(),
            other => {
                return Err(SceneDatasetError::container(
                    path,
                    format!("unsupported dtype {other:?}"),
                ))
            }
        };
        ArrayD::from_shape_vec(IxDyn(view.shape()), values)
            .map_err(|e| SceneDatasetError::container(path, e))
    }
}

/// HDF5 files holding the array as the dataset `key`; any float or integer
/// payload (including `f16`) is converted to `f32` by libhdf5.
#[cfg(feature = "hdf5")]
#[derive(Debug, Clone)]
pub struct Hdf5Reader {
    pub key: String,
}

#[cfg(feature = "hdf5")]
impl Default for Hdf5Reader {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER_KEY)
    }
}

#[cfg(feature = "hdf5")]
impl Hdf5Reader {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[cfg(feature = "hdf5")]
impl ContainerReader for Hdf5Reader {
    fn read_array(&self, path: &Path) -> DatasetResult<ArrayD<f32>> {
        let file = hdf5::File::open(path).map_err(|e| SceneDatasetError::container(path, e))?;
        let dataset = file.dataset(&self.key).map_err(|e| {
            SceneDatasetError::container(path, format!("dataset `{}`: {e}", self.key))
        })?;
        dataset
            .read_dyn::<f32>()
            .map_err(|e| SceneDatasetError::container(path, e))
    }
}

/// Picks a reader from the file extension.
#[derive(Debug, Clone, Default)]
pub struct AutoReader {
    pub npy: NpyReader,
    pub safetensors: SafetensorsReader,
    #[cfg(feature = "hdf5")]
    pub hdf5: Hdf5Reader,
}

impl AutoReader {
    /// Use `key` for every keyed format.
    pub fn with_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            npy: NpyReader,
            #[cfg(feature = "hdf5")]
            hdf5: Hdf5Reader::new(key.clone()),
            safetensors: SafetensorsReader::new(key),
        }
    }
}

impl ContainerReader for AutoReader {
    fn read_array(&self, path: &Path) -> DatasetResult<ArrayD<f32>> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("npy") => self.npy.read_array(path),
            Some("safetensors") | Some("st") => self.safetensors.read_array(path),
            #[cfg(feature = "hdf5")]
            Some("hdf5") | Some("h5") => self.hdf5.read_array(path),
            #[cfg(not(feature = "hdf5"))]
            Some(ext @ ("hdf5" | "h5")) => Err(SceneDatasetError::container(
                path,
                format!("`.{ext}` containers need the `hdf5` feature"),
            )),
            other => Err(SceneDatasetError::container(
                path,
                format!("unsupported container extension {other:?}"),
            )),
        }
    }
}
