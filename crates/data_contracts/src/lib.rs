//! Shared data contracts for scene dataset manifests.

pub mod manifest;

pub use manifest::{ManifestError, SceneManifest};
