//! Output transforms applied to the augmented image (never to the label).

use ndarray::{Array3, Axis};

/// A post-augmentation image transform.
pub trait OutputTransform: Send + Sync {
    fn apply(&self, image: Array3<f32>) -> Array3<f32>;
}

impl<F> OutputTransform for F
where
    F: Fn(Array3<f32>) -> Array3<f32> + Send + Sync,
{
    fn apply(&self, image: Array3<f32>) -> Array3<f32> {
        self(image)
    }
}

/// Per-channel standardization: `x' = (x - mean[c]) / std[c]`.
///
/// Channels beyond the configured statistics are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalize {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Self {
        Self { mean, std }
    }

    /// ImageNet RGB statistics.
    pub fn imagenet() -> Self {
        Self::new(vec![0.485, 0.456, 0.406], vec![0.229, 0.224, 0.225])
    }
}

impl OutputTransform for Normalize {
    fn apply(&self, mut image: Array3<f32>) -> Array3<f32> {
        for (ch, mut channel) in image.axis_iter_mut(Axis(0)).enumerate() {
            let (Some(&mean), Some(&std)) = (self.mean.get(ch), self.std.get(ch)) else {
                continue;
            };
            channel.mapv_inplace(|v| (v - mean) / std);
        }
        image
    }
}

/// Chain multiple transforms.
pub struct Compose {
    transforms: Vec<Box<dyn OutputTransform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn OutputTransform>>) -> Self {
        Self { transforms }
    }
}

impl OutputTransform for Compose {
    fn apply(&self, mut image: Array3<f32>) -> Array3<f32> {
        for t in &self.transforms {
            image = t.apply(image);
        }
        image
    }
}
