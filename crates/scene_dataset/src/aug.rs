//! Synchronized geometric/photometric augmentation of an image and its label.
//!
//! Geometric parameters are drawn once per call and applied to both tensors;
//! the image is resampled bilinearly, the label with nearest neighbour so
//! class codes never blend. Photometric jitter touches the image only.

use crate::types::{DatasetResult, SceneDatasetError};
use ndarray::{s, Array3, Axis};
use rand::{Rng, RngCore};

/// Image/label augmentation collaborator used by the sample accessor.
///
/// `image` is CxHxW, `label` is 1xHxW. With `only_crop` set, only spatial
/// alignment to the output size is performed.
pub trait Augment: Send + Sync {
    fn apply(
        &self,
        image: Array3<f32>,
        label: Array3<f32>,
        only_crop: bool,
        rng: &mut dyn RngCore,
    ) -> DatasetResult<(Array3<f32>, Array3<f32>)>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AugmentationConfig {
    /// Side length of the square output crop.
    pub output_size: usize,
    /// Max absolute rotation in degrees.
    pub degrees: f32,
    /// Probability of a horizontal flip.
    pub flip_p: f32,
    /// Brightness, contrast, saturation and hue jitter ranges.
    pub jitter: [f32; 4],
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            output_size: 400,
            degrees: 10.0,
            flip_p: 0.5,
            jitter: [0.3, 0.3, 0.3, 0.05],
        }
    }
}

impl AugmentationConfig {
    pub fn validate(&self) -> DatasetResult<()> {
        let fail = |msg: String| Err(SceneDatasetError::InvalidArgument(msg));
        if self.output_size == 0 {
            return fail("output_size must be positive".to_string());
        }
        if !self.degrees.is_finite() || self.degrees < 0.0 {
            return fail(format!("degrees must be >= 0, got {}", self.degrees));
        }
        if !(0.0..=1.0).contains(&self.flip_p) {
            return fail(format!("flip_p must lie in [0, 1], got {}", self.flip_p));
        }
        if self.jitter.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return fail(format!("jitter ranges must be >= 0, got {:?}", self.jitter));
        }
        if self.jitter[3] > 0.5 {
            return fail(format!("hue jitter must be <= 0.5, got {}", self.jitter[3]));
        }
        Ok(())
    }
}

/// Default augmenter: rotation, random crop, horizontal flip and colour jitter
/// in full mode; centre crop otherwise.
#[derive(Debug, Clone)]
pub struct Augmentation {
    cfg: AugmentationConfig,
}

impl Augmentation {
    pub fn new(cfg: AugmentationConfig) -> DatasetResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.cfg
    }

    pub fn describe(&self) -> String {
        format!(
            "output_size={} degrees={:.1} flip_p={:.2} jitter_bcsh=[{:.2},{:.2},{:.2},{:.2}]",
            self.cfg.output_size,
            self.cfg.degrees,
            self.cfg.flip_p,
            self.cfg.jitter[0],
            self.cfg.jitter[1],
            self.cfg.jitter[2],
            self.cfg.jitter[3],
        )
    }
}

impl Augment for Augmentation {
    fn apply(
        &self,
        image: Array3<f32>,
        label: Array3<f32>,
        only_crop: bool,
        rng: &mut dyn RngCore,
    ) -> DatasetResult<(Array3<f32>, Array3<f32>)> {
        check_pair(&image, &label)?;
        let size = self.cfg.output_size;

        if only_crop {
            let image = pad_to(image, size);
            let label = pad_to(label, size);
            let (_, h, w) = image.dim();
            let (top, left) = ((h - size) / 2, (w - size) / 2);
            return Ok((crop(&image, top, left, size), crop(&label, top, left, size)));
        }

        let (mut image, mut label) = (image, label);
        if self.cfg.degrees > 0.0 {
            let angle = rng.random_range(-self.cfg.degrees..=self.cfg.degrees);
            image = rotate(&image, angle, Interpolation::Bilinear);
            label = rotate(&label, angle, Interpolation::Nearest);
        }

        let image = pad_to(image, size);
        let label = pad_to(label, size);
        let (_, h, w) = image.dim();
        let top = rng.random_range(0..=h - size);
        let left = rng.random_range(0..=w - size);
        let mut image = crop(&image, top, left, size);
        let mut label = crop(&label, top, left, size);

        if self.cfg.flip_p > 0.0 && rng.random::<f32>() < self.cfg.flip_p {
            image = hflip(&image);
            label = hflip(&label);
        }

        color_jitter(&mut image, self.cfg.jitter, rng);
        Ok((image, label))
    }
}

#[derive(Debug, Clone)]
pub struct AugmentationBuilder {
    inner: AugmentationConfig,
}

impl Default for AugmentationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AugmentationBuilder {
    pub fn new() -> Self {
        Self {
            inner: AugmentationConfig::default(),
        }
    }
    pub fn output_size(mut self, size: usize) -> Self {
        self.inner.output_size = size;
        self
    }
    pub fn degrees(mut self, degrees: f32) -> Self {
        self.inner.degrees = degrees;
        self
    }
    pub fn flip_p(mut self, p: f32) -> Self {
        self.inner.flip_p = p;
        self
    }
    pub fn jitter(mut self, bcsh: [f32; 4]) -> Self {
        self.inner.jitter = bcsh;
        self
    }
    pub fn build(self) -> DatasetResult<Augmentation> {
        Augmentation::new(self.inner)
    }
}

fn check_pair(image: &Array3<f32>, label: &Array3<f32>) -> DatasetResult<()> {
    let (_, ih, iw) = image.dim();
    let (lc, lh, lw) = label.dim();
    if lc != 1 {
        return Err(SceneDatasetError::ShapeMismatch(format!(
            "label must have one channel, got {lc}"
        )));
    }
    if (ih, iw) != (lh, lw) {
        return Err(SceneDatasetError::ShapeMismatch(format!(
            "image is {ih}x{iw} but label is {lh}x{lw}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Nearest,
    Bilinear,
}

/// Rotate every channel about the image centre; uncovered pixels become 0.
fn rotate(src: &Array3<f32>, angle_deg: f32, interp: Interpolation) -> Array3<f32> {
    let (c, h, w) = src.dim();
    let mut out = Array3::<f32>::zeros((c, h, w));
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cy = (h as f32 - 1.0) / 2.0;
    let cx = (w as f32 - 1.0) / 2.0;
    let inside = |y: isize, x: isize| y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w;

    for y in 0..h {
        for x in 0..w {
            let dy = y as f32 - cy;
            let dx = x as f32 - cx;
            let sx = cos * dx + sin * dy + cx;
            let sy = -sin * dx + cos * dy + cy;
            match interp {
                Interpolation::Nearest => {
                    let (iy, ix) = (sy.round() as isize, sx.round() as isize);
                    if inside(iy, ix) {
                        for ch in 0..c {
                            out[[ch, y, x]] = src[[ch, iy as usize, ix as usize]];
                        }
                    }
                }
                Interpolation::Bilinear => {
                    let (y0, x0) = (sy.floor(), sx.floor());
                    let (fy, fx) = (sy - y0, sx - x0);
                    let (y0, x0) = (y0 as isize, x0 as isize);
                    let taps = [
                        (y0, x0, (1.0 - fy) * (1.0 - fx)),
                        (y0, x0 + 1, (1.0 - fy) * fx),
                        (y0 + 1, x0, fy * (1.0 - fx)),
                        (y0 + 1, x0 + 1, fy * fx),
                    ];
                    for ch in 0..c {
                        let mut acc = 0.0;
                        for &(ty, tx, wgt) in &taps {
                            if wgt > 0.0 && inside(ty, tx) {
                                acc += wgt * src[[ch, ty as usize, tx as usize]];
                            }
                        }
                        out[[ch, y, x]] = acc;
                    }
                }
            }
        }
    }
    out
}

/// Zero-pad (centred) so both spatial sides are at least `size`.
fn pad_to(src: Array3<f32>, size: usize) -> Array3<f32> {
    let (c, h, w) = src.dim();
    if h >= size && w >= size {
        return src;
    }
    let (ph, pw) = (h.max(size), w.max(size));
    let (top, left) = ((ph - h) / 2, (pw - w) / 2);
    let mut out = Array3::<f32>::zeros((c, ph, pw));
    out.slice_mut(s![.., top..top + h, left..left + w]).assign(&src);
    out
}

fn crop(src: &Array3<f32>, top: usize, left: usize, size: usize) -> Array3<f32> {
    src.slice(s![.., top..top + size, left..left + size]).to_owned()
}

fn hflip(src: &Array3<f32>) -> Array3<f32> {
    src.slice(s![.., .., ..;-1]).to_owned()
}

/// Brightness, contrast, saturation and hue jitter, each factor drawn
/// uniformly and the result clamped to [0, 1]. Saturation and hue need RGB.
fn color_jitter(image: &mut Array3<f32>, bcsh: [f32; 4], rng: &mut dyn RngCore) {
    let [brightness, contrast, saturation, hue] = bcsh;
    let rgb = image.len_of(Axis(0)) == 3;

    if brightness > 0.0 {
        let f = rng.random_range((1.0 - brightness).max(0.0)..=1.0 + brightness);
        image.mapv_inplace(|v| (v * f).clamp(0.0, 1.0));
    }
    if contrast > 0.0 {
        let f = rng.random_range((1.0 - contrast).max(0.0)..=1.0 + contrast);
        let mean = if rgb {
            grayscale(image).mean().unwrap_or(0.0)
        } else {
            image.mean().unwrap_or(0.0)
        };
        image.mapv_inplace(|v| (mean + (v - mean) * f).clamp(0.0, 1.0));
    }
    if rgb && saturation > 0.0 {
        let f = rng.random_range((1.0 - saturation).max(0.0)..=1.0 + saturation);
        let gray = grayscale(image);
        for mut channel in image.axis_iter_mut(Axis(0)) {
            channel.zip_mut_with(&gray, |v, &g| *v = (g + (*v - g) * f).clamp(0.0, 1.0));
        }
    }
    if rgb && hue > 0.0 {
        let shift = rng.random_range(-hue..=hue);
        let (_, h, w) = image.dim();
        for y in 0..h {
            for x in 0..w {
                let (hh, ss, vv) =
                    rgb_to_hsv(image[[0, y, x]], image[[1, y, x]], image[[2, y, x]]);
                let (r, g, b) = hsv_to_rgb((hh + shift).rem_euclid(1.0), ss, vv);
                image[[0, y, x]] = r;
                image[[1, y, x]] = g;
                image[[2, y, x]] = b;
            }
        }
    }
}

fn grayscale(image: &Array3<f32>) -> ndarray::Array2<f32> {
    &image.index_axis(Axis(0), 0) * 0.299f32
        + &image.index_axis(Axis(0), 1) * 0.587f32
        + &image.index_axis(Axis(0), 2) * 0.114f32
}

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let hp = h * 6.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    (
        (r + m).clamp(0.0, 1.0),
        (g + m).clamp(0.0, 1.0),
        (b + m).clamp(0.0, 1.0),
    )
}
