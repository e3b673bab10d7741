use crate::color;
use crate::error::{Error, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

/// Row-major grid of ink densities in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl DensityField {
    pub fn new(width: usize, height: usize, samples: Vec<f32>) -> Result<Self> {
        if samples.len() != width * height {
            return Err(Error::InvalidDensity(format!(
                "expected {} samples for {}x{}, got {}",
                width * height,
                width,
                height,
                samples.len()
            )));
        }

        if samples.iter().any(|s| !s.is_finite()) {
            return Err(Error::InvalidDensity("non-finite sample".into()));
        }

        let samples = samples.into_iter().map(|s| s.clamp(0.0, 1.0)).collect();

        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Field of constant density.
    pub fn filled(width: usize, height: usize, value: f32) -> Result<Self> {
        Self::new(width, height, vec![value; width * height])
    }

    /// Build a field from the sampled function `f(x, y)` evaluated at every grid cell.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Result<Self> {
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();

        Self::new(width, height, samples)
    }

    /// Dark pixels become dense, light pixels sparse. Alpha is ignored.
    pub fn from_image(img: &image::DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let samples = rgb
            .pixels()
            .map(|p| color::to_density(p[0], p[1], p[2]))
            .collect();

        Self {
            width: width as usize,
            height: height as usize,
            samples,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.samples[y * self.width..(y + 1) * self.width]
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.width + x]
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when there is no ink anywhere.
    pub fn is_blank(&self) -> bool {
        self.samples.iter().all(|&s| s <= 0.0)
    }

    /// Upscale by an integer factor so accumulation gets sub-pixel accuracy.
    pub fn supersample(&self, factor: usize) -> Result<Self> {
        if factor <= 1 || self.is_empty() {
            return Ok(self.clone());
        }

        let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(self.width as u32, self.height as u32, self.samples.clone())
                .ok_or_else(|| Error::InvalidDensity("sample buffer too small".into()))?;

        let width = self.width * factor;
        let height = self.height * factor;
        let scaled = imageops::resize(&buffer, width as u32, height as u32, FilterType::Triangle);

        Self::new(width, height, scaled.into_raw())
    }
}
