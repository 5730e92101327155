use crate::{FrinkyError, Result, FRINKIAC_RAMP};
use image::{imageops::FilterType, DynamicImage, Rgb};
use log::debug;
use std::fmt;

/// Width correction factor: terminal cells are roughly 7 units tall for every 4 wide
pub const WIDTH_CORRECTION: f64 = 4.0 / 7.0;

/// A rendered frame: a grid of glyphs, stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFrame {
    /// Glyph for each position
    pub characters: Vec<char>,
    /// Frame width in characters
    pub width: u32,
    /// Frame height in characters
    pub height: u32,
}

impl AsciiFrame {
    /// Iterate over the rows of the frame as strings
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.characters
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().collect())
    }

    /// The whole frame as a newline-separated text block
    pub fn to_text(&self) -> String {
        self.rows().collect::<Vec<_>>().join("\n")
    }
}

impl fmt::Display for AsciiFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// ASCII conversion configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionConfig {
    /// Output width in characters
    pub width: u32,
    /// Contrast exponent (1.0 = linear, > 1.0 darkens midtones)
    pub contrast: f64,
    /// Character ramp, lightest to darkest
    pub ascii_chars: Vec<char>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            width: 100,
            contrast: 2.0,
            ascii_chars: FRINKIAC_RAMP.to_vec(),
        }
    }
}

impl ConversionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(FrinkyError::InvalidConfig(
                "Render width must be greater than 0".to_string(),
            ));
        }
        if !self.contrast.is_finite() || self.contrast <= 0.0 {
            return Err(FrinkyError::InvalidConfig(format!(
                "Contrast must be a positive number, got {}",
                self.contrast
            )));
        }
        if self.ascii_chars.is_empty() {
            return Err(FrinkyError::InvalidConfig(
                "Character ramp must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Image to ASCII converter
#[derive(Debug, Clone)]
pub struct FrameConverter {
    config: ConversionConfig,
}

impl FrameConverter {
    /// Create a new converter, rejecting unusable configurations
    pub fn new(config: ConversionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert a decoded image to its ASCII representation
    pub fn convert_image(&self, image: &DynamicImage) -> Result<AsciiFrame> {
        let (src_width, src_height) = (image.width(), image.height());
        if src_width == 0 || src_height == 0 {
            return Err(FrinkyError::UnsupportedFormat(format!(
                "cannot render an empty {}x{} image",
                src_width, src_height
            )));
        }

        let (target_width, target_height) = self.target_dimensions(src_width, src_height);
        debug!(
            "Converting image {}x{} to {}x{} characters",
            src_width, src_height, target_width, target_height
        );

        let resized = image
            .resize_exact(target_width, target_height, FilterType::Triangle)
            .to_rgb8();
        let sums: Vec<u32> = resized.pixels().map(luminance).collect();

        let characters = self
            .quantize(&sums)
            .into_iter()
            .map(|bucket| self.config.ascii_chars[bucket])
            .collect();

        Ok(AsciiFrame {
            characters,
            width: target_width,
            height: target_height,
        })
    }

    /// Output size in characters: fixed width, height scaled by the source
    /// aspect ratio and the width correction factor
    pub fn target_dimensions(&self, src_width: u32, src_height: u32) -> (u32, u32) {
        let width = self.config.width;
        let height = (src_height as f64 * WIDTH_CORRECTION * width as f64 / src_width as f64)
            .round() as u32;
        (width, height.max(1))
    }

    /// Map luminance sums to ramp indices.
    ///
    /// Sums are shifted so the darkest pixel is 0, scaled by the brightest,
    /// raised to the contrast exponent and floored into a bucket. A uniform
    /// image has nothing to scale by and lands entirely in bucket 0.
    pub fn quantize(&self, sums: &[u32]) -> Vec<usize> {
        let max_bucket = self.config.ascii_chars.len() - 1;
        let min = sums.iter().copied().min().unwrap_or(0);
        let range = sums.iter().copied().max().unwrap_or(0) - min;

        if range == 0 {
            debug!("Uniform image, rendering as bucket 0");
            return vec![0; sums.len()];
        }

        sums.iter()
            .map(|&sum| {
                let normalized = (sum - min) as f64 / range as f64;
                let bucket = (normalized.powf(self.config.contrast) * max_bucket as f64).floor();
                (bucket.max(0.0) as usize).min(max_bucket)
            })
            .collect()
    }
}

/// Luminance proxy: the plain sum of the channels
fn luminance(pixel: &Rgb<u8>) -> u32 {
    pixel.0.iter().map(|&c| c as u32).sum()
}

/// Render an image at the given width and contrast with the given ramp
pub fn render(
    image: &DynamicImage,
    width: u32,
    contrast: f64,
    ramp: &[char],
) -> Result<AsciiFrame> {
    let config = ConversionConfig {
        width,
        contrast,
        ascii_chars: ramp.to_vec(),
    };
    FrameConverter::new(config)?.convert_image(image)
}
