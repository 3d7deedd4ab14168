//! Raster preprocessing: decode, letterbox, grayscale, threshold

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use tracing::debug;

use super::error::Result;

/// Binary silhouette on a square canvas; foreground pixels are 255
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pixels: GrayImage,
}

impl RasterImage {
    pub fn from_gray(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn foreground_count(&self) -> usize {
        self.pixels.as_raw().iter().filter(|&&p| p > 0).count()
    }
}

/// Normalizes arbitrary image bytes into a binary silhouette.
///
/// Dark design pixels become foreground; the letterbox fill and light
/// background become background.
#[derive(Debug, Clone)]
pub struct RasterPreprocessor {
    pub canvas_size: u32,
    pub fill_color: [u8; 3],
    pub threshold: u8,
}

impl Default for RasterPreprocessor {
    fn default() -> Self {
        Self {
            canvas_size: 512,
            fill_color: [255, 255, 255],
            threshold: 128,
        }
    }
}

impl RasterPreprocessor {
    pub fn process(&self, bytes: &[u8]) -> Result<RasterImage> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(self.process_image(&decoded))
    }

    pub fn process_image(&self, image: &DynamicImage) -> RasterImage {
        let canvas = self.letterbox(image);
        let gray = DynamicImage::ImageRgba8(canvas).to_luma8();

        let mut binary = imageproc::contrast::threshold(&gray, self.threshold);
        imageops::invert(&mut binary);

        let raster = RasterImage::from_gray(binary);
        debug!(
            source_width = image.width(),
            source_height = image.height(),
            canvas = self.canvas_size,
            foreground = raster.foreground_count(),
            "Raster preprocessed"
        );
        raster
    }

    /// Fit the image inside the canvas, centered, padding with the fill color
    fn letterbox(&self, image: &DynamicImage) -> RgbaImage {
        let size = self.canvas_size.max(1);
        let [r, g, b] = self.fill_color;
        let mut canvas = RgbaImage::from_pixel(size, size, Rgba([r, g, b, 255]));

        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return canvas;
        }

        let scale = f64::min(size as f64 / width as f64, size as f64 / height as f64);
        let fit_width = ((width as f64 * scale).round() as u32).clamp(1, size);
        let fit_height = ((height as f64 * scale).round() as u32).clamp(1, size);

        let resized = imageops::resize(&image.to_rgba8(), fit_width, fit_height, FilterType::Triangle);
        let x = (size - fit_width) / 2;
        let y = (size - fit_height) / 2;
        imageops::overlay(&mut canvas, &resized, x as i64, y as i64);

        canvas
    }
}
