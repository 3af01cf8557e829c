use image::{GrayImage, Luma};

use super::sample::FloatImage;
use crate::error::{FlowError, Result};

// BT.601 luma weights, matching the usual camera-pipeline conversion.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// A single video frame reduced to an f32 intensity plane.
///
/// Color input collapses to luma at construction, so everything downstream
/// (pyramids, corner scores, tracking windows) deals with one channel.
#[derive(Debug, Clone)]
pub struct Frame {
    plane: FloatImage,
    source_channels: u8,
}

impl Frame {
    /// Wraps an 8-bit grayscale image, widening samples to f32.
    pub fn from_luma8(image: &GrayImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        check_dimensions(width, height)?;
        let plane = FloatImage::from_fn(width, height, |x, y| {
            Luma([image.get_pixel(x, y)[0] as f32])
        });
        Ok(Self {
            plane,
            source_channels: 1,
        })
    }

    /// Builds a frame from raw interleaved bytes.
    ///
    /// `channels` selects the layout: 1 for luma, 3 for RGB, 4 for BGRA
    /// (the layout camera capture stacks hand over).
    pub fn from_raw(width: u32, height: u32, channels: u8, data: &[u8]) -> Result<Self> {
        check_dimensions(width, height)?;
        let pixels = width as usize * height as usize;
        let expected = pixels * channels as usize;
        if data.len() != expected {
            return Err(FlowError::InvalidArgument(format!(
                "buffer holds {} bytes, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }

        let mut luma = Vec::with_capacity(pixels);
        match channels {
            1 => luma.extend(data.iter().map(|&v| v as f32)),
            3 => {
                for rgb in data.chunks_exact(3) {
                    luma.push(LUMA_R * rgb[0] as f32 + LUMA_G * rgb[1] as f32 + LUMA_B * rgb[2] as f32);
                }
            }
            4 => {
                for bgra in data.chunks_exact(4) {
                    luma.push(LUMA_B * bgra[0] as f32 + LUMA_G * bgra[1] as f32 + LUMA_R * bgra[2] as f32);
                }
            }
            other => {
                return Err(FlowError::InvalidArgument(format!(
                    "unsupported channel count {other}, expected 1, 3 or 4"
                )));
            }
        }

        let plane = FloatImage::from_raw(width, height, luma).expect("luma plane matches dimensions");
        Ok(Self {
            plane,
            source_channels: channels,
        })
    }

    /// Wraps an existing f32 plane.
    pub fn from_plane(plane: FloatImage) -> Result<Self> {
        let (width, height) = plane.dimensions();
        check_dimensions(width, height)?;
        Ok(Self {
            plane,
            source_channels: 1,
        })
    }

    /// Synthesizes a frame from a per-pixel intensity function.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> Result<Self> {
        check_dimensions(width, height)?;
        let plane = FloatImage::from_fn(width, height, |x, y| Luma([f(x, y)]));
        Ok(Self {
            plane,
            source_channels: 1,
        })
    }

    pub fn width(&self) -> u32 {
        self.plane.width()
    }

    pub fn height(&self) -> u32 {
        self.plane.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.plane.dimensions()
    }

    /// Channel count of the buffer the frame was built from.
    pub fn source_channels(&self) -> u8 {
        self.source_channels
    }

    pub fn plane(&self) -> &FloatImage {
        &self.plane
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(FlowError::InvalidArgument(format!(
            "frame dimensions must be non-zero, got {width}x{height}"
        )));
    }
    Ok(())
}
