use image::ImageBuffer;
use log::{debug, trace};

use super::frame::Frame;
use super::gradient::scharr;
use super::sample::FloatImage;

/// Levels narrower or shorter than this cannot support the gradient
/// stencil, so pyramid construction stops before producing them.
pub const MIN_LEVEL_DIM: u32 = 2;

const KERNEL: [f32; 5] = [
    1.0 / 16.0,
    4.0 / 16.0,
    6.0 / 16.0,
    4.0 / 16.0,
    1.0 / 16.0,
];

/// One pyramid level with its image plane and fixed derivative planes.
///
/// Gradients are computed once at build time; the tracker samples them
/// for every iteration instead of re-deriving the plane.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub index: u32,
    /// Multiplier taking base-level coordinates into this level.
    pub scale: f32,
    pub image: FloatImage,
    pub grad_x: FloatImage,
    pub grad_y: FloatImage,
}

impl PyramidLevel {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn base_dimensions(&self) -> (u32, u32) {
        self.levels[0].dimensions()
    }
}

/// Builds a coarse-to-fine pyramid with `max_level + 1` levels.
///
/// Each level halves the previous one after a binomial smoothing pass;
/// odd dimensions round down. When a further level would fall below
/// [`MIN_LEVEL_DIM`] the pyramid is truncated instead of failing, so the
/// result may hold fewer levels than requested.
pub fn build_pyramid(frame: &Frame, max_level: u32) -> Pyramid {
    debug!(
        "Building pyramid with up to {} levels from {}x{} frame",
        max_level + 1,
        frame.width(),
        frame.height()
    );

    let mut levels = Vec::with_capacity(max_level as usize + 1);
    let (grad_x, grad_y) = scharr(frame.plane());
    levels.push(PyramidLevel {
        index: 0,
        scale: 1.0,
        image: frame.plane().clone(),
        grad_x,
        grad_y,
    });

    for index in 1..=max_level {
        let prev = &levels[levels.len() - 1].image;
        let next_width = prev.width() / 2;
        let next_height = prev.height() / 2;
        if next_width < MIN_LEVEL_DIM || next_height < MIN_LEVEL_DIM {
            debug!(
                "Pyramid truncated at {} levels, next would be {}x{}",
                levels.len(),
                next_width,
                next_height
            );
            break;
        }

        trace!("Processing level {index}");
        let image = smooth_decimate(prev, next_width, next_height);
        let (grad_x, grad_y) = scharr(&image);
        let scale = levels[levels.len() - 1].scale * 0.5;
        levels.push(PyramidLevel {
            index,
            scale,
            image,
            grad_x,
            grad_y,
        });
    }

    Pyramid { levels }
}

/// Smooths with the separable 5-tap binomial kernel and keeps every
/// second sample. Borders clamp.
fn smooth_decimate(src: &FloatImage, dst_width: u32, dst_height: u32) -> FloatImage {
    let (src_width, src_height) = src.dimensions();
    let w = src_width as usize;
    let h = src_height as usize;
    let data = src.as_raw();
    let dw = dst_width as usize;
    let dh = dst_height as usize;

    // Vertical taps evaluated only at even source rows.
    let mut columns = vec![0.0f32; w * dh];
    for dy in 0..dh {
        let sy = (dy * 2) as isize;
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in KERNEL.iter().enumerate() {
                let yy = (sy + k as isize - 2).clamp(0, h as isize - 1) as usize;
                acc += weight * data[yy * w + x];
            }
            columns[dy * w + x] = acc;
        }
    }

    // Horizontal taps evaluated only at even source columns.
    let mut out = vec![0.0f32; dw * dh];
    for dy in 0..dh {
        let row = dy * w;
        for dx in 0..dw {
            let sx = (dx * 2) as isize;
            let mut acc = 0.0;
            for (k, weight) in KERNEL.iter().enumerate() {
                let xx = (sx + k as isize - 2).clamp(0, w as isize - 1) as usize;
                acc += weight * columns[row + xx];
            }
            out[dy * dw + dx] = acc;
        }
    }

    ImageBuffer::from_raw(dst_width, dst_height, out).expect("level plane matches dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn level_count_and_dimensions_halve() {
        let frame = Frame::from_fn(64, 48, |x, y| (x + y) as f32).unwrap();
        let pyramid = build_pyramid(&frame, 2);
        assert_eq!(pyramid.num_levels(), 3);
        let dims: Vec<_> = pyramid.levels().iter().map(|l| l.dimensions()).collect();
        assert_eq!(dims, vec![(64, 48), (32, 24), (16, 12)]);
        let scales: Vec<_> = pyramid.levels().iter().map(|l| l.scale).collect();
        assert_eq!(scales, vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn odd_dimensions_round_down() {
        let frame = Frame::from_fn(21, 13, |_, _| 7.0).unwrap();
        let pyramid = build_pyramid(&frame, 1);
        assert_eq!(pyramid.levels()[1].dimensions(), (10, 6));
    }

    #[test]
    fn small_frame_truncates_instead_of_failing() {
        let frame = Frame::from_fn(10, 10, |x, _| x as f32).unwrap();
        let pyramid = build_pyramid(&frame, 5);
        // 10 -> 5 -> 2, one more halving would drop below the minimum.
        assert_eq!(pyramid.num_levels(), 3);
        assert_eq!(pyramid.levels()[2].dimensions(), (2, 2));
    }

    #[test]
    fn constant_frame_stays_constant_across_levels() {
        let frame = Frame::from_fn(32, 32, |_, _| 19.5).unwrap();
        let pyramid = build_pyramid(&frame, 3);
        for level in pyramid.levels() {
            for value in level.image.as_raw() {
                assert_relative_eq!(*value, 19.5, epsilon = 1e-4);
            }
            for value in level.grad_x.as_raw().iter().chain(level.grad_y.as_raw()) {
                assert_relative_eq!(*value, 0.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn zero_max_level_keeps_only_the_base() {
        let frame = Frame::from_fn(16, 16, |x, y| (x * y) as f32).unwrap();
        let pyramid = build_pyramid(&frame, 0);
        assert_eq!(pyramid.num_levels(), 1);
        assert_eq!(pyramid.base_dimensions(), (16, 16));
    }
}
