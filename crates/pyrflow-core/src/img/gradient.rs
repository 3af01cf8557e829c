use image::ImageBuffer;

use super::sample::FloatImage;

const SMOOTH: [f32; 3] = [3.0 / 16.0, 10.0 / 16.0, 3.0 / 16.0];

/// Scharr-style derivative pair, separable as a `[3 10 3]/16` smoothing
/// against a `[-1 0 1]/2` central difference. Normalized so a linear ramp
/// produces a gradient of exactly 1 per pixel, which keeps the tracker's
/// eigenvalue threshold meaningful across inputs. Borders clamp.
pub fn scharr(plane: &FloatImage) -> (FloatImage, FloatImage) {
    let (width, height) = plane.dimensions();
    let w = width as usize;
    let h = height as usize;
    let src = plane.as_raw();

    // Horizontal pass: central difference and smoothing along x.
    let mut diff_x = vec![0.0f32; w * h];
    let mut smooth_x = vec![0.0f32; w * h];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let left = src[row + x.saturating_sub(1)];
            let center = src[row + x];
            let right = src[row + (x + 1).min(w - 1)];
            diff_x[row + x] = 0.5 * (right - left);
            smooth_x[row + x] = SMOOTH[0] * left + SMOOTH[1] * center + SMOOTH[2] * right;
        }
    }

    // Vertical pass: smooth the x differences, differentiate the x smooths.
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];
    for y in 0..h {
        let up = y.saturating_sub(1) * w;
        let mid = y * w;
        let down = (y + 1).min(h - 1) * w;
        for x in 0..w {
            gx[mid + x] =
                SMOOTH[0] * diff_x[up + x] + SMOOTH[1] * diff_x[mid + x] + SMOOTH[2] * diff_x[down + x];
            gy[mid + x] = 0.5 * (smooth_x[down + x] - smooth_x[up + x]);
        }
    }

    let gx = ImageBuffer::from_raw(width, height, gx).expect("gradient plane matches dimensions");
    let gy = ImageBuffer::from_raw(width, height, gy).expect("gradient plane matches dimensions");
    (gx, gy)
}
