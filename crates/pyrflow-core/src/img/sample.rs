use image::{ImageBuffer, Luma};

/// Single-channel f32 plane used for pyramid levels and gradient maps.
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Bilinear lookup at a subpixel position. Integer coordinates address
/// pixel centers, so `bilinear(img, 3.0, 7.0)` returns the stored value.
///
/// Coordinates are clamped to the plane, so callers that need exact
/// interpolation must keep `x` in `[0, width - 1]` and `y` in
/// `[0, height - 1]`.
pub fn bilinear(img: &FloatImage, x: f32, y: f32) -> f32 {
    let (width, height) = img.dimensions();
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let tx = x - x0 as f32;
    let ty = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0)[0];
    let p10 = img.get_pixel(x1, y0)[0];
    let p01 = img.get_pixel(x0, y1)[0];
    let p11 = img.get_pixel(x1, y1)[0];

    let top = p00 + (p10 - p00) * tx;
    let bottom = p01 + (p11 - p01) * tx;
    top + (bottom - top) * ty
}
