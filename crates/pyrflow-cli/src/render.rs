use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut,
};

use pyrflow_core::track::dense::FlowField;
use pyrflow_core::track::lk::TrackResult;
use pyrflow_core::track::seed::Corner;

const CORNER_COLOR: Rgb<u8> = Rgb([80, 220, 80]);
const LOST_COLOR: Rgb<u8> = Rgb([230, 80, 80]);
const NEEDLE_COLOR: Rgb<u8> = Rgb([240, 200, 60]);

pub fn grayscale_canvas(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let luma = gray.get_pixel(x, y)[0];
        Rgb([luma, luma, luma])
    })
}

pub fn draw_corners(canvas: &mut RgbImage, corners: &[Corner]) {
    for corner in corners {
        let center = (
            corner.position.x.round() as i32,
            corner.position.y.round() as i32,
        );
        draw_hollow_circle_mut(canvas, center, 3, CORNER_COLOR);
    }
}

pub fn draw_tracks(canvas: &mut RgbImage, seeds: &[Corner], results: &[TrackResult]) {
    for (seed, result) in seeds.iter().zip(results) {
        if result.found() {
            draw_line_segment_mut(
                canvas,
                (seed.position.x, seed.position.y),
                (result.point.x, result.point.y),
                CORNER_COLOR,
            );
            let tip = (result.point.x.round() as i32, result.point.y.round() as i32);
            draw_filled_circle_mut(canvas, tip, 2, CORNER_COLOR);
        } else {
            let center = (
                seed.position.x.round() as i32,
                seed.position.y.round() as i32,
            );
            draw_hollow_circle_mut(canvas, center, 3, LOST_COLOR);
        }
    }
}

pub fn draw_needles(canvas: &mut RgbImage, flow: &FlowField, step: u32, scale: f32) {
    let step = step.max(1);
    for y in (step / 2..flow.height()).step_by(step as usize) {
        for x in (step / 2..flow.width()).step_by(step as usize) {
            let d = flow.at(x, y);
            let base = (x as f32, y as f32);
            let tip = (x as f32 + d.x * scale, y as f32 + d.y * scale);
            draw_line_segment_mut(canvas, base, tip, NEEDLE_COLOR);
            draw_filled_circle_mut(canvas, (x as i32, y as i32), 1, NEEDLE_COLOR);
        }
    }
}
