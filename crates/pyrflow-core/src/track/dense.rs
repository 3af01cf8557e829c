use nalgebra::Vector2;
use rayon::prelude::*;
use tracing::debug;

use super::lk::{check_compatible, LkTracker, PatchScratch};
use crate::error::Result;
use crate::img::frame::Frame;
use crate::img::pyramid::{build_pyramid, Pyramid};

/// Per-pixel displacement field over the base pyramid level.
///
/// `u` and `v` are row-major planes of the x and y displacement. Pixels
/// the tracker lost keep the displacement of their last valid level;
/// pixels whose window never fit (the frame border) stay at zero.
#[derive(Debug, Clone)]
pub struct FlowField {
    width: u32,
    height: u32,
    u: Vec<f32>,
    v: Vec<f32>,
}

impl FlowField {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn u(&self) -> &[f32] {
        &self.u
    }

    pub fn v(&self) -> &[f32] {
        &self.v
    }

    /// Displacement at a pixel. Panics outside the field.
    pub fn at(&self, x: u32, y: u32) -> Vector2<f32> {
        assert!(x < self.width && y < self.height, "flow lookup out of bounds");
        let idx = y as usize * self.width as usize + x as usize;
        Vector2::new(self.u[idx], self.v[idx])
    }
}

impl LkTracker {
    /// Dense optical flow: every base-level pixel runs the same
    /// coarse-to-fine refinement the sparse path uses, sharing the
    /// pyramids' fixed gradient planes instead of rebuilding anything
    /// per pixel.
    pub fn dense(&self, prev: &Pyramid, curr: &Pyramid) -> Result<FlowField> {
        check_compatible(prev, curr)?;

        let (width, height) = prev.base_dimensions();
        debug!("Dense flow over {}x{} pixels", width, height);
        let w = width as usize;
        let h = height as usize;
        let mut u = vec![0.0f32; w * h];
        let mut v = vec![0.0f32; w * h];

        u.par_chunks_mut(w)
            .zip(v.par_chunks_mut(w))
            .enumerate()
            .for_each_init(PatchScratch::default, |scratch, (y, (u_row, v_row))| {
                for (x, (du, dv)) in u_row.iter_mut().zip(v_row.iter_mut()).enumerate() {
                    let seed = Vector2::new(x as f32, y as f32);
                    let result = self.track_point(prev, curr, seed, None, scratch);
                    *du = result.point.x - seed.x;
                    *dv = result.point.y - seed.y;
                }
            });

        Ok(FlowField {
            width,
            height,
            u,
            v,
        })
    }

    /// Builds both pyramids at the configured depth, then runs
    /// [`LkTracker::dense`].
    pub fn dense_from_frames(&self, prev: &Frame, curr: &Frame) -> Result<FlowField> {
        let prev_pyramid = build_pyramid(prev, self.config().max_level);
        let curr_pyramid = build_pyramid(curr, self.config().max_level);
        self.dense(&prev_pyramid, &curr_pyramid)
    }
}
