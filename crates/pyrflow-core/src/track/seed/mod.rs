mod nms;

use log::debug;
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::error::{FlowError, Result};
use crate::img::frame::Frame;
use crate::img::gradient::scharr;

#[derive(Debug, Clone, Copy)]
pub struct GfttConfig {
    /// Upper bound on returned corners.
    pub max_corners: usize,
    /// Fraction of the strongest response a candidate must reach, in (0, 1].
    pub quality_level: f32,
    /// Minimum Euclidean spacing between accepted corners, in pixels.
    pub min_distance: f32,
}

impl Default for GfttConfig {
    fn default() -> Self {
        Self {
            max_corners: 1000,
            quality_level: 0.01,
            min_distance: 1.0,
        }
    }
}

/// A corner candidate: position in pixel coordinates plus its
/// minimum-eigenvalue score.
#[derive(Debug, Clone)]
pub struct Corner {
    pub position: Vector2<f32>,
    pub score: f32,
}

/// Good-features-to-track selector.
///
/// Scores every interior pixel with the minimum eigenvalue of the 3x3
/// structure matrix, keeps local maxima above `quality_level` times the
/// best response, then greedily enforces `min_distance` in descending
/// score order. Ties resolve by row-major scan order, so identical
/// frames always yield identical corner lists.
#[derive(Debug, Clone)]
pub struct GfttDetector {
    config: GfttConfig,
}

impl GfttDetector {
    pub fn new(config: GfttConfig) -> Result<Self> {
        if config.max_corners == 0 {
            return Err(FlowError::InvalidArgument(
                "max corners must be at least 1".to_string(),
            ));
        }
        if !config.quality_level.is_finite()
            || config.quality_level <= 0.0
            || config.quality_level > 1.0
        {
            return Err(FlowError::InvalidArgument(format!(
                "quality level must lie in (0, 1], got {}",
                config.quality_level
            )));
        }
        if !config.min_distance.is_finite() || config.min_distance < 0.0 {
            return Err(FlowError::InvalidArgument(format!(
                "minimum distance must be finite and non-negative, got {}",
                config.min_distance
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &GfttConfig {
        &self.config
    }

    pub fn detect(&self, frame: &Frame) -> Vec<Corner> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        if width < 3 || height < 3 {
            return Vec::new();
        }

        let (grad_x, grad_y) = scharr(frame.plane());
        let gx = grad_x.as_raw();
        let gy = grad_y.as_raw();

        // Score plane; the one-pixel border stays at zero.
        let mut scores = vec![0.0f32; width * height];
        scores
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                if y == 0 || y == height - 1 {
                    return;
                }
                for (x, slot) in row.iter_mut().enumerate().take(width - 1).skip(1) {
                    *slot = min_eigen_score(gx, gy, width, x, y);
                }
            });

        let max_score = scores.iter().fold(0.0f32, |acc, &s| acc.max(s));
        if max_score <= 0.0 {
            debug!("Corner scan of {}x{} found no structure", width, height);
            return Vec::new();
        }
        let threshold = self.config.quality_level * max_score;

        // Local maxima above the threshold, gathered in scan order.
        let candidates: Vec<Corner> = (1..height - 1)
            .into_par_iter()
            .map(|y| {
                let mut row_corners = Vec::new();
                for x in 1..width - 1 {
                    let idx = y * width + x;
                    let score = scores[idx];
                    if score < threshold || !is_local_max(&scores, width, idx) {
                        continue;
                    }
                    row_corners.push(Corner {
                        position: Vector2::new(x as f32, y as f32),
                        score,
                    });
                }
                row_corners
            })
            .reduce(Vec::new, |mut a, mut b| {
                a.append(&mut b);
                a
            });

        // Stable sort keeps scan order among equal scores.
        let mut ordered = candidates;
        ordered.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let kept = nms::suppress(ordered, self.config.min_distance, self.config.max_corners);
        debug!(
            "Corner scan of {}x{} (quality {:.3}, spacing {:.1}px) kept {} of max {}",
            width,
            height,
            self.config.quality_level,
            self.config.min_distance,
            kept.len(),
            self.config.max_corners
        );
        kept
    }
}

fn min_eigen_score(gx: &[f32], gy: &[f32], width: usize, x: usize, y: usize) -> f32 {
    let mut ixx = 0.0f32;
    let mut ixy = 0.0f32;
    let mut iyy = 0.0f32;
    for wy in (y - 1)..=(y + 1) {
        let row = wy * width;
        for wx in (x - 1)..=(x + 1) {
            let gx_v = gx[row + wx];
            let gy_v = gy[row + wx];
            ixx += gx_v * gx_v;
            ixy += gx_v * gy_v;
            iyy += gy_v * gy_v;
        }
    }
    let trace = ixx + iyy;
    let det = ixx * iyy - ixy * ixy;
    let discriminant = (trace * trace - 4.0 * det).max(0.0);
    0.5 * (trace - discriminant.sqrt())
}

fn is_local_max(scores: &[f32], width: usize, idx: usize) -> bool {
    let score = scores[idx];
    let above = idx - width;
    let below = idx + width;
    score >= scores[above - 1]
        && score >= scores[above]
        && score >= scores[above + 1]
        && score >= scores[idx - 1]
        && score >= scores[idx + 1]
        && score >= scores[below - 1]
        && score >= scores[below]
        && score >= scores[below + 1]
}
