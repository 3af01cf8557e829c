use nalgebra::{Matrix2, Vector2};
use rayon::prelude::*;
use tracing::{debug, debug_span};

use crate::error::{FlowError, Result};
use crate::img::pyramid::{Pyramid, PyramidLevel};
use crate::img::sample::bilinear;

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Side length of the square tracking window, odd and at least 3.
    pub win_size: u32,
    /// Coarsest pyramid level to use; 0 disables the pyramid.
    pub max_level: u32,
    /// Iteration cap per level.
    pub iters: u32,
    /// Convergence threshold on the per-iteration update, in pixels.
    pub epsilon: f32,
    /// Minimum normalized eigenvalue of the window's gradient matrix.
    /// Windows below it are too flat to constrain the solve.
    pub min_eigenvalue: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            win_size: 21,
            max_level: 3,
            iters: 30,
            epsilon: 0.01,
            min_eigenvalue: 1e-4,
        }
    }
}

impl TrackerConfig {
    fn validate(&self) -> Result<()> {
        if self.win_size < 3 || self.win_size % 2 == 0 {
            return Err(FlowError::InvalidArgument(format!(
                "window size must be odd and at least 3, got {}",
                self.win_size
            )));
        }
        if self.iters == 0 {
            return Err(FlowError::InvalidArgument(
                "iteration cap must be at least 1".to_string(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(FlowError::InvalidArgument(format!(
                "epsilon must be a positive finite value, got {}",
                self.epsilon
            )));
        }
        if !self.min_eigenvalue.is_finite() || self.min_eigenvalue < 0.0 {
            return Err(FlowError::InvalidArgument(format!(
                "minimum eigenvalue must be finite and non-negative, got {}",
                self.min_eigenvalue
            )));
        }
        Ok(())
    }

    fn window_radius(&self) -> f32 {
        (self.win_size / 2) as f32
    }
}

/// Terminal state of one tracked point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// The finest-level update fell below epsilon.
    Converged,
    /// The iteration cap ran out; the estimate is still usable.
    Exhausted,
    /// Ill-conditioned window, window leaving the frame, or a seed too
    /// close to the border. The estimate stops at the last valid level.
    Lost,
}

impl TrackStatus {
    pub fn found(self) -> bool {
        matches!(self, TrackStatus::Converged | TrackStatus::Exhausted)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackResult {
    /// Estimated position in the current frame, base-level coordinates.
    pub point: Vector2<f32>,
    pub status: TrackStatus,
    /// Mean absolute intensity difference over the final window. Zero and
    /// not meaningful when the point was lost.
    pub residual: f32,
    /// Refinement iterations spent across all levels.
    pub iterations: u32,
}

impl TrackResult {
    pub fn found(&self) -> bool {
        self.status.found()
    }
}

enum LevelOutcome {
    Converged { iterations: u32, residual: f32 },
    Exhausted { iterations: u32, residual: f32 },
    /// The window does not fit at this level's resolution.
    Skipped,
    IllConditioned,
    OutOfBounds,
}

/// Per-thread sampling buffers reused across points.
#[derive(Default)]
pub(crate) struct PatchScratch {
    template: Vec<f32>,
    grad_x: Vec<f32>,
    grad_y: Vec<f32>,
}

impl PatchScratch {
    fn reset(&mut self, len: usize) {
        self.template.clear();
        self.template.resize(len, 0.0);
        self.grad_x.clear();
        self.grad_x.resize(len, 0.0);
        self.grad_y.clear();
        self.grad_y.resize(len, 0.0);
    }
}

/// Sparse pyramidal Lucas-Kanade tracker.
///
/// Every point runs the same coarse-to-fine loop: solve the 2x2 normal
/// equations over its window at the coarsest level, double the estimate
/// into the next finer level, repeat. Template gradients come from the
/// pyramid's fixed derivative planes, so the normal matrix is built once
/// per level and reused for every iteration.
pub struct LkTracker {
    config: TrackerConfig,
}

impl LkTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Tracks `seeds` from `prev` into `curr`. The result vector is
    /// positionally aligned with the seed slice.
    pub fn track(
        &self,
        prev: &Pyramid,
        curr: &Pyramid,
        seeds: &[Vector2<f32>],
    ) -> Result<Vec<TrackResult>> {
        self.track_inner(prev, curr, seeds, None)
    }

    /// Like [`LkTracker::track`], but starts each point at a caller
    /// supplied guess in base-level coordinates instead of its seed.
    pub fn track_with_guess(
        &self,
        prev: &Pyramid,
        curr: &Pyramid,
        seeds: &[Vector2<f32>],
        guesses: &[Vector2<f32>],
    ) -> Result<Vec<TrackResult>> {
        if guesses.len() != seeds.len() {
            return Err(FlowError::SeedGuessMismatch {
                seeds: seeds.len(),
                guesses: guesses.len(),
            });
        }
        self.track_inner(prev, curr, seeds, Some(guesses))
    }

    fn track_inner(
        &self,
        prev: &Pyramid,
        curr: &Pyramid,
        seeds: &[Vector2<f32>],
        guesses: Option<&[Vector2<f32>]>,
    ) -> Result<Vec<TrackResult>> {
        check_compatible(prev, curr)?;
        let _span = debug_span!("track_batch", seeds = seeds.len()).entered();

        let results: Vec<TrackResult> = seeds
            .par_iter()
            .enumerate()
            .map_init(PatchScratch::default, |scratch, (index, seed)| {
                let guess = guesses.map(|all| all[index]);
                self.track_point(prev, curr, *seed, guess, scratch)
            })
            .collect();

        let found = results.iter().filter(|r| r.found()).count();
        debug!("Tracked {} seeds, {} found", results.len(), found);
        Ok(results)
    }

    /// Runs the full coarse-to-fine loop for one seed.
    pub(crate) fn track_point(
        &self,
        prev: &Pyramid,
        curr: &Pyramid,
        seed: Vector2<f32>,
        guess: Option<Vector2<f32>>,
        scratch: &mut PatchScratch,
    ) -> TrackResult {
        let num_levels = prev.num_levels().min(curr.num_levels());
        let top = (self.config.max_level as usize).min(num_levels - 1);
        let top_scale = prev.levels()[top].scale;

        // Displacement expressed in the coordinates of the level being
        // refined; doubled on every descent.
        let mut flow = match guess {
            Some(target) => (target - seed) * top_scale,
            None => Vector2::zeros(),
        };
        let mut status = TrackStatus::Lost;
        let mut residual = 0.0f32;
        let mut iterations = 0u32;
        let mut exit_scale = top_scale;

        for index in (0..=top).rev() {
            let prev_level = &prev.levels()[index];
            let curr_level = &curr.levels()[index];
            let point = seed * prev_level.scale;
            exit_scale = prev_level.scale;
            let entry_flow = flow;

            match self.refine_level(prev_level, curr_level, point, &mut flow, scratch) {
                LevelOutcome::Converged {
                    iterations: spent,
                    residual: value,
                } => {
                    status = TrackStatus::Converged;
                    residual = value;
                    iterations += spent;
                }
                LevelOutcome::Exhausted {
                    iterations: spent,
                    residual: value,
                } => {
                    status = TrackStatus::Exhausted;
                    residual = value;
                    iterations += spent;
                }
                LevelOutcome::Skipped => {
                    // Too coarse for the window; resume on the next finer
                    // level. At the base level the seed sits too close to
                    // the border to be sampled at all.
                    if index == 0 {
                        status = TrackStatus::Lost;
                        residual = 0.0;
                    }
                }
                LevelOutcome::IllConditioned | LevelOutcome::OutOfBounds => {
                    flow = entry_flow;
                    status = TrackStatus::Lost;
                    residual = 0.0;
                    break;
                }
            }

            if index > 0 {
                flow *= 2.0;
            }
        }

        TrackResult {
            point: seed + flow / exit_scale,
            status,
            residual,
            iterations,
        }
    }

    fn refine_level(
        &self,
        prev_level: &PyramidLevel,
        curr_level: &PyramidLevel,
        point: Vector2<f32>,
        flow: &mut Vector2<f32>,
        scratch: &mut PatchScratch,
    ) -> LevelOutcome {
        let radius = self.config.window_radius();
        let (prev_width, prev_height) = prev_level.dimensions();
        if !window_fits(prev_width, prev_height, point, radius) {
            return LevelOutcome::Skipped;
        }

        let side = self.config.win_size as usize;
        let area = side * side;
        scratch.reset(area);

        // Template window: intensities, gradients, and the normal matrix,
        // all fixed for the rest of this level.
        let mut gxx = 0.0f32;
        let mut gxy = 0.0f32;
        let mut gyy = 0.0f32;
        let mut idx = 0;
        for wy in 0..side {
            let oy = wy as f32 - radius;
            for wx in 0..side {
                let ox = wx as f32 - radius;
                let sx = point.x + ox;
                let sy = point.y + oy;
                let gx = bilinear(&prev_level.grad_x, sx, sy);
                let gy = bilinear(&prev_level.grad_y, sx, sy);
                scratch.template[idx] = bilinear(&prev_level.image, sx, sy);
                scratch.grad_x[idx] = gx;
                scratch.grad_y[idx] = gy;
                gxx += gx * gx;
                gxy += gx * gy;
                gyy += gy * gy;
                idx += 1;
            }
        }

        let area_f = area as f32;
        let trace = gxx + gyy;
        let det = gxx * gyy - gxy * gxy;
        let min_eig = 0.5 * (trace - (trace * trace - 4.0 * det).max(0.0).sqrt()) / area_f;
        if min_eig < self.config.min_eigenvalue {
            return LevelOutcome::IllConditioned;
        }
        let normal = Matrix2::new(gxx, gxy, gxy, gyy);
        let inverse = match normal.try_inverse() {
            Some(inverse) => inverse,
            None => return LevelOutcome::IllConditioned,
        };

        let (curr_width, curr_height) = curr_level.dimensions();
        let convergence_threshold_sq = self.config.epsilon * self.config.epsilon;
        let mut residual = 0.0f32;

        for iteration in 1..=self.config.iters {
            let target = point + *flow;
            if !window_fits(curr_width, curr_height, target, radius) {
                return LevelOutcome::OutOfBounds;
            }

            // Mismatch against the template, projected onto its gradients.
            let mut bx = 0.0f32;
            let mut by = 0.0f32;
            let mut error_sum = 0.0f32;
            let mut idx = 0;
            for wy in 0..side {
                let oy = wy as f32 - radius;
                for wx in 0..side {
                    let ox = wx as f32 - radius;
                    let sample = bilinear(&curr_level.image, target.x + ox, target.y + oy);
                    let diff = scratch.template[idx] - sample;
                    bx += scratch.grad_x[idx] * diff;
                    by += scratch.grad_y[idx] * diff;
                    error_sum += diff.abs();
                    idx += 1;
                }
            }
            residual = error_sum / area_f;

            let delta = inverse * Vector2::new(bx, by);
            *flow += delta;

            if delta.norm_squared() < convergence_threshold_sq {
                return LevelOutcome::Converged {
                    iterations: iteration,
                    residual,
                };
            }
        }

        LevelOutcome::Exhausted {
            iterations: self.config.iters,
            residual,
        }
    }
}

pub(crate) fn check_compatible(prev: &Pyramid, curr: &Pyramid) -> Result<()> {
    let prev_dims = prev.base_dimensions();
    let curr_dims = curr.base_dimensions();
    if prev_dims != curr_dims {
        return Err(FlowError::PyramidMismatch {
            prev: prev_dims,
            curr: curr_dims,
        });
    }
    Ok(())
}

/// True when the window, plus one pixel of interpolation margin, sits
/// fully inside a `width` by `height` plane.
fn window_fits(width: u32, height: u32, center: Vector2<f32>, radius: f32) -> bool {
    let margin = radius + 1.0;
    center.x >= margin
        && center.y >= margin
        && center.x <= width as f32 - 1.0 - margin
        && center.y <= height as f32 - 1.0 - margin
}
