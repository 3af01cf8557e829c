use nalgebra::Vector2;

use super::lk::{LkTracker, TrackResult, TrackStatus};
use crate::error::Result;
use crate::img::pyramid::Pyramid;

/// Round-trip agreement between a forward track and its reverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTrip {
    /// Distance between the seed and where the backward track landed.
    pub error: f32,
    pub valid: bool,
}

impl RoundTrip {
    pub fn evaluate(seed: Vector2<f32>, returned: Vector2<f32>, max_error: f32) -> Self {
        let error = (returned - seed).norm();
        Self {
            error,
            valid: error <= max_error,
        }
    }
}

impl LkTracker {
    /// Tracks forward, then re-tracks every found point backward and
    /// demotes those that fail to land within `max_error` of their seed.
    ///
    /// Demoted results keep their forward estimate so callers can still
    /// inspect where the track drifted.
    pub fn track_round_trip(
        &self,
        prev: &Pyramid,
        curr: &Pyramid,
        seeds: &[Vector2<f32>],
        max_error: f32,
    ) -> Result<Vec<TrackResult>> {
        let mut forward = self.track(prev, curr, seeds)?;
        let landing: Vec<Vector2<f32>> = forward.iter().map(|r| r.point).collect();
        let backward = self.track(curr, prev, &landing)?;

        for ((result, seed), reverse) in forward.iter_mut().zip(seeds).zip(&backward) {
            if !result.found() {
                continue;
            }
            let round_trip = RoundTrip::evaluate(*seed, reverse.point, max_error);
            if !reverse.found() || !round_trip.valid {
                result.status = TrackStatus::Lost;
            }
        }
        Ok(forward)
    }
}
