use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use pyrflow_core::track::lk::{TrackResult, TrackStatus};
use pyrflow_core::track::seed::Corner;

#[derive(Serialize)]
pub struct CornerRecord {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl From<&Corner> for CornerRecord {
    fn from(corner: &Corner) -> Self {
        Self {
            x: corner.position.x,
            y: corner.position.y,
            score: corner.score,
        }
    }
}

#[derive(Serialize)]
pub struct TrackRecord {
    pub seed_x: f32,
    pub seed_y: f32,
    pub x: f32,
    pub y: f32,
    pub status: &'static str,
    pub found: bool,
    pub residual: f32,
    pub iterations: u32,
}

impl TrackRecord {
    pub fn new(corner: &Corner, result: &TrackResult) -> Self {
        Self {
            seed_x: corner.position.x,
            seed_y: corner.position.y,
            x: result.point.x,
            y: result.point.y,
            status: status_label(result.status),
            found: result.found(),
            residual: result.residual,
            iterations: result.iterations,
        }
    }
}

fn status_label(status: TrackStatus) -> &'static str {
    match status {
        TrackStatus::Converged => "converged",
        TrackStatus::Exhausted => "exhausted",
        TrackStatus::Lost => "lost",
    }
}

pub fn write_json<T: Serialize>(path: &Path, records: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records).context("failed to serialize records")?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
