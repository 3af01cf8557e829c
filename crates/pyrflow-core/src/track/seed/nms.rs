use super::Corner;

/// Greedy suppression over corners already sorted by descending score.
/// A candidate strictly closer than `min_distance` to an accepted corner
/// is dropped; acceptance stops at `max_keep`.
pub(super) fn suppress(ordered: Vec<Corner>, min_distance: f32, max_keep: usize) -> Vec<Corner> {
    let mut kept: Vec<Corner> = Vec::with_capacity(max_keep.min(ordered.len()));
    let min_distance_sq = min_distance * min_distance;

    'candidates: for corner in ordered {
        if kept.len() == max_keep {
            break;
        }
        for accepted in &kept {
            if (accepted.position - corner.position).norm_squared() < min_distance_sq {
                continue 'candidates;
            }
        }
        kept.push(corner);
    }

    kept
}
