pub mod error;
pub mod img;
pub mod track;

#[cfg(test)]
mod tests {
    use crate::img::frame::Frame;
    use crate::img::pyramid::build_pyramid;
    use crate::track::lk::{LkTracker, TrackerConfig};
    use crate::track::seed::{GfttConfig, GfttDetector};
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn square_frame(center_x: i64, center_y: i64) -> Frame {
        // A 13px bright square on a dark background; edges land halfway
        // between pixel centers.
        Frame::from_fn(64, 64, |x, y| {
            let dx = (x as i64 - center_x).abs();
            let dy = (y as i64 - center_y).abs();
            if dx <= 6 && dy <= 6 { 210.0 } else { 25.0 }
        })
        .unwrap()
    }

    #[test]
    fn tracks_a_translated_square_within_half_a_pixel() {
        let prev = square_frame(32, 32);
        let curr = square_frame(35, 30);
        let prev_pyr = build_pyramid(&prev, 2);
        let curr_pyr = build_pyramid(&curr, 2);

        let tracker = LkTracker::new(TrackerConfig {
            win_size: 15,
            max_level: 2,
            iters: 10,
            epsilon: 0.01,
            ..TrackerConfig::default()
        })
        .unwrap();

        let results = tracker
            .track(&prev_pyr, &curr_pyr, &[Vector2::new(32.0, 32.0)])
            .unwrap();
        assert!(results[0].found());
        assert!((results[0].point.x - 35.0).abs() < 0.5);
        assert!((results[0].point.y - 30.0).abs() < 0.5);
    }

    #[test]
    fn selects_exactly_the_three_isolated_corners() {
        // Three blocks anchored to frame edges leave one interior corner
        // each; straight edges must not be reported.
        let frame = Frame::from_fn(64, 64, |x, y| {
            let block_a = x < 20 && y < 20;
            let block_b = x >= 44 && y < 20;
            let block_c = x < 20 && y >= 44;
            if block_a || block_b || block_c { 220.0 } else { 15.0 }
        })
        .unwrap();

        let detector = GfttDetector::new(GfttConfig {
            max_corners: 10,
            quality_level: 0.15,
            min_distance: 5.0,
        })
        .unwrap();
        let corners = detector.detect(&frame);
        assert_eq!(corners.len(), 3);

        let expected = [(19.5, 19.5), (43.5, 19.5), (19.5, 43.5)];
        for (ex, ey) in expected {
            let closest = corners
                .iter()
                .map(|c| ((c.position.x - ex).powi(2) + (c.position.y - ey).powi(2)).sqrt())
                .fold(f32::INFINITY, f32::min);
            assert!(closest <= 1.0, "no corner within 1px of ({ex}, {ey})");
        }
    }

    #[test]
    fn forward_and_backward_tracking_are_symmetric() {
        let texture = |shift_x: f32, shift_y: f32| {
            Frame::from_fn(64, 64, |x, y| {
                let fx = x as f32 - shift_x;
                let fy = y as f32 - shift_y;
                120.0 + 55.0 * (fx * 0.31).sin() * (fy * 0.24).cos()
                    + 25.0 * ((fx + fy) * 0.12).sin()
            })
            .unwrap()
        };
        let a = build_pyramid(&texture(0.0, 0.0), 2);
        let b = build_pyramid(&texture(2.5, -1.5), 2);

        let tracker = LkTracker::new(TrackerConfig {
            win_size: 15,
            max_level: 2,
            ..TrackerConfig::default()
        })
        .unwrap();

        let seeds = [
            Vector2::new(28.0, 30.0),
            Vector2::new(36.0, 26.0),
            Vector2::new(30.0, 38.0),
        ];
        let forward = tracker.track(&a, &b, &seeds).unwrap();
        let landing: Vec<Vector2<f32>> = forward.iter().map(|r| r.point).collect();
        let backward = tracker.track(&b, &a, &landing).unwrap();

        for ((seed, fwd), bwd) in seeds.iter().zip(&forward).zip(&backward) {
            assert!(fwd.found() && bwd.found());
            assert_relative_eq!(fwd.point.x - seed.x, 2.5, epsilon = 0.2);
            assert_relative_eq!(fwd.point.y - seed.y, -1.5, epsilon = 0.2);
            // The return trip cancels the forward displacement.
            assert_relative_eq!(bwd.point.x, seed.x, epsilon = 0.2);
            assert_relative_eq!(bwd.point.y, seed.y, epsilon = 0.2);
        }
    }

    #[test]
    fn color_input_flows_through_the_whole_pipeline() {
        let mut rgb = Vec::with_capacity(48 * 48 * 3);
        for y in 0..48u32 {
            for x in 0..48u32 {
                let value = if (8..24).contains(&x) && (8..24).contains(&y) {
                    200u8
                } else {
                    30u8
                };
                rgb.extend_from_slice(&[value, value / 2, value]);
            }
        }
        let frame = Frame::from_raw(48, 48, 3, &rgb).unwrap();
        assert_eq!(frame.source_channels(), 3);

        let corners = GfttDetector::new(GfttConfig::default())
            .unwrap()
            .detect(&frame);
        assert!(!corners.is_empty());

        let pyramid = build_pyramid(&frame, 2);
        let tracker = LkTracker::new(TrackerConfig::default()).unwrap();
        let results = tracker
            .track(&pyramid, &pyramid, &[Vector2::new(16.0, 16.0)])
            .unwrap();
        assert!(results[0].found());
    }
}
