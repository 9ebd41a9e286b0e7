//! Property tests for rect encoding and view clamping.

use proptest::prelude::*;
use stackscope_protocol::{Bounds, Mat3, Point, Rect, compute_clamped_config_view};

fn finite() -> impl Strategy<Value = f64> {
    -1.0e6..1.0e6f64
}

proptest! {
    #[test]
    fn encode_decode_recovers_rounded_rect(
        x in finite(), y in finite(), w in 0.0..1.0e6f64, h in 0.0..1.0e6f64
    ) {
        let rect = Rect::new(x, y, w, h);
        let decoded = Rect::decode(&rect.encode());
        prop_assert!(decoded.is_some());
        let decoded = decoded.unwrap_or_default();
        for (a, b) in decoded.to_array().iter().zip(rect.to_array()) {
            prop_assert!((a - b).abs() <= 0.5);
        }
    }

    #[test]
    fn clamped_view_stays_inside_space(
        x in finite(), y in finite(), w in 0.0..2.0e6f64, h in 0.0..200.0f64,
        space_w in 1.0..1.0e6f64, space_h in 1.0..100.0f64, min_w in 0.0..10.0f64,
    ) {
        let clamped = compute_clamped_config_view(
            &Rect::new(x, y, w, h),
            Bounds::new(min_w, space_w),
            Bounds::new(0.0, space_h),
        );
        prop_assert!(clamped.is_ok());
        let clamped = clamped.unwrap_or_default();
        let space = Rect::new(0.0, 0.0, space_w, space_h);
        prop_assert!(clamped.x() >= 0.0);
        prop_assert!(clamped.y() >= 0.0);
        prop_assert!(clamped.width() <= space_w);
        prop_assert!(clamped.right() <= space.right() + 1e-6);
        prop_assert!(clamped.bottom() <= space.bottom() + 1e-6);
    }

    #[test]
    fn transformed_rects_have_positive_extent(
        x in finite(), y in finite(), w in 0.0..1.0e3f64, h in 0.0..1.0e3f64,
        sx in -10.0..10.0f64, sy in -10.0..10.0f64,
    ) {
        let m = Mat3::from_scaling(Point::new(sx, sy));
        let r = Rect::new(x, y, w, h).transform_rect(&m);
        prop_assert!(r.is_ok());
        let r = r.unwrap_or_default();
        prop_assert!(r.width() >= 0.0);
        prop_assert!(r.height() >= 0.0);
    }
}
