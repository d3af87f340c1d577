//! Generate a synthetic gesture.frame.v1 stream and print the frame reports

use gesture_flux::encoder::ReportEncoder;
use gesture_flux::landmarks::pose;
use gesture_flux::{FrameAnalyzer, FrameRecord, LandmarkPayload, LandmarkSet, Point3};

/// Upright pose with the shoulder midpoint shifted by `dx` and, optionally,
/// the left wrist raised above the mouth
fn pose_at(dx: f64, hand_up: bool) -> LandmarkSet {
    let mut points = vec![Point3::new(0.5 + dx, 0.5, 0.0); pose::POINT_COUNT];
    points[pose::MOUTH_LEFT] = Point3::new(0.48 + dx, 0.30, 0.0);
    points[pose::MOUTH_RIGHT] = Point3::new(0.52 + dx, 0.30, 0.0);
    points[pose::LEFT_SHOULDER] = Point3::new(0.65 + dx, 0.50, 0.0);
    points[pose::RIGHT_SHOULDER] = Point3::new(0.35 + dx, 0.50, 0.0);
    points[pose::LEFT_ELBOW] = Point3::new(0.70 + dx, 0.70, 0.0);
    points[pose::RIGHT_ELBOW] = Point3::new(0.30 + dx, 0.70, 0.0);
    points[pose::LEFT_WRIST] = if hand_up {
        Point3::new(0.60 + dx, 0.25, 0.0)
    } else {
        Point3::new(0.72 + dx, 0.90, 0.0)
    };
    points[pose::RIGHT_WRIST] = Point3::new(0.28 + dx, 0.90, 0.0);
    LandmarkSet::new(points)
}

fn main() {
    let analyzer = FrameAnalyzer::default();
    let encoder = ReportEncoder::new();

    for step in 0..12 {
        let timestamp = step as f64 * 0.5;
        let dx = if (4..8).contains(&step) { 0.08 } else { 0.0 };
        let hand_up = step == 10;

        let record = FrameRecord::new("demo-user", timestamp, LandmarkPayload::with_pose(pose_at(dx, hand_up)))
            .with_room("demo-room");

        match analyzer
            .evaluate_record(record)
            .and_then(|report| encoder.encode_to_json(report))
        {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}
