extern crate bvr_ball;

use std::time::Duration;
use image::RgbImage;
use bvr_ball::common::{BallFrame, DetectorConfig, DetectorKind, EstimateMessage};
use bvr_ball::data::frame_queue;
use bvr_ball::detection_runners::{spawn_detector_worker, WorkerStatus};

mod colours;

#[test]
fn no_detection() {
    for kind in [DetectorKind::Hough, DetectorKind::Centroid] {
        let config = DetectorConfig::new().with_kind(kind);
        let mut detector = bvr_ball::init_detector(&config).unwrap();

        let blank = BallFrame::from(RgbImage::new(200, 200));
        assert_eq!(bvr_ball::run_detection(detector.as_mut(), &blank).unwrap(), None, "{}", kind);
    }
}

#[test]
fn dim_noise_is_not_a_ball_for_centroid() {
    let mut image = RgbImage::new(160, 120);
    colours::dim_speckle(&mut image, 1_000, 3);

    let config = DetectorConfig::new().with_kind(DetectorKind::Centroid);
    let mut detector = bvr_ball::init_detector(&config).unwrap();
    assert_eq!(bvr_ball::run_detection(detector.as_mut(), &BallFrame::from(image)).unwrap(), None);
}

#[test]
fn blank_frames_keep_sentinel_estimate() {
    let config = DetectorConfig::new().with_kind(DetectorKind::Centroid);
    let detector = bvr_ball::init_detector(&config).unwrap();
    let (send, detect) = frame_queue(config.queue_capacity);
    let worker = spawn_detector_worker(detector, detect, config.poll_interval()).unwrap();

    for pts in [0u64, 3000, 6000] {
        send.offer(BallFrame::new(RgbImage::new(64, 64), pts, Default::default()));
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(worker.status(), WorkerStatus::Running);
    worker.shutdown().unwrap();

    let estimate = send.estimate.get();
    assert!(estimate.is_sentinel());
    assert_eq!(EstimateMessage::new(6000, &estimate).to_string(), "6000,-1,-1");
}

#[test]
fn zero_capacity_queue_is_rejected() {
    let config: DetectorConfig = serde_json::from_str(r#"{"queue_capacity": 0}"#).unwrap();
    assert!(bvr_ball::init_detector(&config).is_err());
}
