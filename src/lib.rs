mod utils;
pub mod common;
pub mod data;
pub mod detection_runners;
pub mod simulator;
pub mod transport;
pub mod side_channel;
pub mod scorer;
pub mod relay;
pub mod client;
pub mod server;

use std::time::Instant;
use crate::common::{BallCenter, BallFrame, DetectorConfig, DetectorKind};
use crate::detection_runners::{BallDetector, CentroidDetector, HoughCircleDetector};

pub fn init_detector(config: &DetectorConfig) -> anyhow::Result<Box<dyn BallDetector>> {
    if config.queue_capacity == 0 {
        anyhow::bail!("detector queue capacity must be at least 1");
    }

    let detector: Box<dyn BallDetector> = match config.kind {
        DetectorKind::Hough => Box::new(HoughCircleDetector::new(config)),
        DetectorKind::Centroid => Box::new(CentroidDetector::new(config)),
    };
    log::info!("Initializing {} ball detector", config.kind.str());
    log::debug!("{}", config.to_string());
    Ok(detector)
}

pub fn run_detection(detector: &mut dyn BallDetector, frame: &BallFrame) -> anyhow::Result<Option<BallCenter>> {
    let now = Instant::now();

    let center = detector.forward(&frame.image, false)?;

    log::debug!("Processing time for frame {}: {:?}", frame.pts, now.elapsed());

    Ok(center)
}
