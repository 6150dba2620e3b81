mod ball_detector;
pub mod centroid;
pub mod detector_worker;
pub mod hough;

pub use ball_detector::*;
pub use centroid::CentroidDetector;
pub use detector_worker::{spawn_detector_worker, DetectorHandle, WorkerStatus};
pub use hough::HoughCircleDetector;
