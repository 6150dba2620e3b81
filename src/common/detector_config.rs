use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::common::DetectorKind;

/// Detector and worker settings. Hough parameters follow the usual
/// gradient-method naming (`dp`, `min_dist`, `param1`, `param2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    /// Inverse accumulator resolution; 1 = image resolution.
    pub dp: u32,
    /// Minimum distance between reported centers.
    pub min_dist: f32,
    /// High Canny threshold; the low one is half of it.
    pub param1: f32,
    /// Minimum accumulator votes for a center.
    pub param2: u32,
    pub min_radius: u32,
    /// 0 derives the bound from the image size.
    pub max_radius: u32,
    /// Luma threshold for the centroid detector.
    pub luma_threshold: u8,
    pub queue_capacity: usize,
    pub poll_interval_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Hough,
            dp: 1,
            min_dist: 20.0,
            param1: 60.0,
            param2: 20,
            min_radius: 0,
            max_radius: 0,
            luma_threshold: 40,
            queue_capacity: 2,
            poll_interval_ms: 10,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_kind(mut self, kind: DetectorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_radius_range(mut self, min_radius: u32, max_radius: u32) -> Self {
        self.min_radius = min_radius;
        self.max_radius = max_radius;
        self
    }

    pub fn with_thresholds(mut self, param1: f32, param2: u32) -> Self {
        self.param1 = param1;
        self.param2 = param2;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval_ms = poll_interval.as_millis().max(1) as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn to_string(&self) -> String {
        format!("Detector: {}\n\
        Accumulator dp: {}\n\
        Min center distance: {}\n\
        Canny high threshold: {}\n\
        Accumulator threshold: {}\n\
        Radius range: {}..{}\n\
        Queue capacity: {}\n\
        Poll interval: {}ms",
                self.kind, self.dp, self.min_dist, self.param1, self.param2,
                self.min_radius, self.max_radius, self.queue_capacity, self.poll_interval_ms)
    }
}
