use std::str::FromStr;
use std::sync::Arc;
use parking_lot::Mutex;
use thiserror::Error;
use crate::common::BallCenter;

/// Coordinate reported before the detector has produced anything.
pub const NO_DETECTION: i32 = -1;

/// Latest detection result published by the detector worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    /// Timestamp of the frame the detection was computed from.
    pub source_pts: Option<u64>,
    pub x: i32,
    pub y: i32,
}

impl Default for Estimate {
    fn default() -> Self {
        Self {
            source_pts: None,
            x: NO_DETECTION,
            y: NO_DETECTION,
        }
    }
}

impl Estimate {
    pub fn new(source_pts: u64, center: BallCenter) -> Self {
        Self {
            source_pts: Some(source_pts),
            x: center.x,
            y: center.y,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.source_pts.is_none()
    }

    pub fn center(&self) -> BallCenter {
        BallCenter::new(self.x, self.y)
    }
}

/// Estimate shared between the detector thread and the frame relay.
///
/// The whole value is replaced under a single lock, so a reader never sees
/// an `x` from one detection paired with a `y` from another.
#[derive(Debug, Clone, Default)]
pub struct SharedEstimate {
    inner: Arc<Mutex<Estimate>>,
}

impl SharedEstimate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Estimate {
        *self.inner.lock()
    }

    pub fn publish(&self, estimate: Estimate) {
        *self.inner.lock() = estimate;
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EstimateParseError {
    #[error("expected 3 comma separated fields, got {0}")]
    FieldCount(usize),
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("invalid coordinate '{0}'")]
    Coordinate(String),
}

/// Wire form of an estimate: `"{pts},{x},{y}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateMessage {
    pub pts: u64,
    pub center: BallCenter,
}

impl EstimateMessage {
    pub fn new(pts: u64, estimate: &Estimate) -> Self {
        Self {
            pts,
            center: estimate.center(),
        }
    }
}

impl std::fmt::Display for EstimateMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.pts, self.center.x, self.center.y)
    }
}

impl FromStr for EstimateMessage {
    type Err = EstimateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(EstimateParseError::FieldCount(fields.len()));
        }

        let pts = fields[0]
            .parse::<u64>()
            .map_err(|_| EstimateParseError::Timestamp(fields[0].to_string()))?;
        let x = fields[1]
            .parse::<i32>()
            .map_err(|_| EstimateParseError::Coordinate(fields[1].to_string()))?;
        let y = fields[2]
            .parse::<i32>()
            .map_err(|_| EstimateParseError::Coordinate(fields[2].to_string()))?;

        Ok(Self {
            pts,
            center: BallCenter::new(x, y),
        })
    }
}
