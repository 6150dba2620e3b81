use std::collections::HashMap;
use parking_lot::Mutex;
use thiserror::Error;
use crate::common::BallCenter;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no ground truth recorded for timestamp {0} (duplicate or never produced)")]
    NotFound(u64),
}

/// Ground-truth ball centers keyed by frame timestamp.
///
/// Each record is written once by the simulator and consumed once by the
/// scorer.
#[derive(Debug, Default)]
pub struct GroundTruthLedger {
    centers: Mutex<HashMap<u64, BallCenter>>,
}

impl GroundTruthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, pts: u64, center: BallCenter) {
        if let Some(previous) = self.centers.lock().insert(pts, center) {
            log::warn!("Ground truth for timestamp {} overwritten (was {})", pts, previous);
        }
    }

    /// Removes and returns the record for `pts`.
    pub fn take(&self, pts: u64) -> Result<BallCenter, LedgerError> {
        self.centers
            .lock()
            .remove(&pts)
            .ok_or(LedgerError::NotFound(pts))
    }

    pub fn len(&self) -> usize {
        self.centers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_destructive() {
        let ledger = GroundTruthLedger::new();
        ledger.record(3000, BallCenter::new(10, 20));

        assert_eq!(ledger.take(3000), Ok(BallCenter::new(10, 20)));
        assert_eq!(ledger.take(3000), Err(LedgerError::NotFound(3000)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn unknown_timestamp_is_not_found() {
        let ledger = GroundTruthLedger::new();
        ledger.record(0, BallCenter::new(1, 1));
        assert_eq!(ledger.take(1), Err(LedgerError::NotFound(1)));
        assert_eq!(ledger.len(), 1);
    }
}
