use std::sync::Arc;
use parking_lot::Mutex;
use thiserror::Error;
use crate::common::{BallCenter, EstimateMessage, EstimateParseError};
use crate::data::{GroundTruthLedger, LedgerError};

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("malformed estimate message '{message}': {source}")]
    Malformed {
        message: String,
        #[source]
        source: EstimateParseError,
    },
    #[error(transparent)]
    Correlation(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreReport {
    pub pts: u64,
    pub actual: BallCenter,
    pub estimate: BallCenter,
    pub error: f64,
}

impl std::fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Actual: {} Estimate: {} error: {:2.3} pixels", self.actual, self.estimate, self.error)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSummary {
    pub scored: u64,
    pub misses: u64,
    pub parse_errors: u64,
    pub total_error: f64,
    pub max_error: f64,
}

impl ScoreSummary {
    pub fn mean_error(&self) -> f64 {
        if self.scored == 0 {
            return 0.0;
        }
        self.total_error / self.scored as f64
    }

    pub fn to_string(&self) -> String {
        format!("Scored: {} | Correlation misses: {} | Parse errors: {} | Mean error: {:.3}px | Max error: {:.3}px",
                self.scored, self.misses, self.parse_errors, self.mean_error(), self.max_error)
    }
}

/// Matches returned estimates against the ground truth they refer to.
#[derive(Debug)]
pub struct Scorer {
    ledger: Arc<GroundTruthLedger>,
    summary: Mutex<ScoreSummary>,
}

impl Scorer {
    pub fn new(ledger: Arc<GroundTruthLedger>) -> Self {
        Self {
            ledger,
            summary: Mutex::new(ScoreSummary::default()),
        }
    }

    /// Scores one `"pts,x,y"` message, consuming its ground-truth record.
    pub fn score(&self, message: &str) -> Result<ScoreReport, ScoreError> {
        let parsed = message.parse::<EstimateMessage>().map_err(|source| {
            self.summary.lock().parse_errors += 1;
            ScoreError::Malformed { message: message.to_string(), source }
        })?;

        let actual = self.ledger.take(parsed.pts).map_err(|err| {
            self.summary.lock().misses += 1;
            ScoreError::from(err)
        })?;

        let error = actual.distance(&parsed.center);
        {
            let mut summary = self.summary.lock();
            summary.scored += 1;
            summary.total_error += error;
            summary.max_error = summary.max_error.max(error);
        }

        Ok(ScoreReport {
            pts: parsed.pts,
            actual,
            estimate: parsed.center,
            error,
        })
    }

    /// Message handler entry point: logs the outcome, never fails.
    pub fn on_message(&self, message: &str) -> Option<ScoreReport> {
        match self.score(message) {
            Ok(report) => {
                log::info!("{}", report);
                Some(report)
            }
            Err(err) => {
                log::warn!("Discarding estimate: {}", err);
                None
            }
        }
    }

    pub fn summary(&self) -> ScoreSummary {
        self.summary.lock().clone()
    }

    pub fn ledger(&self) -> &Arc<GroundTruthLedger> {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer_with(records: &[(u64, (i32, i32))]) -> Scorer {
        let ledger = Arc::new(GroundTruthLedger::new());
        for (pts, center) in records {
            ledger.record(*pts, BallCenter::from(*center));
        }
        Scorer::new(ledger)
    }

    #[test]
    fn scores_and_retires_record() {
        let scorer = scorer_with(&[(3000, (100, 100))]);

        let report = scorer.score("3000,103,104").unwrap();
        assert_eq!(report.actual, BallCenter::new(100, 100));
        assert_eq!(report.error, 5.0);
        assert_eq!(report.to_string(), "Actual: (100,100) Estimate: (103,104) error: 5.000 pixels");

        assert!(matches!(
            scorer.score("3000,103,104"),
            Err(ScoreError::Correlation(LedgerError::NotFound(3000)))
        ));
        let summary = scorer.summary();
        assert_eq!((summary.scored, summary.misses), (1, 1));
    }

    #[test]
    fn malformed_message_does_not_stop_scoring() {
        let scorer = scorer_with(&[(0, (10, 10))]);

        assert_eq!(scorer.on_message("abc"), None);
        let report = scorer.on_message("0,10,10").unwrap();
        assert_eq!(report.error, 0.0);
        assert_eq!(scorer.summary().parse_errors, 1);
    }

    #[test]
    fn extreme_coordinates_are_scored() {
        let scorer = scorer_with(&[(0, (100, 100))]);

        let report = scorer.on_message("0,-2147483648,100").unwrap();
        assert_eq!(report.error, 100.0 + 2147483648.0);
        let summary = scorer.summary();
        assert_eq!((summary.scored, summary.misses), (1, 0));
    }
}
