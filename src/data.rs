mod ledger;
mod time_calc;
pub mod send_channels;

pub use ledger::{GroundTruthLedger, LedgerError};
pub use send_channels::{frame_queue, DetectionState, SendState};
pub use time_calc::TimeCalc;
