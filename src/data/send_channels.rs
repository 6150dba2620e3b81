use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crossbeam_channel::TrySendError;
use crate::common::{BallFrame, SharedEstimate};

/// Detector-side end of the frame queue.
#[derive(Debug)]
pub struct DetectionState {
    pub frame_rx: crossbeam_channel::Receiver<BallFrame>,
    pub estimate: SharedEstimate,
}

/// Relay-side end of the frame queue.
#[derive(Debug, Clone)]
pub struct SendState {
    pub frame_tx: crossbeam_channel::Sender<BallFrame>,
    pub estimate: SharedEstimate,
    dropped: Arc<AtomicU64>,
}

/// Bounded frame queue plus the estimate both ends share.
pub fn frame_queue(capacity: usize) -> (SendState, DetectionState) {
    let (frame_tx, frame_rx) = crossbeam_channel::bounded(capacity.max(1));
    let estimate = SharedEstimate::new();

    let send_state = SendState {
        frame_tx,
        estimate: estimate.clone(),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    let detection_state = DetectionState { frame_rx, estimate };

    (send_state, detection_state)
}

impl SendState {
    /// Enqueues without blocking. When the queue is full the offered frame
    /// (the newest) is dropped and `false` is returned.
    pub fn offer(&self, frame: BallFrame) -> bool {
        match self.frame_tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("Frame queue full, dropping frame {}", frame.pts);
                false
            }
            Err(TrySendError::Disconnected(frame)) => {
                log::debug!("Detector gone, frame {} not queued", frame.pts);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> usize {
        self.frame_tx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_newest() {
        let (send, detect) = frame_queue(2);
        assert!(send.offer(BallFrame::default().with_pts(0)));
        assert!(send.offer(BallFrame::default().with_pts(3000)));
        assert!(!send.offer(BallFrame::default().with_pts(6000)));
        assert_eq!(send.dropped(), 1);

        let kept: Vec<u64> = detect.frame_rx.try_iter().map(|f| f.pts).collect();
        assert_eq!(kept, vec![0, 3000]);
    }
}
