use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use anyhow::Context;
use crossbeam_channel::RecvTimeoutError;
use tokio::sync::watch;
use crate::common::Estimate;
use crate::data::{DetectionState, TimeCalc};
use crate::detection_runners::BallDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Stopped,
    Failed,
}

// Publishes the final status, including when the thread unwinds.
struct ExitGuard {
    status: watch::Sender<WorkerStatus>,
    finished: bool,
}

impl ExitGuard {
    fn finish(&mut self, ok: bool) {
        self.finished = true;
        self.status.send_replace(if ok { WorkerStatus::Stopped } else { WorkerStatus::Failed });
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if !self.finished {
            log::error!("Detector thread panicked");
            self.status.send_replace(WorkerStatus::Failed);
        }
    }
}

/// Owner of the detector thread.
pub struct DetectorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<anyhow::Result<()>>>,
    status: watch::Receiver<WorkerStatus>,
}

impl DetectorHandle {
    pub fn status(&self) -> WorkerStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.clone()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stops the worker and joins it. Returns the worker's own error, if any.
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        self.request_stop();
        match self.thread.take() {
            Some(thread) => join_worker(thread),
            None => Ok(()),
        }
    }
}

fn join_worker(thread: JoinHandle<anyhow::Result<()>>) -> anyhow::Result<()> {
    match thread.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("detector thread panicked")),
    }
}

fn log_worker_exit(result: anyhow::Result<()>) {
    if let Err(err) = result {
        log::warn!("Detector worker ended with error: {:#}", err);
    }
}

// Dropped without `shutdown` (aborted owner task): inside a tokio runtime the
// join runs on the blocking pool.
impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.request_stop();
        let Some(thread) = self.thread.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || log_worker_exit(join_worker(thread)));
            }
            Err(_) => log_worker_exit(join_worker(thread)),
        }
    }
}

/// Runs `detector` on its own thread, feeding it from the frame queue.
pub fn spawn_detector_worker(detector: Box<dyn BallDetector>, state: DetectionState,
                             poll_interval: Duration) -> anyhow::Result<DetectorHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let (status_tx, status_rx) = watch::channel(WorkerStatus::Running);

    let stop_flag = Arc::clone(&stop);
    let thread = std::thread::Builder::new()
        .name("ball-detector".to_string())
        .spawn(move || {
            let mut guard = ExitGuard { status: status_tx, finished: false };
            let result = detection_loop(detector, state, stop_flag, poll_interval);
            if let Err(err) = &result {
                log::error!("Detector worker failed: {:#}", err);
            }
            guard.finish(result.is_ok());
            result
        })
        .context("Failed to spawn detector thread")?;

    Ok(DetectorHandle {
        stop,
        thread: Some(thread),
        status: status_rx,
    })
}

fn detection_loop(mut detector: Box<dyn BallDetector>, state: DetectionState,
                  stop: Arc<AtomicBool>, poll_interval: Duration) -> anyhow::Result<()> {
    log::info!("Detector worker started ({})", detector.name());
    let mut timings = TimeCalc::default();
    let mut misses = 0u64;

    loop {
        // MESSAGE LOOP STARTS HERE
        if stop.load(Ordering::Acquire) {
            break;
        }

        let frame = match state.frame_rx.recv_timeout(poll_interval) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Frame queue disconnected");
                break;
            }
        };

        let detect_time = Instant::now();
        let center = detector
            .forward(&frame.image, false)
            .with_context(|| format!("{} detector failed on frame {}", detector.name(), frame.pts))?;
        timings.push(detect_time.elapsed());

        match center {
            Some(center) => state.estimate.publish(Estimate::new(frame.pts, center)),
            None => {
                misses += 1;
                log::trace!("No ball in frame {}, keeping previous estimate", frame.pts);
            }
        }
    }

    log::info!("Detector worker stopped: {} frames, avg {:.2?}, max {:.2?}, {} misses",
               timings.n(), timings.avg(), timings.max(), misses);
    Ok(())
}
