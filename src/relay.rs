use std::path::{Path, PathBuf};
use anyhow::Context;
use tokio::sync::watch;
use crate::common::{BallFrame, DetectorConfig, EstimateMessage};
use crate::data::{frame_queue, SendState};
use crate::detection_runners::{spawn_detector_worker, DetectorHandle, WorkerStatus};
use crate::side_channel::{SideChannelNegotiator, SideChannelState};
use crate::transport::VideoTrack;

/// Display or recording target for received frames.
pub trait FrameSink: Send {
    fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn show(&mut self, frame: &BallFrame) -> anyhow::Result<()>;

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct Blackhole;

impl FrameSink for Blackhole {
    fn show(&mut self, _frame: &BallFrame) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes each frame to `<dir>/frame_<pts>.png`.
#[derive(Debug)]
pub struct PngRecorder {
    dir: PathBuf,
    written: u64,
}

impl PngRecorder {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for PngRecorder {
    fn start(&mut self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create recording directory {}", self.dir.display()))?;
        log::info!("Recording frames to {}", self.dir.display());
        Ok(())
    }

    fn show(&mut self, frame: &BallFrame) -> anyhow::Result<()> {
        let path = self.dir.join(format!("frame_{:010}.png", frame.pts));
        frame.image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        log::info!("Recorded {} frames to {}", self.written, self.dir.display());
        Ok(())
    }
}

pub fn sink_for(record_to: Option<&Path>) -> Box<dyn FrameSink> {
    match record_to {
        Some(dir) => Box::new(PngRecorder::new(dir)),
        None => Box::new(Blackhole),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub frames: u64,
    pub sent: u64,
    pub dropped: u64,
}

/// Client-side per-frame loop body.
pub struct FrameRelay {
    sink: Box<dyn FrameSink>,
    queue: SendState,
    negotiator: SideChannelNegotiator,
    stats: RelayStats,
}

impl FrameRelay {
    pub fn new(sink: Box<dyn FrameSink>, queue: SendState, negotiator: SideChannelNegotiator) -> Self {
        Self {
            sink,
            queue,
            negotiator,
            stats: RelayStats::default(),
        }
    }

    /// Displays the frame, hands it to the detector if there is room,
    /// requests the side channel on first use and reports the latest
    /// estimate tagged with this frame's timestamp.
    pub async fn on_frame(&mut self, frame: BallFrame) -> anyhow::Result<()> {
        self.stats.frames += 1;
        self.sink.show(&frame)?;

        let pts = frame.pts;
        self.queue.offer(frame);

        if !self.negotiator.is_requested() {
            self.negotiator.open_side_channel().await?;
        }

        let message = EstimateMessage::new(pts, &self.queue.estimate.get());
        match self.negotiator.send(&message.to_string()) {
            Ok(true) => self.stats.sent += 1,
            Ok(false) => {}
            Err(err) => log::warn!("Failed to send estimate for frame {}: {:#}", pts, err),
        }
        Ok(())
    }

    pub fn side_channel_state(&self) -> SideChannelState {
        self.negotiator.state()
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            dropped: self.queue.dropped(),
            ..self.stats
        }
    }

    pub fn close(&mut self) {
        if let Err(err) = self.sink.close() {
            log::warn!("Failed to close frame sink: {:#}", err);
        }
        self.negotiator.close();
    }
}

async fn worker_failed(status: &mut watch::Receiver<WorkerStatus>) {
    let failed = status.wait_for(|s| *s == WorkerStatus::Failed).await.is_ok();
    if !failed {
        std::future::pending::<()>().await;
    }
}

/// Pumps `track` through the relay until it ends or the detector fails,
/// then stops the detector before the queue and estimate are released.
pub async fn run_relay(mut track: Box<dyn VideoTrack>, mut relay: FrameRelay,
                       worker: DetectorHandle) -> anyhow::Result<RelayStats> {
    let mut status = worker.subscribe();

    let result = loop {
        tokio::select! {
            frame = track.recv() => match frame {
                Ok(frame) => {
                    if let Err(err) = relay.on_frame(frame).await {
                        break Err(err);
                    }
                }
                Err(err) => {
                    log::info!("Track '{}' ended: {}", track.id(), err);
                    break Ok(());
                }
            },
            _ = worker_failed(&mut status) => {
                break Err(anyhow::anyhow!("detector worker failed"));
            }
        }
    };

    relay.close();
    let joined = tokio::task::spawn_blocking(move || worker.shutdown())
        .await
        .context("Detector join task failed")?;
    let stats = relay.stats();
    drop(relay);

    result?;
    joined?;
    log::info!("Relay finished: {} frames, {} estimates sent, {} dropped by detector queue",
               stats.frames, stats.sent, stats.dropped);
    Ok(stats)
}

/// Starts the detector worker and relays `track` through it.
pub async fn relay_track(track: Box<dyn VideoTrack>, mut sink: Box<dyn FrameSink>,
                         negotiator: SideChannelNegotiator, config: &DetectorConfig) -> anyhow::Result<RelayStats> {
    sink.start()?;
    let (send_state, detection_state) = frame_queue(config.queue_capacity);
    let detector = crate::init_detector(config)?;
    let worker = spawn_detector_worker(detector, detection_state, config.poll_interval())?;
    let relay = FrameRelay::new(sink, send_state, negotiator);
    run_relay(track, relay, worker).await
}
