use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use image::RgbImage;
use imageproc::drawing::draw_filled_circle_mut;
use tokio::sync::watch;
use tokio::time::Instant;
use crate::common::{BallCenter, BallFrame, SimulatorConfig};
use crate::data::GroundTruthLedger;
use crate::transport::{TransportError, VideoTrack};

/// Deterministic bouncing-ball renderer.
///
/// Every produced frame is recorded in the ground-truth ledger under its
/// timestamp before it is handed out.
#[derive(Debug)]
pub struct BallSimulator {
    config: SimulatorConfig,
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
    counter: u64,
    ledger: Arc<GroundTruthLedger>,
}

impl BallSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let (x, y) = config.start_position();
        let (dx, dy) = config.velocity;
        Self {
            config,
            x,
            y,
            dx,
            dy,
            counter: 0,
            ledger: Arc::new(GroundTruthLedger::new()),
        }
    }

    pub fn ledger(&self) -> Arc<GroundTruthLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn position(&self) -> BallCenter {
        BallCenter::new(self.x, self.y)
    }

    pub fn velocity(&self) -> (i32, i32) {
        (self.dx, self.dy)
    }

    pub fn frames_produced(&self) -> u64 {
        self.counter
    }

    /// Timestamp the next call to `produce_next_frame` will carry.
    pub fn next_pts(&self) -> u64 {
        self.counter * self.config.ticks_per_frame()
    }

    pub fn produce_next_frame(&mut self) -> BallFrame {
        let pts = self.next_pts();
        let center = self.position();
        let frame = BallFrame::new(self.render(center), pts, self.config.time_base);

        self.ledger.record(pts, center);
        self.counter += 1;
        self.advance();

        log::trace!("Produced frame {} with ball at {}", pts, center);
        frame
    }

    fn render(&self, center: BallCenter) -> RgbImage {
        let mut image = RgbImage::new(self.config.width, self.config.height);
        draw_filled_circle_mut(&mut image, center.as_tuple(), self.config.ball_radius, self.config.color());
        image
    }

    // Reflect once per axis per tick, even if the ball is still past the edge.
    fn advance(&mut self) {
        let radius = self.config.ball_radius;
        let width = self.config.width as i32;
        let height = self.config.height as i32;

        self.x += self.dx;
        self.y += self.dy;
        if self.x <= radius || self.x >= width - radius {
            self.dx = -self.dx;
        }
        if self.y <= radius || self.y >= height - radius {
            self.dy = -self.dy;
        }
    }
}

/// Outbound video track that paces the simulator at its frame rate.
pub struct BallVideoTrack {
    id: String,
    simulator: BallSimulator,
    started: Option<Instant>,
    max_frames: Option<u64>,
    ended: watch::Sender<bool>,
}

impl BallVideoTrack {
    pub fn new(simulator: BallSimulator) -> Self {
        Self {
            id: "ball".to_string(),
            simulator,
            started: None,
            max_frames: None,
            ended: watch::channel(false).0,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn ledger(&self) -> Arc<GroundTruthLedger> {
        self.simulator.ledger()
    }

    /// Flips to `true` once the frame limit has been reached.
    pub fn subscribe_end(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }

    fn due_at(&mut self) -> Instant {
        let started = *self.started.get_or_insert_with(Instant::now);
        let offset: Duration = self.simulator.config().time_base.to_duration(self.simulator.next_pts());
        started + offset
    }
}

#[async_trait]
impl VideoTrack for BallVideoTrack {
    fn id(&self) -> &str {
        &self.id
    }

    async fn recv(&mut self) -> anyhow::Result<BallFrame> {
        if let Some(max_frames) = self.max_frames {
            if self.simulator.frames_produced() >= max_frames {
                self.ended.send_replace(true);
                return Err(TransportError::EndOfStream.into());
            }
        }

        let due = self.due_at();
        tokio::time::sleep_until(due).await;
        Ok(self.simulator.produce_next_frame())
    }
}
