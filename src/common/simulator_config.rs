use image::Rgb;
use serde::{Deserialize, Serialize};
use crate::common::{TimeBase, VIDEO_FRAME_RATE};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub width: u32,
    pub height: u32,
    pub ball_radius: i32,
    pub ball_color: [u8; 3],
    /// Starting center; `None` starts in the middle of the frame.
    pub start: Option<(i32, i32)>,
    pub velocity: (i32, i32),
    pub fps: u32,
    pub time_base: TimeBase,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            ball_radius: 20,
            ball_color: [255, 150, 0],
            start: None,
            velocity: (3, 2),
            fps: VIDEO_FRAME_RATE,
            time_base: TimeBase::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_radius(mut self, ball_radius: i32) -> Self {
        self.ball_radius = ball_radius;
        self
    }

    pub fn with_start(mut self, x: i32, y: i32) -> Self {
        self.start = Some((x, y));
        self
    }

    pub fn with_velocity(mut self, dx: i32, dy: i32) -> Self {
        self.velocity = (dx, dy);
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn start_position(&self) -> (i32, i32) {
        self.start
            .unwrap_or((self.width as i32 / 2, self.height as i32 / 2))
    }

    pub fn color(&self) -> Rgb<u8> {
        Rgb(self.ball_color)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.time_base.validate()
    }

    pub fn ticks_per_frame(&self) -> u64 {
        self.time_base.ticks_per_frame(self.fps)
    }

    pub fn to_string(&self) -> String {
        format!("Frame: {}x{} @ {}fps (time base {})\n\
        Ball radius: {}\n\
        Start: {:?}\n\
        Velocity: {:?}",
                self.width, self.height, self.fps, self.time_base,
                self.ball_radius, self.start_position(), self.velocity)
    }
}
