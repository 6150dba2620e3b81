use std::time::Duration;
use serde::{Deserialize, Serialize};

/// 90 kHz clock used by video RTP payloads.
pub const VIDEO_CLOCK_RATE: u32 = 90_000;
pub const VIDEO_FRAME_RATE: u32 = 30;

/// Rational time base: one tick lasts `num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: u32,
    pub den: u32,
}

impl Default for TimeBase {
    fn default() -> Self {
        Self { num: 1, den: VIDEO_CLOCK_RATE }
    }
}

impl TimeBase {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num == 0 || self.den == 0 {
            anyhow::bail!("invalid time base {}: numerator and denominator must be non-zero", self);
        }
        Ok(())
    }

    /// Ticks covered by one frame at `fps`. Never zero.
    pub fn ticks_per_frame(&self, fps: u32) -> u64 {
        let ticks = self.den as u64 / (self.num as u64 * fps.max(1) as u64);
        ticks.max(1)
    }

    pub fn to_duration(&self, pts: u64) -> Duration {
        let nanos = pts as u128 * self.num as u128 * 1_000_000_000 / self.den as u128;
        Duration::from_nanos(nanos as u64)
    }
}

impl std::fmt::Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_fps_at_video_clock() {
        let tb = TimeBase::default();
        assert_eq!(tb.ticks_per_frame(VIDEO_FRAME_RATE), 3000);
        assert_eq!(tb.to_duration(90_000), Duration::from_secs(1));
        assert!(tb.validate().is_ok());
    }

    #[test]
    fn zero_time_base_is_rejected() {
        assert!(TimeBase { num: 0, den: 90_000 }.validate().is_err());
        assert!(TimeBase { num: 1, den: 0 }.validate().is_err());
    }
}
