use std::time::Instant;
use image::{GrayImage, RgbImage};
use crate::common::BallCenter;
use crate::utils;

/// A detected circle: center, radius and the support it gathered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCandidate {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub votes: u32,
}

impl CircleCandidate {
    pub fn center(&self) -> BallCenter {
        BallCenter::from_f32(self.x, self.y)
    }
}

/// Image in, best-guess ball center out.
pub trait BallDetector: Send {
    fn name(&self) -> &'static str;

    /// Pre-process the input frame.
    fn preprocess(&self, image: &RgbImage) -> anyhow::Result<GrayImage> {
        Ok(image::imageops::grayscale(image))
    }

    /// Candidates, strongest first.
    fn inference(&mut self, gray: &GrayImage) -> anyhow::Result<Vec<CircleCandidate>>;

    /// Pick the ball among the candidates.
    fn postprocess(&self, candidates: &[CircleCandidate]) -> Option<BallCenter> {
        candidates.first().map(CircleCandidate::center)
    }

    /// Executes the full pipeline.
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Option<BallCenter>> {
        let gray = self.preprocess(image)?;
        let candidates = self.inference(&gray)?;
        Ok(self.postprocess(&candidates))
    }

    /// Executes the full pipeline, tracing per-stage timings.
    fn forward(&mut self, image: &RgbImage, profile: bool) -> anyhow::Result<Option<BallCenter>> {
        let detect_time = Instant::now();
        let mut _detect_elapsed = detect_time.elapsed();

        let gray = self.preprocess(image)?;
        _detect_elapsed = utils::trace(profile, "TIME", "Grayscale", detect_time, _detect_elapsed);

        let candidates = self.inference(&gray)?;
        _detect_elapsed = utils::trace(profile, "TIME", "Detection run", detect_time, _detect_elapsed);

        let center = self.postprocess(&candidates);
        utils::trace(profile, "TIME", "Postprocessing", detect_time, _detect_elapsed);

        Ok(center)
    }
}
