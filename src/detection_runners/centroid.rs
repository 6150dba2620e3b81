use image::GrayImage;
use rayon::prelude::*;
use crate::common::DetectorConfig;
use crate::detection_runners::{BallDetector, CircleCandidate};

/// Centroid of every pixel brighter than the luma threshold. Only sound for
/// a single bright ball on a dark background.
#[derive(Debug, Clone)]
pub struct CentroidDetector {
    luma_threshold: u8,
    min_pixels: u32,
}

impl CentroidDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        let min_radius = config.min_radius.max(1) as f32;
        Self {
            luma_threshold: config.luma_threshold,
            min_pixels: (std::f32::consts::PI * min_radius * min_radius).ceil() as u32,
        }
    }
}

impl BallDetector for CentroidDetector {
    fn name(&self) -> &'static str {
        "centroid"
    }

    fn inference(&mut self, gray: &GrayImage) -> anyhow::Result<Vec<CircleCandidate>> {
        let width = gray.width() as usize;
        if width == 0 || gray.height() == 0 {
            anyhow::bail!("empty image");
        }
        let threshold = self.luma_threshold;

        let (count, sum_x, sum_y) = gray
            .as_raw()
            .par_chunks(width)
            .enumerate()
            .map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, luma)| **luma > threshold)
                    .fold((0u64, 0u64, 0u64), |(n, sx, sy), (x, _)| (n + 1, sx + x as u64, sy + y as u64))
            })
            .reduce(|| (0, 0, 0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

        if count == 0 || count < self.min_pixels as u64 {
            return Ok(Vec::new());
        }

        let radius = (count as f32 / std::f32::consts::PI).sqrt();
        Ok(vec![CircleCandidate {
            x: sum_x as f32 / count as f32,
            y: sum_y as f32 / count as f32,
            radius,
            votes: count.min(u32::MAX as u64) as u32,
        }])
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;
    use crate::common::BallCenter;
    use super::*;

    #[test]
    fn centroid_of_disc_is_its_center() {
        let mut image = RgbImage::new(120, 90);
        draw_filled_circle_mut(&mut image, (40, 50), 15, Rgb([255, 150, 0]));

        let mut detector = CentroidDetector::new(&DetectorConfig::default());
        assert_eq!(detector.detect(&image).unwrap(), Some(BallCenter::new(40, 50)));
    }

    #[test]
    fn dark_frame_has_no_candidate() {
        let mut detector = CentroidDetector::new(&DetectorConfig::default());
        assert_eq!(detector.detect(&RgbImage::new(32, 32)).unwrap(), None);
    }
}
