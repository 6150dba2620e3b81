use image::RgbImage;
use crate::common::TimeBase;

/// One rendered video frame plus its presentation timestamp.
#[derive(Debug, Clone, Default)]
pub struct BallFrame {
    pub image: RgbImage,
    pub pts: u64,
    pub time_base: TimeBase,
}

impl std::ops::Deref for BallFrame {
    type Target = RgbImage;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl From<RgbImage> for BallFrame {
    fn from(image: RgbImage) -> Self {
        Self {
            image,
            ..Default::default()
        }
    }
}

impl BallFrame {
    pub fn new(image: RgbImage, pts: u64, time_base: TimeBase) -> Self {
        Self {
            image,
            pts,
            time_base,
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = pts;
        self
    }

    /// `(height, width, channels)`, the layout of the raw pixel array.
    pub fn shape(&self) -> (usize, usize, usize) {
        let (width, height) = self.image.dimensions();
        (height as usize, width as usize, 3)
    }
}
