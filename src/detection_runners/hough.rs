//! Gradient-direction circular Hough transform.
//!
//! Every Canny edge pixel votes along its Sobel gradient, in both
//! directions, for each radius in range. Accumulator peaks above `param2`
//! votes are centers; the radius is the most common edge distance around
//! each center.

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use ndarray::Array2;
use rayon::prelude::*;
use crate::common::DetectorConfig;
use crate::detection_runners::{BallDetector, CircleCandidate};

const VOTE_CHUNK: usize = 256;
const MAX_CANDIDATES: usize = 16;

#[derive(Debug, Clone, Copy)]
struct EdgePoint {
    x: f32,
    y: f32,
    ux: f32,
    uy: f32,
}

#[derive(Debug, Clone)]
pub struct HoughCircleDetector {
    config: DetectorConfig,
}

impl HoughCircleDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self { config: config.clone() }
    }

    fn radius_range(&self, width: u32, height: u32) -> (u32, u32) {
        let min_radius = self.config.min_radius.max(1);
        let max_radius = match self.config.max_radius {
            0 => width.max(height) / 2,
            max => max,
        };
        (min_radius, max_radius.max(min_radius))
    }

    fn edge_points(&self, gray: &GrayImage) -> Vec<EdgePoint> {
        let high = self.config.param1.max(1.0);
        let edges = canny(gray, high / 2.0, high);
        let gx = horizontal_sobel(gray);
        let gy = vertical_sobel(gray);

        edges
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .filter_map(|(x, y, _)| {
                let dx = gx.get_pixel(x, y).0[0] as f32;
                let dy = gy.get_pixel(x, y).0[0] as f32;
                let magnitude = dx.hypot(dy);
                if magnitude == 0.0 {
                    return None;
                }
                Some(EdgePoint {
                    x: x as f32,
                    y: y as f32,
                    ux: dx / magnitude,
                    uy: dy / magnitude,
                })
            })
            .collect()
    }

    fn accumulate(&self, points: &[EdgePoint], shape: (usize, usize), radii: (u32, u32)) -> Array2<u32> {
        let dp = self.config.dp.max(1) as f32;
        let (acc_h, acc_w) = shape;
        let (min_radius, max_radius) = radii;

        points
            .par_chunks(VOTE_CHUNK)
            .fold(
                || Array2::<u32>::zeros(shape),
                |mut acc, chunk| {
                    for p in chunk {
                        for r in min_radius..=max_radius {
                            for sign in [-1.0f32, 1.0] {
                                let cx = ((p.x + sign * p.ux * r as f32) / dp).round();
                                let cy = ((p.y + sign * p.uy * r as f32) / dp).round();
                                if cx < 0.0 || cy < 0.0 {
                                    continue;
                                }
                                let (ax, ay) = (cx as usize, cy as usize);
                                if ax < acc_w && ay < acc_h {
                                    acc[[ay, ax]] += 1;
                                }
                            }
                        }
                    }
                    acc
                },
            )
            .reduce(|| Array2::<u32>::zeros(shape), |a, b| a + &b)
    }

    // Local maxima at or above the vote threshold, strongest first.
    fn peaks(&self, acc: &Array2<u32>) -> Vec<(usize, usize, u32)> {
        let (acc_h, acc_w) = acc.dim();
        let threshold = self.config.param2.max(1);
        let mut peaks = Vec::new();

        for ((y, x), &votes) in acc.indexed_iter() {
            if votes < threshold {
                continue;
            }
            let mut is_peak = true;
            'neighbours: for ny in y.saturating_sub(1)..=(y + 1).min(acc_h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(acc_w - 1) {
                    if (ny, nx) == (y, x) {
                        continue;
                    }
                    let other = acc[[ny, nx]];
                    // Plateaus keep their first cell only.
                    if other > votes || (other == votes && (ny, nx) < (y, x)) {
                        is_peak = false;
                        break 'neighbours;
                    }
                }
            }
            if is_peak {
                peaks.push((x, y, votes));
            }
        }

        peaks.sort_by(|a, b| b.2.cmp(&a.2));
        peaks
    }

    // Vote-weighted centroid of the 3x3 neighbourhood, in image pixels.
    fn refine(&self, acc: &Array2<u32>, x: usize, y: usize) -> (f32, f32) {
        let dp = self.config.dp.max(1) as f32;
        let (acc_h, acc_w) = acc.dim();
        let (mut sum, mut sum_x, mut sum_y) = (0f32, 0f32, 0f32);

        for ny in y.saturating_sub(1)..=(y + 1).min(acc_h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(acc_w - 1) {
                let votes = acc[[ny, nx]] as f32;
                sum += votes;
                sum_x += votes * nx as f32;
                sum_y += votes * ny as f32;
            }
        }
        (sum_x / sum * dp, sum_y / sum * dp)
    }

    fn estimate_radius(points: &[EdgePoint], cx: f32, cy: f32, radii: (u32, u32)) -> f32 {
        let (min_radius, max_radius) = radii;
        let mut histogram = vec![0u32; max_radius as usize + 2];

        for p in points {
            let d = (p.x - cx).hypot(p.y - cy).round() as u32;
            if d >= min_radius && d <= max_radius {
                histogram[d as usize] += 1;
            }
        }

        histogram
            .iter()
            .enumerate()
            .max_by_key(|(_, count)| **count)
            .map(|(r, _)| r as f32)
            .unwrap_or(min_radius as f32)
    }
}

impl BallDetector for HoughCircleDetector {
    fn name(&self) -> &'static str {
        "hough"
    }

    fn inference(&mut self, gray: &GrayImage) -> anyhow::Result<Vec<CircleCandidate>> {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            anyhow::bail!("image {}x{} too small for circle detection", width, height);
        }

        let points = self.edge_points(gray);
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let dp = self.config.dp.max(1);
        let shape = (height.div_ceil(dp) as usize, width.div_ceil(dp) as usize);
        let radii = self.radius_range(width, height);
        let acc = self.accumulate(&points, shape, radii);

        let mut candidates: Vec<CircleCandidate> = Vec::new();
        for (x, y, votes) in self.peaks(&acc) {
            let (cx, cy) = self.refine(&acc, x, y);
            let too_close = candidates
                .iter()
                .any(|c| (c.x - cx).hypot(c.y - cy) < self.config.min_dist);
            if too_close {
                continue;
            }

            let radius = Self::estimate_radius(&points, cx, cy, radii);
            candidates.push(CircleCandidate { x: cx, y: cy, radius, votes });
            if candidates.len() == MAX_CANDIDATES {
                break;
            }
        }

        log::trace!("Hough: {} edge points, {} candidates", points.len(), candidates.len());
        Ok(candidates)
    }
}
