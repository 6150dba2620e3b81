use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BallCenter {
    pub x: i32,
    pub y: i32,
}

impl BallCenter {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another center, in pixels.
    pub fn distance(&self, other: &BallCenter) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        dx.hypot(dy)
    }

    /// Rounds a sub-pixel position to the nearest pixel center.
    pub fn from_f32(x: f32, y: f32) -> Self {
        Self {
            x: x.round() as i32,
            y: y.round() as i32,
        }
    }

    pub fn as_tuple(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

impl From<(i32, i32)> for BallCenter {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for BallCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = BallCenter::new(100, 100);
        assert_eq!(a.distance(&a), 0.0);
        assert_eq!(a.distance(&BallCenter::new(103, 104)), 5.0);
        let far = BallCenter::new(i32::MIN, 100).distance(&BallCenter::new(i32::MAX, 100));
        assert_eq!(far, u32::MAX as f64);
    }
}
