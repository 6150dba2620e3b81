use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default] Hough,
    Centroid,
}

// Hardcoded detector names. Storing the "proper" spelling and the lowercase version.
static HOUGH: [&str; 2] = ["Hough", "hough"];
static CENTROID: [&str; 2] = ["Centroid", "centroid"];

impl DetectorKind {
    pub fn from_str(detector: &str) -> Option<Self> {
        match detector.to_lowercase().as_str() {
            "hough" => Some(DetectorKind::Hough),
            "centroid" => Some(DetectorKind::Centroid),
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            DetectorKind::Hough => HOUGH[0],
            DetectorKind::Centroid => CENTROID[0],
        }
    }

    pub fn str_lowercase(&self) -> &'static str {
        match self {
            DetectorKind::Hough => HOUGH[1],
            DetectorKind::Centroid => CENTROID[1],
        }
    }

    pub fn all_detector_kinds() -> Vec<String> {
        vec![
            DetectorKind::Hough.str_lowercase().to_string(),
            DetectorKind::Centroid.str_lowercase().to_string(),
        ]
    }

    pub fn is_valid_detector_kind(detector: &str) -> bool {
        DetectorKind::from_str(detector).is_some()
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.str())
    }
}
