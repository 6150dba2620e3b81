use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use crate::common::{DetectorConfig, SimulatorConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub signaling_host: String,
    pub signaling_port: u16,
    /// Directory receiving every displayed frame as PNG.
    pub record_to: Option<PathBuf>,
    /// Stop after this many frames; `None` runs until interrupted.
    pub max_frames: Option<u64>,
    pub simulator: SimulatorConfig,
    pub detector: DetectorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signaling_host: "127.0.0.1".to_string(),
            signaling_port: 8080,
            record_to: None,
            max_frames: None,
            simulator: SimulatorConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session config {}", path.display()))?;
        let config: SessionConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid session config {}", path.display()))?;
        config.validate()
            .with_context(|| format!("Invalid session config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.simulator.validate()
    }

    pub fn signaling_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.signaling_host, self.signaling_port);
        addr.parse()
            .with_context(|| format!("Invalid signaling address {}", addr))
    }

    pub fn to_string(&self) -> String {
        format!("Signaling: {}:{}\n\
        Record to: {}\n\
        Max frames: {}\n\
        {}\n\
        {}",
                self.signaling_host, self.signaling_port,
                self.record_to.as_ref().map(|p| p.display().to_string()).unwrap_or("-".to_string()),
                self.max_frames.map(|n| n.to_string()).unwrap_or("unlimited".to_string()),
                self.simulator.to_string(), self.detector.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"signaling_port": 9000, "detector": {"kind": "centroid"}}"#).unwrap();
        assert_eq!(config.signaling_port, 9000);
        assert_eq!(config.signaling_host, "127.0.0.1");
        assert_eq!(config.detector.kind, crate::common::DetectorKind::Centroid);
        assert_eq!(config.detector.param2, 20);
        assert_eq!(config.signaling_addr().unwrap().port(), 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_time_base_fails_validation() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"simulator": {"time_base": {"num": 0, "den": 90000}}}"#).unwrap();
        assert!(config.validate().is_err());
    }
}
