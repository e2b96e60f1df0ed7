//! TOML-based configuration for BLETinyFlow nodes.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use tinyflow_core::constants::{
    DEFAULT_CHUNKS_PER_REQUEST, MAX_MTU, MAX_TRANSFER_SIZE, TRANSFER_TIMEOUT_SECS,
};
use tinyflow_core::control::DeviceInfo;
use tinyflow_protocol::receiver::ReceiverConfig;
use tinyflow_protocol::sender::SenderConfig;

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Optional DEVICE_INFO advisory sent by the receiver on connect.
    #[serde(default)]
    pub device: Option<DeviceSection>,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            max_transfer_size: self.node.max_transfer_size,
            chunks_per_request: self.node.chunks_per_request,
            timeout: Duration::from_secs(self.node.timeout_secs),
            device_info: self.device.as_ref().map(DeviceSection::to_device_info),
        }
    }

    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            max_file_size: self.node.max_transfer_size,
            timeout: Duration::from_secs(self.node.timeout_secs),
        }
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// Negotiated MTU for the loopback demo link. Clamped to 512 on use.
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    #[serde(default = "default_max_transfer_size")]
    pub max_transfer_size: u32,
    /// Chunks per CHUNK_REQUEST batch. Defaults to 40; the legacy value
    /// of 20 is accepted.
    #[serde(default = "default_chunks_per_request")]
    pub chunks_per_request: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Demo payload size in bytes.
    #[serde(default = "default_payload_size")]
    pub payload_size: u32,
}

fn default_mtu() -> u16 {
    MAX_MTU
}

fn default_max_transfer_size() -> u32 {
    MAX_TRANSFER_SIZE
}

fn default_chunks_per_request() -> u16 {
    DEFAULT_CHUNKS_PER_REQUEST
}

fn default_timeout_secs() -> u64 {
    TRANSFER_TIMEOUT_SECS
}

fn default_payload_size() -> u32 {
    64 * 1024
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            mtu: default_mtu(),
            max_transfer_size: default_max_transfer_size(),
            chunks_per_request: default_chunks_per_request(),
            timeout_secs: default_timeout_secs(),
            payload_size: default_payload_size(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The `[device]` section: DEVICE_INFO advisory fields.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSection {
    pub device_type: u8,
    #[serde(default)]
    pub battery_percent: u8,
    #[serde(default)]
    pub width: u16,
    #[serde(default)]
    pub height: u16,
}

impl DeviceSection {
    fn to_device_info(&self) -> DeviceInfo {
        DeviceInfo {
            device_type: self.device_type,
            battery_percent: self.battery_percent,
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config.node.mtu, 512);
        assert_eq!(config.node.max_transfer_size, MAX_TRANSFER_SIZE);
        assert_eq!(config.node.chunks_per_request, 40);
        assert_eq!(config.node.timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
        assert!(config.device.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = NodeConfig::parse(
            r#"
            [node]
            mtu = 247
            max_transfer_size = 524288
            chunks_per_request = 20
            timeout_secs = 10
            payload_size = 4096

            [logging]
            level = "debug"

            [device]
            device_type = 2
            battery_percent = 93
            width = 296
            height = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.node.mtu, 247);
        assert_eq!(config.node.chunks_per_request, 20);
        assert_eq!(config.logging.level, "debug");

        let rx = config.receiver_config();
        assert_eq!(rx.max_transfer_size, 524288);
        assert_eq!(rx.timeout, Duration::from_secs(10));
        let info = rx.device_info.unwrap();
        assert_eq!(info.battery_percent, 93);
        assert_eq!(info.width, 296);

        let tx = config.sender_config();
        assert_eq!(tx.max_file_size, 524288);
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(NodeConfig::parse("[node\nmtu = ").is_err());
    }
}
