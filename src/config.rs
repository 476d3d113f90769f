//! Bridge configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty file
//! (or no file) yields a working loopback setup.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::audio::AudioFormat;
use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub network: NetworkConfig,
    pub jitter: JitterConfig,
    pub audio: AudioConfig,
    pub monitor: MonitorConfig,
}

/// RTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: IpAddr,
    /// Local RTP port, 0 for an ephemeral port
    pub rtp_port: u16,
    /// Remote RTP endpoint. When unset the first valid inbound datagram's
    /// source address is used.
    pub remote: Option<SocketAddr>,
    pub recv_buffer_size: usize,
    pub send_buffer_size: usize,
    pub max_packet_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rtp_port: DEFAULT_RTP_PORT,
            remote: None,
            recv_buffer_size: 256 * 1024,
            send_buffer_size: 256 * 1024,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.rtp_port)
    }
}

/// Jitter buffer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    /// Distance (in sequence numbers) from the last played packet at which a
    /// hole is declared lost
    pub skip_threshold: u16,
    /// Maximum packets held
    pub capacity: usize,
    /// Packets to collect before playout starts
    pub prefill_packets: usize,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
            capacity: DEFAULT_JITTER_CAPACITY,
            prefill_packets: DEFAULT_PREFILL_PACKETS,
        }
    }
}

/// Media settings agreed at session setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub format: AudioFormat,
    /// Frame duration, also the playout clock period
    pub frame_ms: u32,
    /// Payload type stamped on outbound packets
    pub payload_type: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            frame_ms: DEFAULT_FRAME_MS,
            payload_type: DEFAULT_PAYLOAD_TYPE,
        }
    }
}

/// Monitoring HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub bind_address: IpAddr,
    pub http_port: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: DEFAULT_MONITOR_PORT,
        }
    }
}

impl MonitorConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }
}

impl BridgeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Self::from_toml(&text)
    }

    /// Load `path` if given, else the per-user config file if it exists,
    /// else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config dir>/rtp-media-bridge/bridge.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rtp-media-bridge")
            .map(|dirs| dirs.config_dir().join("bridge.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.jitter.skip_threshold == 0 {
            return Err(Error::Config("jitter.skip_threshold must be at least 1".into()));
        }
        if self.jitter.capacity == 0 {
            return Err(Error::Config("jitter.capacity must be at least 1".into()));
        }
        if self.jitter.prefill_packets > self.jitter.capacity {
            return Err(Error::Config(format!(
                "jitter.prefill_packets ({}) exceeds jitter.capacity ({})",
                self.jitter.prefill_packets, self.jitter.capacity
            )));
        }
        if !(1..=MAX_FRAME_MS).contains(&self.audio.frame_ms) {
            return Err(Error::Config(format!(
                "audio.frame_ms must be between 1 and {}, got {}",
                MAX_FRAME_MS, self.audio.frame_ms
            )));
        }
        if self.audio.payload_type > 127 {
            return Err(Error::Config(format!(
                "audio.payload_type must be at most 127, got {}",
                self.audio.payload_type
            )));
        }
        if self.network.max_packet_size < crate::protocol::RTP_HEADER_LEN {
            return Err(Error::Config(format!(
                "network.max_packet_size must hold an RTP header, got {}",
                self.network.max_packet_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.network.rtp_port, DEFAULT_RTP_PORT);
        assert_eq!(config.audio.format, AudioFormat::fullband());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(config.jitter.skip_threshold, DEFAULT_SKIP_THRESHOLD);
        assert!(config.network.remote.is_none());
    }

    #[test]
    fn test_partial_document() {
        let config = BridgeConfig::from_toml(
            r#"
            [network]
            rtp_port = 40000
            remote = "10.0.0.5:30000"

            [jitter]
            skip_threshold = 4

            [audio]
            frame_ms = 30
            payload_type = 0
            format = { sample_rate = 8000, channels = 1, bit_depth = 16 }
            "#,
        )
        .unwrap();

        assert_eq!(config.network.rtp_port, 40000);
        assert_eq!(config.network.remote, Some("10.0.0.5:30000".parse().unwrap()));
        assert_eq!(config.jitter.skip_threshold, 4);
        assert_eq!(config.jitter.capacity, DEFAULT_JITTER_CAPACITY);
        assert_eq!(config.audio.format, AudioFormat::narrowband());
        assert_eq!(config.audio.frame_ms, 30);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(BridgeConfig::from_toml("[jitter]\nskip_threshold = 0").is_err());
        assert!(BridgeConfig::from_toml("[audio]\nframe_ms = 0").is_err());
        assert!(BridgeConfig::from_toml("[audio]\npayload_type = 200").is_err());
        assert!(BridgeConfig::from_toml("[network]\nmax_packet_size = 4").is_err());
        assert!(BridgeConfig::from_toml(
            "[audio]\nformat = { sample_rate = 8000, channels = 1, bit_depth = 7 }"
        )
        .is_err());
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config("[jitter]\nskip_threshold = 6\n\n[monitor]\nenabled = false\n");

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.jitter.skip_threshold, 6);
        assert!(!config.monitor.enabled);
        assert_eq!(config.audio.frame_ms, DEFAULT_FRAME_MS);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_load_invalid_file() {
        let file = write_config("[audio]\nframe_ms = 500\n");
        assert!(matches!(BridgeConfig::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_or_default_prefers_explicit_path() {
        let file = write_config("[network]\nrtp_port = 41000\n");
        let config = BridgeConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.network.rtp_port, 41000);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(BridgeConfig::load_or_default(Some(missing.as_path())).is_err());
    }

    #[test]
    fn test_default_path_location() {
        if let Some(path) = BridgeConfig::default_path() {
            assert!(path.ends_with("bridge.toml"));
            assert!(path.to_string_lossy().contains("rtp-media-bridge"));
        }
    }
}
