use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::RelayError;

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "transcript-relay.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Acquisition pipeline settings
    pub transcripts: TranscriptConfig,

    /// Direct caption API strategy
    pub caption_api: CaptionApiConfig,

    /// yt-dlp strategy
    pub yt_dlp: YtDlpConfig,

    /// Manual upload handling
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on (overridden by `PORT`)
    pub port: u16,

    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Caption language requested from every strategy
    pub language: String,

    /// Deadline for a single strategy attempt
    pub strategy_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionApiConfig {
    /// Origin serving the watch page and innertube API
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// yt-dlp executable name or path
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// How long a failed video id stays eligible for a correlated upload
    pub window_secs: u64,

    /// Reject uploads that do not name the video they complete
    pub require_video_id: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5002,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            strategy_timeout_secs: 60,
        }
    }
}

impl Default for CaptionApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
        }
    }
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            path: "yt-dlp".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            require_video_id: false,
        }
    }
}

impl Config {
    /// Load configuration from `explicit`, the usual locations, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::discover(),
        };

        let config = match config_path {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                let content =
                    fs_err::read_to_string(&path).context("Failed to read config file")?;
                Self::from_yaml(&content)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Write the default configuration unless a file already exists
    pub fn init(explicit: Option<&Path>) -> Result<PathBuf> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if config_path.exists() {
            anyhow::bail!("Config file already exists: {}", config_path.display());
        }

        Self::default().save(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// First existing config file: working directory, then user config dir
    fn discover() -> Option<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        Self::default_path().ok().filter(|path| path.exists())
    }

    /// Per-user configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-relay").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.transcripts.language.trim().is_empty() {
            return Err(RelayError::InvalidConfig("transcripts.language must not be empty".into()).into());
        }

        if self.transcripts.strategy_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "transcripts.strategy_timeout_secs must be greater than zero".into(),
            )
            .into());
        }

        if self.yt_dlp.path.trim().is_empty() {
            return Err(RelayError::InvalidConfig("yt_dlp.path must not be empty".into()).into());
        }

        self.caption_api_url()?;
        self.server
            .host
            .parse::<IpAddr>()
            .map_err(|_| RelayError::InvalidConfig(format!("server.host is not an IP address: {}", self.server.host)))?;

        Ok(())
    }

    /// Parsed caption API origin
    pub fn caption_api_url(&self) -> Result<Url> {
        Url::parse(&self.caption_api.base_url).map_err(|e| {
            RelayError::InvalidConfig(format!(
                "caption_api.base_url is not a valid URL ({}): {}",
                e, self.caption_api.base_url
            ))
            .into()
        })
    }

    /// Listen address, with command line / environment overrides applied
    pub fn socket_addr(&self, host: Option<&str>, port: Option<u16>) -> Result<SocketAddr> {
        let host = host.unwrap_or(&self.server.host);
        let ip = host
            .parse::<IpAddr>()
            .with_context(|| format!("expected a valid IPv4 or IPv6 address, got {}", host))?;

        Ok(SocketAddr::new(ip, port.unwrap_or(self.server.port)))
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_secs(self.transcripts.strategy_timeout_secs)
    }

    pub fn upload_window(&self) -> Duration {
        Duration::from_secs(self.uploads.window_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen Address: {}:{}", self.server.host, self.server.port);
        println!("  Max Upload Size: {} bytes", self.server.max_upload_bytes);
        println!("  Language: {}", self.transcripts.language);
        println!("  Strategy Timeout: {}s", self.transcripts.strategy_timeout_secs);
        println!("  Caption API: {}", self.caption_api.base_url);
        println!("  yt-dlp: {}", self.yt_dlp.path);
        println!("  Upload Window: {}s", self.uploads.window_secs);
        println!("  Require video_id On Upload: {}", self.uploads.require_video_id);
    }
}
