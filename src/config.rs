use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub server: ServerConfig,
    pub connectivity: ConnectivityConfig,
    /// Serial link to the LED bus. Absent means frames are discarded.
    pub transport: Option<TransportConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Maximum bytes per socket read
    pub chunk_size: usize,
    /// Report throughput every this many chunks
    pub report_every: u32,
    /// Drop a client that sends nothing for this long. Absent means never.
    pub idle_timeout_ms: Option<u64>,
    pub push: PushMode,
    pub target: StreamTarget,
}

/// When received bytes reach the LED bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    /// Every chunk is written to the bus as soon as it arrives
    #[default]
    Passthrough,
    /// Chunks are assembled in the grid; a full frame is shown once complete
    Frame,
}

/// What the streamed bytes drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTarget {
    #[default]
    Grid,
    /// 1-bit bitmap for the status display
    Display,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// JSON file holding `ssid` and `passwd`
    pub credentials_path: PathBuf,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    /// Leave the access point up after the station joins
    pub keep_ap_active: bool,
    pub ap_address: Ipv4Addr,
    /// Remote address used by the host radio to find its route
    pub route_address: SocketAddr,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            width: 60,
            height: 16,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 1234,
            chunk_size: 1024,
            report_every: 200,
            idle_timeout_ms: None,
            push: PushMode::default(),
            target: StreamTarget::default(),
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        ConnectivityConfig {
            credentials_path: PathBuf::from(".wifi"),
            poll_interval_ms: 500,
            max_polls: 10,
            keep_ap_active: true,
            ap_address: Ipv4Addr::new(192, 168, 4, 1),
            route_address: SocketAddr::from(([8, 8, 8, 8], 80)),
        }
    }
}

impl ConnectivityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.width == 0 || self.grid.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "grid must be at least 1x1, got {}x{}",
                self.grid.width, self.grid.height
            )));
        }
        if self.server.chunk_size == 0 {
            return Err(Error::InvalidConfig("server.chunk_size must be positive".into()));
        }
        if self.server.report_every == 0 {
            return Err(Error::InvalidConfig("server.report_every must be positive".into()));
        }
        Ok(())
    }
}

/// Station network identity and credential
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passwd: String,
}

/// On-disk form of the credential store, where either key may be absent
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredCredentials {
    ssid: Option<String>,
    passwd: Option<String>,
}

impl WifiCredentials {
    /// Read the credential store.
    ///
    /// A missing file, a missing or empty `ssid`, or a missing `passwd` means
    /// no station is configured. An empty `passwd` is an open network.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredCredentials = serde_json::from_str(&data)?;
        match (stored.ssid, stored.passwd) {
            (Some(ssid), Some(passwd)) if !ssid.is_empty() => {
                Ok(Some(WifiCredentials { ssid, passwd }))
            }
            _ => Ok(None),
        }
    }
}
