use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use super::{ArrayConfig, ConfigError};

pub const CONFIG_PATH_ENV: &str = "WENNERVIZ_CONFIG";
pub const DEBUG_ENV: &str = "WENNERVIZ_DEBUG";
const DEFAULT_CONFIG_FILE: &str = "wennerviz.json";

/// Rows and columns of the reconstructed raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawResolution")]
pub struct Resolution {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Deserialize)]
struct RawResolution {
    rows: usize,
    cols: usize,
}

impl TryFrom<RawResolution> for Resolution {
    type Error = ConfigError;

    fn try_from(raw: RawResolution) -> Result<Self, Self::Error> {
        if raw.rows == 0 || raw.cols == 0 {
            return Err(ConfigError::EmptyResolution {
                rows: raw.rows,
                cols: raw.cols,
            });
        }
        Ok(Self::new(raw.rows, raw.cols))
    }
}

impl Resolution {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }

    /// `factor` samples per grid cell along each axis.
    pub fn upsampled(array: &ArrayConfig, factor: usize) -> Self {
        let factor = factor.max(1);
        Self::new(array.depth_levels() * factor, array.grid_width() * factor)
    }
}

/// Where readings come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransportTarget {
    /// Replays a text file holding one reading per line.
    Replay {
        path: PathBuf,
        #[serde(default, rename = "loopForever")]
        loop_forever: bool,
    },
    /// Synthetic instrument.
    Simulated {
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default = "default_simulated_every_ticks", rename = "everyTicks")]
        every_ticks: u32,
        #[serde(default, rename = "glitchRate")]
        glitch_rate: f64,
    },
    /// A serial device name such as `/dev/ttyUSB0` or `COM3`.
    Port { name: String },
}

fn default_simulated_every_ticks() -> u32 {
    10
}

impl TransportTarget {
    pub fn identifier(&self) -> String {
        match self {
            TransportTarget::Replay { path, .. } => format!("replay:{}", path.display()),
            TransportTarget::Simulated { .. } => "simulated".to_string(),
            TransportTarget::Port { name } => name.clone(),
        }
    }
}

impl Default for TransportTarget {
    fn default() -> Self {
        TransportTarget::Simulated {
            seed: None,
            every_ticks: default_simulated_every_ticks(),
            glitch_rate: 0.0,
        }
    }
}

/// Everything a streaming session is constructed with. Fixed for the
/// lifetime of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub level_widths: ArrayConfig,
    pub transport: TransportTarget,
    pub baud_rate: u32,
    /// Read timeout of the serial port.
    pub connect_timeout_ms: u64,
    pub tick_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub upsample: usize,
    /// Overrides `upsample` when set.
    pub resolution: Option<Resolution>,
    pub export_dir: Option<PathBuf>,
    #[serde(skip)]
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            level_widths: ArrayConfig::default(),
            transport: TransportTarget::default(),
            baud_rate: 115_200,
            connect_timeout_ms: 1_000,
            tick_interval_ms: 100,
            settle_delay_ms: 2_000,
            upsample: 10,
            resolution: None,
            export_dir: None,
            debug: false,
        }
    }
}

impl SessionConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Loads the file named by `WENNERVIZ_CONFIG` (default `wennerviz.json`)
    /// and applies `WENNERVIZ_DEBUG`.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load(&path)?;
        config.debug = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(config)
    }

    pub fn array(&self) -> &ArrayConfig {
        &self.level_widths
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
            .unwrap_or_else(|| Resolution::upsampled(&self.level_widths, self.upsample))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn with_transport(mut self, transport: TransportTarget) -> Self {
        self.transport = transport;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_follow_instrument_conventions() {
        let config = SessionConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.resolution(), Resolution::new(50, 50));
    }

    #[test]
    fn explicit_resolution_wins_over_upsample() {
        let config = SessionConfig {
            resolution: Some(Resolution::new(20, 30)),
            ..SessionConfig::default()
        };
        assert_eq!(config.resolution(), Resolution::new(20, 30));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.array(), &ArrayConfig::five_level());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(
            tmp.path(),
            r#"{
                "levelWidths": [5, 4, 3, 1],
                "transport": { "kind": "replay", "path": "sweeps.txt", "loopForever": true },
                "tickIntervalMs": 250
            }"#,
        )
        .unwrap();

        let config = SessionConfig::load(tmp.path()).unwrap();
        assert_eq!(config.array(), &ArrayConfig::eight_electrode());
        assert_eq!(
            config.transport,
            TransportTarget::Replay {
                path: PathBuf::from("sweeps.txt"),
                loop_forever: true
            }
        );
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.upsample, 10);
    }

    #[test]
    fn invalid_level_widths_are_reported() {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(tmp.path(), r#"{ "levelWidths": [3, 0] }"#).unwrap();
        let err = SessionConfig::load(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("zero electrode pairs"));
    }

    #[test]
    fn simulated_target_defaults() {
        let target: TransportTarget = serde_json::from_str(r#"{ "kind": "simulated" }"#).unwrap();
        assert_eq!(target, TransportTarget::default());
        assert_eq!(target.identifier(), "simulated");
    }

    #[test]
    fn serial_settings_are_read() {
        let config: SessionConfig = serde_json::from_str(
            r#"{
                "transport": { "kind": "port", "name": "/dev/ttyACM0" },
                "baudRate": 9600,
                "connectTimeoutMs": 250
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.transport,
            TransportTarget::Port {
                name: "/dev/ttyACM0".into()
            }
        );
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn explicit_resolution_is_read_from_file() {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(tmp.path(), r#"{ "resolution": { "rows": 20, "cols": 30 } }"#).unwrap();
        let config = SessionConfig::load(tmp.path()).unwrap();
        assert_eq!(config.resolution(), Resolution::new(20, 30));
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(tmp.path(), r#"{ "resolution": { "rows": 0, "cols": 0 } }"#).unwrap();
        let err = SessionConfig::load(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("at least 1x1"), "{err:#}");

        let partial = serde_json::from_str::<Resolution>(r#"{ "rows": 12, "cols": 0 }"#);
        assert!(partial.is_err());
    }
}
