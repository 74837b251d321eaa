use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use meet_link::{ConnectionEndpoint, ReconnectPolicy};
use meet_model::{JudgePanel, JudgeSeat};

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    port = 5050
//
//   env var:         MEET_SERVER__PORT=5050   (double underscore = nesting)
//
//   (single underscore stays within field names: MEET_LINK__MAX_DELAY_MS)

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub judges: JudgesFileConfig,
    #[serde(default)]
    pub link: LinkFileConfig,
    #[serde(default)]
    pub meet: MeetFileConfig,
}

/// Lives under `[server]` in config.toml.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// PIN → seat (1, 2 or 3). Lives under `[judges.pins]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JudgesFileConfig {
    /// Not serialized into the defaults layer, so a configured table
    /// replaces the built-in PINs instead of merging with them.
    #[serde(default = "default_pins", skip_serializing)]
    pub pins: BTreeMap<String, JudgeSeat>,
}

impl Default for JudgesFileConfig {
    fn default() -> Self {
        Self {
            pins: default_pins(),
        }
    }
}

/// Client side of the channel, used by `meetd watch` (lives under `[link]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkFileConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Give up after this many consecutive failures. Unset retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for LinkFileConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
            max_attempts: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Lives under `[meet]`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeetFileConfig {
    /// Date ages are computed on. Unset means today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

fn default_pins() -> BTreeMap<String, JudgeSeat> {
    JudgePanel::default().pins().clone()
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> f64 {
    0.2
}
fn default_connect_timeout_secs() -> u64 {
    10
}

/// Build a figment that layers: defaults → config.toml → MEET_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `MEET_SERVER__PORT=5050`  →  `server.port = 5050`
///   `MEET_JUDGES__PINS__4444=1`  →  `judges.pins."4444" = 1`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("MEET_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// CLI flags win over the file.
    pub fn from_file(fc: &ServerFileConfig, host: Option<String>, port: Option<u16>) -> Self {
        Self {
            host: host
                .or_else(|| fc.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port.or(fc.port).unwrap_or(DEFAULT_PORT),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn judge_panel(fc: &JudgesFileConfig) -> JudgePanel {
    JudgePanel::new(fc.pins.clone())
}

pub fn reconnect_policy(fc: &LinkFileConfig) -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(fc.initial_delay_ms),
        max_delay: Duration::from_millis(fc.max_delay_ms),
        multiplier: fc.multiplier,
        jitter: fc.jitter,
        max_attempts: fc.max_attempts,
        connect_timeout: Duration::from_secs(fc.connect_timeout_secs),
    }
}

/// Resolve the endpoint once: CLI flag, then `[link] endpoint`, then the
/// local server's own channel.
pub fn resolve_endpoint(
    cli: Option<&str>,
    fc: &FileConfig,
) -> std::result::Result<ConnectionEndpoint, meet_link::LinkError> {
    match cli.or(fc.link.endpoint.as_deref()) {
        Some(raw) => ConnectionEndpoint::parse(raw),
        None => {
            let server = ServerConfig::from_file(&fc.server, None, None);
            let host = match server.host.as_str() {
                "0.0.0.0" | "::" => DEFAULT_HOST,
                other => other,
            };
            ConnectionEndpoint::parse(&format!("ws://{}:{}/ws", host, server.port))
        }
    }
}

// =============================================================================
// Directory layout config (not tunable via figment — derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct MeetConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub exports_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl MeetConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".meetd"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let exports_dir = data_dir.join("exports");
        std::fs::create_dir_all(&exports_dir)
            .with_context(|| format!("Failed to create exports directory: {:?}", exports_dir))?;

        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        let db_path = data_dir.join("meetd.db");

        info!("Data directory: {}", data_dir.display());

        Ok(Self {
            data_dir,
            db_path,
            exports_dir,
            logs_dir,
        })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path.display())
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_file_config_defaults() {
        let fc = FileConfig::default();
        assert!(fc.server.host.is_none());
        assert!(fc.server.port.is_none());
        assert_eq!(fc.judges.pins.len(), 3);
        assert_eq!(fc.judges.pins.get("2222"), Some(&JudgeSeat::Two));
        assert_eq!(fc.link.initial_delay_ms, 500);
        assert_eq!(fc.link.max_delay_ms, 30_000);
        assert!(fc.link.max_attempts.is_none());
        assert!(fc.meet.date.is_none());
    }

    #[test]
    fn test_reconnect_policy_from_file() {
        let fc = LinkFileConfig {
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            max_attempts: Some(5),
            ..Default::default()
        };
        let policy = reconnect_policy(&fc);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(policy.max_attempts, Some(5));
        assert_eq!(policy.connect_timeout, Duration::from_secs(10));
    }

    // ── ServerConfig::from_file ─────────────────────────────────────────

    #[test]
    fn test_server_config_cli_wins() {
        let fc = ServerFileConfig {
            host: Some("0.0.0.0".into()),
            port: Some(6000),
        };
        let sc = ServerConfig::from_file(&fc, None, Some(7000));
        assert_eq!(sc.host, "0.0.0.0");
        assert_eq!(sc.port, 7000);
        assert_eq!(sc.bind_addr(), "0.0.0.0:7000");

        let sc = ServerConfig::from_file(&ServerFileConfig::default(), None, None);
        assert_eq!(sc.bind_addr(), "127.0.0.1:5000");
    }

    // ── endpoint resolution ─────────────────────────────────────────────

    #[test]
    fn test_endpoint_defaults_to_local_server() {
        let mut fc = FileConfig::default();
        fc.server.host = Some("0.0.0.0".into());
        fc.server.port = Some(5050);
        let ep = resolve_endpoint(None, &fc).unwrap();
        assert_eq!(ep.as_str(), "ws://127.0.0.1:5050/ws");
    }

    #[test]
    fn test_endpoint_cli_over_file() {
        let mut fc = FileConfig::default();
        fc.link.endpoint = Some("wss://meet.example.org/ws".into());
        let ep = resolve_endpoint(None, &fc).unwrap();
        assert!(ep.is_secure());

        let ep = resolve_endpoint(Some("http://10.0.0.2:5000"), &fc).unwrap();
        assert_eq!(ep.as_str(), "ws://10.0.0.2:5000/ws");

        assert!(resolve_endpoint(Some("ftp://nope"), &fc).is_err());
    }

    // ── figment layering ────────────────────────────────────────────────

    #[test]
    fn test_load_config_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
[server]
port = 6060

[judges.pins]
"4444" = 1
"5555" = 2
"6666" = 3

[meet]
date = "2025-03-15"
"#,
        )
        .unwrap();

        let fc: FileConfig = load_config(dir.path()).extract().unwrap();
        assert_eq!(fc.server.port, Some(6060));
        assert_eq!(fc.judges.pins.get("5555"), Some(&JudgeSeat::Two));
        assert_eq!(fc.judges.pins.len(), 3);
        assert!(!fc.judges.pins.contains_key("1111"));
        assert_eq!(fc.meet.date, NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(fc.link.max_delay_ms, 30_000);
    }

    #[test]
    fn test_load_config_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let fc: FileConfig = load_config(dir.path()).extract().unwrap();
        assert_eq!(judge_panel(&fc.judges).pins().len(), 3);
    }

    // ── MeetConfig ──────────────────────────────────────────────────────

    #[test]
    fn test_meet_config_with_custom_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = MeetConfig::new(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert!(config.exports_dir.exists());
        assert!(config.logs_dir.exists());
        assert_eq!(config.db_path, dir.path().join("meetd.db"));
        assert!(config.db_url().starts_with("sqlite://"));
        assert!(config.db_url().ends_with("?mode=rwc"));
        assert_eq!(config.config_toml_path(), dir.path().join("config.toml"));
    }
}
