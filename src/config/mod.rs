use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_SLOW_QUERY_MS: u64 = 100;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── AuthConfig ───────────────────────────────────────────────────────────────

/// Bearer-token verification settings (`[auth]` in config.toml).
///
/// Only the bulk-unpost route consults the gate; without a secret that route
/// denies every request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret used to verify bearer tokens.
    /// None = gate denies all gated requests.
    pub secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { secret: None }
    }
}

// ─── NotifierConfig ───────────────────────────────────────────────────────────

/// Live snapshot stream settings (`[notifier]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Seconds between full-collection snapshots pushed to each observer.
    /// The first snapshot is sent immediately on connect. Default: 5.
    pub snapshot_interval_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
        }
    }
}

// ─── AttachmentConfig ─────────────────────────────────────────────────────────

/// Attachment policy settings (`[attachments]` in config.toml).
///
/// The content-type and extension allow-lists are fixed; only the byte cap
/// is tunable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Per-file upload cap in bytes (inclusive). Default: 10 MiB.
    pub max_file_bytes: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

// ─── ObservabilityConfig ──────────────────────────────────────────────────────

/// Daemon observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: DEFAULT_SLOW_QUERY_MS,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 4310).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,workorderd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Bind address for the HTTP server (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Bearer-token verification (`[auth]`).
    auth: Option<AuthConfig>,
    /// Snapshot stream settings (`[notifier]`).
    notifier: Option<NotifierConfig>,
    /// Attachment policy settings (`[attachments]`).
    attachments: Option<AttachmentConfig>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Bind address for the HTTP server (WORKORDERD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// Bearer-token verification: shared secret for the gated unpost route.
    pub auth: AuthConfig,
    /// Snapshot stream: interval between full-collection pushes.
    pub notifier: NotifierConfig,
    /// Attachment policy: per-file byte cap.
    pub attachments: AttachmentConfig,
    /// Observability: slow query threshold.
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
        auth_secret: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("WORKORDERD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let bind_address = bind_address
            .or(std::env::var("WORKORDERD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let mut auth = toml.auth.unwrap_or_default();
        if let Some(secret) = auth_secret.filter(|s| !s.is_empty()) {
            auth.secret = Some(secret);
        }

        let notifier = toml.notifier.unwrap_or_default();
        let attachments = toml.attachments.unwrap_or_default();
        let observability = toml.observability.unwrap_or_default();

        Self {
            port,
            data_dir,
            log,
            log_format,
            bind_address,
            auth,
            notifier,
            attachments,
            observability,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/workorderd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("workorderd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/workorderd or ~/.local/share/workorderd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("workorderd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("workorderd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\workorderd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("workorderd");
        }
    }
    // Fallback
    PathBuf::from(".workorderd")
}
