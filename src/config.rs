use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Optional tunables file, read from the working directory when present.
const CONFIG_FILE: &str = "courier.yaml";

/// Hardening knobs for connection handling. All have defaults; a missing
/// config file or missing keys leave them untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Concurrent connections per available core.
    pub pool_multiplier: usize,
    /// Deadline for any single read on a connection, header or body.
    pub read_timeout_secs: u64,
    /// Cap on the request accumulation buffer.
    pub max_header_bytes: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            pool_multiplier: 4,
            read_timeout_secs: 60,
            max_header_bytes: 64 * 1024,
        }
    }
}

impl Tuning {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Client-side settings. The target port used to be a compiled-in constant;
/// it is configuration now, with the same default value.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Port the client connects to when the target does not name one.
    pub port: u16,
    /// Directory that PUT source paths resolve under.
    pub local_root: PathBuf,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: 18081,
            local_root: PathBuf::from("."),
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Contents of the optional `courier.yaml` tunables file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub tuning: Tuning,
    pub client: ClientConfig,
}

impl FileConfig {
    /// Loads `courier.yaml` from the working directory, falling back to
    /// defaults when the file is absent or malformed.
    pub fn load() -> Self {
        match std::fs::read_to_string(CONFIG_FILE) {
            Ok(text) => match serde_yaml::from_str(&text) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!(%err, "malformed {CONFIG_FILE}, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Errors that stop the server before it ever listens. This is the only
/// process-fatal error class.
#[derive(Debug)]
pub enum StartupError {
    MissingArgs(usize),
    InvalidPort(String),
    InvalidRoot(PathBuf),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::MissingArgs(n) => {
                write!(f, "expected 2 arguments <port> <root-directory>, got {n}")
            }
            StartupError::InvalidPort(p) => write!(f, "invalid port: {p}"),
            StartupError::InvalidRoot(p) => {
                write!(f, "root path {} is missing or not a directory", p.display())
            }
        }
    }
}

impl std::error::Error for StartupError {}

/// Validated server startup configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub root: PathBuf,
    pub tuning: Tuning,
}

impl ServerConfig {
    /// Validates the two positional CLI arguments: a numeric port and an
    /// existing root directory.
    pub fn from_args(args: &[String], tuning: Tuning) -> Result<Self, StartupError> {
        if args.len() != 2 {
            return Err(StartupError::MissingArgs(args.len()));
        }

        let port: u16 = args[0]
            .parse()
            .map_err(|_| StartupError::InvalidPort(args[0].clone()))?;

        let root = PathBuf::from(&args[1]);
        if !root.is_dir() {
            return Err(StartupError::InvalidRoot(root));
        }

        Ok(Self { port, root, tuning })
    }
}
