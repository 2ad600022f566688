use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors are fatal: they abort the run before any dispatch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file or environment")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Credentials and endpoint of the CVAT server
#[derive(Clone)]
pub struct CvatCredentials {
    pub host: Url,
    pub username: String,
    pub password: String,
    /// Organization slug sent as `X-Organization`, if any
    pub organization: Option<String>,
}

// Hand-written so the password never ends up in a log line.
impl std::fmt::Debug for CvatCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CvatCredentials")
            .field("host", &self.host.as_str())
            .field("username", &self.username)
            .field("password", &"********")
            .field("organization", &self.organization)
            .finish()
    }
}

/// Tuning knobs that do not require credentials
#[derive(Clone, Debug)]
pub struct RunSettings {
    /// Size of the worker pool
    /// Default: number of available processing units
    pub num_workers: usize,

    /// Pause a worker takes after each remote call
    /// Default: 500ms
    pub request_delay: Duration,

    /// Per-request timeout of the HTTP client
    /// Default: 60s
    pub request_timeout: Duration,

    /// Whether task creation waits for CVAT to finish importing the remote image
    /// Default: true
    pub wait_for_import: bool,

    /// Interval between import status polls
    /// Default: 1000ms
    pub import_poll_interval: Duration,

    /// Upper bound on the wait for one import
    /// Default: 300s
    pub import_timeout: Duration,

    /// Directory for run logs and failure reports
    /// Default: logs
    pub log_dir: PathBuf,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: CvatCredentials,
    pub settings: RunSettings,
}

impl Config {
    /// Build the configuration from a key lookup, usually the process environment
    ///
    /// Required variables:
    /// - CVAT_HOST: base URL of the CVAT server (e.g. https://app.cvat.ai/)
    /// - CVAT_USERNAME
    /// - CVAT_PASSWORD
    ///
    /// Optional variables:
    /// - CVAT_ORG: organization slug
    /// - NUM_WORKERS, REQUEST_DELAY_MS, REQUEST_TIMEOUT_SECS, CVAT_WAIT_FOR_IMPORT,
    ///   IMPORT_POLL_INTERVAL_MS, IMPORT_TIMEOUT_SECS, LOG_DIR (see [`RunSettings`])
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = CvatCredentials::from_lookup(&lookup)?;
        let settings = RunSettings::from_lookup(&lookup)?;
        Ok(Config {
            credentials,
            settings,
        })
    }
}

impl CvatCredentials {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = required(lookup, "CVAT_HOST")?;
        let host = Url::parse(&host).map_err(|e| ConfigError::Invalid {
            name: "CVAT_HOST",
            reason: e.to_string(),
        })?;
        if !matches!(host.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "CVAT_HOST",
                reason: format!("unsupported scheme '{}'", host.scheme()),
            });
        }

        let username = required(lookup, "CVAT_USERNAME")?;
        let password = required(lookup, "CVAT_PASSWORD")?;
        let organization = non_empty(lookup, "CVAT_ORG");

        Ok(CvatCredentials {
            host,
            username,
            password,
            organization,
        })
    }
}

impl RunSettings {
    /// Settings alone, for runs that need no credentials
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let num_workers = parsed(lookup, "NUM_WORKERS")?.unwrap_or_else(default_workers);
        if num_workers == 0 {
            return Err(ConfigError::Invalid {
                name: "NUM_WORKERS",
                reason: "must be at least 1".to_string(),
            });
        }

        let wait_for_import = match non_empty(lookup, "CVAT_WAIT_FOR_IMPORT") {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "CVAT_WAIT_FOR_IMPORT",
                reason: format!("expected true/false, got '{}'", raw),
            })?,
        };

        Ok(RunSettings {
            num_workers,
            request_delay: Duration::from_millis(
                parsed(lookup, "REQUEST_DELAY_MS")?.unwrap_or(500),
            ),
            request_timeout: Duration::from_secs(
                parsed(lookup, "REQUEST_TIMEOUT_SECS")?.unwrap_or(60),
            ),
            wait_for_import,
            import_poll_interval: Duration::from_millis(
                parsed(lookup, "IMPORT_POLL_INTERVAL_MS")?.unwrap_or(1000),
            ),
            import_timeout: Duration::from_secs(
                parsed(lookup, "IMPORT_TIMEOUT_SECS")?.unwrap_or(300),
            ),
            log_dir: non_empty(lookup, "LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        })
    }
}

/// Number of available processing units, falling back to one
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name).ok_or(ConfigError::Missing(name))
}

fn parsed<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, name) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("'{}': {}", raw, e),
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
