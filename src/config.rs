//! Server settings loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The master switch is
//! `START_HOOKS_SERVER`; when it is off the whole server is dormant and
//! neither the generated artifact nor the internal client factory is ever
//! touched.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::artifact::ConfigError;

/// Host the listener binds to. Only the gateway engine on the same machine
/// is expected to talk to this server.
pub const LISTEN_HOST: &str = "127.0.0.1";

/// Default listener port when `HOOKS_SERVER_PORT` is not set.
pub const DEFAULT_PORT: u16 = 9992;

/// Default base URL for the internal operations client.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:9991";

/// Runtime environment, selected by `GATEWAY_ENV`.
///
/// Production enables graceful shutdown; development skips it to keep
/// iterative restarts fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Fast restarts, no signal handling.
    Development,
    /// Graceful drain on SIGINT/SIGTERM.
    Production,
}

/// Settings for an enabled hooks server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Working directory containing the `generated/` artifact directory.
    pub working_dir: PathBuf,
    /// Listener port. Host is always [`LISTEN_HOST`].
    pub port: u16,
    /// Runtime environment.
    pub environment: Environment,
    /// Base URL the internal client calls gateway operations on.
    pub gateway_url: String,
}

impl ServerSettings {
    /// Socket address the listener binds to.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((std::net::Ipv4Addr::LOCALHOST, self.port))
    }
}

/// Whether the hooks server runs at all, computed once at entry.
///
/// Downstream components only ever see the enabled variant's
/// [`ServerSettings`]; there are no scattered flag checks past this point.
#[derive(Debug, Clone)]
pub enum ServerMode {
    /// `START_HOOKS_SERVER` is off; the process exits without loading
    /// anything.
    Disabled,
    /// The server starts with these settings.
    Enabled(ServerSettings),
}

impl ServerMode {
    /// Computes the server mode from the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkingDirMissing`] if the server is enabled
    /// but `GATEWAY_DIR` is unset. Detected before any file I/O.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Computes the server mode from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkingDirMissing`] if the server is enabled
    /// but `GATEWAY_DIR` is unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if !parse_bool(lookup("START_HOOKS_SERVER").as_deref(), false) {
            return Ok(Self::Disabled);
        }

        let working_dir = lookup("GATEWAY_DIR")
            .map(PathBuf::from)
            .ok_or(ConfigError::WorkingDirMissing)?;

        let port = lookup("HOOKS_SERVER_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let environment = match lookup("GATEWAY_ENV").as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        let gateway_url =
            lookup("GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());

        Ok(Self::Enabled(ServerSettings {
            working_dir,
            port,
            environment,
            gateway_url,
        }))
    }
}

/// Default tracing filter directive, taken from `LOG_LEVEL` (`RUST_LOG`
/// still wins when set, via `EnvFilter::try_from_default_env`).
#[must_use]
pub fn log_filter() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Parses a boolean flag. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive for the words). Returns `default` otherwise.
fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}
