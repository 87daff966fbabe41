//! Server configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables
//! (`DKR_*`) → defaults. The built [`ServerConfig`] is immutable and shared by
//! reference across the transport, session store, and tool catalog.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default bind host.
const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind port.
const DEFAULT_PORT: u16 = 3000;
/// Default HTTP endpoint path.
const DEFAULT_ENDPOINT: &str = "/mcp";
/// Default session idle timeout in seconds.
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 1800;
/// Default background sweep interval in seconds.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
/// Default cap on search result counts (upper bound for the `limit` argument).
const DEFAULT_MAX_RESULTS: usize = 50;

/// TLS key material for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    /// PEM certificate chain path.
    pub cert: PathBuf,
    /// PEM private key path.
    pub key: PathBuf,
}

/// Immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind the HTTP listener to.
    pub host: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// Endpoint path serving the protocol (everything else is 404).
    pub endpoint: String,
    /// Idle timeout after which a session expires.
    pub session_timeout: Duration,
    /// Interval between background expiry sweeps.
    pub sweep_interval: Duration,
    /// Origin allow-list. Empty means any origin is accepted (development
    /// mode). Entries match case-sensitively; `*` matches everything and a
    /// trailing `*` matches by prefix.
    pub allowed_origins: Vec<String>,
    /// Upper bound for the search tool's `limit` argument.
    pub max_results: usize,
    /// Optional TLS material. When set, the HTTP transport serves HTTPS.
    pub tls: Option<TlsMaterial>,
}

impl ServerConfig {
    /// Creates a new builder for `ServerConfig`.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a resolved value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }

    /// Returns the socket address string the listener binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            allowed_origins: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            tls: None,
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    endpoint: Option<String>,
    session_timeout: Option<Duration>,
    sweep_interval: Option<Duration>,
    allowed_origins: Option<Vec<String>>,
    max_results: Option<usize>,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
}

impl ServerConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.host.is_none() {
            self.host = std::env::var("DKR_HOST").ok();
        }
        if self.port.is_none() {
            self.port = std::env::var("DKR_PORT").ok().and_then(|v| v.parse().ok());
        }
        if self.endpoint.is_none() {
            self.endpoint = std::env::var("DKR_ENDPOINT").ok();
        }
        if self.session_timeout.is_none() {
            self.session_timeout = std::env::var("DKR_SESSION_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        if self.sweep_interval.is_none() {
            self.sweep_interval = std::env::var("DKR_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        if self.allowed_origins.is_none() {
            self.allowed_origins = std::env::var("DKR_ALLOWED_ORIGINS").ok().map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            });
        }
        if self.max_results.is_none() {
            self.max_results = std::env::var("DKR_MAX_RESULTS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        self
    }

    /// Sets the bind host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the bind port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the endpoint path.
    #[must_use]
    pub fn endpoint(mut self, path: impl Into<String>) -> Self {
        self.endpoint = Some(path.into());
        self
    }

    /// Sets the session idle timeout.
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the background sweep interval.
    #[must_use]
    pub const fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Sets the origin allow-list.
    #[must_use]
    pub fn allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    /// Sets the upper bound for the search tool's `limit` argument.
    #[must_use]
    pub const fn max_results(mut self, n: usize) -> Self {
        self.max_results = Some(n);
        self
    }

    /// Sets the TLS certificate path.
    #[must_use]
    pub fn tls_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_cert = Some(path.into());
        self
    }

    /// Sets the TLS private key path.
    #[must_use]
    pub fn tls_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_key = Some(path.into());
        self
    }

    /// Builds the [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the endpoint path is not absolute, the
    /// session timeout is zero, an allowed-origin entry is empty, or only
    /// one half of the TLS material was provided.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let endpoint = self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        if !endpoint.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint(endpoint));
        }

        let session_timeout = self
            .session_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS));
        if session_timeout.is_zero() {
            return Err(ConfigError::ZeroSessionTimeout);
        }

        let allowed_origins = self.allowed_origins.unwrap_or_default();
        if allowed_origins.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyOrigin);
        }

        let tls = match (self.tls_cert, self.tls_key) {
            (Some(cert), Some(key)) => Some(TlsMaterial { cert, key }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        Ok(ServerConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            endpoint,
            session_timeout,
            sweep_interval: self
                .sweep_interval
                .unwrap_or(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)),
            allowed_origins,
            max_results: self.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            tls,
        })
    }
}
