//! Connection configuration for the Kanidm server.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::{ConfigurationError, KanidmError};

/// Default connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("integrations-kanidm/", env!("CARGO_PKG_VERSION"));

/// Connection parameters for a Kanidm server.
///
/// At least one of a bearer token or a username/password pair must be
/// configured; the token path is always attempted first when both are
/// present. Build with [`KanidmConfig::builder`], which validates the
/// invariants before any network call is made.
#[derive(Clone)]
pub struct KanidmConfig {
    /// Base URI of the server, e.g. `https://idm.example.com`.
    pub base_url: Url,
    /// Bearer token for authentication.
    pub token: Option<SecretString>,
    /// Username for the password login protocol.
    pub username: Option<String>,
    /// Password for the password login protocol.
    pub password: Option<SecretString>,
    /// Path to a CA certificate (PEM) to trust.
    pub ca_path: Option<PathBuf>,
    /// Inline CA certificate data (PEM) to trust.
    pub ca_cert_data: Option<String>,
    /// Whether to verify the server certificate chain.
    pub verify_ca: bool,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for KanidmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KanidmConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("ca_path", &self.ca_path)
            .field("verify_ca", &self.verify_ca)
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl KanidmConfig {
    /// Create a new configuration builder.
    pub fn builder() -> KanidmConfigBuilder {
        KanidmConfigBuilder::default()
    }

    /// Validate the configuration invariants.
    pub fn validate(&self) -> Result<(), KanidmError> {
        if self.token.is_none() && (self.username.is_none() || self.password.is_none()) {
            if self.username.is_some() != self.password.is_some() {
                return Err(ConfigurationError::RequiredTogether {
                    first: "username",
                    second: "password",
                }
                .into());
            }
            return Err(ConfigurationError::NoAuthMethod.into());
        }
        if self.token.is_some() && self.username.is_some() {
            return Err(ConfigurationError::MutuallyExclusive {
                first: "token",
                second: "username",
            }
            .into());
        }
        if self.token.is_some() && self.password.is_some() {
            return Err(ConfigurationError::MutuallyExclusive {
                first: "token",
                second: "password",
            }
            .into());
        }
        if self.ca_path.is_some() && self.ca_cert_data.is_some() {
            return Err(ConfigurationError::MutuallyExclusive {
                first: "ca_path",
                second: "ca_cert_data",
            }
            .into());
        }
        Ok(())
    }
}

/// Builder for [`KanidmConfig`].
#[derive(Default)]
pub struct KanidmConfigBuilder {
    base_url: Option<Url>,
    base_url_err: Option<(String, String)>,
    token: Option<SecretString>,
    username: Option<String>,
    password: Option<SecretString>,
    ca_path: Option<PathBuf>,
    ca_cert_data: Option<String>,
    verify_ca: Option<bool>,
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
}

impl KanidmConfigBuilder {
    /// Set the server base URL.
    pub fn base_url(mut self, base_url: &str) -> Self {
        match Url::parse(base_url) {
            Ok(url) => self.base_url = Some(url),
            Err(e) => self.base_url_err = Some((base_url.to_string(), e.to_string())),
        }
        self
    }

    /// Set the bearer token.
    pub fn token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Set the login username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Trust the CA certificate at the given path.
    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// Trust the given inline CA certificate (PEM).
    pub fn ca_cert_data(mut self, pem: impl Into<String>) -> Self {
        self.ca_cert_data = Some(pem.into());
        self
    }

    /// Enable or disable server certificate verification.
    pub fn verify_ca(mut self, verify: bool) -> Self {
        self.verify_ca = Some(verify);
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<KanidmConfig, KanidmError> {
        if let Some((url, message)) = self.base_url_err {
            return Err(ConfigurationError::InvalidBaseUrl { url, message }.into());
        }
        let base_url = self.base_url.ok_or(ConfigurationError::MissingBaseUrl)?;

        let config = KanidmConfig {
            base_url,
            token: self.token,
            username: self.username,
            password: self.password,
            ca_path: self.ca_path,
            ca_cert_data: self.ca_cert_data,
            verify_ca: self.verify_ca.unwrap_or(true),
            connect_timeout: self
                .connect_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)),
            timeout: self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        };
        config.validate()?;
        Ok(config)
    }
}
