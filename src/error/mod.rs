//! Error taxonomy for the Kanidm connector.
//!
//! The root [`KanidmError`] groups failures by family: configuration and
//! argument errors are raised at the boundary before any network call,
//! transport errors are distinct from logical (non-2xx) server failures,
//! and server failures name the reconciliation step that produced them.

use thiserror::Error;

/// Root error type for the connector.
#[derive(Error, Debug)]
pub enum KanidmError {
    /// Connection configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A reconcile target failed validation.
    #[error("argument error: {0}")]
    Argument(#[from] ArgumentError),

    /// Neither the token nor the password path produced a usable session.
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthError),

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A workflow step received a failing response from the server.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// An image could not be resolved for upload.
    #[error("image error: {0}")]
    Image(#[from] ImageError),
}

/// Result type for connector operations.
pub type KanidmResult<T> = Result<T, KanidmError>;

/// Invalid connection configuration, detected before any network call.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// The base URL did not parse.
    #[error("invalid base URL {url:?}: {message}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Parser detail.
        message: String,
    },

    /// No base URL configured.
    #[error("base URL is required")]
    MissingBaseUrl,

    /// Neither a token nor a username/password pair was configured.
    #[error("no authentication method specified: provide a token or a username and password")]
    NoAuthMethod,

    /// Two options that cannot be combined were both set.
    #[error("{first} is mutually exclusive with {second}")]
    MutuallyExclusive {
        /// First option name.
        first: &'static str,
        /// Second option name.
        second: &'static str,
    },

    /// Two options that must be set together were not.
    #[error("{first} and {second} must be specified together")]
    RequiredTogether {
        /// First option name.
        first: &'static str,
        /// Second option name.
        second: &'static str,
    },

    /// CA trust material could not be loaded.
    #[error("unable to load CA trust material: {message}")]
    CaTrust {
        /// Loader detail.
        message: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("unable to build HTTP client: {message}")]
    HttpClient {
        /// Builder detail.
        message: String,
    },
}

/// A reconcile target failed validation at construction time.
#[derive(Error, Debug)]
pub enum ArgumentError {
    /// A required field was absent or empty.
    #[error("{field} is required")]
    MissingRequired {
        /// The missing field.
        field: &'static str,
    },

    /// Public clients must use PKCE.
    #[error("public clients must use PKCE")]
    PublicClientWithoutPkce,

    /// Localhost redirects are only allowed for public clients.
    #[error("local redirects are only allowed for public clients")]
    LocalRedirectRequiresPublic,

    /// Localhost redirects require strict redirect validation.
    #[error("local redirects require strict redirect validation")]
    LocalRedirectRequiresStrictRedirect,

    /// A scope value outside the supported set.
    #[error("invalid scope {scope:?}")]
    InvalidScope {
        /// The rejected scope.
        scope: String,
    },

    /// An unrecognised image format name.
    #[error("invalid image format {format:?}")]
    InvalidImageFormat {
        /// The rejected format name.
        format: String,
    },
}

/// Authentication against the server failed.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No token and no username/password pair configured.
    #[error("no authentication method specified")]
    NoMethodConfigured,

    /// A bearer credential was required but none was attached.
    #[error("no bearer credential attached to the session")]
    MissingBearer,

    /// A login step returned a response shape the protocol does not allow.
    #[error("login step {step} expected {expected}, server answered with {state}")]
    Protocol {
        /// The login step that failed (`login_init`, `login_begin`, `login_send`).
        step: &'static str,
        /// The state the protocol requires at this step.
        expected: &'static str,
        /// What the server actually sent.
        state: String,
    },

    /// Both authentication paths were exhausted.
    #[error("authentication failed: {detail}")]
    Rejected {
        /// Status/reason/body of the last failing call.
        detail: String,
    },
}

/// The request failed below the HTTP layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The configured timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// TLS negotiation failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    Request(String),
}

/// A workflow step received a failing response.
///
/// Carries the step name used to index the session log plus the HTTP
/// status, reason and body of the failing call, so the exact request is
/// inspectable without re-running.
#[derive(Error, Debug)]
#[error("{detail}. Got {status} {reason} {body}")]
pub struct ServerError {
    /// The step name recorded in the session log.
    pub step: String,
    /// Human description of what the step was trying to do.
    pub detail: String,
    /// HTTP status of the failing response.
    pub status: u16,
    /// HTTP reason phrase.
    pub reason: String,
    /// Response body, raw.
    pub body: String,
}

/// An image could not be resolved to uploadable bytes.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Download of a URL source failed.
    #[error("failed to download image from {src}: {detail}")]
    Download {
        /// The image source URL.
        src: String,
        /// Status or transport detail.
        detail: String,
    },

    /// Local file could not be read or written.
    #[error("image I/O failure for {src}: {message}")]
    Io {
        /// The image source.
        src: String,
        /// OS detail.
        message: String,
    },

    /// All three inference passes failed to determine a format.
    #[error("unknown image format for {src}")]
    UnknownFormat {
        /// The image source.
        src: String,
    },
}
