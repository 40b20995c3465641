//! # Kanidm provisioning connector
//!
//! Declarative provisioning for the [Kanidm](https://kanidm.com) identity
//! server: OAuth2 client, group and person definitions are reconciled
//! against the server's HTTP API with idempotent check/create/patch
//! sequences.
//!
//! ## Design
//!
//! - One [`Session`](session::Session) per reconciliation run: it owns the
//!   HTTP client, the bearer credential and an append-only capture of every
//!   request/response pair, keyed by step name, for diagnostics.
//! - Authentication tries a configured bearer token first, then the
//!   server's three-step password login protocol; both fail closed.
//! - Workflows are strictly sequential single-attempt calls: the first
//!   failing step aborts the run with an error naming that step. There is
//!   no rollback; runs are designed to be repeated, not undone.
//! - Reconcile targets validate their invariants at construction, before
//!   any network call.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use integrations_kanidm::{KanidmClient, KanidmConfig, OauthClientSpec, Scope};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KanidmConfig::builder()
//!         .base_url("https://idm.example.com")
//!         .token(SecretString::new("service-token".into()))
//!         .build()?;
//!     let client = KanidmClient::new(config)?;
//!
//!     let spec = OauthClientSpec::builder()
//!         .name("nextcloud")
//!         .url("https://nextcloud.example.com")
//!         .redirect_url("https://nextcloud.example.com/apps/oauth2/callback")
//!         .scopes([Scope::Openid, Scope::Profile, Scope::Email])
//!         .build()?;
//!
//!     let secret = client.create_oauth_client(spec).await?;
//!     println!("client secret issued: {} chars", secret.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod image;
pub mod services;
pub mod session;
pub mod transport;
pub mod types;

// Always available so integration tests can drive workflows offline.
pub mod mocks;

pub use auth::AuthOutcome;
pub use client::KanidmClient;
pub use config::{KanidmConfig, KanidmConfigBuilder};
pub use error::{
    ArgumentError, AuthError, ConfigurationError, ImageError, KanidmError, KanidmResult,
    ServerError, TransportError,
};
pub use image::{ImageFormat, ImageSpec};
pub use services::{GroupReconciler, OauthClientReconciler, PersonReconciler};
pub use session::{Session, SessionLog, StepResult};
pub use types::{
    ClaimJoin, CustomClaim, GroupSpec, OauthClientSpec, PersonSpec, PrefUsername, Scope, SupScope,
};
