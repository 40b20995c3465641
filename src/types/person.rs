//! Person reconcile target.

use std::time::Duration;

use crate::error::{ArgumentError, KanidmResult};

/// Default credential-reset token lifetime (5 days).
pub const DEFAULT_RESET_TTL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// Declarative description of a person account.
#[derive(Debug, Clone)]
pub struct PersonSpec {
    /// Account name.
    pub name: String,
    /// Optional display name.
    pub display_name: Option<String>,
    /// Lifetime of the credential-reset intent token.
    pub ttl: Duration,
}

impl PersonSpec {
    /// Create a person spec.
    pub fn new(name: impl Into<String>) -> KanidmResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ArgumentError::MissingRequired { field: "name" }.into());
        }
        Ok(Self {
            name,
            display_name: None,
            ttl: DEFAULT_RESET_TTL,
        })
    }

    /// Set the display name.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the credential-reset token lifetime.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}
