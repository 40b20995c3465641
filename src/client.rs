//! Top-level client facade.

use std::sync::Arc;

use crate::config::KanidmConfig;
use crate::error::KanidmResult;
use crate::services::{GroupReconciler, OauthClientReconciler, PersonReconciler};
use crate::transport::HttpTransport;
use crate::types::{GroupSpec, OauthClientSpec, PersonSpec};

/// Entry point for reconciliation runs against one Kanidm server.
///
/// The client validates the connection configuration once and hands out a
/// fresh [`Session`](crate::session::Session)-backed reconciler per run;
/// there is no shared mutable state, so independent runs may be driven
/// concurrently.
pub struct KanidmClient {
    config: Arc<KanidmConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl KanidmClient {
    /// Create a client from a validated configuration.
    pub fn new(config: KanidmConfig) -> KanidmResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport: None,
        })
    }

    /// Create a client that sends through the given transport instead of
    /// building one per run (used by tests).
    pub fn with_transport(
        config: KanidmConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> KanidmResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport: Some(transport),
        })
    }

    /// The connection configuration.
    pub fn config(&self) -> &KanidmConfig {
        &self.config
    }

    /// Build an OAuth2 client reconciler for one run.
    pub fn oauth_client(&self, spec: OauthClientSpec) -> KanidmResult<OauthClientReconciler> {
        match &self.transport {
            Some(transport) => Ok(OauthClientReconciler::with_transport(
                self.config.clone(),
                transport.clone(),
                spec,
            )),
            None => OauthClientReconciler::new(self.config.clone(), spec),
        }
    }

    /// Build a group reconciler for one run.
    pub fn group(&self, spec: GroupSpec) -> KanidmResult<GroupReconciler> {
        match &self.transport {
            Some(transport) => Ok(GroupReconciler::with_transport(
                self.config.clone(),
                transport.clone(),
                spec,
            )),
            None => GroupReconciler::new(self.config.clone(), spec),
        }
    }

    /// Build a person reconciler for one run.
    pub fn person(&self, spec: PersonSpec) -> KanidmResult<PersonReconciler> {
        match &self.transport {
            Some(transport) => Ok(PersonReconciler::with_transport(
                self.config.clone(),
                transport.clone(),
                spec,
            )),
            None => PersonReconciler::new(self.config.clone(), spec),
        }
    }

    /// Reconcile an OAuth2 client and return its basic secret.
    pub async fn create_oauth_client(&self, spec: OauthClientSpec) -> KanidmResult<String> {
        self.oauth_client(spec)?.run().await
    }

    /// Reconcile a group and return its UUID.
    pub async fn create_group(&self, spec: GroupSpec) -> KanidmResult<String> {
        self.group(spec)?.run().await
    }

    /// Reconcile a person and return the credential-reset URL.
    pub async fn create_person(&self, spec: PersonSpec) -> KanidmResult<String> {
        self.person(spec)?.run().await
    }
}
