//! Person reconciliation.

use std::sync::Arc;

use tracing::info;

use super::{attrs_body, establish, extract_uuid, step_error};
use crate::config::KanidmConfig;
use crate::error::KanidmResult;
use crate::session::Session;
use crate::transport::HttpTransport;
use crate::types::{PersonSpec, ATTR_DISPLAYNAME, ATTR_NAME};

/// Drives a single person account to its declared state.
pub struct PersonReconciler {
    session: Session,
    spec: PersonSpec,
}

impl PersonReconciler {
    /// Create a reconciler with its own per-run HTTP client.
    pub fn new(config: Arc<KanidmConfig>, spec: PersonSpec) -> KanidmResult<Self> {
        Ok(Self {
            session: Session::new(config)?,
            spec,
        })
    }

    /// Create a reconciler over an injected transport (used by tests).
    pub fn with_transport(
        config: Arc<KanidmConfig>,
        transport: Arc<dyn HttpTransport>,
        spec: PersonSpec,
    ) -> Self {
        Self {
            session: Session::with_transport(config, transport),
            spec,
        }
    }

    /// The captured request/response log.
    pub fn log(&self) -> &crate::session::SessionLog {
        self.session.log()
    }

    /// Consume the reconciler, keeping only its log.
    pub fn into_log(self) -> crate::session::SessionLog {
        self.session.into_log()
    }

    /// Run the workflow; returns the credential-reset URL for the account.
    pub async fn run(&mut self) -> KanidmResult<String> {
        let name = self.spec.name.clone();
        establish(&mut self.session).await?;

        if self.get_person().await?.is_none() && !self.make_person().await? {
            return Err(step_error(
                &self.session,
                "make_person",
                format!("Unable to create or get person {name}"),
            ));
        }

        if self.get_person().await?.is_none() {
            return Err(step_error(
                &self.session,
                "get_person",
                format!("Unable to get person {name}"),
            ));
        }

        let Some(reset_url) = self.credential_update_url().await? else {
            return Err(step_error(
                &self.session,
                "credential_update_url[update_intent]",
                format!("Unable to get credential update URL for person {name}"),
            ));
        };

        info!(person = %name, "person reconciled");
        Ok(reset_url)
    }

    async fn get_person(&mut self) -> KanidmResult<Option<String>> {
        let path = format!("/v1/person/{}", self.spec.name);
        let result = self.session.get("get_person", &path).await?;
        if !result.ok {
            return Ok(None);
        }
        Ok(extract_uuid(&result))
    }

    async fn make_person(&mut self) -> KanidmResult<bool> {
        let mut pairs = vec![(ATTR_NAME, vec![self.spec.name.clone()])];
        if let Some(display_name) = &self.spec.display_name {
            pairs.push((ATTR_DISPLAYNAME, vec![display_name.clone()]));
        }
        let body = attrs_body(&pairs);
        Ok(self
            .session
            .post_json("make_person", "/v1/person", &body)
            .await?
            .ok)
    }

    /// Request a credential-reset intent token and compose the UI reset URL.
    async fn credential_update_url(&mut self) -> KanidmResult<Option<String>> {
        let path = format!(
            "/v1/person/{}/_credential/_update_intent/{}",
            self.spec.name,
            self.spec.ttl.as_secs()
        );
        let result = self
            .session
            .get("credential_update_url[update_intent]", &path)
            .await?;
        if !result.ok {
            return Ok(None);
        }
        let Some(token) = result.json.get("token").and_then(|t| t.as_str()) else {
            return Ok(None);
        };

        let mut reset_url = self.session.config().base_url.clone();
        reset_url.set_path("/ui/reset");
        reset_url.query_pairs_mut().clear().append_pair("token", token);
        Ok(Some(reset_url.to_string()))
    }
}
