//! Group reconciliation.

use std::sync::Arc;

use tracing::info;

use super::{attrs_body, establish, extract_uuid, step_error};
use crate::config::KanidmConfig;
use crate::error::KanidmResult;
use crate::session::Session;
use crate::transport::HttpTransport;
use crate::types::{GroupSpec, ATTR_ENTRY_MANAGED_BY, ATTR_MEMBER, ATTR_NAME};

/// Drives a single group definition to its declared state.
pub struct GroupReconciler {
    session: Session,
    spec: GroupSpec,
}

impl GroupReconciler {
    /// Create a reconciler with its own per-run HTTP client.
    pub fn new(config: Arc<KanidmConfig>, spec: GroupSpec) -> KanidmResult<Self> {
        Ok(Self {
            session: Session::new(config)?,
            spec,
        })
    }

    /// Create a reconciler over an injected transport (used by tests).
    pub fn with_transport(
        config: Arc<KanidmConfig>,
        transport: Arc<dyn HttpTransport>,
        spec: GroupSpec,
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

    /// Run the workflow; returns the group's UUID.
    ///
    /// Membership is set wholesale: the configured user list replaces
    /// whatever the server held before.
    pub async fn run(&mut self) -> KanidmResult<String> {
        let name = self.spec.name.clone();
        establish(&mut self.session).await?;

        if self.get_group().await?.is_none() && !self.make_group().await? {
            return Err(step_error(
                &self.session,
                "create_group",
                format!("Unable to create or get group {name}"),
            ));
        }

        let Some(uuid) = self.get_group().await? else {
            return Err(step_error(
                &self.session,
                "get_group",
                format!("Unable to get group {name}"),
            ));
        };

        if !self.add_members().await? {
            return Err(step_error(
                &self.session,
                "add_members",
                format!("Unable to add members to group {name}"),
            ));
        }

        info!(group = %name, %uuid, "group reconciled");
        Ok(uuid)
    }

    async fn get_group(&mut self) -> KanidmResult<Option<String>> {
        let path = format!("/v1/group/{}", self.spec.name);
        let result = self.session.get("get_group", &path).await?;
        if !result.ok {
            return Ok(None);
        }
        Ok(extract_uuid(&result))
    }

    async fn make_group(&mut self) -> KanidmResult<bool> {
        let mut pairs = vec![(ATTR_NAME, vec![self.spec.name.clone()])];
        if let Some(parent) = &self.spec.parent {
            pairs.push((ATTR_ENTRY_MANAGED_BY, vec![parent.clone()]));
        }
        let body = attrs_body(&pairs);
        Ok(self
            .session
            .post_json("create_group", "/v1/group", &body)
            .await?
            .ok)
    }

    async fn add_members(&mut self) -> KanidmResult<bool> {
        let path = format!("/v1/group/{}/_attr/{}", self.spec.name, ATTR_MEMBER);
        let users = self.spec.users.clone();
        Ok(self
            .session
            .post_json("add_members", &path, &users)
            .await?
            .ok)
    }
}
