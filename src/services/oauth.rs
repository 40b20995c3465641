//! OAuth2 client reconciliation.

use std::sync::Arc;

use tracing::{debug, info};

use super::{attrs_body, establish, extract_uuid, step_error};
use crate::config::KanidmConfig;
use crate::error::{ImageError, KanidmResult};
use crate::image::ImageSpec;
use crate::session::Session;
use crate::transport::{HttpTransport, MultipartForm};
use crate::types::{
    OauthClientSpec, PrefUsername, ATTR_DISPLAYNAME, ATTR_NAME,
    ATTR_OAUTH2_ALLOW_INSECURE_CLIENT_DISABLE_PKCE, ATTR_OAUTH2_ALLOW_LOCALHOST_REDIRECT,
    ATTR_OAUTH2_JWT_LEGACY_CRYPTO_ENABLE, ATTR_OAUTH2_PREFER_SHORT_USERNAME,
    ATTR_OAUTH2_RS_ORIGIN, ATTR_OAUTH2_RS_ORIGIN_LANDING, ATTR_OAUTH2_STRICT_REDIRECT_URI,
};

/// Drives a single OAuth2 client definition to its declared state.
///
/// One reconciler owns one [`Session`]; on failure the accumulated
/// request/response log stays available through [`log`](Self::log) so the
/// failing call can be inspected.
pub struct OauthClientReconciler {
    session: Session,
    spec: OauthClientSpec,
}

impl OauthClientReconciler {
    /// Create a reconciler with its own per-run HTTP client.
    pub fn new(config: Arc<KanidmConfig>, spec: OauthClientSpec) -> KanidmResult<Self> {
        Ok(Self {
            session: Session::new(config)?,
            spec,
        })
    }

    /// Create a reconciler over an injected transport (used by tests).
    pub fn with_transport(
        config: Arc<KanidmConfig>,
        transport: Arc<dyn HttpTransport>,
        spec: OauthClientSpec,
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

    /// Run the workflow; returns the client's basic secret.
    ///
    /// Every step must succeed or the run aborts at that step with an
    /// error naming it. Re-running after a partial failure is safe: the
    /// existence check short-circuits creation and every patch is
    /// idempotent on the server side.
    pub async fn run(&mut self) -> KanidmResult<String> {
        let name = self.spec.name.clone();
        establish(&mut self.session).await?;

        if self.get_client().await?.is_none() {
            if self.spec.public {
                if !self.create_public_client().await? {
                    return Err(self.fail(
                        "create_public_client",
                        format!("Unable to create or get public client {name}"),
                    ));
                }
            } else if !self.create_basic_client().await? {
                return Err(self.fail(
                    "create_basic_client",
                    format!("Unable to create or get client {name}"),
                ));
            }
        }

        if self.get_client().await?.is_none() {
            return Err(self.fail("get_client", format!("Unable to get client {name}")));
        }

        if self.spec.public {
            if !self.set_localhost_redirect().await? {
                return Err(self.fail(
                    "set_localhost_redirect",
                    format!("Unable to set localhost redirect policy for client {name}"),
                ));
            }
        } else {
            if !self.set_pkce().await? {
                return Err(self.fail("set_pkce", format!("Unable to set PKCE for client {name}")));
            }
            if !self.set_legacy_crypto().await? {
                return Err(self.fail(
                    "set_legacy_crypto",
                    format!("Unable to set legacy crypto for client {name}"),
                ));
            }
        }

        if !self.add_redirect_urls().await? {
            return Err(self.fail(
                "add_redirect_url",
                format!("Unable to add redirect URLs for client {name}"),
            ));
        }

        if !self.update_scope_map().await? {
            return Err(self.fail(
                "update_scope_map",
                format!("Unable to update scope map for client {name}"),
            ));
        }

        if !self.set_preferred_username().await? {
            return Err(self.fail(
                "set_preferred_username",
                format!("Unable to set preferred username for client {name}"),
            ));
        }

        if !self.set_strict_redirect().await? {
            return Err(self.fail(
                "set_strict_redirect",
                format!("Unable to set strict redirect for client {name}"),
            ));
        }

        if let Some(image) = self.spec.image.clone() {
            if !self.add_image(&image).await? {
                return Err(self.fail("add_image", format!("Unable to add image for client {name}")));
            }
        }

        if !self.spec.sup_scopes.is_empty() && !self.update_sup_scope_map().await? {
            return Err(self.fail(
                "update_sup_scope_map",
                format!("Unable to update supplemental scope map for client {name}"),
            ));
        }

        if !self.spec.custom_claims.is_empty() {
            if !self.update_custom_claim_map().await? {
                return Err(self.fail(
                    "update_custom_claim_map",
                    format!("Unable to update custom claim map for client {name}"),
                ));
            }
            if !self.update_custom_claim_join().await? {
                return Err(self.fail(
                    "update_custom_claim_join",
                    format!("Unable to update custom claim join for client {name}"),
                ));
            }
        }

        match self.get_client_secret().await? {
            Some(secret) if !secret.is_empty() => {
                info!(client = %name, "oauth2 client reconciled");
                Ok(secret)
            }
            _ => Err(self.fail(
                "get_client_secret",
                format!("Unable to get client secret for client {name}"),
            )),
        }
    }

    fn fail(&self, step: &str, detail: String) -> crate::error::KanidmError {
        step_error(&self.session, step, detail)
    }

    fn client_path(&self) -> String {
        format!("/v1/oauth2/{}", self.spec.name)
    }

    async fn patch_client(
        &mut self,
        step: &str,
        pairs: &[(&str, Vec<String>)],
    ) -> KanidmResult<bool> {
        let body = attrs_body(pairs);
        let path = self.client_path();
        Ok(self.session.patch_json(step, &path, &body).await?.ok)
    }

    async fn get_client(&mut self) -> KanidmResult<Option<String>> {
        let path = self.client_path();
        let result = self.session.get("get_client", &path).await?;
        if !result.ok {
            return Ok(None);
        }
        Ok(extract_uuid(&result))
    }

    async fn create_basic_client(&mut self) -> KanidmResult<bool> {
        let body = attrs_body(&[
            (ATTR_NAME, vec![self.spec.name.clone()]),
            (ATTR_DISPLAYNAME, vec![self.spec.display_name.clone()]),
            (ATTR_OAUTH2_RS_ORIGIN_LANDING, vec![self.spec.url.clone()]),
            (
                ATTR_OAUTH2_STRICT_REDIRECT_URI,
                vec![self.spec.strict_redirect.to_string()],
            ),
        ]);
        Ok(self
            .session
            .post_json("create_basic_client", "/v1/oauth2/_basic", &body)
            .await?
            .ok)
    }

    async fn create_public_client(&mut self) -> KanidmResult<bool> {
        let body = attrs_body(&[
            (ATTR_NAME, vec![self.spec.name.clone()]),
            (ATTR_DISPLAYNAME, vec![self.spec.display_name.clone()]),
            (ATTR_OAUTH2_RS_ORIGIN_LANDING, vec![self.spec.url.clone()]),
            (
                ATTR_OAUTH2_STRICT_REDIRECT_URI,
                vec![self.spec.strict_redirect.to_string()],
            ),
        ]);
        Ok(self
            .session
            .post_json("create_public_client", "/v1/oauth2/_public", &body)
            .await?
            .ok)
    }

    async fn set_pkce(&mut self) -> KanidmResult<bool> {
        let value = self.spec.pkce.to_string();
        self.patch_client(
            "set_pkce",
            &[(ATTR_OAUTH2_ALLOW_INSECURE_CLIENT_DISABLE_PKCE, vec![value])],
        )
        .await
    }

    async fn set_legacy_crypto(&mut self) -> KanidmResult<bool> {
        let value = self.spec.legacy_crypto.to_string();
        self.patch_client(
            "set_legacy_crypto",
            &[(ATTR_OAUTH2_JWT_LEGACY_CRYPTO_ENABLE, vec![value])],
        )
        .await
    }

    async fn set_localhost_redirect(&mut self) -> KanidmResult<bool> {
        let value = self.spec.local_redirect.to_string();
        self.patch_client(
            "set_localhost_redirect",
            &[(ATTR_OAUTH2_ALLOW_LOCALHOST_REDIRECT, vec![value])],
        )
        .await
    }

    async fn set_strict_redirect(&mut self) -> KanidmResult<bool> {
        let value = self.spec.strict_redirect.to_string();
        self.patch_client(
            "set_strict_redirect",
            &[(ATTR_OAUTH2_STRICT_REDIRECT_URI, vec![value])],
        )
        .await
    }

    async fn set_preferred_username(&mut self) -> KanidmResult<bool> {
        let prefer_short = (self.spec.username == PrefUsername::Short).to_string();
        self.patch_client(
            "set_preferred_username",
            &[(ATTR_OAUTH2_PREFER_SHORT_USERNAME, vec![prefer_short])],
        )
        .await
    }

    async fn add_redirect_urls(&mut self) -> KanidmResult<bool> {
        for url in self.spec.redirect_urls.clone() {
            let step = format!("add_redirect_url[{url}]");
            if !self
                .patch_client(&step, &[(ATTR_OAUTH2_RS_ORIGIN, vec![url.clone()])])
                .await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn update_scope_map(&mut self) -> KanidmResult<bool> {
        let path = format!("{}/_scopemap/{}", self.client_path(), self.spec.group);
        let scopes = self.spec.scopes.clone();
        Ok(self
            .session
            .post_json("update_scope_map", &path, &scopes)
            .await?
            .ok)
    }

    async fn update_sup_scope_map(&mut self) -> KanidmResult<bool> {
        for (i, sup) in self.spec.sup_scopes.clone().into_iter().enumerate() {
            let step = format!("update_sup_scope_map[{i}]");
            let path = format!("{}/_sup_scopemap/{}", self.client_path(), sup.group);
            if !self.session.post_json(&step, &path, &sup.scopes).await?.ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn add_image(&mut self, image: &ImageSpec) -> KanidmResult<bool> {
        let resolved = image.resolve(self.session.transport()).await?;
        let mime = resolved.format.mime().ok_or_else(|| ImageError::UnknownFormat {
            src: image.src.clone(),
        })?;
        let file_name = format!("{}.{}", self.spec.name, resolved.format.extension());
        debug!(file = %file_name, mime, "uploading client image");

        let (content_type, body) = MultipartForm::new()
            .file("image", &file_name, mime, resolved.bytes.clone())
            .build();
        let path = format!("{}/_image", self.client_path());
        Ok(self
            .session
            .post_bytes("add_image", &path, &content_type, body)
            .await?
            .ok)
    }

    async fn update_custom_claim_map(&mut self) -> KanidmResult<bool> {
        for (i, claim) in self.spec.custom_claims.clone().into_iter().enumerate() {
            let step = format!("update_custom_claim_map[{i}]");
            let path = format!("{}/_claimmap/{}", self.client_path(), claim.group);
            if !self.session.post_json(&step, &path, &claim.values).await?.ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn update_custom_claim_join(&mut self) -> KanidmResult<bool> {
        let join = self.spec.claim_join;
        let path = format!("{}/_claimmap/{}", self.client_path(), join.as_str());
        Ok(self
            .session
            .post_json("update_custom_claim_join", &path, &join)
            .await?
            .ok)
    }

    async fn get_client_secret(&mut self) -> KanidmResult<Option<String>> {
        let path = format!("{}/_basic_secret", self.client_path());
        let result = self.session.get("get_client_secret", &path).await?;
        if !result.ok {
            return Ok(None);
        }
        let secret = match result.json.as_str() {
            Some(secret) => secret.to_string(),
            None => result.text,
        };
        Ok(Some(secret))
    }
}
