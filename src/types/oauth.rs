//! OAuth2 client reconcile target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ArgumentError, KanidmError, KanidmResult};
use crate::image::ImageSpec;

/// Default group granted the client's scopes.
pub const DEFAULT_SCOPE_GROUP: &str = "idm_all_persons";

/// OAuth2/OIDC scopes the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// OpenID Connect core.
    Openid,
    /// Profile claims.
    Profile,
    /// Email claims.
    Email,
    /// Address claims.
    Address,
    /// Phone claims.
    Phone,
    /// Group membership claims.
    Groups,
    /// SSH public key claims.
    SshPublickeys,
}

impl Scope {
    /// Scope value as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openid => "openid",
            Self::Profile => "profile",
            Self::Email => "email",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Groups => "groups",
            Self::SshPublickeys => "ssh_publickeys",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = KanidmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openid" => Ok(Self::Openid),
            "profile" => Ok(Self::Profile),
            "email" => Ok(Self::Email),
            "address" => Ok(Self::Address),
            "phone" => Ok(Self::Phone),
            "groups" => Ok(Self::Groups),
            "ssh_publickeys" => Ok(Self::SshPublickeys),
            other => Err(ArgumentError::InvalidScope {
                scope: other.to_string(),
            }
            .into()),
        }
    }
}

/// Encoding used when a custom claim carries multiple values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimJoin {
    /// JSON array (default).
    #[default]
    Array,
    /// Comma-separated string.
    Csv,
    /// Space-separated string.
    Ssv,
}

impl ClaimJoin {
    /// Join mode as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Csv => "csv",
            Self::Ssv => "ssv",
        }
    }
}

/// Preferred username form presented to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefUsername {
    /// `user@domain` security principal name (default).
    #[default]
    Spn,
    /// Bare short username.
    Short,
}

/// Supplemental scope grant for a specific group.
#[derive(Debug, Clone)]
pub struct SupScope {
    /// The group the grant applies to.
    pub group: String,
    /// Scopes granted to that group.
    pub scopes: Vec<Scope>,
}

/// A custom claim emitted for members of a group.
#[derive(Debug, Clone)]
pub struct CustomClaim {
    /// Claim name.
    pub name: String,
    /// The group whose members receive the claim.
    pub group: String,
    /// Claim values.
    pub values: Vec<String>,
}

/// Declarative description of an OAuth2 client.
///
/// Constructed through [`OauthClientSpec::builder`]; the builder enforces
/// the cross-field invariants (public clients must use PKCE, localhost
/// redirects need a public client and strict redirect validation) before
/// any network call can happen.
#[derive(Debug, Clone)]
pub struct OauthClientSpec {
    /// Client name.
    pub name: String,
    /// Display name, defaults to the client name.
    pub display_name: String,
    /// Landing page URL.
    pub url: String,
    /// Allowed redirect URLs, applied in order.
    pub redirect_urls: Vec<String>,
    /// Scopes granted through the primary scope map.
    pub scopes: Vec<Scope>,
    /// Group receiving the primary scope map.
    pub group: String,
    /// Whether the client is public (no client secret).
    pub public: bool,
    /// Join mode for multi-valued custom claims.
    pub claim_join: ClaimJoin,
    /// PKCE enforcement flag.
    pub pkce: bool,
    /// Legacy JWT crypto flag.
    pub legacy_crypto: bool,
    /// Strict redirect URI validation flag.
    pub strict_redirect: bool,
    /// Allow localhost redirects (public clients only).
    pub local_redirect: bool,
    /// Preferred username form.
    pub username: PrefUsername,
    /// Supplemental per-group scope grants.
    pub sup_scopes: Vec<SupScope>,
    /// Custom claims.
    pub custom_claims: Vec<CustomClaim>,
    /// Optional client image.
    pub image: Option<ImageSpec>,
}

impl OauthClientSpec {
    /// Create a new spec builder.
    pub fn builder() -> OauthClientSpecBuilder {
        OauthClientSpecBuilder::default()
    }
}

/// Builder for [`OauthClientSpec`].
#[derive(Default)]
pub struct OauthClientSpecBuilder {
    name: Option<String>,
    display_name: Option<String>,
    url: Option<String>,
    redirect_urls: Vec<String>,
    scopes: Vec<Scope>,
    group: Option<String>,
    public: Option<bool>,
    claim_join: Option<ClaimJoin>,
    pkce: Option<bool>,
    legacy_crypto: Option<bool>,
    strict_redirect: Option<bool>,
    local_redirect: Option<bool>,
    username: Option<PrefUsername>,
    sup_scopes: Vec<SupScope>,
    custom_claims: Vec<CustomClaim>,
    image: Option<ImageSpec>,
}

impl OauthClientSpecBuilder {
    /// Set the client name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the display name.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the landing page URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Add an allowed redirect URL.
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_urls.push(url.into());
        self
    }

    /// Set all allowed redirect URLs.
    pub fn redirect_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redirect_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Set the granted scopes.
    pub fn scopes<I>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = Scope>,
    {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// Set the group receiving the primary scope map.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Mark the client public or confidential.
    pub fn public(mut self, public: bool) -> Self {
        self.public = Some(public);
        self
    }

    /// Set the claim join mode.
    pub fn claim_join(mut self, claim_join: ClaimJoin) -> Self {
        self.claim_join = Some(claim_join);
        self
    }

    /// Enable or disable PKCE.
    pub fn pkce(mut self, pkce: bool) -> Self {
        self.pkce = Some(pkce);
        self
    }

    /// Enable or disable legacy JWT crypto.
    pub fn legacy_crypto(mut self, legacy_crypto: bool) -> Self {
        self.legacy_crypto = Some(legacy_crypto);
        self
    }

    /// Enable or disable strict redirect validation.
    pub fn strict_redirect(mut self, strict_redirect: bool) -> Self {
        self.strict_redirect = Some(strict_redirect);
        self
    }

    /// Allow or forbid localhost redirects.
    pub fn local_redirect(mut self, local_redirect: bool) -> Self {
        self.local_redirect = Some(local_redirect);
        self
    }

    /// Set the preferred username form.
    pub fn username(mut self, username: PrefUsername) -> Self {
        self.username = Some(username);
        self
    }

    /// Add a supplemental scope grant.
    pub fn sup_scope(mut self, group: impl Into<String>, scopes: Vec<Scope>) -> Self {
        self.sup_scopes.push(SupScope {
            group: group.into(),
            scopes,
        });
        self
    }

    /// Add a custom claim.
    pub fn custom_claim(
        mut self,
        name: impl Into<String>,
        group: impl Into<String>,
        values: Vec<String>,
    ) -> Self {
        self.custom_claims.push(CustomClaim {
            name: name.into(),
            group: group.into(),
            values,
        });
        self
    }

    /// Set the client image.
    pub fn image(mut self, image: ImageSpec) -> Self {
        self.image = Some(image);
        self
    }

    /// Build and validate the spec.
    pub fn build(self) -> KanidmResult<OauthClientSpec> {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or(ArgumentError::MissingRequired { field: "name" })?;
        let url = self
            .url
            .filter(|u| !u.is_empty())
            .ok_or(ArgumentError::MissingRequired { field: "url" })?;
        if self.redirect_urls.is_empty() {
            return Err(ArgumentError::MissingRequired {
                field: "redirect_url",
            }
            .into());
        }
        if self.scopes.is_empty() {
            return Err(ArgumentError::MissingRequired { field: "scopes" }.into());
        }

        let spec = OauthClientSpec {
            display_name: self.display_name.unwrap_or_else(|| name.clone()),
            name,
            url,
            redirect_urls: self.redirect_urls,
            scopes: self.scopes,
            group: self.group.unwrap_or_else(|| DEFAULT_SCOPE_GROUP.to_string()),
            public: self.public.unwrap_or(false),
            claim_join: self.claim_join.unwrap_or_default(),
            pkce: self.pkce.unwrap_or(true),
            legacy_crypto: self.legacy_crypto.unwrap_or(false),
            strict_redirect: self.strict_redirect.unwrap_or(true),
            local_redirect: self.local_redirect.unwrap_or(false),
            username: self.username.unwrap_or_default(),
            sup_scopes: self.sup_scopes,
            custom_claims: self.custom_claims,
            image: self.image,
        };

        if spec.public && !spec.pkce {
            return Err(ArgumentError::PublicClientWithoutPkce.into());
        }
        if spec.local_redirect && !spec.public {
            return Err(ArgumentError::LocalRedirectRequiresPublic.into());
        }
        if spec.local_redirect && !spec.strict_redirect {
            return Err(ArgumentError::LocalRedirectRequiresStrictRedirect.into());
        }

        Ok(spec)
    }
}
