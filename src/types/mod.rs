//! Reconcile target types and server attribute names.
//!
//! Targets are validated when they are constructed; a target that builds
//! successfully can always be driven through its workflow without further
//! field checks.

mod group;
mod oauth;
mod person;

pub use group::GroupSpec;
pub use oauth::{
    ClaimJoin, CustomClaim, OauthClientSpec, OauthClientSpecBuilder, PrefUsername, Scope, SupScope,
};
pub use person::PersonSpec;

/// Entry attribute: `name`.
pub const ATTR_NAME: &str = "name";
/// Entry attribute: `displayname`.
pub const ATTR_DISPLAYNAME: &str = "displayname";
/// Entry attribute: `uuid`.
pub const ATTR_UUID: &str = "uuid";
/// Group attribute: `member`.
pub const ATTR_MEMBER: &str = "member";
/// Entry attribute: `entry_managed_by`.
pub const ATTR_ENTRY_MANAGED_BY: &str = "entry_managed_by";
/// OAuth2 attribute: allowed redirect origin.
pub const ATTR_OAUTH2_RS_ORIGIN: &str = "oauth2_rs_origin";
/// OAuth2 attribute: landing page origin.
pub const ATTR_OAUTH2_RS_ORIGIN_LANDING: &str = "oauth2_rs_origin_landing";
/// OAuth2 attribute: strict redirect URI validation.
pub const ATTR_OAUTH2_STRICT_REDIRECT_URI: &str = "oauth2_strict_redirect_uri";
/// OAuth2 attribute: insecure PKCE-disable toggle.
pub const ATTR_OAUTH2_ALLOW_INSECURE_CLIENT_DISABLE_PKCE: &str =
    "oauth2_allow_insecure_client_disable_pkce";
/// OAuth2 attribute: legacy JWT crypto toggle.
pub const ATTR_OAUTH2_JWT_LEGACY_CRYPTO_ENABLE: &str = "oauth2_jwt_legacy_crypto_enable";
/// OAuth2 attribute: prefer short usernames over SPNs.
pub const ATTR_OAUTH2_PREFER_SHORT_USERNAME: &str = "oauth2_prefer_short_username";
/// OAuth2 attribute: allow localhost redirects.
pub const ATTR_OAUTH2_ALLOW_LOCALHOST_REDIRECT: &str = "oauth2_allow_localhost_redirect";
