//! # Identity Resolution
//!
//! Turns whatever the surrounding web layer knows about a request into an
//! [`OwnerKey`].

use serde::{Deserialize, Serialize};

use crate::error::{CartError, CartResult};
use basket_core::OwnerKey;

/// Identity facts extracted from an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdentity {
    /// Anonymous session cookie, if any.
    pub session_id: Option<String>,
    /// Authenticated account, if signed in.
    pub user_id: Option<String>,
}

impl RequestIdentity {
    pub fn anonymous(session_id: impl Into<String>) -> Self {
        RequestIdentity {
            session_id: Some(session_id.into()),
            user_id: None,
        }
    }

    pub fn authenticated(user_id: impl Into<String>) -> Self {
        RequestIdentity {
            session_id: None,
            user_id: Some(user_id.into()),
        }
    }
}

/// Maps a request to the owner of the cart it should see.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, request: &RequestIdentity) -> CartResult<OwnerKey>;
}

/// Signed-in users own their cart; everyone else is keyed by session.
///
/// A signed-in request usually still carries its session cookie, so a
/// present user id wins over a present session id. Blank values count as
/// absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOrUserResolver;

impl IdentityResolver for SessionOrUserResolver {
    fn resolve(&self, request: &RequestIdentity) -> CartResult<OwnerKey> {
        match (present(&request.session_id), present(&request.user_id)) {
            (_, Some(user)) => Ok(OwnerKey::from_parts(None, Some(user))?),
            (Some(session), None) => Ok(OwnerKey::from_parts(Some(session), None)?),
            (None, None) => Err(CartError::invalid_owner(
                "request carries neither a session id nor a user id",
            )),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Accepts exactly one identity and rejects requests carrying both.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictResolver;

impl IdentityResolver for StrictResolver {
    fn resolve(&self, request: &RequestIdentity) -> CartResult<OwnerKey> {
        Ok(OwnerKey::from_parts(
            request.session_id.as_deref(),
            request.user_id.as_deref(),
        )?)
    }
}
