//! Access token claims
//!
//! The access token is a JWT whose payload we read but never verify; the
//! resource server does that. Decoding exists only to learn who the user is
//! and when the token expires, so every failure here fails closed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::types::{Role, UserProfile};

/// Role-list entry that grants the admin role
pub const ADMIN_ROLE_CLAIM: &str = "ADMIN";

/// Scope substring that grants the admin role when no role list is present
pub const ADMIN_SCOPE_MARKER: &str = "admin";

/// Why a token could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenDecodeError {
    #[error("token is not a three-part JWT (found {0} segments)")]
    Malformed(usize),

    #[error("token payload is not base64url: {0}")]
    Base64(String),

    #[error("token payload is not a JSON claims object: {0}")]
    Json(String),

    #[error("token is missing the '{0}' claim")]
    MissingClaim(&'static str),
}

/// `scope` may be a space-delimited string or a JSON array
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScopeClaim {
    Delimited(String),
    List(Vec<String>),
}

impl ScopeClaim {
    /// Scopes as a single space-separated string
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            Self::Delimited(s) => s.clone(),
            Self::List(list) => list.join(" "),
        }
    }
}

/// Claims this client understands; everything else is ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Explicit role list
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    /// Role list under the name Spring Authorization Server customizers use
    #[serde(default)]
    pub authorities: Option<Vec<String>>,
    #[serde(default)]
    pub scope: Option<ScopeClaim>,
    /// Expiry, seconds since the Unix epoch
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl TokenClaims {
    /// Whether the token is expired at `now` (seconds since epoch)
    ///
    /// A token without `exp` is always expired.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.map_or(true, |exp| exp < now)
    }

    /// `exp` as a timestamp, if present and representable
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Role derived from the claims
    ///
    /// An explicit role list decides on its own: admin iff it contains
    /// `ADMIN` (case-sensitive). Only when no role list is present does the
    /// scope fall back to the substring check for `admin`.
    #[must_use]
    pub fn role(&self) -> Role {
        if let Some(roles) = self.roles.as_ref().or(self.authorities.as_ref()) {
            return if roles.iter().any(|r| r == ADMIN_ROLE_CLAIM) { Role::Admin } else { Role::User };
        }
        match &self.scope {
            Some(scope) if scope.joined().contains(ADMIN_SCOPE_MARKER) => Role::Admin,
            _ => Role::User,
        }
    }

    /// Build the dashboard's user profile
    ///
    /// # Errors
    /// Returns [`TokenDecodeError::MissingClaim`] when `sub` is absent.
    pub fn to_user_profile(&self) -> Result<UserProfile, TokenDecodeError> {
        let id = self.sub.clone().ok_or(TokenDecodeError::MissingClaim("sub"))?;
        let username = self.preferred_username.clone().unwrap_or_else(|| id.clone());

        Ok(UserProfile {
            id,
            username,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role(),
        })
    }
}

/// Decode a JWT's payload segment into [`TokenClaims`]
///
/// The signature is not checked.
///
/// # Errors
/// Returns [`TokenDecodeError`] if the token does not have three segments or
/// the payload is not base64url JSON.
pub fn decode_jwt(token: &str) -> Result<TokenClaims, TokenDecodeError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenDecodeError::Malformed(parts.len()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| TokenDecodeError::Base64(e.to_string()))?;

    serde_json::from_slice(&payload).map_err(|e| TokenDecodeError::Json(e.to_string()))
}

/// Whether `token` is expired at `now` (seconds since epoch)
///
/// Undecodable tokens and tokens without `exp` count as expired.
#[must_use]
pub fn is_token_expired_at(token: &str, now: i64) -> bool {
    decode_jwt(token).map_or(true, |claims| claims.is_expired_at(now))
}

/// Whether `token` is expired right now
#[must_use]
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, Utc::now().timestamp())
}

/// Decode `token` and derive the user profile in one step
///
/// # Errors
/// Returns [`TokenDecodeError`] if decoding fails or `sub` is missing.
pub fn derive_user_profile(token: &str) -> Result<UserProfile, TokenDecodeError> {
    decode_jwt(token)?.to_user_profile()
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::claims.
    use serde_json::json;

    use super::*;

    fn token_with(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    /// Validates `decode_jwt` behavior for a well-formed token.
    ///
    /// Assertions:
    /// - Confirms the standard claims are read.
    /// - Confirms `scope` accepts a space-delimited string.
    #[test]
    fn test_decode_jwt_reads_claims() {
        let token = token_with(&json!({
            "sub": "u-1",
            "preferred_username": "maria",
            "email": "maria@example.com",
            "scope": "openid profile",
            "exp": 1_900_000_000,
            "iat": 1_800_000_000,
            "unrelated": {"nested": true}
        }));

        let claims = decode_jwt(&token).expect("decode");
        assert_eq!(claims.sub.as_deref(), Some("u-1"));
        assert_eq!(claims.preferred_username.as_deref(), Some("maria"));
        assert_eq!(claims.scope, Some(ScopeClaim::Delimited("openid profile".to_string())));
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert!(claims.expires_at().is_some());
    }

    /// Validates `decode_jwt` behavior for malformed input.
    ///
    /// Assertions:
    /// - Ensures a two-segment token is rejected as `Malformed`.
    /// - Ensures a non-base64 payload is rejected as `Base64`.
    /// - Ensures a non-object payload is rejected as `Json`.
    #[test]
    fn test_decode_jwt_rejects_malformed_tokens() {
        assert_eq!(decode_jwt("abc.def"), Err(TokenDecodeError::Malformed(2)));
        assert!(matches!(decode_jwt("a.!!!.c"), Err(TokenDecodeError::Base64(_))));

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2"));
        assert!(matches!(decode_jwt(&not_json), Err(TokenDecodeError::Json(_))));
    }

    /// Validates `is_token_expired_at` around the expiry boundary.
    ///
    /// Assertions:
    /// - Ensures `exp < now` is expired.
    /// - Ensures `exp == now` and `exp > now` are not expired.
    /// - Ensures a missing `exp` and garbage input are expired.
    #[test]
    fn test_is_token_expired_at_boundaries() {
        let token = token_with(&json!({"sub": "u-1", "exp": 1000}));

        assert!(is_token_expired_at(&token, 1001));
        assert!(!is_token_expired_at(&token, 1000));
        assert!(!is_token_expired_at(&token, 999));

        let no_exp = token_with(&json!({"sub": "u-1"}));
        assert!(is_token_expired_at(&no_exp, 0));
        assert!(is_token_expired_at("garbage", 0));
    }

    /// Validates `is_token_expired` against the wall clock.
    #[test]
    fn test_is_token_expired_uses_current_time() {
        let now = Utc::now().timestamp();
        assert!(is_token_expired(&token_with(&json!({"exp": now - 60}))));
        assert!(!is_token_expired(&token_with(&json!({"exp": now + 3600}))));
    }

    /// Validates `TokenClaims::role` precedence between role list and scope.
    ///
    /// Assertions:
    /// - Confirms `ADMIN` in the role list grants admin.
    /// - Confirms a role list without `ADMIN` overrides an admin scope.
    /// - Confirms the scope heuristic applies when no role list exists.
    /// - Confirms role matching is case-sensitive.
    #[test]
    fn test_role_precedence() {
        let by_role: TokenClaims =
            serde_json::from_value(json!({"roles": ["USER", "ADMIN"]})).expect("claims");
        assert_eq!(by_role.role(), Role::Admin);

        let role_wins: TokenClaims =
            serde_json::from_value(json!({"roles": ["USER"], "scope": "openid admin"}))
                .expect("claims");
        assert_eq!(role_wins.role(), Role::User);

        let by_scope: TokenClaims =
            serde_json::from_value(json!({"scope": ["openid", "dashboard.admin"]}))
                .expect("claims");
        assert_eq!(by_scope.role(), Role::Admin);

        let lowercase: TokenClaims =
            serde_json::from_value(json!({"authorities": ["admin"]})).expect("claims");
        assert_eq!(lowercase.role(), Role::User);

        assert_eq!(TokenClaims::default().role(), Role::User);
    }

    /// Validates `derive_user_profile` defaults and the required `sub`.
    #[test]
    fn test_derive_user_profile() {
        let profile = derive_user_profile(&token_with(&json!({"sub": "u-7", "exp": 1})))
            .expect("profile");
        assert_eq!(profile.id, "u-7");
        assert_eq!(profile.username, "u-7");
        assert_eq!(profile.role, Role::User);

        let err = derive_user_profile(&token_with(&json!({"preferred_username": "x"})));
        assert_eq!(err, Err(TokenDecodeError::MissingClaim("sub")));
    }
}
