//! JWT Authentication
//!
//! Validates JWTs from external auth providers (Firebase, Auth0, Supabase, etc.).
//! A local HS256 token can be minted for development play.

use std::fmt;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

// =============================================================================
// USER IDENTITY
// =============================================================================

/// Stable user identifier derived from the token subject.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct UserId(pub [u8; 16]);

impl UserId {
    /// Derive from an auth-provider subject.
    pub fn from_subject(sub: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"geocreator-user:");
        hasher.update(sub.as_bytes());
        let hash = hasher.finalize();

        let mut id = [0u8; 16];
        id.copy_from_slice(&hash[..16]);
        Self(id)
    }

    /// Hex form used on the wire.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for UserId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&s).map_err(|e| format!("invalid user id {:?}: {}", s, e))?;
        let id: [u8; 16] = bytes
            .try_into()
            .map_err(|_| format!("user id {:?} must be 16 bytes", s))?;
        Ok(Self(id))
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", hex::encode(&self.0[..4]))
    }
}

/// A user as stored on games, highscores and ratings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// Stable id.
    pub id: UserId,
    /// Display name.
    pub username: String,
}

impl UserRef {
    /// Build from a subject and a display name.
    pub fn from_subject(sub: &str, username: impl Into<String>) -> Self {
        Self {
            id: UserId::from_subject(sub),
            username: username.into(),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Authentication configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Expected issuer claim ("iss"). If None, any issuer accepted.
    pub issuer: Option<String>,
    /// Expected audience claim ("aud"). If None, any audience accepted.
    pub audience: Option<String>,
    /// RS256 public key in PEM format (preferred for external providers).
    pub public_key_pem: Option<String>,
    /// HS256 secret (fallback for simple setups).
    pub secret: Option<String>,
    /// Whether to skip expiry validation (for testing only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            issuer: std::env::var("AUTH_ISSUER").ok(),
            audience: std::env::var("AUTH_AUDIENCE").ok(),
            public_key_pem: std::env::var("AUTH_PUBLIC_KEY_PEM").ok(),
            secret: std::env::var("AUTH_SECRET").ok(),
            skip_expiry: std::env::var("AUTH_SKIP_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// HS256 config with a shared secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Check if authentication is configured.
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

// =============================================================================
// CLAIMS
// =============================================================================

/// JWT claims we expect from auth providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject - usually the user ID from the auth provider.
    pub sub: String,
    /// Expiry timestamp (Unix seconds).
    #[serde(default)]
    pub exp: u64,
    /// Issued at timestamp.
    #[serde(default)]
    pub iat: u64,
    /// Issuer (auth provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    /// Display name (OIDC `preferred_username`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// Full name (OIDC `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TokenClaims {
    /// Claims for a user, valid for `ttl_secs` from now.
    pub fn for_user(sub: impl Into<String>, username: impl Into<String>, ttl_secs: u64) -> Self {
        let now = unix_now();
        Self {
            sub: sub.into(),
            exp: now + ttl_secs,
            iat: now,
            iss: None,
            aud: None,
            preferred_username: Some(username.into()),
            name: None,
        }
    }

    /// Derive the stable user id from the subject claim.
    pub fn user_id(&self) -> UserId {
        UserId::from_subject(&self.sub)
    }

    /// Display name: preferred username, then name, then subject.
    pub fn username(&self) -> &str {
        self.preferred_username
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.sub)
    }

    /// User reference stored on records.
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            id: self.user_id(),
            username: self.username().to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authentication configured on server.
    #[error("authentication not configured")]
    NotConfigured,
    /// Request carried no bearer token.
    #[error("missing bearer token")]
    MissingToken,
    /// Token format is invalid.
    #[error("invalid token format")]
    InvalidFormat,
    /// Token signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token has expired.
    #[error("token expired")]
    Expired,
    /// Issuer claim doesn't match expected value.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Audience claim doesn't match expected value.
    #[error("invalid audience")]
    InvalidAudience,
    /// Required claim is missing.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// JWT decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Validate a JWT token and extract claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    if !config.is_configured() {
        return Err(AuthError::NotConfigured);
    }

    let algorithm = if config.public_key_pem.is_some() {
        Algorithm::RS256
    } else {
        Algorithm::HS256
    };

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = std::collections::HashSet::new();

    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }

    if let Some(ref audience) = config.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    if config.skip_expiry {
        validation.validate_exp = false;
    }

    let token_data: TokenData<TokenClaims> = if let Some(ref pem) = config.public_key_pem {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::DecodeError(format!("invalid public key: {}", e)))?;
        decode(token, &key, &validation).map_err(map_jwt_error)?
    } else if let Some(ref secret) = config.secret {
        let key = DecodingKey::from_secret(secret.as_bytes());
        decode(token, &key, &validation).map_err(map_jwt_error)?
    } else {
        return Err(AuthError::NotConfigured);
    };

    let claims = token_data.claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }

    // Manual expiry check (in case validation was skipped)
    if !config.skip_expiry && claims.exp > 0 && unix_now() > claims.exp {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

/// Sign claims with the configured HS256 secret.
pub fn issue_token(claims: &TokenClaims, config: &AuthConfig) -> Result<String, AuthError> {
    let secret = config.secret.as_ref().ok_or(AuthError::NotConfigured)?;
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).map_err(|e| AuthError::DecodeError(e.to_string()))
}

/// Map JWT library errors to our error type.
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::DecodeError(err.to_string()),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-256-bits-long!!";

    fn test_claims() -> TokenClaims {
        let mut claims = TokenClaims::for_user("user123", "isak", 3600);
        claims.iss = Some("test-issuer".into());
        claims.aud = Some(serde_json::json!("test-audience"));
        claims
    }

    #[test]
    fn test_valid_token_validation() {
        let config = AuthConfig::with_secret(SECRET);
        let token = issue_token(&test_claims(), &config).unwrap();

        let claims = validate_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.username(), "isak");
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = AuthConfig::with_secret(SECRET);
        let mut claims = test_claims();
        claims.exp = 1; // Expired in 1970
        let token = issue_token(&claims, &config).unwrap();

        assert!(matches!(validate_token(&token, &config), Err(AuthError::Expired)));
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let token = issue_token(&test_claims(), &AuthConfig::with_secret("correct-secret-key-here!!!!!")).unwrap();
        let config = AuthConfig::with_secret("wrong-secret-key-here!!!!!!");

        assert!(matches!(validate_token(&token, &config), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_missing_sub_rejected() {
        let config = AuthConfig::with_secret(SECRET);
        let mut claims = test_claims();
        claims.sub = String::new();
        let token = issue_token(&claims, &config).unwrap();

        assert!(matches!(validate_token(&token, &config), Err(AuthError::MissingClaim(_))));
    }

    #[test]
    fn test_issuer_validation() {
        let token = issue_token(&test_claims(), &AuthConfig::with_secret(SECRET)).unwrap();
        let config = AuthConfig {
            issuer: Some("wrong-issuer".into()),
            ..AuthConfig::with_secret(SECRET)
        };

        assert!(matches!(validate_token(&token, &config), Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn test_not_configured_error() {
        let config = AuthConfig::default();
        assert!(matches!(validate_token("some.jwt.token", &config), Err(AuthError::NotConfigured)));
        assert!(matches!(issue_token(&test_claims(), &config), Err(AuthError::NotConfigured)));
    }

    #[test]
    fn test_skip_expiry_for_testing() {
        let mut claims = test_claims();
        claims.exp = 1;
        let token = issue_token(&claims, &AuthConfig::with_secret(SECRET)).unwrap();
        let config = AuthConfig {
            skip_expiry: true,
            ..AuthConfig::with_secret(SECRET)
        };

        assert!(validate_token(&token, &config).is_ok());
    }

    #[test]
    fn test_user_id_derivation() {
        let a = TokenClaims::for_user("user123", "a", 60);
        let b = TokenClaims::for_user("user123", "renamed", 60);
        let c = TokenClaims::for_user("user456", "a", 60);

        // Same sub gives same id regardless of display name
        assert_eq!(a.user_id(), b.user_id());
        assert_ne!(a.user_id(), c.user_id());
    }

    #[test]
    fn test_username_fallbacks() {
        let mut claims = TokenClaims::for_user("sub-1", "nick", 60);
        assert_eq!(claims.username(), "nick");
        claims.preferred_username = None;
        claims.name = Some("Full Name".into());
        assert_eq!(claims.username(), "Full Name");
        claims.name = None;
        assert_eq!(claims.username(), "sub-1");
    }

    #[test]
    fn test_user_id_hex_roundtrip_in_json() {
        let user = UserRef::from_subject("someone", "someone");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"].as_str().unwrap().len(), 32);
        let back: UserRef = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);

        assert!(UserId::try_from("abcd".to_string()).is_err());
        assert!(UserId::try_from("zz".repeat(16)).is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   xyz "), Some("xyz"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("token"), None);
    }
}
