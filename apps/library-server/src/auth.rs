//! Librarian sessions.
//!
//! A successful login issues a signed JWT (HS256) carried in the
//! `library_session` cookie. When `auth.require_login` is on, the
//! [`require_login`] middleware guards every catalogue and lending route.

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "library_session";

/// Session token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (librarian username)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Token id
    pub jti: String,
}

/// Issues and checks session tokens.
pub struct SessionManager {
    secret: String,
    lifetime_secs: i64,
}

impl SessionManager {
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        SessionManager {
            secret,
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Generate a session token for `username`.
    pub fn issue(&self, username: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to sign session token");
            ApiError::internal("Failed to create session")
        })
    }

    /// Validate and decode a token.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            debug!(error = %e, "Rejected session token");
            ApiError::unauthorized("Session is invalid or has expired")
        })?;

        Ok(token_data.claims)
    }
}

// =============================================================================
// Cookies
// =============================================================================

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0", SESSION_COOKIE)
}

/// Extract the session token from the request's `Cookie` headers.
pub fn extract_session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

// =============================================================================
// Middleware
// =============================================================================

/// Checks the session of a request. `None` when login is not required.
pub fn authorize(state: &AppState, headers: &HeaderMap) -> Result<Option<Claims>, ApiError> {
    if !state.config.auth.require_login {
        return Ok(None);
    }

    let token = extract_session_token(headers)
        .ok_or_else(|| ApiError::unauthorized("Login required"))?;

    state.sessions.validate(token).map(Some)
}

/// Rejects requests without a valid session when login is required.
///
/// The decoded [`Claims`] are stored in the request extensions.
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(claims) = authorize(&state, request.headers())? {
        request.extensions_mut().insert(claims);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryConfig;
    use axum::http::HeaderValue;
    use library_db::{Database, DbConfig};

    #[test]
    fn test_token_roundtrip() {
        let sessions = SessionManager::new("test-secret".to_string(), 3600);

        let token = sessions.issue("m.jones").unwrap();
        let claims = sessions.validate(&token).unwrap();

        assert_eq!(claims.sub, "m.jones");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_and_expiry() {
        let sessions = SessionManager::new("test-secret".to_string(), 3600);
        let token = sessions.issue("m.jones").unwrap();

        let other = SessionManager::new("other-secret".to_string(), 3600);
        assert_eq!(other.validate(&token).unwrap_err().code, "UNAUTHORIZED");

        // Past the default 60s leeway
        let stale = SessionManager::new("test-secret".to_string(), -300);
        let expired = stale.issue("m.jones").unwrap();
        assert!(sessions.validate(&expired).is_err());
    }

    #[test]
    fn test_extract_session_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);

        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; library_session=abc.def.ghi; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc.def.ghi"));

        let mut cleared = HeaderMap::new();
        cleared.insert(COOKIE, HeaderValue::from_static("library_session="));
        assert_eq!(extract_session_token(&cleared), None);
    }

    #[test]
    fn test_cookie_values() {
        let cookie = session_cookie("tok", 60);
        assert!(cookie.starts_with("library_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_authorize() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let open = AppState::new(db.clone(), LibraryConfig::default());
        assert_eq!(authorize(&open, &HeaderMap::new()).unwrap(), None);

        let mut config = LibraryConfig::default();
        config.auth.require_login = true;
        let guarded = AppState::new(db, config);

        let err = authorize(&guarded, &HeaderMap::new()).unwrap_err();
        assert_eq!(err.code, "UNAUTHORIZED");

        let token = guarded.sessions.issue("m.jones").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );
        let claims = authorize(&guarded, &headers).unwrap().unwrap();
        assert_eq!(claims.sub, "m.jones");
    }
}
