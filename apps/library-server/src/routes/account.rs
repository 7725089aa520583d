//! Librarian signup, login and logout.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{clear_session_cookie, session_cookie};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub message: String,
    pub username: String,
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let Json(creds) = payload?;
    let librarian = state
        .db
        .librarians()
        .create(&creds.username, &creds.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            message: "Account created".to_string(),
            username: librarian.username,
        }),
    ))
}

/// Checks credentials and sets the session cookie.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(creds) = payload?;

    let librarian = state
        .db
        .librarians()
        .authenticate(&creds.username, &creds.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let token = state.sessions.issue(&librarian.username)?;
    let cookie = session_cookie(&token, state.sessions.lifetime_secs());
    info!(librarian_id = librarian.id, "Librarian logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AccountResponse {
            message: "Logged in".to_string(),
            username: librarian.username,
        }),
    )
        .into_response())
}

pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "message": "Logged out" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{extract_session_token, SESSION_COOKIE};
    use crate::routes::testing::test_state;
    use axum::http::HeaderMap;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let state = test_state().await;

        let (status, Json(created)) = signup(State(state.clone()), Ok(Json(creds("m.jones", "s3cret-pass"))))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.username, "m.jones");

        let response = login(State(state.clone()), Ok(Json(creds("m.jones", "s3cret-pass"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(SESSION_COOKIE));

        // Send the cookie back and decode it
        let pair = cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, pair.parse().unwrap());
        let token = extract_session_token(&headers).unwrap();
        assert_eq!(state.sessions.validate(token).unwrap().sub, "m.jones");
    }

    #[tokio::test]
    async fn test_login_failures() {
        let state = test_state().await;
        let (status, _) = signup(State(state.clone()), Ok(Json(creds("m.jones", "s3cret-pass"))))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let wrong = login(State(state.clone()), Ok(Json(creds("m.jones", "nope-nope"))))
            .await
            .unwrap_err();
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

        let unknown = login(State(state.clone()), Ok(Json(creds("ghost", "s3cret-pass"))))
            .await
            .unwrap_err();
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

        let taken = signup(State(state), Ok(Json(creds("M.Jones", "another-pass"))))
            .await
            .unwrap_err();
        assert_eq!(taken.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let response = logout().await;
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
    }
}
