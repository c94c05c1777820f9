//! Cookie sessions and the user extractors built on them

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, Method},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::User;
use crate::AppState;

pub const SESSION_COOKIE: &str = "sessionid";

/// `Set-Cookie` value for a fresh session
pub fn session_cookie(session_id: Uuid) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        SESSION_COOKIE, session_id
    )
}

/// `Set-Cookie` value that drops the session cookie
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

/// Session id carried by the request, if any
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Start a session and return the cookie to set
pub async fn log_in(state: &AppState, user: &User) -> String {
    let session = state.cache.open_session(user.id).await;
    tracing::info!(user_id = user.id, "User logged in");
    session_cookie(session)
}

/// End the request's session, if any, and return the cookie to set
pub async fn log_out(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(session) = session_id(headers) {
        state.cache.close_session(&session).await;
        tracing::info!("User logged out");
    }
    clear_session_cookie()
}

async fn session_user(parts: &Parts, state: &AppState) -> Result<Option<User>> {
    let Some(session) = session_id(&parts.headers) else {
        return Ok(None);
    };
    let Some(user_id) = state.cache.session_user(&session).await else {
        return Ok(None);
    };
    state.store.find_user(user_id).await
}

/// Where to send the visitor back to after logging in
fn return_path(parts: &Parts) -> &str {
    if parts.method == Method::GET || parts.method == Method::HEAD {
        parts
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/")
    } else {
        "/"
    }
}

/// Logged-in user; anonymous requests are redirected to the login page
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        match session_user(parts, state).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => Err(AppError::Unauthenticated {
                next: return_path(parts).to_string(),
            }
            .into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Logged-in user when there is one
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        session_user(parts, state)
            .await
            .map(MaybeUser)
            .map_err(IntoResponse::into_response)
    }
}

/// Logged-in staff member; other users get `403`
#[derive(Debug, Clone)]
pub struct StaffUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            tracing::warn!(user_id = user.id, path = %parts.uri.path(), "Staff area refused");
            return Err(AppError::Forbidden.into_response());
        }
        Ok(StaffUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie_header() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; sessionid={}; lang=en", id)).unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));
    }

    #[test]
    fn test_session_id_ignores_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sessionid=not-a-uuid"));
        assert_eq!(session_id(&headers), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_values() {
        let id = Uuid::new_v4();
        assert!(session_cookie(id).starts_with(&format!("sessionid={};", id)));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
