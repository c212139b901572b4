//! Per-request identity.
//!
//! A browser session is either anonymous or authenticated as one user. The
//! cookie only carries the session id; the user's id lives in the session
//! record under [`SESSION_USER_ID_KEY`] and is turned back into a [`User`] on
//! every request. Resolution fails open: any problem on the way yields the
//! anonymous zero-value user.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Redirect;
use tower_sessions::Session;

use crate::models::User;
use crate::AppState;

/// Key under which the authenticated user's id is stored in the session.
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// Path anonymous visitors are sent to from a protected page.
pub const LOGIN_PATH: &str = "/login";

/// Query parameter carrying the page to return to after login.
pub const REDIRECT_PARAM: &str = "next";

/// Whoever is making the request, authenticated or not.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentUser>() {
            return Ok(current.clone());
        }
        let current = CurrentUser(resolve(parts, state).await);
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

async fn resolve(parts: &mut Parts, state: &AppState) -> User {
    let session = match Session::from_request_parts(parts, state).await {
        Ok(session) => session,
        Err((_, reason)) => {
            tracing::warn!(reason, "no session on request, treating as anonymous");
            return User::default();
        }
    };
    let user_id = match session.get::<i64>(SESSION_USER_ID_KEY).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return User::default(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read session, treating as anonymous");
            return User::default();
        }
    };
    match state.store.user_by_id(user_id).await {
        Ok(Some(mut user)) => {
            user.authenticated = true;
            user
        }
        Ok(None) => {
            tracing::debug!(user_id, "session refers to a missing user");
            User::default()
        }
        Err(e) => {
            tracing::warn!(user_id, error = %e, "user lookup failed, treating as anonymous");
            User::default()
        }
    }
}

/// Route guard: anonymous visitors are redirected to the login page with the
/// requested path preserved in `next`.
#[derive(Debug, Clone)]
pub struct LoginRequired(pub User);

#[async_trait]
impl FromRequestParts<AppState> for LoginRequired {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = match CurrentUser::from_request_parts(parts, state).await {
            Ok(CurrentUser(user)) => user,
            Err(never) => match never {},
        };
        if user.is_authenticated() {
            return Ok(LoginRequired(user));
        }
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        tracing::debug!(path, "login required");
        Err(Redirect::to(&login_url(path)))
    }
}

/// `/login?next=<target>` with the target url-encoded.
pub fn login_url(target: &str) -> String {
    match serde_urlencoded::to_string([(REDIRECT_PARAM, target)]) {
        Ok(query) => format!("{LOGIN_PATH}?{query}"),
        Err(_) => LOGIN_PATH.to_string(),
    }
}

/// Only same-site paths are followed after login; anything else goes home.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

/// Anonymous -> Authenticated. The session id is rotated first.
pub async fn authenticate(session: &Session, user: &User) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_ID_KEY, user.id).await?;
    tracing::info!(user_id = user.id, "session authenticated");
    Ok(())
}

/// Authenticated -> Anonymous.
pub async fn logout(session: &Session, user: &User) -> Result<(), tower_sessions::session::Error> {
    session.flush().await?;
    tracing::info!(user_id = user.id, "session logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_encodes_target() {
        assert_eq!(login_url("/users/1"), "/login?next=%2Fusers%2F1");
        assert_eq!(login_url("/a?b=c&d"), "/login?next=%2Fa%3Fb%3Dc%26d");
    }

    #[test]
    fn only_local_paths_are_followed() {
        assert_eq!(safe_next(Some("/users/2")), "/users/2");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
