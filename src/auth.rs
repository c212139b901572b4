use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::PageError;
use crate::models::UserForm;
use crate::password;
use crate::render;
use crate::session::{self, CurrentUser, LoginRequired, LOGIN_PATH};
use crate::AppState;

const FORM_ERROR: &str = "Error with Form Submission";

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

pub async fn register_form(CurrentUser(user): CurrentUser) -> Response {
    if user.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    render::register_page(None).into_response()
}

pub async fn login_form(
    CurrentUser(user): CurrentUser,
    Query(query): Query<LoginQuery>,
) -> Response {
    if user.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    render::login_page(query.next.as_deref(), None).into_response()
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
    Form(form): Form<UserForm>,
) -> Result<Response, PageError> {
    if let Err(errors) = form.validate() {
        tracing::debug!(?errors, "login form rejected");
        return Ok(render::login_page(query.next.as_deref(), Some(FORM_ERROR)).into_response());
    }

    let email = form.email().to_string();
    let user = state.store.user_by_email(&email).await?;
    // Unknown emails still pay for one argon2 run.
    let stored = match &user {
        Some(user) => user.password_hash.clone(),
        None => password::decoy_hash(),
    };
    let verified = password::verify_blocking(form.password, stored).await?;

    match user {
        Some(user) if verified => {
            session::authenticate(&session, &user).await?;
            Ok(Redirect::to(session::safe_next(query.next.as_deref())).into_response())
        }
        Some(user) => {
            tracing::info!(user_id = user.id, "login failed: wrong password");
            Ok(Redirect::to(LOGIN_PATH).into_response())
        }
        None => {
            tracing::info!(%email, "login failed: unknown email");
            Ok(Redirect::to(LOGIN_PATH).into_response())
        }
    }
}

pub async fn logout(LoginRequired(user): LoginRequired, session: Session) -> Result<Redirect, PageError> {
    session::logout(&session, &user).await?;
    Ok(Redirect::to("/"))
}
