use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use maud::Markup;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::error::{ApiError, PageError, StoreError};
use crate::models::{User, UserChanges, UserForm, UserUpdateForm};
use crate::password;
use crate::render;
use crate::session::{self, CurrentUser, LoginRequired};
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
) -> Result<Markup, PageError> {
    let users = state.store.list_users().await?;
    Ok(render::users_page(&authuser, &users))
}

pub async fn show_user(
    State(state): State<AppState>,
    LoginRequired(authuser): LoginRequired,
    Path(id): Path<String>,
) -> Result<Markup, PageError> {
    let user = match id.parse::<i64>() {
        Ok(id) => state.store.user_by_id(id).await?,
        Err(_) => None,
    };
    let Some(user) = user else {
        return Err(PageError::NotFound("User not found"));
    };
    let posts = state.store.posts_by_user(user.id).await?;
    Ok(render::user_page(&authuser, &user, &posts))
}

/// Registration: creates the user, logs the session in and goes home.
pub async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UserForm>,
) -> Result<Response, PageError> {
    if let Err(errors) = form.validate() {
        tracing::debug!(?errors, "registration form rejected");
        return Ok(render::register_page(Some("Error with Form Submission")).into_response());
    }

    let hash = password::hash_blocking(form.password.clone()).await?;
    let user = match state
        .store
        .insert_user(&User::new(form.email(), &hash, &form.name, false))
        .await
    {
        Ok(user) => user,
        Err(StoreError::DuplicateEmail(email)) => {
            tracing::info!(%email, "registration with an existing email");
            return Ok(render::register_page(Some("Email is already registered")).into_response());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user_id = user.id, "user registered");

    session::authenticate(&session, &user).await?;
    Ok(Redirect::to("/").into_response())
}

/// Profile edit from the client script. Only the user themself may do it.
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<UserUpdateForm>,
) -> Result<Json<Value>, ApiError> {
    let id = own_id(&authuser, &id, "You are not allowed to update this resource.")?;
    form.validate().map_err(ApiError::Validation)?;

    let password_hash = if form.password.is_empty() {
        None
    } else {
        Some(password::hash_blocking(form.password).await?)
    };
    let changes = UserChanges {
        email: form.email.trim().to_string(),
        name: form.name,
        password_hash,
    };
    let count = match state.store.update_user(id, &changes).await {
        Ok(count) => count,
        Err(StoreError::DuplicateEmail(email)) => {
            tracing::info!(user_id = id, %email, "profile update to an existing email");
            return Err(ApiError::Rejected);
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user_id = id, count, "rows updated");

    if count == 1 {
        Ok(Json(json!({ "responseText": "success" })))
    } else {
        Err(ApiError::Rejected)
    }
}

/// Self-delete. The user's posts go with them and the session is ended.
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = own_id(&authuser, &id, "You are not allowed to delete this resource.")?;

    if state.store.delete_user(id).await? != 1 {
        return Err(ApiError::Rejected);
    }
    tracing::info!(user_id = id, "user deleted");
    session::logout(&session, &authuser).await?;
    Ok(Json(json!({ "responseText": "success" })))
}

/// Owner guard for `/users/:id`: the path must name the session's own user.
fn own_id(authuser: &User, raw: &str, denied: &'static str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if authuser.owns(id) => Ok(id),
        _ => {
            tracing::debug!(user_id = authuser.id, target_id = raw, "owner check failed");
            Err(ApiError::Forbidden(denied))
        }
    }
}
