use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use maud::Markup;
use serde_json::{json, Value};

use crate::database::Guarded;
use crate::error::{ApiError, PageError};
use crate::models::{Post, PostForm};
use crate::render;
use crate::session::{CurrentUser, LoginRequired};
use crate::AppState;

/// Home page: every post, oldest first.
pub async fn list_posts(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
) -> Result<Markup, PageError> {
    let posts = state.store.list_posts().await?;
    Ok(render::posts_page(&authuser, &posts, None))
}

pub async fn create_post(
    State(state): State<AppState>,
    LoginRequired(authuser): LoginRequired,
    Form(form): Form<PostForm>,
) -> Result<Response, PageError> {
    if let Err(errors) = form.validate() {
        let posts = state.store.list_posts().await?;
        return Ok(render::posts_page(&authuser, &posts, errors.get("title")).into_response());
    }

    let post = state
        .store
        .insert_post(&Post::new(&form.title, &form.body, authuser.unique_id()))
        .await?;
    tracing::info!(post_id = post.id, user_id = post.user_id, url = %post.url, "post created");
    Ok(Redirect::to("/").into_response())
}

pub async fn show_post(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
    Path(id): Path<String>,
) -> Result<Markup, PageError> {
    let post = match id.parse::<i64>() {
        Ok(id) => state.store.post_by_id(id).await?,
        Err(_) => None,
    };
    let post = post.ok_or(PageError::NotFound("This is not found"))?;
    Ok(render::post_page(&authuser, &post))
}

pub async fn show_post_by_slug(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Markup, PageError> {
    let post = state
        .store
        .post_by_slug(&slug)
        .await?
        .ok_or(PageError::NotFound("This is not found"))?;
    Ok(render::post_page(&authuser, &post))
}

const UPDATE_DENIED: &str = "You are not allowed to modify this resource.";
const DELETE_DENIED: &str = "You are not allowed to delete this resource.";

/// Edits title and body. The slug keeps the value it got at creation.
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> Result<Json<Value>, ApiError> {
    let id = id.parse::<i64>().map_err(|_| ApiError::NotFound)?;
    if !authuser.is_authenticated() {
        return Err(foreign_or_missing(&state, id, UPDATE_DENIED).await);
    }

    if let Err(errors) = form.validate() {
        // Nothing is written, but the owner check still answers first.
        let post = state.store.post_by_id(id).await?.ok_or(ApiError::NotFound)?;
        if !authuser.owns(post.user_id) {
            return Err(ApiError::Forbidden(UPDATE_DENIED));
        }
        return Err(ApiError::Validation(errors));
    }

    match state
        .store
        .update_post(id, authuser.unique_id(), &form.title, &form.body)
        .await?
    {
        Guarded::Done(1) => {
            tracing::info!(post_id = id, "post updated");
            Ok(Json(json!({ "responseText": "success" })))
        }
        Guarded::Done(count) => {
            tracing::warn!(post_id = id, count, "unexpected update count");
            Err(ApiError::Rejected)
        }
        Guarded::NotFound => Err(ApiError::NotFound),
        Guarded::Forbidden => {
            tracing::debug!(post_id = id, user_id = authuser.id, "owner check failed");
            Err(ApiError::Forbidden(UPDATE_DENIED))
        }
    }
}

pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(authuser): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = id.parse::<i64>().map_err(|_| ApiError::NotFound)?;
    if !authuser.is_authenticated() {
        return Err(foreign_or_missing(&state, id, DELETE_DENIED).await);
    }

    match state.store.delete_post(id, authuser.unique_id()).await? {
        Guarded::Done(()) => {
            tracing::info!(post_id = id, "post deleted");
            Ok(Json(json!({ "responseText": "success" })))
        }
        Guarded::NotFound => Err(ApiError::NotFound),
        Guarded::Forbidden => {
            tracing::debug!(post_id = id, user_id = authuser.id, "owner check failed");
            Err(ApiError::Forbidden(DELETE_DENIED))
        }
    }
}

/// Anonymous callers own nothing: an existing post is forbidden, a missing
/// one is reported as not found.
async fn foreign_or_missing(state: &AppState, id: i64, denied: &'static str) -> ApiError {
    match state.store.post_by_id(id).await {
        Ok(Some(_)) => ApiError::Forbidden(denied),
        Ok(None) => ApiError::NotFound,
        Err(e) => e.into(),
    }
}
