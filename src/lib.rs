use std::sync::{Arc, LazyLock};

use axum::{
    routing::{get, post},
    Router,
};
use regex::Regex;
use sha2::{Digest, Sha512};
use tower_http::services::ServeDir;
use tower_sessions::cookie::{time::Duration, Key};
use tower_sessions::{Expiry, SessionManagerLayer};

use crate::session_store::StoreSessions;

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod models;
pub mod password;
pub mod posts;
pub mod render;
pub mod seed;
pub mod session;
pub mod session_store;
pub mod users;

pub use config::Config;
pub use database::Store;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9]+").expect("slug regex should compile"));

/// Pretty url fragment for a post title: runs of anything outside
/// `[A-Za-z0-9]` collapse to a single `-`, the ends are trimmed and the
/// result is lower-cased.
pub fn slugify(title: &str) -> String {
    NON_ALNUM
        .replace_all(title, "-")
        .trim_matches('-')
        .to_ascii_lowercase()
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

/// Builds the full application: routes, session layer and static fallback.
pub fn app(state: AppState) -> Router {
    let key = Key::from(Sha512::digest(state.config.session_secret.as_bytes()).as_slice());
    let sessions = SessionManagerLayer::new(StoreSessions::new(state.store.clone()))
        .with_name(state.config.session_cookie.clone())
        .with_secure(state.config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            state.config.session_idle_secs,
        )))
        .with_signed(key);
    let public_dir = state.config.public_dir.clone();

    Router::new()
        .route("/register", get(auth::register_form))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/", get(posts::list_posts))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::show_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/:id",
            get(posts::show_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/p/:slug", get(posts::show_post_by_slug))
        .route("/api/healthcheck", get(health::health_check_handler))
        .fallback_service(ServeDir::new(public_dir))
        .layer(sessions)
        .with_state(state)
}
