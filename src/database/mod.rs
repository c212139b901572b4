//! Persistence for users and posts.
//!
//! Handlers talk to an `Arc<dyn Store>`; [`open`] picks the backend from the
//! url scheme. Every statement is parameterised.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Post, User, UserChanges};

pub mod memory;
pub mod mysql;

/// Outcome of a write that is only allowed for the owner of the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Done(T),
    NotFound,
    Forbidden,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts the user and returns it with its generated id.
    async fn insert_user(&self, user: &User) -> Result<User, StoreError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Returns the number of matched rows.
    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<u64, StoreError>;
    /// Deletes the user together with their posts. Returns deleted user rows.
    async fn delete_user(&self, id: i64) -> Result<u64, StoreError>;

    /// Inserts the post and returns it with its generated id.
    async fn insert_post(&self, post: &Post) -> Result<Post, StoreError>;
    async fn post_by_id(&self, id: i64) -> Result<Option<Post>, StoreError>;
    /// Lowest id wins when several posts share a slug.
    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError>;
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError>;
    async fn posts_by_user(&self, user_id: i64) -> Result<Vec<Post>, StoreError>;
    /// Sets title and body if `owner` owns the post; the slug is kept.
    async fn update_post(
        &self,
        id: i64,
        owner: i64,
        title: &str,
        body: &str,
    ) -> Result<Guarded<u64>, StoreError>;
    async fn delete_post(&self, id: i64, owner: i64) -> Result<Guarded<()>, StoreError>;

    /// Inserts or replaces the session's JSON data and its expiry (unix seconds).
    async fn save_session(&self, id: &str, data: &str, expires: i64) -> Result<(), StoreError>;
    /// Data and expiry of a session that is still live at `now`.
    async fn load_session(&self, id: &str, now: i64) -> Result<Option<(String, i64)>, StoreError>;
    async fn delete_session(&self, id: &str) -> Result<(), StoreError>;
    /// Removes every session that expired at or before `now`.
    async fn delete_expired_sessions(&self, now: i64) -> Result<u64, StoreError>;

    /// Empties every table, sessions included, and restarts id sequences.
    async fn truncate(&self) -> Result<(), StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

pub type DynStore = Arc<dyn Store>;

/// Opens the backend named by `url` and makes sure its tables exist.
pub async fn open(url: &str) -> Result<DynStore, StoreError> {
    if url.starts_with("mysql:") {
        Ok(Arc::new(self::mysql::MySqlStore::connect(url).await?))
    } else if url.starts_with("memory:") {
        Ok(Arc::new(self::memory::MemoryStore::default()))
    } else {
        Err(StoreError::UnsupportedUrl(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_memory_backend() {
        let store = open("memory://").await.unwrap();
        store.ping().await.unwrap();
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        match open("sqlite::memory:").await {
            Err(StoreError::UnsupportedUrl(url)) => assert_eq!(url, "sqlite::memory:"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
