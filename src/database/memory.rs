//! In-process backend used for local development (`memory://`) and tests.
//! Each operation holds the lock for its whole duration, so the owner check
//! and the write of a guarded operation are atomic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Guarded, Store};
use crate::error::StoreError;
use crate::models::{Post, User, UserChanges};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    posts: BTreeMap<i64, Post>,
    last_user_id: i64,
    last_post_id: i64,
    /// Session id -> (data, expires).
    sessions: BTreeMap<String, (String, i64)>,
}

fn stored(user: &User) -> User {
    User {
        authenticated: false,
        ..user.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<User, StoreError> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email.clone()));
        }
        tables.last_user_id += 1;
        let row = User {
            id: tables.last_user_id,
            ..stored(user)
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.lock().users.values().cloned().collect())
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.users.contains_key(&id) {
            return Ok(0);
        }
        if tables
            .users
            .values()
            .any(|u| u.id != id && u.email == changes.email)
        {
            return Err(StoreError::DuplicateEmail(changes.email.clone()));
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(0);
        };
        user.email = changes.email.clone();
        user.name = changes.name.clone();
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        Ok(1)
    }

    async fn delete_user(&self, id: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        if tables.users.remove(&id).is_none() {
            return Ok(0);
        }
        tables.posts.retain(|_, p| p.user_id != id);
        Ok(1)
    }

    async fn insert_post(&self, post: &Post) -> Result<Post, StoreError> {
        let mut tables = self.tables.lock();
        tables.last_post_id += 1;
        let row = Post {
            id: tables.last_post_id,
            ..post.clone()
        };
        tables.posts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn post_by_id(&self, id: i64) -> Result<Option<Post>, StoreError> {
        Ok(self.tables.lock().posts.get(&id).cloned())
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        Ok(self
            .tables
            .lock()
            .posts
            .values()
            .find(|p| p.url == slug)
            .cloned())
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self.tables.lock().posts.values().cloned().collect())
    }

    async fn posts_by_user(&self, user_id: i64) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .tables
            .lock()
            .posts
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_post(
        &self,
        id: i64,
        owner: i64,
        title: &str,
        body: &str,
    ) -> Result<Guarded<u64>, StoreError> {
        let mut tables = self.tables.lock();
        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(Guarded::NotFound);
        };
        if post.user_id != owner {
            return Ok(Guarded::Forbidden);
        }
        post.title = title.to_string();
        post.body = body.to_string();
        Ok(Guarded::Done(1))
    }

    async fn delete_post(&self, id: i64, owner: i64) -> Result<Guarded<()>, StoreError> {
        let mut tables = self.tables.lock();
        match tables.posts.get(&id) {
            None => return Ok(Guarded::NotFound),
            Some(post) if post.user_id != owner => return Ok(Guarded::Forbidden),
            Some(_) => {}
        }
        tables.posts.remove(&id);
        Ok(Guarded::Done(()))
    }

    async fn save_session(&self, id: &str, data: &str, expires: i64) -> Result<(), StoreError> {
        self.tables
            .lock()
            .sessions
            .insert(id.to_string(), (data.to_string(), expires));
        Ok(())
    }

    async fn load_session(&self, id: &str, now: i64) -> Result<Option<(String, i64)>, StoreError> {
        Ok(self
            .tables
            .lock()
            .sessions
            .get(id)
            .filter(|(_, expires)| *expires > now)
            .cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        self.tables.lock().sessions.remove(id);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, (_, expires)| *expires > now);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn truncate(&self) -> Result<(), StoreError> {
        *self.tables.lock() = Tables::default();
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
