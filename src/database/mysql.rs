//! MySQL backend. The driver is synchronous, so every call runs on the
//! blocking pool with a connection checked out of the shared [`Pool`].

use async_trait::async_trait;
use mysql::consts::CapabilityFlags;
use mysql::prelude::Queryable;
use mysql::{Opts, OptsBuilder, Pool, PooledConn, TxOpts};

use super::{Guarded, Store};
use crate::error::StoreError;
use crate::models::{Post, User, UserChanges};

const USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        email VARCHAR(255) NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        name VARCHAR(255) NOT NULL DEFAULT '',
        UNIQUE KEY users_email (email)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

const POSTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS posts (
        post_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        created BIGINT NOT NULL,
        title VARCHAR(255) NOT NULL,
        body TEXT NOT NULL,
        user_id BIGINT NOT NULL,
        url VARCHAR(255) NOT NULL,
        KEY posts_url (url),
        KEY posts_user_id (user_id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

const SESSIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS sessions (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        data TEXT NOT NULL,
        expires BIGINT NOT NULL,
        KEY sessions_expires (expires)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

const USER_COLUMNS: &str = "id, email, password_hash, name";
const POST_COLUMNS: &str = "post_id, created, title, body, user_id, url";

/// MySQL error code for a unique key violation.
const ER_DUP_ENTRY: u16 = 1062;

type UserRow = (i64, String, String, String);
type PostRow = (i64, i64, String, String, i64, String);

fn user_from_row((id, email, password_hash, name): UserRow) -> User {
    User {
        id,
        email,
        password_hash,
        name,
        authenticated: false,
    }
}

fn post_from_row((id, created, title, body, user_id, url): PostRow) -> Post {
    Post {
        id,
        created,
        title,
        body,
        user_id,
        url,
    }
}

fn duplicate_email(err: mysql::Error, email: &str) -> StoreError {
    match err {
        mysql::Error::MySqlError(ref e) if e.code == ER_DUP_ENTRY => {
            StoreError::DuplicateEmail(email.to_string())
        }
        other => StoreError::Database(other),
    }
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: Pool,
}

impl MySqlStore {
    /// Connects and creates the tables if they are missing.
    ///
    /// `CLIENT_FOUND_ROWS` is requested so an update reports matched rows,
    /// not only the rows whose values changed.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let opts = Opts::from_url(url)?;
        let opts: Opts = OptsBuilder::from_opts(opts)
            .additional_capabilities(CapabilityFlags::CLIENT_FOUND_ROWS)
            .into();
        let pool = tokio::task::spawn_blocking(move || Pool::new(opts)).await??;
        let store = Self { pool };
        store
            .run(|conn| {
                conn.query_drop(USERS_TABLE)?;
                conn.query_drop(POSTS_TABLE)?;
                conn.query_drop(SESSIONS_TABLE)?;
                Ok(())
            })
            .await?;
        tracing::info!("mysql store ready");
        Ok(store)
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PooledConn) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get_conn()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn insert_user(&self, user: &User) -> Result<User, StoreError> {
        let user = user.clone();
        self.run(move |conn| {
            conn.exec_drop(
                "INSERT INTO users (email, password_hash, name) VALUES (?, ?, ?)",
                (&user.email, &user.password_hash, &user.name),
            )
            .map_err(|e| duplicate_email(e, &user.email))?;
            Ok(User {
                id: conn.last_insert_id() as i64,
                authenticated: false,
                ..user
            })
        })
        .await
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.run(move |conn| {
            let row: Option<UserRow> = conn.exec_first(
                format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                (id,),
            )?;
            Ok(row.map(user_from_row))
        })
        .await
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        self.run(move |conn| {
            let row: Option<UserRow> = conn.exec_first(
                format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
                (email,),
            )?;
            Ok(row.map(user_from_row))
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.run(|conn| {
            let rows: Vec<UserRow> =
                conn.query(format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
            Ok(rows.into_iter().map(user_from_row).collect())
        })
        .await
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<u64, StoreError> {
        let changes = changes.clone();
        self.run(move |conn| {
            let result = match &changes.password_hash {
                Some(hash) => conn.exec_drop(
                    "UPDATE users SET email = ?, name = ?, password_hash = ? WHERE id = ?",
                    (&changes.email, &changes.name, hash, id),
                ),
                None => conn.exec_drop(
                    "UPDATE users SET email = ?, name = ? WHERE id = ?",
                    (&changes.email, &changes.name, id),
                ),
            };
            result.map_err(|e| duplicate_email(e, &changes.email))?;
            Ok(conn.affected_rows())
        })
        .await
    }

    async fn delete_user(&self, id: i64) -> Result<u64, StoreError> {
        self.run(move |conn| {
            let mut tx = conn.start_transaction(TxOpts::default())?;
            tx.exec_drop("DELETE FROM posts WHERE user_id = ?", (id,))?;
            tx.exec_drop("DELETE FROM users WHERE id = ?", (id,))?;
            let deleted = tx.affected_rows();
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    async fn insert_post(&self, post: &Post) -> Result<Post, StoreError> {
        let post = post.clone();
        self.run(move |conn| {
            conn.exec_drop(
                "INSERT INTO posts (created, title, body, user_id, url) VALUES (?, ?, ?, ?, ?)",
                (post.created, &post.title, &post.body, post.user_id, &post.url),
            )?;
            Ok(Post {
                id: conn.last_insert_id() as i64,
                ..post
            })
        })
        .await
    }

    async fn post_by_id(&self, id: i64) -> Result<Option<Post>, StoreError> {
        self.run(move |conn| {
            let row: Option<PostRow> = conn.exec_first(
                format!("SELECT {POST_COLUMNS} FROM posts WHERE post_id = ?"),
                (id,),
            )?;
            Ok(row.map(post_from_row))
        })
        .await
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let slug = slug.to_string();
        self.run(move |conn| {
            let row: Option<PostRow> = conn.exec_first(
                format!("SELECT {POST_COLUMNS} FROM posts WHERE url = ? ORDER BY post_id LIMIT 1"),
                (slug,),
            )?;
            Ok(row.map(post_from_row))
        })
        .await
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        self.run(|conn| {
            let rows: Vec<PostRow> =
                conn.query(format!("SELECT {POST_COLUMNS} FROM posts ORDER BY post_id"))?;
            Ok(rows.into_iter().map(post_from_row).collect())
        })
        .await
    }

    async fn posts_by_user(&self, user_id: i64) -> Result<Vec<Post>, StoreError> {
        self.run(move |conn| {
            let rows: Vec<PostRow> = conn.exec(
                format!("SELECT {POST_COLUMNS} FROM posts WHERE user_id = ? ORDER BY post_id"),
                (user_id,),
            )?;
            Ok(rows.into_iter().map(post_from_row).collect())
        })
        .await
    }

    async fn update_post(
        &self,
        id: i64,
        owner: i64,
        title: &str,
        body: &str,
    ) -> Result<Guarded<u64>, StoreError> {
        let (title, body) = (title.to_string(), body.to_string());
        self.run(move |conn| {
            let mut tx = conn.start_transaction(TxOpts::default())?;
            let current: Option<i64> = tx.exec_first(
                "SELECT user_id FROM posts WHERE post_id = ? FOR UPDATE",
                (id,),
            )?;
            match current {
                None => return Ok(Guarded::NotFound),
                Some(user_id) if user_id != owner => return Ok(Guarded::Forbidden),
                Some(_) => {}
            }
            tx.exec_drop(
                "UPDATE posts SET title = ?, body = ? WHERE post_id = ?",
                (&title, &body, id),
            )?;
            let updated = tx.affected_rows();
            tx.commit()?;
            Ok(Guarded::Done(updated))
        })
        .await
    }

    async fn delete_post(&self, id: i64, owner: i64) -> Result<Guarded<()>, StoreError> {
        self.run(move |conn| {
            let mut tx = conn.start_transaction(TxOpts::default())?;
            let current: Option<i64> = tx.exec_first(
                "SELECT user_id FROM posts WHERE post_id = ? FOR UPDATE",
                (id,),
            )?;
            match current {
                None => return Ok(Guarded::NotFound),
                Some(user_id) if user_id != owner => return Ok(Guarded::Forbidden),
                Some(_) => {}
            }
            tx.exec_drop("DELETE FROM posts WHERE post_id = ?", (id,))?;
            tx.commit()?;
            Ok(Guarded::Done(()))
        })
        .await
    }

    async fn save_session(&self, id: &str, data: &str, expires: i64) -> Result<(), StoreError> {
        let (id, data) = (id.to_string(), data.to_string());
        self.run(move |conn| {
            conn.exec_drop(
                "INSERT INTO sessions (id, data, expires) VALUES (?, ?, ?)
                 ON DUPLICATE KEY UPDATE data = VALUES(data), expires = VALUES(expires)",
                (id, data, expires),
            )?;
            Ok(())
        })
        .await
    }

    async fn load_session(&self, id: &str, now: i64) -> Result<Option<(String, i64)>, StoreError> {
        let id = id.to_string();
        self.run(move |conn| {
            let row: Option<(String, i64)> = conn.exec_first(
                "SELECT data, expires FROM sessions WHERE id = ? AND expires > ?",
                (id, now),
            )?;
            Ok(row)
        })
        .await
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.exec_drop("DELETE FROM sessions WHERE id = ?", (id,))?;
            Ok(())
        })
        .await
    }

    async fn delete_expired_sessions(&self, now: i64) -> Result<u64, StoreError> {
        self.run(move |conn| {
            conn.exec_drop("DELETE FROM sessions WHERE expires <= ?", (now,))?;
            Ok(conn.affected_rows())
        })
        .await
    }

    async fn truncate(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            conn.query_drop("TRUNCATE TABLE sessions")?;
            conn.query_drop("TRUNCATE TABLE posts")?;
            conn.query_drop("TRUNCATE TABLE users")?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            let one: Option<u8> = conn.query_first("SELECT 1")?;
            match one {
                Some(1) => Ok(()),
                other => Err(StoreError::Unexpected(format!("SELECT 1 returned {other:?}"))),
            }
        })
        .await
    }
}
