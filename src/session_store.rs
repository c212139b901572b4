//! Session records kept in the application database.
//!
//! Records live next to users and posts, so a MySQL-backed server keeps its
//! logins across restarts. A record past its expiry never loads, and
//! [`purge_expired`] removes such records periodically.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion, SessionStore};

use crate::database::DynStore;
use crate::error::StoreError;

#[derive(Clone)]
pub struct StoreSessions {
    store: DynStore,
}

impl StoreSessions {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }
}

impl fmt::Debug for StoreSessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSessions").finish_non_exhaustive()
    }
}

fn backend(err: StoreError) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[async_trait]
impl SessionStore for StoreSessions {
    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let data = serde_json::to_string(&record.data)
            .map_err(|e| session_store::Error::Encode(e.to_string()))?;
        self.store
            .save_session(
                &record.id.to_string(),
                &data,
                record.expiry_date.unix_timestamp(),
            )
            .await
            .map_err(backend)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let Some((data, expires)) = self
            .store
            .load_session(&session_id.to_string(), now())
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };
        let data = serde_json::from_str(&data)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;
        let expiry_date = OffsetDateTime::from_unix_timestamp(expires)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;
        Ok(Some(Record {
            id: *session_id,
            data,
            expiry_date,
        }))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.store
            .delete_session(&session_id.to_string())
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl ExpiredDeletion for StoreSessions {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let purged = self
            .store
            .delete_expired_sessions(now())
            .await
            .map_err(backend)?;
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }
        Ok(())
    }
}

/// Runs [`ExpiredDeletion::delete_expired`] every `period` until the process
/// exits. Failures are logged and retried on the next tick.
pub async fn purge_expired(sessions: StoreSessions, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        interval.tick().await;
        if let Err(e) = sessions.delete_expired().await {
            tracing::warn!(error = %e, "failed to purge expired sessions");
        }
    }
}
