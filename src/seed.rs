//! Demo data: one user and two posts, written over empty tables.

use crate::database::Store;
use crate::models::{Post, User};
use crate::password;

pub const DEMO_EMAIL: &str = "bob@domain.com";
pub const DEMO_PASSWORD: &str = "pass";

pub async fn reset_demo_data(store: &dyn Store) -> anyhow::Result<()> {
    store.truncate().await?;

    let hash = password::hash_blocking(DEMO_PASSWORD.to_string()).await?;
    let bob = store
        .insert_user(&User::new(DEMO_EMAIL, &hash, "Bob", false))
        .await?;

    for (title, body) in [
        ("Post 1", "Lorem ipsum lorem ipsum"),
        ("Post 2", "This is my second post"),
    ] {
        store.insert_post(&Post::new(title, body, bob.id)).await?;
    }

    tracing::info!(user_id = bob.id, "demo data inserted");
    Ok(())
}
