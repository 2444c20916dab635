#![allow(dead_code)]

use std::sync::Arc;
use uuid::Uuid;

use bazaar_server::config::Config;
use bazaar_server::context::AppContext;
use bazaar_server::db;
use bazaar_server::message::MessageDraft;

/// Fully wired application context over an in-memory database.
pub async fn test_context() -> AppContext {
    let config = Config::for_tests();
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("failed to open in-memory database");
    db::init_schema(&pool).await.expect("failed to init schema");
    AppContext::new(pool, Arc::new(config))
}

pub async fn seed_user(ctx: &AppContext, username: &str) -> Uuid {
    db::create_user(&ctx.db_pool, username)
        .await
        .expect("failed to seed user")
}

pub fn draft(receiver_id: Uuid, text: &str) -> MessageDraft {
    MessageDraft {
        receiver_id,
        item_ref: None,
        text: text.to_string(),
    }
}
