use std::sync::Arc;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::conversations::ConversationAggregator;
use crate::db::DbPool;
use crate::delivery::DeliveryEngine;
use crate::directory::{SqlItemCatalog, SqlUserDirectory};
use crate::registry::ConnectionRegistry;
use crate::store::MessageStore;

/// Shared dependencies of the messaging server, cloned into every
/// handler. All components behind it are `Arc`'d, so a clone is cheap.
#[derive(Clone)]
pub struct AppContext {
    pub db_pool: DbPool,
    pub store: Arc<MessageStore>,
    pub conversations: Arc<ConversationAggregator>,
    pub registry: Arc<ConnectionRegistry>,
    pub delivery: Arc<DeliveryEngine>,
    pub auth: Arc<AuthManager>,
    pub config: Arc<Config>,
}

impl AppContext {
    /// Wires the messaging components against one database pool. The SQL
    /// directory implementations stand in for the identity and catalog
    /// collaborators.
    pub fn new(db_pool: DbPool, config: Arc<Config>) -> Self {
        let users = Arc::new(SqlUserDirectory::new(db_pool.clone()));
        let catalog = Arc::new(SqlItemCatalog::new(db_pool.clone()));

        let store = Arc::new(MessageStore::new(
            db_pool.clone(),
            users,
            config.max_text_length,
        ));
        let conversations = Arc::new(ConversationAggregator::new(db_pool.clone()));
        let registry = Arc::new(ConnectionRegistry::new());
        let delivery = Arc::new(DeliveryEngine::new(
            store.clone(),
            registry.clone(),
            catalog,
        ));
        let auth = Arc::new(AuthManager::new(&config));

        Self {
            db_pool,
            store,
            conversations,
            registry,
            delivery,
            auth,
            config,
        }
    }
}
