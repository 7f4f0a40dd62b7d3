//! Application state wiring all components together.
//!
//! `AppState` holds the concrete component instances used by the HTTP
//! handlers. The controller and registry are generic over the ports, but
//! AppState pins them to the infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use murmur_core::chat::registry::SessionRegistry;
use murmur_core::engine::GenerationEngine;
use murmur_core::retrieval::NoRetrieval;
use murmur_infra::config::{load_config, resolve_data_dir};
use murmur_infra::engine::OpenAiCompatEngine;
use murmur_infra::sqlite::pool::DatabasePool;
use murmur_infra::sqlite::turn::SqliteTurnStore;
use murmur_types::config::ServerConfig;

/// Concrete turn store the handlers run against.
pub type ConcreteTurnStore = SqliteTurnStore;

/// Shared application state holding all components.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<ConcreteTurnStore>,
    pub engine: Arc<dyn GenerationEngine>,
    pub augmenter: Arc<NoRetrieval>,
    pub config: Arc<ServerConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: load config, connect to the DB,
    /// wire the engine and registry.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;

        // Initialize database
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("murmur.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;
        let store = Arc::new(SqliteTurnStore::new(db_pool.clone()));

        let engine: Arc<dyn GenerationEngine> =
            Arc::new(OpenAiCompatEngine::from_config(&config.engine));

        Ok(Self {
            registry: Arc::new(SessionRegistry::new()),
            store,
            engine,
            augmenter: Arc::new(NoRetrieval),
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }
}
