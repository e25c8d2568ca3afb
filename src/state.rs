use std::sync::Arc;

use crate::config::{AppConfig, JwtConfig};
use crate::db;
use crate::store::{MemoryStore, PgStore, RecordStore};

/// Per-request context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.database_url {
            Some(url) => {
                let pool = db::connect(&config, url).await?;
                Arc::new(PgStore::new(pool)) as Arc<dyn RecordStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store, data is not persisted");
                Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>
            }
        };

        Ok(Self { store, config })
    }

    pub fn from_parts(store: Arc<dyn RecordStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// In-memory state with a fixed test signing key.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24,
            },
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
        });

        Self::from_parts(Arc::new(MemoryStore::new()), config)
    }
}
