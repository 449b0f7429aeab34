use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::config::{AppConfig, JwtConfig};
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let jwt = JwtKeys::from_config(&config.jwt)?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(config.database.connect_options())
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;

        let store = Arc::new(PgStore::new(pool)) as Arc<dyn Store>;
        Ok(Self { store, jwt })
    }

    pub fn from_parts(store: Arc<dyn Store>, jwt: &JwtConfig) -> anyhow::Result<Self> {
        let jwt = JwtKeys::from_config(jwt)?;
        Ok(Self { store, jwt })
    }

    /// State backed by a fresh in-memory store and a fixed test key.
    pub fn fake() -> Self {
        let jwt = JwtConfig {
            secret: "test-secret".into(),
            algorithm: "HS256".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 30,
        };
        let store = Arc::new(MemoryStore::new()) as Arc<dyn Store>;
        Self::from_parts(store, &jwt).expect("HS256 test config is valid")
    }
}
