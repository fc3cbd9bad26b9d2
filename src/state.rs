use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::{
    auth::{jwt::JwtKeys, password::Passwords},
    cleanup::CleanupPolicy,
    config::AppConfig,
    products::repo::{PgProductRepository, ProductRepository},
    storage::{BlobStore, LocalStorage},
    users::repo::{PgUserRepository, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub passwords: Passwords,
    pub users: Arc<dyn UserRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub storage: Arc<dyn BlobStore>,
    pub cleanup: CleanupPolicy,
}

impl AppState {
    pub async fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let storage = LocalStorage::init(&config.upload_dir)
            .await
            .with_context(|| format!("prepare upload dir {}", config.upload_dir.display()))?;
        tracing::info!(root = %storage.root().display(), "blob storage ready");

        let passwords = Passwords::with_time_cost(config.argon2_time_cost)?;
        let jwt = JwtKeys::new(&config.jwt);

        Ok(Self::from_parts(
            Arc::new(config),
            jwt,
            passwords,
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgProductRepository::new(db)),
            Arc::new(storage),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        jwt: JwtKeys,
        passwords: Passwords,
        users: Arc<dyn UserRepository>,
        products: Arc<dyn ProductRepository>,
        storage: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config,
            jwt,
            passwords,
            users,
            products,
            storage,
            cleanup: CleanupPolicy::default(),
        }
    }
}
