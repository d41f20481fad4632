use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{info, warn};

use crate::{
    catalog,
    config::{AppConfig, SEED_ADMIN_EMAIL, SEED_ADMIN_USERNAME},
    web::{auth, data, uploads::UploadStore},
};

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: Arc<AppConfig>,
    uploads: UploadStore,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        tokio::fs::create_dir_all(&config.upload_root)
            .await
            .with_context(|| {
                format!(
                    "failed to ensure upload root at {}",
                    config.upload_root.display()
                )
            })?;

        Ok(Self::from_parts(pool, config))
    }

    /// Assembles state from an existing pool without touching the database.
    pub fn from_parts(pool: PgPool, config: AppConfig) -> Self {
        let uploads = UploadStore::new(config.upload_root.clone(), &config.allowed_extensions);
        Self {
            pool,
            config: Arc::new(config),
            uploads,
        }
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(SEED_ADMIN_USERNAME)
                .fetch_one(&self.pool)
                .await
                .context("failed to verify admin presence")?;

        if has_admin {
            return Ok(());
        }

        let password_hash = auth::hash_password(&self.config.admin_password)
            .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

        match auth::insert_user(
            &self.pool,
            SEED_ADMIN_USERNAME,
            Some(SEED_ADMIN_EMAIL),
            &password_hash,
            auth::ROLE_ADMIN,
        )
        .await
        {
            Ok(_) => {
                info!(username = SEED_ADMIN_USERNAME, "seeded admin user");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(auth::UNIQUE_VIOLATION) =>
            {
                warn!("admin user was created concurrently; skipping seed");
                Ok(())
            }
            Err(err) => Err(err).context("failed to insert seed admin user"),
        }
    }

    pub async fn ensure_seed_exhibitions(&self) -> Result<()> {
        let seeded = data::seed_default_exhibitions(&self.pool).await?;
        if seeded > 0 {
            info!(seeded, "seeded default exhibitions");
        }
        Ok(())
    }

    /// Brings files already sitting in the category directories into the catalog.
    pub async fn sync_catalog(&self) -> Result<u64> {
        catalog::import_untracked_files(
            &self.pool,
            self.uploads.root(),
            self.uploads.allowed_extensions(),
        )
        .await
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }
}
