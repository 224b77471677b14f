use std::sync::Arc;

use anyhow::Context;

use crate::config::{AppConfig, UploadBackend};
use crate::register::repo::{PgUserStore, UserStore};
use crate::storage::{DiskIntake, FileIntake, S3Intake};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub files: Arc<dyn FileIntake>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(config.database.connect_options())
            .await
            .context("connect to database")?;
        tracing::info!(host = %config.database.host, db = %config.database.name, "connected to database");

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let files = match &config.upload {
            UploadBackend::Disk(dir) => Arc::new(DiskIntake::new(dir)) as Arc<dyn FileIntake>,
            UploadBackend::S3(s3) => Arc::new(
                S3Intake::new(
                    &s3.endpoint,
                    &s3.bucket,
                    &s3.access_key,
                    &s3.secret_key,
                    &s3.region,
                )
                .await?,
            ) as Arc<dyn FileIntake>,
        };

        Ok(Self::from_parts(config, Arc::new(PgUserStore::new(db)), files))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        files: Arc<dyn FileIntake>,
    ) -> Self {
        Self {
            config,
            users,
            files,
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Arc<AppConfig> {
        use crate::config::DatabaseConfig;

        Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database: DatabaseConfig {
                username: "test".into(),
                password: "test".into(),
                host: "localhost".into(),
                port: 5432,
                name: "registration_form".into(),
                max_connections: 1,
            },
            pages_dir: "pages".into(),
            upload: UploadBackend::Disk(std::env::temp_dir().join("registration-test-uploads")),
            max_upload_bytes: 1024 * 1024,
        })
    }
}
