use std::path::PathBuf;

use anyhow::Context;
use sqlx::postgres::PgConnectOptions;

#[derive(Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.name)
    }
}

#[derive(Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Where uploaded profile pictures end up.
#[derive(Debug, Clone)]
pub enum UploadBackend {
    Disk(PathBuf),
    S3(S3Config),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub pages_dir: PathBuf,
    pub upload: UploadBackend,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let username = std::env::var("DATABASE_USERNAME").ok();
        let password = std::env::var("DATABASE_PASSWORD").ok();
        let (Some(username), Some(password)) = (username, password) else {
            anyhow::bail!("DATABASE_USERNAME or DATABASE_PASSWORD not set in environment");
        };

        let database = DatabaseConfig {
            username,
            password,
            host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".into()),
            port: parse_or("DATABASE_PORT", 5432),
            name: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "registration_form".into()),
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
        };

        let upload = match std::env::var("UPLOAD_BACKEND").as_deref() {
            Ok("s3") => UploadBackend::S3(S3Config {
                endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT")?,
                bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET")?,
                access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY")?,
                secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY")?,
                region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            }),
            Ok("disk") | Err(_) => UploadBackend::Disk(
                std::env::var("UPLOAD_DIR")
                    .unwrap_or_else(|_| "uploads".into())
                    .into(),
            ),
            Ok(other) => anyhow::bail!("unknown UPLOAD_BACKEND {other:?}, expected disk or s3"),
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("PORT", 3000),
            database,
            pages_dir: std::env::var("PAGES_DIR")
                .unwrap_or_else(|_| "pages".into())
                .into(),
            upload,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_missing_or_garbage() {
        std::env::set_var("REGISTRATION_TEST_PORT_GARBAGE", "not-a-port");
        assert_eq!(parse_or::<u16>("REGISTRATION_TEST_PORT_GARBAGE", 3000), 3000);
        assert_eq!(parse_or::<u16>("REGISTRATION_TEST_PORT_UNSET", 8080), 8080);

        std::env::set_var("REGISTRATION_TEST_PORT_SET", "4000");
        assert_eq!(parse_or::<u16>("REGISTRATION_TEST_PORT_SET", 3000), 4000);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = AppConfig {
            host: "0.0.0.0".into(),
            port: 3000,
            database: DatabaseConfig {
                username: "app".into(),
                password: "db-hunter2".into(),
                host: "localhost".into(),
                port: 5432,
                name: "registration_form".into(),
                max_connections: 10,
            },
            pages_dir: "pages".into(),
            upload: UploadBackend::S3(S3Config {
                endpoint: "http://minio:9000".into(),
                bucket: "uploads".into(),
                access_key: "minio".into(),
                secret_key: "s3-hunter2".into(),
                region: "us-east-1".into(),
            }),
            max_upload_bytes: 1024,
        };

        let out = format!("{:?}", config);
        assert!(out.contains("app"));
        assert!(out.contains("<redacted>"));
        assert!(!out.contains("db-hunter2"));
        assert!(!out.contains("s3-hunter2"));
    }
}
