use std::path::PathBuf;

use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::debug;

/// A file part pulled out of a form submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Accepts an uploaded file and hands back a durable reference to it.
#[async_trait]
pub trait FileIntake: Send + Sync {
    async fn store(&self, file: UploadedFile) -> anyhow::Result<String>;
}

/// `<unix-millis>-<basename>`, with any directory part of the client-supplied name dropped.
pub fn unique_file_name(original: &str, unix_millis: i128) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("upload");
    format!("{}-{}", unix_millis, base)
}

fn now_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

/// Writes uploads into a local directory.
#[derive(Clone)]
pub struct DiskIntake {
    dir: PathBuf,
}

impl DiskIntake {
    const MAX_ATTEMPTS: i128 = 16;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileIntake for DiskIntake {
    async fn store(&self, file: UploadedFile) -> anyhow::Result<String> {
        use tokio::io::AsyncWriteExt;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create upload dir {}", self.dir.display()))?;

        let started = now_millis();
        for attempt in 0..Self::MAX_ATTEMPTS {
            let path = self
                .dir
                .join(unique_file_name(&file.file_name, started + attempt));
            let mut out = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("open {}", path.display()));
                }
            };
            out.write_all(&file.body)
                .await
                .with_context(|| format!("write {}", path.display()))?;
            out.flush().await?;

            let reference = path.display().to_string();
            debug!(path = %reference, bytes = file.body.len(), "upload stored on disk");
            return Ok(reference);
        }
        anyhow::bail!("could not find a free name for upload {:?}", file.file_name)
    }
}

/// Writes uploads into an S3 / MinIO bucket under `uploads/`.
#[derive(Clone)]
pub struct S3Intake {
    client: Client,
    bucket: String,
}

impl S3Intake {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl FileIntake for S3Intake {
    async fn store(&self, file: UploadedFile) -> anyhow::Result<String> {
        let key = format!("uploads/{}", unique_file_name(&file.file_name, now_millis()));
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.body))
            .content_type(file.content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        debug!(bucket = %self.bucket, key = %key, "upload stored in bucket");
        Ok(key)
    }
}
