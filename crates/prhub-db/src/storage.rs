//! MinIO / S3-compatible object storage client.
//!
//! Uploads land under `temp/` and are moved to `permanent/` once a moderator
//! approves them. Downloads go through presigned URLs unless a public CDN base
//! is configured.

use anyhow::{Context, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Builder as S3Builder, Credentials, Region},
    primitives::ByteStream,
};
use chrono::{DateTime, Datelike, Utc};
use prhub_common::config::StorageConfig;
use prhub_common::models::StorageFolder;
use std::time::Duration;
use uuid::Uuid;

/// Presigned download links stay valid this long.
pub const PRESIGNED_URL_TTL_SECS: u64 = 3600;

/// S3/MinIO storage client; wraps the AWS SDK.
#[derive(Clone)]
pub struct StorageClient {
    inner: Client,
    bucket: String,
    public_url: Option<String>,
}

impl StorageClient {
    pub fn new(cfg: &StorageConfig) -> Result<Self> {
        if cfg.bucket.is_empty() {
            anyhow::bail!("storage.bucket must not be empty");
        }

        let creds = Credentials::new(&cfg.access_key, &cfg.secret_key, None, None, "prhub-storage");

        let s3_cfg = S3Builder::new()
            .endpoint_url(&cfg.endpoint)
            .credentials_provider(creds)
            .region(Region::new(cfg.region.clone()))
            // Path-style URLs (required for MinIO)
            .force_path_style(true)
            .behavior_version(BehaviorVersion::latest())
            .build();

        Ok(Self {
            inner: Client::from_conf(s3_cfg),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.clone().filter(|u| !u.is_empty()),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload bytes to the given key.
    pub async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("Failed to upload {key} to object storage"))?;

        Ok(())
    }

    /// Server-side copy within the bucket.
    pub async fn copy_object(&self, from: &str, to: &str) -> Result<()> {
        self.inner
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from))
            .key(to)
            .send()
            .await
            .with_context(|| format!("Failed to copy {from} to {to}"))?;

        Ok(())
    }

    /// Generate a download URL valid for `expiry_secs`.
    pub async fn presigned_get_url(&self, key: &str, expiry_secs: u64) -> Result<String> {
        if let Some(url) = self.public_url(key) {
            return Ok(url);
        }

        let presigning_cfg = PresigningConfig::expires_in(Duration::from_secs(expiry_secs))
            .context("Failed to build presigning config")?;

        let req = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_cfg)
            .await
            .with_context(|| format!("Failed to create presigned URL for {key}"))?;

        Ok(req.uri().to_string())
    }

    /// Direct link through the public CDN base, when one is configured.
    pub fn public_url(&self, key: &str) -> Option<String> {
        self.public_url
            .as_ref()
            .map(|base| format!("{}/{}/{}", base.trim_end_matches('/'), &self.bucket, key))
    }

    /// Delete an object by its storage key.
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete {key} from object storage"))?;

        Ok(())
    }

    /// Ensure the bucket exists; create it if absent.
    pub async fn ensure_bucket(&self) -> Result<()> {
        match self.inner.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                tracing::debug!(bucket = %self.bucket, "Bucket already exists");
                Ok(())
            }
            Err(_) => {
                tracing::info!(bucket = %self.bucket, "Bucket does not exist, creating");
                self.inner
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .context("Failed to create object storage bucket")?;
                Ok(())
            }
        }
    }
}

/// The object operations approval needs; lets moderation run against a
/// stand-in bucket in tests.
pub trait ObjectStore {
    fn copy_object(&self, from: &str, to: &str) -> impl Future<Output = Result<()>> + Send;
    fn delete_object(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

impl ObjectStore for StorageClient {
    fn copy_object(&self, from: &str, to: &str) -> impl Future<Output = Result<()>> + Send {
        StorageClient::copy_object(self, from, to)
    }

    fn delete_object(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        StorageClient::delete_object(self, key)
    }
}

/// Lowercased extension of `filename`, or the one implied by its MIME type.
pub fn extension_for(filename: &str, content_type: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .or_else(|| {
            mime_guess::get_mime_extensions_str(content_type)
                .and_then(|exts| exts.first())
                .map(|e| e.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// `temp/{uploader}/{file}.{ext}`
pub fn temp_key(uploader_id: Uuid, file_id: Uuid, ext: &str) -> String {
    format!("{}/{}/{}.{}", StorageFolder::Temp, uploader_id, file_id, ext)
}

/// `permanent/{yyyy}/{mm}/{file}-{attempt}.{ext}`, keeping the extension of
/// `temp_key`. Each approval attempt copies to its own key.
pub fn permanent_key(temp_key: &str, file_id: Uuid, attempt: Uuid, now: DateTime<Utc>) -> String {
    let ext = temp_key
        .rsplit_once('/')
        .map_or(temp_key, |(_, name)| name)
        .rsplit_once('.')
        .map_or("bin", |(_, ext)| ext);
    format!(
        "{}/{:04}/{:02}/{}-{}.{}",
        StorageFolder::Permanent,
        now.year(),
        now.month(),
        file_id,
        attempt.simple(),
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn extensions() {
        assert_eq!(extension_for("Poster.PNG", "image/png"), "png");
        assert_eq!(extension_for("scan", "application/pdf"), "pdf");
        assert_eq!(extension_for("weird.$$$", "application/x-unknown-thing"), "bin");
    }

    #[test]
    fn temp_then_permanent_keys() {
        let uploader = Uuid::nil();
        let file = Uuid::now_v7();
        let temp = temp_key(uploader, file, "jpg");
        assert!(temp.starts_with("temp/00000000-0000-0000-0000-000000000000/"));
        assert!(temp.ends_with(".jpg"));

        let when = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        let attempt = Uuid::now_v7();
        let perm = permanent_key(&temp, file, attempt, when);
        assert_eq!(perm, format!("permanent/2026/03/{file}-{}.jpg", attempt.simple()));
        assert_ne!(perm, permanent_key(&temp, file, Uuid::now_v7(), when));
    }

    #[test]
    fn permanent_key_without_extension() {
        let file = Uuid::nil();
        let when = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        assert_eq!(
            permanent_key("temp/x/noext", file, Uuid::nil(), when),
            format!("permanent/2026/11/{file}-00000000000000000000000000000000.bin")
        );
    }
}
