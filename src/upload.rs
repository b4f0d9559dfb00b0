// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Object storage upload.
//!
//! Uploads go to any S3 compatible store. Objects are keyed by upload month,
//! i.e., `YYYY/MM/<filename>`, and served from a public base URL that may
//! differ from the API endpoint (a CDN domain for example).
//!
//! # Timeout
//!
//! One timeout covers the whole upload, not each request. When it fires the
//! upload future is dropped. Nothing is cleaned up remotely, a multipart
//! upload that was never completed does not materialize as an object.

use crate::config::{Credentials, UploadSettings};

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials as S3Credentials, Region},
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

/// Objects above this size go through multipart upload.
pub const MULTIPART_THRESHOLD: usize = 8 * 1024 * 1024;

/// Size of each multipart chunk, S3 requires at least 5 MiB.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// Check if an upload of `size` bytes reports progress part by part.
///
/// Smaller bodies go out in one request, which only reports its start and
/// its end.
pub fn reports_partial_progress(size: u64) -> bool {
    size > MULTIPART_THRESHOLD as u64
}

/// Destination of uploaded bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store body under key.
    ///
    /// Progress is reported as total bytes sent so far.
    ///
    /// # Errors
    ///
    /// - Return [`UploadError::Store`] if the store rejects the object.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()>;
}

/// Object store backed by an S3 compatible API.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Construct new S3 store from credentials.
    ///
    /// Uses path-style addressing, which every S3 compatible provider
    /// understands.
    pub fn new(credentials: &Credentials, region: &str) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&credentials.endpoint)
            .region(Region::new(region.to_string()))
            .credentials_provider(S3Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                None,
                None,
                "share",
            ))
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: credentials.bucket.clone(),
        }
    }

    async fn put_single(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| UploadError::Store(err.to_string()))?;

        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| UploadError::Store(err.to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| UploadError::Store("no upload id returned".into()))?
            .to_string();

        match self.upload_parts(key, &upload_id, body, progress).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
                    .send()
                    .await
                    .map_err(|err| UploadError::Store(err.to_string()))?;
                Ok(())
            }
            Err(err) => {
                let abort = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(abort_err) = abort {
                    warn!("failed to abort multipart upload {upload_id}: {abort_err}");
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        body: Bytes,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut sent = 0u64;

        for (idx, offset) in (0..body.len()).step_by(PART_SIZE).enumerate() {
            let end = body.len().min(offset + PART_SIZE);
            let chunk = body.slice(offset..end);
            let part_number = i32::try_from(idx + 1)
                .map_err(|_| UploadError::Store("too many parts".into()))?;

            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|err| UploadError::Store(err.to_string()))?;
            let etag = uploaded
                .e_tag()
                .ok_or_else(|| UploadError::Store(format!("no etag returned for part {part_number}")))?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );
            sent += (end - offset) as u64;
            progress(sent);
            debug!("uploaded part {part_number} of {key}");
        }

        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()> {
        let size = body.len() as u64;
        if !reports_partial_progress(size) {
            progress(0);
            self.put_single(key, body, content_type).await?;
            progress(size);
            Ok(())
        } else {
            self.put_multipart(key, body, content_type, progress).await
        }
    }
}

impl Debug for S3Store {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// Date partitioned object key.
pub fn object_key(filename: &str, now: DateTime<Utc>) -> String {
    format!("{}/{filename}", now.format("%Y/%m"))
}

/// Public URL of an object, every key segment percent-encoded.
pub fn public_url(base: &str, key: &str) -> String {
    let path = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{path}", base.trim_end_matches('/'))
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub url: String,
    pub key: String,
    pub size: u64,
}

/// Uploads buffers and reports where they can be found.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    public_url: String,
    timeout: Duration,
}

impl Uploader {
    /// Construct new uploader.
    ///
    /// Trailing slashes of the public URL are ignored.
    pub fn new(store: Arc<dyn ObjectStore>, public_url: impl Into<String>, timeout: Duration) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self {
            store,
            public_url,
            timeout,
        }
    }

    /// Construct uploader talking to S3 with target credentials and settings.
    pub fn s3(credentials: &Credentials, settings: &UploadSettings) -> Self {
        let store = S3Store::new(credentials, &settings.region);
        Self::new(
            Arc::new(store),
            credentials.public_base(settings),
            settings.timeout(),
        )
    }

    /// Upload buffer under a date partitioned key.
    ///
    /// Progress is reported as `(loaded, total)` bytes.
    ///
    /// # Errors
    ///
    /// - Return [`UploadError::Timeout`] if the upload takes too long.
    /// - Return [`UploadError::Store`] if the store rejects the object.
    #[instrument(skip(self, data, progress), level = "debug")]
    pub async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        mime: &str,
        progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> Result<UploadResult> {
        let key = object_key(filename, Utc::now());
        let size = data.len() as u64;
        let body = Bytes::copy_from_slice(data);
        let report = |loaded: u64| progress(loaded.min(size), size);

        let started = Instant::now();
        tokio::time::timeout(self.timeout, self.store.put(&key, body, mime, &report))
            .await
            .map_err(|_| UploadError::Timeout(self.timeout))??;
        info!("uploaded {size} bytes to {key} in {:.2?}", started.elapsed());

        Ok(UploadResult {
            url: public_url(&self.public_url, &key),
            key,
            size,
        })
    }
}

impl Debug for Uploader {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Uploader")
            .field("public_url", &self.public_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("object store rejected upload: {0}")]
    Store(String),
}

/// Friendly result alias :3
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
