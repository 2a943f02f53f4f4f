use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use leaky_bucket::RateLimiter;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::trace;

use crate::Config;
use crate::storage::{Storage, StorageFactory, StorageTrait};
use crate::types::UploadStatistics::UploadBytes;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ByteRange, TargetPath, UploadStatistics};

pub mod client_builder;

pub struct S3StorageFactory {}

#[async_trait]
impl StorageFactory for S3StorageFactory {
    async fn create(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<UploadStatistics>,
        rate_limit_objects: Option<Arc<RateLimiter>>,
        rate_limit_bandwidth: Option<Arc<RateLimiter>>,
    ) -> Storage {
        S3Storage::create(
            config,
            cancellation_token,
            stats_sender,
            rate_limit_objects,
            rate_limit_bandwidth,
        )
        .await
    }
}

#[derive(Clone)]
struct S3Storage {
    target: TargetPath,
    client: Client,
    #[allow(dead_code)]
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<UploadStatistics>,
    rate_limit_objects: Option<Arc<RateLimiter>>,
    rate_limit_bandwidth: Option<Arc<RateLimiter>>,
}

impl S3Storage {
    async fn create(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<UploadStatistics>,
        rate_limit_objects: Option<Arc<RateLimiter>>,
        rate_limit_bandwidth: Option<Arc<RateLimiter>>,
    ) -> Storage {
        let client = config.client_config.create_client().await;

        let storage = S3Storage {
            target: config.target.clone(),
            client,
            cancellation_token,
            stats_sender,
            rate_limit_objects,
            rate_limit_bandwidth,
        };

        Box::new(storage)
    }

    async fn exec_rate_limit_objects_per_sec(&self) {
        if let Some(rate_limit_objects) = &self.rate_limit_objects {
            rate_limit_objects.acquire(1).await;
        }
    }

    async fn exec_rate_limit_bandwidth(&self, length: u64) {
        if let Some(rate_limit_bandwidth) = &self.rate_limit_bandwidth {
            rate_limit_bandwidth.acquire(length as usize).await;
        }
    }

    async fn send_stats(&self, stats: UploadStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    async fn read_range(&self, source_path: &Path, range: ByteRange) -> Result<Vec<u8>> {
        let mut file = tokio::fs::File::open(source_path)
            .await
            .context("tokio::fs::File::open() failed.")?;
        file.seek(SeekFrom::Start(range.offset))
            .await
            .context("tokio::io::AsyncSeekExt::seek() failed.")?;

        let mut buffer = Vec::<u8>::with_capacity(range.length as usize);
        buffer.resize_with(range.length as usize, Default::default);
        file.read_exact(buffer.as_mut_slice())
            .await
            .context("tokio::io::AsyncReadExt::read_exact() failed.")?;

        Ok(buffer)
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    fn bucket(&self) -> &str {
        &self.target.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        source_path: &Path,
        size: u64,
        content_type: Option<String>,
    ) -> Result<()> {
        self.exec_rate_limit_objects_per_sec().await;
        self.exec_rate_limit_bandwidth(size).await;

        let body = ByteStream::from_path(source_path)
            .await
            .context("aws_sdk_s3::primitives::ByteStream::from_path() failed.")?;

        let put_object_output = self
            .client
            .put_object()
            .bucket(&self.target.bucket)
            .key(self.target.object_key(key))
            .content_length(size as i64)
            .set_content_type(content_type)
            .body(body)
            .send()
            .await
            .context("aws_sdk_s3::client::Client put_object() failed.")?;

        trace!(key = key, "{put_object_output:?}");

        self.send_stats(UploadBytes(size)).await;

        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<String>,
    ) -> Result<String> {
        self.exec_rate_limit_objects_per_sec().await;

        let create_multipart_upload_output = self
            .client
            .create_multipart_upload()
            .bucket(&self.target.bucket)
            .key(self.target.object_key(key))
            .set_content_type(content_type)
            .send()
            .await
            .context("aws_sdk_s3::client::Client create_multipart_upload() failed.")?;

        trace!(key = key, "{create_multipart_upload_output:?}");

        Ok(create_multipart_upload_output
            .upload_id()
            .unwrap()
            .to_string())
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        source_path: &Path,
        range: ByteRange,
    ) -> Result<CompletedPart> {
        self.exec_rate_limit_bandwidth(range.length).await;

        let buffer = self.read_range(source_path, range).await?;

        let upload_part_output = self
            .client
            .upload_part()
            .bucket(&self.target.bucket)
            .key(self.target.object_key(key))
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(range.length as i64)
            .body(ByteStream::from(buffer))
            .send()
            .await
            .context("aws_sdk_s3::client::Client upload_part() failed.")?;

        trace!(key = key, part_number = part_number, "{upload_part_output:?}");

        self.send_stats(UploadBytes(range.length)).await;

        Ok(CompletedPart::builder()
            .e_tag(upload_part_output.e_tag().unwrap())
            .part_number(part_number)
            .build())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        let complete_multipart_upload_output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.target.bucket)
            .key(self.target.object_key(key))
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .context("aws_sdk_s3::client::Client complete_multipart_upload() failed.")?;

        trace!(
            key = key,
            upload_id = upload_id,
            "{complete_multipart_upload_output:?}"
        );

        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        let abort_multipart_upload_output = self
            .client
            .abort_multipart_upload()
            .bucket(&self.target.bucket)
            .key(self.target.object_key(key))
            .upload_id(upload_id)
            .send()
            .await
            .context("aws_sdk_s3::client::Client abort_multipart_upload() failed.")?;

        trace!(
            key = key,
            upload_id = upload_id,
            "{abort_multipart_upload_output:?}"
        );

        Ok(())
    }

    fn get_stats_sender(&self) -> &Sender<UploadStatistics> {
        &self.stats_sender
    }
}
