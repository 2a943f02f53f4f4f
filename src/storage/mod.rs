use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::types::CompletedPart;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;

use crate::Config;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ByteRange, UploadStatistics};

pub mod local;
#[cfg(test)]
pub mod mock;
pub mod s3;

pub type Storage = Box<dyn StorageTrait + Send + Sync>;

#[async_trait]
pub trait StorageFactory {
    async fn create(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<UploadStatistics>,
        rate_limit_objects: Option<Arc<RateLimiter>>,
        rate_limit_bandwidth: Option<Arc<RateLimiter>>,
    ) -> Storage;
}

/// Upload surface of the storage backend. One instance is shared by all
/// upload workers; implementations must be cheap to clone.
#[async_trait]
pub trait StorageTrait: DynClone {
    fn bucket(&self) -> &str;
    async fn put_object(
        &self,
        key: &str,
        source_path: &Path,
        size: u64,
        content_type: Option<String>,
    ) -> Result<()>;
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<String>,
    ) -> Result<String>;
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        source_path: &Path,
        range: ByteRange,
    ) -> Result<CompletedPart>;
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()>;
    fn get_stats_sender(&self) -> &Sender<UploadStatistics>;
}

pub fn guess_content_type(path: &Path, no_guess_mime_type: bool) -> Option<String> {
    if no_guess_mime_type {
        return None;
    }

    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn guess_content_type_from_path() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            guess_content_type(&PathBuf::from("dir/data.csv"), false),
            Some("text/csv".to_string())
        );
        assert_eq!(guess_content_type(&PathBuf::from("dir/data.csv"), true), None);
        assert_eq!(guess_content_type(&PathBuf::from("dir/data"), false), None);
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
