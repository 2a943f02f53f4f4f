//! Programmable in-memory backend used by the pipeline and uploader tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::types::CompletedPart;

use crate::storage::StorageTrait;
use crate::types::UploadStatistics::UploadBytes;
use crate::types::error::S3bulkError;
use crate::types::{ByteRange, UploadStatistics};

/// Operation selectors for failure injection.
pub const OP_PUT_OBJECT: i32 = 0;
pub const OP_CREATE_MULTIPART: i32 = -1;
pub const OP_COMPLETE_MULTIPART: i32 = -2;

#[derive(Default)]
pub struct MockState {
    pub transfer_calls: AtomicU64,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub completed_keys: Mutex<Vec<String>>,
    pub aborted_uploads: Mutex<Vec<String>>,
    pub attempts: Mutex<HashMap<(String, i32), u32>>,
    transient_failures: Mutex<HashMap<(String, i32), u32>>,
    permanent_failures: Mutex<HashMap<(String, i32), String>>,
}

#[derive(Clone)]
pub struct MockStorage {
    bucket: String,
    stats_sender: Sender<UploadStatistics>,
    latency: Duration,
    pub state: Arc<MockState>,
}

impl MockStorage {
    pub fn new(stats_sender: Sender<UploadStatistics>) -> Self {
        Self {
            bucket: "mock-bucket".to_string(),
            stats_sender,
            latency: Duration::from_millis(0),
            state: Arc::new(MockState::default()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The next `count` calls for (key, op) fail with a transient error.
    pub fn fail_transient(&self, key: &str, op: i32, count: u32) {
        self.state
            .transient_failures
            .lock()
            .unwrap()
            .insert((key.to_string(), op), count);
    }

    /// Every call for (key, op) fails permanently with the given reason.
    pub fn fail_permanent(&self, key: &str, op: i32, reason: &str) {
        self.state
            .permanent_failures
            .lock()
            .unwrap()
            .insert((key.to_string(), op), reason.to_string());
    }

    pub fn attempts(&self, key: &str, op: i32) -> u32 {
        *self
            .state
            .attempts
            .lock()
            .unwrap()
            .get(&(key.to_string(), op))
            .unwrap_or(&0)
    }

    fn enter(&self) {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn record_attempt(&self, key: &str, op: i32) {
        *self
            .state
            .attempts
            .lock()
            .unwrap()
            .entry((key.to_string(), op))
            .or_insert(0) += 1;
    }

    fn take_failure(&self, key: &str, op: i32) -> Result<()> {
        if let Some(reason) = self
            .state
            .permanent_failures
            .lock()
            .unwrap()
            .get(&(key.to_string(), op))
        {
            return Err(anyhow!(S3bulkError::PermanentTransfer(reason.clone())));
        }

        let mut transient_failures = self.state.transient_failures.lock().unwrap();
        if let Some(remaining) = transient_failures.get_mut(&(key.to_string(), op)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow!(S3bulkError::TransientTransfer(
                    "simulated throttling".to_string()
                )));
            }
        }

        Ok(())
    }

    async fn send_stats(&self, stats: UploadStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        _source_path: &Path,
        size: u64,
        _content_type: Option<String>,
    ) -> Result<()> {
        self.record_attempt(key, OP_PUT_OBJECT);
        self.enter();
        tokio::time::sleep(self.latency).await;
        let result = self.take_failure(key, OP_PUT_OBJECT);
        self.exit();
        result?;

        self.state.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .completed_keys
            .lock()
            .unwrap()
            .push(key.to_string());
        self.send_stats(UploadBytes(size)).await;

        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        _content_type: Option<String>,
    ) -> Result<String> {
        self.record_attempt(key, OP_CREATE_MULTIPART);
        self.take_failure(key, OP_CREATE_MULTIPART)?;

        Ok(format!("upload-id-{key}"))
    }

    async fn upload_part(
        &self,
        key: &str,
        _upload_id: &str,
        part_number: i32,
        _source_path: &Path,
        range: ByteRange,
    ) -> Result<CompletedPart> {
        self.record_attempt(key, part_number);
        self.enter();
        tokio::time::sleep(self.latency).await;
        let result = self.take_failure(key, part_number);
        self.exit();
        result?;

        self.state.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.send_stats(UploadBytes(range.length)).await;

        Ok(CompletedPart::builder()
            .e_tag(format!("\"etag-{part_number}\""))
            .part_number(part_number)
            .build())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        _upload_id: &str,
        _parts: Vec<CompletedPart>,
    ) -> Result<()> {
        self.record_attempt(key, OP_COMPLETE_MULTIPART);
        self.take_failure(key, OP_COMPLETE_MULTIPART)?;

        self.state
            .completed_keys
            .lock()
            .unwrap()
            .push(key.to_string());

        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.state
            .aborted_uploads
            .lock()
            .unwrap()
            .push(format!("{key}:{upload_id}"));

        Ok(())
    }

    fn get_stats_sender(&self) -> &Sender<UploadStatistics> {
        &self.stats_sender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn transient_failures_are_consumed() {
        let (stats_sender, _stats_receiver) = async_channel::unbounded();
        let storage = MockStorage::new(stats_sender);
        storage.fail_transient("data1", OP_PUT_OBJECT, 2);

        let path = PathBuf::from("data1");
        assert!(
            storage
                .put_object("data1", &path, 1, None)
                .await
                .is_err()
        );
        assert!(
            storage
                .put_object("data1", &path, 1, None)
                .await
                .is_err()
        );
        storage.put_object("data1", &path, 1, None).await.unwrap();

        assert_eq!(storage.attempts("data1", OP_PUT_OBJECT), 3);
        assert_eq!(storage.state.transfer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_failures_always_fail() {
        let (stats_sender, _stats_receiver) = async_channel::unbounded();
        let storage = MockStorage::new(stats_sender);
        storage.fail_permanent("data1", OP_PUT_OBJECT, "authentication failure");

        let path = PathBuf::from("data1");
        for _ in 0..3 {
            let result = storage.put_object("data1", &path, 1, None).await;
            assert!(result.is_err());
        }

        assert_eq!(storage.state.transfer_calls.load(Ordering::SeqCst), 0);
    }
}
