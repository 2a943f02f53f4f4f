use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use async_channel::Sender;
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::types::UploadStatistics::UploadWarning;
use crate::types::error::S3bulkError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{FileEntry, UploadStatistics};

pub mod fs_util;

/// Lazy enumerator over the source tree. Entries stream into a bounded
/// channel; the walk blocks when downstream stages fall behind, so the
/// whole tree is never held in memory. Symlinks are never followed.
pub struct LocalSource {
    path: PathBuf,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<UploadStatistics>,
    has_warning: Arc<AtomicBool>,
}

impl LocalSource {
    pub fn new(
        path: PathBuf,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<UploadStatistics>,
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            path,
            cancellation_token,
            stats_sender,
            has_warning,
        }
    }

    /// Fails with an enumeration error if the source root is missing or
    /// unreadable. The caller treats this as fatal.
    pub async fn validate_root(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            anyhow!(S3bulkError::Enumeration(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;

        if !metadata.is_dir() {
            return Err(anyhow!(S3bulkError::Enumeration(format!(
                "{}: not a directory",
                self.path.display()
            ))));
        }

        tokio::fs::read_dir(&self.path).await.map_err(|e| {
            anyhow!(S3bulkError::Enumeration(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;

        Ok(())
    }

    pub async fn list_files(
        &self,
        sender: &Sender<FileEntry>,
        warn_as_error: bool,
    ) -> Result<()> {
        for entry in WalkDir::new(&self.path).follow_links(false) {
            if let Err(e) = entry {
                if let Some(inner) = e.io_error() {
                    if inner.kind() == io::ErrorKind::NotFound {
                        continue;
                    }
                }

                let path = e
                    .path()
                    .unwrap_or_else(|| Path::new(""))
                    .to_string_lossy()
                    .to_string();
                self.send_stats(UploadWarning {
                    key: path.to_string(),
                })
                .await;

                let error = e.to_string();
                warn!(path = path, error = error, "failed to list local files.");

                if warn_as_error {
                    return Err(anyhow!("failed to list(): {:?}.", e));
                }
                continue;
            }

            let entry = entry.unwrap();
            if !self.check_dir_entry(&entry, warn_as_error).await? {
                continue;
            }

            if self.cancellation_token.is_cancelled() {
                trace!("list_files() canceled.");
                break;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    let path = entry.path().to_string_lossy().to_string();

                    self.send_stats(UploadWarning {
                        key: path.to_string(),
                    })
                    .await;

                    let error = e.to_string();
                    warn!(path = path, error = error, "failed to read metadata.");

                    if warn_as_error {
                        return Err(anyhow!("failed to metadata(): {:?}.", e));
                    }
                    continue;
                }
            };

            let key = fs_util::key_from_file_path(entry.path(), &self.path);
            let file_entry = FileEntry {
                path: entry.path().to_path_buf(),
                key,
                size: metadata.len(),
                modified: metadata
                    .modified()
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            };

            if sender
                .send(file_entry)
                .await
                .context("async_channel::Sender::send() failed.")
                .is_err()
            {
                trace!("receiver has been closed.");
                break;
            }
        }

        Ok(())
    }

    async fn check_dir_entry(&self, entry: &DirEntry, warn_as_error: bool) -> Result<bool> {
        if entry.file_type().is_dir() || entry.file_type().is_symlink() {
            return Ok(false);
        }

        let regular_file_check_result =
            fs_util::is_regular_file(&entry.path().to_path_buf()).await;
        if let Err(e) = regular_file_check_result {
            let path = entry.path().to_string_lossy().to_string();

            self.send_stats(UploadWarning {
                key: path.to_string(),
            })
            .await;

            let error = e.to_string();
            let source = e.source();

            warn!(
                path = path,
                error = error,
                source = source,
                "failed to access file."
            );

            if warn_as_error {
                return Err(anyhow!("failed to is_regular_file(): {:?}.", e));
            }

            return Ok(false);
        }

        if !regular_file_check_result.unwrap() {
            let path = entry.path().to_string_lossy().to_string();

            debug!(path = path, "skip non regular file.");

            return Ok(false);
        }

        Ok(true)
    }

    async fn send_stats(&self, stats: UploadStatistics) {
        if matches!(stats, UploadWarning { .. }) {
            self.has_warning.store(true, Ordering::SeqCst);
        }

        let _ = self.stats_sender.send(stats).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::token::create_pipeline_cancellation_token;
    use std::io::Write;

    fn create_source_tree() -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("dir1/dir2")).unwrap();

        for (name, content) in [
            ("data1", &b"12345"[..]),
            ("dir1/data2", &b"1234567890"[..]),
            ("dir1/dir2/data3", &b""[..]),
        ] {
            let mut file = std::fs::File::create(temp_dir.path().join(name)).unwrap();
            file.write_all(content).unwrap();
        }

        temp_dir
    }

    #[tokio::test]
    async fn list_files_all_regular_files() {
        init_dummy_tracing_subscriber();

        let temp_dir = create_source_tree();
        let source = LocalSource::new(
            temp_dir.path().to_path_buf(),
            create_pipeline_cancellation_token(),
            async_channel::unbounded().0,
            Arc::new(AtomicBool::new(false)),
        );

        let (sender, receiver) = async_channel::bounded::<FileEntry>(1000);
        source.list_files(&sender, false).await.unwrap();
        sender.close();

        let mut keys = Vec::new();
        while let Ok(entry) = receiver.recv().await {
            keys.push(entry.key);
        }
        keys.sort();

        assert_eq!(keys, vec!["data1", "dir1/data2", "dir1/dir2/data3"]);
    }

    #[tokio::test]
    async fn list_files_reports_size_and_mtime() {
        init_dummy_tracing_subscriber();

        let temp_dir = create_source_tree();
        let source = LocalSource::new(
            temp_dir.path().to_path_buf(),
            create_pipeline_cancellation_token(),
            async_channel::unbounded().0,
            Arc::new(AtomicBool::new(false)),
        );

        let (sender, receiver) = async_channel::bounded::<FileEntry>(1000);
        source.list_files(&sender, false).await.unwrap();
        sender.close();

        while let Ok(entry) = receiver.recv().await {
            if entry.key == "data1" {
                assert_eq!(entry.size, 5);
                assert!(entry.modified > std::time::SystemTime::UNIX_EPOCH);
            }
        }
    }

    #[tokio::test]
    #[cfg(target_family = "unix")]
    async fn list_files_skips_symlinks() {
        init_dummy_tracing_subscriber();

        let temp_dir = create_source_tree();
        std::os::unix::fs::symlink(
            temp_dir.path().join("dir1"),
            temp_dir.path().join("linked_dir"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("data1"),
            temp_dir.path().join("linked_data1"),
        )
        .unwrap();

        let source = LocalSource::new(
            temp_dir.path().to_path_buf(),
            create_pipeline_cancellation_token(),
            async_channel::unbounded().0,
            Arc::new(AtomicBool::new(false)),
        );

        let (sender, receiver) = async_channel::bounded::<FileEntry>(1000);
        source.list_files(&sender, false).await.unwrap();
        sender.close();

        let mut keys = Vec::new();
        while let Ok(entry) = receiver.recv().await {
            keys.push(entry.key);
        }
        keys.sort();

        assert_eq!(keys, vec!["data1", "dir1/data2", "dir1/dir2/data3"]);
    }

    #[tokio::test]
    async fn list_files_cancelled() {
        init_dummy_tracing_subscriber();

        let temp_dir = create_source_tree();
        let cancellation_token = create_pipeline_cancellation_token();
        let source = LocalSource::new(
            temp_dir.path().to_path_buf(),
            cancellation_token.clone(),
            async_channel::unbounded().0,
            Arc::new(AtomicBool::new(false)),
        );

        cancellation_token.cancel();

        let (sender, receiver) = async_channel::bounded::<FileEntry>(1000);
        source.list_files(&sender, false).await.unwrap();
        sender.close();

        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn validate_root_not_found() {
        init_dummy_tracing_subscriber();

        let source = LocalSource::new(
            PathBuf::from("./not_found_dir_6329313"),
            create_pipeline_cancellation_token(),
            async_channel::unbounded().0,
            Arc::new(AtomicBool::new(false)),
        );

        let result = source.validate_root().await;
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err().downcast_ref::<S3bulkError>(),
            Some(S3bulkError::Enumeration(_))
        ));
    }

    #[tokio::test]
    async fn validate_root_ok() {
        init_dummy_tracing_subscriber();

        let temp_dir = create_source_tree();
        let source = LocalSource::new(
            temp_dir.path().to_path_buf(),
            create_pipeline_cancellation_token(),
            async_channel::unbounded().0,
            Arc::new(AtomicBool::new(false)),
        );

        source.validate_root().await.unwrap();
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
