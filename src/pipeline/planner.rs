use anyhow::Result;
use tracing::{trace, warn};

use super::stage::{SendResult, Stage};
use crate::config::TransferConfig;
use crate::pipeline::aggregator;
use crate::types::UploadStatistics::UploadSkip;
use crate::types::{
    ByteRange, FileEntry, SharedRunReport, TransferPlan, TransferUnit, UploadMethod,
};

/// Backend limit on the number of parts of a multipart upload.
pub const MAX_PARTS_PER_UPLOAD: u64 = 10_000;

/// Computes the transfer plan for one file. Deterministic for identical
/// inputs and configuration.
pub fn plan_for_entry(entry: &FileEntry, transfer_config: &TransferConfig) -> TransferPlan {
    if !transfer_config.is_multipart_upload_required(entry.size) {
        let unit = TransferUnit {
            key: entry.key.clone(),
            source_path: entry.path.clone(),
            part_number: 1,
            range: ByteRange {
                offset: 0,
                length: entry.size,
            },
        };

        return TransferPlan {
            entry: entry.clone(),
            method: UploadMethod::SingleShot,
            units: vec![unit],
        };
    }

    // If the configured part size would exceed the part count limit, the
    // part size is raised, never the part count.
    let mut chunksize = transfer_config.multipart_chunksize;
    if entry.size.div_ceil(chunksize) > MAX_PARTS_PER_UPLOAD {
        chunksize = entry.size.div_ceil(MAX_PARTS_PER_UPLOAD);
    }

    let mut units = Vec::new();
    let mut part_number = 1;
    let mut remaining_bytes = entry.size;
    let mut offset = 0;

    while 0 < remaining_bytes {
        let length = if remaining_bytes < chunksize {
            remaining_bytes
        } else {
            chunksize
        };

        units.push(TransferUnit {
            key: entry.key.clone(),
            source_path: entry.path.clone(),
            part_number,
            range: ByteRange { offset, length },
        });

        offset += length;
        remaining_bytes -= length;
        part_number += 1;
    }

    TransferPlan {
        entry: entry.clone(),
        method: UploadMethod::Multipart,
        units,
    }
}

/// Pipeline stage converting enumerated files into transfer plans. Files
/// that disappeared or changed size since enumeration are skipped; the run
/// continues.
pub struct TransferPlanner {
    base: Stage<FileEntry, TransferPlan>,
    report: SharedRunReport,
}

impl TransferPlanner {
    pub fn new(base: Stage<FileEntry, TransferPlan>, report: SharedRunReport) -> Self {
        Self { base, report }
    }

    pub async fn plan(&self) -> Result<()> {
        trace!("transfer planner has started.");

        loop {
            tokio::select! {
                recv_result = self.base.receiver.as_ref().unwrap().recv() => {
                    match recv_result {
                        Ok(entry) => {
                            let Some(entry) = self.refresh_entry(entry).await else {
                                continue;
                            };

                            let plan = plan_for_entry(&entry, &self.base.config.transfer_config);
                            if self.base.send(plan).await? == SendResult::Closed {
                                return Ok(());
                            }
                        },
                        Err(_) => {
                            trace!("transfer planner has been completed.");
                            break;
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    trace!("transfer planner has been cancelled.");
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Re-stats the file. Returns None when the file is gone or its size
    /// changed since enumeration; the file is recorded as skipped.
    async fn refresh_entry(&self, entry: FileEntry) -> Option<FileEntry> {
        let metadata = match tokio::fs::metadata(&entry.path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.skip_entry(&entry, &format!("file disappeared before planning: {e}"))
                    .await;
                return None;
            }
        };

        if metadata.len() != entry.size {
            self.skip_entry(
                &entry,
                &format!(
                    "size changed before planning: {} -> {}",
                    entry.size,
                    metadata.len()
                ),
            )
            .await;
            return None;
        }

        Some(entry)
    }

    async fn skip_entry(&self, entry: &FileEntry, reason: &str) {
        warn!(key = entry.key, reason = reason, "planning skipped the file.");

        self.base.set_warning();
        self.base
            .send_stats(UploadSkip {
                key: entry.key.clone(),
            })
            .await;

        aggregator::record_skip(&self.report, &entry.key);
    }
}
