use anyhow::Result;
use async_channel::Receiver;
use tracing::trace;

use crate::types::{FailedFile, JobResult, JobStatus, SharedRunReport};

/// Terminal pipeline stage: drains per-file results and folds them into the
/// shared run report. Runs until every worker has dropped its sender, so a
/// cancelled run still ends with a consistent partial summary.
pub struct ResultAggregator {
    receiver: Receiver<JobResult>,
    report: SharedRunReport,
}

impl ResultAggregator {
    pub fn new(receiver: Receiver<JobResult>, report: SharedRunReport) -> Self {
        Self { receiver, report }
    }

    pub async fn aggregate(&self) -> Result<()> {
        trace!("result aggregator has started.");

        while let Ok(result) = self.receiver.recv().await {
            record_result(&self.report, result);
        }

        trace!("result aggregator has been completed.");
        Ok(())
    }
}

pub fn record_result(report: &SharedRunReport, result: JobResult) {
    let mut report = report.lock().unwrap();

    report.planned_units += result.planned_units;
    report.bytes_transferred += result.bytes_transferred;

    match result.status {
        JobStatus::Succeeded => report.files_succeeded += 1,
        JobStatus::Skipped => report.files_skipped += 1,
        JobStatus::Failed(reason) => {
            report.files_failed += 1;
            report.failed_files.push(FailedFile {
                key: result.key,
                reason,
            });
        }
    }
}

/// Records a file that never reached the upload workers (filtered out, or
/// dropped at planning time).
pub fn record_skip(report: &SharedRunReport, _key: &str) {
    let mut report = report.lock().unwrap();
    report.files_skipped += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunReport;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn job_result(key: &str, status: JobStatus, bytes: u64, units: u64) -> JobResult {
        JobResult {
            key: key.to_string(),
            status,
            bytes_transferred: bytes,
            planned_units: units,
            elapsed: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn aggregate_mixed_results() {
        init_dummy_tracing_subscriber();

        let report = Arc::new(Mutex::new(RunReport::default()));
        let (sender, receiver) = async_channel::bounded::<JobResult>(1000);
        let aggregator = ResultAggregator::new(receiver, report.clone());

        sender
            .send(job_result("data1", JobStatus::Succeeded, 100, 1))
            .await
            .unwrap();
        sender
            .send(job_result("data2", JobStatus::Skipped, 0, 0))
            .await
            .unwrap();
        sender
            .send(job_result(
                "data3",
                JobStatus::Failed("authentication failure".to_string()),
                0,
                4,
            ))
            .await
            .unwrap();
        sender.close();

        aggregator.aggregate().await.unwrap();

        let report = report.lock().unwrap();
        assert_eq!(report.files_succeeded, 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.planned_units, 5);
        assert_eq!(report.bytes_transferred, 100);
        assert_eq!(report.failed_files.len(), 1);
        assert_eq!(report.failed_files[0].key, "data3");
        assert_eq!(report.failed_files[0].reason, "authentication failure");
    }

    #[tokio::test]
    async fn concurrent_recording_loses_no_updates() {
        init_dummy_tracing_subscriber();

        let report = Arc::new(Mutex::new(RunReport::default()));

        let mut join_handles = Vec::new();
        for worker_index in 0..8 {
            let report = report.clone();
            join_handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    record_result(
                        &report,
                        job_result(
                            &format!("data-{worker_index}-{i}"),
                            JobStatus::Succeeded,
                            1,
                            1,
                        ),
                    );
                }
            }));
        }

        for join_handle in join_handles {
            join_handle.await.unwrap();
        }

        let report = report.lock().unwrap();
        assert_eq!(report.files_succeeded, 800);
        assert_eq!(report.bytes_transferred, 800);
    }

    #[test]
    fn snapshot_while_recording() {
        init_dummy_tracing_subscriber();

        let report = Arc::new(Mutex::new(RunReport::default()));
        record_result(&report, job_result("data1", JobStatus::Succeeded, 10, 1));

        let snapshot = report.lock().unwrap().clone();
        record_result(&report, job_result("data2", JobStatus::Succeeded, 10, 1));

        assert_eq!(snapshot.files_succeeded, 1);
        assert_eq!(report.lock().unwrap().files_succeeded, 2);
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
