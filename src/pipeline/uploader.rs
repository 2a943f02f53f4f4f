use anyhow::{Context, Result, anyhow};
use aws_sdk_s3::types::CompletedPart;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, trace, warn};

use super::stage::{SendResult, Stage};
use crate::pipeline::retry::{RetryController, RetryPolicy};
use crate::storage::{Storage, guess_content_type};
use crate::types::UploadStatistics::{UploadComplete, UploadError};
use crate::types::error::S3bulkError;
use crate::types::{JobResult, JobStatus, TransferPlan, UploadMethod};

/// Upload worker: pulls transfer plans from the shared queue and executes
/// their units, joining all unit completions before the file's result is
/// finalized.
pub struct ObjectUploader {
    worker_index: u16,
    base: Stage<TransferPlan, JobResult>,
    target: Storage,
}

impl ObjectUploader {
    pub fn new(base: Stage<TransferPlan, JobResult>, worker_index: u16, target: Storage) -> Self {
        Self {
            worker_index,
            base,
            target,
        }
    }

    pub async fn upload(&self) -> Result<()> {
        trace!(
            worker_index = self.worker_index,
            "upload worker has started."
        );

        loop {
            tokio::select! {
                recv_result = self.base.receiver.as_ref().unwrap().recv() => {
                    match recv_result {
                        Ok(plan) => {
                            match self.upload_plan(plan).await {
                                Ok(job_result) => {
                                    match &job_result.status {
                                        JobStatus::Succeeded => {
                                            self.base.send_stats(UploadComplete {
                                                key: job_result.key.clone(),
                                            })
                                            .await;
                                        }
                                        JobStatus::Failed(_) => {
                                            self.base.send_stats(UploadError {
                                                key: job_result.key.clone(),
                                            })
                                            .await;
                                        }
                                        JobStatus::Skipped => {}
                                    }

                                    if self.base.send(job_result).await? == SendResult::Closed {
                                        return Ok(());
                                    }
                                }
                                Err(e) => {
                                    if self.base.cancellation_token.is_cancelled() {
                                        info!(
                                            worker_index = self.worker_index,
                                            "upload worker has been cancelled."
                                        );
                                        return Ok(());
                                    }

                                    self.base.cancellation_token.cancel();
                                    error!(
                                        worker_index = self.worker_index,
                                        error = e.to_string(),
                                        "upload worker has been cancelled with error."
                                    );
                                    return Err(anyhow!("upload worker has been cancelled with error."));
                                }
                            }
                        },
                        Err(_) => {
                            trace!(
                                worker_index = self.worker_index,
                                "upload worker has been completed."
                            );
                            break;
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    info!(
                        worker_index = self.worker_index,
                        "upload worker has been cancelled."
                    );
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Executes one plan. Per-file failures become a Failed job result; an
    /// Err is returned only for cancellation and infrastructure failures.
    async fn upload_plan(&self, plan: TransferPlan) -> Result<JobResult> {
        let key = plan.entry.key.clone();
        let planned_units = plan.units.len() as u64;
        let started = Instant::now();

        if self.base.config.dry_run {
            info!(
                worker_index = self.worker_index,
                key = key,
                size = plan.entry.size,
                units = planned_units,
                "dry run. no upload has been performed."
            );

            return Ok(JobResult {
                key,
                status: JobStatus::Succeeded,
                bytes_transferred: plan.entry.size,
                planned_units,
                elapsed: started.elapsed(),
            });
        }

        let content_type =
            guess_content_type(&plan.entry.path, self.base.config.no_guess_mime_type);

        let result = match plan.method {
            UploadMethod::SingleShot => self.upload_single_shot(&plan, content_type).await,
            UploadMethod::Multipart => self.upload_multipart(&plan, content_type).await,
        };

        match result {
            Ok(bytes_transferred) => {
                trace!(
                    worker_index = self.worker_index,
                    key = key,
                    size = bytes_transferred,
                    "upload has been completed."
                );

                Ok(JobResult {
                    key,
                    status: JobStatus::Succeeded,
                    bytes_transferred,
                    planned_units,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) => {
                if matches!(
                    e.downcast_ref::<S3bulkError>(),
                    Some(S3bulkError::Cancelled)
                ) {
                    return Err(e);
                }

                let reason = e.root_cause().to_string();
                error!(
                    worker_index = self.worker_index,
                    key = key,
                    reason = reason,
                    "upload failed."
                );

                Ok(JobResult {
                    key,
                    status: JobStatus::Failed(reason),
                    bytes_transferred: 0,
                    planned_units,
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    async fn upload_single_shot(
        &self,
        plan: &TransferPlan,
        content_type: Option<String>,
    ) -> Result<u64> {
        let unit = &plan.units[0];
        let controller = RetryController::new(
            RetryPolicy::from(self.base.config.retry_config),
            self.base.cancellation_token.clone(),
        );

        let target = &self.target;
        controller
            .execute(&unit.key, unit.part_number, || {
                let content_type = content_type.clone();
                async move {
                    target
                        .put_object(
                            &unit.key,
                            &unit.source_path,
                            unit.range.length,
                            content_type,
                        )
                        .await
                }
            })
            .await?;

        Ok(unit.range.length)
    }

    async fn upload_multipart(
        &self,
        plan: &TransferPlan,
        content_type: Option<String>,
    ) -> Result<u64> {
        let key = plan.entry.key.clone();
        let policy = RetryPolicy::from(self.base.config.retry_config);
        let controller =
            RetryController::new(policy, self.base.cancellation_token.clone());

        let target = &self.target;
        let upload_id = controller
            .execute(&key, 0, || {
                let content_type = content_type.clone();
                let key = key.clone();
                async move { target.create_multipart_upload(&key, content_type).await }
            })
            .await?;

        // Units of one plan run concurrently; the process-wide semaphore
        // caps the number of units in flight across all workers.
        let mut join_handles: Vec<JoinHandle<Result<CompletedPart>>> = Vec::new();
        let mut unit_lengths = Vec::new();

        for unit in plan.units.clone() {
            let target = dyn_clone::clone_box(&*self.target);
            let semaphore = self.base.config.parallel_upload_semaphore.clone();
            let cancellation_token = self.base.cancellation_token.clone();
            let upload_id = upload_id.clone();

            unit_lengths.push(unit.range.length);
            join_handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("tokio::sync::Semaphore::acquire_owned() failed.")?;

                let controller = RetryController::new(policy, cancellation_token);
                let target = &target;
                let unit = &unit;
                let upload_id = upload_id.as_str();

                controller
                    .execute(&unit.key, unit.part_number, || async move {
                        target
                            .upload_part(
                                &unit.key,
                                upload_id,
                                unit.part_number,
                                &unit.source_path,
                                unit.range,
                            )
                            .await
                    })
                    .await
            }));
        }

        // All units are joined before the file is finalized. A failed unit
        // does not interrupt its in-flight siblings.
        let mut completed_parts = Vec::new();
        let mut bytes_transferred: u64 = 0;
        let mut first_error: Option<anyhow::Error> = None;

        for (join_handle, unit_length) in join_handles.into_iter().zip(unit_lengths) {
            match join_handle.await {
                Ok(Ok(completed_part)) => {
                    completed_parts.push(completed_part);
                    bytes_transferred += unit_length;
                }
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error =
                            Some(anyhow!(e).context("upload part task join failed."));
                    }
                }
            }
        }

        if let Some(e) = first_error {
            if let Err(abort_error) = self.target.abort_multipart_upload(&key, &upload_id).await
            {
                warn!(
                    worker_index = self.worker_index,
                    key = key,
                    error = abort_error.to_string(),
                    "failed to abort multipart upload."
                );
            }

            return Err(e);
        }

        let completed_parts_for_retry = completed_parts;
        let complete_result = controller
            .execute(&key, 0, || {
                let key = key.clone();
                let upload_id = upload_id.clone();
                let parts = completed_parts_for_retry.clone();
                async move {
                    target
                        .complete_multipart_upload(&key, &upload_id, parts)
                        .await
                }
            })
            .await;

        if let Err(e) = complete_result {
            if let Err(abort_error) = self.target.abort_multipart_upload(&key, &upload_id).await
            {
                warn!(
                    worker_index = self.worker_index,
                    key = key,
                    error = abort_error.to_string(),
                    "failed to abort multipart upload."
                );
            }

            return Err(e);
        }

        Ok(bytes_transferred)
    }
}
