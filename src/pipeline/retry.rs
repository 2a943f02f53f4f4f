use std::future::Future;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadError;
use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadError;
use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::operation::upload_part::UploadPartError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use aws_smithy_types::body::SdkBody;
use rand::Rng;
use tracing::{error, trace, warn};

use crate::config::RetryConfig;
use crate::types::UnitState;
use crate::types::error::S3bulkError;
use crate::types::token::PipelineCancellationToken;

const JITTER_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// Splits failures into retryable and terminal ones. Network-level SDK
/// failures, HTTP 5xx, 408 and 429 are transient; every other service
/// response (authentication, invalid request, quota) is permanent.
pub fn classify_error(e: &Error) -> ErrorClass {
    if let Some(error) = e.downcast_ref::<S3bulkError>() {
        return match error {
            S3bulkError::TransientTransfer(_) => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        };
    }

    if let Some(error) = e.downcast_ref::<SdkError<PutObjectError, Response<SdkBody>>>() {
        return classify_sdk_error(error);
    }

    if let Some(error) =
        e.downcast_ref::<SdkError<CreateMultipartUploadError, Response<SdkBody>>>()
    {
        return classify_sdk_error(error);
    }

    if let Some(error) = e.downcast_ref::<SdkError<UploadPartError, Response<SdkBody>>>() {
        return classify_sdk_error(error);
    }

    if let Some(error) =
        e.downcast_ref::<SdkError<CompleteMultipartUploadError, Response<SdkBody>>>()
    {
        return classify_sdk_error(error);
    }

    if let Some(error) = e.downcast_ref::<SdkError<AbortMultipartUploadError, Response<SdkBody>>>()
    {
        return classify_sdk_error(error);
    }

    // I/O errors while reading the source are transient; a vanished file
    // surfaces as NotFound and is terminal.
    if let Some(error) = e.downcast_ref::<std::io::Error>() {
        return if error.kind() == std::io::ErrorKind::NotFound {
            ErrorClass::Permanent
        } else {
            ErrorClass::Transient
        };
    }

    ErrorClass::Permanent
}

fn classify_sdk_error<E>(e: &SdkError<E, Response<SdkBody>>) -> ErrorClass {
    match e {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ErrorClass::Transient
        }
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            if status >= 500 || status == 408 || status == 429 {
                ErrorClass::Transient
            } else {
                ErrorClass::Permanent
            }
        }
        _ => ErrorClass::Permanent,
    }
}

/// Retry budget and backoff curve for one transfer unit.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub initial_backoff: Duration,
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            initial_backoff: Duration::from_millis(config.initial_backoff_milliseconds),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): the base delay
    /// doubled each attempt, randomized ±20%.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self
            .initial_backoff
            .as_millis()
            .saturating_mul(1u128 << attempt.min(32)) as f64;
        let jitter = rand::thread_rng().gen_range(1.0 - JITTER_RATIO..=1.0 + JITTER_RATIO);

        Duration::from_millis((base * jitter) as u64)
    }
}

/// Drives one transfer unit through its state machine: Pending, InFlight,
/// Retrying(n), then Succeeded or Failed(reason).
pub struct RetryController {
    policy: RetryPolicy,
    cancellation_token: PipelineCancellationToken,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, cancellation_token: PipelineCancellationToken) -> Self {
        Self {
            policy,
            cancellation_token,
        }
    }

    pub async fn execute<T, F, Fut>(&self, key: &str, part_number: i32, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        trace!(key = key, part_number = part_number, state = ?UnitState::Pending, "transfer unit accepted.");

        loop {
            let state = if attempt == 0 {
                UnitState::InFlight
            } else {
                UnitState::Retrying(attempt)
            };
            trace!(key = key, part_number = part_number, state = ?state, "executing transfer unit.");

            let result = op().await;

            if self.cancellation_token.is_cancelled() {
                return Err(anyhow!(S3bulkError::Cancelled));
            }

            let e = match result {
                Ok(output) => {
                    trace!(key = key, part_number = part_number, state = ?UnitState::Succeeded, "transfer unit has been completed.");
                    return Ok(output);
                }
                Err(e) => e,
            };

            let error = e.to_string();

            match classify_error(&e) {
                ErrorClass::Transient if attempt < self.policy.retry_count => {
                    let delay = self.policy.backoff_delay(attempt);

                    warn!(
                        key = key,
                        part_number = part_number,
                        error = error,
                        delay_millis = delay.as_millis() as u64,
                        "transient transfer error has occurred. retrying after backoff."
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {},
                        _ = self.cancellation_token.cancelled() => {
                            return Err(anyhow!(S3bulkError::Cancelled));
                        }
                    }

                    attempt += 1;
                }
                ErrorClass::Transient => {
                    error!(
                        key = key,
                        part_number = part_number,
                        error = error,
                        state = ?UnitState::Failed(error.clone()),
                        "retry count exceeded."
                    );

                    return Err(e.context(format!(
                        "retry count exceeded. key={key}, part_number={part_number}."
                    )));
                }
                ErrorClass::Permanent => {
                    error!(
                        key = key,
                        part_number = part_number,
                        error = error,
                        state = ?UnitState::Failed(error.clone()),
                        "permanent transfer error has occurred."
                    );

                    return Err(e);
                }
            }
        }
    }
}
