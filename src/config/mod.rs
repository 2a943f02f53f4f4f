use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use tokio::sync::Semaphore;

use crate::types::TargetPath;

pub mod args;

#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub target: TargetPath,
    pub client_config: ClientConfig,
    pub transfer_config: TransferConfig,
    pub retry_config: RetryConfig,
    pub tracing_config: Option<TracingConfig>,
    pub filter_config: FilterConfig,
    pub worker_size: u16,
    pub parallel_upload_semaphore: Arc<Semaphore>,
    pub warn_as_error: bool,
    pub no_guess_mime_type: bool,
    pub dry_run: bool,
    pub rate_limit_objects: Option<u32>,
    pub rate_limit_bandwidth: Option<u64>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub aws_retry_config: AwsRetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AwsRetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

/// Retry budget for a single transfer unit, applied by the retry controller
/// on top of the SDK's own per-request retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub retry_count: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub multipart_threshold: u64,
    pub multipart_chunksize: u64,
}

impl TransferConfig {
    pub fn is_multipart_upload_required(&self, content_length: u64) -> bool {
        self.multipart_threshold < content_length
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub include_regex: Option<Regex>,
    pub exclude_regex: Option<Regex>,
}
