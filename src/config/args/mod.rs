use crate::Config;
use crate::config::args::value_parser::{human_bytes, source_dir, target_url, url};
use crate::config::{
    AwsRetryConfig, CLITimeoutConfig, ClientConfig, FilterConfig, RetryConfig, TracingConfig,
    TransferConfig,
};
use clap::Parser;
use clap::builder::{ArgPredicate, NonEmptyStringValueParser};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use regex::Regex;
#[cfg(feature = "version")]
use shadow_rs::shadow;
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;

mod value_parser;

const DEFAULT_WORKER_SIZE: u16 = 16;
const DEFAULT_MAX_PARALLEL_UPLOADS: u16 = 32;
const DEFAULT_MULTIPART_THRESHOLD: &str = "64MiB";
const DEFAULT_MULTIPART_CHUNKSIZE: &str = "64MiB";
const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_WARN_AS_ERROR: bool = false;
const DEFAULT_NO_GUESS_MIME_TYPE: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;

const WORKER_SIZE_MUST_NOT_BE_ZERO: &str = "--worker-size must be greater than 0\n";
const MAX_PARALLEL_UPLOADS_MUST_NOT_BE_ZERO: &str =
    "--max-parallel-uploads must be greater than 0\n";

#[cfg(feature = "version")]
shadow!(build);

#[derive(Parser, Clone, Debug)]
#[cfg_attr(feature = "version", command(version=format!("{} ({} {}), {}", build::PKG_VERSION, build::SHORT_COMMIT, build::BUILD_TARGET, build::RUST_VERSION)))]
pub struct CLIArgs {
    #[arg(env = "S3BULK_SOURCE_DIR", help = "local directory to upload", value_parser = source_dir::check_source_dir, default_value_if("auto_complete_shell", ArgPredicate::IsPresent, "."), required = false)]
    source: String,

    #[arg(env = "S3BULK_TARGET", help = "s3://<BUCKET_NAME>[/prefix]", value_parser = target_url::check_target_url, default_value_if("auto_complete_shell", ArgPredicate::IsPresent, "s3://ignored"), required = false)]
    target: String,

    /// A simulation mode. Objects are enumerated and planned, but no transfer is performed
    #[arg(long, env = "S3BULK_DRY_RUN", default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    dry_run: bool,

    /// number of upload workers
    #[arg(long, env = "S3BULK_WORKER_SIZE", default_value_t = DEFAULT_WORKER_SIZE, help_heading = "General")]
    worker_size: u16,

    /// maximum number of transfer units in flight across all workers
    #[arg(long, env = "S3BULK_MAX_PARALLEL_UPLOADS", default_value_t = DEFAULT_MAX_PARALLEL_UPLOADS, help_heading = "General")]
    max_parallel_uploads: u16,

    /// object size threshold above which multipart upload is used
    #[arg(long, env = "S3BULK_MULTIPART_THRESHOLD", default_value = DEFAULT_MULTIPART_THRESHOLD, value_parser = human_bytes::check_human_bytes, help_heading = "General")]
    multipart_threshold: String,

    /// part size for multipart upload
    #[arg(long, env = "S3BULK_MULTIPART_CHUNKSIZE", default_value = DEFAULT_MULTIPART_CHUNKSIZE, value_parser = human_bytes::check_human_bytes, help_heading = "General")]
    multipart_chunksize: String,

    /// maximum retries for a transfer unit after a transient failure
    #[arg(long, env = "S3BULK_RETRY_COUNT", default_value_t = DEFAULT_RETRY_COUNT, help_heading = "General")]
    retry_count: u32,

    /// base delay for exponential backoff between retries
    #[arg(long, env = "S3BULK_INITIAL_BACKOFF_MILLISECONDS", default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "General")]
    initial_backoff_milliseconds: u64,

    /// treat warnings (unreadable entries, planning skips) as errors
    #[arg(long, env = "S3BULK_WARN_AS_ERROR", default_value_t = DEFAULT_WARN_AS_ERROR, help_heading = "General")]
    warn_as_error: bool,

    /// do not guess Content-Type from the file name
    #[arg(long, env = "S3BULK_NO_GUESS_MIME_TYPE", default_value_t = DEFAULT_NO_GUESS_MIME_TYPE, help_heading = "General")]
    no_guess_mime_type: bool,

    /// AWS CLI profile
    #[arg(long, env = "S3BULK_PROFILE", help_heading = "AWS Configuration")]
    profile: Option<String>,

    /// target region
    #[arg(long, env = "S3BULK_REGION", value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS Configuration")]
    region: Option<String>,

    /// target endpoint url
    #[arg(long, env = "S3BULK_ENDPOINT_URL", value_parser = url::check_scheme, help_heading = "AWS Configuration")]
    endpoint_url: Option<String>,

    /// force path-style addressing
    #[arg(long, env = "S3BULK_FORCE_PATH_STYLE", default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS Configuration")]
    force_path_style: bool,

    /// maximum attempts of the AWS SDK retry logic, per request
    #[arg(long, env = "S3BULK_AWS_MAX_ATTEMPTS", default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "AWS Configuration")]
    aws_max_attempts: u32,

    /// upload only keys that match the regular expression
    #[arg(long, env = "S3BULK_FILTER_INCLUDE_REGEX", value_parser = crate::config::args::value_parser::regex::parse_regex, help_heading = "Filter")]
    filter_include_regex: Option<String>,

    /// do not upload keys that match the regular expression
    #[arg(long, env = "S3BULK_FILTER_EXCLUDE_REGEX", value_parser = crate::config::args::value_parser::regex::parse_regex, help_heading = "Filter")]
    filter_exclude_regex: Option<String>,

    /// object upload rate limit per second
    #[arg(long, env = "S3BULK_RATE_LIMIT_OBJECTS", value_parser = clap::value_parser!(u32).range(10..), help_heading = "Advanced")]
    rate_limit_objects: Option<u32>,

    /// bandwidth rate limit per second. e.g. 100MiB
    #[arg(long, env = "S3BULK_RATE_LIMIT_BANDWIDTH", value_parser = human_bytes::check_human_bandwidth, help_heading = "Advanced")]
    rate_limit_bandwidth: Option<String>,

    /// operation timeout
    #[arg(long, env = "S3BULK_OPERATION_TIMEOUT_MILLISECONDS", help_heading = "Advanced")]
    operation_timeout_milliseconds: Option<u64>,

    /// operation attempt timeout
    #[arg(long, env = "S3BULK_OPERATION_ATTEMPT_TIMEOUT_MILLISECONDS", help_heading = "Advanced")]
    operation_attempt_timeout_milliseconds: Option<u64>,

    /// connect timeout
    #[arg(long, env = "S3BULK_CONNECT_TIMEOUT_MILLISECONDS", help_heading = "Advanced")]
    connect_timeout_milliseconds: Option<u64>,

    /// read timeout
    #[arg(long, env = "S3BULK_READ_TIMEOUT_MILLISECONDS", help_heading = "Advanced")]
    read_timeout_milliseconds: Option<u64>,

    /// disable stalled stream protection
    #[arg(long, env = "S3BULK_DISABLE_STALLED_STREAM_PROTECTION", default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "Advanced")]
    disable_stalled_stream_protection: bool,

    /// generate a auto completions script. Valid values: bash, fish, zsh, powershell, elvish.
    #[arg(long, value_name = "SHELL", value_parser = clap_complete::shells::Shell::from_str, help_heading = "Advanced")]
    auto_complete_shell: Option<clap_complete::shells::Shell>,

    /// trace verbosity(-v: show info, -vv: show debug, -vvv show trace)
    #[clap(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// show trace as json format
    #[arg(long, env = "S3BULK_JSON_TRACING", default_value_t = DEFAULT_JSON_TRACING, help_heading = "Tracing/Logging")]
    json_tracing: bool,

    /// enable aws sdk tracing
    #[arg(long, env = "S3BULK_AWS_SDK_TRACING", default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Tracing/Logging")]
    aws_sdk_tracing: bool,

    /// show span event tracing
    #[arg(long, env = "S3BULK_SPAN_EVENTS_TRACING", default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Tracing/Logging")]
    span_events_tracing: bool,

    /// disable ANSI colors in trace output
    #[arg(long, env = "S3BULK_DISABLE_COLOR_TRACING", default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Tracing/Logging")]
    disable_color_tracing: bool,
}

pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = parse_from_args(args).map_err(|e| e.to_string())?;
    Config::try_from(args)
}

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.worker_size == 0 {
            return Err(WORKER_SIZE_MUST_NOT_BE_ZERO.to_string());
        }

        if self.max_parallel_uploads == 0 {
            return Err(MAX_PARALLEL_UPLOADS_MUST_NOT_BE_ZERO.to_string());
        }

        Ok(())
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(value: CLIArgs) -> Result<Self, Self::Error> {
        value.validate()?;

        let mut tracing_config = value.verbosity.log_level().map(|log_level| TracingConfig {
            tracing_level: log_level,
            json_tracing: value.json_tracing,
            aws_sdk_tracing: value.aws_sdk_tracing,
            span_events_tracing: value.span_events_tracing,
            disable_color_tracing: value.disable_color_tracing,
        });

        // A dry run without visible output would be pointless.
        if value.dry_run {
            let base = tracing_config.unwrap_or(TracingConfig {
                tracing_level: log::Level::Info,
                json_tracing: DEFAULT_JSON_TRACING,
                aws_sdk_tracing: DEFAULT_AWS_SDK_TRACING,
                span_events_tracing: DEFAULT_SPAN_EVENTS_TRACING,
                disable_color_tracing: DEFAULT_DISABLE_COLOR_TRACING,
            });

            tracing_config = Some(TracingConfig {
                tracing_level: base.tracing_level.max(log::Level::Info),
                ..base
            });
        }

        let target = target_url::parse_target_url(&value.target)?;

        let multipart_threshold = human_bytes::parse_human_bytes(&value.multipart_threshold)?;
        let multipart_chunksize = human_bytes::parse_human_bytes(&value.multipart_chunksize)?;

        let rate_limit_bandwidth = value
            .rate_limit_bandwidth
            .as_deref()
            .map(human_bytes::parse_human_bandwidth)
            .transpose()?;

        let include_regex = value
            .filter_include_regex
            .as_deref()
            .map(|filter| Regex::new(filter).map_err(|e| e.to_string()))
            .transpose()?;
        let exclude_regex = value
            .filter_exclude_regex
            .as_deref()
            .map(|filter| Regex::new(filter).map_err(|e| e.to_string()))
            .transpose()?;

        Ok(Config {
            source: PathBuf::from(&value.source),
            target,
            client_config: ClientConfig {
                profile: value.profile,
                region: value.region,
                endpoint_url: value.endpoint_url,
                force_path_style: value.force_path_style,
                aws_retry_config: AwsRetryConfig {
                    aws_max_attempts: value.aws_max_attempts,
                    initial_backoff_milliseconds: value.initial_backoff_milliseconds,
                },
                cli_timeout_config: CLITimeoutConfig {
                    operation_timeout_milliseconds: value.operation_timeout_milliseconds,
                    operation_attempt_timeout_milliseconds: value
                        .operation_attempt_timeout_milliseconds,
                    connect_timeout_milliseconds: value.connect_timeout_milliseconds,
                    read_timeout_milliseconds: value.read_timeout_milliseconds,
                },
                disable_stalled_stream_protection: value.disable_stalled_stream_protection,
            },
            transfer_config: TransferConfig {
                multipart_threshold,
                multipart_chunksize,
            },
            retry_config: RetryConfig {
                retry_count: value.retry_count,
                initial_backoff_milliseconds: value.initial_backoff_milliseconds,
            },
            tracing_config,
            filter_config: FilterConfig {
                include_regex,
                exclude_regex,
            },
            worker_size: value.worker_size,
            parallel_upload_semaphore: Arc::new(Semaphore::new(
                value.max_parallel_uploads as usize,
            )),
            warn_as_error: value.warn_as_error,
            no_guess_mime_type: value.no_guess_mime_type,
            dry_run: value.dry_run,
            rate_limit_objects: value.rate_limit_objects,
            rate_limit_bandwidth,
            auto_complete_shell: value.auto_complete_shell,
        })
    }
}
