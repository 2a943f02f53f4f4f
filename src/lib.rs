/*!
# Overview
s3bulk is a bulk upload engine for S3 and S3-compatible object storage.
It walks a local directory tree and uploads every regular file to a bucket,
using a single PutObject for small files and multipart upload for large
ones.

## Features
- Bounded concurrency
  A fixed pool of upload workers consumes planned transfers from a bounded
  queue, and a process-wide limit caps the number of transfer units
  (whole files or multipart parts) in flight. Enumeration backpressures
  against upload throughput, so very large trees never pile up in memory.

- Retry with backoff
  Each transfer unit is retried on transient failures (network errors,
  throttling, 5xx responses) with exponential backoff and jitter.
  Permanent failures (authentication, invalid request, quota) fail the
  owning file immediately and are never retried; the rest of the run
  continues.

- Dry run
  `--dry-run` enumerates and plans everything but performs no transfer
  calls, reporting what would have been uploaded.

- Filtering
  Keys can be included or excluded by regular expression.

## As a library
The s3bulk CLI is a thin wrapper of the s3bulk library. You can use all
features of the CLI through the library.

Example usage
=============

```Toml
[dependencies]
s3bulk = "0"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3bulk::Config;
use s3bulk::config::args::parse_from_args;
use s3bulk::pipeline::Pipeline;
use s3bulk::types::token::create_pipeline_cancellation_token;

#[tokio::main]
async fn main() {
    // You can use all the arguments for the s3bulk CLI.
    let args = vec!["program_name", "./data", "s3://test-bucket/backup/"];

    // s3bulk converts the arguments to Config.
    let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

    // Create a cancellation token for the pipeline.
    // You can use this token to cancel the pipeline.
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = Pipeline::new(config, cancellation_token).await;

    pipeline.run().await;

    // If there is an error in the pipeline, you can get the errors.
    if pipeline.has_error() {
        println!("An error has occurred.\n\n");
        println!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }

    // The report holds per-file outcomes and the global summary.
    let report = pipeline.report_snapshot();
    println!(
        "succeeded: {}, skipped: {}, failed: {}",
        report.files_succeeded, report.files_skipped, report.files_failed
    );

    for failed in &report.failed_files {
        println!("{}: {}", failed.key, failed.reason);
    }
}
```
*/

pub use config::Config;
pub use config::args::CLIArgs;

pub mod config;
pub mod pipeline;
pub mod storage;
pub mod types;
