use anyhow::{Result, anyhow};
use tokio::time::Instant;
use tracing::{error, info, trace};

use s3bulk::Config;
use s3bulk::pipeline::Pipeline;
use s3bulk::types::RunReport;
use s3bulk::types::token::create_pipeline_cancellation_token;

mod ctrl_c_handler;
mod indicator;
mod ui_config;

#[allow(dead_code)]
const EXIT_CODE_SUCCESS: i32 = 0;
#[allow(dead_code)]
const EXIT_CODE_ERROR: i32 = 1;
#[allow(dead_code)]
const EXIT_CODE_INVALID_ARGS: i32 = 2;
const EXIT_CODE_WARNING: i32 = 3;

pub async fn run(config: Config) -> Result<()> {
    #[allow(unused_assignments)]
    let mut has_warning = false;

    {
        let cancellation_token = create_pipeline_cancellation_token();

        ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

        let start_time = Instant::now();
        trace!("upload pipeline start.");

        let mut pipeline = Pipeline::new(config.clone(), cancellation_token).await;
        let indicator_join_handle = indicator::show_indicator(
            pipeline.get_stats_receiver(),
            ui_config::is_progress_indicator_needed(&config),
            ui_config::is_show_result_needed(&config),
            config.dry_run,
        );

        pipeline.run().await;
        indicator_join_handle.await?;

        let report = pipeline.report_snapshot();
        show_report_summary(&report, config.dry_run);

        let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
        if pipeline.has_error() || report.has_failed_files() {
            error!(duration_sec = duration_sec, "s3bulk failed.");

            return Err(anyhow!("s3bulk failed."));
        }

        has_warning = pipeline.has_warning();
        if has_warning && config.warn_as_error {
            error!(duration_sec = duration_sec, "s3bulk failed with warnings.");

            return Err(anyhow!("s3bulk failed with warnings."));
        }

        trace!(duration_sec = duration_sec, "s3bulk has been completed.");
    }

    if has_warning {
        std::process::exit(EXIT_CODE_WARNING);
    }

    Ok(())
}

fn show_report_summary(report: &RunReport, dry_run: bool) {
    info!(
        name = "upload summary",
        dry_run = dry_run,
        succeeded = report.files_succeeded,
        skipped = report.files_skipped,
        failed = report.files_failed,
        planned_units = report.planned_units,
        transferred_byte = report.bytes_transferred,
    );

    for failed in &report.failed_files {
        error!(key = failed.key, reason = failed.reason, "upload failed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3bulk::config::args::parse_from_args;
    use std::io::Write;

    #[tokio::test]
    async fn run_pipeline_dry_run() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(temp_dir.path().join("data1")).unwrap();
        file.write_all(b"12345").unwrap();

        let source = temp_dir.path().to_str().unwrap().to_string();
        let args = vec!["s3bulk", "--dry-run", "-qqq", &source, "s3://target-bucket"];
        let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

        run(config).await.unwrap();
    }

    #[tokio::test]
    async fn run_pipeline_error_source_removed() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().to_str().unwrap().to_string();

        let args = vec!["s3bulk", "--dry-run", "-qqq", &source, "s3://target-bucket"];
        let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

        drop(temp_dir);

        assert!(run(config).await.is_err());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
