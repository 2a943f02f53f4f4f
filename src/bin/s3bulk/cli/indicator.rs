use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3bulk::types::UploadStatistics;
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const MOVING_AVERAGE_PERIOD_SECS: usize = 10;
const REFRESH_INTERVAL: f32 = 1.0;

pub fn show_indicator(
    stats_receiver: Receiver<UploadStatistics>,
    show_progress: bool,
    show_result: bool,
    dry_run: bool,
) -> JoinHandle<()> {
    let progress_style = ProgressStyle::with_template("{wide_msg}").unwrap();
    let progress_text = ProgressBar::new(0);
    progress_text.set_style(progress_style);

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_uploaded_bytes = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut ma_uploaded_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();

        let mut total_upload_count: u64 = 0;
        let mut total_upload_bytes: u64 = 0;
        let mut total_error_count: u64 = 0;
        let mut total_skip_count: u64 = 0;
        let mut total_warning_count: u64 = 0;

        loop {
            let mut upload_bytes: u64 = 0;
            let mut upload_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(upload_stats) = stats_receiver.try_recv() {
                    match upload_stats {
                        UploadStatistics::UploadComplete { .. } => {
                            upload_count += 1;
                            total_upload_count += 1;
                        }
                        UploadStatistics::UploadBytes(size) => {
                            upload_bytes += size;
                            total_upload_bytes += size
                        }
                        UploadStatistics::UploadError { .. } => {
                            total_error_count += 1;
                        }
                        UploadStatistics::UploadSkip { .. } => {
                            total_skip_count += 1;
                        }
                        UploadStatistics::UploadWarning { .. } => {
                            total_warning_count += 1;
                        }
                    }
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() {
                    let elapsed = start_time.elapsed();
                    let elapsed_secs_f64 = elapsed.as_secs_f64();

                    let mut objects_per_sec = (total_upload_count as f64 / elapsed_secs_f64) as u64;
                    let mut upload_bytes_per_sec =
                        (total_upload_bytes as f64 / elapsed_secs_f64) as u64;

                    if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
                        objects_per_sec = total_upload_count;
                        upload_bytes_per_sec = total_upload_bytes;
                    }
                    if dry_run {
                        objects_per_sec = 0;
                        upload_bytes_per_sec = 0;
                    }

                    if show_result {
                        progress_text.set_style(ProgressStyle::with_template("{msg}").unwrap());

                        progress_text.finish_with_message(format!(
                            "{:>3} | {:>3}/sec,  uploaded {:>3} objects | {:>3} objects/sec,  skipped {} objects,  error {} objects,  warning {} objects,  duration {}",
                            HumanBytes(total_upload_bytes),
                            HumanBytes(upload_bytes_per_sec),
                            total_upload_count,
                            HumanCount(objects_per_sec),
                            total_skip_count,
                            total_error_count,
                            total_warning_count,
                            HumanDuration(elapsed),
                        ));

                        println!();
                        io::stdout().flush().unwrap()
                    }

                    return;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }
            ma_uploaded_bytes.add_sample(upload_bytes);

            if !dry_run {
                ma_uploaded_count.add_sample(upload_count);
            }

            if show_progress {
                progress_text.set_message(format!(
                    "{:>3} | {:>3}/sec,  uploaded {:>3} objects | {:>3} objects/sec,  skipped {} objects,  error {} objects,  warning {} objects",
                    HumanBytes(total_upload_bytes),
                    HumanBytes(ma_uploaded_bytes.get_average()).to_string(),
                    total_upload_count,
                    HumanCount(ma_uploaded_count.get_average()).to_string(),
                    total_skip_count,
                    total_error_count,
                    total_warning_count,
                ));
            }
        }
    })
}
