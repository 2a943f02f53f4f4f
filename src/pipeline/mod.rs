use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Error;
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::Config;
use crate::pipeline::aggregator::ResultAggregator;
use crate::pipeline::filter::{EntryFilter, ExcludeRegexFilter, IncludeRegexFilter};
use crate::pipeline::planner::TransferPlanner;
use crate::pipeline::stage::Stage;
use crate::pipeline::uploader::ObjectUploader;
use crate::pipeline::walker::SourceWalker;
use crate::storage::Storage;
use crate::storage::local::LocalSource;
use crate::types::token::PipelineCancellationToken;
use crate::types::{
    FileEntry, JobResult, RunReport, SharedRunReport, TransferPlan, UploadStatistics,
};

const CHANNEL_CAPACITY: usize = 20000;

mod aggregator;
mod filter;
mod planner;
mod retry;
mod stage;
mod storage_factory;
mod uploader;
mod walker;

/// Staged upload pipeline: walker, filters, planner, upload workers and a
/// result aggregator, connected with bounded channels so that enumeration
/// blocks when upload throughput falls behind.
pub struct Pipeline {
    config: Config,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    stats_sender: async_channel::Sender<UploadStatistics>,
    stats_receiver: Receiver<UploadStatistics>,
    has_error: Arc<AtomicBool>,
    has_warning: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<Error>>>,
    ready: bool,
    report: SharedRunReport,
}

impl Pipeline {
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let target = storage_factory::create_target_storage(
            config.clone(),
            cancellation_token.clone(),
            stats_sender.clone(),
        )
        .await;

        Self {
            config,
            target,
            cancellation_token,
            stats_sender,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            has_warning: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::<Error>::new())),
            ready: true,
            report: Arc::new(Mutex::new(RunReport::default())),
        }
    }

    pub async fn run(&mut self) {
        if !self.ready {
            panic!("it can be executed only once.")
        }
        self.ready = false;

        if !self.check_prerequisites().await {
            self.shutdown().await;
            return;
        }

        self.upload().await;

        self.shutdown().await;
    }

    async fn check_prerequisites(&self) -> bool {
        let source = LocalSource::new(
            self.config.source.clone(),
            self.cancellation_token.clone(),
            self.stats_sender.clone(),
            self.has_warning.clone(),
        );

        if let Err(e) = source.validate_root().await {
            self.print_and_store_error(e, "source directory is not accessible.");
            return false;
        }

        true
    }

    async fn upload(&mut self) {
        self.aggregate_results(self.upload_objects(
            self.plan_transfers(self.filter_entries(self.walk_source())),
        ))
        .await
        .unwrap();
    }

    fn walk_source(&self) -> Receiver<FileEntry> {
        let (stage, next_stage_receiver) = self.create_stage::<FileEntry, FileEntry>(None);
        let walker = SourceWalker::new(stage);
        let has_error = self.has_error.clone();
        let error_list = self.errors.clone();

        tokio::spawn(async move {
            let result = walker.walk().await;
            match result {
                Ok(()) => {}
                Err(e) => {
                    log_error(has_error, error_list, e, "list source files failed.");
                }
            }
        });

        next_stage_receiver
    }

    fn filter_entries(&self, entries: Receiver<FileEntry>) -> Receiver<FileEntry> {
        let mut previous_stage_receiver = entries;

        if self.config.filter_config.include_regex.is_some() {
            let (stage, new_receiver) = self.create_stage(Some(previous_stage_receiver));

            self.spawn_filter(Box::new(IncludeRegexFilter::new(stage, self.report.clone())));
            trace!("IncludeRegexFilter has been started.");

            previous_stage_receiver = new_receiver;
        }

        if self.config.filter_config.exclude_regex.is_some() {
            let (stage, new_receiver) = self.create_stage(Some(previous_stage_receiver));

            self.spawn_filter(Box::new(ExcludeRegexFilter::new(stage, self.report.clone())));
            trace!("ExcludeRegexFilter has been started.");

            previous_stage_receiver = new_receiver;
        }

        previous_stage_receiver
    }

    fn spawn_filter(&self, filter: Box<dyn EntryFilter + Send + Sync>) {
        let has_error = self.has_error.clone();
        let error_list = self.errors.clone();

        tokio::spawn(async move {
            let result = filter.filter().await;
            match result {
                Ok(_) => {}
                Err(e) => {
                    log_error(has_error, error_list, e, "filter entries failed.");
                }
            }
        });
    }

    fn plan_transfers(&self, entries: Receiver<FileEntry>) -> Receiver<TransferPlan> {
        let (stage, next_stage_receiver) = self.create_stage(Some(entries));
        let planner = TransferPlanner::new(stage, self.report.clone());
        let has_error = self.has_error.clone();
        let error_list = self.errors.clone();

        tokio::spawn(async move {
            let result = planner.plan().await;
            match result {
                Ok(()) => {}
                Err(e) => {
                    log_error(has_error, error_list, e, "plan transfers failed.");
                }
            }
        });

        next_stage_receiver
    }

    fn upload_objects(&self, plans: Receiver<TransferPlan>) -> Receiver<JobResult> {
        let (sender, next_stage_receiver) = async_channel::bounded::<JobResult>(CHANNEL_CAPACITY);

        for worker_index in 0..(self.config.worker_size) {
            let stage = Stage::new(
                self.config.clone(),
                Some(plans.clone()),
                Some(sender.clone()),
                self.stats_sender.clone(),
                self.cancellation_token.clone(),
                self.has_warning.clone(),
            );

            let uploader =
                ObjectUploader::new(stage, worker_index, dyn_clone::clone_box(&*self.target));
            let has_error = self.has_error.clone();
            let error_list = self.errors.clone();

            tokio::spawn(async move {
                let result = uploader.upload().await;
                match result {
                    Ok(_) => {}
                    Err(e) => {
                        log_error(has_error, error_list, e, "upload objects failed.");
                    }
                }
            });
        }

        next_stage_receiver
    }

    fn aggregate_results(&self, results: Receiver<JobResult>) -> JoinHandle<()> {
        let aggregator = ResultAggregator::new(results, self.report.clone());

        tokio::spawn(async move {
            let _ = aggregator.aggregate().await;
        })
    }

    fn create_stage<I, O>(
        &self,
        previous_stage_receiver: Option<Receiver<I>>,
    ) -> (Stage<I, O>, Receiver<O>) {
        let (sender, next_stage_receiver) = async_channel::bounded::<O>(CHANNEL_CAPACITY);
        let stage = Stage::new(
            self.config.clone(),
            previous_stage_receiver,
            Some(sender),
            self.stats_sender.clone(),
            self.cancellation_token.clone(),
            self.has_warning.clone(),
        );

        (stage, next_stage_receiver)
    }

    fn print_and_store_error(&self, e: Error, message: &str) {
        self.has_error.store(true, Ordering::SeqCst);

        let error = e.to_string();
        let source = e.source();

        error!(error = error, source = source, message);
        self.errors.lock().unwrap().push_back(e);
    }

    pub fn get_stats_receiver(&self) -> Receiver<UploadStatistics> {
        self.stats_receiver.clone()
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    pub fn get_errors_and_consume(&self) -> Option<Vec<Error>> {
        if !self.has_error() {
            return None;
        }

        let error_list = self.errors.clone();
        let mut error_list = error_list.lock().unwrap();

        let mut errors_to_return = Vec::<Error>::new();
        for _ in 0..error_list.len() {
            errors_to_return.push(error_list.pop_front().unwrap());
        }

        Some(errors_to_return)
    }

    pub fn get_report(&self) -> SharedRunReport {
        self.report.clone()
    }

    /// Consistent copy of the run report, safe to call while the pipeline is
    /// running.
    pub fn report_snapshot(&self) -> RunReport {
        self.report.lock().unwrap().clone()
    }

    pub fn close_stats_sender(&self) {
        self.stats_sender.close();
    }

    async fn shutdown(&self) {
        self.close_stats_sender();
    }
}

fn log_error(
    has_error: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<Error>>>,
    e: Error,
    message: &str,
) {
    has_error.store(true, Ordering::SeqCst);

    let error = e.to_string();
    let source = e.source();

    error!(error = error, source = source, message);

    let mut error_list = errors.lock().unwrap();
    error_list.push_back(e);
}
