use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, trace};

use super::stage::{SendResult, Stage};
use crate::config::FilterConfig;
use crate::pipeline::aggregator;
use crate::types::UploadStatistics::UploadSkip;
use crate::types::{FileEntry, SharedRunReport};

#[async_trait]
pub trait EntryFilter {
    async fn filter(&self) -> Result<()>;
}

pub struct EntryFilterBase {
    name: &'static str,
    base: Stage<FileEntry, FileEntry>,
    report: SharedRunReport,
}

impl EntryFilterBase {
    pub async fn filter<F>(&self, filter_fn: F) -> Result<()>
    where
        F: Fn(&FileEntry, &FilterConfig) -> bool + Send + Sync,
    {
        trace!(name = self.name, "filter has started.");

        loop {
            tokio::select! {
                recv_result = self.base.receiver.as_ref().unwrap().recv() => {
                    match recv_result {
                        Ok(entry) => {
                            if !filter_fn(&entry, &self.base.config.filter_config) {
                                debug!(name = self.name, key = entry.key, "entry has been filtered.");

                                self.base
                                    .send_stats(UploadSkip {
                                        key: entry.key.clone(),
                                    })
                                    .await;
                                aggregator::record_skip(&self.report, &entry.key);

                                continue;
                            }

                            if self.base.send(entry).await? == SendResult::Closed {
                                return Ok(());
                            }
                        },
                        Err(_) => {
                            trace!(name = self.name, "filter has been completed.");
                            return Ok(());
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    debug!(name = self.name, "filter has been cancelled.");
                    return Ok(());
                }
            }
        }
    }
}

pub struct IncludeRegexFilter {
    base: EntryFilterBase,
}

impl IncludeRegexFilter {
    pub fn new(base: Stage<FileEntry, FileEntry>, report: SharedRunReport) -> Self {
        Self {
            base: EntryFilterBase {
                name: "IncludeRegexFilter",
                base,
                report,
            },
        }
    }
}

#[async_trait]
impl EntryFilter for IncludeRegexFilter {
    async fn filter(&self) -> Result<()> {
        self.base
            .filter(|entry, filter_config| {
                filter_config
                    .include_regex
                    .as_ref()
                    .unwrap()
                    .is_match(&entry.key)
            })
            .await
    }
}

pub struct ExcludeRegexFilter {
    base: EntryFilterBase,
}

impl ExcludeRegexFilter {
    pub fn new(base: Stage<FileEntry, FileEntry>, report: SharedRunReport) -> Self {
        Self {
            base: EntryFilterBase {
                name: "ExcludeRegexFilter",
                base,
                report,
            },
        }
    }
}

#[async_trait]
impl EntryFilter for ExcludeRegexFilter {
    async fn filter(&self) -> Result<()> {
        self.base
            .filter(|entry, filter_config| {
                !filter_config
                    .exclude_regex
                    .as_ref()
                    .unwrap()
                    .is_match(&entry.key)
            })
            .await
    }
}
