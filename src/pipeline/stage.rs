use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Config;
use crate::types::UploadStatistics;
use crate::types::token::PipelineCancellationToken;

/// Shared context of one pipeline task: the previous stage's receiver, the
/// next stage's sender, and the run-wide channels and flags.
pub struct Stage<I, O> {
    pub config: Config,
    pub receiver: Option<Receiver<I>>,
    pub sender: Option<Sender<O>>,
    pub stats_sender: Sender<UploadStatistics>,
    pub cancellation_token: PipelineCancellationToken,
    pub has_warning: Arc<AtomicBool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

impl<I, O> Stage<I, O> {
    pub fn new(
        config: Config,
        receiver: Option<Receiver<I>>,
        sender: Option<Sender<O>>,
        stats_sender: Sender<UploadStatistics>,
        cancellation_token: PipelineCancellationToken,
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            receiver,
            sender,
            stats_sender,
            cancellation_token,
            has_warning,
        }
    }

    pub async fn send(&self, object: O) -> Result<SendResult>
    where
        O: Send + Sync + 'static,
    {
        let result = self
            .sender
            .as_ref()
            .unwrap()
            .send(object)
            .await
            .context("async_channel::Sender::send() failed.");

        if let Err(e) = result {
            return if !self.is_channel_closed() {
                Err(anyhow!(e))
            } else {
                Ok(SendResult::Closed)
            };
        }

        Ok(SendResult::Success)
    }

    pub fn is_channel_closed(&self) -> bool {
        self.sender.as_ref().unwrap().is_closed()
    }

    pub async fn send_stats(&self, stats: UploadStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    pub fn set_warning(&self) {
        self.has_warning.store(true, Ordering::SeqCst);
    }
}
