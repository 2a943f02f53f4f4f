use anyhow::Result;
use tracing::trace;

use super::stage::Stage;
use crate::storage::local::LocalSource;
use crate::types::FileEntry;

/// Enumerator stage: streams the source tree into the pipeline.
pub struct SourceWalker {
    base: Stage<FileEntry, FileEntry>,
}

impl SourceWalker {
    pub fn new(base: Stage<FileEntry, FileEntry>) -> Self {
        Self { base }
    }

    pub async fn walk(&self) -> Result<()> {
        trace!("source walker has started.");

        let source = LocalSource::new(
            self.base.config.source.clone(),
            self.base.cancellation_token.clone(),
            self.base.stats_sender.clone(),
            self.base.has_warning.clone(),
        );

        source
            .list_files(
                self.base.sender.as_ref().unwrap(),
                self.base.config.warn_as_error,
            )
            .await?;

        trace!("source walker has been completed.");
        Ok(())
    }
}
