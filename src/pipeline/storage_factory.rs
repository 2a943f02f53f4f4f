use std::sync::Arc;

use async_channel::Sender;
use leaky_bucket::RateLimiter;

use crate::Config;
use crate::storage::s3::S3StorageFactory;
use crate::storage::{Storage, StorageFactory};
use crate::types::UploadStatistics;
use crate::types::token::PipelineCancellationToken;

// default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

pub async fn create_target_storage(
    config: Config,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<UploadStatistics>,
) -> Storage {
    let rate_limit_objects = config.rate_limit_objects.map(|rate_limit_value| {
        let refill = std::cmp::max(1, rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER);
        Arc::new(
            RateLimiter::builder()
                .max(rate_limit_value as usize)
                .initial(rate_limit_value as usize)
                .refill(refill)
                .fair(true)
                .build(),
        )
    });

    let rate_limit_bandwidth = config.rate_limit_bandwidth.map(|rate_limit_bandwidth| {
        let refill = rate_limit_bandwidth as usize / REFILL_PER_INTERVAL_DIVIDER;
        Arc::new(
            RateLimiter::builder()
                .max(rate_limit_bandwidth as usize)
                .initial(rate_limit_bandwidth as usize)
                .refill(refill)
                .fair(true)
                .build(),
        )
    });

    S3StorageFactory::create(
        config,
        cancellation_token,
        stats_sender,
        rate_limit_objects,
        rate_limit_bandwidth,
    )
    .await
}
