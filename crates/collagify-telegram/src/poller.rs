use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use collagify_pipeline::IngestHandler;
use collagify_types::updates::Update;

use crate::client::{BotApi, BotApiError};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Fetch one batch of updates after `offset`, hand each to the ingestion
/// handler, and return the offset to poll from next.
pub async fn poll_once(
    api: &BotApi,
    handler: &IngestHandler,
    offset: i64,
    timeout_secs: u64,
) -> Result<i64, BotApiError> {
    let updates = api.get_updates(offset, timeout_secs).await?;
    Ok(ingest_batch(handler, offset, &updates).await)
}

/// A handler failure is logged and the update is still acknowledged;
/// Telegram would otherwise redeliver it forever.
async fn ingest_batch(handler: &IngestHandler, offset: i64, updates: &[Update]) -> i64 {
    let mut next = offset;
    for update in updates {
        next = next.max(update.update_id + 1);
        if let Err(e) = handler.handle_update(update).await {
            error!("Update {} not ingested: {:#}", update.update_id, e);
        }
    }
    next
}

/// Long-poll until `shutdown` flips.
pub async fn run_update_loop(
    api: BotApi,
    handler: Arc<IngestHandler>,
    timeout_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut offset = 0;
    info!("Polling for updates");

    loop {
        // only the wait is cancelled; a fetched batch is always ingested
        let polled = tokio::select! {
            polled = api.get_updates(offset, timeout_secs) => polled,
            _ = shutdown.changed() => {
                info!("Update poller shutting down");
                return;
            }
        };

        match polled {
            Ok(updates) => offset = ingest_batch(&handler, offset, &updates).await,
            Err(e) => {
                warn!("getUpdates failed: {}; retrying in {}s", e, ERROR_BACKOFF.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    _ = shutdown.changed() => {
                        info!("Update poller shutting down");
                        return;
                    }
                }
            }
        }
    }
}
