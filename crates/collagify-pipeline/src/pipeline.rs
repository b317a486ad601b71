use std::sync::Arc;

use anyhow::{Context, anyhow};
use futures_util::{StreamExt, stream};
use tracing::{debug, info, warn};

use collagify_db::{DayGroup, StoreError};
use collagify_image::{Grid, layout::MAX_COLS};

use crate::collaborators::{ImageFetcher, LinkStore, Messenger};
use crate::error::{Failure, FailureStage, RunError};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Widest row of a collage.
    pub max_cols: u32,
    /// Emit a collage from whatever images could be fetched instead of
    /// failing the whole group on the first download error.
    pub partial_collage: bool,
    /// Channels processed at the same time.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_cols: MAX_COLS,
            partial_collage: true,
            concurrency: 4,
        }
    }
}

/// Counters for a run that finished without a single failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub channels: usize,
    pub collages: usize,
    pub messages_cleared: usize,
}

#[derive(Default)]
struct ChannelOutcome {
    collages: usize,
    cleared: usize,
    failures: Vec<Failure>,
}

/// Daily batch: drain every channel's day groups, turn each group into one
/// collage, post it, then clear the source posts and stored links.
///
/// Source rows are removed only for groups whose collage was delivered and
/// only after the platform confirmed deleting the posts, so anything that
/// fails is picked up again by the next run.
pub struct Pipeline {
    store: Arc<dyn LinkStore>,
    messenger: Arc<dyn Messenger>,
    fetcher: Arc<dyn ImageFetcher>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn LinkStore>,
        messenger: Arc<dyn Messenger>,
        fetcher: Arc<dyn ImageFetcher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            fetcher,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, RunError> {
        info!("Collage run started");

        let store = self.store.clone();
        let channels = blocking(move || store.list_channels())
            .await
            .map_err(RunError::ListChannels)?;
        debug!("Channels to process: {:?}", channels);

        let outcomes: Vec<ChannelOutcome> = stream::iter(channels.iter().copied())
            .map(|channel_id| self.process_channel(channel_id))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut summary = RunSummary {
            channels: channels.len(),
            ..RunSummary::default()
        };
        let mut failures = Vec::new();
        for outcome in outcomes {
            summary.collages += outcome.collages;
            summary.messages_cleared += outcome.cleared;
            failures.extend(outcome.failures);
        }

        info!(
            "Collage run finished: {} channels, {} collages, {} messages cleared, {} failures",
            summary.channels,
            summary.collages,
            summary.messages_cleared,
            failures.len()
        );

        if failures.is_empty() {
            Ok(summary)
        } else {
            failures.sort_by_key(|f| f.channel_id);
            Err(RunError::Failures(failures))
        }
    }

    async fn process_channel(&self, channel_id: i64) -> ChannelOutcome {
        let mut outcome = ChannelOutcome::default();

        let store = self.store.clone();
        let drained = match blocking(move || store.drain_groups(channel_id)).await {
            Ok(drained) => drained,
            Err(e) => {
                warn!("Channel {}: drain failed: {:#}", channel_id, e);
                outcome
                    .failures
                    .push(Failure::channel(channel_id, FailureStage::Drain, e));
                return outcome;
            }
        };

        if drained.is_empty() {
            debug!("Channel {}: nothing pending", channel_id);
            return outcome;
        }

        let mut delivered = Vec::with_capacity(drained.message_ids.len());
        for group in &drained.groups {
            match self.process_group(channel_id, group, &mut outcome.failures).await {
                Ok(included) => {
                    outcome.collages += 1;
                    delivered.extend(included);
                }
                Err(failure) => {
                    warn!("{}", failure);
                    outcome.failures.push(failure);
                }
            }
        }

        if delivered.is_empty() {
            return outcome;
        }

        // Source posts first: if the platform refuses, keep the rows so the
        // same links are collaged again next run.
        if let Err(e) = self.messenger.delete_messages(channel_id, &delivered).await {
            warn!("Channel {}: deleting {} posts failed: {:#}", channel_id, delivered.len(), e);
            outcome
                .failures
                .push(Failure::channel(channel_id, FailureStage::DeleteMessages, e));
            return outcome;
        }

        let store = self.store.clone();
        match blocking(move || store.delete_links(channel_id, &delivered)).await {
            Ok(removed) => outcome.cleared = removed,
            Err(e) => {
                warn!("Channel {}: deleting stored links failed: {:#}", channel_id, e);
                outcome
                    .failures
                    .push(Failure::channel(channel_id, FailureStage::DeleteLinks, e));
            }
        }

        outcome
    }

    /// Fetch, tile and post one day group, returning the message ids whose
    /// images made it into the collage. Per-image download errors are pushed
    /// onto `failures`; the returned error is the group's own.
    async fn process_group(
        &self,
        channel_id: i64,
        group: &DayGroup,
        failures: &mut Vec<Failure>,
    ) -> Result<Vec<i64>, Failure> {
        let day = group.day_label();

        let mut images = Vec::with_capacity(group.links.len());
        let mut included = Vec::with_capacity(group.links.len());
        for link in &group.links {
            match self.fetcher.fetch(&link.url).await {
                Ok(bytes) => {
                    images.push(bytes);
                    included.push(link.message_id);
                }
                Err(e) => {
                    let e = e.context(format!("message {}", link.message_id));
                    if !self.config.partial_collage {
                        return Err(Failure::group(channel_id, &day, FailureStage::Fetch, e));
                    }
                    warn!("Channel {} day {}: skipping image: {:#}", channel_id, day, e);
                    failures.push(Failure::group(channel_id, &day, FailureStage::Fetch, e));
                }
            }
        }

        let Some(grid) = Grid::for_count(images.len(), self.config.max_cols) else {
            return Err(Failure::group(
                channel_id,
                &day,
                FailureStage::Fetch,
                anyhow!("none of {} images could be fetched", group.links.len()),
            ));
        };

        let collage = tokio::task::spawn_blocking(move || {
            collagify_image::concat(&images, grid.rows, grid.cols)
        })
        .await
        .map_err(|e| anyhow!("tiler task failed: {}", e))
        .and_then(|r| r.map_err(anyhow::Error::from))
        .and_then(|c| c.context("tiler produced no image"))
        .map_err(|e| Failure::group(channel_id, &day, FailureStage::Tile, e))?;

        let filename = collage_filename(&day);
        self.messenger
            .send_image(channel_id, &filename, collage)
            .await
            .map_err(|e| Failure::group(channel_id, &day, FailureStage::Send, e))?;

        info!(
            "Channel {}: sent {} ({} of {} images, {}x{})",
            channel_id,
            filename,
            included.len(),
            group.links.len(),
            grid.rows,
            grid.cols
        );
        Ok(included)
    }
}

pub fn collage_filename(day: &str) -> String {
    format!("collage_{}.jpg", day)
}

/// Run a synchronous store call off the async runtime.
async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("store task failed: {}", e))?;
    Ok(result?)
}
