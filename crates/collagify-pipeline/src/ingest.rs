use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use collagify_db::StoreError;
use collagify_types::updates::{ChatMemberUpdated, Message, Update};

use crate::collaborators::{LinkStore, Messenger};

/// Turns incoming bot updates into store writes: photo posts become links,
/// membership events register the channel.
pub struct IngestHandler {
    store: Arc<dyn LinkStore>,
    messenger: Arc<dyn Messenger>,
    tz: Tz,
}

impl IngestHandler {
    pub fn new(store: Arc<dyn LinkStore>, messenger: Arc<dyn Messenger>, tz: Tz) -> Self {
        Self {
            store,
            messenger,
            tz,
        }
    }

    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        if update.channel_post.is_none() && update.my_chat_member.is_none() {
            warn!("Unsupported update {}, ignoring", update.update_id);
            return Ok(());
        }

        if let Some(event) = &update.my_chat_member {
            self.handle_my_chat_member(event).await?;
        }
        if let Some(post) = &update.channel_post {
            self.handle_channel_post(post).await?;
        }

        Ok(())
    }

    /// Record the largest rendition of a photo post. Posts without a photo
    /// are skipped.
    pub async fn handle_channel_post(&self, post: &Message) -> Result<()> {
        let Some(photo) = post.largest_photo() else {
            warn!(
                "Message {} in channel {} has no photo",
                post.id, post.chat.id
            );
            return Ok(());
        };

        let url = self
            .messenger
            .resolve_download_url(&photo.file_id)
            .await
            .with_context(|| format!("resolve file {}", photo.file_id))?;
        let submitted_at = localize(post.date, self.tz)?;

        let store = self.store.clone();
        let (channel_id, message_id) = (post.chat.id, post.id);
        tokio::task::spawn_blocking(move || {
            store.record_link(channel_id, message_id, submitted_at, &url)
        })
        .await
        .map_err(|e| anyhow!("store task failed: {}", e))?
        .context("record link")?;

        debug!(
            "Recorded message {} in channel {} at {}",
            message_id, channel_id, submitted_at
        );
        Ok(())
    }

    /// Register the chat the bot was added to. Re-registration is harmless.
    pub async fn handle_my_chat_member(&self, event: &ChatMemberUpdated) -> Result<()> {
        let registered_at = localize(event.date, self.tz)?;
        let store = self.store.clone();
        let channel_id = event.chat.id;

        let result = tokio::task::spawn_blocking(move || {
            store.register_channel(channel_id, registered_at)
        })
        .await
        .map_err(|e| anyhow!("store task failed: {}", e))?;

        match result {
            Ok(()) => {
                info!("Registered channel {}", channel_id);
                Ok(())
            }
            Err(StoreError::DuplicateKey(_)) => {
                debug!("Channel {} already registered", channel_id);
                Ok(())
            }
            Err(e) => Err(anyhow::Error::from(e).context("register channel")),
        }
    }
}

/// Wall-clock time of a unix timestamp in `tz`; the store groups days on this.
pub fn localize(unix_secs: i64, tz: Tz) -> Result<NaiveDateTime> {
    DateTime::from_timestamp(unix_secs, 0)
        .map(|utc| utc.with_timezone(&tz).naive_local())
        .ok_or_else(|| anyhow!("timestamp {} out of range", unix_secs))
}
