//! Seams between the collage pipeline and the outside world.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

use collagify_db::{Drained, Store, StoreError};

/// Messaging platform the bot lives on.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Turn a platform file handle into a URL the photo can be downloaded from.
    async fn resolve_download_url(&self, file_id: &str) -> Result<String>;

    async fn send_image(&self, channel_id: i64, filename: &str, bytes: Vec<u8>) -> Result<()>;

    async fn delete_messages(&self, channel_id: i64, message_ids: &[i64]) -> Result<()>;
}

/// Plain HTTP download of an image payload.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Persistence the pipeline and ingestion rely on. Calls are blocking.
pub trait LinkStore: Send + Sync {
    fn register_channel(&self, channel_id: i64, at: NaiveDateTime) -> Result<(), StoreError>;

    fn record_link(
        &self,
        channel_id: i64,
        message_id: i64,
        at: NaiveDateTime,
        url: &str,
    ) -> Result<(), StoreError>;

    fn list_channels(&self) -> Result<Vec<i64>, StoreError>;

    fn drain_groups(&self, channel_id: i64) -> Result<Drained, StoreError>;

    fn delete_links(&self, channel_id: i64, message_ids: &[i64]) -> Result<usize, StoreError>;
}

impl LinkStore for Store {
    fn register_channel(&self, channel_id: i64, at: NaiveDateTime) -> Result<(), StoreError> {
        Store::register_channel(self, channel_id, at)
    }

    fn record_link(
        &self,
        channel_id: i64,
        message_id: i64,
        at: NaiveDateTime,
        url: &str,
    ) -> Result<(), StoreError> {
        Store::record_link(self, channel_id, message_id, at, url)
    }

    fn list_channels(&self) -> Result<Vec<i64>, StoreError> {
        Store::list_channels(self)
    }

    fn drain_groups(&self, channel_id: i64) -> Result<Drained, StoreError> {
        Store::drain_groups(self, channel_id)
    }

    fn delete_links(&self, channel_id: i64, message_ids: &[i64]) -> Result<usize, StoreError> {
        Store::delete_links(self, channel_id, message_ids)
    }
}
