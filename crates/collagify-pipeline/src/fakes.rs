//! In-memory collaborators for pipeline and ingestion tests.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use image::{ImageFormat, Rgb, RgbImage};

use collagify_db::{Drained, Store, StoreError};

use crate::collaborators::{ImageFetcher, LinkStore, Messenger};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

pub fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn injected() -> StoreError {
    StoreError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
        Some("disk I/O error".to_string()),
    ))
}

/// Real store with switchable failures.
pub struct FlakyStore {
    pub inner: Store,
    drain_failures: Mutex<HashSet<i64>>,
    list_fails: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Store) -> Self {
        Self {
            inner,
            drain_failures: Mutex::new(HashSet::new()),
            list_fails: AtomicBool::new(false),
        }
    }

    pub fn fail_drain_for(&self, channel_id: i64) {
        self.drain_failures.lock().unwrap().insert(channel_id);
    }

    pub fn fail_list(&self) {
        self.list_fails.store(true, Ordering::SeqCst);
    }
}

impl LinkStore for FlakyStore {
    fn register_channel(&self, channel_id: i64, at: NaiveDateTime) -> Result<(), StoreError> {
        self.inner.register_channel(channel_id, at)
    }

    fn record_link(
        &self,
        channel_id: i64,
        message_id: i64,
        at: NaiveDateTime,
        url: &str,
    ) -> Result<(), StoreError> {
        self.inner.record_link(channel_id, message_id, at, url)
    }

    fn list_channels(&self) -> Result<Vec<i64>, StoreError> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.list_channels()
    }

    fn drain_groups(&self, channel_id: i64) -> Result<Drained, StoreError> {
        if self.drain_failures.lock().unwrap().contains(&channel_id) {
            return Err(injected());
        }
        self.inner.drain_groups(channel_id)
    }

    fn delete_links(&self, channel_id: i64, message_ids: &[i64]) -> Result<usize, StoreError> {
        self.inner.delete_links(channel_id, message_ids)
    }
}

type SendHook = Box<dyn Fn(i64) + Send + Sync>;

#[derive(Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<(i64, String, Vec<u8>)>>,
    deleted: Mutex<Vec<(i64, Vec<i64>)>>,
    failing_filenames: Mutex<HashSet<String>>,
    deletes_fail: AtomicBool,
    on_send: Mutex<Option<SendHook>>,
}

impl FakeMessenger {
    /// Run `hook` with the channel id after every successful send.
    pub fn on_send(&self, hook: impl Fn(i64) + Send + Sync + 'static) {
        *self.on_send.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn fail_send_for(&self, filename: &str) {
        self.failing_filenames
            .lock()
            .unwrap()
            .insert(filename.to_string());
    }

    pub fn fail_deletes(&self) {
        self.deletes_fail.store(true, Ordering::SeqCst);
    }

    /// `(filename, bytes)` of every collage sent to the channel, in order.
    pub fn sent(&self, channel_id: i64) -> Vec<(String, Vec<u8>)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| *id == channel_id)
            .map(|(_, name, bytes)| (name.clone(), bytes.clone()))
            .collect()
    }

    pub fn sent_filenames(&self, channel_id: i64) -> Vec<String> {
        self.sent(channel_id).into_iter().map(|(name, _)| name).collect()
    }

    pub fn deleted(&self) -> Vec<(i64, Vec<i64>)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn resolve_download_url(&self, file_id: &str) -> Result<String> {
        if file_id.is_empty() {
            bail!("Bad Request: invalid file_id");
        }
        Ok(format!("https://files.test/{}", file_id))
    }

    async fn send_image(&self, channel_id: i64, filename: &str, bytes: Vec<u8>) -> Result<()> {
        if self.failing_filenames.lock().unwrap().contains(filename) {
            bail!("sendPhoto: Bad Gateway");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id, filename.to_string(), bytes));
        if let Some(hook) = self.on_send.lock().unwrap().as_ref() {
            hook(channel_id);
        }
        Ok(())
    }

    async fn delete_messages(&self, channel_id: i64, message_ids: &[i64]) -> Result<()> {
        if self.deletes_fail.load(Ordering::SeqCst) {
            bail!("deleteMessages: Forbidden");
        }
        self.deleted
            .lock()
            .unwrap()
            .push((channel_id, message_ids.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(url.to_string(), bytes);
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("GET {}: 404 Not Found", url))
    }
}
