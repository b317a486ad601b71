//! Thin Telegram Bot API client: just the methods the collage bot needs,
//! plus the long-polling loop that feeds the ingestion handler.

pub mod client;
pub mod poller;

pub use client::{BotApi, BotApiError};
pub use poller::{poll_once, run_update_loop};
