use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use collagify_pipeline::{ImageFetcher, Messenger};
use collagify_types::api::{
    ApiResponse, BotUser, DeleteMessagesRequest, File, GetFileRequest, GetUpdatesRequest,
};
use collagify_types::updates::Update;

pub const DEFAULT_SERVER: &str = "https://api.telegram.org";

/// `deleteMessages` accepts at most this many ids per call.
const DELETE_BATCH: usize = 100;

/// Updates the bot subscribes to.
const ALLOWED_UPDATES: [&str; 2] = ["channel_post", "my_chat_member"];

#[derive(Debug, Error)]
pub enum BotApiError {
    #[error("{method}: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method}: Telegram error {code}: {description}")]
    Api {
        method: String,
        code: i64,
        description: String,
    },

    #[error("{method}: response carried no result")]
    MissingResult { method: String },

    #[error("GET {url}: HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Bot API client bound to one token.
#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    server: String,
    token: String,
}

impl BotApi {
    pub fn new(server: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), server, token)
    }

    pub fn with_client(
        client: reqwest::Client,
        server: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let server: String = server.into();
        Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.server, self.token, method)
    }

    /// Download URL for a `file_path` returned by `getFile`.
    pub fn file_download_link(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.server, self.token, file_path)
    }

    async fn call<Req, Res>(&self, method: &str, body: &Req) -> Result<Res, BotApiError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|source| http(method, source))?;

        let envelope: ApiResponse<Res> =
            resp.json().await.map_err(|source| http(method, source))?;
        unwrap_envelope(method, envelope)
    }

    pub async fn get_me(&self) -> Result<BotUser, BotApiError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotApiError> {
        let body = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES.iter().map(|s| s.to_string()).collect(),
        };

        // the HTTP request has to outlive the server-side poll
        let resp = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .json(&body)
            .send()
            .await
            .map_err(|source| http("getUpdates", source))?;

        let envelope: ApiResponse<Vec<Update>> = resp
            .json()
            .await
            .map_err(|source| http("getUpdates", source))?;
        unwrap_envelope("getUpdates", envelope)
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, BotApiError> {
        let body = GetFileRequest {
            file_id: file_id.to_string(),
        };
        self.call("getFile", &body).await
    }

    /// Upload a photo as multipart form data.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BotApiError> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/jpeg")
            .map_err(|source| http("sendPhoto", source))?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);

        let resp = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|source| http("sendPhoto", source))?;

        let envelope: ApiResponse<serde_json::Value> = resp
            .json()
            .await
            .map_err(|source| http("sendPhoto", source))?;
        unwrap_envelope("sendPhoto", envelope)?;

        debug!("Sent {} ({} bytes) to chat {}", filename, size, chat_id);
        Ok(())
    }

    /// Delete messages, batched to the per-call limit.
    pub async fn delete_messages(&self, chat_id: i64, message_ids: &[i64]) -> Result<(), BotApiError> {
        for batch in message_ids.chunks(DELETE_BATCH) {
            let body = DeleteMessagesRequest {
                chat_id,
                message_ids: batch.to_vec(),
            };
            let _: bool = self.call("deleteMessages", &body).await?;
        }

        debug!("Deleted {} messages in chat {}", message_ids.len(), chat_id);
        Ok(())
    }

    /// Plain GET of a file URL.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, BotApiError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| http("download", source))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BotApiError::Status {
                url: redact(url, &self.token),
                status,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|source| http("download", source))?;
        Ok(bytes.to_vec())
    }
}

fn http(method: &str, source: reqwest::Error) -> BotApiError {
    BotApiError::Http {
        method: method.to_string(),
        source: source.without_url(),
    }
}

fn unwrap_envelope<T>(method: &str, envelope: ApiResponse<T>) -> Result<T, BotApiError> {
    if !envelope.ok {
        return Err(BotApiError::Api {
            method: method.to_string(),
            code: envelope.error_code.unwrap_or_default(),
            description: envelope.description.unwrap_or_default(),
        });
    }

    envelope.result.ok_or_else(|| BotApiError::MissingResult {
        method: method.to_string(),
    })
}

// Download links embed the token; keep it out of logs and errors.
fn redact(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    url.replace(&format!("/bot{}/", token), "/bot<token>/")
}

#[async_trait]
impl Messenger for BotApi {
    async fn resolve_download_url(&self, file_id: &str) -> anyhow::Result<String> {
        let file = self.get_file(file_id).await?;
        let path = file
            .file_path
            .ok_or_else(|| anyhow::anyhow!("getFile: no file_path for {}", file_id))?;
        Ok(self.file_download_link(&path))
    }

    async fn send_image(&self, channel_id: i64, filename: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        Ok(self.send_photo(channel_id, filename, bytes).await?)
    }

    async fn delete_messages(&self, channel_id: i64, message_ids: &[i64]) -> anyhow::Result<()> {
        Ok(BotApi::delete_messages(self, channel_id, message_ids).await?)
    }
}

#[async_trait]
impl ImageFetcher for BotApi {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        Ok(self.download(url).await?)
    }
}
