//! Fake Bot API server for integration tests. Token is always `1`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use image::{ImageFormat, Rgb, RgbImage};

use collagify_types::api::{
    ApiResponse, BotUser, DeleteMessagesRequest, File, GetFileRequest, GetUpdatesRequest,
};
use collagify_types::updates::Update;

pub const TOKEN: &str = "1";

/// Chat whose messages the fake server refuses to delete.
pub const UNDELETABLE_CHAT: i64 = 666;

#[derive(Debug, Clone)]
pub struct SentPhoto {
    pub chat_id: i64,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct Recorded {
    pub sent_photos: Vec<SentPhoto>,
    pub deleted: Vec<(i64, Vec<i64>)>,
    pub files: HashMap<String, Vec<u8>>,
    pub updates: Vec<Update>,
    pub polled_offsets: Vec<i64>,
}

pub type Shared = Arc<Mutex<Recorded>>;

pub struct FakeBotServer {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl FakeBotServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(Recorded::default()));

        let app = Router::new()
            .route("/bot1/getMe", post(get_me))
            .route("/bot1/getFile", post(get_file))
            .route("/bot1/getUpdates", post(get_updates))
            .route("/bot1/sendPhoto", post(send_photo))
            .route("/bot1/deleteMessages", post(delete_messages))
            .route("/file/bot1/testdir/{file}", get(download_file))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Serve `bytes` at `/file/bot1/testdir/{file_id}`.
    pub fn host_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(file_id.to_string(), bytes);
    }

    pub fn queue_update(&self, update: Update) {
        self.state.lock().unwrap().updates.push(update);
    }

    pub fn sent_filenames(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent_photos
            .iter()
            .map(|p| p.filename.clone())
            .collect()
    }

    pub fn sent_photos(&self) -> Vec<SentPhoto> {
        self.state.lock().unwrap().sent_photos.clone()
    }

    pub fn deleted(&self) -> Vec<(i64, Vec<i64>)> {
        self.state.lock().unwrap().deleted.clone()
    }
}

pub fn jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

async fn get_me() -> Json<ApiResponse<BotUser>> {
    Json(ApiResponse::success(BotUser {
        id: 1,
        username: Some("collagify_test_bot".to_string()),
    }))
}

async fn get_file(Json(req): Json<GetFileRequest>) -> Json<ApiResponse<File>> {
    Json(ApiResponse::success(File {
        file_path: Some(format!("testdir/{}", req.file_id)),
        file_id: req.file_id,
        ..File::default()
    }))
}

async fn get_updates(
    State(state): State<Shared>,
    Json(req): Json<GetUpdatesRequest>,
) -> Json<ApiResponse<Vec<Update>>> {
    let mut rec = state.lock().unwrap();
    rec.polled_offsets.push(req.offset);
    let pending = rec
        .updates
        .iter()
        .filter(|u| u.update_id >= req.offset)
        .cloned()
        .collect();
    Json(ApiResponse::success(pending))
}

async fn send_photo(State(state): State<Shared>, mut multipart: Multipart) -> impl IntoResponse {
    let mut chat_id = None;
    let mut photo = None;

    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("chat_id") => chat_id = Some(field.text().await.unwrap().parse::<i64>().unwrap()),
            Some("photo") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap().to_vec();
                photo = Some((filename, bytes));
            }
            _ => {}
        }
    }

    let (Some(chat_id), Some((filename, bytes))) = (chat_id, photo) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<serde_json::Value>::failure(400, "Bad Request: missing photo")),
        );
    };

    state.lock().unwrap().sent_photos.push(SentPhoto {
        chat_id,
        filename,
        bytes,
    });
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({}))),
    )
}

async fn delete_messages(
    State(state): State<Shared>,
    Json(req): Json<DeleteMessagesRequest>,
) -> impl IntoResponse {
    if req.chat_id == UNDELETABLE_CHAT {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<bool>::failure(400, "Bad Request: message can't be deleted")),
        );
    }

    state
        .lock()
        .unwrap()
        .deleted
        .push((req.chat_id, req.message_ids));
    (StatusCode::OK, Json(ApiResponse::success(true)))
}

async fn download_file(State(state): State<Shared>, Path(file): Path<String>) -> impl IntoResponse {
    match state.lock().unwrap().files.get(&file) {
        Some(bytes) => (StatusCode::OK, bytes.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}
