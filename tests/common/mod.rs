#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use block_editor::codec::document;
use block_editor::db::repository::{CommitMode, RemoteBlockRepository};
use block_editor::models::block::{Block, BlockInput, Step, Visibility};
use block_editor::settings::StoreConfig;
use block_editor::storage::client::{BlobStore, Expectation};
use block_editor::storage::memory::MemoryBlobStore;

pub const DOCUMENT_PATH: &str = "data/airdrop/data.json";
pub const TOKEN: &str = "test-token";

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Two stored records: one with every optional field empty, one fully populated.
pub fn two_record_collection() -> Vec<Block> {
    let sparse = BlockInput {
        id: Some("1714550400000".to_string()),
        title: "Linea voyage".to_string(),
        ..Default::default()
    }
    .into_block(None, ts("2024-05-01T08:00:00.000Z"));

    let full = BlockInput {
        id: Some("1714636800000".to_string()),
        title: "zkSync \u{2014} \"Era\" quest".to_string(),
        steps: vec![
            Step {
                text: "Bridge ETH".to_string(),
                link: Some("https://bridge.zksync.io".to_string()),
            },
            Step {
                text: "Swap on a DEX".to_string(),
                link: None,
            },
        ],
        images: Some(vec!["data/images/zksync.png".to_string()]),
        information: "Snapshot unknown\nKeep volume > $1k".to_string(),
        tags: vec!["l2".to_string(), "defi".to_string()],
        source_links: vec!["https://x.com/zksync".to_string()],
        visibility: Visibility::Hide,
    }
    .into_block(None, ts("2024-05-02T08:00:00.000Z"));

    vec![sparse, full]
}

/// A memory store already holding `blocks` at the document path.
pub async fn seeded_store(blocks: &[Block]) -> Arc<MemoryBlobStore> {
    let store = Arc::new(MemoryBlobStore::new());
    store
        .commit(
            DOCUMENT_PATH,
            document::encode(blocks).unwrap(),
            Expectation::Any,
            "seed",
        )
        .await
        .unwrap();
    store
}

pub fn repo(store: Arc<MemoryBlobStore>, mode: CommitMode) -> RemoteBlockRepository {
    RemoteBlockRepository::new(store, DOCUMENT_PATH).with_mode(mode)
}

pub fn input(title: &str) -> BlockInput {
    BlockInput {
        title: title.to_string(),
        ..Default::default()
    }
}

// --- Fake GitHub contents API ---

#[derive(Debug, Clone)]
pub struct FakeFile {
    pub content: String,
    pub sha: String,
}

#[derive(Debug, Clone)]
pub struct FakeCommit {
    pub path: String,
    pub message: String,
    pub branch: String,
}

/// In-process stand-in for `GET`/`PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Default)]
pub struct FakeGitHub {
    pub files: Mutex<HashMap<String, FakeFile>>,
    pub commits: Mutex<Vec<FakeCommit>>,
    oversized: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

impl FakeGitHub {
    fn next_sha(&self) -> String {
        format!("sha{:04}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn file(&self, path: &str) -> Option<FakeFile> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn commits(&self) -> Vec<FakeCommit> {
        self.commits.lock().unwrap().clone()
    }

    /// Serve `path` the way the API serves files over 1 MB: no inline content.
    pub fn mark_oversized(&self, path: &str) {
        self.oversized.lock().unwrap().insert(path.to_string());
    }

    fn is_oversized(&self, path: &str) -> bool {
        self.oversized.lock().unwrap().contains(path)
    }
}

#[derive(Debug, Deserialize)]
struct PutBody {
    message: String,
    content: String,
    branch: String,
    sha: Option<String>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("token {TOKEN}"))
        .unwrap_or(false)
}

/// The real API wraps base64 at 60 columns.
fn wrap(content: &str) -> String {
    content
        .as_bytes()
        .chunks(60)
        .map(|chunk| format!("{}\n", String::from_utf8_lossy(chunk)))
        .collect()
}

async fn get_content(
    State(fake): State<Arc<FakeGitHub>>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if query.get("ref").map(String::as_str) != Some("main") {
        return StatusCode::NOT_FOUND.into_response();
    }
    let raw = headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        == Some("application/vnd.github.raw");

    match fake.file(&path) {
        Some(file) if raw => document::transport_decode(&file.content)
            .unwrap()
            .into_response(),
        Some(file) if fake.is_oversized(&path) => Json(serde_json::json!({
            "type": "file",
            "path": path,
            "sha": file.sha,
            "encoding": "none",
            "content": "",
        }))
        .into_response(),
        Some(file) => Json(serde_json::json!({
            "type": "file",
            "path": path,
            "sha": file.sha,
            "encoding": "base64",
            "content": wrap(&file.content),
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": "Not Found" })),
        )
            .into_response(),
    }
}

async fn put_content(
    State(fake): State<Arc<FakeGitHub>>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<PutBody>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut files = fake.files.lock().unwrap();
    let status = match (files.get(&path), body.sha.as_deref()) {
        (Some(_), None) => return StatusCode::UNPROCESSABLE_ENTITY.into_response(),
        (Some(current), Some(sha)) if current.sha != sha => {
            return StatusCode::CONFLICT.into_response()
        }
        (None, Some(_)) => return StatusCode::CONFLICT.into_response(),
        (Some(_), Some(_)) => StatusCode::OK,
        (None, None) => StatusCode::CREATED,
    };

    let sha = fake.next_sha();
    files.insert(
        path.clone(),
        FakeFile {
            content: body.content,
            sha: sha.clone(),
        },
    );
    fake.commits.lock().unwrap().push(FakeCommit {
        path: path.clone(),
        message: body.message,
        branch: body.branch,
    });

    (
        status,
        Json(serde_json::json!({
            "content": { "path": path, "sha": sha },
            "commit": { "sha": format!("commit-{sha}") },
        })),
    )
        .into_response()
}

/// Serve a [`FakeGitHub`] on a random local port and return a matching config.
pub async fn spawn_fake_github() -> (Arc<FakeGitHub>, StoreConfig) {
    let fake = Arc::new(FakeGitHub::default());
    let app = Router::new()
        .route(
            "/repos/{owner}/{repo}/contents/{*path}",
            get(get_content).put(put_content),
        )
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake GitHub listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = StoreConfig::new("acme", "content", TOKEN);
    config.api_base = format!("http://{addr}");
    (fake, config)
}
