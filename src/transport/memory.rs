//! In-process emulation of the contents API.
//!
//! Behaves like GitHub for the calls the storage layer makes: file GETs
//! return wrapped base64 and a `sha`, directory GETs return the immediate
//! children, creates over an existing file without `sha` fail with 422, and
//! deletes with a stale `sha` fail with 409. Files above the inline limit
//! come back with `encoding: none` and empty `content`, like GitHub does
//! for files over 1 MB, and are only readable raw. One branch only; the
//! `ref` query and the `branch` body field are recorded but not interpreted.
//!
//! Tests can inspect every request and inject failures by request index.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::{ContentsMethod, ContentsRequest, ContentsResponse, ContentsTransport};
use crate::storage::blob::ContentCodec;
use crate::storage::record::{CreateRequest, DeleteRequest};
use crate::storage::{StorageError, StorageResult};

/// a request as the memory transport saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: ContentsMethod,
    pub path: String,
    pub url: String,
    pub body: Option<Value>,
}

/// largest file GitHub inlines into a JSON record
pub const INLINE_LIMIT: usize = 1024 * 1024;

enum Injected {
    Status(StatusCode, String),
    Disconnect(String),
    /// another client removes the file just before this request is served
    Remove(String),
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    inline_limit: Option<usize>,
    overrides: HashMap<String, (StatusCode, Value)>,
    requests: Vec<RecordedRequest>,
    injected: HashMap<usize, Injected>,
    cancel_at: HashMap<usize, CancellationToken>,
}

/// contents API emulation for tests and offline use
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// inline file content only up to `limit` bytes
    pub fn with_inline_limit(self, limit: usize) -> Self {
        self.state.lock().inline_limit = Some(limit);
        self
    }

    /// seed a file without going through the API
    pub fn insert_file(&self, path: &str, content: &[u8]) {
        self.state
            .lock()
            .files
            .insert(path.trim_matches('/').to_string(), content.to_vec());
    }

    /// current content of a file
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path.trim_matches('/')).cloned()
    }

    /// all stored file paths, sorted
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// answer every GET of `path` with a fixed status and body
    pub fn respond_with(&self, path: &str, status: StatusCode, body: Value) {
        self.state
            .lock()
            .overrides
            .insert(path.trim_matches('/').to_string(), (status, body));
    }

    /// every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// number of requests received so far
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// fail the next request with the given status
    pub fn fail_next(&self, status: StatusCode, message: &str) {
        self.fail_nth(0, status, message);
    }

    /// fail the n-th request from now (0 = next) with the given status
    pub fn fail_nth(&self, n: usize, status: StatusCode, message: &str) {
        let mut state = self.state.lock();
        let index = state.requests.len() + n;
        state.injected.insert(index, Injected::Status(status, message.to_string()));
    }

    /// fail the n-th request from now with a network-level fault
    pub fn disconnect_nth(&self, n: usize, reason: &str) {
        let mut state = self.state.lock();
        let index = state.requests.len() + n;
        state.injected.insert(index, Injected::Disconnect(reason.to_string()));
    }

    /// remove `path` right before the n-th request from now is served
    pub fn remove_file_at(&self, n: usize, path: &str) {
        let mut state = self.state.lock();
        let index = state.requests.len() + n;
        state.injected.insert(index, Injected::Remove(path.trim_matches('/').to_string()));
    }

    /// cancel `token` while serving the n-th request from now
    ///
    /// the request itself still completes, later ones see the cancellation.
    pub fn cancel_at(&self, n: usize, token: CancellationToken) {
        let mut state = self.state.lock();
        let index = state.requests.len() + n;
        state.cancel_at.insert(index, token);
    }

    fn handle(state: &mut MemoryState, request: &ContentsRequest) -> ContentsResponse {
        let path = request.locator.path().as_str().to_string();
        match request.method {
            ContentsMethod::Get => Self::handle_get(state, &path),
            ContentsMethod::GetRaw => Self::handle_get_raw(state, &path),
            ContentsMethod::Put => Self::handle_put(state, &path, request.body.as_ref()),
            ContentsMethod::Delete => Self::handle_delete(state, &path, request.body.as_ref()),
        }
    }

    fn handle_get(state: &MemoryState, path: &str) -> ContentsResponse {
        if let Some((status, body)) = state.overrides.get(path) {
            return respond(*status, body.clone());
        }

        if let Some(content) = state.files.get(path) {
            let mut record = entry_json(path, "file", content.len(), &git_sha(content));
            if content.len() > state.inline_limit.unwrap_or(INLINE_LIMIT) {
                record["content"] = Value::String(String::new());
                record["encoding"] = Value::String("none".into());
            } else {
                record["content"] = Value::String(wrap_base64(&ContentCodec::encode(content)));
                record["encoding"] = Value::String("base64".into());
            }
            return respond(StatusCode::OK, record);
        }

        let prefix = if path.is_empty() { String::new() } else { format!("{}/", path) };
        let mut children: BTreeMap<String, Value> = BTreeMap::new();
        for (key, content) in state.files.range(prefix.clone()..) {
            let rest = match key.strip_prefix(&prefix) {
                Some(rest) => rest,
                None => break,
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    let dir_path = format!("{}{}", prefix, dir);
                    let sha = git_sha(dir_path.as_bytes());
                    children
                        .entry(dir.to_string())
                        .or_insert_with(|| entry_json(&dir_path, "dir", 0, &sha));
                }
                None => {
                    children.insert(rest.to_string(), entry_json(key, "file", content.len(), &git_sha(content)));
                }
            }
        }

        if children.is_empty() && !path.is_empty() {
            return not_found();
        }
        respond(StatusCode::OK, Value::Array(children.into_values().collect()))
    }

    fn handle_get_raw(state: &MemoryState, path: &str) -> ContentsResponse {
        match state.files.get(path) {
            Some(content) => ContentsResponse::new(StatusCode::OK, content.clone()),
            None => not_found(),
        }
    }

    fn handle_put(state: &mut MemoryState, path: &str, body: Option<&Value>) -> ContentsResponse {
        let request: CreateRequest = match body.cloned().map(serde_json::from_value) {
            Some(Ok(request)) => request,
            _ => return invalid("Invalid request.\n\nFor 'properties/content', nil is not a string."),
        };

        let prefix = format!("{}/", path);
        if state.files.keys().any(|k| k.starts_with(&prefix)) {
            return invalid("Invalid request.\n\n\"path\" is a directory.");
        }

        let current_sha = state.files.get(path).map(|content| git_sha(content));
        let created = match (current_sha, &request.sha) {
            (Some(_), None) => return invalid("Invalid request.\n\n\"sha\" wasn't supplied."),
            (Some(current), Some(sha)) if current != sha.as_str() => {
                return conflict(path, sha.as_str());
            }
            (Some(_), Some(_)) => false,
            (None, _) => true,
        };

        let content = match ContentCodec::decode(&request.content) {
            Ok(content) => content.to_vec(),
            Err(_) => return invalid("content is not valid Base64"),
        };

        let sha = git_sha(&content);
        let size = content.len();
        state.files.insert(path.to_string(), content);

        let status = if created { StatusCode::CREATED } else { StatusCode::OK };
        respond(
            status,
            json!({
                "content": entry_json(path, "file", size, &sha),
                "commit": { "message": request.message },
            }),
        )
    }

    fn handle_delete(state: &mut MemoryState, path: &str, body: Option<&Value>) -> ContentsResponse {
        let request: DeleteRequest = match body.cloned().map(serde_json::from_value) {
            Some(Ok(request)) => request,
            _ => return invalid("Invalid request.\n\n\"sha\" wasn't supplied."),
        };

        let current_sha = state.files.get(path).map(|content| git_sha(content));
        match current_sha {
            None => not_found(),
            Some(current) if current != request.sha.as_str() => conflict(path, request.sha.as_str()),
            Some(_) => {
                state.files.remove(path);
                respond(
                    StatusCode::OK,
                    json!({ "content": null, "commit": { "message": request.message } }),
                )
            }
        }
    }
}

#[async_trait]
impl ContentsTransport for MemoryTransport {
    async fn send(&self, request: ContentsRequest) -> StorageResult<ContentsResponse> {
        let mut state = self.state.lock();
        let index = state.requests.len();
        state.requests.push(RecordedRequest {
            method: request.method,
            path: request.locator.path().as_str().to_string(),
            url: if request.method.is_read() {
                request.locator.read_url().to_string()
            } else {
                request.locator.url().to_string()
            },
            body: request.body.clone(),
        });

        if let Some(token) = state.cancel_at.remove(&index) {
            token.cancel();
        }

        match state.injected.remove(&index) {
            Some(Injected::Status(status, message)) => Ok(respond(status, json!({ "message": message }))),
            Some(Injected::Disconnect(reason)) => Err(StorageError::TransportFailure(reason)),
            Some(Injected::Remove(path)) => {
                state.files.remove(&path);
                Ok(Self::handle(&mut state, &request))
            }
            None => Ok(Self::handle(&mut state, &request)),
        }
    }
}

/// git-style 40 hex char token
fn git_sha(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    let digest = hex::encode(hasher.finalize());
    digest[..40].to_string()
}

fn wrap_base64(encoded: &str) -> String {
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / 60 + 1);
    for chunk in encoded.as_bytes().chunks(60) {
        wrapped.push_str(&String::from_utf8_lossy(chunk));
        wrapped.push('\n');
    }
    wrapped
}

fn entry_json(path: &str, kind: &str, size: usize, sha: &str) -> Value {
    let name = path.rsplit('/').next().unwrap_or(path);
    json!({
        "type": kind,
        "name": name,
        "path": path,
        "size": size,
        "sha": sha,
    })
}

fn respond(status: StatusCode, body: Value) -> ContentsResponse {
    ContentsResponse::new(status, body.to_string())
}

fn not_found() -> ContentsResponse {
    respond(
        StatusCode::NOT_FOUND,
        json!({ "message": "Not Found", "status": "404" }),
    )
}

fn invalid(message: &str) -> ContentsResponse {
    respond(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "message": message, "status": "422" }),
    )
}

fn conflict(path: &str, sha: &str) -> ContentsResponse {
    respond(
        StatusCode::CONFLICT,
        json!({ "message": format!("{} does not match {}", path, sha), "status": "409" }),
    )
}
