//!  Blob model and content encoding.
//!
//! This module holds the flat blob model the rest of the crate speaks and
//! the codec between raw bytes and the base64 text the contents API uses
//! in both directions.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::storage::errors::StorageResult;
pub(crate) use crate::storage::types::BlobPath;

/// whether a blob is a file or a folder marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobKind {
    File,
    Folder,
}

/// a path-addressed unit of content
///
/// Blobs are values built per call from remote responses. A change on the
/// remote side never updates an existing `Blob`, it produces a new one on
/// the next lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// full path, unique within repository + branch
    pub path: BlobPath,
    /// file or folder
    pub kind: BlobKind,
    /// size in bytes, if the remote reported one
    pub size: Option<u64>,
    /// secondary content hash (md5), if the remote reported one
    pub content_hash: Option<String>,
}

impl Blob {
    /// create a file blob with no metadata
    pub fn file(path: BlobPath) -> Self {
        Self {
            path,
            kind: BlobKind::File,
            size: None,
            content_hash: None,
        }
    }

    /// create a folder blob
    pub fn folder(path: BlobPath) -> Self {
        Self {
            path,
            kind: BlobKind::Folder,
            size: None,
            content_hash: None,
        }
    }

    /// set the size
    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    /// set the content hash
    pub fn with_content_hash(mut self, hash: Option<String>) -> Self {
        self.content_hash = hash;
        self
    }

    /// the last path segment
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// the folder the blob lives in (empty for the root)
    pub fn folder_path(&self) -> &str {
        self.path.folder_path()
    }

    pub fn is_file(&self) -> bool {
        self.kind == BlobKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == BlobKind::Folder
    }
}

/// readable content returned by `open_read`
///
/// implements both `std::io::Read` and `tokio::io::AsyncRead`.
pub type BlobStream = Cursor<Bytes>;

/// converts between raw bytes and the base64 text of the contents API
pub struct ContentCodec;

impl ContentCodec {
    /// encode raw bytes for a create request
    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    /// decode a content payload
    ///
    /// GitHub wraps the payload with a newline every 60 characters, so all
    /// ASCII whitespace is dropped before decoding.
    pub fn decode(content: &str) -> StorageResult<Bytes> {
        let compact: Vec<u8> = content
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD.decode(compact)?;
        Ok(Bytes::from(bytes))
    }

    /// decode a payload straight into a stream
    pub fn decode_stream(content: &str) -> StorageResult<BlobStream> {
        Ok(Cursor::new(Self::decode(content)?))
    }
}
