//! Translation between contents API records and the blob model.
//!
//! A GET on the contents endpoint answers with one JSON object for a file
//! and with an array of (content-less) objects for a directory. Create and
//! delete requests carry small JSON bodies with the commit message, the
//! branch and either the new content or the current `sha`.

use serde::{Deserialize, Serialize};

use crate::storage::blob::{Blob, BlobKind};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{BlobPath, BranchName, ContentSha};

/// one file or directory entry as the contents API describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RemoteRecord {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
    /// base64 payload, only present on a single-file fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// `base64`, or `none` when the file is too large to inline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// concurrency token
    #[serde(default)]
    pub sha: Option<ContentSha>,
    /// secondary hash, most API versions leave it out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl RemoteRecord {
    /// classify the entry
    ///
    /// everything that isn't a `dir` (files, symlinks, submodules) is a file
    /// from the blob model's point of view.
    pub fn blob_kind(&self) -> BlobKind {
        if self.kind.eq_ignore_ascii_case("dir") {
            BlobKind::Folder
        } else {
            BlobKind::File
        }
    }

    pub fn is_dir(&self) -> bool {
        self.blob_kind() == BlobKind::Folder
    }

    /// the entry path, as the remote reported it
    pub fn blob_path(&self) -> BlobPath {
        BlobPath::from_remote(&self.path)
    }

    /// convert to the blob model
    pub fn to_blob(&self) -> Blob {
        let path = self.blob_path();
        let blob = match self.blob_kind() {
            BlobKind::File => Blob::file(path),
            BlobKind::Folder => Blob::folder(path),
        };
        blob.with_size(self.size)
            .with_content_hash(self.md5.clone().filter(|h| !h.is_empty()))
    }

    /// the file body was left out of the record
    ///
    /// files over 1 MB come back with `encoding: none` and an empty
    /// `content`, their bytes have to be fetched raw.
    pub fn content_omitted(&self) -> bool {
        if self.encoding.as_deref().is_some_and(|e| e.eq_ignore_ascii_case("none")) {
            return true;
        }
        let empty = self.content.as_deref().map_or(true, |c| c.trim().is_empty());
        empty && self.size.unwrap_or(0) > 0
    }

    /// the token a mutation of this record has to present
    pub fn token(&self, path: &BlobPath) -> StorageResult<&ContentSha> {
        self.sha.as_ref().ok_or_else(|| StorageError::UnexpectedEntryType {
            path: path.clone(),
            expected: "file record with sha",
            found: format!("{} record without sha", self.kind),
        })
    }
}

/// what a GET on a path resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum RemoteContents {
    Directory(Vec<RemoteRecord>),
    Entry(RemoteRecord),
}

impl RemoteContents {
    /// describe the shape for error messages
    pub fn describe(&self) -> String {
        match self {
            RemoteContents::Directory(_) => "directory".to_string(),
            RemoteContents::Entry(record) => record.kind.clone(),
        }
    }
}

/// parse the body of a successful GET
pub(crate) fn parse_contents(body: &[u8]) -> StorageResult<RemoteContents> {
    Ok(serde_json::from_slice(body)?)
}

/// body of a create (PUT) request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CreateRequest {
    pub message: String,
    pub content: String,
    pub branch: BranchName,
    /// only set by callers that update in place, the replace protocol never does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<ContentSha>,
}

impl CreateRequest {
    pub fn new(message: impl Into<String>, content: String, branch: BranchName) -> Self {
        Self {
            message: message.into(),
            content,
            branch,
            sha: None,
        }
    }

    pub fn to_json(&self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// body of a DELETE request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DeleteRequest {
    pub message: String,
    pub sha: ContentSha,
    pub branch: BranchName,
}

impl DeleteRequest {
    pub fn new(message: impl Into<String>, sha: ContentSha, branch: BranchName) -> Self {
        Self {
            message: message.into(),
            sha,
            branch,
        }
    }

    pub fn to_json(&self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
