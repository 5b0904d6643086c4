//!  Mutations as remote commits
//!
//!  every mutation of the remote repository is a commit on the configured branch:
//! - a delete presents the current `sha` of the file it removes
//! - the contents API has no plain overwrite, so a write of an existing path
//!   is a delete commit followed by a create commit
//! - the `sha` is always fetched right before the mutation, never reused
//!
//! this module implements that fetch-then-mutate protocol. Nothing here is
//! atomic: a create that fails after its delete succeeded leaves the path
//! absent, and a failed batch keeps the effects of the items before it.

use tracing::{debug, info, warn};

use crate::storage::blob::ContentCodec;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::record::{CreateRequest, DeleteRequest, RemoteContents, RemoteRecord};
use crate::storage::types::BlobPath;
use crate::transport::{ContentsMethod, ContentsSession};

/// commit messages used by the write protocol
pub struct CommitMessage;

impl CommitMessage {
    /// message for the delete half of a replace
    pub fn replace_existing() -> &'static str {
        "Delete existing file to replace with a new one"
    }

    /// message for a create
    ///
    /// the append flag only changes the wording, content is always replaced
    pub fn create(append: bool) -> &'static str {
        if append {
            "Append to existing file"
        } else {
            "Create or overwrite file"
        }
    }

    /// message for an explicit delete
    pub fn delete(path: &BlobPath) -> String {
        format!("Delete {}", path)
    }
}

/// what a delete did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// runs the fetch-then-mutate protocol against one session
pub(crate) struct WriteCoordinator<'s, 'a> {
    session: &'s ContentsSession<'a>,
}

impl<'s, 'a> WriteCoordinator<'s, 'a> {
    pub(crate) fn new(session: &'s ContentsSession<'a>) -> Self {
        Self { session }
    }

    /// fetch the file record at a path
    ///
    /// `Ok(None)` when absent, an error when the path is a directory.
    pub(crate) async fn fetch_file(
        &self,
        path: &BlobPath,
        operation: &'static str,
    ) -> StorageResult<Option<RemoteRecord>> {
        match self.session.fetch(path, operation).await? {
            None => Ok(None),
            Some(RemoteContents::Entry(record)) if !record.is_dir() => Ok(Some(record)),
            Some(other) => Err(StorageError::UnexpectedEntryType {
                path: path.clone(),
                expected: "file",
                found: other.describe(),
            }),
        }
    }

    /// replace the whole content at a path
    pub(crate) async fn replace(&self, path: &BlobPath, bytes: &[u8], append: bool) -> StorageResult<()> {
        if append {
            debug!(%path, "append requested, writing full content");
        }

        // 1. fetch the current token
        if let Some(existing) = self.fetch_file(path, "writing file to").await? {
            // 2. delete the current version
            let sha = existing.token(path)?.clone();
            debug!(%path, sha = sha.short(), "deleting existing file before replace");
            let request = DeleteRequest::new(
                CommitMessage::replace_existing(),
                sha,
                self.session.endpoint().branch().clone(),
            );
            match self.delete_version(path, request).await {
                Ok(()) => {}
                // someone else removed it first, the create still goes ahead
                Err(e) if e.is_not_found() => debug!(%path, "file vanished before replace"),
                Err(e) => return Err(e),
            }
        }

        // 3. create the new version
        let request = CreateRequest::new(
            CommitMessage::create(append),
            ContentCodec::encode(bytes),
            self.session.endpoint().branch().clone(),
        );
        self.session
            .mutate(ContentsMethod::Put, path, request.to_json()?, "uploading file to")
            .await
            .inspect_err(|e| warn!(%path, error = %e, "create failed"))?;

        info!(%path, size = bytes.len(), "file written");
        Ok(())
    }

    /// delete a path if it exists
    pub(crate) async fn delete(&self, path: &BlobPath) -> StorageResult<DeleteOutcome> {
        let existing = match self.fetch_file(path, "deleting file from").await? {
            Some(record) => record,
            None => {
                debug!(%path, "delete of absent file");
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
        };

        let sha = existing.token(path)?.clone();
        let request = DeleteRequest::new(
            CommitMessage::delete(path),
            sha,
            self.session.endpoint().branch().clone(),
        );

        match self.delete_version(path, request).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            // removed by someone else between our fetch and our delete
            Err(e) if e.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }

    async fn delete_version(&self, path: &BlobPath, request: DeleteRequest) -> StorageResult<()> {
        self.session
            .mutate(ContentsMethod::Delete, path, request.to_json()?, "deleting file from")
            .await
            .inspect_err(|e| warn!(%path, error = %e, "delete failed"))?;

        info!(%path, "file deleted");
        Ok(())
    }
}
