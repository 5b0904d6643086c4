//! The blob storage capability.
//!
//! [`BlobStorage`] is the contract a backend implements. Paths are plain
//! strings here and are validated by the backend, so a bad path surfaces as
//! [`StorageError::InvalidPath`](crate::storage::StorageError::InvalidPath)
//! before any network activity.
//!
//! Multi-path operations process their inputs one after another in input
//! order and stop at the first failure. None of them is atomic: items
//! handled before the failure keep their effect.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::storage::{Blob, BlobStream, ListOptions, StorageResult};

/// a unit of work spanning several mutations
#[async_trait]
pub trait BlobTransaction: Send {
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// replace the whole content at `path`
    ///
    /// `append` is advisory. Backends without append semantics write the
    /// full content either way.
    async fn write(&self, path: &str, content: &[u8], append: bool, cancel: &CancellationToken)
        -> StorageResult<()>;

    /// open the content at `path`, `None` when absent
    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> StorageResult<Option<BlobStream>>;

    /// delete every path, absent paths included
    async fn delete(&self, paths: &[&str], cancel: &CancellationToken) -> StorageResult<()>;

    /// one flag per path, in input order
    async fn exists(&self, paths: &[&str], cancel: &CancellationToken) -> StorageResult<Vec<bool>>;

    async fn list(&self, options: &ListOptions, cancel: &CancellationToken) -> StorageResult<Vec<Blob>>;

    /// metadata per path, in input order
    async fn get_blobs(&self, paths: &[&str], cancel: &CancellationToken) -> StorageResult<Vec<Blob>>;

    async fn open_transaction(&self) -> StorageResult<Box<dyn BlobTransaction>>;

    /// overwrite blob metadata
    async fn set_blobs(&self, blobs: &[Blob], cancel: &CancellationToken) -> StorageResult<()>;
}

/// single-path conveniences for every [`BlobStorage`]
#[async_trait]
pub trait BlobStorageExt: BlobStorage {
    async fn read_bytes(&self, path: &str, cancel: &CancellationToken) -> StorageResult<Option<Bytes>> {
        Ok(self.open_read(path, cancel).await?.map(|stream| stream.into_inner()))
    }

    /// read as UTF-8, invalid sequences are replaced
    async fn read_text(&self, path: &str, cancel: &CancellationToken) -> StorageResult<Option<String>> {
        let bytes = self.read_bytes(path, cancel).await?;
        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    async fn write_text(&self, path: &str, text: &str, cancel: &CancellationToken) -> StorageResult<()> {
        self.write(path, text.as_bytes(), false, cancel).await
    }

    async fn exists_one(&self, path: &str, cancel: &CancellationToken) -> StorageResult<bool> {
        let flags = self.exists(&[path], cancel).await?;
        Ok(flags.first().copied().unwrap_or(false))
    }

    async fn delete_one(&self, path: &str, cancel: &CancellationToken) -> StorageResult<()> {
        self.delete(&[path], cancel).await
    }

    async fn get_blob(&self, path: &str, cancel: &CancellationToken) -> StorageResult<Option<Blob>> {
        let blobs = self.get_blobs(&[path], cancel).await?;
        Ok(blobs.into_iter().next())
    }

    async fn list_folder(&self, folder: &str, recurse: bool, cancel: &CancellationToken) -> StorageResult<Vec<Blob>> {
        let options = ListOptions::in_folder(folder)?.recurse(recurse);
        self.list(&options, cancel).await
    }
}

impl<T: BlobStorage + ?Sized> BlobStorageExt for T {}
