//! gitblob - blob storage on top of a GitHub repository
//!
//! This crate stores path-addressed blobs as files on one branch of a GitHub
//! repository through the REST contents API. Every write and delete is a
//! commit, folders are directories, and the repository history keeps every
//! version ever written.
//!
//! # Example
//!
//! ```no_run
//! use gitblob::{BlobStorageExt, GitHubBlobStorage};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> gitblob::StorageResult<()> {
//! let storage = GitHubBlobStorage::connect("owner", "repository", "main", "ghp_token")?;
//! let cancel = CancellationToken::new();
//!
//! storage.write_text("notes/hello.txt", "Hello World!", &cancel).await?;
//! assert!(storage.exists_one("notes/hello.txt", &cancel).await?);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod config;
pub mod logging;
pub mod storage;
pub mod transport;

pub use capability::{BlobStorage, BlobStorageExt, BlobTransaction};
pub use config::GitHubConnection;
pub use storage::{Blob, BlobKind, BlobPath, GitHubBlobStorage, ListOptions, StorageError, StorageResult};
