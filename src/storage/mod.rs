//! storage layer for gitblob
//!
//! this module maps a flat, path-addressed blob model onto the GitHub
//! contents API. Callers use [`GitHubBlobStorage`] through the
//! [`BlobStorage`](crate::capability::BlobStorage) trait and never see
//! contents API records or HTTP.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   GitHubBlobStorage                         │
//! │     (write, read, delete, exists, list, metadata)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │   commit    │       │    blob     │
//!  │  (listing)  │       │  (writes)   │       │  (base64)   │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                 ┌───────────────────────────┐
//!                 │  record  +  locator       │
//!                 │  (JSON)     (URLs)        │
//!                 └───────────────────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use gitblob::{BlobStorage, BlobStorageExt, GitHubBlobStorage};
//! use tokio_util::sync::CancellationToken;
//!
//! let storage = GitHubBlobStorage::connect("owner", "repository", "main", token)?;
//! let cancel = CancellationToken::new();
//!
//! storage.write_text("Tests/test.txt", "I am test.txt Hello World!", &cancel).await?;
//! let text = storage.read_text("Tests/test.txt", &cancel).await?;
//!
//! let blobs = storage.list_folder("Tests", false, &cancel).await?;
//! storage.delete_one("Tests/test.txt", &cancel).await?;
//! ```

pub(crate) mod blob;
mod commit;
mod errors;
mod locator;
pub(crate) mod record;
mod repository;
mod tree;
mod types;

// Re-export public API
pub use blob::{Blob, BlobKind, BlobStream, ContentCodec};
pub use commit::{CommitMessage, DeleteOutcome};
pub use errors::{StorageError, StorageResult};
pub use locator::{ContentsEndpoint, ResourceLocator};
pub use repository::GitHubBlobStorage;
pub use tree::{BrowseFilter, ListOptions};
pub use types::{BlobPath, BranchName, ContentSha, InvalidNameError, RepositoryCoordinates};
