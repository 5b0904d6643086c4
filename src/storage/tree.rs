//! Directory listing over the contents API.
//!
//! The contents API only lists one directory level per request, so a
//! recursive listing is a walk: fetch a directory, emit its entries and
//! descend into sub-directories before moving on to the next sibling.
//!
//! The walk keeps an explicit stack of pending sibling iterators instead of
//! recursing, and remembers every directory it fetched. A directory served
//! twice means the remote answers are inconsistent and the walk stops with
//! [`StorageError::TraversalCycle`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::storage::blob::Blob;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::record::{RemoteContents, RemoteRecord};
use crate::storage::types::BlobPath;
use crate::transport::ContentsSession;

/// caller supplied predicate over listed blobs
pub type BrowseFilter = Arc<dyn Fn(&Blob) -> bool + Send + Sync>;

/// what to list and how
#[derive(Clone)]
pub struct ListOptions {
    /// folder to start from, the repository root by default
    pub folder_path: BlobPath,
    /// descend into sub-folders
    pub recurse: bool,
    /// only entries whose name starts with this
    pub file_prefix: Option<String>,
    pub browse_filter: Option<BrowseFilter>,
    /// stop the whole walk after this many matches
    pub max_results: Option<usize>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            folder_path: BlobPath::root(),
            recurse: false,
            file_prefix: None,
            browse_filter: None,
            max_results: None,
        }
    }
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// list a folder, `""` or `"/"` for the root
    pub fn in_folder(folder: impl AsRef<str>) -> StorageResult<Self> {
        Ok(Self::new().folder(BlobPath::folder(folder)?))
    }

    pub fn folder(mut self, folder: BlobPath) -> Self {
        self.folder_path = folder;
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = Some(prefix.into());
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Blob) -> bool + Send + Sync + 'static,
    {
        self.browse_filter = Some(Arc::new(filter));
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// does a blob pass the prefix and the filter
    pub fn is_match(&self, blob: &Blob) -> bool {
        if let Some(prefix) = &self.file_prefix {
            if !blob.name().starts_with(prefix.as_str()) {
                return false;
            }
        }
        match &self.browse_filter {
            Some(filter) => filter(blob),
            None => true,
        }
    }

    fn is_full(&self, collected: usize) -> bool {
        self.max_results.is_some_and(|max| collected >= max)
    }
}

impl fmt::Debug for ListOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListOptions")
            .field("folder_path", &self.folder_path)
            .field("recurse", &self.recurse)
            .field("file_prefix", &self.file_prefix)
            .field("browse_filter", &self.browse_filter.as_ref().map(|_| "<fn>"))
            .field("max_results", &self.max_results)
            .finish()
    }
}

/// walks remote directories for one listing call
pub(crate) struct TreeWalker<'s, 'a> {
    session: &'s ContentsSession<'a>,
    visited: HashSet<BlobPath>,
}

impl<'s, 'a> TreeWalker<'s, 'a> {
    pub(crate) fn new(session: &'s ContentsSession<'a>) -> Self {
        Self {
            session,
            visited: HashSet::new(),
        }
    }

    /// list blobs in pre-order, depth first
    pub(crate) async fn list(mut self, options: &ListOptions) -> StorageResult<Vec<Blob>> {
        let mut blobs = Vec::new();
        if options.max_results == Some(0) {
            return Ok(blobs);
        }

        let mut pending: Vec<std::vec::IntoIter<RemoteRecord>> = Vec::new();
        if let Some(entries) = self.read_folder(&options.folder_path).await? {
            pending.push(entries.into_iter());
        }

        while let Some(siblings) = pending.last_mut() {
            let Some(record) = siblings.next() else {
                pending.pop();
                continue;
            };

            let blob = record.to_blob();
            if !options.is_match(&blob) {
                trace!(path = %blob.path, "skipped");
                continue;
            }

            let descend = options.recurse && blob.is_folder();
            let folder = blob.path.clone();
            trace!(path = %folder, kind = ?blob.kind, "listed");
            blobs.push(blob);

            if options.is_full(blobs.len()) {
                debug!(folder = %options.folder_path, count = blobs.len(), "listing truncated");
                return Ok(blobs);
            }

            if descend {
                if let Some(entries) = self.read_folder(&folder).await? {
                    pending.push(entries.into_iter());
                }
            }
        }

        debug!(folder = %options.folder_path, count = blobs.len(), "listing complete");
        Ok(blobs)
    }

    /// entries of one directory, `None` when it doesn't exist
    async fn read_folder(&mut self, folder: &BlobPath) -> StorageResult<Option<Vec<RemoteRecord>>> {
        if !self.visited.insert(folder.clone()) {
            return Err(StorageError::TraversalCycle(folder.clone()));
        }
        trace!(%folder, "descending");

        match self.session.fetch(folder, "listing files from").await? {
            None => Ok(None),
            Some(RemoteContents::Directory(entries)) => Ok(Some(entries)),
            Some(RemoteContents::Entry(record)) => Err(StorageError::UnexpectedEntryType {
                path: folder.clone(),
                expected: "directory",
                found: record.kind,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BranchName, ContentsEndpoint, RepositoryCoordinates};
    use crate::transport::MemoryTransport;
    use reqwest::StatusCode;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn endpoint() -> ContentsEndpoint {
        ContentsEndpoint::new(
            "https://api.github.com",
            RepositoryCoordinates::new("o", "r", BranchName::main()),
        )
        .unwrap()
    }

    fn sample() -> MemoryTransport {
        let transport = MemoryTransport::new();
        transport.insert_file("docs/a.txt", b"a");
        transport.insert_file("docs/b.md", b"bb");
        transport.insert_file("docs/sub/c.txt", b"ccc");
        transport.insert_file("docs/sub/deep/d.txt", b"dddd");
        transport.insert_file("readme.md", b"r");
        transport
    }

    async fn list(transport: &MemoryTransport, options: ListOptions) -> StorageResult<Vec<Blob>> {
        let (endpoint, cancel) = (endpoint(), CancellationToken::new());
        let session = ContentsSession::new(transport, &endpoint, &cancel);
        TreeWalker::new(&session).list(&options).await
    }

    fn paths(blobs: &[Blob]) -> Vec<&str> {
        blobs.iter().map(|b| b.path.as_str()).collect()
    }

    #[test]
    fn test_is_match() {
        let blob = Blob::file(BlobPath::new("docs/report.txt").unwrap());
        assert!(ListOptions::new().is_match(&blob));
        assert!(ListOptions::new().prefix("rep").is_match(&blob));
        // prefix applies to the name, not the full path
        assert!(!ListOptions::new().prefix("docs").is_match(&blob));
        assert!(!ListOptions::new().filter(|b| b.is_folder()).is_match(&blob));
    }

    #[tokio::test]
    async fn test_single_level() {
        let transport = sample();
        let blobs = list(&transport, ListOptions::in_folder("docs").unwrap()).await.unwrap();

        assert_eq!(paths(&blobs), vec!["docs/a.txt", "docs/b.md", "docs/sub"]);
        assert!(blobs[2].is_folder());
        assert_eq!(blobs[1].size, Some(2));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_recursive_is_preorder() {
        let transport = sample();
        let blobs = list(&transport, ListOptions::new().recurse(true)).await.unwrap();

        assert_eq!(
            paths(&blobs),
            vec![
                "docs",
                "docs/a.txt",
                "docs/b.md",
                "docs/sub",
                "docs/sub/c.txt",
                "docs/sub/deep",
                "docs/sub/deep/d.txt",
                "readme.md",
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_skips_without_descending() {
        let transport = sample();
        let options = ListOptions::new().recurse(true).filter(|b| b.name() != "sub");
        let blobs = list(&transport, options).await.unwrap();

        assert_eq!(paths(&blobs), vec!["docs", "docs/a.txt", "docs/b.md", "readme.md"]);
    }

    #[tokio::test]
    async fn test_prefix_filter() {
        let transport = sample();
        let options = ListOptions::in_folder("docs").unwrap().prefix("b");
        let blobs = list(&transport, options).await.unwrap();
        assert_eq!(paths(&blobs), vec!["docs/b.md"]);
    }

    #[tokio::test]
    async fn test_max_results_is_prefix_of_full_order() {
        let transport = sample();
        let full = list(&transport, ListOptions::new().recurse(true)).await.unwrap();

        for k in [1, 3, 5, 20] {
            let limited = list(&transport, ListOptions::new().recurse(true).max_results(k))
                .await
                .unwrap();
            assert_eq!(limited.len(), k.min(full.len()));
            assert_eq!(limited[..], full[..limited.len()]);
        }
    }

    #[tokio::test]
    async fn test_max_results_zero_sends_nothing() {
        let transport = sample();
        let blobs = list(&transport, ListOptions::new().max_results(0)).await.unwrap();
        assert!(blobs.is_empty());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_folder_is_empty() {
        let transport = sample();
        let blobs = list(&transport, ListOptions::in_folder("nope").unwrap()).await.unwrap();
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn test_file_where_folder_expected() {
        let transport = sample();
        let err = list(&transport, ListOptions::in_folder("readme.md").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnexpectedEntryType { expected: "directory", .. }));
    }

    #[tokio::test]
    async fn test_cycle_is_reported() {
        let transport = MemoryTransport::new();
        transport.respond_with(
            "loop",
            StatusCode::OK,
            json!([{ "type": "dir", "name": "loop", "path": "loop", "sha": "abc", "size": 0 }]),
        );

        let err = list(&transport, ListOptions::in_folder("loop").unwrap().recurse(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TraversalCycle(p) if p.as_str() == "loop"));
    }

    #[tokio::test]
    async fn test_unusual_remote_names_are_listed() {
        let transport = MemoryTransport::new();
        let long = format!("odd/{}", "x".repeat(BlobPath::MAX_LEN));
        transport.respond_with(
            "odd",
            StatusCode::OK,
            json!([
                { "type": "file", "name": "tab\there", "path": "odd/tab\there", "sha": "a", "size": 1 },
                { "type": "file", "name": "long", "path": long, "sha": "b", "size": 1 }
            ]),
        );

        let blobs = list(&transport, ListOptions::in_folder("odd").unwrap()).await.unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].name(), "tab\there");
        assert_eq!(blobs[1].path.as_str(), long);
    }

    #[tokio::test]
    async fn test_remote_failure_fails_listing() {
        let transport = sample();
        transport.fail_nth(1, StatusCode::INTERNAL_SERVER_ERROR, "boom");

        let err = list(&transport, ListOptions::new().recurse(true)).await.unwrap_err();
        assert!(err.is_retriable());
        assert!(matches!(err, StorageError::Remote { operation: "listing files from", .. }));
    }
}
