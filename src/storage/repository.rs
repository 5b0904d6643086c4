//! GitHub-backed blob storage.
//!
//! This is the central component of the storage layer. It owns the transport
//! and the contents endpoint and implements [`BlobStorage`] on top of the
//! listing walk and the write protocol.
//!
//! Every call validates all of its paths before the first request goes out
//! and then runs its remote requests one after another.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::capability::{BlobStorage, BlobTransaction};
use crate::config::GitHubConnection;
use crate::storage::blob::{Blob, BlobStream, ContentCodec};
use crate::storage::commit::WriteCoordinator;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::locator::ContentsEndpoint;
use crate::storage::record::RemoteContents;
use crate::storage::tree::{ListOptions, TreeWalker};
use crate::storage::types::{BlobPath, RepositoryCoordinates};
use crate::transport::{ContentsSession, ContentsTransport, HttpTransport};

/// Blob storage on one branch of one GitHub repository.
///
/// Clone this to share across tasks - it uses Arc internally and clones
/// share the HTTP connection pool.
#[derive(Clone)]
pub struct GitHubBlobStorage {
    inner: Arc<GitHubBlobStorageInner>,
}

struct GitHubBlobStorageInner {
    transport: Arc<dyn ContentsTransport>,
    endpoint: ContentsEndpoint,
}

impl GitHubBlobStorage {
    /// Connect over HTTPS.
    pub fn new(connection: &GitHubConnection) -> StorageResult<Self> {
        connection.validate()?;
        let transport = HttpTransport::new(connection)?;
        Self::with_transport(connection, Arc::new(transport))
    }

    /// Connect over HTTPS with the default API root.
    pub fn connect(
        owner: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
    ) -> StorageResult<Self> {
        Self::new(&GitHubConnection::new(owner, repository, branch, token)?)
    }

    /// Use a caller supplied transport.
    pub fn with_transport(connection: &GitHubConnection, transport: Arc<dyn ContentsTransport>) -> StorageResult<Self> {
        connection.validate()?;
        let endpoint = connection.endpoint()?;
        debug!(repository = %endpoint.coordinates(), "blob storage ready");

        Ok(Self {
            inner: Arc::new(GitHubBlobStorageInner { transport, endpoint }),
        })
    }

    /// owner, repository and branch this storage works on
    pub fn coordinates(&self) -> &RepositoryCoordinates {
        self.inner.endpoint.coordinates()
    }

    fn session<'a>(&'a self, cancel: &'a CancellationToken) -> ContentsSession<'a> {
        ContentsSession::new(self.inner.transport.as_ref(), &self.inner.endpoint, cancel)
    }
}

/// validate a whole batch before touching the network
fn parse_paths(paths: &[&str]) -> StorageResult<Vec<BlobPath>> {
    if paths.is_empty() {
        return Err(StorageError::EmptyPathCollection);
    }
    paths
        .iter()
        .map(|p| BlobPath::new(p).map_err(StorageError::from))
        .collect()
}

#[async_trait]
impl BlobStorage for GitHubBlobStorage {
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        append: bool,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        let path = BlobPath::new(path)?;
        let session = self.session(cancel);
        WriteCoordinator::new(&session).replace(&path, content, append).await
    }

    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> StorageResult<Option<BlobStream>> {
        let path = BlobPath::new(path)?;
        let session = self.session(cancel);

        let record = match session.fetch(&path, "reading file from").await? {
            Some(RemoteContents::Entry(record)) if !record.is_dir() => record,
            Some(_) => {
                debug!(%path, "read of a directory");
                return Ok(None);
            }
            None => return Ok(None),
        };

        if record.content_omitted() {
            debug!(%path, size = ?record.size, "content not inlined, fetching raw");
            return match session.fetch_raw(&path, "reading file from").await? {
                Some(bytes) => Ok(Some(Cursor::new(bytes))),
                // removed between the two requests
                None => Ok(None),
            };
        }

        match record.content.as_deref() {
            Some(content) => Ok(Some(ContentCodec::decode_stream(content)?)),
            None => {
                debug!(%path, kind = %record.kind, "record carries no content");
                Ok(None)
            }
        }
    }

    async fn delete(&self, paths: &[&str], cancel: &CancellationToken) -> StorageResult<()> {
        let paths = parse_paths(paths)?;
        let session = self.session(cancel);
        let coordinator = WriteCoordinator::new(&session);

        for path in &paths {
            coordinator.delete(path).await?;
        }
        Ok(())
    }

    async fn exists(&self, paths: &[&str], cancel: &CancellationToken) -> StorageResult<Vec<bool>> {
        let paths = parse_paths(paths)?;
        let session = self.session(cancel);

        let mut flags = Vec::with_capacity(paths.len());
        for path in &paths {
            let found = session.fetch(path, "checking existence of").await?.is_some();
            flags.push(found);
        }
        Ok(flags)
    }

    async fn list(&self, options: &ListOptions, cancel: &CancellationToken) -> StorageResult<Vec<Blob>> {
        let session = self.session(cancel);
        TreeWalker::new(&session).list(options).await
    }

    async fn get_blobs(&self, paths: &[&str], cancel: &CancellationToken) -> StorageResult<Vec<Blob>> {
        let paths = parse_paths(paths)?;
        let session = self.session(cancel);

        let mut blobs = Vec::with_capacity(paths.len());
        for path in paths {
            let blob = match session.fetch(&path, "getting metadata of").await? {
                Some(RemoteContents::Entry(record)) => record.to_blob(),
                Some(RemoteContents::Directory(_)) => Blob::folder(path),
                // absent paths still get a placeholder so results line up with inputs
                None => Blob::file(path),
            };
            blobs.push(blob);
        }
        Ok(blobs)
    }

    async fn open_transaction(&self) -> StorageResult<Box<dyn BlobTransaction>> {
        Err(StorageError::Unsupported("transactions"))
    }

    async fn set_blobs(&self, _blobs: &[Blob], _cancel: &CancellationToken) -> StorageResult<()> {
        Err(StorageError::Unsupported("setting blob metadata"))
    }
}

impl fmt::Debug for GitHubBlobStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubBlobStorage")
            .field("repository", &self.coordinates().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::BlobStorageExt;
    use crate::storage::BlobKind;
    use crate::transport::{ContentsMethod, MemoryTransport};
    use reqwest::StatusCode;

    fn setup() -> (Arc<MemoryTransport>, GitHubBlobStorage) {
        let transport = Arc::new(MemoryTransport::new());
        let connection = GitHubConnection::new("Olbrasoft", "FluentStorageTesting", "main", "t").unwrap();
        let storage = GitHubBlobStorage::with_transport(&connection, transport.clone()).unwrap();
        (transport, storage)
    }

    #[test]
    fn test_rejects_invalid_connection() {
        let connection = GitHubConnection::new("", "r", "main", "").unwrap();
        let result = GitHubBlobStorage::with_transport(&connection, Arc::new(MemoryTransport::new()));
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (transport, storage) = setup();
        let cancel = CancellationToken::new();

        storage.write("Tests/test.txt", b"I am test.txt Hello World!", false, &cancel).await.unwrap();
        assert_eq!(transport.file("Tests/test.txt").as_deref(), Some(&b"I am test.txt Hello World!"[..]));

        let text = storage.read_text("Tests/test.txt", &cancel).await.unwrap();
        assert_eq!(text.as_deref(), Some("I am test.txt Hello World!"));
    }

    #[tokio::test]
    async fn test_read_absent_and_directory() {
        let (transport, storage) = setup();
        transport.insert_file("docs/a.txt", b"a");
        let cancel = CancellationToken::new();

        assert!(storage.open_read("missing.txt", &cancel).await.unwrap().is_none());
        assert!(storage.open_read("docs", &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_empty_file() {
        let (transport, storage) = setup();
        transport.insert_file("empty.txt", b"");
        let cancel = CancellationToken::new();

        let bytes = storage.read_bytes("empty.txt", &cancel).await.unwrap();
        assert_eq!(bytes.map(|b| b.len()), Some(0));
    }

    #[tokio::test]
    async fn test_read_large_file_fetches_raw() {
        let transport = Arc::new(MemoryTransport::new().with_inline_limit(16));
        let connection = GitHubConnection::new("o", "r", "main", "t").unwrap();
        let storage = GitHubBlobStorage::with_transport(&connection, transport.clone()).unwrap();
        let cancel = CancellationToken::new();

        let content: Vec<u8> = (0..100u8).collect();
        storage.write("big.bin", &content, false, &cancel).await.unwrap();

        let read = storage.read_bytes("big.bin", &cancel).await.unwrap().unwrap();
        assert_eq!(&read[..], &content[..]);

        let methods: Vec<_> = transport.requests().iter().map(|r| r.method).collect();
        assert_eq!(&methods[methods.len() - 2..], &[ContentsMethod::Get, ContentsMethod::GetRaw]);
    }

    #[tokio::test]
    async fn test_read_omitted_content_never_yields_empty_bytes() {
        let (transport, storage) = setup();
        transport.respond_with(
            "big.bin",
            StatusCode::OK,
            serde_json::json!({
                "type": "file", "encoding": "none", "size": 2_000_000,
                "path": "big.bin", "content": "", "sha": "abc"
            }),
        );
        let cancel = CancellationToken::new();

        // the record claims 2 MB but the raw read finds nothing
        let read = storage.read_bytes("big.bin", &cancel).await.unwrap();
        assert!(read.is_none());

        transport.fail_nth(1, StatusCode::FORBIDDEN, "too large");
        let err = storage.read_bytes("big.bin", &cancel).await.unwrap_err();
        assert!(matches!(err, StorageError::Remote { status: StatusCode::FORBIDDEN, .. }));
    }

    #[tokio::test]
    async fn test_delete_batch_stops_at_remote_rejection() {
        let (transport, storage) = setup();
        for path in ["a.txt", "b.txt", "c.txt"] {
            transport.insert_file(path, b"x");
        }
        let cancel = CancellationToken::new();
        // GET a, DELETE a, GET b, DELETE b <- rejected
        transport.fail_nth(3, StatusCode::CONFLICT, "b.txt does not match sha");

        let err = storage.delete(&["a.txt", "b.txt", "c.txt"], &cancel).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(transport.file("a.txt").is_none());
        assert!(transport.file("b.txt").is_some());
        assert!(transport.file("c.txt").is_some());
        assert!(transport.requests().iter().all(|r| r.path != "c.txt"));
    }

    #[tokio::test]
    async fn test_reads_request_configured_branch() {
        let (transport, storage) = setup();
        let cancel = CancellationToken::new();

        storage.exists_one("a.txt", &cancel).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, ContentsMethod::Get);
        assert!(requests[0].url.ends_with("/repos/Olbrasoft/FluentStorageTesting/contents/a.txt?ref=main"));
    }

    #[tokio::test]
    async fn test_exists_preserves_order() {
        let (transport, storage) = setup();
        transport.insert_file("b.txt", b"b");
        let cancel = CancellationToken::new();

        let flags = storage.exists(&["a.txt", "b.txt", "c.txt"], &cancel).await.unwrap();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_exists_surfaces_remote_failures() {
        let (transport, storage) = setup();
        transport.fail_next(StatusCode::FORBIDDEN, "rate limited");
        let cancel = CancellationToken::new();

        let err = storage.exists(&["a.txt"], &cancel).await.unwrap_err();
        assert!(matches!(err, StorageError::Remote { status: StatusCode::FORBIDDEN, .. }));
    }

    #[tokio::test]
    async fn test_invalid_paths_fail_before_network() {
        let (transport, storage) = setup();
        let cancel = CancellationToken::new();

        assert!(matches!(
            storage.exists(&[], &cancel).await,
            Err(StorageError::EmptyPathCollection)
        ));
        assert!(matches!(
            storage.delete(&["ok.txt", ""], &cancel).await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.write("a/../b", b"x", false, &cancel).await,
            Err(StorageError::InvalidPath(_))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_get_blobs() {
        let (transport, storage) = setup();
        transport.insert_file("docs/a.txt", b"hello");
        let cancel = CancellationToken::new();

        let blobs = storage.get_blobs(&["docs/a.txt", "docs", "nope.txt"], &cancel).await.unwrap();

        assert_eq!(blobs[0].kind, BlobKind::File);
        assert_eq!(blobs[0].size, Some(5));
        assert_eq!(blobs[1].kind, BlobKind::Folder);
        assert_eq!(blobs[1].path.as_str(), "docs");
        assert_eq!(blobs[2].path.as_str(), "nope.txt");
        assert_eq!(blobs[2].size, None);
    }

    #[tokio::test]
    async fn test_unsupported_entry_points() {
        let (transport, storage) = setup();
        let cancel = CancellationToken::new();

        assert!(matches!(storage.open_transaction().await, Err(StorageError::Unsupported(_))));
        assert!(matches!(storage.set_blobs(&[], &cancel).await, Err(StorageError::Unsupported(_))));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let (transport, storage) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = storage.write("a.txt", b"x", false, &cancel).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_stops_at_cancellation() {
        let (transport, storage) = setup();
        transport.insert_file("a.txt", b"a");
        transport.insert_file("b.txt", b"b");
        let cancel = CancellationToken::new();
        // cancelled while the DELETE of a.txt is served
        transport.cancel_at(1, cancel.clone());

        let err = storage.delete(&["a.txt", "b.txt"], &cancel).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
        assert!(transport.file("a.txt").is_none());
        assert!(transport.file("b.txt").is_some());
    }
}
