//! core type-safe wrappers around remote repository primitives for the storage layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The remote content hash GitHub calls `sha`.
///
/// It doubles as the optimistic-concurrency token: a delete or replace has
/// to present the token of the exact version it wants to mutate. Tokens are
/// never cached between calls, so this type is only ever built from a fresh
/// remote response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentSha(String);

impl ContentSha {
    pub(crate) fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// short form of the token (for log lines)
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for ContentSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated logical blob path, e.g. `folder/sub/file.txt`.
///
/// Paths are normalized on construction:
/// - leading and trailing `/` are dropped
/// - repeated separators collapse into one
///
/// Valid paths:
/// - at most 1024 characters
/// - no `.` or `..` segments
/// - no control characters
///
/// The empty path is the repository root. It is only reachable through
/// [`BlobPath::root`] and [`BlobPath::folder`]; blob operations reject it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobPath(String);

impl BlobPath {
    /// max length of a normalized path
    pub const MAX_LEN: usize = 1024;

    /// create a new BlobPath for a blob, validating the input
    pub fn new(path: impl AsRef<str>) -> Result<Self, InvalidNameError> {
        let normalized = Self::normalize(path.as_ref())?;
        if normalized.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        Ok(Self(normalized))
    }

    /// create a folder path, where the empty string means the root
    pub fn folder(path: impl AsRef<str>) -> Result<Self, InvalidNameError> {
        Self::normalize(path.as_ref()).map(Self)
    }

    /// the repository root
    pub fn root() -> Self {
        Self(String::new())
    }

    /// a path reported by the remote, normalized but never rejected
    pub(crate) fn from_remote(raw: &str) -> Self {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        Self(segments.join("/"))
    }

    fn normalize(raw: &str) -> Result<String, InvalidNameError> {
        for (i, c) in raw.chars().enumerate() {
            if c.is_control() {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(InvalidNameError::InvalidSegment(segment.to_string()));
            }
            segments.push(segment);
        }

        let normalized = segments.join("/");
        if normalized.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(normalized.len()));
        }
        Ok(normalized)
    }

    /// check if this is the repository root
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }

    /// the last path segment (`file.txt` for `a/b/file.txt`)
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// everything before the last segment (`a/b` for `a/b/file.txt`)
    pub fn folder_path(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// append a child segment (or sub path)
    pub fn join(&self, child: &str) -> Result<Self, InvalidNameError> {
        if self.is_root() {
            Self::new(child)
        } else {
            Self::new(format!("{}/{}", self.0, child))
        }
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl AsRef<str> for BlobPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// a branch name in the remote repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// the default branch name
    pub const MAIN: &'static str = "main";

    /// create a new BranchName
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        // basic validation, git is more permissive but the API rejects most of these anyway
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if name.contains("..") || name.ends_with('/') || name.starts_with('/') {
            return Err(InvalidNameError::InvalidPath(name));
        }
        for (i, c) in name.chars().enumerate() {
            if c.is_control() || c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\') {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }
        Ok(Self(name))
    }

    /// create the main branch reference
    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// get the short name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchName {
    fn default() -> Self {
        Self::main()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchName> for String {
    fn from(branch: BranchName) -> Self {
        branch.0
    }
}

/// owner, repository and branch that together address one content tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub repository: String,
    pub branch: BranchName,
}

impl RepositoryCoordinates {
    pub fn new(owner: impl Into<String>, repository: impl Into<String>, branch: BranchName) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            branch,
        }
    }
}

impl fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repository, self.branch)
    }
}

/// error type for invalid names (paths, branches)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
    InvalidSegment(String),
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character {:?} at position {}", char, position)
            }
            Self::InvalidSegment(segment) => write!(f, "'{}' is not a valid path segment", segment),
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_path_normalization() {
        assert_eq!(BlobPath::new("Tests/test.txt").unwrap().as_str(), "Tests/test.txt");
        assert_eq!(BlobPath::new("/Tests//test.txt/").unwrap().as_str(), "Tests/test.txt");
        assert_eq!(BlobPath::folder("").unwrap(), BlobPath::root());
        assert_eq!(BlobPath::folder("/").unwrap(), BlobPath::root());
    }

    #[test]
    fn test_blob_path_invalid() {
        assert_eq!(BlobPath::new(""), Err(InvalidNameError::Empty));
        assert_eq!(BlobPath::new("///"), Err(InvalidNameError::Empty));
        assert!(matches!(BlobPath::new("a/../b"), Err(InvalidNameError::InvalidSegment(_))));
        assert!(matches!(BlobPath::new("a/./b"), Err(InvalidNameError::InvalidSegment(_))));
        assert!(matches!(
            BlobPath::new("bad\nname"),
            Err(InvalidNameError::InvalidCharacter { position: 3, .. })
        ));
        assert!(matches!(BlobPath::new("a".repeat(1025)), Err(InvalidNameError::TooLong(1025))));
    }

    #[test]
    fn test_blob_path_parts() {
        let path = BlobPath::new("a/b/file.txt").unwrap();
        assert_eq!(path.name(), "file.txt");
        assert_eq!(path.folder_path(), "a/b");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["a", "b", "file.txt"]);

        let top = BlobPath::new("file.txt").unwrap();
        assert_eq!(top.name(), "file.txt");
        assert_eq!(top.folder_path(), "");
    }

    #[test]
    fn test_blob_path_join() {
        let root = BlobPath::root();
        assert_eq!(root.join("x.txt").unwrap().as_str(), "x.txt");

        let folder = BlobPath::folder("docs").unwrap();
        assert_eq!(folder.join("a/b.md").unwrap().as_str(), "docs/a/b.md");
        assert!(folder.join("..").is_err());
    }

    #[test]
    fn test_branch_name() {
        assert_eq!(BranchName::main().as_str(), "main");
        assert!(BranchName::new("feature/blob-store").is_ok());
        assert!(BranchName::new("").is_err());
        assert!(BranchName::new("a..b").is_err());
        assert!(BranchName::new("/lead").is_err());
        assert!(BranchName::new("has space").is_err());
    }

    #[test]
    fn test_content_sha_short() {
        let sha = ContentSha::new("95b966ae1c166bd92f8ae7d1c313e738c731dfc3");
        assert_eq!(sha.short(), "95b966a");
        assert_eq!(ContentSha::new("abc").short(), "abc");
        // seven characters, not seven bytes
        assert_eq!(ContentSha::new("ééééééééé").short(), "ééééééé");
    }

    #[test]
    fn test_blob_path_from_remote_is_lenient() {
        assert_eq!(BlobPath::from_remote("/docs//a.txt/").as_str(), "docs/a.txt");

        let long = "a".repeat(BlobPath::MAX_LEN + 10);
        assert_eq!(BlobPath::from_remote(&long).as_str().len(), BlobPath::MAX_LEN + 10);
        // control characters are rejected for callers, kept for remote entries
        assert!(BlobPath::new("docs/tab\there").is_err());
        assert_eq!(BlobPath::from_remote("docs/tab\there").name(), "tab\there");
    }
}
