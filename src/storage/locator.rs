//! Mapping from logical blob paths to remote resource locators.
//!
//! The contents API addresses every file and folder as
//! `{api_root}/repos/{owner}/{repository}/contents/{path}`. This module is
//! the only place that knows that shape.

use std::fmt;

use reqwest::Url;

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{BlobPath, BranchName, RepositoryCoordinates};

/// the contents endpoint of one repository + branch
///
/// building it validates the API root once, so producing locators from it
/// cannot fail afterwards.
#[derive(Debug, Clone)]
pub struct ContentsEndpoint {
    base: Url,
    coordinates: RepositoryCoordinates,
}

impl ContentsEndpoint {
    /// create the endpoint, rejecting API roots that can't carry a path
    pub fn new(api_root: &str, coordinates: RepositoryCoordinates) -> StorageResult<Self> {
        let base = Url::parse(api_root)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid api root '{}': {}", api_root, e)))?;

        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(StorageError::InvalidConfig(format!(
                "api root must be an http(s) url, got '{}'",
                api_root
            )));
        }
        if coordinates.owner.is_empty() || coordinates.repository.is_empty() {
            return Err(StorageError::InvalidConfig(
                "owner and repository must not be empty".to_string(),
            ));
        }

        Ok(Self { base, coordinates })
    }

    /// get the repository coordinates
    pub fn coordinates(&self) -> &RepositoryCoordinates {
        &self.coordinates
    }

    /// get the configured branch
    pub fn branch(&self) -> &BranchName {
        &self.coordinates.branch
    }

    /// map a logical path to its resource locator
    pub fn locate(&self, path: &BlobPath) -> ResourceLocator {
        let mut url = self.base.clone();
        // cannot_be_a_base was ruled out in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([
                    "repos",
                    self.coordinates.owner.as_str(),
                    self.coordinates.repository.as_str(),
                    "contents",
                ])
                .extend(path.segments());
        }

        ResourceLocator {
            url,
            path: path.clone(),
            branch: self.coordinates.branch.clone(),
        }
    }
}

/// the network address of one remote resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    url: Url,
    path: BlobPath,
    branch: BranchName,
}

impl ResourceLocator {
    /// the logical path this locator was built for
    pub fn path(&self) -> &BlobPath {
        &self.path
    }

    /// the branch mutations are committed to
    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// url for create/delete requests (branch goes in the body)
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// url for reads, pinned to the configured branch
    pub fn read_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("ref", self.branch.as_str());
        url
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(api_root: &str) -> ContentsEndpoint {
        let coordinates = RepositoryCoordinates::new("Olbrasoft", "FluentStorageTesting", BranchName::main());
        ContentsEndpoint::new(api_root, coordinates).unwrap()
    }

    #[test]
    fn test_locate_file() {
        let locator = endpoint("https://api.github.com").locate(&BlobPath::new("Tests/test.txt").unwrap());
        assert_eq!(
            locator.url().as_str(),
            "https://api.github.com/repos/Olbrasoft/FluentStorageTesting/contents/Tests/test.txt"
        );
        assert_eq!(
            locator.read_url().as_str(),
            "https://api.github.com/repos/Olbrasoft/FluentStorageTesting/contents/Tests/test.txt?ref=main"
        );
        assert_eq!(locator.path().as_str(), "Tests/test.txt");
    }

    #[test]
    fn test_locate_root() {
        let locator = endpoint("https://api.github.com/").locate(&BlobPath::root());
        assert_eq!(
            locator.url().as_str(),
            "https://api.github.com/repos/Olbrasoft/FluentStorageTesting/contents"
        );
    }

    #[test]
    fn test_locate_enterprise_root_and_escaping() {
        let locator = endpoint("https://ghe.example.com/api/v3").locate(&BlobPath::new("my docs/a#b.txt").unwrap());
        assert_eq!(
            locator.url().as_str(),
            "https://ghe.example.com/api/v3/repos/Olbrasoft/FluentStorageTesting/contents/my%20docs/a%23b.txt"
        );
    }

    #[test]
    fn test_invalid_api_root() {
        let coordinates = RepositoryCoordinates::new("o", "r", BranchName::main());
        assert!(matches!(
            ContentsEndpoint::new("not a url", coordinates.clone()),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(matches!(
            ContentsEndpoint::new("mailto:me@example.com", coordinates),
            Err(StorageError::InvalidConfig(_))
        ));

        let empty_owner = RepositoryCoordinates::new("", "r", BranchName::main());
        assert!(ContentsEndpoint::new("https://api.github.com", empty_owner).is_err());
    }
}
