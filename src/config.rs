//! Connection configuration.
//!
//! A [`GitHubConnection`] names the repository (owner, repository, branch),
//! carries the credential and says where the API lives. It can be built in
//! code, read from the environment, loaded from a TOML file or parsed from a
//! `key=value;...` connection string.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::{BranchName, ContentsEndpoint, RepositoryCoordinates, StorageError, StorageResult};

/// public GitHub API root
pub const DEFAULT_API_ROOT: &str = "https://api.github.com";

/// user agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = "GitHubBlobStorage";

/// everything needed to reach one branch of one repository
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConnection {
    pub owner: String,
    pub repository: String,
    pub branch: BranchName,
    /// personal access token, empty for anonymous read-only access
    pub token: String,
    pub api_root: String,
    pub user_agent: String,
    /// per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for GitHubConnection {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repository: String::new(),
            branch: BranchName::main(),
            token: String::new(),
            api_root: DEFAULT_API_ROOT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: None,
        }
    }
}

impl GitHubConnection {
    /// create a connection, validating the branch name
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
    ) -> StorageResult<Self> {
        Ok(Self {
            owner: owner.into(),
            repository: repository.into(),
            branch: BranchName::new(branch)?,
            token: token.into(),
            ..Default::default()
        })
    }

    /// set the API root (GitHub Enterprise: `https://host/api/v3`)
    pub fn api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// the credential, if one is configured
    pub fn token(&self) -> Option<&str> {
        let token = self.token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// the per-request timeout, if one is configured
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// owner, repository and branch
    pub fn coordinates(&self) -> RepositoryCoordinates {
        RepositoryCoordinates::new(&self.owner, &self.repository, self.branch.clone())
    }

    /// the contents endpoint for this connection
    pub fn endpoint(&self) -> StorageResult<ContentsEndpoint> {
        ContentsEndpoint::new(&self.api_root, self.coordinates())
    }

    /// check the connection is usable before any request goes out
    pub fn validate(&self) -> StorageResult<()> {
        for (field, value) in [("owner", &self.owner), ("repository", &self.repository)] {
            if value.trim().is_empty() {
                return Err(StorageError::InvalidConfig(format!("{} must not be empty", field)));
            }
            if value.contains('/') {
                return Err(StorageError::InvalidConfig(format!("{} must not contain '/': {}", field, value)));
            }
        }
        if self.user_agent.trim().is_empty() {
            return Err(StorageError::InvalidConfig("user agent must not be empty".to_string()));
        }
        self.endpoint().map(|_| ())
    }

    /// read the connection from `GITBLOB_*` environment variables
    ///
    /// `GITBLOB_TOKEN` falls back to `GITHUB_TOKEN`.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// read the connection through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let owner = var("GITBLOB_OWNER")
            .ok_or_else(|| StorageError::InvalidConfig("GITBLOB_OWNER is not set".to_string()))?;
        let repository = var("GITBLOB_REPOSITORY")
            .ok_or_else(|| StorageError::InvalidConfig("GITBLOB_REPOSITORY is not set".to_string()))?;
        let branch = var("GITBLOB_BRANCH").unwrap_or_else(|| BranchName::MAIN.to_string());
        let token = var("GITBLOB_TOKEN").or_else(|| var("GITHUB_TOKEN")).unwrap_or_default();

        let mut connection = Self::new(owner, repository, branch, token)?;
        if let Some(api_root) = var("GITBLOB_API_URL") {
            connection.api_root = api_root;
        }
        if let Some(user_agent) = var("GITBLOB_USER_AGENT") {
            connection.user_agent = user_agent;
        }
        if let Some(timeout) = var("GITBLOB_TIMEOUT_SECS") {
            let secs = timeout
                .parse()
                .map_err(|_| StorageError::InvalidConfig(format!("GITBLOB_TIMEOUT_SECS is not a number: {}", timeout)))?;
            connection.timeout_secs = Some(secs);
        }

        connection.validate()?;
        Ok(connection)
    }

    /// parse a TOML document
    pub fn from_toml_str(document: &str) -> StorageResult<Self> {
        let connection: Self = toml::from_str(document)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid connection file: {}", e)))?;
        connection.validate()?;
        Ok(connection)
    }

    /// load a TOML file
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let document = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&document)
    }
}

impl FromStr for GitHubConnection {
    type Err = StorageError;

    /// parse `owner=..;repository=..;branch=..;token=..`
    ///
    /// keys are case-insensitive, `repo` is accepted for `repository` and an
    /// optional `github://` scheme prefix is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim().strip_prefix("github://").unwrap_or(s.trim());
        let mut connection = Self::default();

        for pair in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| StorageError::InvalidConfig(format!("expected key=value, got '{}'", pair)))?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "owner" => connection.owner = value,
                "repository" | "repo" => connection.repository = value,
                "branch" => connection.branch = BranchName::new(value)?,
                "token" => connection.token = value,
                "api_root" | "apiroot" => connection.api_root = value,
                "user_agent" | "useragent" => connection.user_agent = value,
                "timeout_secs" | "timeout" => {
                    let secs = value
                        .parse()
                        .map_err(|_| StorageError::InvalidConfig(format!("timeout is not a number: {}", value)))?;
                    connection.timeout_secs = Some(secs);
                }
                other => {
                    return Err(StorageError::InvalidConfig(format!("unknown connection key '{}'", other)));
                }
            }
        }

        connection.validate()?;
        Ok(connection)
    }
}

impl fmt::Debug for GitHubConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConnection")
            .field("owner", &self.owner)
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("token", &self.token().map(|_| "<redacted>"))
            .field("api_root", &self.api_root)
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
