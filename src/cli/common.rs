use std::path::PathBuf;

use crate::error::ConfigError;
use crate::permissions::MappingRecord;

/// A repository as both an API identity (`owner`/`name`) and a git remote.
#[derive(Clone, Debug, PartialEq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub remote_url: String,
}

impl RepoRef {
    /// Builds a reference from an `owner/name` pair plus its git remote URL.
    pub fn parse(repo: &str, remote_url: &str) -> Result<Self, ConfigError> {
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidRepoRef(repo.to_string()))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidRepoRef(repo.to_string()));
        }

        Ok(RepoRef {
            owner: owner.to_string(),
            name: name.to_string(),
            remote_url: remote_url.to_string(),
        })
    }
}

/// Immutable input of one run, constructed once by the CLI layer.
#[derive(Clone, Debug, PartialEq)]
pub struct MigrationIntent {
    pub source_repo: RepoRef,
    pub destination_repo: RepoRef,
    pub workdir: PathBuf,
    pub pipeline: Option<String>,
    pub mappings: Option<Vec<MappingRecord>>,
}
