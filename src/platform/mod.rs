pub mod rest;

pub use rest::{RestDestinationPlatform, RestSourcePlatform};

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ApiError;
use crate::permissions::TeamRole;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
}

/// The repository-binding fields of a pipeline definition. This is the only
/// part of the definition this tool ever writes back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositoryBinding {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub name: String,
    pub repository: RepositoryBinding,
}

/// Capabilities consumed from the platform being migrated away from.
#[async_trait]
pub trait SourcePlatform {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoMetadata, ApiError>;

    async fn get_pipeline(&self, id: &str) -> Result<PipelineDefinition, ApiError>;

    /// Field-scoped update: only the repository binding is sent, the rest of
    /// the pipeline configuration is left untouched server-side.
    async fn repoint_pipeline(&self, id: &str, binding: &RepositoryBinding)
        -> Result<(), ApiError>;

    async fn get_group_members(&self, group: &str) -> Result<Vec<String>, ApiError>;
}

/// Capabilities consumed from the platform being migrated to.
#[async_trait]
pub trait DestinationPlatform {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoMetadata, ApiError>;

    /// Idempotent: re-applying the same (team, user, role) triple is a no-op.
    async fn upsert_team_membership(
        &self,
        team: &str,
        user: &str,
        role: TeamRole,
    ) -> Result<(), ApiError>;

    async fn get_team_members(&self, team: &str) -> Result<BTreeSet<String>, ApiError>;
}

/// Bounded retry with exponential backoff, applied at the client boundary.
/// Only `RateLimited` and `Network` errors are retried; everything else is
/// returned immediately.
pub async fn with_retry<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut delay = base_delay;
    let mut remaining = attempts.max(1);

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && remaining > 1 => {
                warn!(error = %err, "retryable api failure, backing off");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                remaining -= 1;
            }
            Err(err) => return Err(err),
        }
    }
}
