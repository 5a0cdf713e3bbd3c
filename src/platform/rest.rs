use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{DestinationPlatform, PipelineDefinition, RepoMetadata, RepositoryBinding,
            SourcePlatform};
use crate::error::ApiError;
use crate::permissions::TeamRole;

fn authenticated_client(token: &str) -> Result<reqwest::Client, ApiError> {
    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|err| ApiError::Unauthorized(format!("unusable token: {}", err)))?;
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(USER_AGENT, HeaderValue::from_static("migry"));

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|err| ApiError::Network(err.to_string()))
}

/// Maps a response to the error taxonomy. `what` names the operation for
/// diagnostics.
async fn check(
    result: Result<Response, reqwest::Error>,
    what: &str,
) -> Result<Response, ApiError> {
    let response = result.map_err(|err| ApiError::Network(format!("{}: {}", what, err)))?;
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let detail = format!("{} ({})", what, status);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(detail),
        StatusCode::NOT_FOUND => ApiError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(detail),
        _ => ApiError::Unexpected {
            status: status.as_u16(),
            detail,
        },
    })
}

async fn decode<T: for<'de> Deserialize<'de>>(
    response: Response,
    what: &str,
) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ApiError::Unexpected {
            status: 200,
            detail: format!("undecodable body from {}: {}", what, err),
        })
}

/// REST client for the platform being migrated away from.
#[derive(Clone, Debug)]
pub struct RestSourcePlatform {
    client: reqwest::Client,
    base_url: String,
}

impl RestSourcePlatform {
    pub fn new(base_url: impl Into<String>, token: &str) -> Result<Self, ApiError> {
        Ok(RestSourcePlatform {
            client: authenticated_client(token)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct GroupMember {
    username: String,
}

#[async_trait]
impl SourcePlatform for RestSourcePlatform {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoMetadata, ApiError> {
        let url = format!("{}/api/repos/{}/{}", self.base_url, owner, name);
        let what = format!("get source repository {}/{}", owner, name);
        debug!(%url, "source repository read");

        let response = check(self.client.get(&url).send().await, &what).await?;
        decode(response, &what).await
    }

    async fn get_pipeline(&self, id: &str) -> Result<PipelineDefinition, ApiError> {
        let url = format!("{}/api/pipelines/{}", self.base_url, id);
        let what = format!("get pipeline {}", id);
        debug!(%url, "pipeline read");

        let response = check(self.client.get(&url).send().await, &what).await?;
        decode(response, &what).await
    }

    async fn repoint_pipeline(
        &self,
        id: &str,
        binding: &RepositoryBinding,
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/pipelines/{}", self.base_url, id);
        let what = format!("repoint pipeline {}", id);
        debug!(%url, repository = %binding.url, "pipeline repoint");

        // Only the binding travels; a full-object PUT would clobber
        // concurrent edits to the rest of the definition.
        let body = json!({ "repository": binding });
        check(self.client.patch(&url).json(&body).send().await, &what).await?;
        Ok(())
    }

    async fn get_group_members(&self, group: &str) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/api/groups/{}/members", self.base_url, group);
        let what = format!("get members of group {}", group);
        debug!(%url, "group membership read");

        let response = check(self.client.get(&url).send().await, &what).await?;
        let members: Vec<GroupMember> = decode(response, &what).await?;
        Ok(members.into_iter().map(|m| m.username).collect())
    }
}

/// REST client for the platform being migrated to. Team operations are scoped
/// to the organization owning the destination repository.
#[derive(Clone, Debug)]
pub struct RestDestinationPlatform {
    client: reqwest::Client,
    base_url: String,
    org: String,
}

impl RestDestinationPlatform {
    pub fn new(
        base_url: impl Into<String>,
        org: impl Into<String>,
        token: &str,
    ) -> Result<Self, ApiError> {
        Ok(RestDestinationPlatform {
            client: authenticated_client(token)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            org: org.into(),
        })
    }
}

#[derive(Deserialize)]
struct TeamMember {
    login: String,
}

#[async_trait]
impl DestinationPlatform for RestDestinationPlatform {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoMetadata, ApiError> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, name);
        let what = format!("get destination repository {}/{}", owner, name);
        debug!(%url, "destination repository read");

        let response = check(self.client.get(&url).send().await, &what).await?;
        decode(response, &what).await
    }

    async fn upsert_team_membership(
        &self,
        team: &str,
        user: &str,
        role: TeamRole,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/orgs/{}/teams/{}/memberships/{}",
            self.base_url, self.org, team, user
        );
        let what = format!("upsert membership of {} in team {}", user, team);
        debug!(%url, role = role.as_str(), "membership upsert");

        let body = json!({ "role": role.as_str() });
        check(self.client.put(&url).json(&body).send().await, &what).await?;
        Ok(())
    }

    async fn get_team_members(&self, team: &str) -> Result<BTreeSet<String>, ApiError> {
        let url = format!("{}/orgs/{}/teams/{}/members", self.base_url, self.org, team);
        let what = format!("get members of team {}", team);
        debug!(%url, "team membership read");

        let response = check(self.client.get(&url).send().await, &what).await?;
        let members: Vec<TeamMember> = decode(response, &what).await?;
        Ok(members.into_iter().map(|m| m.login).collect())
    }
}
