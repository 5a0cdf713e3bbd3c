use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::cli::MigrationIntent;
use crate::error::StepError;
use crate::git::{MirrorGit, RepoSnapshot};
use crate::permissions::{translate, MembershipIntent};
use crate::platform::{
    with_retry, DestinationPlatform, RepositoryBinding, SourcePlatform,
};
use crate::report::{MigrationReport, Outcome, Step, StepResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Analyzing,
    Transferring,
    RepointingPipeline,
    ApplyingPermissions,
    Validating,
    Completed,
    Aborted,
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub skip_pipeline: bool,
    pub skip_permissions: bool,
    pub step_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            skip_pipeline: false,
            skip_permissions: false,
            step_timeout: Duration::from_secs(600),
            retry_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Drives one migration run through its five steps, strictly in order. A
/// single orchestrator exclusively owns its working-copy path for the whole
/// run; parallel migrations are separate instances with disjoint paths.
pub struct Orchestrator<G, S, D> {
    git: G,
    source: S,
    destination: D,
    intent: MigrationIntent,
    options: RunOptions,
    state: State,
}

impl<G, S, D> Orchestrator<G, S, D>
where
    G: MirrorGit + Send + Sync,
    S: SourcePlatform + Send + Sync,
    D: DestinationPlatform + Send + Sync,
{
    pub fn new(git: G, source: S, destination: D, intent: MigrationIntent, options: RunOptions) -> Self {
        Orchestrator {
            git,
            source,
            destination,
            intent,
            options,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Runs the whole pipeline. Any non-validation failure aborts the run
    /// with the partial report retained; effects of earlier steps are left in
    /// place so a fixed-up re-run can pick up where this one stopped.
    pub async fn run(&mut self) -> MigrationReport {
        let mut report = MigrationReport::new();

        self.state = State::Analyzing;
        let outcome = self.bounded(self.analyze()).await;
        let before = match outcome {
            Ok((result, snapshot)) => {
                report.append(result);
                snapshot
            }
            Err(err) => return self.abort(Step::Analyzing, err, report),
        };

        self.state = State::Transferring;
        let outcome = self.bounded(self.transfer()).await;
        match outcome {
            Ok(result) => report.append(result),
            Err(err) => return self.abort(Step::Transferring, err, report),
        }

        self.state = State::RepointingPipeline;
        let pipeline = self.intent.pipeline.clone();
        if self.options.skip_pipeline || pipeline.is_none() {
            let reason = if self.options.skip_pipeline {
                "disabled by flag"
            } else {
                "no pipeline configured"
            };
            report.append(
                StepResult::new(Step::RepointingPipeline, Outcome::Skipped).with_diagnostic(reason),
            );
        } else if let Some(id) = pipeline {
            let outcome = self.bounded(self.repoint_pipeline(&id)).await;
            match outcome {
                Ok(result) => report.append(result),
                Err(err) => return self.abort(Step::RepointingPipeline, err, report),
            }
        }

        self.state = State::ApplyingPermissions;
        let mut applied: Vec<MembershipIntent> = Vec::new();
        let no_mappings = self.intent.mappings.as_deref().map_or(true, |t| t.is_empty());
        if self.options.skip_permissions || no_mappings {
            let reason = if self.options.skip_permissions {
                "disabled by flag"
            } else {
                "no mapping table configured"
            };
            report.append(
                StepResult::new(Step::ApplyingPermissions, Outcome::Skipped)
                    .with_diagnostic(reason),
            );
        } else {
            let outcome = self.bounded(self.apply_permissions()).await;
            match outcome {
                Ok((result, intents)) => {
                    report.append(result);
                    applied = intents;
                }
                Err(err) => return self.abort(Step::ApplyingPermissions, err, report),
            }
        }

        self.state = State::Validating;
        let outcome =
            tokio::time::timeout(self.options.step_timeout, self.validate(&before, &applied)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => StepResult::new(Step::Validating, Outcome::Warning).with_diagnostic(
                StepError::Timeout(self.options.step_timeout.as_secs()).to_string(),
            ),
        };
        report.append(result);

        self.state = State::Completed;
        info!("migration completed");
        report
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, StepError>>,
    ) -> Result<T, StepError> {
        match tokio::time::timeout(self.options.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout(self.options.step_timeout.as_secs())),
        }
    }

    fn abort(&mut self, step: Step, err: StepError, mut report: MigrationReport) -> MigrationReport {
        error!(step = %step, error = %err, "aborting migration");
        report.append(StepResult::new(step, Outcome::Failed).with_diagnostic(err.to_string()));
        self.state = State::Aborted;
        report
    }

    /// Reads the source repository's metadata, takes the destructive mirror
    /// clone and summarizes what is about to move.
    async fn analyze(&self) -> Result<(StepResult, RepoSnapshot), StepError> {
        let repo = &self.intent.source_repo;
        let metadata = self.retrying(|| self.source.get_repository(&repo.owner, &repo.name)).await?;

        let snapshot = self
            .git
            .mirror_clone(&repo.remote_url, &self.intent.workdir)
            .await?;
        info!(
            branches = snapshot.branches.len(),
            tags = snapshot.tags.len(),
            commits = snapshot.commit_count,
            "source mirrored locally"
        );

        let result = StepResult::new(Step::Analyzing, Outcome::Success)
            .with_diagnostic(format!(
                "mirrored {} into {}",
                repo.remote_url,
                self.intent.workdir.display()
            ))
            .with_diagnostic(format!("source platform knows the repository as `{}`", metadata.name))
            .with_metric("branch_count", snapshot.branches.len() as u64)
            .with_metric("tag_count", snapshot.tags.len() as u64)
            .with_metric("commit_count", snapshot.commit_count);
        Ok((result, snapshot))
    }

    async fn transfer(&self) -> Result<StepResult, StepError> {
        let remote = &self.intent.destination_repo.remote_url;
        self.git.mirror_push(&self.intent.workdir, remote).await?;
        info!(remote = remote.as_str(), "mirror pushed");

        Ok(StepResult::new(Step::Transferring, Outcome::Success)
            .with_diagnostic(format!("pushed every ref to {}", remote)))
    }

    async fn repoint_pipeline(&self, id: &str) -> Result<StepResult, StepError> {
        let pipeline = self.retrying(|| self.source.get_pipeline(id)).await?;

        let binding = RepositoryBinding {
            url: self.intent.destination_repo.remote_url.clone(),
            kind: "git".to_string(),
        };
        self.retrying(|| self.source.repoint_pipeline(id, &binding)).await?;
        info!(pipeline = id, url = binding.url.as_str(), "pipeline repointed");

        Ok(StepResult::new(Step::RepointingPipeline, Outcome::Success)
            .with_diagnostic(format!(
                "pipeline {} ({}) now builds from {}",
                id, pipeline.name, binding.url
            ))
            .with_diagnostic(format!(
                "previous repository binding was {}",
                pipeline.repository.url
            )))
    }

    async fn apply_permissions(&self) -> Result<(StepResult, Vec<MembershipIntent>), StepError> {
        let table = self.intent.mappings.as_deref().unwrap_or_default();

        // One lookup per distinct group; the table may repeat groups.
        let mut members_by_group: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in table {
            if !members_by_group.contains_key(&record.source_group) {
                let members = self
                    .retrying(|| self.source.get_group_members(&record.source_group))
                    .await?;
                members_by_group.insert(record.source_group.clone(), members);
            }
        }

        let intents = translate(table, |group| {
            members_by_group.get(group).cloned().unwrap_or_default()
        });

        for intent in &intents {
            self.retrying(|| {
                self.destination
                    .upsert_team_membership(&intent.team, &intent.user, intent.role)
            })
            .await?;
        }
        info!(intents = intents.len(), "memberships applied");

        let result = StepResult::new(Step::ApplyingPermissions, Outcome::Success)
            .with_metric("group_count", members_by_group.len() as u64)
            .with_metric("intent_count", intents.len() as u64);
        Ok((result, intents))
    }

    /// Advisory end to end: every failure inside validation downgrades to a
    /// warning so operators still get a completed run with the findings.
    async fn validate(&self, before: &RepoSnapshot, applied: &[MembershipIntent]) -> StepResult {
        let mut warnings: Vec<String> = Vec::new();
        let mut diagnostics: Vec<String> = Vec::new();

        let repo = &self.intent.destination_repo;
        match self
            .retrying(|| self.destination.get_repository(&repo.owner, &repo.name))
            .await
        {
            Ok(metadata) => diagnostics.push(format!(
                "destination platform knows the repository as `{}`",
                metadata.name
            )),
            Err(err) => warnings.push(format!("destination metadata read failed: {}", err)),
        }

        let verify_path = self.verify_path();
        match self.git.mirror_clone(&repo.remote_url, &verify_path).await {
            Ok(after) => {
                let divergences = compare_snapshots(before, &after);
                if divergences.is_empty() {
                    diagnostics.push(
                        "destination branch set, tag set and commit count match the source"
                            .to_string(),
                    );
                } else {
                    warnings.extend(divergences);
                }
            }
            Err(err) => warnings.push(format!("destination inspection failed: {}", err)),
        }

        let teams: BTreeSet<&str> = applied.iter().map(|i| i.team.as_str()).collect();
        for team in teams {
            match self.retrying(|| self.destination.get_team_members(team)).await {
                Ok(members) => {
                    for intent in applied.iter().filter(|i| i.team == team) {
                        if !members.contains(&intent.user) {
                            warnings.push(format!(
                                "user `{}` is not a member of team `{}` after apply",
                                intent.user, team
                            ));
                        }
                    }
                }
                Err(err) => {
                    warnings.push(format!("membership check for team `{}` failed: {}", team, err))
                }
            }
        }

        let outcome = if warnings.is_empty() {
            Outcome::Success
        } else {
            for warning in &warnings {
                warn!("{}", warning);
            }
            Outcome::Warning
        };

        let mut result = StepResult::new(Step::Validating, outcome);
        result.diagnostics = diagnostics;
        result.diagnostics.extend(warnings);
        result
    }

    async fn retrying<T, F, Fut>(&self, op: F) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, crate::error::ApiError>>,
    {
        with_retry(self.options.retry_attempts, self.options.retry_base_delay, op)
            .await
            .map_err(StepError::from)
    }

    /// Sibling of the workdir, wiped by the validation clone.
    fn verify_path(&self) -> PathBuf {
        let workdir = &self.intent.workdir;
        let name = workdir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workdir".to_string());
        workdir.with_file_name(format!("{}.verify", name))
    }
}

/// Divergences between the pre-transfer source snapshot and the destination.
/// Exact equality is expected; anything else is worth a warning, including
/// refs only the destination has (platform-side protections can inject them).
fn compare_snapshots(before: &RepoSnapshot, after: &RepoSnapshot) -> Vec<String> {
    let mut warnings = Vec::new();

    for branch in before.branches.difference(&after.branches) {
        warnings.push(format!("destination is missing branch `{}`", branch));
    }
    for branch in after.branches.difference(&before.branches) {
        warnings.push(format!("destination has extra branch `{}`", branch));
    }
    for tag in before.tags.difference(&after.tags) {
        warnings.push(format!("destination is missing tag `{}`", tag));
    }
    for tag in after.tags.difference(&before.tags) {
        warnings.push(format!("destination has extra tag `{}`", tag));
    }
    if before.commit_count != after.commit_count {
        warnings.push(format!(
            "commit count diverged: source {}, destination {}",
            before.commit_count, after.commit_count
        ));
    }

    warnings
}
