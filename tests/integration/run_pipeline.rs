use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use migry::cli::{MigrationIntent, RepoRef};
use migry::fixtures::mappings::{developer_table, mapping_record};
use migry::fixtures::snapshots::snapshot;
use migry::orchestrator::{Orchestrator, RunOptions, State};
use migry::permissions::{MappingRecord, Role};
use migry::platform::{PipelineDefinition, RepositoryBinding};
use migry::report::{Outcome, Step};

use crate::mocks::fakes::{FakeDestination, FakeGit, FakeSource};

const SOURCE_REMOTE: &str = "https://old.example.net/acme/widgets.git";
const DEST_REMOTE: &str = "https://new.example.net/acme-inc/widgets.git";

fn intent(pipeline: Option<&str>, mappings: Option<Vec<MappingRecord>>) -> MigrationIntent {
    MigrationIntent {
        source_repo: RepoRef::parse("acme/widgets", SOURCE_REMOTE).unwrap(),
        destination_repo: RepoRef::parse("acme-inc/widgets", DEST_REMOTE).unwrap(),
        workdir: PathBuf::from("/tmp/migry-test/widgets.git"),
        pipeline: pipeline.map(String::from),
        mappings,
    }
}

fn options() -> RunOptions {
    RunOptions {
        step_timeout: Duration::from_secs(5),
        retry_base_delay: Duration::from_millis(1),
        ..RunOptions::default()
    }
}

fn mirrored_git() -> FakeGit {
    let refs = snapshot(&["develop", "main"], &["v1"], 10);
    FakeGit {
        snapshots: HashMap::from([
            (SOURCE_REMOTE.to_string(), refs.clone()),
            (DEST_REMOTE.to_string(), refs),
        ]),
        ..FakeGit::default()
    }
}

fn source_with_everything() -> FakeSource {
    FakeSource {
        pipeline: Some(PipelineDefinition {
            name: "widgets-ci".to_string(),
            repository: RepositoryBinding {
                url: SOURCE_REMOTE.to_string(),
                kind: "git".to_string(),
            },
        }),
        groups: HashMap::from([(
            "Developers".to_string(),
            vec!["alice".to_string(), "bob".to_string()],
        )]),
        ..FakeSource::default()
    }
}

fn steps_of(report: &migry::report::MigrationReport) -> Vec<(Step, Outcome)> {
    report.steps().iter().map(|s| (s.step, s.outcome)).collect()
}

mod run_pipeline {

    use super::*;

    #[tokio::test]
    async fn full_run_completes_with_five_successful_steps() {
        let git = mirrored_git();
        let source = source_with_everything();
        let destination = FakeDestination::default();

        let mut orchestrator = Orchestrator::new(
            git.clone(),
            source.clone(),
            destination.clone(),
            intent(Some("42"), Some(developer_table())),
            options(),
        );
        let report = orchestrator.run().await;

        assert_eq!(
            steps_of(&report),
            vec![
                (Step::Analyzing, Outcome::Success),
                (Step::Transferring, Outcome::Success),
                (Step::RepointingPipeline, Outcome::Success),
                (Step::ApplyingPermissions, Outcome::Success),
                (Step::Validating, Outcome::Success),
            ]
        );
        assert_eq!(orchestrator.state(), State::Completed);
        assert!(!report.has_failure());

        // Intents land in deterministic order: table order, then member order.
        let upserts: Vec<_> = destination
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("upsert"))
            .collect();
        assert_eq!(
            upserts,
            vec!["upsert dev-team:alice:member", "upsert dev-team:bob:member"]
        );
        assert!(destination.team("dev-team").contains("alice"));
        assert_eq!(
            source.calls().last().map(String::as_str),
            Some("get-group Developers")
        );
    }

    #[tokio::test]
    async fn clone_failure_aborts_with_exactly_one_step_recorded() {
        let git = FakeGit {
            unreachable: [SOURCE_REMOTE.to_string()].into_iter().collect(),
            ..FakeGit::default()
        };
        let source = source_with_everything();
        let destination = FakeDestination::default();

        let mut orchestrator = Orchestrator::new(
            git.clone(),
            source,
            destination.clone(),
            intent(Some("42"), Some(developer_table())),
            options(),
        );
        let report = orchestrator.run().await;

        assert_eq!(steps_of(&report), vec![(Step::Analyzing, Outcome::Failed)]);
        assert_eq!(orchestrator.state(), State::Aborted);
        assert!(git.calls().iter().all(|c| !c.starts_with("push")));
        assert!(destination.calls().is_empty());
    }

    #[tokio::test]
    async fn push_failure_aborts_but_keeps_the_analysis_result() {
        let mut git = mirrored_git();
        git.fail_push = true;
        let source = source_with_everything();

        let mut orchestrator = Orchestrator::new(
            git,
            source,
            FakeDestination::default(),
            intent(None, None),
            options(),
        );
        let report = orchestrator.run().await;

        assert_eq!(
            steps_of(&report),
            vec![
                (Step::Analyzing, Outcome::Success),
                (Step::Transferring, Outcome::Failed),
            ]
        );
        assert_eq!(orchestrator.state(), State::Aborted);
    }

    #[tokio::test]
    async fn optional_steps_skip_without_gating_validation() {
        let git = mirrored_git();
        let source = source_with_everything();

        let mut orchestrator = Orchestrator::new(
            git,
            source,
            FakeDestination::default(),
            intent(None, None),
            options(),
        );
        let report = orchestrator.run().await;

        assert_eq!(
            steps_of(&report),
            vec![
                (Step::Analyzing, Outcome::Success),
                (Step::Transferring, Outcome::Success),
                (Step::RepointingPipeline, Outcome::Skipped),
                (Step::ApplyingPermissions, Outcome::Skipped),
                (Step::Validating, Outcome::Success),
            ]
        );
        assert_eq!(orchestrator.state(), State::Completed);
    }

    #[tokio::test]
    async fn skip_flags_disable_configured_steps() {
        let git = mirrored_git();
        let source = source_with_everything();
        let destination = FakeDestination::default();

        let mut orchestrator = Orchestrator::new(
            git,
            source.clone(),
            destination.clone(),
            intent(Some("42"), Some(developer_table())),
            RunOptions {
                skip_pipeline: true,
                skip_permissions: true,
                ..options()
            },
        );
        let report = orchestrator.run().await;

        assert_eq!(report.steps()[2].outcome, Outcome::Skipped);
        assert_eq!(report.steps()[3].outcome, Outcome::Skipped);
        assert!(destination.calls().iter().all(|c| !c.starts_with("upsert")));
        assert!(source.calls().iter().all(|c| !c.starts_with("get-pipeline")));
    }

    #[tokio::test]
    async fn missing_pipeline_aborts_the_repoint_step() {
        let git = mirrored_git();
        let source = FakeSource {
            pipeline: None,
            ..source_with_everything()
        };

        let mut orchestrator = Orchestrator::new(
            git,
            source,
            FakeDestination::default(),
            intent(Some("42"), None),
            options(),
        );
        let report = orchestrator.run().await;

        assert_eq!(report.steps().len(), 3);
        assert_eq!(
            report.steps()[2].outcome,
            Outcome::Failed,
        );
        assert_eq!(orchestrator.state(), State::Aborted);
    }

    #[tokio::test]
    async fn unknown_group_aborts_the_permission_step() {
        let git = mirrored_git();
        let source = source_with_everything();

        let mut orchestrator = Orchestrator::new(
            git,
            source,
            FakeDestination::default(),
            intent(
                None,
                Some(vec![mapping_record("Ghosts", "ghost-team", Role::Push)]),
            ),
            options(),
        );
        let report = orchestrator.run().await;

        assert_eq!(orchestrator.state(), State::Aborted);
        assert_eq!(report.steps().len(), 4);
        assert_eq!(report.steps()[3].step, Step::ApplyingPermissions);
        assert_eq!(report.steps()[3].outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn step_timeout_counts_as_that_steps_failure() {
        let mut git = mirrored_git();
        git.slow_remotes = [SOURCE_REMOTE.to_string()].into_iter().collect();
        git.delay = Duration::from_secs(60);
        let source = source_with_everything();
        let destination = FakeDestination::default();

        let mut orchestrator = Orchestrator::new(
            git.clone(),
            source,
            destination.clone(),
            intent(Some("42"), Some(developer_table())),
            RunOptions {
                step_timeout: Duration::from_millis(50),
                ..options()
            },
        );
        let report = orchestrator.run().await;

        assert_eq!(steps_of(&report), vec![(Step::Analyzing, Outcome::Failed)]);
        assert_eq!(orchestrator.state(), State::Aborted);
        assert!(report.steps()[0]
            .diagnostics
            .iter()
            .any(|d| d.contains("timed out")));
        assert!(git.calls().iter().all(|c| !c.starts_with("push")));
        assert!(destination.calls().is_empty());
    }

    #[tokio::test]
    async fn validation_timeout_downgrades_to_a_warning() {
        let mut git = mirrored_git();
        git.slow_remotes = [DEST_REMOTE.to_string()].into_iter().collect();
        git.delay = Duration::from_secs(60);
        let source = source_with_everything();

        let mut orchestrator = Orchestrator::new(
            git,
            source,
            FakeDestination::default(),
            intent(None, None),
            RunOptions {
                step_timeout: Duration::from_millis(50),
                ..options()
            },
        );
        let report = orchestrator.run().await;

        let last = report.steps().last().unwrap();
        assert_eq!(last.step, Step::Validating);
        assert_eq!(last.outcome, Outcome::Warning);
        assert!(last.diagnostics.iter().any(|d| d.contains("timed out")));
        assert_eq!(orchestrator.state(), State::Completed);
        assert!(!report.has_failure());
    }

    #[tokio::test]
    async fn validation_rate_limit_downgrades_to_a_warning() {
        let git = mirrored_git();
        let source = source_with_everything();
        let destination = FakeDestination {
            fail_team_reads: true,
            ..FakeDestination::default()
        };

        let mut orchestrator = Orchestrator::new(
            git,
            source,
            destination,
            intent(None, Some(developer_table())),
            options(),
        );
        let report = orchestrator.run().await;

        let last = report.steps().last().unwrap();
        assert_eq!(last.step, Step::Validating);
        assert_eq!(last.outcome, Outcome::Warning);
        assert_eq!(orchestrator.state(), State::Completed);
        assert!(!report.has_failure());
    }

    #[tokio::test]
    async fn ref_divergence_is_a_warning_not_a_failure() {
        let mut git = mirrored_git();
        git.snapshots
            .insert(DEST_REMOTE.to_string(), snapshot(&["main"], &[], 10));
        let source = source_with_everything();

        let mut orchestrator = Orchestrator::new(
            git,
            source,
            FakeDestination::default(),
            intent(None, None),
            options(),
        );
        let report = orchestrator.run().await;

        let last = report.steps().last().unwrap();
        assert_eq!(last.outcome, Outcome::Warning);
        assert!(last
            .diagnostics
            .iter()
            .any(|d| d.contains("missing branch `develop`")));
        assert_eq!(orchestrator.state(), State::Completed);
    }

    #[tokio::test]
    async fn reapplying_the_same_mappings_leaves_membership_unchanged() {
        let destination = FakeDestination::default();

        for _ in 0..2 {
            let mut orchestrator = Orchestrator::new(
                mirrored_git(),
                source_with_everything(),
                destination.clone(),
                intent(None, Some(developer_table())),
                options(),
            );
            let report = orchestrator.run().await;
            assert!(!report.has_failure());
        }

        assert_eq!(
            destination.team("dev-team").into_iter().collect::<Vec<_>>(),
            vec!["alice", "bob"]
        );
    }
}
