use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Step {
    Analyzing,
    Transferring,
    RepointingPipeline,
    ApplyingPermissions,
    Validating,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Analyzing => "analyze",
            Step::Transferring => "transfer",
            Step::RepointingPipeline => "repoint-pipeline",
            Step::ApplyingPermissions => "apply-permissions",
            Step::Validating => "validate",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Skipped,
    Warning,
    Failed,
}

/// One step's record. Immutable once appended to the report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepResult {
    pub step: Step,
    pub outcome: Outcome,
    pub diagnostics: Vec<String>,
    pub metrics: BTreeMap<String, u64>,
}

impl StepResult {
    pub fn new(step: Step, outcome: Outcome) -> Self {
        StepResult {
            step,
            outcome,
            diagnostics: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostics.push(diagnostic.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: u64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Append-only sequence of step results, one per executed step.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MigrationReport {
    steps: Vec<StepResult>,
}

impl MigrationReport {
    pub fn new() -> Self {
        MigrationReport::default()
    }

    pub fn append(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn has_failure(&self) -> bool {
        self.steps.iter().any(|s| s.outcome == Outcome::Failed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "migration report")?;
        for result in &self.steps {
            let mark = match result.outcome {
                Outcome::Success => "ok",
                Outcome::Skipped => "skip",
                Outcome::Warning => "warn",
                Outcome::Failed => "FAIL",
            };
            writeln!(f, "  [{mark:>4}] {step}", mark = mark, step = result.step)?;
            for (name, value) in &result.metrics {
                writeln!(f, "         {name}: {value}", name = name, value = value)?;
            }
            for line in &result.diagnostics {
                writeln!(f, "         - {line}", line = line)?;
            }
        }
        Ok(())
    }
}
