//! Suite and scenario reporting.
//!
//! Each scenario yields one aggregate verdict plus the first error
//! encountered, with enough context (identity handle, step index,
//! observed vs. expected) to reproduce without re-running the suite.

use std::fmt::Write as _;
use std::time::Duration;

use settle_proto::HarnessError;

/// Aggregate verdict of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// Completed, but a best-effort settlement never confirmed.
    Warning,
    Failed,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Passed => "PASS",
            Verdict::Warning => "WARN",
            Verdict::Failed => "FAIL",
        }
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed(String),
    /// Best-effort settlement exhausted its budget; downgraded, not fatal.
    Warned(String),
    Failed(HarnessError),
}

/// One executed step, by declared index.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub index: usize,
    pub label: String,
    pub outcome: StepOutcome,
}

/// Result of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub verdict: Verdict,
    pub steps: Vec<StepReport>,
    pub first_error: Option<String>,
    pub duration: Duration,
}

/// Result of a whole suite run.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub scenarios: Vec<ScenarioReport>,
    pub duration: Duration,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.count(Verdict::Passed)
    }

    pub fn warnings(&self) -> usize {
        self.count(Verdict::Warning)
    }

    pub fn failed(&self) -> usize {
        self.count(Verdict::Failed)
    }

    fn count(&self, verdict: Verdict) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.verdict == verdict)
            .count()
    }

    /// Process exit code: 0 all passed, 1 any failure, 2 warnings only.
    pub fn exit_code(&self) -> i32 {
        if self.failed() > 0 {
            1
        } else if self.warnings() > 0 {
            2
        } else {
            0
        }
    }

    /// Human-readable summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "settle suite: {} scenarios, {} passed, {} warnings, {} failed ({:.1}s)",
            self.scenarios.len(),
            self.passed(),
            self.warnings(),
            self.failed(),
            self.duration.as_secs_f64(),
        );
        for scenario in &self.scenarios {
            let _ = writeln!(
                out,
                "  {} {} ({:.1}s)",
                scenario.verdict.as_str(),
                scenario.name,
                scenario.duration.as_secs_f64(),
            );
            for step in &scenario.steps {
                match &step.outcome {
                    StepOutcome::Completed(_) => {}
                    StepOutcome::Warned(detail) => {
                        let _ = writeln!(
                            out,
                            "       step {} ({}): warning: {detail}",
                            step.index, step.label
                        );
                    }
                    StepOutcome::Failed(error) => {
                        let _ = writeln!(
                            out,
                            "       step {} ({}): {error}",
                            step.index, step.label
                        );
                    }
                }
            }
        }
        out
    }
}
