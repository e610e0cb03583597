//! Output formatting for scenario reports and stored records

use console::{style, Term};
use orderflow::{RunStatus, ScenarioReport, ScenarioState, StepOutcome, StepPolicy};
use std::fmt::Write as _;

/// Writes results to stdout, honoring quiet mode
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Quiet mode
    pub quiet: bool,
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            quiet,
        }
    }

    /// Print text unless quiet
    pub fn print(&self, text: &str) {
        if !self.quiet {
            let _ = self.term.write_line(text);
        }
    }

    /// Print text even in quiet mode
    pub fn print_always(&self, text: &str) {
        let _ = self.term.write_line(text);
    }
}

/// Render a finished scenario: one line per step, then the captured state
#[must_use]
pub fn format_report(report: &ScenarioReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style(&report.name).bold());

    for step in &report.steps {
        let (mark, detail) = match &step.outcome {
            StepOutcome::Passed => (style("✓").green(), String::new()),
            StepOutcome::Failed(e) => (style("✗").red(), format!(" ({e})")),
            StepOutcome::Tolerated(e) => (style("~").yellow(), format!(" (tolerated: {e})")),
        };
        let optional = match step.policy {
            StepPolicy::Mandatory => "",
            StepPolicy::BestEffort => " [best-effort]",
        };
        let _ = writeln!(
            out,
            "  {mark} {}{optional} {}{detail}",
            step.name,
            style(format!("{}ms", step.elapsed.as_millis())).dim()
        );
    }

    out.push_str(&format_record(&report.state));

    let verdict = if report.is_success() {
        style("PASSED").green().bold()
    } else {
        style("FAILED").red().bold()
    };
    let _ = writeln!(out, "{verdict}");
    out
}

/// Render one run record
#[must_use]
pub fn format_record(state: &ScenarioState) -> String {
    let mut out = String::new();
    let status = match state.status {
        RunStatus::Completed => style(state.status.to_string()).green(),
        RunStatus::Partial => style(state.status.to_string()).yellow(),
        RunStatus::InProgress => style(state.status.to_string()).dim(),
    };
    let _ = writeln!(
        out,
        "{} {} [{status}]",
        style(state.timestamp.format("%Y-%m-%d %H:%M:%S UTC")).dim(),
        state.run_id
    );
    let _ = writeln!(out, "  opportunity: {}", or_dash(&state.opportunity_number));
    if !state.opportunity_title.is_empty() {
        let _ = writeln!(out, "  title:       {}", state.opportunity_title);
    }
    let _ = writeln!(out, "  order:       {}", or_dash(&state.order_number));
    let _ = writeln!(out, "  job:         {}", or_dash(&state.job_number));
    if let Some(step) = &state.failed_step {
        let _ = writeln!(out, "  failed at:   {step}");
    }
    out
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
