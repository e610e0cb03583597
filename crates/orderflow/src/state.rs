//! Scenario state carried through one run and persisted at its end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run status of a scenario
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Steps still executing
    #[default]
    InProgress,
    /// Every mandatory step passed
    Completed,
    /// A mandatory step failed
    Partial,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in progress"),
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// Identifiers captured during a run.
///
/// Fields are only ever filled in, never cleared. An identifier that was
/// not captured stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioState {
    /// Opportunity the run was driven against
    pub opportunity_number: String,
    /// Opportunity title read from the summary
    #[serde(default)]
    pub opportunity_title: String,
    /// Order number captured from the order URL
    #[serde(default)]
    pub order_number: String,
    /// Job number captured from the job grid
    #[serde(default)]
    pub job_number: String,
    /// When the run started
    pub timestamp: DateTime<Utc>,
    /// Unique run identifier
    #[serde(rename = "testRunId")]
    pub run_id: String,
    /// Run status
    #[serde(default)]
    pub status: RunStatus,
    /// Name of the mandatory step that halted the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
}

impl ScenarioState {
    /// Start a run against `opportunity_number`
    #[must_use]
    pub fn start(opportunity_number: impl Into<String>) -> Self {
        Self {
            opportunity_number: opportunity_number.into(),
            opportunity_title: String::new(),
            order_number: String::new(),
            job_number: String::new(),
            timestamp: Utc::now(),
            run_id: Uuid::new_v4().simple().to_string(),
            status: RunStatus::InProgress,
            failed_step: None,
        }
    }

    /// Record the opportunity title if one was read
    pub fn record_title(&mut self, title: &str) {
        fill(&mut self.opportunity_title, title);
    }

    /// Record the order number if one was captured
    pub fn record_order_number(&mut self, order_number: &str) {
        fill(&mut self.order_number, order_number);
    }

    /// Record the job number if one was captured
    pub fn record_job_number(&mut self, job_number: &str) {
        fill(&mut self.job_number, job_number);
    }

    /// Mark the run completed
    pub fn mark_completed(&mut self) {
        self.status = RunStatus::Completed;
        self.failed_step = None;
    }

    /// Mark the run partial, halted at `step`
    pub fn mark_partial(&mut self, step: impl Into<String>) {
        self.status = RunStatus::Partial;
        self.failed_step = Some(step.into());
    }
}

fn fill(field: &mut String, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        *field = value.to_string();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_in_progress_and_empty() {
        let state = ScenarioState::start("OP15296451");
        assert_eq!(state.status, RunStatus::InProgress);
        assert!(state.order_number.is_empty());
        assert!(state.job_number.is_empty());
        assert_eq!(state.run_id.len(), 32);
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = ScenarioState::start("OP1");
        let b = ScenarioState::start("OP1");
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_empty_capture_never_clears() {
        let mut state = ScenarioState::start("OP1");
        state.record_order_number("12345");
        state.record_order_number("");
        state.record_order_number("   ");
        assert_eq!(state.order_number, "12345");
    }

    #[test]
    fn test_partial_records_step() {
        let mut state = ScenarioState::start("OP1");
        state.mark_partial("open order popup");
        assert_eq!(state.status, RunStatus::Partial);
        assert_eq!(state.failed_step.as_deref(), Some("open order popup"));
    }

    #[test]
    fn test_json_shape() {
        let mut state = ScenarioState::start("OP1");
        state.record_job_number("445566");
        state.mark_completed();
        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["opportunityNumber"], "OP1");
        assert_eq!(json["jobNumber"], "445566");
        assert_eq!(json["status"], "completed");
        assert!(json["testRunId"].is_string());
        assert!(json.get("failedStep").is_none());
    }

    #[test]
    fn test_reads_records_without_status() {
        let json = r#"{
            "opportunityNumber": "OP15296451",
            "opportunityTitle": "JBS Automation POC For Jan",
            "orderNumber": "PARTIAL_RUN",
            "jobNumber": "PARTIAL_RUN",
            "timestamp": "2025-11-03T17:21:05.123Z",
            "testRunId": "k3j5h2"
        }"#;
        let state: ScenarioState = serde_json::from_str(json).unwrap();
        assert_eq!(state.status, RunStatus::InProgress);
        assert_eq!(state.run_id, "k3j5h2");
    }
}
