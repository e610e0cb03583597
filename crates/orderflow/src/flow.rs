//! Flow Orchestrator
//!
//! A [`Scenario`] runs named steps in strict sequence. Each step declares a
//! [`StepPolicy`]:
//!
//! - `Mandatory`: failure halts the scenario, marks the state partial with
//!   the step name, and surfaces the error
//! - `BestEffort`: failure is logged and the scenario continues
//!
//! Identifiers captured by steps are recorded on the [`ScenarioState`],
//! which [`Scenario::finish`] seals into a [`ScenarioReport`].

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::driver::PageDriver;
use crate::result::{FlowError, FlowResult};
use crate::state::ScenarioState;
use crate::store::RecordStore;

/// Whether a step's failure halts the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    /// Failure halts the scenario
    Mandatory,
    /// Failure is logged and tolerated
    BestEffort,
}

/// How a step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "error")]
pub enum StepOutcome {
    /// The step succeeded
    Passed,
    /// A mandatory step failed
    Failed(String),
    /// A best-effort step failed and was tolerated
    Tolerated(String),
}

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Declared policy
    pub policy: StepPolicy,
    /// Outcome
    #[serde(flatten)]
    pub outcome: StepOutcome,
    /// Wall time spent in the step
    pub elapsed: Duration,
}

/// A running business scenario
#[derive(Debug)]
pub struct Scenario {
    name: String,
    state: ScenarioState,
    steps: Vec<StepRecord>,
    halted_at: Option<String>,
}

impl Scenario {
    /// Begin scenario `name` with fresh `state`
    #[must_use]
    pub fn new(name: impl Into<String>, state: ScenarioState) -> Self {
        let name = name.into();
        info!(scenario = %name, run_id = %state.run_id, "scenario started");
        Self {
            name,
            state,
            steps: Vec::new(),
            halted_at: None,
        }
    }

    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &ScenarioState {
        &self.state
    }

    /// Mutable state, for recording captured identifiers
    pub fn state_mut(&mut self) -> &mut ScenarioState {
        &mut self.state
    }

    /// Steps executed so far
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Step that halted the scenario, if any
    #[must_use]
    pub fn halted_at(&self) -> Option<&str> {
        self.halted_at.as_deref()
    }

    /// Run a step under `policy`.
    ///
    /// Returns `Ok(Some(value))` on success, `Ok(None)` when a best-effort
    /// step failed, and `Err` when a mandatory step failed.
    ///
    /// # Errors
    ///
    /// Returns the mandatory step's error, or an assertion error if the
    /// scenario has already halted
    pub async fn step<T, F>(&mut self, name: &str, policy: StepPolicy, step: F) -> FlowResult<Option<T>>
    where
        F: Future<Output = FlowResult<T>>,
    {
        if let Some(halted) = &self.halted_at {
            return Err(FlowError::assertion(format!(
                "step {name:?} not run: scenario halted at {halted:?}"
            )));
        }

        info!(scenario = %self.name, step = name, ?policy, "step started");
        let start = Instant::now();
        let result = step.await;
        let elapsed = start.elapsed();

        match result {
            Ok(value) => {
                info!(scenario = %self.name, step = name, elapsed_ms = elapsed.as_millis(), "step passed");
                self.record(name, policy, StepOutcome::Passed, elapsed);
                Ok(Some(value))
            }
            Err(e) => match policy {
                StepPolicy::Mandatory => {
                    error!(scenario = %self.name, step = name, error = %e, "mandatory step failed");
                    self.record(name, policy, StepOutcome::Failed(e.to_string()), elapsed);
                    self.halted_at = Some(name.to_string());
                    self.state.mark_partial(name);
                    Err(e)
                }
                StepPolicy::BestEffort => {
                    warn!(scenario = %self.name, step = name, error = %e, "best-effort step failed, continuing");
                    self.record(name, policy, StepOutcome::Tolerated(e.to_string()), elapsed);
                    Ok(None)
                }
            },
        }
    }

    /// Run a mandatory step
    ///
    /// # Errors
    ///
    /// Returns the step's error after marking the scenario partial
    pub async fn mandatory<T, F>(&mut self, name: &str, step: F) -> FlowResult<T>
    where
        F: Future<Output = FlowResult<T>>,
    {
        match self.step(name, StepPolicy::Mandatory, step).await? {
            Some(value) => Ok(value),
            None => Err(FlowError::assertion(format!("mandatory step {name:?} produced no value"))),
        }
    }

    /// Run a best-effort step, yielding `None` on failure
    pub async fn best_effort<T, F>(&mut self, name: &str, step: F) -> Option<T>
    where
        F: Future<Output = FlowResult<T>>,
    {
        self.step(name, StepPolicy::BestEffort, step)
            .await
            .ok()
            .flatten()
    }

    fn record(&mut self, name: &str, policy: StepPolicy, outcome: StepOutcome, elapsed: Duration) {
        self.steps.push(StepRecord {
            name: name.to_string(),
            policy,
            outcome,
            elapsed,
        });
    }

    /// Seal the scenario with the overall result of its body
    #[must_use]
    pub fn finish(mut self, result: FlowResult<()>) -> ScenarioReport {
        match &result {
            Ok(()) if self.halted_at.is_none() => self.state.mark_completed(),
            Ok(()) => {}
            Err(_) if self.halted_at.is_none() => self.state.mark_partial(self.name.clone()),
            Err(_) => {}
        }
        info!(
            scenario = %self.name,
            status = %self.state.status,
            steps = self.steps.len(),
            "scenario finished"
        );
        ScenarioReport {
            name: self.name,
            state: self.state,
            steps: self.steps,
            error: result.err(),
        }
    }
}

/// Final report of a scenario
#[derive(Debug)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Final state
    pub state: ScenarioState,
    /// Executed steps
    pub steps: Vec<StepRecord>,
    /// Error that halted the scenario
    pub error: Option<FlowError>,
}

impl ScenarioReport {
    /// Whether the scenario completed without a mandatory failure
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Steps that failed but were tolerated
    pub fn tolerated(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Tolerated(_)))
    }

    /// Persist the final state
    ///
    /// # Errors
    ///
    /// Returns the store's error
    pub fn persist(&self, store: &dyn RecordStore) -> FlowResult<()> {
        store.append(&self.state)
    }

    /// Convert into the final state or the halting error
    ///
    /// # Errors
    ///
    /// Returns the halting error
    pub fn into_result(self) -> FlowResult<ScenarioState> {
        match self.error {
            None => Ok(self.state),
            Some(e) => Err(e),
        }
    }
}

/// Close a secondary context, logging rather than failing on error
pub async fn release<P: PageDriver>(context: &P, label: &str) {
    match context.close().await {
        Ok(()) => info!(context = label, "context released"),
        Err(e) => warn!(context = label, error = %e, "failed to release context"),
    }
}
