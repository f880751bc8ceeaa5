//! Durable-step execution and run registry.
//!
//! A run is one execution of a [`Workflow`] over a set of parameters. Inside a
//! run, work is split into named steps executed by a [`StepRunner`]: each step
//! is retried with backoff and a per-attempt timeout, and its output is
//! memoized so re-running the run never repeats a completed step.
//!
//! The [`WorkflowRegistry`] deduplicates runs by id: asking for an id that is
//! pending, running or complete joins that run; an errored run is restarted
//! with its completed steps kept.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tracing::{Instrument, debug, info, info_span, warn};
use trailcal_standardizer::BoxFuture;

/// How the delay between retries grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Always the base delay.
    #[default]
    Constant,
    /// Base delay times the retry number.
    Linear,
    /// Base delay doubled on every retry.
    Exponential,
}

impl Backoff {
    /// Delay before retry number `retry` (1 for the first retry).
    pub fn delay(&self, base: Duration, retry: u32) -> Duration {
        let retry = retry.max(1);
        match self {
            Self::Constant => base,
            Self::Linear => base.saturating_mul(retry),
            Self::Exponential => base.saturating_mul(2u32.saturating_pow(retry - 1)),
        }
    }
}

/// Retry and timeout policy for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOptions {
    /// Retries after the first attempt.
    pub retry_limit: u32,
    /// Base delay between attempts.
    pub retry_delay: Duration,
    /// Growth of the delay.
    pub backoff: Backoff,
    /// Limit on a single attempt.
    pub timeout: Duration,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            retry_delay: Duration::from_secs(60),
            backoff: Backoff::Constant,
            timeout: Duration::from_secs(60),
        }
    }
}

impl StepOptions {
    /// Builder: set retry limit and delay.
    pub fn with_retries(mut self, limit: u32, delay: Duration) -> Self {
        self.retry_limit = limit;
        self.retry_delay = delay;
        self
    }

    /// Builder: set the backoff policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Builder: set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Errors from [`StepRunner::run_step`].
#[derive(Debug, Error)]
pub enum StepError {
    /// Every attempt failed or timed out.
    #[error("step {step:?} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        step: String,
        attempts: u32,
        last_error: String,
    },

    /// The step output could not be memoized or replayed.
    #[error("step {step:?} output could not be stored: {source}")]
    Output {
        step: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Executes named steps for one run and memoizes their outputs.
#[derive(Debug, Default)]
pub struct StepRunner {
    outputs: Mutex<HashMap<String, serde_json::Value>>,
}

impl StepRunner {
    /// Creates a runner with no completed steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed steps.
    pub fn completed(&self) -> usize {
        self.outputs.lock().map(|outputs| outputs.len()).unwrap_or(0)
    }

    /// Runs `body` as the step `name`.
    ///
    /// If the step already completed in this run its output is returned
    /// without calling `body`. Otherwise `body` is attempted up to
    /// `retry_limit + 1` times, each attempt bounded by `timeout`.
    pub async fn run_step<T, E, F, Fut>(
        &self,
        name: &str,
        options: &StepOptions,
        mut body: F,
    ) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.memoized(name) {
            debug!(step = %name, "Replaying completed step");
            return serde_json::from_value(value).map_err(|source| StepError::Output {
                step: name.to_string(),
                source,
            });
        }

        let attempts = options.retry_limit.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = options.backoff.delay(options.retry_delay, attempt - 1);
                debug!(step = %name, attempt, delay_ms = delay.as_millis() as u64, "Retrying step");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(options.timeout, body()).await {
                Ok(Ok(output)) => {
                    let value = serde_json::to_value(&output).map_err(|source| {
                        StepError::Output {
                            step: name.to_string(),
                            source,
                        }
                    })?;
                    if let Ok(mut outputs) = self.outputs.lock() {
                        outputs.insert(name.to_string(), value);
                    }
                    return Ok(output);
                }
                Ok(Err(e)) => {
                    warn!(step = %name, attempt, error = %e, "Step attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(step = %name, attempt, timeout_ms = options.timeout.as_millis() as u64, "Step attempt timed out");
                    last_error = format!("timed out after {:?}", options.timeout);
                }
            }
        }

        Err(StepError::Exhausted {
            step: name.to_string(),
            attempts,
            last_error,
        })
    }

    fn memoized(&self, name: &str) -> Option<serde_json::Value> {
        self.outputs
            .lock()
            .ok()
            .and_then(|outputs| outputs.get(name).cloned())
    }
}

/// A long-running job made of steps.
pub trait Workflow: Send + Sync + 'static {
    /// Input of one run.
    type Params: Send + 'static;

    /// Executes one run. The output is the run's final result; an error
    /// marks the run as errored.
    fn run<'a>(
        &'a self,
        params: Self::Params,
        steps: &'a StepRunner,
    ) -> BoxFuture<'a, Result<String, String>>;
}

/// Status of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Created, not started yet.
    Pending,
    /// Executing.
    Running,
    /// Finished with an output.
    Complete { output: String },
    /// Finished with an error.
    Errored { message: String },
}

impl RunStatus {
    /// Returns true once the run has finished, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Errored { .. })
    }

    /// Returns the output of a complete run.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Complete { output } => Some(output),
            _ => None,
        }
    }
}

/// Handle to a run registered in a [`WorkflowRegistry`].
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: String,
    created_at: DateTime<Utc>,
    status: watch::Receiver<RunStatus>,
    steps: Arc<StepRunner>,
}

impl RunHandle {
    /// Run identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the run was first created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current status.
    pub fn status(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    /// Number of steps the run has completed.
    pub fn completed_steps(&self) -> usize {
        self.steps.completed()
    }

    /// Waits until the run finishes and returns its final status.
    pub async fn wait(&self) -> RunStatus {
        let mut rx = self.status.clone();
        match rx.wait_for(RunStatus::is_finished).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }
}

/// Registry of runs of one workflow, keyed by run id.
pub struct WorkflowRegistry<W: Workflow> {
    workflow: Arc<W>,
    runs: RwLock<HashMap<String, RunHandle>>,
    max_retained: usize,
}

impl<W: Workflow> fmt::Debug for WorkflowRegistry<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("max_retained", &self.max_retained)
            .finish_non_exhaustive()
    }
}

impl<W: Workflow> WorkflowRegistry<W> {
    /// Default number of runs kept before finished ones are dropped.
    pub const DEFAULT_MAX_RETAINED: usize = 32;

    /// Creates a registry for `workflow`.
    pub fn new(workflow: Arc<W>) -> Self {
        Self {
            workflow,
            runs: RwLock::new(HashMap::new()),
            max_retained: Self::DEFAULT_MAX_RETAINED,
        }
    }

    /// Builder: set how many runs are retained.
    pub fn with_max_retained(mut self, max: usize) -> Self {
        self.max_retained = max.max(1);
        self
    }

    /// Looks up a run without creating it.
    pub async fn get(&self, id: &str) -> Option<RunHandle> {
        self.runs.read().await.get(id).cloned()
    }

    /// Number of registered runs.
    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Returns true if no run is registered.
    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    /// Returns the run registered under `id`, starting it with `params` if
    /// there is none. An errored run is restarted and keeps its completed
    /// steps; `params` is ignored when joining a live or complete run.
    pub async fn get_or_create(&self, id: &str, params: W::Params) -> RunHandle {
        let mut runs = self.runs.write().await;

        let existing = runs.get(id).cloned();
        let (steps, created_at) = match existing {
            Some(handle) if !matches!(handle.status(), RunStatus::Errored { .. }) => {
                debug!(run = %id, "Joining existing run");
                return handle;
            }
            Some(handle) => {
                info!(run = %id, completed = handle.completed_steps(), "Restarting errored run");
                (handle.steps, handle.created_at)
            }
            None => {
                Self::prune(&mut runs, self.max_retained);
                (Arc::new(StepRunner::new()), Utc::now())
            }
        };

        let (tx, rx) = watch::channel(RunStatus::Pending);
        let handle = RunHandle {
            id: id.to_string(),
            created_at,
            status: rx,
            steps: steps.clone(),
        };
        runs.insert(id.to_string(), handle.clone());

        let workflow = self.workflow.clone();
        let span = info_span!("run", id = %id);
        tokio::spawn(
            async move {
                let _ = tx.send(RunStatus::Running);
                let status = match workflow.run(params, &steps).await {
                    Ok(output) => {
                        info!(completed = steps.completed(), "Run complete");
                        RunStatus::Complete { output }
                    }
                    Err(message) => {
                        warn!(error = %message, "Run errored");
                        RunStatus::Errored { message }
                    }
                };
                let _ = tx.send(status);
            }
            .instrument(span),
        );

        handle
    }

    /// Drops finished runs once more than `max` are registered.
    fn prune(runs: &mut HashMap<String, RunHandle>, max: usize) {
        if runs.len() < max {
            return;
        }
        let before = runs.len();
        runs.retain(|_, handle| !handle.status().is_finished());
        debug!(dropped = before - runs.len(), "Pruned finished runs");
    }
}
