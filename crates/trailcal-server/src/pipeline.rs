//! Whole-calendar standardization.
//!
//! A pipeline run parses the upstream calendar, standardizes every event in
//! its own step and reassembles the calendar under the feed identity. While a
//! run is in flight, [`CalendarPipeline::assemble_best_effort`] serves the
//! same calendar using whatever the cache already holds.

use std::sync::Arc;

use tracing::{debug, info, warn};
use trailcal_core::{
    CalendarObject, FeedIdentity, FormatResult, canonical_key, parse, serialize,
};
use trailcal_standardizer::BoxFuture;

use crate::cache::ContentCache;
use crate::standardize::{EventStandardizer, Outcome};
use crate::workflow::{StepOptions, StepRunner, Workflow};

/// Parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    /// Upstream calendar text.
    pub calendar_text: String,
    /// Skip cache lookups for every event.
    pub force: bool,
}

/// Counts of how each event of a run was obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cached: usize,
    pub fresh: usize,
    pub passed_through: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Cached => self.cached += 1,
            Outcome::Fresh => self.fresh += 1,
            Outcome::PassedThrough => self.passed_through += 1,
        }
    }
}

/// Standardizes whole calendars through an [`EventStandardizer`].
#[derive(Debug, Clone)]
pub struct CalendarPipeline {
    standardizer: Arc<EventStandardizer>,
    identity: FeedIdentity,
    step_options: StepOptions,
}

impl CalendarPipeline {
    /// Creates a pipeline with the default identity and step options.
    pub fn new(standardizer: Arc<EventStandardizer>) -> Self {
        Self {
            standardizer,
            identity: FeedIdentity::default(),
            step_options: StepOptions::default(),
        }
    }

    /// Builder: set the identity stamped on produced calendars.
    pub fn with_identity(mut self, identity: FeedIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Builder: set the retry policy of each per-event step.
    pub fn with_step_options(mut self, options: StepOptions) -> Self {
        self.step_options = options;
        self
    }

    /// Returns the feed identity.
    pub fn identity(&self) -> &FeedIdentity {
        &self.identity
    }

    fn cache(&self) -> &ContentCache {
        self.standardizer.cache()
    }

    /// Standardizes every event of `calendar_text`, one step per event.
    ///
    /// Events keep their input order. An event whose step exhausts its
    /// retries is emitted unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`](trailcal_core::FormatError) if the input
    /// is not a calendar. Nothing is produced in that case.
    pub async fn standardize_all(
        &self,
        calendar_text: &str,
        force: bool,
        steps: &StepRunner,
    ) -> FormatResult<String> {
        let calendar = parse(calendar_text)?;
        let events = calendar.events();
        info!(events = events.len(), force, "Standardizing calendar");

        let mut summary = RunSummary::default();
        let mut standardized = Vec::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            let name = format!("standardize VEVENT #{index}");
            let result = steps
                .run_step(&name, &self.step_options, || async {
                    self.standardizer.standardize(event, force).await
                })
                .await;

            match result {
                Ok(done) => {
                    summary.record(done.outcome);
                    standardized.push(done.event);
                }
                Err(e) => {
                    warn!(index, error = %e, "Event step failed, passing event through");
                    summary.record(Outcome::PassedThrough);
                    standardized.push(event.clone());
                }
            }
        }

        info!(
            cached = summary.cached,
            fresh = summary.fresh,
            passed_through = summary.passed_through,
            "Calendar standardized"
        );
        Ok(serialize(&self.identity.calendar(standardized)))
    }

    /// Runs [`standardize_all`](Self::standardize_all) with a fresh step runner.
    pub async fn run(&self, calendar_text: &str, force: bool) -> FormatResult<String> {
        self.standardize_all(calendar_text, force, &StepRunner::new())
            .await
    }

    /// Builds the calendar from cached standardized events where present and
    /// original events elsewhere. Makes no service calls.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`](trailcal_core::FormatError) if the input
    /// is not a calendar.
    pub async fn assemble_best_effort(&self, calendar_text: &str) -> FormatResult<String> {
        let calendar = parse(calendar_text)?;
        let events = calendar.events();
        let keys: Vec<String> = events.iter().map(canonical_key).collect();

        let cached = self.cache().get_many(&keys).await;
        let hits = cached.iter().filter(|c| c.is_some()).count();
        debug!(events = events.len(), hits, "Assembling best-effort calendar");

        let merged: Vec<CalendarObject> = events
            .iter()
            .zip(cached)
            .map(|(original, cached)| cached.unwrap_or_else(|| original.clone()))
            .collect();

        Ok(serialize(&self.identity.calendar(merged)))
    }
}

impl Workflow for CalendarPipeline {
    type Params = RunParams;

    fn run<'a>(
        &'a self,
        params: RunParams,
        steps: &'a StepRunner,
    ) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            self.standardize_all(&params.calendar_text, params.force, steps)
                .await
                .map_err(|e| e.to_string())
        })
    }
}
