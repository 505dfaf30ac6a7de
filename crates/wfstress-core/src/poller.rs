//! Completion polling and latency aggregation
//!
//! The poller owns one batch of workflow names. It scans the ones that have
//! not completed yet, one `get_workflow` at a time, until every workflow has
//! reached a terminal phase. Each workflow adds its wait and run time to the
//! running sums exactly once, when it is first seen completed. Afterwards the
//! whole batch is deleted and the integer means are reported.
//!
//! Throttling:
//! - a random pause in `[0, budget)` seconds before the first pass, so
//!   parallel harnesses sharing one cluster do not start in lockstep
//! - a random pause in `[0, budget / 100)` seconds after each fetch that
//!   found a workflow still running (none when that bound is zero)
//!
//! A failed fetch ends the round immediately. Nothing is deleted in that case.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{PlanConfig, RoundConfig};
use crate::error::{StressError, StressResult};
use crate::remote::WorkflowApi;
use crate::workflow::WorkflowSnapshot;

/// Name → completed flag for one batch.
///
/// Entries only ever move from `false` to `true`.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    entries: HashMap<String, bool>,
}

impl PendingSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names.into_iter().map(|n| (n.into(), false)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names not yet seen completed, in no particular order.
    pub fn pending(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, done)| !**done)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|done| !**done).count()
    }

    /// Flip `name` to completed. Returns true only on the first flip.
    pub fn mark_completed(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(done) if !*done => {
                *done = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_completed(&self, name: &str) -> Option<bool> {
        self.entries.get(name).copied()
    }

    /// True once every entry has completed.
    pub fn all_completed(&self) -> bool {
        self.entries.values().all(|done| *done)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Running wait/run sums over the completed workflows of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyAccumulator {
    pub total_wait_ms: i64,
    pub total_run_ms: i64,
    pub completed: usize,
}

impl LatencyAccumulator {
    /// Add one completed workflow. Returns its completion index (0-based).
    pub fn record(&mut self, snapshot: &WorkflowSnapshot) -> usize {
        self.record_ms(snapshot.wait_ms(), snapshot.run_ms())
    }

    pub fn record_ms(&mut self, wait_ms: i64, run_ms: i64) -> usize {
        let index = self.completed;
        self.total_wait_ms += wait_ms;
        self.total_run_ms += run_ms;
        self.completed += 1;
        index
    }

    /// Integer means over `batch_size`, truncating toward zero.
    pub fn means(&self, batch_size: usize) -> StressResult<(i64, i64)> {
        if batch_size == 0 {
            return Err(StressError::EmptyBatch);
        }
        let n = batch_size as i64;
        Ok((self.total_wait_ms / n, self.total_run_ms / n))
    }
}

/// Outcome of one polled batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStats {
    pub batch_size: usize,
    pub total_wait_ms: i64,
    pub total_run_ms: i64,
    pub mean_wait_ms: i64,
    pub mean_run_ms: i64,
    /// Full scans over the pending names.
    pub passes: usize,
    pub deleted: usize,
    pub delete_failures: usize,
    pub elapsed: Duration,
}

/// Throttling and progress settings for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub sleep_budget_secs: u64,
    pub progress_every: usize,
}

impl PollSettings {
    pub fn for_round(plan: &PlanConfig, round: &RoundConfig) -> Self {
        Self {
            sleep_budget_secs: round.sleep_budget_secs,
            progress_every: plan.progress_every,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            sleep_budget_secs: 0,
            progress_every: 10,
        }
    }
}

/// Random whole-second pause in `[0, budget_secs)`; zero for a zero budget.
pub fn startup_jitter<R: Rng>(budget_secs: u64, rng: &mut R) -> Duration {
    if budget_secs == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(rng.gen_range(0..budget_secs))
}

/// Pause after a not-yet-completed fetch, bounded by `budget_secs / 100`.
pub fn pending_pause<R: Rng>(budget_secs: u64, rng: &mut R) -> Option<Duration> {
    let bound = budget_secs / 100;
    if bound == 0 {
        return None;
    }
    Some(Duration::from_secs(rng.gen_range(0..bound)))
}

/// Waits for a batch to complete, then deletes it.
pub struct CompletionPoller<'a, A: WorkflowApi + ?Sized> {
    api: &'a A,
    settings: PollSettings,
}

impl<'a, A: WorkflowApi + ?Sized> CompletionPoller<'a, A> {
    pub fn new(api: &'a A, settings: PollSettings) -> Self {
        Self { api, settings }
    }

    /// Poll `names` until every workflow is terminal, delete them all, and
    /// report the latency means.
    ///
    /// There is no overall timeout. A batch that never completes keeps this
    /// future pending forever.
    pub async fn wait_and_reap(&self, names: Vec<String>) -> StressResult<RoundStats> {
        let started = Instant::now();
        let (pending, latency, passes) = self.wait_for_completion(names).await?;
        let (deleted, delete_failures) = self.reap(&pending).await;

        let batch_size = pending.len();
        let (mean_wait_ms, mean_run_ms) = latency.means(batch_size)?;
        let stats = RoundStats {
            batch_size,
            total_wait_ms: latency.total_wait_ms,
            total_run_ms: latency.total_run_ms,
            mean_wait_ms,
            mean_run_ms,
            passes,
            deleted,
            delete_failures,
            elapsed: started.elapsed(),
        };
        info!(
            batch_size,
            mean_wait_ms,
            mean_run_ms,
            passes,
            delete_failures,
            "batch complete"
        );
        Ok(stats)
    }

    /// The polling half of `wait_and_reap`. Returns the fully completed set,
    /// the sums and the number of passes.
    pub async fn wait_for_completion(
        &self,
        names: Vec<String>,
    ) -> StressResult<(PendingSet, LatencyAccumulator, usize)> {
        let mut pending = PendingSet::new(names);
        if pending.is_empty() {
            return Err(StressError::EmptyBatch);
        }

        let budget = self.settings.sleep_budget_secs;
        let progress_every = self.settings.progress_every.max(1);
        let mut rng = StdRng::from_entropy();

        let jitter = startup_jitter(budget, &mut rng);
        if !jitter.is_zero() {
            info!(jitter_secs = jitter.as_secs(), "delaying first poll");
            tokio::time::sleep(jitter).await;
        }

        let mut latency = LatencyAccumulator::default();
        let mut passes = 0;

        while !pending.all_completed() {
            passes += 1;
            debug!(pass = passes, pending = pending.pending_count(), "polling pass");

            for name in pending.pending() {
                let snapshot = self.api.get_workflow(&name).await?;

                if snapshot.phase.is_completed() {
                    if pending.mark_completed(&name) {
                        let index = latency.record(&snapshot);
                        if index % progress_every == 0 {
                            info!(index, name = %name, phase = ?snapshot.phase, "workflow completed");
                        }
                    }
                } else if let Some(pause) = pending_pause(budget, &mut rng) {
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        }

        Ok((pending, latency, passes))
    }

    /// Delete every name in the set. Failures are counted, never returned.
    async fn reap(&self, pending: &PendingSet) -> (usize, usize) {
        let progress_every = self.settings.progress_every.max(1);
        let mut deleted = 0;
        let mut failures = 0;

        for (index, name) in pending.names().enumerate() {
            match self.api.delete_workflow(name).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    debug!(name, error = %err, "delete failed, ignoring");
                    failures += 1;
                }
            }
            if index % progress_every == 0 {
                info!(index, name, "deleting");
            }
        }

        (deleted, failures)
    }
}
