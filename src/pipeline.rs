//! End-to-end optimization run for one scope and date.
//!
//! entities -> problem -> matrix -> solver -> applier, with a lease per
//! [`RunKey`] so a scope and date never has two runs in flight in this process.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::apply::{ApplyReport, apply};
use crate::cancel::CancellationToken;
use crate::config::OptimizerConfig;
use crate::error::{MatrixBuildError, OptimizeError};
use crate::matrix::MatrixBuilder;
use crate::model::{RunKey, Scope};
use crate::problem::Problem;
use crate::solver::{RouteOptimizer, SolveStats};
use crate::summary::RouteSummary;
use crate::traits::{EntityProvider, GeoDistanceProvider, PersistenceSink};

/// Registry of run keys currently in flight. Clones share the registry.
#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    active: Arc<Mutex<HashSet<RunKey>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or `None` if another run holds it.
    pub fn try_acquire(&self, key: RunKey) -> Option<RunLease> {
        if !self.active.lock().insert(key) {
            return None;
        }
        Some(RunLease {
            locks: self.clone(),
            key,
        })
    }

    pub fn is_held(&self, key: &RunKey) -> bool {
        self.active.lock().contains(key)
    }
}

/// Held for the duration of a run; releases its key on drop.
#[derive(Debug)]
pub struct RunLease {
    locks: RunLocks,
    key: RunKey,
}

impl RunLease {
    pub fn key(&self) -> RunKey {
        self.key
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        self.locks.active.lock().remove(&self.key);
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub report: ApplyReport,
    pub summary: RouteSummary,
    pub stats: SolveStats,
}

pub struct Optimizer<E, G> {
    entities: E,
    geo: G,
    config: OptimizerConfig,
    matrix: MatrixBuilder,
    locks: RunLocks,
}

impl<E, G> Optimizer<E, G>
where
    E: EntityProvider,
    G: GeoDistanceProvider,
{
    pub fn new(entities: E, geo: G, config: OptimizerConfig) -> Result<Self, MatrixBuildError> {
        let matrix = match config.matrix.parallelism {
            Some(threads) => MatrixBuilder::new().with_parallelism(threads)?,
            None => MatrixBuilder::new(),
        };
        Ok(Self {
            entities,
            geo,
            config,
            matrix,
            locks: RunLocks::new(),
        })
    }

    /// Share a lease registry with other optimizers in this process.
    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &RunLocks {
        &self.locks
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Route every active stop of `scope` on `date` and write the assignments.
    ///
    /// Cancelling before the solver starts aborts with
    /// [`OptimizeError::Cancelled`]; cancelling during the search returns the
    /// best plan found so far and still applies it.
    #[instrument(skip_all, fields(%scope, %date))]
    pub fn optimize<S>(
        &self,
        scope: Scope,
        date: NaiveDate,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<OptimizationOutcome, OptimizeError>
    where
        S: PersistenceSink + ?Sized,
    {
        let key = RunKey { scope, date };
        let Some(_lease) = self.locks.try_acquire(key) else {
            warn!(%key, "optimization already in flight");
            return Err(OptimizeError::AlreadyRunning { key });
        };

        let vehicles = self.entities.vehicles_for(&scope, date)?;
        let stops = self.entities.stops_for(&scope, date)?;
        let problem = Problem::build(vehicles, stops)?;
        info!(
            vehicles = problem.num_vehicles(),
            stops = problem.num_stops(),
            "starting optimization run"
        );

        if cancel.is_cancelled() {
            return Err(cancelled("matrix"));
        }
        let matrix = self
            .matrix
            .build(&self.geo, &problem.locations, self.config.transit_mode, cancel)
            .map_err(|err| match err {
                MatrixBuildError::Cancelled => cancelled("matrix"),
                other => OptimizeError::Matrix(other),
            })?;
        if cancel.is_cancelled() {
            return Err(cancelled("solve"));
        }

        let raw = RouteOptimizer::new(self.config.solve.clone()).solve(
            &problem,
            &matrix,
            self.config.time_budget(),
            cancel,
        );
        let report = apply(&problem, &raw, sink);
        let summary = RouteSummary::new(&problem, &raw);

        info!(
            served = report.solution.served_count(),
            dropped = report.solution.dropped.len(),
            failed_writes = report.failures.len(),
            "optimization run complete"
        );

        Ok(OptimizationOutcome {
            report,
            summary,
            stats: raw.stats,
        })
    }
}

fn cancelled(stage: &'static str) -> OptimizeError {
    warn!(stage, "optimization cancelled");
    OptimizeError::Cancelled
}
