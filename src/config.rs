//! Pipeline configuration.
//!
//! Every struct deserializes with defaults for missing fields, so an
//! embedding service can load a partial document from any serde format.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::TransitMode;
use crate::solver::SolveOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub transit_mode: TransitMode,
    /// Wall-clock budget for the route search, in milliseconds.
    pub time_budget_ms: u64,
    pub solve: SolveOptions,
    pub matrix: MatrixOptions,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            transit_mode: TransitMode::Driving,
            time_budget_ms: 30_000,
            solve: SolveOptions::default(),
            matrix: MatrixOptions::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixOptions {
    /// Worker threads for concurrent chunk requests. `None` shares the
    /// global rayon pool.
    pub parallelism: Option<usize>,
}
