//! Error taxonomy for the optimization pipeline.
//!
//! Solver infeasibility is not an error: a run that serves nothing still
//! produces a [`Solution`](crate::solution::Solution) with every stop dropped.

use thiserror::Error;

use crate::model::{RunKey, StopId, VehicleId};

/// Rejected inputs. Raised before any matrix or solver work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no stops to route")]
    NoStops,
    #[error("no vehicles available")]
    NoVehicles,
    #[error("time window ends ({latest}) before it starts ({earliest})")]
    InvalidTimeWindow { earliest: u32, latest: u32 },
}

/// A single distance-provider call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
    #[error("request to {url} failed with HTTP {status}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("provider returned {code}: {message}")]
    Service { code: String, message: String },
    #[error("could not parse provider response: {message}")]
    Parse { message: String },
}

/// The travel-time matrix could not be assembled. No partial matrix is ever
/// returned alongside this error.
#[derive(Debug, Error)]
pub enum MatrixBuildError {
    #[error("chunk limits must be non-zero (max_elements={max_elements}, max_rows={max_rows}, max_cols={max_cols})")]
    InvalidLimits {
        max_elements: usize,
        max_rows: usize,
        max_cols: usize,
    },
    #[error("chunk {chunk} request failed")]
    Provider {
        chunk: usize,
        #[source]
        source: ProviderError,
    },
    #[error("chunk {chunk} returned {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    ShapeMismatch {
        chunk: usize,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("matrix build cancelled")]
    Cancelled,
    #[error("failed to build request worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// The entity store could not produce the run's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entity lookup failed: {message}")]
pub struct EntityError {
    pub message: String,
}

impl EntityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A single assignment write was refused by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("persistence write failed: {message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-stop write failure recorded by the applier. Other stops are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not assign {stop_id} to {vehicle_id}")]
pub struct ApplyError {
    pub stop_id: StopId,
    pub vehicle_id: VehicleId,
    #[source]
    pub source: SinkError,
}

/// Failures at the pipeline boundary.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Matrix(#[from] MatrixBuildError),
    #[error(transparent)]
    Entities(#[from] EntityError),
    #[error("an optimization run for {key} is already in flight")]
    AlreadyRunning { key: RunKey },
    #[error("optimization cancelled before the solver started")]
    Cancelled,
}
