//! visit-router: daily visit routing for field workers.
//!
//! Pulls a scope's vehicles and stops, builds a travel-time matrix under a
//! distance provider's size limits, solves a vehicle routing problem with time
//! windows and optional stops, and writes the assignments back.

pub mod apply;
pub mod cancel;
pub mod config;
pub mod error;
pub mod haversine;
pub mod matrix;
pub mod model;
pub mod osrm;
pub mod pipeline;
pub mod problem;
pub mod solution;
pub mod solver;
pub mod summary;
pub mod traits;

pub use apply::{ApplyReport, apply};
pub use cancel::CancellationToken;
pub use config::{MatrixOptions, OptimizerConfig};
pub use error::{
    ApplyError, EntityError, InputError, MatrixBuildError, OptimizeError, ProviderError, SinkError,
};
pub use matrix::{Matrix, MatrixBuilder};
pub use pipeline::{OptimizationOutcome, Optimizer, RunLease, RunLocks};
pub use problem::Problem;
pub use solution::{DroppedStop, Solution, VehicleRoute};
pub use solver::{RawRoute, RawSolverOutput, RouteOptimizer, SolveOptions, SolveStats};
pub use summary::{RouteSummary, SummaryRow};
pub use traits::{ChunkLimits, EntityProvider, GeoDistanceProvider, MatrixFragment, PersistenceSink};
