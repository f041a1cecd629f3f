//! Travel-time matrix assembly under provider size limits.
//!
//! A provider only answers a bounded number of origin × destination pairs per
//! call. The builder splits the N origins into row chunks of
//! `max_elements / N` (further capped by `max_rows`), splits destinations into
//! column chunks of `max_cols` when needed, and issues one call per
//! (row chunk, column chunk) pair. Calls run on a rayon pool; results are
//! merged by chunk index, so completion order never affects the output.

use std::ops::Range;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::error::MatrixBuildError;
use crate::model::{Location, TransitMode};
use crate::traits::{ChunkLimits, GeoDistanceProvider, MatrixFragment};

/// Square travel-time matrix in whole minutes, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    size: usize,
    minutes: Vec<u32>,
}

impl Matrix {
    /// Marks a pair with no known route.
    pub const UNREACHABLE: u32 = u32::MAX;

    pub fn empty() -> Self {
        Self {
            size: 0,
            minutes: Vec::new(),
        }
    }

    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> u32) -> Self {
        let mut minutes = Vec::with_capacity(size * size);
        for i in 0..size {
            for j in 0..size {
                minutes.push(f(i, j));
            }
        }
        Self { size, minutes }
    }

    /// Build from explicit rows. Returns `None` unless the rows form a square.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Self {
            size,
            minutes: rows.into_iter().flatten().collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, from: usize, to: usize) -> u32 {
        self.minutes[from * self.size + to]
    }

    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.get(from, to) != Self::UNREACHABLE
    }

    pub fn row(&self, index: usize) -> &[u32] {
        &self.minutes[index * self.size..(index + 1) * self.size]
    }

    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        (0..self.size).map(|i| self.row(i).to_vec()).collect()
    }
}

/// One provider call: a block of origins against a block of destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Chunk {
    pub fn elements(&self) -> usize {
        self.rows.len() * self.cols.len()
    }
}

/// Partition an `n × n` request into calls that respect `limits`.
///
/// Chunks are numbered row-major: all column chunks of the first row block,
/// then the next row block.
pub fn plan_chunks(n: usize, limits: ChunkLimits) -> Result<Vec<Chunk>, MatrixBuildError> {
    if limits.max_elements == 0 || limits.max_rows == 0 || limits.max_cols == 0 {
        return Err(MatrixBuildError::InvalidLimits {
            max_elements: limits.max_elements,
            max_rows: limits.max_rows,
            max_cols: limits.max_cols,
        });
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let cols_per_chunk = n.min(limits.max_cols).min(limits.max_elements);
    let rows_per_chunk = (limits.max_elements / n)
        .max(1)
        .min(limits.max_rows)
        .min(n);

    let mut chunks = Vec::new();
    for row_start in (0..n).step_by(rows_per_chunk) {
        let rows = row_start..(row_start + rows_per_chunk).min(n);
        for col_start in (0..n).step_by(cols_per_chunk) {
            let cols = col_start..(col_start + cols_per_chunk).min(n);
            chunks.push(Chunk {
                index: chunks.len(),
                rows: rows.clone(),
                cols,
            });
        }
    }
    Ok(chunks)
}

/// Builds full matrices out of limited provider calls.
#[derive(Debug, Default)]
pub struct MatrixBuilder {
    limits: Option<ChunkLimits>,
    pool: Option<ThreadPool>,
}

impl MatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the limits the provider reports.
    pub fn with_limits(mut self, limits: ChunkLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Issue chunk calls on a dedicated pool of `threads` workers instead of
    /// the global rayon pool.
    pub fn with_parallelism(mut self, threads: usize) -> Result<Self, MatrixBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("matrix-chunk-{index}"))
            .build()?;
        self.pool = Some(pool);
        Ok(self)
    }

    /// Assemble the `N × N` matrix for `locations`.
    ///
    /// Any failed chunk aborts the whole build.
    pub fn build<P>(
        &self,
        provider: &P,
        locations: &[Location],
        mode: TransitMode,
        cancel: &CancellationToken,
    ) -> Result<Matrix, MatrixBuildError>
    where
        P: GeoDistanceProvider + ?Sized,
    {
        let n = locations.len();
        let limits = self.limits.unwrap_or_else(|| provider.limits());
        let plan = plan_chunks(n, limits)?;
        if plan.is_empty() {
            return Ok(Matrix::empty());
        }
        if cancel.is_cancelled() {
            return Err(MatrixBuildError::Cancelled);
        }

        info!(locations = n, chunks = plan.len(), ?mode, "building travel-time matrix");

        let fetch = || {
            plan.par_iter()
                .map(|chunk| fetch_chunk(provider, locations, mode, chunk, cancel))
                .collect::<Result<Vec<_>, _>>()
        };
        let fragments = match &self.pool {
            Some(pool) => pool.install(fetch)?,
            None => fetch()?,
        };

        Ok(stitch(n, &plan, fragments))
    }
}

fn fetch_chunk<P>(
    provider: &P,
    locations: &[Location],
    mode: TransitMode,
    chunk: &Chunk,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<u32>>, MatrixBuildError>
where
    P: GeoDistanceProvider + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(MatrixBuildError::Cancelled);
    }
    debug!(
        chunk = chunk.index,
        rows = ?chunk.rows,
        cols = ?chunk.cols,
        "requesting matrix chunk"
    );

    let fragment = provider
        .distances(
            &locations[chunk.rows.clone()],
            &locations[chunk.cols.clone()],
            mode,
        )
        .map_err(|source| MatrixBuildError::Provider {
            chunk: chunk.index,
            source,
        })?;

    check_shape(chunk, &fragment)?;

    Ok(fragment
        .into_iter()
        .map(|row| row.into_iter().map(seconds_to_minutes).collect())
        .collect())
}

fn check_shape(chunk: &Chunk, fragment: &MatrixFragment) -> Result<(), MatrixBuildError> {
    let rows = fragment.len();
    let bad_row = fragment.iter().find(|row| row.len() != chunk.cols.len());
    if rows != chunk.rows.len() || bad_row.is_some() {
        return Err(MatrixBuildError::ShapeMismatch {
            chunk: chunk.index,
            rows,
            cols: bad_row.map_or(chunk.cols.len(), Vec::len),
            expected_rows: chunk.rows.len(),
            expected_cols: chunk.cols.len(),
        });
    }
    Ok(())
}

/// Whole minutes, rounded down. Unroutable or nonsensical values become
/// [`Matrix::UNREACHABLE`].
fn seconds_to_minutes(seconds: Option<f64>) -> u32 {
    match seconds {
        Some(secs) if secs.is_finite() && secs >= 0.0 => {
            let minutes = (secs / 60.0).floor();
            if minutes >= f64::from(Matrix::UNREACHABLE) {
                Matrix::UNREACHABLE - 1
            } else {
                minutes as u32
            }
        }
        _ => Matrix::UNREACHABLE,
    }
}

/// Merge fragments: column chunks of a row block first, then row blocks into
/// place. `fragments[k]` belongs to `plan[k]`.
fn stitch(n: usize, plan: &[Chunk], fragments: Vec<Vec<Vec<u32>>>) -> Matrix {
    let mut minutes = vec![Matrix::UNREACHABLE; n * n];
    let mut pending = plan.iter().zip(fragments).peekable();

    while let Some((first, fragment)) = pending.next() {
        let rows = first.rows.clone();
        let mut block: Vec<Vec<u32>> = fragment;
        while let Some((_, more)) = pending.next_if(|(chunk, _)| chunk.rows == rows) {
            for (line, extra) in block.iter_mut().zip(more) {
                line.extend(extra);
            }
        }

        for (offset, line) in block.into_iter().enumerate() {
            let start = (rows.start + offset) * n;
            minutes[start..start + n].copy_from_slice(&line);
        }
    }

    Matrix { size: n, minutes }
}
