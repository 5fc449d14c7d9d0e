//! Distributed multiply protocol.
//!
//! Every rank runs [`multiply`]. The coordinator (rank 0) also owns the
//! inputs and ends up with the result; all other ranks only hold their own
//! row block of A, a copy of B, and their block of the result until the
//! gather completes.
//!
//! Phases, each one a collective:
//!
//! 1. validation flag
//! 2. metadata `[b_rows, b_cols, a_rows, a_cols]`
//! 3. broadcast of B
//! 4. scatter of A by the partition plan
//! 5. local multiply (no communication)
//! 6. gather of C by the partition plan
//!
//! A `false` validation flag ends the task on every rank right after phase 1.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use crate::comm::{CommError, Communicator, ROOT};
use crate::kernel;
use crate::matrix::{Matrix, MatrixError, RowBlock};
use crate::partition::{self, PartitionError, PartitionPlan};

/// Conditions that skip a task on every rank. Only the coordinator ever
/// detects these.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to load {path:?}: {source}")]
    LoadFailure {
        path: PathBuf,
        #[source]
        source: MatrixError,
    },

    #[error("dimension mismatch: A is {a_rows}x{a_cols}, B is {b_rows}x{b_cols}")]
    DimensionMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },

    #[error("coordinator was given no inputs")]
    NoInputs,
}

/// Failures that abort the whole run rather than one task.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Comm(#[from] CommError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("dimension {0} does not fit in memory on this platform")]
    Dimension(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Worker,
}

impl Role {
    pub fn of<C: Communicator>(comm: &C) -> Self {
        if comm.rank() == ROOT {
            Role::Coordinator
        } else {
            Role::Worker
        }
    }

    /// Log prefix in the `[Coordinator]` / `[Worker 3]` style.
    pub fn label(&self, rank: usize) -> String {
        match self {
            Role::Coordinator => "[Coordinator]".to_string(),
            Role::Worker => format!("[Worker {}]", rank),
        }
    }
}

/// What the coordinator hands to the engine: both inputs, or the reason
/// they could not be produced.
pub type Inputs = Result<(Matrix, Matrix), TaskError>;

#[derive(Debug)]
pub enum Outcome {
    /// Validation failed. `reason` is only known on the coordinator.
    Skipped { reason: Option<TaskError> },
    /// The task ran. `result` is only present on the coordinator.
    Completed {
        result: Option<Matrix>,
        elapsed: Duration,
    },
}

/// Shape of a task as broadcast in the metadata phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskShape {
    pub a_rows: usize,
    pub a_cols: usize,
    pub b_rows: usize,
    pub b_cols: usize,
}

impl TaskShape {
    pub fn of(a: &Matrix, b: &Matrix) -> Self {
        TaskShape {
            a_rows: a.rows,
            a_cols: a.cols,
            b_rows: b.rows,
            b_cols: b.cols,
        }
    }

    fn to_wire(self) -> [u64; 4] {
        [
            self.b_rows as u64,
            self.b_cols as u64,
            self.a_rows as u64,
            self.a_cols as u64,
        ]
    }

    fn from_wire(wire: [u64; 4]) -> Result<Self, EngineError> {
        let dim = |v: u64| usize::try_from(v).map_err(|_| EngineError::Dimension(v));
        Ok(TaskShape {
            b_rows: dim(wire[0])?,
            b_cols: dim(wire[1])?,
            a_rows: dim(wire[2])?,
            a_cols: dim(wire[3])?,
        })
    }
}

/// Check the coordinator's inputs. Dimension agreement on the inner axis is
/// the only structural requirement.
pub fn validate(inputs: Inputs) -> Inputs {
    let (a, b) = inputs?;
    if a.cols != b.rows {
        return Err(TaskError::DimensionMismatch {
            a_rows: a.rows,
            a_cols: a.cols,
            b_rows: b.rows,
            b_cols: b.cols,
        });
    }
    Ok((a, b))
}

/// Run one task on this rank.
///
/// `inputs` is read on the coordinator only; workers pass `None`. Must be
/// called by every rank of `comm` for every task, or the remaining ranks
/// block in the next collective.
pub fn multiply<C: Communicator>(comm: &C, inputs: Option<Inputs>) -> Result<Outcome, EngineError> {
    let role = Role::of(comm);
    let rank = comm.rank();
    let tag = role.label(rank);

    // VALIDATE
    let mut owned = match role {
        Role::Coordinator => Some(validate(inputs.unwrap_or(Err(TaskError::NoInputs)))),
        Role::Worker => None,
    };
    let mut valid = matches!(owned, Some(Ok(_)));
    comm.broadcast_flag(ROOT, &mut valid)?;
    if !valid {
        let reason = owned.take().and_then(Result::err);
        if let Some(reason) = &reason {
            warn!("{} Skipping task: {}", tag, reason);
        } else {
            debug!("{} Coordinator reported invalid task, skipping", tag);
        }
        return Ok(Outcome::Skipped { reason });
    }
    let inputs = owned.and_then(Result::ok);

    // BROADCAST_METADATA
    let mut wire = inputs
        .as_ref()
        .map_or([0; 4], |(a, b)| TaskShape::of(a, b).to_wire());
    comm.broadcast_dims(ROOT, &mut wire)?;
    let shape = TaskShape::from_wire(wire)?;
    let plan = partition::plan(shape.a_rows, comm.size())?;
    debug!(
        "{} A {}x{}, B {}x{}, {} local rows",
        tag,
        shape.a_rows,
        shape.a_cols,
        shape.b_rows,
        shape.b_cols,
        plan.count(rank)
    );

    let start = Instant::now();
    let (a, b) = match inputs {
        Some((a, b)) => (Some(a), Some(b)),
        None => (None, None),
    };

    // DISTRIBUTE_B
    let b = distribute_b(comm, b, &shape)?;

    // DISTRIBUTE_A
    let block = distribute_a(comm, a.as_ref(), &shape, &plan)?;

    // COMPUTE
    let product = kernel::multiply_block(&block, &b)?;
    debug!(
        "{} Computed rows [{}, {})",
        tag,
        product.start,
        product.start + product.rows
    );

    // COLLECT
    let result = collect(comm, product, &shape, &plan)?;
    let elapsed = start.elapsed();

    if result.is_some() {
        info!(
            "{} Multiplied {}x{} by {}x{} on {} ranks in {:?}",
            tag,
            shape.a_rows,
            shape.a_cols,
            shape.b_rows,
            shape.b_cols,
            comm.size(),
            elapsed
        );
    }

    Ok(Outcome::Completed { result, elapsed })
}

fn distribute_b<C: Communicator>(
    comm: &C,
    b: Option<Matrix>,
    shape: &TaskShape,
) -> Result<Matrix, EngineError> {
    let mut data = match b {
        Some(b) => b.data,
        None => vec![0; shape.b_rows * shape.b_cols],
    };
    comm.broadcast_elements(ROOT, &mut data)?;
    Ok(Matrix::from_vec(data, shape.b_rows, shape.b_cols)?)
}

fn distribute_a<C: Communicator>(
    comm: &C,
    a: Option<&Matrix>,
    shape: &TaskShape,
    plan: &PartitionPlan,
) -> Result<RowBlock, EngineError> {
    let rank = comm.rank();
    let counts = plan.element_counts(shape.a_cols);
    let offsets = plan.element_offsets(shape.a_cols);

    let mut local = vec![0; counts[rank]];
    comm.scatter_elements(
        ROOT,
        a.map(|a| a.data.as_slice()),
        &counts,
        &offsets,
        &mut local,
    )?;

    Ok(RowBlock::from_flat(
        plan.offset(rank),
        plan.count(rank),
        shape.a_cols,
        local,
    )?)
}

fn collect<C: Communicator>(
    comm: &C,
    product: RowBlock,
    shape: &TaskShape,
    plan: &PartitionPlan,
) -> Result<Option<Matrix>, EngineError> {
    let counts = plan.element_counts(shape.b_cols);
    let offsets = plan.element_offsets(shape.b_cols);
    let send = product.into_flat();

    if comm.is_root() {
        let mut result = Matrix::new(shape.a_rows, shape.b_cols);
        comm.gather_elements(ROOT, &send, Some(result.data.as_mut_slice()), &counts, &offsets)?;
        Ok(Some(result))
    } else {
        comm.gather_elements(ROOT, &send, None, &counts, &offsets)?;
        Ok(None)
    }
}
