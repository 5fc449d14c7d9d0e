//! Task loop: one distributed multiply per configured size.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{info, warn};
use thiserror::Error;

use crate::comm::Communicator;
use crate::config::RunConfig;
use crate::engine::{self, EngineError, Outcome, Role};
use crate::matrix::{Matrix, MatrixError};
use crate::source::FileSource;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to write result {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: MatrixError,
    },
}

#[derive(Debug)]
pub enum TaskStatus {
    Skipped { reason: String },
    Completed {
        output: PathBuf,
        elapsed: Duration,
        baseline: Option<Duration>,
        verified: Option<bool>,
    },
}

/// What the coordinator reports for one size.
#[derive(Debug)]
pub struct TaskReport {
    pub size: usize,
    pub processes: usize,
    pub status: TaskStatus,
}

/// Process every size in `config` on this rank.
///
/// All ranks must call this with the same sizes. Reports are only produced
/// on the coordinator; workers get an empty list.
pub fn run<C: Communicator>(comm: &C, config: &RunConfig) -> Result<Vec<TaskReport>, RunError> {
    let role = Role::of(comm);
    let source = FileSource::new(&config.data_dir, &config.results_dir);
    let mut reports = Vec::new();

    for &size in &config.sizes {
        let inputs = match role {
            Role::Coordinator => Some(source.load(size)),
            Role::Worker => None,
        };

        match engine::multiply(comm, inputs)? {
            Outcome::Skipped { reason } => {
                if let Some(reason) = reason {
                    reports.push(TaskReport {
                        size,
                        processes: comm.size(),
                        status: TaskStatus::Skipped {
                            reason: reason.to_string(),
                        },
                    });
                }
            }
            Outcome::Completed {
                result: Some(result),
                elapsed,
            } => {
                let report = finalize(&source, config, comm.size(), size, &result, elapsed)?;
                reports.push(report);
            }
            Outcome::Completed { result: None, .. } => {}
        }
    }

    Ok(reports)
}

fn finalize(
    source: &FileSource,
    config: &RunConfig,
    processes: usize,
    size: usize,
    result: &Matrix,
    elapsed: Duration,
) -> Result<TaskReport, RunError> {
    let output = source
        .store(size, result)
        .map_err(|source_err| RunError::Output {
            path: source.result_path(size),
            source: source_err,
        })?;
    info!("[Coordinator] Saved result to {:?}", output);

    let mut baseline = None;
    let mut verified = None;
    if config.baseline || config.verify {
        // Inputs were consumed by the distributed run; read them back the
        // same way an external checker would.
        match source.load(size) {
            Ok((a, b)) => {
                let start = Instant::now();
                let expected = a.multiply(&b).map_err(EngineError::from)?;
                if config.baseline {
                    baseline = Some(start.elapsed());
                }
                if config.verify {
                    let matches = expected == *result;
                    if !matches {
                        warn!("[Coordinator] Result for size {} does not match the baseline", size);
                    }
                    verified = Some(matches);
                }
            }
            Err(err) => warn!("[Coordinator] Cannot reload inputs for size {}: {}", size, err),
        }
    }

    Ok(TaskReport {
        size,
        processes,
        status: TaskStatus::Completed {
            output,
            elapsed,
            baseline,
            verified,
        },
    })
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix size: {}x{}", self.size, self.size)?;
        match &self.status {
            TaskStatus::Skipped { reason } => write!(f, "Skipped: {}", reason),
            TaskStatus::Completed {
                output,
                elapsed,
                baseline,
                verified,
            } => {
                writeln!(f, "Processes: {}", self.processes)?;
                writeln!(f, "Elapsed: {} ms", elapsed.as_millis())?;
                if let Some(baseline) = baseline {
                    writeln!(f, "Single-process: {} ms", baseline.as_millis())?;
                }
                if let Some(verified) = verified {
                    writeln!(f, "Verified: {}", if *verified { "match" } else { "MISMATCH" })?;
                }
                writeln!(f, "Task volume: {} elements", self.size * self.size)?;
                write!(f, "Output: {}", output.display())
            }
        }
    }
}
