pub mod comm;
pub mod config;
pub mod engine;
pub mod generator;
pub mod kernel;
pub mod local;
pub mod matrix;
#[cfg(feature = "mpi")]
pub mod mpi_comm;
pub mod partition;
pub mod runner;
pub mod source;

pub use comm::Communicator;
pub use engine::{Outcome, Role, TaskError};
pub use matrix::{Matrix, RowBlock};
pub use partition::PartitionPlan;
