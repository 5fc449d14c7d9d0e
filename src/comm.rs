//! Collective operations the distributed multiply is built from.
//!
//! Every operation here is collective and blocking: all ranks of a
//! communicator must call it, in the same order, with the same `root`.
//! Nothing returns until every rank has arrived.

use thiserror::Error;

use crate::matrix::Element;

/// Rank that owns A, B and the assembled result.
pub const ROOT: usize = 0;

// Message tags used by point-to-point transports to tell collectives apart.
pub const TAG_VALIDATION: u32 = 1;
pub const TAG_METADATA: u32 = 2;
pub const TAG_BROADCAST_DATA: u32 = 3;
pub const TAG_ROW_BLOCK: u32 = 4;
pub const TAG_RESULT_BLOCK: u32 = 5;

#[derive(Debug, Error)]
pub enum CommError {
    #[error("rank {rank}: peer {peer} disconnected")]
    Disconnected { rank: usize, peer: usize },

    #[error("rank {rank}: expected message with tag {expected}, payload did not match")]
    Protocol { rank: usize, expected: u32 },

    #[error("rank {rank}: buffer holds {expected} elements, message carried {found}")]
    BufferSize {
        rank: usize,
        expected: usize,
        found: usize,
    },

    #[error("rank {rank}: root called a rooted collective without its buffer")]
    MissingRootBuffer { rank: usize },

    #[error("count {0} does not fit the transport's count type")]
    CountOverflow(usize),

    #[error("failed to start rank {rank}: {source}")]
    Spawn {
        rank: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("rank {0} panicked")]
    RankPanicked(usize),

    #[error("communicator needs at least one rank")]
    EmptyWorld,
}

pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    /// Broadcast a single flag from `root`. Non-root values are overwritten.
    fn broadcast_flag(&self, root: usize, flag: &mut bool) -> Result<(), CommError>;

    /// Broadcast a small array of dimensions from `root`.
    fn broadcast_dims(&self, root: usize, dims: &mut [u64]) -> Result<(), CommError>;

    /// Broadcast a full element buffer from `root`. Every rank must pass a
    /// buffer of the same length.
    fn broadcast_elements(&self, root: usize, buf: &mut [Element]) -> Result<(), CommError>;

    /// Scatter variable-sized slices of `send` (root only) into each rank's
    /// `recv`. Rank `r` receives `send[offsets[r]..offsets[r] + counts[r]]`.
    fn scatter_elements(
        &self,
        root: usize,
        send: Option<&[Element]>,
        counts: &[usize],
        offsets: &[usize],
        recv: &mut [Element],
    ) -> Result<(), CommError>;

    /// Gather each rank's `send` into `recv` (root only) at `offsets[rank]`.
    /// Placement follows the offsets, not the order messages arrive in.
    fn gather_elements(
        &self,
        root: usize,
        send: &[Element],
        recv: Option<&mut [Element]>,
        counts: &[usize],
        offsets: &[usize],
    ) -> Result<(), CommError>;

    fn barrier(&self) -> Result<(), CommError>;
}
