//! MPI transport: one OS process per rank, launched with `mpirun -n P`.

use mpi::datatype::{Partition, PartitionMut};
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as _, Root};
use mpi::Count;

use crate::comm::{CommError, Communicator};
use crate::matrix::Element;

pub struct MpiComm {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

impl MpiComm {
    pub fn new(world: SimpleCommunicator) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { world, rank, size }
    }
}

fn to_counts(values: &[usize]) -> Result<Vec<Count>, CommError> {
    values
        .iter()
        .map(|&v| Count::try_from(v).map_err(|_| CommError::CountOverflow(v)))
        .collect()
}

fn root_rank(root: usize) -> Result<i32, CommError> {
    i32::try_from(root).map_err(|_| CommError::CountOverflow(root))
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_flag(&self, root: usize, flag: &mut bool) -> Result<(), CommError> {
        let mut wire = u8::from(*flag);
        self.world.process_at_rank(root_rank(root)?).broadcast_into(&mut wire);
        *flag = wire != 0;
        Ok(())
    }

    fn broadcast_dims(&self, root: usize, dims: &mut [u64]) -> Result<(), CommError> {
        self.world.process_at_rank(root_rank(root)?).broadcast_into(dims);
        Ok(())
    }

    fn broadcast_elements(&self, root: usize, buf: &mut [Element]) -> Result<(), CommError> {
        self.world.process_at_rank(root_rank(root)?).broadcast_into(buf);
        Ok(())
    }

    fn scatter_elements(
        &self,
        root: usize,
        send: Option<&[Element]>,
        counts: &[usize],
        offsets: &[usize],
        recv: &mut [Element],
    ) -> Result<(), CommError> {
        let root_process = self.world.process_at_rank(root_rank(root)?);
        if self.rank == root {
            let send = send.ok_or(CommError::MissingRootBuffer { rank: self.rank })?;
            let counts = to_counts(counts)?;
            let displs = to_counts(offsets)?;
            let partition = Partition::new(send, &counts[..], &displs[..]);
            root_process.scatter_varcount_into_root(&partition, recv);
        } else {
            root_process.scatter_varcount_into(recv);
        }
        Ok(())
    }

    fn gather_elements(
        &self,
        root: usize,
        send: &[Element],
        recv: Option<&mut [Element]>,
        counts: &[usize],
        offsets: &[usize],
    ) -> Result<(), CommError> {
        let root_process = self.world.process_at_rank(root_rank(root)?);
        if self.rank == root {
            let recv = recv.ok_or(CommError::MissingRootBuffer { rank: self.rank })?;
            let counts = to_counts(counts)?;
            let displs = to_counts(offsets)?;
            let mut partition = PartitionMut::new(recv, &counts[..], &displs[..]);
            root_process.gather_varcount_into_root(send, &mut partition);
        } else {
            root_process.gather_varcount_into(send);
        }
        Ok(())
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.world.barrier();
        Ok(())
    }
}
