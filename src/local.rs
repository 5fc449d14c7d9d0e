//! In-process transport: one thread per rank.
//!
//! Each rank owns an inbox channel and holds a sender to every inbox.
//! Receives match on (source, tag) like MPI point-to-point, stashing
//! anything that arrives early. Every collective ends on a shared barrier,
//! so no rank leaves a phase before all ranks have entered it.
//!
//! A rank that drops its communicator (returning early with an error, or
//! unwinding from a panic) tells every peer it has left. Peers still
//! blocked in a receive or the barrier then fail with
//! [`CommError::Disconnected`] instead of waiting forever.

use std::cell::RefCell;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use log::debug;

use crate::comm::*;
use crate::matrix::Element;

#[derive(Debug, Clone)]
enum Payload {
    Flag(bool),
    Dims(Vec<u64>),
    Elements(Vec<Element>),
    Departed,
}

#[derive(Debug)]
struct Packet {
    source: usize,
    tag: u32,
    payload: Payload,
}

pub struct LocalComm {
    rank: usize,
    size: usize,
    outboxes: Vec<Sender<Packet>>,
    inbox: Receiver<Packet>,
    pending: RefCell<Vec<Packet>>,
    barrier: Arc<Rendezvous>,
}

/// Reusable barrier that fails once any rank has left the world.
struct Rendezvous {
    size: usize,
    state: Mutex<RendezvousState>,
    released: Condvar,
}

struct RendezvousState {
    arrived: usize,
    generation: u64,
    departed: Option<usize>,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Rendezvous {
            size,
            state: Mutex::new(RendezvousState {
                arrived: 0,
                generation: 0,
                departed: None,
            }),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RendezvousState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self, rank: usize) -> Result<(), CommError> {
        let mut state = self.lock();
        if let Some(peer) = state.departed {
            return Err(CommError::Disconnected { rank, peer });
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(());
        }

        // A release that already happened wins over a later departure.
        while state.generation == generation {
            if let Some(peer) = state.departed {
                return Err(CommError::Disconnected { rank, peer });
            }
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }

    fn depart(&self, rank: usize) {
        let mut state = self.lock();
        state.departed.get_or_insert(rank);
        self.released.notify_all();
    }
}

/// Run `task` on `size` ranks, one thread each, and return every rank's
/// result in rank order.
pub fn run<F, T>(size: usize, task: F) -> Result<Vec<T>, CommError>
where
    F: Fn(LocalComm) -> T + Sync,
    T: Send,
{
    let comms = LocalComm::world(size)?;
    let task = &task;

    thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let rank = comm.rank;
                thread::Builder::new()
                    .name(format!("rank-{}", rank))
                    .spawn_scoped(scope, move || task(comm))
                    .map_err(|source| CommError::Spawn { rank, source })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle?.join().map_err(|_| CommError::RankPanicked(rank))
            })
            .collect()
    })
}

impl LocalComm {
    /// Build a fully connected set of `size` communicators.
    pub fn world(size: usize) -> Result<Vec<LocalComm>, CommError> {
        if size == 0 {
            return Err(CommError::EmptyWorld);
        }

        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| channel()).unzip();
        let barrier = Arc::new(Rendezvous::new(size));

        Ok(receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalComm {
                rank,
                size,
                outboxes: senders.clone(),
                inbox,
                pending: RefCell::new(Vec::new()),
                barrier: Arc::clone(&barrier),
            })
            .collect())
    }

    fn send(&self, dest: usize, tag: u32, payload: Payload) -> Result<(), CommError> {
        self.outboxes[dest]
            .send(Packet {
                source: self.rank,
                tag,
                payload,
            })
            .map_err(|_| CommError::Disconnected {
                rank: self.rank,
                peer: dest,
            })
    }

    /// Block until a packet with `tag` (and `source`, if given) arrives.
    fn receive(&self, source: Option<usize>, tag: u32) -> Result<Packet, CommError> {
        let matches = |p: &Packet| p.tag == tag && source.map_or(true, |s| p.source == s);

        {
            let mut pending = self.pending.borrow_mut();
            if let Some(pos) = pending.iter().position(|p| matches(p)) {
                return Ok(pending.remove(pos));
            }
        }

        loop {
            let packet = self.inbox.recv().map_err(|_| CommError::Disconnected {
                rank: self.rank,
                peer: source.unwrap_or(ROOT),
            })?;
            if let Payload::Departed = packet.payload {
                return Err(CommError::Disconnected {
                    rank: self.rank,
                    peer: packet.source,
                });
            }
            if matches(&packet) {
                return Ok(packet);
            }
            self.pending.borrow_mut().push(packet);
        }
    }

    fn receive_elements(&self, source: Option<usize>, tag: u32) -> Result<(usize, Vec<Element>), CommError> {
        let packet = self.receive(source, tag)?;
        match packet.payload {
            Payload::Elements(data) => Ok((packet.source, data)),
            _ => Err(CommError::Protocol {
                rank: self.rank,
                expected: tag,
            }),
        }
    }

    fn copy_checked(&self, dst: &mut [Element], src: &[Element]) -> Result<(), CommError> {
        if dst.len() != src.len() {
            return Err(CommError::BufferSize {
                rank: self.rank,
                expected: dst.len(),
                found: src.len(),
            });
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    fn fan_out(&self, tag: u32, payload: Payload) -> Result<(), CommError> {
        for dest in (0..self.size).filter(|&d| d != self.rank) {
            self.send(dest, tag, payload.clone())?;
        }
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_flag(&self, root: usize, flag: &mut bool) -> Result<(), CommError> {
        if self.rank == root {
            self.fan_out(TAG_VALIDATION, Payload::Flag(*flag))?;
        } else {
            match self.receive(Some(root), TAG_VALIDATION)?.payload {
                Payload::Flag(value) => *flag = value,
                _ => {
                    return Err(CommError::Protocol {
                        rank: self.rank,
                        expected: TAG_VALIDATION,
                    })
                }
            }
        }
        self.barrier()
    }

    fn broadcast_dims(&self, root: usize, dims: &mut [u64]) -> Result<(), CommError> {
        if self.rank == root {
            self.fan_out(TAG_METADATA, Payload::Dims(dims.to_vec()))?;
        } else {
            match self.receive(Some(root), TAG_METADATA)?.payload {
                Payload::Dims(values) if values.len() == dims.len() => dims.copy_from_slice(&values),
                Payload::Dims(values) => {
                    return Err(CommError::BufferSize {
                        rank: self.rank,
                        expected: dims.len(),
                        found: values.len(),
                    })
                }
                _ => {
                    return Err(CommError::Protocol {
                        rank: self.rank,
                        expected: TAG_METADATA,
                    })
                }
            }
        }
        self.barrier()
    }

    fn broadcast_elements(&self, root: usize, buf: &mut [Element]) -> Result<(), CommError> {
        if self.rank == root {
            self.fan_out(TAG_BROADCAST_DATA, Payload::Elements(buf.to_vec()))?;
        } else {
            let (_, data) = self.receive_elements(Some(root), TAG_BROADCAST_DATA)?;
            self.copy_checked(buf, &data)?;
        }
        self.barrier()
    }

    fn scatter_elements(
        &self,
        root: usize,
        send: Option<&[Element]>,
        counts: &[usize],
        offsets: &[usize],
        recv: &mut [Element],
    ) -> Result<(), CommError> {
        if self.rank == root {
            let send = send.ok_or(CommError::MissingRootBuffer { rank: self.rank })?;
            for dest in 0..self.size {
                let chunk = &send[offsets[dest]..offsets[dest] + counts[dest]];
                if dest == root {
                    self.copy_checked(recv, chunk)?;
                } else {
                    self.send(dest, TAG_ROW_BLOCK, Payload::Elements(chunk.to_vec()))?;
                }
            }
        } else {
            let (_, data) = self.receive_elements(Some(root), TAG_ROW_BLOCK)?;
            self.copy_checked(recv, &data)?;
        }
        self.barrier()
    }

    fn gather_elements(
        &self,
        root: usize,
        send: &[Element],
        recv: Option<&mut [Element]>,
        counts: &[usize],
        offsets: &[usize],
    ) -> Result<(), CommError> {
        if self.rank == root {
            let recv = recv.ok_or(CommError::MissingRootBuffer { rank: self.rank })?;
            let own = &mut recv[offsets[root]..offsets[root] + counts[root]];
            self.copy_checked(own, send)?;

            for _ in 1..self.size {
                let (source, data) = self.receive_elements(None, TAG_RESULT_BLOCK)?;
                debug!("[Rank {}] gathered {} elements from rank {}", self.rank, data.len(), source);
                let slot = &mut recv[offsets[source]..offsets[source] + counts[source]];
                self.copy_checked(slot, &data)?;
            }
        } else {
            self.send(root, TAG_RESULT_BLOCK, Payload::Elements(send.to_vec()))?;
        }
        self.barrier()
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.barrier.wait(self.rank)
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        self.barrier.depart(self.rank);
        for dest in (0..self.size).filter(|&d| d != self.rank) {
            // Peers that already finished have dropped their inbox.
            let _ = self.send(dest, 0, Payload::Departed);
        }
    }
}
