//! Message-passing substrate.
//!
//! [`Communicator`] is the boundary between the simulation and whatever moves
//! bytes between ranks. Point-to-point messages are matched on `(source, tag)`
//! and delivered in send order per source, like MPI's non-overtaking rule. The
//! collectives have default implementations on top of point-to-point, so a
//! backend only needs to supply send, receive and a barrier.
//!
//! [`ThreadComm`] runs every rank as an OS thread with one unbounded channel per
//! ordered pair of ranks and a shared barrier that breaks when a rank leaves.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::CellPoint;

/// Message tag used to match sends with receives.
pub type Tag = u32;

/// Tag for the per-tick point count gather.
pub const TAG_GATHER_COUNT: Tag = 0x100;
/// Tag for the per-tick point list gather.
pub const TAG_GATHER_POINTS: Tag = 0x101;

/// Message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Halo wall, corners included.
    Wall(Vec<bool>),
    /// Single count for the count gather.
    Count(usize),
    /// Live-cell coordinates for the variable-length gather.
    Points(Vec<CellPoint>),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Wall(_) => "wall",
            Payload::Count(_) => "count",
            Payload::Points(_) => "points",
        }
    }

    pub fn into_wall(self, source: usize) -> Result<Vec<bool>, CommError> {
        match self {
            Payload::Wall(wall) => Ok(wall),
            other => Err(CommError::UnexpectedPayload {
                peer: source,
                expected: "wall",
                actual: other.kind(),
            }),
        }
    }

    pub fn into_count(self, source: usize) -> Result<usize, CommError> {
        match self {
            Payload::Count(count) => Ok(count),
            other => Err(CommError::UnexpectedPayload {
                peer: source,
                expected: "count",
                actual: other.kind(),
            }),
        }
    }

    pub fn into_points(self, source: usize) -> Result<Vec<CellPoint>, CommError> {
        match self {
            Payload::Points(points) => Ok(points),
            other => Err(CommError::UnexpectedPayload {
                peer: source,
                expected: "points",
                actual: other.kind(),
            }),
        }
    }
}

/// A message in flight.
#[derive(Debug)]
pub struct Envelope {
    pub source: usize,
    pub tag: Tag,
    pub payload: Payload,
}

/// Substrate failures. All of them are fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    #[error("Rank {rank} is outside a communicator of {size} ranks")]
    InvalidRank { rank: usize, size: usize },
    #[error("Rank {peer} hung up")]
    Disconnected { peer: usize },
    #[error("Expected {expected} payload from rank {peer}, got {actual}")]
    UnexpectedPayload {
        peer: usize,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Rank {peer} sent {actual} points, expected {expected}")]
    CountMismatch {
        peer: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Barrier broken: a rank left the run")]
    BarrierBroken,
    #[error("No message from self with tag {tag:#x}")]
    NoSelfMessage { tag: Tag },
    #[error("Gather root needs a receive layout")]
    MissingLayout,
    #[error("Receive layout does not fit: {0}")]
    BadLayout(String),
}

/// Outstanding non-blocking operation, completed by [`Communicator::wait`].
#[must_use = "requests must be waited on"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Send { dest: usize, tag: Tag },
    Recv { source: usize, tag: Tag },
}

/// Receive side of a variable-length gather, only meaningful on the root.
pub struct GatherLayout<'a> {
    /// Contiguous destination for every rank's points.
    pub buffer: &'a mut [CellPoint],
    /// Points expected from each rank.
    pub counts: &'a [usize],
    /// Start of each rank's slice within `buffer`.
    pub offsets: &'a [usize],
}

impl GatherLayout<'_> {
    fn check(&self, size: usize) -> Result<(), CommError> {
        if self.counts.len() != size || self.offsets.len() != size {
            return Err(CommError::BadLayout(format!(
                "{} counts and {} offsets for {} ranks",
                self.counts.len(),
                self.offsets.len(),
                size
            )));
        }
        for (rank, (&count, &offset)) in self.counts.iter().zip(self.offsets).enumerate() {
            if offset + count > self.buffer.len() {
                return Err(CommError::BadLayout(format!(
                    "rank {} needs [{}, {}) in a buffer of {}",
                    rank,
                    offset,
                    offset + count,
                    self.buffer.len()
                )));
            }
        }
        Ok(())
    }
}

/// Point-to-point and collective operations between ranks.
pub trait Communicator {
    /// This endpoint's rank.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Post a send. The payload is owned by the substrate from here on.
    fn isend(&self, dest: usize, tag: Tag, payload: Payload) -> Result<Request, CommError>;

    /// Post a receive matching `(source, tag)`.
    fn irecv(&self, source: usize, tag: Tag) -> Result<Request, CommError>;

    /// Block until `request` completes. Receives yield their payload.
    fn wait(&self, request: Request) -> Result<Option<Payload>, CommError>;

    /// Block until every rank has reached the barrier. Fails once any rank has left.
    fn barrier(&self) -> Result<(), CommError>;

    /// Wait on several requests, returning results in request order.
    fn wait_all(&self, requests: Vec<Request>) -> Result<Vec<Option<Payload>>, CommError> {
        requests.into_iter().map(|r| self.wait(r)).collect()
    }

    /// Blocking send.
    fn send(&self, dest: usize, tag: Tag, payload: Payload) -> Result<(), CommError> {
        let request = self.isend(dest, tag, payload)?;
        self.wait(request).map(|_| ())
    }

    /// Blocking receive.
    fn recv(&self, source: usize, tag: Tag) -> Result<Payload, CommError> {
        let request = self.irecv(source, tag)?;
        self.wait(request)?
            .ok_or(CommError::Disconnected { peer: source })
    }

    /// Gather one value per rank on `root`. Returns the values, indexed by rank,
    /// on the root and `None` elsewhere.
    fn gather_count(&self, root: usize, count: usize) -> Result<Option<Vec<usize>>, CommError> {
        if self.rank() != root {
            self.send(root, TAG_GATHER_COUNT, Payload::Count(count))?;
            return Ok(None);
        }
        let mut counts = Vec::with_capacity(self.size());
        for source in 0..self.size() {
            if source == root {
                counts.push(count);
            } else {
                counts.push(self.recv(source, TAG_GATHER_COUNT)?.into_count(source)?);
            }
        }
        Ok(Some(counts))
    }

    /// Variable-length gather of every rank's points into the root's buffer.
    ///
    /// The root passes a layout with per-rank counts and offsets; other ranks pass
    /// `None`.
    fn gather_points(
        &self,
        root: usize,
        points: &[CellPoint],
        layout: Option<GatherLayout<'_>>,
    ) -> Result<(), CommError> {
        if self.rank() != root {
            return self.send(root, TAG_GATHER_POINTS, Payload::Points(points.to_vec()));
        }
        let layout = layout.ok_or(CommError::MissingLayout)?;
        layout.check(self.size())?;

        for source in 0..self.size() {
            let received;
            let slice = if source == root {
                points
            } else {
                received = self.recv(source, TAG_GATHER_POINTS)?.into_points(source)?;
                &received[..]
            };
            let expected = layout.counts[source];
            if slice.len() != expected {
                return Err(CommError::CountMismatch {
                    peer: source,
                    expected,
                    actual: slice.len(),
                });
            }
            let offset = layout.offsets[source];
            layout.buffer[offset..offset + expected].copy_from_slice(slice);
        }
        Ok(())
    }
}

/// Barrier that reports failure instead of waiting forever once a rank has left.
#[derive(Debug)]
struct MeshBarrier {
    size: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
}

impl MeshBarrier {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self) -> Result<(), CommError> {
        let mut state = self.lock();
        if state.broken {
            return Err(CommError::BarrierBroken);
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(());
        }
        while state.generation == generation && !state.broken {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        // A release that happened before the break still counts.
        if state.generation != generation {
            Ok(())
        } else {
            Err(CommError::BarrierBroken)
        }
    }

    /// Mark the barrier unusable and wake every waiter.
    fn abandon(&self) {
        self.lock().broken = true;
        self.released.notify_all();
    }
}

/// In-process substrate: one endpoint per rank, each owned by its own thread.
///
/// Every ordered pair of ranks has its own channel, so a receive blocks only on the
/// peer it names and fails with [`CommError::Disconnected`] once that peer's
/// endpoint is dropped. Sends to self go straight to the local queue. Dropping an
/// endpoint also breaks the barrier for everyone else.
pub struct ThreadComm {
    rank: usize,
    /// Sender into each peer's inbox, `None` at this rank.
    outboxes: Vec<Option<Sender<Envelope>>>,
    /// Inbox per source rank, `None` at this rank.
    inboxes: Vec<Option<Receiver<Envelope>>>,
    /// Arrived messages not yet matched by a receive.
    unexpected: RefCell<VecDeque<Envelope>>,
    barrier: Arc<MeshBarrier>,
}

impl ThreadComm {
    /// Create connected endpoints for `size` ranks, indexed by rank.
    pub fn create(size: usize) -> Vec<ThreadComm> {
        let barrier = Arc::new(MeshBarrier::new(size));
        let mut outboxes: Vec<Vec<Option<Sender<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for source in 0..size {
            for dest in (0..size).filter(|&dest| dest != source) {
                let (tx, rx) = mpsc::channel();
                outboxes[source][dest] = Some(tx);
                inboxes[dest][source] = Some(rx);
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| ThreadComm {
                rank,
                outboxes,
                inboxes,
                unexpected: RefCell::new(VecDeque::new()),
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }

    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank < self.outboxes.len() {
            Ok(())
        } else {
            Err(CommError::InvalidRank {
                rank,
                size: self.outboxes.len(),
            })
        }
    }

    fn take_unexpected(&self, source: usize, tag: Tag) -> Option<Payload> {
        let mut queue = self.unexpected.borrow_mut();
        let pos = queue
            .iter()
            .position(|e| e.source == source && e.tag == tag)?;
        queue.remove(pos).map(|e| e.payload)
    }

    fn match_incoming(&self, source: usize, tag: Tag) -> Result<Payload, CommError> {
        if let Some(payload) = self.take_unexpected(source, tag) {
            return Ok(payload);
        }
        let Some(inbox) = &self.inboxes[source] else {
            // Self-sends are queued synchronously, so nothing more can arrive.
            return Err(CommError::NoSelfMessage { tag });
        };
        loop {
            let envelope = inbox
                .recv()
                .map_err(|_| CommError::Disconnected { peer: source })?;
            if envelope.tag == tag {
                return Ok(envelope.payload);
            }
            log::trace!(
                "rank {}: queueing tag {:#x} from {} while waiting for tag {:#x}",
                self.rank,
                envelope.tag,
                source,
                tag
            );
            self.unexpected.borrow_mut().push_back(envelope);
        }
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        self.barrier.abandon();
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn isend(&self, dest: usize, tag: Tag, payload: Payload) -> Result<Request, CommError> {
        self.check_rank(dest)?;
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload,
        };
        match &self.outboxes[dest] {
            // Unbounded channel: the send completes as soon as it is queued.
            Some(outbox) => outbox
                .send(envelope)
                .map_err(|_| CommError::Disconnected { peer: dest })?,
            None => self.unexpected.borrow_mut().push_back(envelope),
        }
        Ok(Request::Send { dest, tag })
    }

    fn irecv(&self, source: usize, tag: Tag) -> Result<Request, CommError> {
        self.check_rank(source)?;
        Ok(Request::Recv { source, tag })
    }

    fn wait(&self, request: Request) -> Result<Option<Payload>, CommError> {
        match request {
            Request::Send { .. } => Ok(None),
            Request::Recv { source, tag } => self.match_incoming(source, tag).map(Some),
        }
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.barrier.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_self_send_matches_by_tag() {
        let comm = ThreadComm::create(1).pop().unwrap();
        comm.send(0, 7, Payload::Count(1)).unwrap();
        comm.send(0, 9, Payload::Count(2)).unwrap();

        // Receive out of send order; the tag 7 message waits in the unexpected queue.
        assert_eq!(comm.recv(0, 9).unwrap(), Payload::Count(2));
        assert_eq!(comm.recv(0, 7).unwrap(), Payload::Count(1));
    }

    #[test]
    fn test_same_tag_is_fifo() {
        let comm = ThreadComm::create(1).pop().unwrap();
        for i in 0..3 {
            comm.send(0, 1, Payload::Count(i)).unwrap();
        }
        for i in 0..3 {
            assert_eq!(comm.recv(0, 1).unwrap().into_count(0).unwrap(), i);
        }
    }

    #[test]
    fn test_invalid_rank() {
        let comm = ThreadComm::create(2).remove(0);
        assert!(matches!(
            comm.isend(2, 0, Payload::Count(0)),
            Err(CommError::InvalidRank { rank: 2, size: 2 })
        ));
        assert!(comm.irecv(5, 0).is_err());
    }

    #[test]
    fn test_wrong_payload_kind() {
        let err = Payload::Count(3).into_wall(4).unwrap_err();
        assert!(matches!(
            err,
            CommError::UnexpectedPayload {
                peer: 4,
                expected: "wall",
                actual: "count"
            }
        ));
    }

    #[test]
    fn test_gather_count_and_points() {
        let comms = ThreadComm::create(3);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let rank = comm.rank();
                        let points: Vec<CellPoint> = (0..rank)
                            .map(|i| CellPoint::new(0, rank, i))
                            .collect();
                        let counts = comm.gather_count(0, points.len()).unwrap();

                        let mut buffer = Vec::new();
                        let layout = counts.as_ref().map(|counts| {
                            let offsets: Vec<usize> = counts
                                .iter()
                                .scan(0, |acc, &c| {
                                    let start = *acc;
                                    *acc += c;
                                    Some(start)
                                })
                                .collect();
                            buffer = vec![CellPoint::default(); counts.iter().sum()];
                            offsets
                        });
                        match (&counts, &layout) {
                            (Some(counts), Some(offsets)) => comm
                                .gather_points(
                                    0,
                                    &points,
                                    Some(GatherLayout {
                                        buffer: &mut buffer,
                                        counts,
                                        offsets,
                                    }),
                                )
                                .unwrap(),
                            _ => comm.gather_points(0, &points, None).unwrap(),
                        }
                        comm.barrier().unwrap();
                        (counts, buffer)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let (counts, buffer) = &results[0];
        assert_eq!(counts.as_deref(), Some(&[0, 1, 2][..]));
        assert_eq!(
            buffer,
            &vec![
                CellPoint::new(0, 1, 0),
                CellPoint::new(0, 2, 0),
                CellPoint::new(0, 2, 1)
            ]
        );
        assert!(results[1].0.is_none());
        assert!(results[2].1.is_empty());
    }

    #[test]
    fn test_gather_root_requires_layout() {
        let comm = ThreadComm::create(1).pop().unwrap();
        assert!(matches!(
            comm.gather_points(0, &[], None),
            Err(CommError::MissingLayout)
        ));
    }

    #[test]
    fn test_gather_rejects_short_buffer() {
        let comm = ThreadComm::create(1).pop().unwrap();
        let points = [CellPoint::new(0, 0, 0)];
        let mut buffer = [];
        let result = comm.gather_points(
            0,
            &points,
            Some(GatherLayout {
                buffer: &mut buffer,
                counts: &[1],
                offsets: &[0],
            }),
        );
        assert!(matches!(result, Err(CommError::BadLayout(_))));
    }

    #[test]
    fn test_recv_from_dropped_peer_fails() {
        let mut comms = ThreadComm::create(2);
        let dropped = comms.pop().unwrap();
        let comm = comms.pop().unwrap();
        dropped.send(0, 5, Payload::Count(8)).unwrap();
        drop(dropped);

        // Messages sent before the hang-up are still delivered.
        assert_eq!(comm.recv(1, 5).unwrap(), Payload::Count(8));
        assert!(matches!(
            comm.recv(1, 5),
            Err(CommError::Disconnected { peer: 1 })
        ));
        assert!(matches!(
            comm.send(1, 5, Payload::Count(0)),
            Err(CommError::Disconnected { peer: 1 })
        ));
    }

    #[test]
    fn test_barrier_breaks_when_a_rank_leaves() {
        let mut comms = ThreadComm::create(3);
        let leaver = comms.pop().unwrap();
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| s.spawn(move || comm.barrier()))
                .collect();
            drop(leaver);
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(CommError::BarrierBroken))));
    }

    #[test]
    fn test_barrier_release_survives_later_drop() {
        let comms = ThreadComm::create(2);
        thread::scope(|s| {
            for comm in comms {
                s.spawn(move || {
                    comm.barrier().unwrap();
                    comm.barrier().unwrap();
                });
            }
        });
    }

    #[test]
    fn test_self_recv_without_send() {
        let comm = ThreadComm::create(1).pop().unwrap();
        assert!(matches!(
            comm.recv(0, 3),
            Err(CommError::NoSelfMessage { tag: 3 })
        ));
    }
}

