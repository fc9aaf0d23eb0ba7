use std::collections::HashMap;
use std::sync::Mutex;

/// Reserved tag for the collective operations provided by the trait. User
/// code must send point-to-point traffic on tags greater than this one.
pub const COLLECTIVE: u32 = 0;

/// Number of rounds a binomial tree needs to span `p` ranks; each round
/// doubles the subtree size, so this is the log of the next power of two.
fn tree_rounds(p: usize) -> usize {
    let mut n = 0;
    while 1 << n < p {
        n += 1
    }
    n
}

/// A tagged, sequenced message between two ranks. Sequencing is per
/// `(sender, tag)` stream, so a receiver can restore sender order even when
/// the transport reorders deliveries, and a message belonging to a later
/// phase of the protocol can be held back until the local rank catches up.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    pub from: usize,
    pub tag: u32,
    pub seq: u64,
    pub data: Vec<u8>,
}

/// Interface for a group of processes that can exchange messages over a
/// network. The underlying transport can in principle be TCP, UDP, shared
/// memory, or a higher level abstraction like MPI.
///
pub trait Communicator: Send {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peer processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted.
    fn send(&self, peer: usize, tag: u32, message: Vec<u8>);

    /// Must be implemented to receive the next in-order message carrying the
    /// given tag, from any peer. This method is allowed to block until such
    /// a message is ready; messages with other tags, or arriving ahead of
    /// their stream order, must be held back rather than dropped.
    fn recv(&self, tag: u32) -> Vec<u8>;

    /// Must be implemented to receive the next in-order message carrying the
    /// given tag from one specific peer.
    fn recv_from(&self, peer: usize, tag: u32) -> Vec<u8>;

    /// Implements a binomial tree broadcast from the root rank. The message
    /// buffer must be `Some` if this is the root rank, and it must be `None`
    /// otherwise.
    ///
    fn broadcast(&self, value: Option<Vec<u8>>) -> Vec<u8> {
        let r = self.rank();
        let p = self.size();

        let value = match value {
            Some(value) => value,
            None => self.recv(COLLECTIVE),
        };
        for level in (0..tree_rounds(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, COLLECTIVE, value.clone())
            }
        }
        value
    }

    /// Implements a binomial tree reduce over a commutative binary operator.
    /// All ranks return `None` except for the root.
    ///
    fn reduce(&self, f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>, mut value: Vec<u8>) -> Option<Vec<u8>> {
        let r = self.rank();
        let p = self.size();

        for level in 0..tree_rounds(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv(COLLECTIVE))
                }
            } else {
                self.send(r - one, COLLECTIVE, value);
                return None;
            }
        }
        Some(value)
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce(&self, f: &dyn Fn(Vec<u8>, Vec<u8>) -> Vec<u8>, value: Vec<u8>) -> Vec<u8> {
        self.broadcast(self.reduce(f, value))
    }

    /// All ranks wait until every rank has arrived.
    fn barrier(&self) {
        self.all_reduce(&|a, _| a, Vec::new());
    }
}

/// Shared receive-side bookkeeping for transport implementations: a stash of
/// messages that arrived out of turn, and the per-stream sequence counters.
/// A message is ready for delivery only when its sequence number matches the
/// next expected number of its `(sender, tag)` stream, which restores sender
/// order across an unordered transport.
pub struct Mailbox {
    stash: Mutex<Vec<Envelope>>,
    next_recv: Mutex<HashMap<(usize, u32), u64>>,
    next_send: Mutex<HashMap<(usize, u32), u64>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            stash: Mutex::new(Vec::new()),
            next_recv: Mutex::new(HashMap::new()),
            next_send: Mutex::new(HashMap::new()),
        }
    }

    /// Stamp an outgoing message with the next sequence number of its
    /// `(peer, tag)` stream.
    pub fn stamp(&self, from: usize, peer: usize, tag: u32, data: Vec<u8>) -> Envelope {
        let mut next = self.next_send.lock().unwrap();
        let seq = next.entry((peer, tag)).or_insert(0);
        let envelope = Envelope { from, tag, seq: *seq, data };
        *seq += 1;
        envelope
    }

    pub fn push(&self, envelope: Envelope) {
        self.stash.lock().unwrap().push(envelope);
    }

    /// Remove and return a stashed message that matches the tag, the peer
    /// filter, and its stream's next expected sequence number.
    pub fn pop_ready(&self, peer: Option<usize>, tag: u32) -> Option<Vec<u8>> {
        let mut stash = self.stash.lock().unwrap();
        let mut next = self.next_recv.lock().unwrap();

        let position = stash.iter().position(|env| {
            env.tag == tag
                && peer.map_or(true, |p| env.from == p)
                && *next.get(&(env.from, env.tag)).unwrap_or(&0) == env.seq
        })?;
        let envelope = stash.remove(position);
        *next.entry((envelope.from, envelope.tag)).or_insert(0) += 1;
        Some(envelope.data)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
