use crossbeam_channel::{unbounded, Receiver, Sender};

use super::comm::{Communicator, Envelope, Mailbox};

/// A `Communicator` for a group of ranks living in one process, one per
/// thread, wired together with crossbeam channels. Mostly useful for tests
/// and for exercising multi-rank protocols on a single machine without
/// opening sockets.
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    mailbox: Mailbox,
}

/// Create a fully-connected group of the given size.
pub fn channel_group(size: usize) -> Vec<ChannelCommunicator> {
    let (sinks, sources): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();

    sources
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| ChannelCommunicator {
            rank,
            peers: sinks.clone(),
            inbox,
            mailbox: Mailbox::new(),
        })
        .collect()
}

impl ChannelCommunicator {
    fn recv_matching(&self, peer: Option<usize>, tag: u32) -> Vec<u8> {
        loop {
            if let Some(data) = self.mailbox.pop_ready(peer, tag) {
                return data;
            }
            let envelope = self.inbox.recv().expect("peer group disconnected");
            self.mailbox.push(envelope);
        }
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, peer: usize, tag: u32, message: Vec<u8>) {
        let envelope = self.mailbox.stamp(self.rank, peer, tag, message);
        self.peers[peer].send(envelope).unwrap()
    }

    fn recv(&self, tag: u32) -> Vec<u8> {
        self.recv_matching(None, tag)
    }

    fn recv_from(&self, peer: usize, tag: u32) -> Vec<u8> {
        self.recv_matching(Some(peer), tag)
    }
}

/// The trivial communicator for a single-process run. Point-to-point
/// operations are protocol violations when there are no peers, and panic.
pub struct NullCommunicator;

impl Communicator for NullCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, peer: usize, _tag: u32, _message: Vec<u8>) {
        panic!("send to rank {} from a single-rank communicator", peer)
    }

    fn recv(&self, tag: u32) -> Vec<u8> {
        panic!("recv on tag {} from a single-rank communicator", tag)
    }

    fn recv_from(&self, peer: usize, _tag: u32) -> Vec<u8> {
        panic!("recv from rank {} on a single-rank communicator", peer)
    }
}
