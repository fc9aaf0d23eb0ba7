use std::io::prelude::*;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

use crossbeam_channel::{unbounded, Sender};

use super::comm::{Communicator, Envelope, Mailbox};

/// A `Communicator` for a group of processes connected over TCP. Each peer
/// binds a listener on its own address; outgoing messages are framed and
/// written by a dedicated sender thread so `send` never blocks on the
/// network. Incoming frames are decoded into envelopes and run through a
/// `Mailbox` so that tag and stream order are restored regardless of the
/// order in which connections are accepted.
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    listener: TcpListener,
    mailbox: Mailbox,
    send_sink: Option<Sender<(usize, Vec<u8>)>>,
    send_thread: Option<thread::JoinHandle<()>>,
}

impl TcpCommunicator {
    pub fn new(rank: usize, peers: Vec<SocketAddr>) -> Self {
        let listener = TcpListener::bind(peers[rank]).unwrap();
        let num_peers = peers.len();
        let (send_sink, send_source) = unbounded::<(usize, Vec<u8>)>();
        let send_thread = thread::spawn(move || {
            for (peer, frame) in send_source {
                let mut stream = connect_with_retry(peers[peer]);
                stream.write_all(&frame.len().to_le_bytes()).unwrap();
                stream.write_all(&frame).unwrap();
            }
        });
        Self {
            rank,
            num_peers,
            listener,
            mailbox: Mailbox::new(),
            send_sink: Some(send_sink),
            send_thread: Some(send_thread),
        }
    }

    fn pull(&self) -> Envelope {
        let (mut stream, _) = self.listener.accept().unwrap();
        let frame = read_frame(&mut stream);
        rmp_serde::from_slice(&frame).expect("malformed message frame")
    }

    fn recv_matching(&self, peer: Option<usize>, tag: u32) -> Vec<u8> {
        loop {
            if let Some(data) = self.mailbox.pop_ready(peer, tag) {
                return data;
            }
            let envelope = self.pull();
            self.mailbox.push(envelope);
        }
    }
}

/// Read one length-prefixed envelope frame off an accepted connection. The
/// sender wrote the payload size as a little-endian word ahead of the
/// MessagePack bytes; short reads are drained until the frame is whole.
fn read_frame<R: Read>(stream: &mut R) -> Vec<u8> {
    let mut header = [0; std::mem::size_of::<usize>()];
    read_exact_loop(stream, &mut header);
    let mut frame = vec![0; usize::from_le_bytes(header)];
    read_exact_loop(stream, &mut frame);
    frame
}

fn read_exact_loop<R: Read>(stream: &mut R, buffer: &mut [u8]) {
    let mut cursor = 0;
    while cursor < buffer.len() {
        cursor += stream.read(&mut buffer[cursor..]).unwrap();
    }
}

/// The peer's listener may come up later than ours; retry briefly rather
/// than failing the whole group on start-up skew.
fn connect_with_retry(addr: SocketAddr) -> TcpStream {
    let mut delay_ms = 1;
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return stream,
            Err(error) => {
                if delay_ms > 4000 {
                    panic!("could not connect to peer {}: {}", addr, error);
                }
                thread::sleep(std::time::Duration::from_millis(delay_ms));
                delay_ms *= 2;
            }
        }
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, peer: usize, tag: u32, message: Vec<u8>) {
        let envelope = self.mailbox.stamp(self.rank, peer, tag, message);
        let frame = rmp_serde::to_vec(&envelope).expect("failed to serialize message");
        self.send_sink.as_ref().unwrap().send((peer, frame)).unwrap()
    }

    fn recv(&self, tag: u32) -> Vec<u8> {
        self.recv_matching(None, tag)
    }

    fn recv_from(&self, peer: usize, tag: u32) -> Vec<u8> {
        self.recv_matching(Some(peer), tag)
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.send_sink.take().unwrap();
        self.send_thread.take().unwrap().join().unwrap();
    }
}
