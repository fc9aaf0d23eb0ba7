use std::collections::VecDeque;

use crate::message::comm::Communicator;

/// Message tags for the point-to-point streams that cross a partition
/// boundary. Tag zero is reserved for collectives.
pub mod send_id {
    pub const PARTITION: u32 = 1;
    pub const RADIATION: u32 = 2;
    pub const THERMO: u32 = 3;
}

/**
 * Synchronous neighbour exchange along the decomposition axis, plus the
 * collective reductions the integrators need. Scalars destined for a peer
 * are staged in a send queue, shipped as one message, and drained from the
 * matching receive queue on the other side in the order they were added.
 */
pub struct PartitionExchange {
    comm: Box<dyn Communicator>,
    send_queue: Vec<f64>,
    recv_queue: VecDeque<f64>,
}




// ============================================================================
impl PartitionExchange {

    pub fn new(comm: Box<dyn Communicator>) -> Self {
        Self {
            comm,
            send_queue: Vec::new(),
            recv_queue: VecDeque::new(),
        }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn n_processors(&self) -> usize {
        self.comm.size()
    }

    /// Stage one scalar for the next `send_data` call.
    pub fn add_send_item(&mut self, value: f64) {
        self.send_queue.push(value);
    }

    /// Drain one scalar from the last `recv_data` call.
    pub fn get_recv_item(&mut self) -> f64 {
        self.recv_queue
            .pop_front()
            .expect("partition receive queue underflow")
    }

    pub fn reset_buffer(&mut self) {
        self.send_queue.clear();
        self.recv_queue.clear();
    }

    /// Ship the staged queue to a neighbour rank. Blocks only to enqueue on
    /// the transport, never on the matching receive.
    pub fn send_data(&mut self, peer: usize, tag: u32) {
        let payload = rmp_serde::to_vec(&self.send_queue).expect("failed to serialize payload");
        self.comm.send(peer, tag, payload);
        self.send_queue.clear();
    }

    /// Block until the matching message from the given neighbour arrives,
    /// then append its items to the receive queue.
    pub fn recv_data(&mut self, peer: usize, tag: u32) {
        let payload = self.comm.recv_from(peer, tag);
        let items: Vec<f64> = rmp_serde::from_slice(&payload).expect("malformed payload");
        self.recv_queue.extend(items);
    }

    /// Collective minimum across all ranks.
    pub fn minimum(&self, value: f64) -> f64 {
        self.fold(value, &|a, b| a.min(b))
    }

    /// Collective sum across all ranks.
    pub fn sum(&self, value: f64) -> f64 {
        self.fold(value, &|a, b| a + b)
    }

    fn fold(&self, value: f64, op: &dyn Fn(f64, f64) -> f64) -> f64 {
        let combine = move |a: Vec<u8>, b: Vec<u8>| {
            let x: f64 = rmp_serde::from_slice(&a).expect("malformed reduction operand");
            let y: f64 = rmp_serde::from_slice(&b).expect("malformed reduction operand");
            rmp_serde::to_vec(&op(x, y)).unwrap()
        };
        let value = rmp_serde::to_vec(&value).unwrap();
        rmp_serde::from_slice(&self.comm.all_reduce(&combine, value)).unwrap()
    }

    pub fn barrier(&self) {
        self.comm.barrier();
    }

    /// Execute `f` on every rank in rank order, with barriers in between.
    /// Used for IO against a shared file.
    pub fn serial<F: FnMut()>(&self, mut f: F) {
        for rank in 0..self.comm.size() {
            if rank == self.comm.rank() {
                f();
            }
            self.comm.barrier();
        }
    }
}
