//! Shared harness for the cross-crate tests
//!
//! [`transfer`] runs an initiator on the calling thread and a responder on a
//! spawned thread, connected by an in-memory [`FaultConfig`] link. The
//! initiator's channel is kept open until the responder has returned, so a
//! responder that outlives the initiator never sees a closed peer.

use arq_io::{pair, FaultConfig, LinkHandle, MemoryChannel};
use arq_protocol::{Datagram, SeqNumber};
use std::thread;

/// Result of one two-sided run
pub struct Transfer<S, R> {
    pub initiator: S,
    pub responder: R,
    pub link: LinkHandle,
}

/// Run `initiator` and `responder` against each other over a faulty link
pub fn transfer<S, R, FS, FR>(faults: FaultConfig, initiator: FS, responder: FR) -> Transfer<S, R>
where
    FS: FnOnce(&mut MemoryChannel) -> S,
    FR: FnOnce(&mut MemoryChannel) -> R + Send + 'static,
    R: Send + 'static,
{
    let (mut near, mut far) = pair(faults);
    let link = near.handle();

    let server = thread::Builder::new()
        .name("responder".to_string())
        .spawn(move || responder(&mut far))
        .expect("failed to spawn responder thread");

    let initiator = initiator(&mut near);
    let responder = server.join().expect("responder thread panicked");
    drop(near);

    Transfer {
        initiator,
        responder,
        link,
    }
}

/// Sequence numbers of the segments in a datagram list, in order
pub fn segment_seqs(datagrams: &[Datagram]) -> Vec<u32> {
    datagrams
        .iter()
        .filter_map(|d| match d {
            Datagram::Segment(segment) => Some(segment.seq_number().as_raw()),
            Datagram::Ack(_) => None,
        })
        .collect()
}

/// Acknowledgment values in a datagram list, in order
pub fn ack_seqs(datagrams: &[Datagram]) -> Vec<u32> {
    datagrams
        .iter()
        .filter_map(|d| match d {
            Datagram::Ack(ack) => Some(ack.seq_number().as_raw()),
            Datagram::Segment(_) => None,
        })
        .collect()
}

/// Check that `seqs` is exactly `0..count` in order
pub fn is_in_order(seqs: &[SeqNumber], count: u32) -> bool {
    seqs.len() == count as usize
        && seqs
            .iter()
            .zip(0..count)
            .all(|(seq, expected)| seq.as_raw() == expected)
}
