//! Per-peer reliability state: sequence numbers, selective acks,
//! duplicate suppression and retransmission scheduling.
//!
//! Sequence numbers are 16-bit and wrap; all comparisons use signed
//! circular distance. `ack_bits` covers the 32 sequences preceding
//! `remote_seq`: bit *i* set means `remote_seq - (i + 1)` was received.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Retransmit a reliable packet when it has been unacked this long.
pub const RETRANSMIT_AFTER: Duration = Duration::from_millis(100);
/// Give up (and treat the peer as gone) after this many retries.
pub const MAX_RETRIES: u32 = 15;

/// Signed circular distance `a - b` over the 16-bit sequence space.
fn seq_distance(a: u16, b: u16) -> i32 {
    let diff = a.wrapping_sub(b);
    if diff < 0x8000 {
        diff as i32
    } else {
        diff as i32 - 0x10000
    }
}

// ---------------------------------------------------------------------------
// Delivery decision
// ---------------------------------------------------------------------------

/// Outcome of receiving a sequenced packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First sighting; deliver to the application.
    Accept,
    /// Already seen (or too old to tell); drop silently.
    Duplicate,
}

// ---------------------------------------------------------------------------
// Pending reliable packet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Pending {
    bytes: Vec<u8>,
    last_sent: Instant,
    retries: u32,
}

// ---------------------------------------------------------------------------
// ReliableEndpoint
// ---------------------------------------------------------------------------

/// One peer's view of the sequenced UDP conversation.
#[derive(Debug)]
pub struct ReliableEndpoint {
    /// Next sequence number to stamp on an outbound packet.
    local_seq: u16,
    /// Highest sequence received from the peer.
    remote_seq: u16,
    /// Selective ack window for the 32 sequences before `remote_seq`.
    ack_bits: u32,
    /// True once the first packet has been received; the very first
    /// sequence must not be judged against the zero-initialised window.
    synced: bool,
    /// Reliable packets awaiting acknowledgement, keyed by sequence.
    unacked: HashMap<u16, Pending>,
}

impl Default for ReliableEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliableEndpoint {
    pub fn new() -> Self {
        Self {
            local_seq: 0,
            remote_seq: 0,
            ack_bits: 0,
            synced: false,
            unacked: HashMap::new(),
        }
    }

    // -- sending ------------------------------------------------------------

    /// Allocate the next outbound sequence number.
    pub fn next_seq(&mut self) -> u16 {
        self.local_seq = self.local_seq.wrapping_add(1);
        self.local_seq
    }

    /// The `ack` / `ack_bits` pair to stamp on outbound packets.
    pub fn ack_fields(&self) -> (u16, u32) {
        (self.remote_seq, self.ack_bits)
    }

    /// Remember a reliable packet until the peer acknowledges it.
    pub fn track(&mut self, seq: u16, bytes: Vec<u8>, now: Instant) {
        self.unacked.insert(
            seq,
            Pending {
                bytes,
                last_sent: now,
                retries: 0,
            },
        );
    }

    /// Number of reliable packets still awaiting an ack.
    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    // -- receiving ----------------------------------------------------------

    /// Judge an incoming sequence number and advance the ack window.
    ///
    /// New sequences shift the window forward; sequences within the 32-wide
    /// window behind `remote_seq` are marked and deduplicated; anything
    /// older is dropped as a duplicate.
    pub fn on_receive_seq(&mut self, seq: u16) -> Delivery {
        if !self.synced {
            self.synced = true;
            self.remote_seq = seq;
            self.ack_bits = 0;
            return Delivery::Accept;
        }

        let distance = seq_distance(seq, self.remote_seq);
        if distance == 0 {
            return Delivery::Duplicate;
        }
        if distance > 0 {
            // Newer than anything seen: shift the window so bit 0 lands on
            // the previous remote_seq.
            let shift = distance as u32;
            if shift < 32 {
                self.ack_bits <<= shift;
                self.ack_bits |= 1 << (shift - 1);
            } else {
                self.ack_bits = 0;
            }
            self.remote_seq = seq;
            return Delivery::Accept;
        }

        // Behind the head: inside the window it may still be new.
        let behind = (-distance) as u32;
        if behind <= 32 {
            let bit = 1u32 << (behind - 1);
            if self.ack_bits & bit != 0 {
                return Delivery::Duplicate;
            }
            self.ack_bits |= bit;
            Delivery::Accept
        } else {
            // Too old to track; assume already delivered.
            Delivery::Duplicate
        }
    }

    /// Release everything the peer acknowledges: `ack` itself plus every
    /// `ack - (i + 1)` whose bit is set.
    pub fn on_ack(&mut self, ack: u16, ack_bits: u32) {
        self.unacked.remove(&ack);
        for i in 0..32u16 {
            if ack_bits & (1 << i) != 0 {
                self.unacked.remove(&ack.wrapping_sub(i + 1));
            }
        }
    }

    /// Whether a given outbound sequence is still unacked.
    pub fn is_unacked(&self, seq: u16) -> bool {
        self.unacked.contains_key(&seq)
    }

    // -- retransmission -----------------------------------------------------

    /// Collect packets due for retransmission, bumping their retry counts.
    /// Packets past [`MAX_RETRIES`] are dropped and their sequences
    /// returned in `exhausted`; the caller treats that as a peer timeout.
    pub fn due_for_retransmit(&mut self, now: Instant) -> Retransmit {
        let mut send = Vec::new();
        let mut exhausted = Vec::new();
        for (&seq, pending) in &mut self.unacked {
            if now.duration_since(pending.last_sent) < RETRANSMIT_AFTER {
                continue;
            }
            if pending.retries >= MAX_RETRIES {
                exhausted.push(seq);
            } else {
                pending.last_sent = now;
                pending.retries += 1;
                send.push((seq, pending.bytes.clone()));
            }
        }
        for seq in &exhausted {
            self.unacked.remove(seq);
        }
        // Deterministic resend order regardless of map iteration.
        send.sort_by_key(|(seq, _)| *seq);
        Retransmit { send, exhausted }
    }

    /// Peer's highest received sequence (what we acknowledge back).
    pub fn remote_seq(&self) -> u16 {
        self.remote_seq
    }
}

/// Result of a retransmission sweep.
#[derive(Debug, Default)]
pub struct Retransmit {
    /// `(seq, packet)` pairs to put back on the wire.
    pub send: Vec<(u16, Vec<u8>)>,
    /// Sequences that exhausted their retries.
    pub exhausted: Vec<u16>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_packet_is_accepted_and_sets_head() {
        let mut ep = ReliableEndpoint::new();
        assert_eq!(ep.on_receive_seq(42), Delivery::Accept);
        assert_eq!(ep.remote_seq(), 42);
        assert_eq!(ep.ack_fields(), (42, 0));
    }

    #[test]
    fn duplicate_of_head_is_dropped() {
        let mut ep = ReliableEndpoint::new();
        ep.on_receive_seq(42);
        assert_eq!(ep.on_receive_seq(42), Delivery::Duplicate);
    }

    #[test]
    fn forward_shift_records_previous_head() {
        let mut ep = ReliableEndpoint::new();
        ep.on_receive_seq(10);
        assert_eq!(ep.on_receive_seq(11), Delivery::Accept);
        // Bit 0 must correspond to the previous remote_seq (ack
        // monotonicity invariant).
        assert_eq!(ep.ack_fields(), (11, 0b1));

        assert_eq!(ep.on_receive_seq(14), Delivery::Accept);
        // 13 and 12 missing, 11 and 10 received.
        assert_eq!(ep.ack_fields(), (14, 0b1100));
    }

    #[test]
    fn late_arrival_inside_window_accepted_once() {
        let mut ep = ReliableEndpoint::new();
        ep.on_receive_seq(10);
        ep.on_receive_seq(14);
        assert_eq!(ep.on_receive_seq(12), Delivery::Accept);
        assert_eq!(ep.on_receive_seq(12), Delivery::Duplicate);
        assert_eq!(ep.ack_fields(), (14, 0b1010));
    }

    #[test]
    fn ancient_sequence_is_duplicate() {
        let mut ep = ReliableEndpoint::new();
        ep.on_receive_seq(100);
        assert_eq!(ep.on_receive_seq(40), Delivery::Duplicate);
    }

    #[test]
    fn wraparound_is_forward() {
        let mut ep = ReliableEndpoint::new();
        ep.on_receive_seq(u16::MAX);
        assert_eq!(ep.on_receive_seq(0), Delivery::Accept);
        assert_eq!(ep.remote_seq(), 0);
        assert_eq!(ep.ack_fields(), (0, 0b1));

        // And the old head is now "one behind".
        assert_eq!(ep.on_receive_seq(u16::MAX), Delivery::Duplicate);
    }

    #[test]
    fn jump_beyond_window_clears_bits() {
        let mut ep = ReliableEndpoint::new();
        ep.on_receive_seq(1);
        ep.on_receive_seq(2);
        assert_eq!(ep.on_receive_seq(100), Delivery::Accept);
        assert_eq!(ep.ack_fields(), (100, 0));
    }

    #[test]
    fn ack_releases_tracked_packets() {
        let mut ep = ReliableEndpoint::new();
        let now = Instant::now();
        for seq in [5u16, 6, 7] {
            ep.track(seq, vec![seq as u8], now);
        }
        assert_eq!(ep.unacked_len(), 3);

        // ack=7 with bit 1 set acknowledges 7 and 5 (7 - 2).
        ep.on_ack(7, 0b10);
        assert!(!ep.is_unacked(7));
        assert!(!ep.is_unacked(5));
        assert!(ep.is_unacked(6));
    }

    #[test]
    fn retransmission_scenario() {
        // Server sends seq=7 reliable; client acks 5 only. After 100 ms the
        // packet is retransmitted; after the ack, it never goes out again.
        let mut ep = ReliableEndpoint::new();
        let t0 = Instant::now();
        let seq = ep.next_seq(); // 1
        ep.track(seq, vec![0xAB], t0);

        let sweep = ep.due_for_retransmit(t0 + Duration::from_millis(150));
        assert_eq!(sweep.send.len(), 1);
        assert!(sweep.exhausted.is_empty());

        ep.on_ack(seq, 0);
        let sweep = ep.due_for_retransmit(t0 + Duration::from_millis(400));
        assert!(sweep.send.is_empty());
        assert_eq!(ep.unacked_len(), 0);
    }

    #[test]
    fn retries_exhaust_after_limit() {
        let mut ep = ReliableEndpoint::new();
        let t0 = Instant::now();
        ep.track(1, vec![1], t0);

        let mut exhausted = Vec::new();
        for round in 1..=(MAX_RETRIES + 1) {
            let at = t0 + Duration::from_millis(150 * round as u64);
            let sweep = ep.due_for_retransmit(at);
            exhausted.extend(sweep.exhausted);
        }
        assert_eq!(exhausted, vec![1]);
        assert_eq!(ep.unacked_len(), 0);
    }

    #[test]
    fn local_seq_increments_and_wraps() {
        let mut ep = ReliableEndpoint::new();
        assert_eq!(ep.next_seq(), 1);
        assert_eq!(ep.next_seq(), 2);
        ep.local_seq = u16::MAX;
        assert_eq!(ep.next_seq(), 0);
    }
}
