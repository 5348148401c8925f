use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use log::warn;
use rooknet_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::{
    delta::DeltaCodec,
    error::ProtocolError,
    types::{ConnectionId, SequenceNum},
    wrapping_number::sequence_greater_than,
};

/// Bounds on how much history an unreliable tracker retains per connection.
#[derive(Debug, Clone, Copy)]
pub struct UnreliableHistoryConfig {
    /// Entries older than this are eligible for pruning.
    pub expiry: Duration,
    /// Never prune below this many entries, so a burst of unacknowledged
    /// packets can still find its baseline.
    pub min_keep: usize,
}

impl Default for UnreliableHistoryConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(3),
            min_keep: 8,
        }
    }
}

/// Per-connection delta baselines for one logical value stream carried on
/// an unreliable channel. Packets may be lost or reordered, so every write
/// names the baseline it diffed against: the last sequence the remote
/// acknowledged. Both sides retain a bounded, time-expiring window of
/// sequenced values; a pathological peer that never acknowledges grows the
/// window up to the expiry/min-keep bound, never unbounded.
///
/// One instance models one logical stream per connection. The piggybacked
/// acknowledgment is connection-scoped and the newest ack supersedes any
/// pending one, so running two independent unreliable streams over the
/// same connection is unsupported.
pub struct UnreliableHistory<T> {
    connections: HashMap<ConnectionId, ConnectionHistory<T>>,
    config: UnreliableHistoryConfig,
}

struct ConnectionHistory<T> {
    next_sequence: SequenceNum,
    /// Values we sent, ascending by sequence, awaiting acknowledgment.
    sent: VecDeque<(SequenceNum, T, Instant)>,
    /// The newest value the remote has confirmed decoding: our write baseline.
    acked: Option<(SequenceNum, T)>,
    /// Values we decoded, ascending by arrival, candidate read baselines.
    received: VecDeque<(SequenceNum, T, Instant)>,
    /// Sequence to piggyback on the next outgoing packet. Newest wins.
    pending_ack: Option<SequenceNum>,
}

impl<T> Default for ConnectionHistory<T> {
    fn default() -> Self {
        Self {
            next_sequence: 0,
            sent: VecDeque::new(),
            acked: None,
            received: VecDeque::new(),
            pending_ack: None,
        }
    }
}

impl<T: Clone + Default> UnreliableHistory<T> {
    pub fn new() -> Self {
        Self::with_config(UnreliableHistoryConfig::default())
    }

    pub fn with_config(config: UnreliableHistoryConfig) -> Self {
        Self {
            connections: HashMap::new(),
            config,
        }
    }

    /// Encodes `(acked sequence, this sequence, diff against the acked
    /// value)` and retains the value under its fresh sequence number.
    /// Returns the sequence assigned to this write.
    pub fn write(
        &mut self,
        connection: ConnectionId,
        writer: &mut dyn BitWrite,
        codec: &impl DeltaCodec<T>,
        new: &T,
        now: Instant,
    ) -> SequenceNum {
        let config = self.config;
        let entry = self.connections.entry(connection).or_default();

        let sequence = entry.next_sequence;
        entry.next_sequence = entry.next_sequence.wrapping_add(1);

        match &entry.acked {
            Some((acked_sequence, _)) => {
                writer.write_bit(true);
                acked_sequence.ser(writer);
            }
            None => writer.write_bit(false),
        }
        sequence.ser(writer);

        let zero = T::default();
        let baseline = entry.acked.as_ref().map(|(_, value)| value).unwrap_or(&zero);
        codec.write_delta(writer, baseline, new);

        entry.sent.push_back((sequence, new.clone(), now));
        prune(&mut entry.sent, &config, now);

        sequence
    }

    /// Adopts a remote acknowledgment as the new write baseline. Stale or
    /// unknown (already pruned) sequences are ignored.
    pub fn receive_ack(&mut self, connection: ConnectionId, sequence: SequenceNum) {
        let Some(entry) = self.connections.get_mut(&connection) else {
            return;
        };

        if let Some((current, _)) = &entry.acked {
            if !sequence_greater_than(sequence, *current) {
                return;
            }
        }

        let Some(value) = entry
            .sent
            .iter()
            .find(|(sent_sequence, _, _)| *sent_sequence == sequence)
            .map(|(_, value, _)| value.clone())
        else {
            warn!("ack for unknown sequence {sequence}, ignoring");
            return;
        };

        entry.acked = Some((sequence, value));
        // anything at or before the acked sequence can never be a baseline again
        entry
            .sent
            .retain(|(sent_sequence, _, _)| sequence_greater_than(*sent_sequence, sequence));
    }

    /// Decodes a value against our retained copy of the acked baseline,
    /// retains it under the received sequence, and schedules an
    /// acknowledgment of that sequence.
    pub fn read(
        &mut self,
        connection: ConnectionId,
        reader: &mut BitReader,
        codec: &impl DeltaCodec<T>,
        now: Instant,
    ) -> Result<T, ProtocolError> {
        let config = self.config;
        let entry = self.connections.entry(connection).or_default();

        let acked_sequence = if reader.read_bit()? {
            Some(SequenceNum::de(reader)?)
        } else {
            None
        };
        let sequence = SequenceNum::de(reader)?;

        let zero = T::default();
        let baseline = match acked_sequence {
            None => &zero,
            Some(acked) => entry
                .received
                .iter()
                .find(|(received_sequence, _, _)| *received_sequence == acked)
                .map(|(_, value, _)| value)
                .ok_or(ProtocolError::UnknownBaseline { sequence: acked })?,
        };

        let value = codec.read_delta(reader, baseline)?;

        entry.received.push_back((sequence, value.clone(), now));
        prune(&mut entry.received, &config, now);

        match entry.pending_ack {
            Some(pending) if !sequence_greater_than(sequence, pending) => {}
            _ => entry.pending_ack = Some(sequence),
        }

        Ok(value)
    }

    /// Takes the sequence to piggyback on the next outgoing packet to this
    /// connection, if any.
    pub fn take_pending_ack(&mut self, connection: ConnectionId) -> Option<SequenceNum> {
        self.connections
            .get_mut(&connection)?
            .pending_ack
            .take()
    }

    /// Drops all state for a disconnected endpoint.
    pub fn clear_connection(&mut self, connection: &ConnectionId) {
        self.connections.remove(connection);
    }

    pub fn retained_sent(&self, connection: &ConnectionId) -> usize {
        self.connections
            .get(connection)
            .map(|entry| entry.sent.len())
            .unwrap_or(0)
    }

    pub fn retained_received(&self, connection: &ConnectionId) -> usize {
        self.connections
            .get(connection)
            .map(|entry| entry.received.len())
            .unwrap_or(0)
    }
}

impl<T: Clone + Default> Default for UnreliableHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn prune<T>(
    entries: &mut VecDeque<(SequenceNum, T, Instant)>,
    config: &UnreliableHistoryConfig,
    now: Instant,
) {
    while entries.len() > config.min_keep {
        let Some((_, _, stored_at)) = entries.front() else {
            break;
        };
        if now.duration_since(*stored_at) >= config.expiry {
            entries.pop_front();
        } else {
            break;
        }
    }
}

// Ack piggyback prefix: `{ has_ack, ack_seq }` before each outgoing
// unreliable payload.

pub fn write_ack_prefix(writer: &mut dyn BitWrite, ack: Option<SequenceNum>) {
    ack.ser(writer);
}

pub fn read_ack_prefix(reader: &mut BitReader) -> Result<Option<SequenceNum>, SerdeErr> {
    Option::<SequenceNum>::de(reader)
}
