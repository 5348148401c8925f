use std::collections::HashMap;

use rooknet_serde::{BitReader, BitWrite, SerdeErr};

use crate::{delta::DeltaCodec, types::ConnectionId};

/// Per-connection delta baselines for one logical field carried on a
/// reliable channel. The channel is ordered and lossless, so exactly one
/// "last written" and one "last read" value per connection is enough: the
/// baseline and the remote decoder state can never diverge.
///
/// Entries are created lazily (the first encode diffs against the zero
/// value) and must be dropped with [`ReliableHistory::clear_connection`]
/// when the connection goes away.
pub struct ReliableHistory<T> {
    baselines: HashMap<ConnectionId, Baseline<T>>,
}

struct Baseline<T> {
    last_written: T,
    last_read: T,
}

impl<T: Clone + Default> Default for Baseline<T> {
    fn default() -> Self {
        Self {
            last_written: T::default(),
            last_read: T::default(),
        }
    }
}

impl<T: Clone + Default> ReliableHistory<T> {
    pub fn new() -> Self {
        Self {
            baselines: HashMap::new(),
        }
    }

    /// Diffs `new` against the last value written to `connection` and
    /// advances the baseline. Returns whether the value changed.
    pub fn write(
        &mut self,
        connection: ConnectionId,
        writer: &mut dyn BitWrite,
        codec: &impl DeltaCodec<T>,
        new: &T,
    ) -> bool {
        let baseline = self.baselines.entry(connection).or_default();
        let changed = codec.write_delta(writer, &baseline.last_written, new);
        baseline.last_written = new.clone();
        changed
    }

    /// Decodes a value diffed against the last value read from
    /// `connection` and advances the baseline.
    pub fn read(
        &mut self,
        connection: ConnectionId,
        reader: &mut BitReader,
        codec: &impl DeltaCodec<T>,
    ) -> Result<T, SerdeErr> {
        let baseline = self.baselines.entry(connection).or_default();
        let value = codec.read_delta(reader, &baseline.last_read)?;
        baseline.last_read = value.clone();
        Ok(value)
    }

    /// Drops all baselines for a disconnected endpoint.
    pub fn clear_connection(&mut self, connection: &ConnectionId) {
        self.baselines.remove(connection);
    }

    pub fn tracked_connections(&self) -> usize {
        self.baselines.len()
    }
}

impl<T: Clone + Default> Default for ReliableHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ReliableHistory;
    use crate::{delta::IntDelta, types::ConnectionId};
    use rooknet_serde::{BitReader, BitWrite, BitWriter};

    #[test]
    fn baseline_advances_with_every_write_and_read() {
        let connection = ConnectionId::new(1);
        let mut sender: ReliableHistory<i32> = ReliableHistory::new();
        let mut receiver: ReliableHistory<i32> = ReliableHistory::new();

        for value in [10, 10, -3, 500_000] {
            let mut writer = BitWriter::new();
            sender.write(connection, &mut writer, &IntDelta, &value);
            let buffer = writer.to_bytes();

            let mut reader = BitReader::new(&buffer);
            let decoded = receiver.read(connection, &mut reader, &IntDelta).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn first_write_diffs_against_zero() {
        let connection = ConnectionId::new(1);
        let mut sender: ReliableHistory<i32> = ReliableHistory::new();

        let mut writer = BitWriter::new();
        let changed = sender.write(connection, &mut writer, &IntDelta, &0);

        // first value happened to equal the zero baseline: one bit
        assert!(!changed);
        assert_eq!(writer.bits_written(), 1);
    }

    #[test]
    fn clearing_a_connection_drops_its_baseline() {
        let connection = ConnectionId::new(7);
        let mut sender: ReliableHistory<i32> = ReliableHistory::new();

        let mut writer = BitWriter::new();
        sender.write(connection, &mut writer, &IntDelta, &42);
        assert_eq!(sender.tracked_connections(), 1);

        sender.clear_connection(&connection);
        assert_eq!(sender.tracked_connections(), 0);
    }
}
