use rooknet_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

/// Per-connection sequence number for unreliable delta streams. Wraps; use
/// [`crate::sequence_greater_than`] and friends to compare.
pub type SequenceNum = u16;

/// Replication tick counter. Wraps.
pub type Tick = u16;

/// Which side of the session this runtime currently is. Host migration can
/// flip a running runtime from `Client` to `Server` without a restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub fn invert(self) -> Self {
        match self {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }

    pub fn is_server(self) -> bool {
        matches!(self, Role::Server)
    }
}

// ConnectionId

/// Opaque transport-level endpoint handle. Many-to-one with
/// [`crate::PlayerId`]: a local bot has no connection at all.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Serde for ConnectionId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(u64::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        Self::const_bit_length()
    }
}

impl ConstBitLength for ConnectionId {
    fn const_bit_length() -> u32 {
        64
    }
}
