use rooknet_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

/// Delivery-guarantee class for an outgoing message. The transport supplies
/// the guarantees; this type only selects among them and drives which
/// history tracker a delta stream uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Delivered exactly once, in order.
    ReliableOrdered,
    /// Delivered exactly once, in any order.
    ReliableUnordered,
    /// May be lost, duplicated or reordered.
    Unreliable,
}

impl Channel {
    pub fn is_reliable(&self) -> bool {
        !matches!(self, Channel::Unreliable)
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Channel::ReliableOrdered)
    }

    /// Best-effort channels drop authorization failures silently and skip
    /// observer-membership validation; see the dispatch layer.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Channel::Unreliable)
    }
}

impl Serde for Channel {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index: u64 = match self {
            Channel::ReliableOrdered => 0,
            Channel::ReliableUnordered => 1,
            Channel::Unreliable => 2,
        };
        writer.write_bits(index, 2);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match reader.read_bits(2)? {
            0 => Ok(Channel::ReliableOrdered),
            1 => Ok(Channel::ReliableUnordered),
            2 => Ok(Channel::Unreliable),
            _ => Err(SerdeErr::InvalidValue {
                type_name: "Channel",
            }),
        }
    }

    fn bit_length(&self) -> u32 {
        Self::const_bit_length()
    }
}

impl ConstBitLength for Channel {
    fn const_bit_length() -> u32 {
        2
    }
}
