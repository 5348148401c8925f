mod float;
mod integer;
mod quantized;

pub use float::FloatDelta;
pub use integer::IntDelta;
pub use quantized::{QuantizedFloatDelta, QuantizedQuatDelta, QuantizedVec3Delta};

use rooknet_serde::{BitReader, BitWrite, SerdeErr};

/// Changed-or-not + diff codec: the principal compression mechanism of the
/// runtime. Most per-tick field values are unchanged or change by a small
/// amount, so the common case costs exactly one bit.
pub trait DeltaCodec<T> {
    /// Writes one changed flag, then a type-appropriate diff iff the value
    /// changed. Returns whether anything beyond the flag was written.
    fn write_delta(&self, writer: &mut dyn BitWrite, old: &T, new: &T) -> bool;

    /// Mirror of [`DeltaCodec::write_delta`]: given the same `old` the
    /// writer diffed against, reproduces the written value exactly.
    fn read_delta(&self, reader: &mut BitReader, old: &T) -> Result<T, SerdeErr>;
}
