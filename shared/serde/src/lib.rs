//! # Rooknet Serde
//! Bit-level serialization primitives shared by the rooknet runtime crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bit_reader;
mod bit_writer;
mod error;
mod prefixed;
mod quantize;
mod serde;
mod varint;

pub use bit_reader::{BitReader, OwnedBitReader};
pub use bit_writer::{BitCounter, BitWrite, BitWriter};
pub use error::SerdeErr;
pub use prefixed::{prefix_width, read_prefixed, write_prefixed};
pub use quantize::{Quantizer, Quat, Vec3};
pub use serde::{ConstBitLength, Serde};
pub use varint::{
    read_varint, read_varint_signed, read_varint_signed_wide, read_varint_wide, write_varint,
    write_varint_signed, write_varint_signed_wide, write_varint_wide, zigzag_decode_16,
    zigzag_decode_32, zigzag_decode_64, zigzag_decode_128, zigzag_encode_16, zigzag_encode_32,
    zigzag_encode_64, zigzag_encode_128,
};
