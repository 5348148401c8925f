//! # Rooknet Shared
//! Wire types, delta codecs and per-connection history tracking shared by
//! every role the rooknet runtime can take.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use rooknet_serde::{
    read_prefixed, read_varint, read_varint_signed, write_prefixed, write_varint,
    write_varint_signed, BitCounter, BitReader, BitWrite, BitWriter, ConstBitLength,
    OwnedBitReader, Quantizer, Quat, Serde, SerdeErr, Vec3,
};

mod batch;
mod channel;
mod delta;
mod error;
mod history;
mod identity;
mod key_generator;
mod pool;
mod types;
mod wire;
mod wrapping_number;

pub use batch::{DespawnRecord, SpawnBatch, SpawnRecord};
pub use channel::Channel;
pub use delta::{
    DeltaCodec, FloatDelta, IntDelta, QuantizedFloatDelta, QuantizedQuatDelta, QuantizedVec3Delta,
};
pub use error::ProtocolError;
pub use history::{
    read_ack_prefix, write_ack_prefix, ReliableHistory, UnreliableHistory, UnreliableHistoryConfig,
};
pub use identity::{Cookie, NetworkId, PlayerId, SceneId};
pub use key_generator::KeyGenerator;
pub use pool::{BufferPool, PooledWriter};
pub use types::{ConnectionId, Role, SequenceNum, Tick};
pub use wire::{
    OwnershipEvent, PacketType, PlayerJoinedEvent, PlayerLeftEvent, PlayerSnapshotEvent,
    ServerLoginResponse,
};
pub use wrapping_number::{sequence_greater_than, sequence_less_than, wrapping_diff};
