use rooknet_serde::SerdeErr;
use thiserror::Error;

/// Protocol-level violations. Unlike an authorization failure (which only
/// drops the offending call), any of these indicates an attacker or a
/// desync bug: the embedder must force-disconnect the affected connection
/// rather than continue with silently diverging replicated state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The payload could not be decoded
    #[error("decode failure: {0}")]
    Serde(#[from] SerdeErr),

    /// An unreliable delta referenced a baseline sequence this side no
    /// longer retains
    #[error("unreliable delta referenced unknown baseline sequence {sequence}")]
    UnknownBaseline { sequence: u16 },

    /// A connection handle appeared where it must not already exist
    #[error("duplicate connection key {connection}")]
    DuplicateConnection { connection: u64 },

    /// The leading packet type discriminant does not name a packet
    /// (SECURITY: potentially malformed or malicious packet)
    #[error("invalid packet type index {index}")]
    InvalidPacketType { index: u8 },
}
