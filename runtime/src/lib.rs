//! # Rooknet
//! A state-replication and RPC runtime for session-based multiplayer games.
//! Keeps many client views of mutable game state consistent over an
//! unreliable, latency-variable transport while minimizing bytes sent, and
//! survives reconnection, late joins, and promotion of a client to server
//! (host migration) without a process restart.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use rooknet_shared::{
    Channel, ConnectionId, Cookie, DeltaCodec, FloatDelta, IntDelta, NetworkId, PlayerId,
    ProtocolError, QuantizedFloatDelta, QuantizedQuatDelta, QuantizedVec3Delta, ReliableHistory,
    Role, SceneId, SequenceNum, Serde, SerdeErr, Tick, UnreliableHistory, UnreliableHistoryConfig,
};

mod config;
mod context;
mod event;
mod interp;
mod module;
mod observer;
mod ownership;
mod rpc;
mod runtime;
mod session;
mod transport;

pub use config::{DuplicateSessionPolicy, InterpolationConfig, LeavePolicy, RuntimeConfig};
pub use context::{
    AckReceived, ConnectionClosed, NetContext, ObjectDespawned, ObjectSpawned, OwnershipChanged,
};
pub use event::{EventBus, SubscriptionId};
pub use interp::InterpolationBuffer;
pub use module::{Capabilities, ModuleOrchestrator, ModuleState, NetModule};
pub use observer::ObserverMap;
pub use ownership::{AuthorityMarker, OwnershipError, OwnershipTable};
pub use rpc::{
    BufferedRpc, PendingRequests, RequestId, RpcDispatcher, RpcError, RpcHandler, RpcId,
    RpcInbound, RpcKind, RpcSignature,
};
pub use runtime::Runtime;
pub use session::{JoinOutcome, LeaveOutcome, PlayerRegistry, SessionError, SessionState};
pub use transport::{LoopbackDelivery, LoopbackPair, LoopbackTransport, Transport};
