use std::collections::HashMap;

use rooknet_shared::{BitReader, Channel, NetworkId, OwnedBitReader, PlayerId, Role, SerdeErr};
use thiserror::Error;

use crate::rpc::signature::RpcSignature;

/// Stable numeric id of one RPC. Both sides build the same dispatch table
/// at startup, so only the id travels: no names, no runtime type
/// introspection.
pub type RpcId = u16;

/// Context handed to a handler alongside the argument payload.
#[derive(Debug, Clone, Copy)]
pub struct RpcInbound {
    pub rpc_id: RpcId,
    pub network_id: NetworkId,
    /// On the server this is derived from the connection the call arrived
    /// on, never trusted from the wire.
    pub sender: PlayerId,
    pub channel: Channel,
}

pub type RpcHandler = Box<dyn FnMut(&RpcInbound, &mut BitReader) -> Result<(), SerdeErr>>;

/// Errors that can occur validating an outbound RPC
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// No handler is registered under this id
    #[error("rpc {rpc_id} is not registered")]
    UnknownRpc { rpc_id: RpcId },

    /// Two handlers claimed the same id
    #[error("rpc {rpc_id} is already registered")]
    DuplicateRpc { rpc_id: RpcId },

    /// The dispatch table was never registered for the current role
    #[error("rpc module is not registered for role {role:?}")]
    ModuleNotRegistered { role: Role },

    /// The calling object is not spawned
    #[error("object {identity} is not spawned")]
    NotSpawned { identity: String },

    /// The signature requires ownership and the caller is not the owner
    #[error("caller does not own the target object")]
    NotOwner,

    /// The signature requires server authority
    #[error("caller is not the server")]
    NotServer,

    /// A to-target call named a player who is not observing the object
    #[error("target player {target} is not an observer of the object")]
    TargetNotObserver { target: u16 },

    /// A to-target call named the server, and policy forbids that
    #[error("server targeting is not allowed by policy")]
    ServerTargetNotAllowed,

    /// A to-target call named no recipient
    #[error("to-target rpc requires a target player")]
    MissingTarget,
}

struct RegisteredRpc {
    signature: RpcSignature,
    handler: RpcHandler,
}

/// The most recent call with one signature on one object, retained so a
/// late-joining observer can be caught up without replaying history.
#[derive(Clone)]
pub struct BufferedRpc {
    pub rpc_id: RpcId,
    pub sender: PlayerId,
    pub payload: OwnedBitReader,
}

/// Arena of RPC handlers indexed by [`RpcId`], plus the per-object buffer
/// of latest calls that catches late-joining observers up. Rebuilt (or
/// migrated, during a promotion) whenever the runtime changes role.
pub struct RpcDispatcher {
    handlers: Vec<Option<RegisteredRpc>>,
    buffered: HashMap<NetworkId, Vec<BufferedRpc>>,
    registered_role: Option<Role>,
}

impl RpcDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            buffered: HashMap::new(),
            registered_role: None,
        }
    }

    /// Register a handler under a stable id
    ///
    /// # Panics
    ///
    /// Panics if the id is already taken.
    /// Consider using `try_register` for non-panicking error handling.
    pub fn register(&mut self, rpc_id: RpcId, signature: RpcSignature, handler: RpcHandler) {
        if self.try_register(rpc_id, signature, handler).is_err() {
            panic!("rpc id {} is already registered!", rpc_id);
        }
    }

    pub fn try_register(
        &mut self,
        rpc_id: RpcId,
        signature: RpcSignature,
        handler: RpcHandler,
    ) -> Result<(), RpcError> {
        let index = rpc_id as usize;
        if index >= self.handlers.len() {
            self.handlers.resize_with(index + 1, || None);
        }
        if self.handlers[index].is_some() {
            return Err(RpcError::DuplicateRpc { rpc_id });
        }
        self.handlers[index] = Some(RegisteredRpc { signature, handler });
        Ok(())
    }

    pub fn signature(&self, rpc_id: RpcId) -> Option<RpcSignature> {
        self.handlers
            .get(rpc_id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|registered| registered.signature)
    }

    /// The role this table was registered for, if any. An RPC cannot be
    /// sent while the table is unbound.
    pub fn registered_role(&self) -> Option<Role> {
        self.registered_role
    }

    pub fn bind_role(&mut self, role: Role) {
        self.registered_role = Some(role);
    }

    pub fn unbind_role(&mut self) {
        self.registered_role = None;
    }

    /// Runs the handler registered for `inbound.rpc_id` on the payload.
    pub fn invoke(&mut self, inbound: &RpcInbound, reader: &mut BitReader) -> Result<(), SerdeErr> {
        let Some(registered) = self
            .handlers
            .get_mut(inbound.rpc_id as usize)
            .and_then(|slot| slot.as_mut())
        else {
            return Err(SerdeErr::InvalidValue { type_name: "RpcId" });
        };
        (registered.handler)(inbound, reader)
    }

    // Late-joiner buffer: the most recent call per distinct signature per
    // object, not a log.

    pub fn buffer_latest(
        &mut self,
        network_id: NetworkId,
        rpc_id: RpcId,
        sender: PlayerId,
        payload: OwnedBitReader,
    ) {
        let calls = self.buffered.entry(network_id).or_default();
        let buffered = BufferedRpc {
            rpc_id,
            sender,
            payload,
        };
        if let Some(slot) = calls.iter_mut().find(|call| call.rpc_id == rpc_id) {
            *slot = buffered;
        } else {
            calls.push(buffered);
        }
    }

    pub fn buffered_calls(&self, network_id: &NetworkId) -> &[BufferedRpc] {
        self.buffered
            .get(network_id)
            .map(|calls| calls.as_slice())
            .unwrap_or(&[])
    }

    /// Drops buffered calls when the object despawns.
    pub fn clear_object(&mut self, network_id: &NetworkId) {
        self.buffered.remove(network_id);
    }
}

impl Default for RpcDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
