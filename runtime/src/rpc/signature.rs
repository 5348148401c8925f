use rooknet_shared::Channel;

/// Who a call is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcKind {
    /// Client → server.
    ToServer,
    /// Server → every player currently observing the object (clients route
    /// through the server, which forwards).
    ToObservers,
    /// A single recipient, named at the call site.
    ToTarget,
}

/// Immutable descriptor attached to an RPC call site: routing kind,
/// delivery channel, and the authority requirements the dispatch layer
/// validates before anything is serialized. Built where the call is made,
/// consumed immediately; only the routing-relevant bits ever reach the
/// wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpcSignature {
    pub kind: RpcKind,
    pub channel: Channel,
    /// Caller must currently hold the server role.
    pub requires_server: bool,
    /// Caller must own the object the call is attached to.
    pub requires_ownership: bool,
    /// Do not deliver back to the calling player.
    pub exclude_sender: bool,
    /// Do not deliver to the object's owner.
    pub exclude_owner: bool,
    /// Also execute the handler on the calling side.
    pub run_locally: bool,
    /// Retain the latest call per signature so late-joining observers can
    /// be caught up without replaying history.
    pub buffer_last: bool,
}

impl RpcSignature {
    pub fn to_server(channel: Channel) -> Self {
        Self::new(RpcKind::ToServer, channel)
    }

    pub fn to_observers(channel: Channel) -> Self {
        Self::new(RpcKind::ToObservers, channel)
    }

    pub fn to_target(channel: Channel) -> Self {
        Self::new(RpcKind::ToTarget, channel)
    }

    fn new(kind: RpcKind, channel: Channel) -> Self {
        Self {
            kind,
            channel,
            requires_server: false,
            requires_ownership: false,
            exclude_sender: false,
            exclude_owner: false,
            run_locally: false,
            buffer_last: false,
        }
    }

    pub fn require_server(mut self) -> Self {
        self.requires_server = true;
        self
    }

    pub fn require_ownership(mut self) -> Self {
        self.requires_ownership = true;
        self
    }

    pub fn exclude_sender(mut self) -> Self {
        self.exclude_sender = true;
        self
    }

    pub fn exclude_owner(mut self) -> Self {
        self.exclude_owner = true;
        self
    }

    pub fn run_locally(mut self) -> Self {
        self.run_locally = true;
        self
    }

    pub fn buffer_last(mut self) -> Self {
        self.buffer_last = true;
        self
    }
}
