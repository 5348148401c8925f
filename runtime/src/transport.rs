use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
};

use rooknet_shared::{Channel, ConnectionId};

/// The narrow seam to whatever actually moves bytes (UDP, Steam P2P, a
/// relay...). The transport supplies the delivery guarantees each
/// [`Channel`] names; this runtime never blocks on it. Connection open and
/// close enter the runtime through explicit calls on
/// [`crate::Runtime`], marshalled onto the tick thread by the embedder.
pub trait Transport {
    fn send(&mut self, connection: ConnectionId, payload: &[u8], channel: Channel);

    fn broadcast(&mut self, connections: &[ConnectionId], payload: &[u8], channel: Channel) {
        for connection in connections {
            self.send(*connection, payload, channel);
        }
    }

    /// Largest payload that fits one packet on this connection and channel.
    fn mtu(&self, connection: ConnectionId, channel: Channel) -> usize;

    /// Force-close a connection (protocol violation, refused duplicate
    /// session, severed after promotion). Transports that cannot close
    /// remotely may ignore this; the runtime has already forgotten the
    /// connection either way.
    fn disconnect(&mut self, _connection: ConnectionId) {}
}

// Loopback

/// One queued loopback delivery.
pub struct LoopbackDelivery {
    pub connection: ConnectionId,
    pub payload: Vec<u8>,
    pub channel: Channel,
}

/// In-process transport that queues outgoing packets for the embedder (or a
/// test) to pump into the peer runtime. Used by bot/offline play, where
/// "server" and "client" live in the same process, and by the integration
/// tests.
pub struct LoopbackTransport {
    outgoing: Rc<RefCell<VecDeque<LoopbackDelivery>>>,
    mtu: usize,
}

/// The far end of a [`LoopbackTransport`]: drains what the runtime sent.
#[derive(Clone)]
pub struct LoopbackPair {
    outgoing: Rc<RefCell<VecDeque<LoopbackDelivery>>>,
}

impl LoopbackTransport {
    const DEFAULT_MTU: usize = 1200;

    pub fn new() -> (Self, LoopbackPair) {
        let outgoing = Rc::new(RefCell::new(VecDeque::new()));
        let transport = Self {
            outgoing: Rc::clone(&outgoing),
            mtu: Self::DEFAULT_MTU,
        };
        (transport, LoopbackPair { outgoing })
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, connection: ConnectionId, payload: &[u8], channel: Channel) {
        self.outgoing.borrow_mut().push_back(LoopbackDelivery {
            connection,
            payload: payload.to_vec(),
            channel,
        });
    }

    fn mtu(&self, _connection: ConnectionId, _channel: Channel) -> usize {
        self.mtu
    }
}

impl LoopbackPair {
    /// Takes everything the runtime has sent since the last drain.
    pub fn drain(&self) -> Vec<LoopbackDelivery> {
        self.outgoing.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.borrow().is_empty()
    }
}
