//! The RPC authority matrix: a call flagged `require_ownership` from a
//! non-owner on a reliable-ordered channel is dropped; the same call from
//! the owner reaches every current observer except an excluded sender.
//! Plus the late-joiner catch-up buffer.

mod common;

use std::{cell::RefCell, rc::Rc};

use rooknet::{
    Channel, ConnectionId, PlayerId, RpcSignature, Runtime, RuntimeConfig, SceneId, Serde,
};

const MOVE_PIECE: u16 = 7;

type Sink = Rc<RefCell<Vec<(u16, u32)>>>;

fn register_move_rpc(runtime: &mut Runtime, signature: RpcSignature) -> Sink {
    let sink: Sink = Rc::new(RefCell::new(Vec::new()));
    let captured = Rc::clone(&sink);
    runtime.context_mut().rpc.register(
        MOVE_PIECE,
        signature,
        Box::new(move |inbound, reader| {
            let square = u32::de(reader)?;
            captured.borrow_mut().push((inbound.sender.value(), square));
            Ok(())
        }),
    );
    sink
}

#[test]
fn ownership_gated_rpc_matrix() {
    let conn_alice = ConnectionId::new(1);
    let conn_bob = ConnectionId::new(2);

    let (mut server, server_out) = common::server(RuntimeConfig::default());
    let (mut alice, alice_out) = common::client(RuntimeConfig::default(), conn_alice);
    let (mut bob, bob_out) = common::client(RuntimeConfig::default(), conn_bob);

    let signature = RpcSignature::to_observers(Channel::ReliableOrdered)
        .require_ownership()
        .exclude_sender();
    let server_sink = register_move_rpc(&mut server, signature);
    let alice_sink = register_move_rpc(&mut alice, signature);
    let bob_sink = register_move_rpc(&mut bob, signature);

    // join handshake for both clients
    let alice_id = server.authenticate(conn_alice, None).unwrap();
    let bob_id = server.authenticate(conn_bob, None).unwrap();
    common::pump_to_clients(
        &server_out,
        &mut [(conn_alice, &mut alice), (conn_bob, &mut bob)],
    );

    // a piece owned by alice, observed by both players
    let piece = server
        .context_mut()
        .spawn(SceneId::new(0), alice_id, 1);
    server.context_mut().add_observer(piece, alice_id);
    server.context_mut().add_observer(piece, bob_id);
    server.tick();
    common::pump_to_clients(
        &server_out,
        &mut [(conn_alice, &mut alice), (conn_bob, &mut bob)],
    );

    // both mirrors know who owns the piece
    assert_eq!(alice.context().ownership.try_owner(&piece), Some(alice_id));
    assert_eq!(bob.context().ownership.try_owner(&piece), Some(alice_id));
    assert_ne!(alice_id, bob_id);

    // the non-owner's call is dropped before anything is sent
    let accepted = bob
        .context_mut()
        .send_rpc(MOVE_PIECE, piece, None, &13u32);
    assert!(!accepted);
    assert!(bob_out.is_empty());

    // the owner's call goes through
    let accepted = alice
        .context_mut()
        .send_rpc(MOVE_PIECE, piece, None, &9u32);
    assert!(accepted);
    common::pump_to_server(&alice_out, conn_alice, &mut server);
    common::pump_to_clients(
        &server_out,
        &mut [(conn_alice, &mut alice), (conn_bob, &mut bob)],
    );

    // the server applied it, the other observer received it, and the
    // excluded sender did not get an echo
    assert_eq!(*server_sink.borrow(), vec![(alice_id.value(), 9)]);
    assert_eq!(*bob_sink.borrow(), vec![(alice_id.value(), 9)]);
    assert!(alice_sink.borrow().is_empty());
}

#[test]
fn buffered_rpc_catches_up_a_late_observer() {
    let conn_alice = ConnectionId::new(1);
    let conn_carol = ConnectionId::new(2);

    let (mut server, server_out) = common::server(RuntimeConfig::default());
    let (mut alice, _alice_out) = common::client(RuntimeConfig::default(), conn_alice);
    let (mut carol, _carol_out) = common::client(RuntimeConfig::default(), conn_carol);

    let signature = RpcSignature::to_observers(Channel::ReliableOrdered).buffer_last();
    register_move_rpc(&mut server, signature);
    register_move_rpc(&mut alice, signature);
    let carol_sink = register_move_rpc(&mut carol, signature);

    let alice_id = server.authenticate(conn_alice, None).unwrap();
    common::pump_to_clients(&server_out, &mut [(conn_alice, &mut alice)]);

    let piece = server.context_mut().spawn(SceneId::new(0), alice_id, 1);
    server.context_mut().add_observer(piece, alice_id);
    server.tick();
    common::pump_to_clients(&server_out, &mut [(conn_alice, &mut alice)]);

    // the server announces a state twice; only the latest is buffered
    server.context_mut().send_rpc(MOVE_PIECE, piece, None, &4u32);
    server.context_mut().send_rpc(MOVE_PIECE, piece, None, &11u32);
    common::pump_to_clients(&server_out, &mut [(conn_alice, &mut alice)]);

    // carol joins late and starts observing the piece
    let carol_id = server.authenticate(conn_carol, None).unwrap();
    server.tick();
    common::pump_to_clients(
        &server_out,
        &mut [(conn_alice, &mut alice), (conn_carol, &mut carol)],
    );
    server.context_mut().add_observer(piece, carol_id);
    common::pump_to_clients(
        &server_out,
        &mut [(conn_alice, &mut alice), (conn_carol, &mut carol)],
    );

    // she receives exactly the latest buffered call, not the history
    assert_eq!(*carol_sink.borrow(), vec![(PlayerId::SERVER.value(), 11)]);
}
