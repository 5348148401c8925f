//! Loopback harness for driving a server runtime and client runtimes in
//! one process, pumping queued deliveries between them by hand.

#![allow(dead_code)]

use rooknet::{ConnectionId, LoopbackPair, LoopbackTransport, Runtime, RuntimeConfig};

pub fn server(config: RuntimeConfig) -> (Runtime, LoopbackPair) {
    let (transport, pair) = LoopbackTransport::new();
    (Runtime::new_server(config, Box::new(transport)), pair)
}

pub fn client(config: RuntimeConfig, connection: ConnectionId) -> (Runtime, LoopbackPair) {
    let (transport, pair) = LoopbackTransport::new();
    let mut runtime = Runtime::new_client(config, Box::new(transport));
    runtime.connect_to_server(connection);
    (runtime, pair)
}

/// Delivers everything the server sent to whichever client owns each
/// destination connection.
pub fn pump_to_clients(server_out: &LoopbackPair, clients: &mut [(ConnectionId, &mut Runtime)]) {
    for delivery in server_out.drain() {
        for (connection, client) in clients.iter_mut() {
            if *connection == delivery.connection {
                client
                    .receive(delivery.connection, &delivery.payload, delivery.channel)
                    .expect("client rejected a server packet");
            }
        }
    }
}

/// Delivers everything one client sent to the server.
pub fn pump_to_server(client_out: &LoopbackPair, connection: ConnectionId, server: &mut Runtime) {
    for delivery in client_out.drain() {
        server
            .receive(connection, &delivery.payload, delivery.channel)
            .expect("server rejected a client packet");
    }
}
