use log::{error, info, warn};
use rooknet_shared::{
    read_ack_prefix, read_varint, BitReader, Channel, ConnectionId, Cookie, NetworkId,
    OwnedBitReader, OwnershipEvent, PacketType, PlayerId, PlayerJoinedEvent, PlayerLeftEvent,
    PlayerSnapshotEvent, ProtocolError, Role, Serde, SerdeErr, ServerLoginResponse, SpawnBatch,
};

use crate::{
    config::RuntimeConfig,
    context::{ConnectionClosed, NetContext},
    module::{ModuleOrchestrator, NetModule},
    rpc::{RpcId, RpcKind},
    session::SessionError,
    transport::Transport,
};

/// The composed runtime for one session: the context (registries, dispatch,
/// transport) driven by the module orchestrator. The embedder owns the
/// loop: it marshals transport callbacks into [`Runtime::receive`] /
/// [`Runtime::connection_closed`] on the tick thread, and calls
/// [`Runtime::tick`] / [`Runtime::frame`] at its own cadence. Nothing in
/// here blocks.
pub struct Runtime {
    context: NetContext,
    orchestrator: ModuleOrchestrator,
}

impl Runtime {
    pub fn new_server(config: RuntimeConfig, transport: Box<dyn Transport>) -> Self {
        Self::new(config, Role::Server, transport)
    }

    pub fn new_client(config: RuntimeConfig, transport: Box<dyn Transport>) -> Self {
        Self::new(config, Role::Client, transport)
    }

    fn new(config: RuntimeConfig, role: Role, transport: Box<dyn Transport>) -> Self {
        let mut context = NetContext::new(config, role, transport);
        context.rpc.bind_role(role);
        Self {
            context,
            orchestrator: ModuleOrchestrator::new(role),
        }
    }

    pub fn context(&self) -> &NetContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut NetContext {
        &mut self.context
    }

    pub fn orchestrator(&self) -> &ModuleOrchestrator {
        &self.orchestrator
    }

    pub fn role(&self) -> Role {
        self.context.role()
    }

    pub fn is_server(&self) -> bool {
        self.context.is_server()
    }

    pub fn register_module(&mut self, module: Box<dyn NetModule>) {
        self.orchestrator.register(&mut self.context, module);
    }

    // Connection lifecycle

    /// Client side: records the connection that leads to the server. Every
    /// inbound packet from any other connection is ignored.
    pub fn connect_to_server(&mut self, connection: ConnectionId) {
        if self.context.is_server() {
            panic!("connect_to_server is a client-side operation!");
        }
        self.context.set_server_connection(Some(connection));
    }

    /// Server side: admits a connection that passed transport-level
    /// authentication. On success the join handshake (login response,
    /// player snapshot, join broadcast) is sent and module hooks fire. On
    /// failure the embedder must close the connection; the registry is
    /// untouched.
    pub fn authenticate(
        &mut self,
        connection: ConnectionId,
        cookie: Option<Cookie>,
    ) -> Result<PlayerId, SessionError> {
        if !self.context.is_server() {
            panic!("authenticate is a server-side operation!");
        }

        let host_migration = self.context.config().host_migration;
        let policy = self.context.config().duplicate_session_policy;
        let outcome = self
            .context
            .players
            .join(connection, cookie, host_migration, policy)?;

        if let Some(evicted) = outcome.evicted_connection {
            warn!(
                "evicted stale session on connection {} in favor of {}",
                evicted.value(),
                connection.value()
            );
            self.context.disconnect(evicted);
        }

        let login = outcome.login.clone();
        self.context.send_packet(
            connection,
            Channel::ReliableOrdered,
            PacketType::LoginResponse,
            |writer| login.ser(writer),
        );

        let snapshot = outcome.snapshot.clone();
        self.context.send_packet(
            connection,
            Channel::ReliableOrdered,
            PacketType::PlayerSnapshot,
            |writer| snapshot.ser(writer),
        );

        let others: Vec<ConnectionId> = self
            .context
            .players
            .connected_connections()
            .into_iter()
            .filter(|other| *other != connection)
            .collect();
        let broadcast = outcome.broadcast.clone();
        self.context.broadcast_packet(
            &others,
            Channel::ReliableOrdered,
            PacketType::PlayerJoined,
            |writer| broadcast.ser(writer),
        );

        self.orchestrator
            .player_joined(&mut self.context, outcome.player_id, outcome.reconnect);

        Ok(outcome.player_id)
    }

    /// The transport reported a closed connection. On the server this runs
    /// the full leave sequence: pre hooks, the configured leave policy for
    /// the player's objects, the leave broadcast, then main and post
    /// hooks. On a client, losing the server connection ends the session;
    /// the game observes the events and reacts (e.g. returns to a menu).
    pub fn connection_closed(&mut self, connection: ConnectionId) {
        if self.context.is_server() {
            let Some(outcome) = self.context.players.leave_connection(&connection) else {
                return;
            };

            self.orchestrator
                .player_left_pre(&mut self.context, outcome.player_id);

            self.context.apply_leave_policy(&outcome.player_id);
            self.context.observers.remove_player(&outcome.player_id);

            let remaining = self.context.players.connected_connections();
            let broadcast = outcome.broadcast;
            self.context.broadcast_packet(
                &remaining,
                Channel::ReliableOrdered,
                PacketType::PlayerLeft,
                |writer| broadcast.ser(writer),
            );

            self.orchestrator
                .player_left(&mut self.context, outcome.player_id);
            self.orchestrator
                .player_left_post(&mut self.context, outcome.player_id);

            self.context.events.publish(&ConnectionClosed { connection });
        } else if self.context.server_connection() == Some(connection) {
            info!("server connection closed");
            self.context.set_server_connection(None);
            self.context.events.publish(&ConnectionClosed { connection });
        }
    }

    // Receive path

    /// Decodes one inbound payload. A `ProtocolError` means the connection
    /// is corrupt or hostile: the embedder must force-disconnect it rather
    /// than continue with silently diverging state.
    pub fn receive(
        &mut self,
        from: ConnectionId,
        payload: &[u8],
        channel: Channel,
    ) -> Result<(), ProtocolError> {
        let mut reader = BitReader::new(payload);

        if channel.is_best_effort() {
            if let Some(sequence) = read_ack_prefix(&mut reader)? {
                self.context.note_received_ack(from, sequence);
            }
        }

        let packet_type = PacketType::de(&mut reader)?;

        if self.context.is_server() {
            match packet_type {
                PacketType::Rpc => self.receive_rpc_as_server(from, channel, &mut reader),
                other => {
                    error!("client {} sent server-only packet {:?}", from.value(), other);
                    Err(ProtocolError::InvalidPacketType {
                        index: other.index() as u8,
                    })
                }
            }
        } else {
            if self.context.server_connection() != Some(from) {
                warn!("packet from unknown connection {} ignored", from.value());
                return Ok(());
            }
            match packet_type {
                PacketType::LoginResponse => {
                    let login = ServerLoginResponse::de(&mut reader)?;
                    self.context.players.apply_login(&login, Some(from));
                    self.context.set_local_player(Some(login.player_id));
                    info!("logged in as player {}", login.player_id.value());
                    Ok(())
                }
                PacketType::PlayerSnapshot => {
                    let snapshot = PlayerSnapshotEvent::de(&mut reader)?;
                    self.context.players.apply_snapshot(&snapshot);
                    for event in &snapshot.players {
                        self.orchestrator.player_joined(
                            &mut self.context,
                            event.player_id,
                            event.reconnect,
                        );
                    }
                    Ok(())
                }
                PacketType::PlayerJoined => {
                    let event = PlayerJoinedEvent::de(&mut reader)?;
                    self.context.players.apply_joined(&event);
                    self.orchestrator
                        .player_joined(&mut self.context, event.player_id, event.reconnect);
                    Ok(())
                }
                PacketType::PlayerLeft => {
                    let event = PlayerLeftEvent::de(&mut reader)?;
                    self.context.players.apply_left(&event);
                    self.orchestrator
                        .player_left_pre(&mut self.context, event.player_id);
                    self.orchestrator
                        .player_left(&mut self.context, event.player_id);
                    self.orchestrator
                        .player_left_post(&mut self.context, event.player_id);
                    Ok(())
                }
                PacketType::Ownership => {
                    let event = OwnershipEvent::de(&mut reader)?;
                    self.context.apply_ownership_event(&event);
                    Ok(())
                }
                PacketType::SpawnBatch => {
                    let batch = SpawnBatch::de(&mut reader)?;
                    self.context.apply_spawn_batch(&batch);
                    Ok(())
                }
                PacketType::Rpc => self.receive_rpc_as_client(from, channel, &mut reader),
            }
        }
    }

    fn receive_rpc_as_server(
        &mut self,
        from: ConnectionId,
        channel: Channel,
        reader: &mut BitReader,
    ) -> Result<(), ProtocolError> {
        let envelope = RpcEnvelope::de(reader)?;

        let Some(sender) = self.context.players.player_by_connection(&from) else {
            warn!(
                "rpc from unauthenticated connection {} dropped",
                from.value()
            );
            return Ok(());
        };
        if envelope.sender != sender {
            // the wire field exists for server→client relays; inbound it is
            // never trusted
            warn!(
                "connection {} claimed sender {} but is player {}",
                from.value(),
                envelope.sender.value(),
                sender.value()
            );
        }

        let Some(signature) = self.context.rpc.signature(envelope.rpc_id) else {
            if !channel.is_best_effort() {
                error!("unknown rpc id {}; call dropped", envelope.rpc_id);
            }
            return Ok(());
        };

        let drop_call = |reason: &str| {
            if !channel.is_best_effort() {
                error!(
                    "rpc {} from player {} dropped: {}",
                    envelope.rpc_id,
                    sender.value(),
                    reason
                );
            }
        };

        if !self.context.ownership.is_registered(&envelope.network_id) {
            drop_call("object is not spawned");
            return Ok(());
        }
        if signature.requires_ownership
            && self.context.config().ownership_checks
            && self.context.ownership.try_owner(&envelope.network_id) != Some(sender)
        {
            drop_call("sender does not own the object");
            return Ok(());
        }
        if signature.requires_server && self.context.config().server_checks {
            drop_call("call requires server authority");
            return Ok(());
        }

        match signature.kind {
            RpcKind::ToServer => {
                self.context.invoke_local_rpc(
                    envelope.rpc_id,
                    envelope.network_id,
                    sender,
                    channel,
                    &envelope.payload,
                );
            }
            RpcKind::ToObservers => {
                // best-effort channels skip the membership check, trading
                // strict correctness for throughput
                if channel.is_reliable()
                    && !self
                        .context
                        .observers
                        .is_observer(&envelope.network_id, &sender)
                {
                    drop_call("sender is not an observer");
                    return Ok(());
                }

                self.context.fan_out_to_observers(
                    &signature,
                    envelope.rpc_id,
                    envelope.network_id,
                    sender,
                    &envelope.payload,
                );
                if signature.buffer_last {
                    self.context.rpc.buffer_latest(
                        envelope.network_id,
                        envelope.rpc_id,
                        sender,
                        OwnedBitReader::new(&envelope.payload),
                    );
                }
                self.context.invoke_local_rpc(
                    envelope.rpc_id,
                    envelope.network_id,
                    sender,
                    channel,
                    &envelope.payload,
                );
            }
            RpcKind::ToTarget => {
                let Some(target) = envelope.target else {
                    drop_call("to-target call without a target");
                    return Ok(());
                };
                if target.is_server_sentinel() {
                    if self.context.config().allow_server_target {
                        self.context.invoke_local_rpc(
                            envelope.rpc_id,
                            envelope.network_id,
                            sender,
                            channel,
                            &envelope.payload,
                        );
                    } else {
                        drop_call("server targeting is not allowed by policy");
                    }
                } else if !self
                    .context
                    .observers
                    .is_observer(&envelope.network_id, &target)
                {
                    drop_call("target is not an observer of the object");
                } else if let Some(connection) = self.context.players.connection_of(&target) {
                    self.context.send_rpc_envelope(
                        connection,
                        signature.channel,
                        envelope.rpc_id,
                        envelope.network_id,
                        sender,
                        Some(target),
                        &envelope.payload,
                    );
                } else {
                    // a bot target runs right here
                    self.context.invoke_local_rpc(
                        envelope.rpc_id,
                        envelope.network_id,
                        sender,
                        channel,
                        &envelope.payload,
                    );
                }
            }
        }

        Ok(())
    }

    fn receive_rpc_as_client(
        &mut self,
        _from: ConnectionId,
        channel: Channel,
        reader: &mut BitReader,
    ) -> Result<(), ProtocolError> {
        let envelope = RpcEnvelope::de(reader)?;
        // traffic on the server connection is authorized by definition;
        // the envelope sender is the relayed original caller
        self.context.invoke_local_rpc(
            envelope.rpc_id,
            envelope.network_id,
            envelope.sender,
            channel,
            &envelope.payload,
        );
        Ok(())
    }

    // Drivers

    /// One replication tick: the fixed-update and batch phases across all
    /// modules, then the runtime's own spawn/despawn batch flush.
    pub fn tick(&mut self) {
        self.orchestrator.tick(&mut self.context);
        self.context.flush_batches();
    }

    /// One render frame.
    pub fn frame(&mut self, delta_seconds: f32) {
        self.orchestrator.frame(&mut self.context, delta_seconds);
    }

    pub fn cleanup(&mut self) {
        self.orchestrator.cleanup(&mut self.context);
    }

    // Host migration

    /// Promotes this client to be the server, carrying forward mirrored
    /// replication state instead of losing it to a disconnect/reconnect
    /// cycle. After promotion every identity answers authority queries as
    /// the server, and the now-invalid remote connections are severed.
    pub fn promote_to_server(&mut self) {
        if self.context.is_server() {
            warn!("promote_to_server called on a server; ignoring");
            return;
        }
        info!("host migration: promoting local client to server");

        self.context.set_role(Role::Server);
        self.context.set_server_connection(None);
        self.context.ownership.promote_to_authoritative();
        self.context.rpc.bind_role(Role::Server);

        self.orchestrator.promote(&mut self.context);

        if let Some(local) = self.context.local_player() {
            let severed = self.context.players.sever_remote_sessions(&local);
            for connection in severed {
                self.context.disconnect(connection);
            }
        } else {
            warn!("promoted without a local identity; no sessions to sever");
        }
    }

    /// Hands the session over to a newly promoted server elsewhere.
    pub fn transfer_to_new_server(&mut self, new_server: PlayerId) {
        info!(
            "host migration: transferring session to player {}",
            new_server.value()
        );
        self.orchestrator.transfer(&mut self.context, new_server);
    }
}

// The RPC envelope: signature metadata stays local to both dispatch tables;
// only the id, addressing and argument payload travel.

struct RpcEnvelope {
    rpc_id: RpcId,
    network_id: NetworkId,
    sender: PlayerId,
    target: Option<PlayerId>,
    payload: Vec<u8>,
}

impl RpcEnvelope {
    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let raw_id = read_varint(reader)?;
        let rpc_id =
            RpcId::try_from(raw_id).map_err(|_| SerdeErr::InvalidValue { type_name: "RpcId" })?;
        let network_id = NetworkId::de(reader)?;
        let sender = PlayerId::de(reader)?;
        let target = Option::<PlayerId>::de(reader)?;

        let length = read_varint(reader)?;
        let mut payload = Vec::new();
        for _ in 0..length {
            payload.push(reader.read_byte()?);
        }

        Ok(Self {
            rpc_id,
            network_id,
            sender,
            target,
            payload,
        })
    }
}
