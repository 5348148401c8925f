use std::collections::HashMap;

use log::{debug, error, warn};
use rooknet_shared::{
    sequence_greater_than, write_ack_prefix, write_varint, BitCounter, BitReader, BitWrite,
    BitWriter, BufferPool, Channel, ConnectionId, DespawnRecord, KeyGenerator, NetworkId,
    OwnedBitReader, OwnershipEvent, PacketType, PlayerId, Role, SceneId, SequenceNum, Serde,
    SpawnBatch, SpawnRecord,
};

use crate::{
    config::{LeavePolicy, RuntimeConfig},
    event::EventBus,
    observer::ObserverMap,
    ownership::OwnershipTable,
    rpc::{BufferedRpc, RpcDispatcher, RpcError, RpcId, RpcInbound, RpcKind, RpcSignature},
    session::PlayerRegistry,
    transport::Transport,
};

// Broadcast events published on the context's bus.

/// A replicated object came into existence locally.
#[derive(Debug, Clone, Copy)]
pub struct ObjectSpawned {
    pub record: SpawnRecord,
}

/// A replicated object went away locally.
#[derive(Debug, Clone, Copy)]
pub struct ObjectDespawned {
    pub network_id: NetworkId,
}

/// An object's owner changed (locally applied, whether authoritative or
/// mirrored).
#[derive(Debug, Clone, Copy)]
pub struct OwnershipChanged {
    pub network_id: NetworkId,
    pub owner: Option<PlayerId>,
}

/// A piggybacked unreliable-stream acknowledgment arrived; modules feed it
/// into their history trackers.
#[derive(Debug, Clone, Copy)]
pub struct AckReceived {
    pub connection: ConnectionId,
    pub sequence: SequenceNum,
}

/// A connection was closed by the runtime (violation, refusal or
/// severing); modules drop their per-connection baselines.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionClosed {
    pub connection: ConnectionId,
}

/// Everything one session owns: registries, dispatch tables, pools and the
/// transport seam. Constructed once per session and passed to every
/// subsystem; there is no process-wide state, so independent sessions can
/// coexist and tear down deterministically.
pub struct NetContext {
    config: RuntimeConfig,
    role: Role,
    local_player: Option<PlayerId>,
    server_connection: Option<ConnectionId>,
    pub players: PlayerRegistry,
    pub ownership: OwnershipTable,
    pub observers: ObserverMap,
    pub rpc: RpcDispatcher,
    pub events: EventBus,
    pub pool: BufferPool,
    transport: Box<dyn Transport>,
    network_ids: HashMap<PlayerId, KeyGenerator<u16>>,
    pending_batches: HashMap<SceneId, SpawnBatch>,
    pending_acks: HashMap<ConnectionId, SequenceNum>,
    received_acks: Vec<(ConnectionId, SequenceNum)>,
}

impl NetContext {
    pub fn new(config: RuntimeConfig, role: Role, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            role,
            local_player: None,
            server_connection: None,
            players: PlayerRegistry::new(),
            ownership: OwnershipTable::new(role.is_server()),
            observers: ObserverMap::new(),
            rpc: RpcDispatcher::new(),
            events: EventBus::new(),
            pool: BufferPool::new(),
            transport,
            network_ids: HashMap::new(),
            pending_batches: HashMap::new(),
            pending_acks: HashMap::new(),
            received_acks: Vec::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_server(&self) -> bool {
        self.role.is_server()
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    pub(crate) fn set_local_player(&mut self, player: Option<PlayerId>) {
        self.local_player = player;
    }

    /// The identity RPC authority checks run against: the local player, or
    /// the server sentinel on a dedicated server.
    pub fn caller_identity(&self) -> PlayerId {
        self.local_player.unwrap_or(PlayerId::SERVER)
    }

    pub fn server_connection(&self) -> Option<ConnectionId> {
        self.server_connection
    }

    pub(crate) fn set_server_connection(&mut self, connection: Option<ConnectionId>) {
        self.server_connection = connection;
    }

    pub fn mtu(&self, connection: ConnectionId, channel: Channel) -> usize {
        self.transport.mtu(connection, channel)
    }

    // Packet assembly. Every outgoing payload is a packet type plus a
    // body; unreliable payloads carry the ack piggyback prefix first.

    pub fn send_packet(
        &mut self,
        connection: ConnectionId,
        channel: Channel,
        packet_type: PacketType,
        write_body: impl FnOnce(&mut BitWriter),
    ) {
        let pool = self.pool.clone();
        let mut writer = pool.acquire();
        if channel.is_best_effort() {
            write_ack_prefix(&mut *writer, self.pending_acks.remove(&connection));
        }
        packet_type.ser(&mut *writer);
        write_body(&mut *writer);
        self.transport.send(connection, writer.as_bytes(), channel);
    }

    pub fn broadcast_packet(
        &mut self,
        connections: &[ConnectionId],
        channel: Channel,
        packet_type: PacketType,
        write_body: impl Fn(&mut BitWriter),
    ) {
        if channel.is_best_effort() {
            // per-connection ack prefixes make the encodes differ
            for connection in connections {
                self.send_packet(*connection, channel, packet_type, &write_body);
            }
            return;
        }

        let pool = self.pool.clone();
        let mut writer = pool.acquire();
        packet_type.ser(&mut *writer);
        write_body(&mut *writer);
        self.transport
            .broadcast(connections, writer.as_bytes(), channel);
    }

    /// Closes a connection and tells interested modules to drop their
    /// per-connection state.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.pending_acks.remove(&connection);
        self.transport.disconnect(connection);
        self.events.publish(&ConnectionClosed { connection });
    }

    // Unreliable-stream acknowledgments. At most one pending ack per
    // connection: only the latest state matters, so a newer ack
    // supersedes an older unsent one.

    pub fn schedule_ack(&mut self, connection: ConnectionId, sequence: SequenceNum) {
        match self.pending_acks.get(&connection) {
            Some(pending) if !sequence_greater_than(sequence, *pending) => {}
            _ => {
                self.pending_acks.insert(connection, sequence);
            }
        }
    }

    pub(crate) fn note_received_ack(&mut self, connection: ConnectionId, sequence: SequenceNum) {
        self.received_acks.push((connection, sequence));
        self.events.publish(&AckReceived {
            connection,
            sequence,
        });
    }

    /// Drains acks that arrived since the last call; modules feed them to
    /// their unreliable history trackers each tick.
    pub fn take_received_acks(&mut self) -> Vec<(ConnectionId, SequenceNum)> {
        std::mem::take(&mut self.received_acks)
    }

    // Spawning. Identity values are allocated per spawner from a recycling
    // generator seeded by the login response, so client-spawned ids never
    // collide with server-assigned ones.

    pub fn spawn(&mut self, scene: SceneId, owner: PlayerId, kind: u16) -> NetworkId {
        let cooloff = self.config.network_id_cooloff;
        let start = self.players.last_network_id(&owner).unwrap_or(0);
        let generator = self
            .network_ids
            .entry(owner)
            .or_insert_with(|| KeyGenerator::starting_at(start, cooloff));
        let value: u16 = generator.generate();

        let network_id = NetworkId::new(scene, owner, value);
        self.players.note_spawned_network_id(&owner, value);
        self.ownership.register(network_id);
        self.ownership.give_ownership(network_id, owner);

        let record = SpawnRecord {
            network_id,
            owner,
            kind,
        };
        self.pending_batches
            .entry(scene)
            .or_insert_with(|| SpawnBatch::new(scene))
            .spawns
            .push(record);
        self.events.publish(&ObjectSpawned { record });

        network_id
    }

    pub fn despawn(&mut self, network_id: NetworkId) {
        if !self.ownership.is_registered(&network_id) {
            warn!("despawn of unknown identity {:?} ignored", network_id);
            return;
        }

        self.ownership.deregister(&network_id);
        self.rpc.clear_object(&network_id);
        self.observers.remove_object(&network_id);
        if let Some(generator) = self.network_ids.get_mut(&network_id.spawner()) {
            generator.recycle_key(&network_id.value());
        }

        self.pending_batches
            .entry(network_id.scene())
            .or_insert_with(|| SpawnBatch::new(network_id.scene()))
            .despawns
            .push(DespawnRecord { network_id });
        self.events.publish(&ObjectDespawned { network_id });
    }

    /// Sends queued spawn/despawn batches, split as needed to respect the
    /// smallest recipient MTU. Server only; a client's local spawns reach
    /// the server through game-level RPCs.
    pub(crate) fn flush_batches(&mut self) {
        let batches: Vec<SpawnBatch> = self
            .pending_batches
            .drain()
            .map(|(_, batch)| batch)
            .filter(|batch| !batch.is_empty())
            .collect();

        if !self.role.is_server() || batches.is_empty() {
            return;
        }
        let connections = self.players.connected_connections();
        if connections.is_empty() {
            return;
        }

        let mtu_bytes = connections
            .iter()
            .map(|connection| self.transport.mtu(*connection, Channel::ReliableOrdered))
            .min()
            .expect("connection list checked non-empty above");
        // leave room for the packet type discriminant and byte padding
        let budget_bits = (mtu_bytes as u32) * 8 - 16;

        for batch in batches {
            self.emit_batch(batch, budget_bits, &connections);
        }
    }

    fn emit_batch(&mut self, batch: SpawnBatch, budget_bits: u32, connections: &[ConnectionId]) {
        let mut counter = BitCounter::new();
        batch.ser(&mut counter);
        let record_count = batch.spawns.len() + batch.despawns.len();

        if counter.bits_written() <= budget_bits || record_count <= 1 {
            if counter.bits_written() > budget_bits {
                warn!(
                    "single spawn record exceeds the {}-bit MTU budget; sending anyway",
                    budget_bits
                );
            }
            self.broadcast_packet(
                connections,
                Channel::ReliableOrdered,
                PacketType::SpawnBatch,
                |writer| batch.ser(writer),
            );
            return;
        }

        // halve and recurse; each half re-baselines from zero, so both
        // decode independently
        let mid = record_count / 2;
        let mut left = SpawnBatch::new(batch.scene);
        let mut right = SpawnBatch::new(batch.scene);
        if mid <= batch.spawns.len() {
            left.spawns = batch.spawns[..mid].to_vec();
            right.spawns = batch.spawns[mid..].to_vec();
            right.despawns = batch.despawns;
        } else {
            let despawn_mid = mid - batch.spawns.len();
            left.spawns = batch.spawns;
            left.despawns = batch.despawns[..despawn_mid].to_vec();
            right.despawns = batch.despawns[despawn_mid..].to_vec();
        }
        self.emit_batch(left, budget_bits, connections);
        self.emit_batch(right, budget_bits, connections);
    }

    // Ownership. On the server these mutate the authoritative table and
    // broadcast the change; a client applies only what the server sends.

    pub fn give_ownership(&mut self, network_id: NetworkId, player: PlayerId) {
        self.ownership.give_ownership(network_id, player);
        self.events.publish(&OwnershipChanged {
            network_id,
            owner: Some(player),
        });
        self.broadcast_ownership(network_id, Some(player));
    }

    pub fn remove_ownership(&mut self, network_id: NetworkId) {
        self.ownership.remove_ownership(&network_id);
        self.events.publish(&OwnershipChanged {
            network_id,
            owner: None,
        });
        self.broadcast_ownership(network_id, None);
    }

    fn broadcast_ownership(&mut self, network_id: NetworkId, owner: Option<PlayerId>) {
        if !self.role.is_server() {
            return;
        }
        let event = OwnershipEvent { network_id, owner };
        let connections = self.players.connected_connections();
        self.broadcast_packet(
            &connections,
            Channel::ReliableOrdered,
            PacketType::Ownership,
            |writer| event.ser(writer),
        );
    }

    /// Applies a server-sent ownership change to the local mirror.
    pub(crate) fn apply_ownership_event(&mut self, event: &OwnershipEvent) {
        if !self.ownership.is_registered(&event.network_id) {
            self.ownership.register(event.network_id);
        }
        match event.owner {
            Some(owner) => self.ownership.give_ownership(event.network_id, owner),
            None => self.ownership.remove_ownership(&event.network_id),
        }
        self.events.publish(&OwnershipChanged {
            network_id: event.network_id,
            owner: event.owner,
        });
    }

    /// Applies a server-sent spawn/despawn batch to the local mirror.
    pub(crate) fn apply_spawn_batch(&mut self, batch: &SpawnBatch) {
        for record in &batch.spawns {
            if !self.ownership.is_registered(&record.network_id) {
                self.ownership.register(record.network_id);
            }
            self.ownership.give_ownership(record.network_id, record.owner);
            self.players
                .note_spawned_network_id(&record.network_id.spawner(), record.network_id.value());
            self.events.publish(&ObjectSpawned { record: *record });
        }
        for record in &batch.despawns {
            self.ownership.deregister(&record.network_id);
            self.rpc.clear_object(&record.network_id);
            self.observers.remove_object(&record.network_id);
            self.events.publish(&ObjectDespawned {
                network_id: record.network_id,
            });
        }
    }

    /// Applies the configured leave policy to everything the departing
    /// player owned.
    pub(crate) fn apply_leave_policy(&mut self, player: &PlayerId) {
        let owned: Vec<NetworkId> = self.ownership.owned_objects(player).copied().collect();
        match self.config.leave_policy {
            LeavePolicy::DespawnOwned => {
                for network_id in owned {
                    self.despawn(network_id);
                }
            }
            LeavePolicy::ReleaseOwnership => {
                for network_id in owned {
                    self.remove_ownership(network_id);
                }
            }
        }
    }

    // Observers

    /// Adds an observer and, on the server, catches the newcomer up with
    /// the buffered latest call per signature on that object.
    pub fn add_observer(&mut self, network_id: NetworkId, player: PlayerId) {
        if !self.observers.add(network_id, player) {
            return;
        }
        if !self.role.is_server() {
            return;
        }
        let Some(connection) = self.players.connection_of(&player) else {
            // bots observe through local handlers, nothing to send
            return;
        };

        let buffered: Vec<BufferedRpc> = self.rpc.buffered_calls(&network_id).to_vec();
        for call in buffered {
            let channel = self
                .rpc
                .signature(call.rpc_id)
                .map(|signature| signature.channel)
                .unwrap_or(Channel::ReliableOrdered);
            self.send_rpc_envelope(
                connection,
                channel,
                call.rpc_id,
                network_id,
                call.sender,
                None,
                call.payload.bytes(),
            );
        }
    }

    pub fn remove_observer(&mut self, network_id: &NetworkId, player: &PlayerId) {
        self.observers.remove(network_id, player);
    }

    // RPC outbound

    /// Validates and routes an RPC call. Returns whether the call was
    /// accepted; failures are logged as errors except on best-effort
    /// channels, where a silent drop is the contract.
    pub fn send_rpc<A: Serde>(
        &mut self,
        rpc_id: RpcId,
        network_id: NetworkId,
        target: Option<PlayerId>,
        args: &A,
    ) -> bool {
        let Some(signature) = self.rpc.signature(rpc_id) else {
            error!("rpc {} is not registered; call dropped", rpc_id);
            return false;
        };

        if let Err(reason) = self.validate_outbound(&signature, &network_id, target.as_ref()) {
            if signature.channel.is_best_effort() {
                debug!("rpc {} dropped: {}", rpc_id, reason);
            } else {
                error!("rpc {} dropped: {}", rpc_id, reason);
            }
            return false;
        }

        let caller = self.caller_identity();
        let payload: Vec<u8> = {
            let pool = self.pool.clone();
            let mut writer = pool.acquire();
            args.ser(&mut *writer);
            writer.as_bytes().to_vec()
        };

        self.route_outbound(&signature, rpc_id, network_id, caller, target, &payload);
        true
    }

    fn validate_outbound(
        &self,
        signature: &RpcSignature,
        network_id: &NetworkId,
        target: Option<&PlayerId>,
    ) -> Result<(), RpcError> {
        match self.rpc.registered_role() {
            Some(bound) if bound == self.role => {}
            _ => {
                return Err(RpcError::ModuleNotRegistered { role: self.role });
            }
        }

        if !self.ownership.is_registered(network_id) {
            return Err(RpcError::NotSpawned {
                identity: format!("{:?}", network_id),
            });
        }

        let caller = self.caller_identity();
        if signature.requires_ownership
            && self.config.ownership_checks
            && self.ownership.try_owner(network_id) != Some(caller)
        {
            return Err(RpcError::NotOwner);
        }

        if signature.requires_server && self.config.server_checks && !self.role.is_server() {
            return Err(RpcError::NotServer);
        }

        if signature.kind == RpcKind::ToTarget {
            let Some(target) = target else {
                return Err(RpcError::MissingTarget);
            };
            if target.is_server_sentinel() {
                if !self.config.allow_server_target {
                    return Err(RpcError::ServerTargetNotAllowed);
                }
            } else if self.role.is_server() && !self.observers.is_observer(network_id, target) {
                return Err(RpcError::TargetNotObserver {
                    target: target.value(),
                });
            }
        }

        Ok(())
    }

    fn route_outbound(
        &mut self,
        signature: &RpcSignature,
        rpc_id: RpcId,
        network_id: NetworkId,
        caller: PlayerId,
        target: Option<PlayerId>,
        payload: &[u8],
    ) {
        match signature.kind {
            RpcKind::ToServer => {
                if self.role.is_server() {
                    if signature.run_locally {
                        self.invoke_local_rpc(rpc_id, network_id, caller, signature.channel, payload);
                    } else {
                        debug!("to-server rpc {} issued on the server; nothing to send", rpc_id);
                    }
                } else {
                    if let Some(server) = self.server_connection {
                        self.send_rpc_envelope(
                            server,
                            signature.channel,
                            rpc_id,
                            network_id,
                            caller,
                            target,
                            payload,
                        );
                    }
                    if signature.run_locally {
                        self.invoke_local_rpc(rpc_id, network_id, caller, signature.channel, payload);
                    }
                }
            }
            RpcKind::ToObservers => {
                if self.role.is_server() {
                    self.fan_out_to_observers(signature, rpc_id, network_id, caller, payload);
                    if signature.buffer_last {
                        self.rpc.buffer_latest(
                            network_id,
                            rpc_id,
                            caller,
                            OwnedBitReader::new(payload),
                        );
                    }
                    if signature.run_locally {
                        self.invoke_local_rpc(rpc_id, network_id, caller, signature.channel, payload);
                    }
                } else {
                    if let Some(server) = self.server_connection {
                        self.send_rpc_envelope(
                            server,
                            signature.channel,
                            rpc_id,
                            network_id,
                            caller,
                            target,
                            payload,
                        );
                    }
                    if signature.run_locally {
                        self.invoke_local_rpc(rpc_id, network_id, caller, signature.channel, payload);
                    }
                }
            }
            RpcKind::ToTarget => {
                let target = target.expect("to-target routing is validated before dispatch");
                if self.role.is_server() {
                    if target.is_server_sentinel() {
                        self.invoke_local_rpc(rpc_id, network_id, caller, signature.channel, payload);
                    } else if let Some(connection) = self.players.connection_of(&target) {
                        self.send_rpc_envelope(
                            connection,
                            signature.channel,
                            rpc_id,
                            network_id,
                            caller,
                            Some(target),
                            payload,
                        );
                    } else {
                        // bots have no connection; their handlers run here
                        self.invoke_local_rpc(rpc_id, network_id, caller, signature.channel, payload);
                    }
                    if signature.buffer_last {
                        self.rpc.buffer_latest(
                            network_id,
                            rpc_id,
                            caller,
                            OwnedBitReader::new(payload),
                        );
                    }
                } else if let Some(server) = self.server_connection {
                    self.send_rpc_envelope(
                        server,
                        signature.channel,
                        rpc_id,
                        network_id,
                        caller,
                        Some(target),
                        payload,
                    );
                }
            }
        }
    }

    /// Fans a to-observers call out to every observing player's
    /// connection, honoring the exclusion flags.
    pub(crate) fn fan_out_to_observers(
        &mut self,
        signature: &RpcSignature,
        rpc_id: RpcId,
        network_id: NetworkId,
        sender: PlayerId,
        payload: &[u8],
    ) {
        let owner = self.ownership.try_owner(&network_id);
        let recipients: Vec<ConnectionId> = self
            .observers
            .observers_of(&network_id)
            .filter(|player| !(signature.exclude_sender && **player == sender))
            .filter(|player| !(signature.exclude_owner && Some(**player) == owner))
            .filter_map(|player| self.players.connection_of(player))
            .collect();

        for connection in recipients {
            self.send_rpc_envelope(
                connection,
                signature.channel,
                rpc_id,
                network_id,
                sender,
                None,
                payload,
            );
        }
    }

    pub(crate) fn send_rpc_envelope(
        &mut self,
        connection: ConnectionId,
        channel: Channel,
        rpc_id: RpcId,
        network_id: NetworkId,
        sender: PlayerId,
        target: Option<PlayerId>,
        payload: &[u8],
    ) {
        self.send_packet(connection, channel, PacketType::Rpc, |writer| {
            write_varint(writer, u64::from(rpc_id));
            network_id.ser(writer);
            sender.ser(writer);
            target.ser(writer);
            write_varint(writer, payload.len() as u64);
            for byte in payload {
                writer.write_byte(*byte);
            }
        });
    }

    pub(crate) fn invoke_local_rpc(
        &mut self,
        rpc_id: RpcId,
        network_id: NetworkId,
        sender: PlayerId,
        channel: Channel,
        payload: &[u8],
    ) {
        let inbound = RpcInbound {
            rpc_id,
            network_id,
            sender,
            channel,
        };
        let mut reader = BitReader::new(payload);
        if let Err(reason) = self.rpc.invoke(&inbound, &mut reader) {
            error!("rpc {} handler failed to decode: {}", rpc_id, reason);
        }
    }
}
