use std::collections::HashMap;

use log::info;
use rooknet_shared::{
    ConnectionId, Cookie, PlayerId, PlayerJoinedEvent, PlayerLeftEvent, PlayerSnapshotEvent,
    ServerLoginResponse,
};
use thiserror::Error;

use crate::config::DuplicateSessionPolicy;

/// Errors that can occur while joining a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The transport handed us a connection key that is already bound.
    /// This is a protocol violation, not a join failure: force-disconnect
    /// the connection.
    #[error("connection {connection} is already bound to player {player}")]
    ConnectionInUse { connection: u64, player: u16 },

    /// The presented cookie belongs to a player who is still connected.
    /// Refused deterministically with no state mutation; close the new
    /// connection.
    #[error("cookie already belongs to connected player {player}")]
    DuplicateSession { player: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected,
}

struct Player {
    id: PlayerId,
    connection: Option<ConnectionId>,
    cookie: Option<Cookie>,
    last_network_id: u16,
    state: SessionState,
}

/// Everything the server must do for one successful join, in order: unicast
/// `login` then `snapshot` to the new connection, broadcast `broadcast` to
/// everyone else, then fire the joined hooks. If `evicted_connection` is
/// set, close it first.
pub struct JoinOutcome {
    pub player_id: PlayerId,
    pub reconnect: bool,
    pub evicted_connection: Option<ConnectionId>,
    pub login: ServerLoginResponse,
    pub snapshot: PlayerSnapshotEvent,
    pub broadcast: PlayerJoinedEvent,
}

pub struct LeaveOutcome {
    pub player_id: PlayerId,
    pub broadcast: PlayerLeftEvent,
}

/// Player identity lifecycle: join, cookie-based reconnection recovery,
/// leave, and the snapshot a late joiner needs. Authoritative on the
/// server; a client holds a mirror fed by the join/leave broadcasts.
///
/// Disconnected players stay in the table so a later connection presenting
/// their cookie recovers the same [`PlayerId`] instead of creating a
/// duplicate session. Bots are connectionless players: excluded from
/// connection-oriented lookups, always resolvable through identity ones.
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    by_connection: HashMap<ConnectionId, PlayerId>,
    by_cookie: HashMap<Cookie, PlayerId>,
    next_value: u16,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            by_connection: HashMap::new(),
            by_cookie: HashMap::new(),
            next_value: 0,
        }
    }

    fn allocate_value(&mut self) -> u16 {
        let value = self.next_value;
        self.next_value += 1;
        if self.next_value == u16::MAX {
            // the sentinel value is never allocated
            panic!("player id space exhausted!");
        }
        value
    }

    // Server side

    /// Admits an authenticated connection. A known cookie recovers the
    /// previous identity and marks the join as a reconnect; an unknown or
    /// absent cookie allocates a fresh player and a fresh cookie.
    ///
    /// The cookie and identity-allocator state are copied into the
    /// snapshot/broadcast only when `host_migration` is enabled.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        presented_cookie: Option<Cookie>,
        host_migration: bool,
        policy: DuplicateSessionPolicy,
    ) -> Result<JoinOutcome, SessionError> {
        if let Some(player) = self.by_connection.get(&connection) {
            return Err(SessionError::ConnectionInUse {
                connection: connection.value(),
                player: player.value(),
            });
        }

        let mut evicted_connection = None;

        let (player_id, reconnect) = match presented_cookie
            .as_ref()
            .and_then(|cookie| self.by_cookie.get(cookie).copied())
        {
            Some(existing) => {
                let player = self
                    .players
                    .get_mut(&existing)
                    .expect("cookie index points at a missing player!");

                if player.state == SessionState::Connected {
                    match policy {
                        DuplicateSessionPolicy::RefuseNew => {
                            return Err(SessionError::DuplicateSession {
                                player: existing.value(),
                            });
                        }
                        DuplicateSessionPolicy::EvictExisting => {
                            evicted_connection = player.connection.take();
                            if let Some(old) = evicted_connection {
                                self.by_connection.remove(&old);
                            }
                        }
                    }
                }

                player.state = SessionState::Connected;
                player.connection = Some(connection);
                (existing, true)
            }
            None => {
                let value = self.allocate_value();
                let id = PlayerId::new(value);
                let cookie = generate_cookie();
                self.players.insert(
                    id,
                    Player {
                        id,
                        connection: Some(connection),
                        cookie: Some(cookie.clone()),
                        last_network_id: 0,
                        state: SessionState::Connected,
                    },
                );
                self.by_cookie.insert(cookie, id);
                (id, false)
            }
        };

        self.by_connection.insert(connection, player_id);

        let player = &self.players[&player_id];
        let login = ServerLoginResponse {
            player_id,
            last_network_id: player.last_network_id,
        };
        let snapshot = PlayerSnapshotEvent {
            players: self
                .players
                .values()
                .filter(|other| other.state == SessionState::Connected && other.id != player_id)
                .map(|other| self.joined_event(other, host_migration, false))
                .collect(),
        };
        let broadcast = self.joined_event(player, host_migration, reconnect);

        info!(
            "player {} joined (reconnect: {})",
            player_id.value(),
            reconnect
        );

        Ok(JoinOutcome {
            player_id,
            reconnect,
            evicted_connection,
            login,
            snapshot,
            broadcast,
        })
    }

    fn joined_event(
        &self,
        player: &Player,
        host_migration: bool,
        reconnect: bool,
    ) -> PlayerJoinedEvent {
        PlayerJoinedEvent {
            player_id: player.id,
            connection: player.connection,
            last_network_id: host_migration.then_some(player.last_network_id),
            cookie: if host_migration {
                player.cookie.clone()
            } else {
                None
            },
            reconnect,
        }
    }

    /// Ends the session bound to a closed connection. The player record and
    /// its cookie survive for reconnection.
    pub fn leave_connection(&mut self, connection: &ConnectionId) -> Option<LeaveOutcome> {
        let player_id = self.by_connection.remove(connection)?;
        let player = self
            .players
            .get_mut(&player_id)
            .expect("connection index points at a missing player!");

        player.connection = None;
        player.state = SessionState::Disconnected;

        info!("player {} left", player_id.value());

        Some(LeaveOutcome {
            player_id,
            broadcast: PlayerLeftEvent { player_id },
        })
    }

    /// Creates a locally-driven player with no connection.
    pub fn spawn_bot(&mut self) -> PlayerId {
        let value = self.allocate_value();
        let id = PlayerId::new_bot(value);
        self.players.insert(
            id,
            Player {
                id,
                connection: None,
                cookie: None,
                last_network_id: 0,
                state: SessionState::Connected,
            },
        );
        id
    }

    /// Records that `player` spawned an object with this identity value.
    /// `last_network_id` tracks the next value the player's allocator will
    /// issue, so a future login response seeds a non-colliding floor.
    pub fn note_spawned_network_id(&mut self, player: &PlayerId, value: u16) {
        if let Some(entry) = self.players.get_mut(player) {
            if value >= entry.last_network_id {
                entry.last_network_id = value.wrapping_add(1);
            }
        }
    }

    // Client mirror

    /// Installs the identity the server assigned us.
    pub fn apply_login(&mut self, login: &ServerLoginResponse, connection: Option<ConnectionId>) {
        self.players.insert(
            login.player_id,
            Player {
                id: login.player_id,
                connection,
                cookie: None,
                last_network_id: login.last_network_id,
                state: SessionState::Connected,
            },
        );
    }

    pub fn apply_snapshot(&mut self, snapshot: &PlayerSnapshotEvent) {
        for event in &snapshot.players {
            self.apply_joined(event);
        }
    }

    pub fn apply_joined(&mut self, event: &PlayerJoinedEvent) {
        let player = Player {
            id: event.player_id,
            connection: event.connection,
            cookie: event.cookie.clone(),
            last_network_id: event.last_network_id.unwrap_or(0),
            state: SessionState::Connected,
        };
        if let Some(cookie) = &event.cookie {
            self.by_cookie.insert(cookie.clone(), event.player_id);
        }
        if let Some(connection) = event.connection {
            self.by_connection.insert(connection, event.player_id);
        }
        self.players.insert(event.player_id, player);
    }

    pub fn apply_left(&mut self, event: &PlayerLeftEvent) {
        if let Some(player) = self.players.get_mut(&event.player_id) {
            if let Some(connection) = player.connection.take() {
                self.by_connection.remove(&connection);
            }
            player.state = SessionState::Disconnected;
        }
    }

    // Host migration

    /// After promotion, every remote player's connection handle is invalid:
    /// sever them (keeping cookies for reconnection) and return the dead
    /// handles. The promoted local player stays connected.
    pub fn sever_remote_sessions(&mut self, local: &PlayerId) -> Vec<ConnectionId> {
        let mut severed = Vec::new();
        for player in self.players.values_mut() {
            if player.id == *local || player.id.is_bot() {
                continue;
            }
            if let Some(connection) = player.connection.take() {
                self.by_connection.remove(&connection);
                severed.push(connection);
            }
            player.state = SessionState::Disconnected;
        }
        severed
    }

    // Queries

    pub fn state(&self, player: &PlayerId) -> Option<SessionState> {
        self.players.get(player).map(|entry| entry.state)
    }

    pub fn is_connected(&self, player: &PlayerId) -> bool {
        self.state(player) == Some(SessionState::Connected)
    }

    pub fn connection_of(&self, player: &PlayerId) -> Option<ConnectionId> {
        self.players.get(player).and_then(|entry| entry.connection)
    }

    pub fn player_by_connection(&self, connection: &ConnectionId) -> Option<PlayerId> {
        self.by_connection.get(connection).copied()
    }

    pub fn cookie_of(&self, player: &PlayerId) -> Option<&Cookie> {
        self.players.get(player).and_then(|entry| entry.cookie.as_ref())
    }

    pub fn last_network_id(&self, player: &PlayerId) -> Option<u16> {
        self.players.get(player).map(|entry| entry.last_network_id)
    }

    pub fn connected_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players
            .values()
            .filter(|player| player.state == SessionState::Connected)
            .map(|player| player.id)
    }

    /// Connections of every connected, non-bot player.
    pub fn connected_connections(&self) -> Vec<ConnectionId> {
        self.players
            .values()
            .filter(|player| player.state == SessionState::Connected)
            .filter_map(|player| player.connection)
            .collect()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_cookie() -> Cookie {
    Cookie::new(format!("{:016x}{:016x}", fastrand::u64(..), fastrand::u64(..)))
}

#[cfg(test)]
mod tests {
    use super::{PlayerRegistry, SessionError, SessionState};
    use crate::config::DuplicateSessionPolicy;
    use rooknet_shared::ConnectionId;

    const POLICY: DuplicateSessionPolicy = DuplicateSessionPolicy::RefuseNew;

    #[test]
    fn fresh_join_allocates_monotonic_ids() {
        let mut registry = PlayerRegistry::new();

        let first = registry
            .join(ConnectionId::new(1), None, false, POLICY)
            .unwrap();
        let second = registry
            .join(ConnectionId::new(2), None, false, POLICY)
            .unwrap();

        assert_eq!(first.player_id.value(), 0);
        assert_eq!(second.player_id.value(), 1);
        assert!(!first.reconnect);

        // the second joiner's snapshot contains the first player
        assert_eq!(second.snapshot.players.len(), 1);
        assert_eq!(second.snapshot.players[0].player_id, first.player_id);
    }

    #[test]
    fn cookie_recovers_identity_on_reconnect() {
        let mut registry = PlayerRegistry::new();

        let joined = registry
            .join(ConnectionId::new(1), None, false, POLICY)
            .unwrap();
        let cookie = registry.cookie_of(&joined.player_id).unwrap().clone();

        registry.leave_connection(&ConnectionId::new(1)).unwrap();
        assert_eq!(
            registry.state(&joined.player_id),
            Some(SessionState::Disconnected)
        );

        let rejoined = registry
            .join(ConnectionId::new(2), Some(cookie), false, POLICY)
            .unwrap();

        assert_eq!(rejoined.player_id, joined.player_id);
        assert!(rejoined.reconnect);
    }

    #[test]
    fn fresh_cookie_is_a_fresh_player() {
        let mut registry = PlayerRegistry::new();

        let first = registry
            .join(ConnectionId::new(1), None, false, POLICY)
            .unwrap();
        registry.leave_connection(&ConnectionId::new(1)).unwrap();

        let second = registry
            .join(ConnectionId::new(2), None, false, POLICY)
            .unwrap();

        assert_ne!(first.player_id, second.player_id);
        assert!(!second.reconnect);
    }

    #[test]
    fn duplicate_cookie_is_refused_while_connected() {
        let mut registry = PlayerRegistry::new();

        let joined = registry
            .join(ConnectionId::new(1), None, false, POLICY)
            .unwrap();
        let cookie = registry.cookie_of(&joined.player_id).unwrap().clone();

        let result = registry.join(ConnectionId::new(2), Some(cookie), false, POLICY);

        assert_eq!(
            result.err(),
            Some(SessionError::DuplicateSession {
                player: joined.player_id.value()
            })
        );
        // no state mutation: the original session is untouched
        assert_eq!(
            registry.connection_of(&joined.player_id),
            Some(ConnectionId::new(1))
        );
    }

    #[test]
    fn evict_policy_adopts_the_new_connection() {
        let mut registry = PlayerRegistry::new();

        let joined = registry
            .join(ConnectionId::new(1), None, false, POLICY)
            .unwrap();
        let cookie = registry.cookie_of(&joined.player_id).unwrap().clone();

        let outcome = registry
            .join(
                ConnectionId::new(2),
                Some(cookie),
                false,
                DuplicateSessionPolicy::EvictExisting,
            )
            .unwrap();

        assert_eq!(outcome.player_id, joined.player_id);
        assert_eq!(outcome.evicted_connection, Some(ConnectionId::new(1)));
        assert_eq!(
            registry.connection_of(&joined.player_id),
            Some(ConnectionId::new(2))
        );
    }

    #[test]
    fn duplicate_connection_key_is_a_violation() {
        let mut registry = PlayerRegistry::new();

        registry
            .join(ConnectionId::new(1), None, false, POLICY)
            .unwrap();
        let result = registry.join(ConnectionId::new(1), None, false, POLICY);

        assert!(matches!(
            result.err(),
            Some(SessionError::ConnectionInUse { .. })
        ));
    }

    #[test]
    fn bots_are_excluded_from_connection_lookups() {
        let mut registry = PlayerRegistry::new();

        let bot = registry.spawn_bot();

        assert!(bot.is_bot());
        assert!(registry.is_connected(&bot));
        assert_eq!(registry.connection_of(&bot), None);
        assert!(registry.connected_connections().is_empty());
    }

    #[test]
    fn cookie_travels_only_with_host_migration_enabled() {
        let mut registry = PlayerRegistry::new();

        let without = registry
            .join(ConnectionId::new(1), None, false, POLICY)
            .unwrap();
        assert!(without.broadcast.cookie.is_none());
        assert!(without.broadcast.last_network_id.is_none());

        let with = registry
            .join(ConnectionId::new(2), None, true, POLICY)
            .unwrap();
        assert!(with.broadcast.cookie.is_some());
        assert!(with.broadcast.last_network_id.is_some());
    }
}
