use std::time::Duration;

use rooknet_shared::UnreliableHistoryConfig;

/// What happens when a connecting cookie already maps to a currently
/// connected player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateSessionPolicy {
    /// Refuse and close the new connection; the existing session is assumed
    /// to still be legitimate.
    RefuseNew,
    /// Close the existing (presumed stale) session and adopt the new
    /// connection.
    EvictExisting,
}

/// What happens to a departing player's owned objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeavePolicy {
    /// Despawn everything the player owned.
    DespawnOwned,
    /// Keep the objects alive with no owner; the game reassigns them.
    ReleaseOwnership,
}

#[derive(Debug, Clone, Copy)]
pub struct InterpolationConfig {
    /// Nominal interval between replication snapshots, in seconds.
    pub tick_interval: f32,
    /// Hold at the last committed value until this many snapshots are
    /// buffered; interpolating on less data shows visible jitter.
    pub min_size: usize,
    /// Drop oldest snapshots past this bound, so buffered latency cannot
    /// grow when the producer outpaces the consumer.
    pub max_size: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            tick_interval: 1.0 / 20.0,
            min_size: 2,
            max_size: 8,
        }
    }
}

/// Top-level runtime settings. One instance per session, owned by the
/// context.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Whether cookies and identity-allocator state travel in join
    /// broadcasts so any client could be promoted to server later. This is
    /// sensitive state: leave it off unless host migration is wanted.
    pub host_migration: bool,
    /// Globally disables RPC ownership validation (debug/testing aid).
    pub ownership_checks: bool,
    /// Globally disables RPC server-authority validation (debug/testing aid).
    pub server_checks: bool,
    /// Whether `to-target` RPCs may name the server sentinel as recipient.
    pub allow_server_target: bool,
    pub duplicate_session_policy: DuplicateSessionPolicy,
    pub leave_policy: LeavePolicy,
    pub unreliable_history: UnreliableHistoryConfig,
    pub interpolation: InterpolationConfig,
    /// Pending request/response entries older than this are timed out and
    /// their resources released.
    pub request_timeout: Duration,
    /// Cool-off before a despawned NetworkId value may be reissued.
    pub network_id_cooloff: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host_migration: false,
            ownership_checks: true,
            server_checks: true,
            allow_server_target: false,
            duplicate_session_policy: DuplicateSessionPolicy::RefuseNew,
            leave_policy: LeavePolicy::DespawnOwned,
            unreliable_history: UnreliableHistoryConfig::default(),
            interpolation: InterpolationConfig::default(),
            request_timeout: Duration::from_secs(10),
            network_id_cooloff: Duration::from_secs(60),
        }
    }
}
