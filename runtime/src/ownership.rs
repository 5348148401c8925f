use std::{
    cell::Cell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use log::info;
use rooknet_shared::{NetworkId, PlayerId};
use thiserror::Error;

/// Errors that can occur during ownership table operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// The identity was registered twice
    #[error("identity {identity:?} is already registered")]
    AlreadyRegistered { identity: String },

    /// The identity is not known to this table
    #[error("identity {identity:?} is not registered")]
    NotRegistered { identity: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MarkerState {
    owner: Option<PlayerId>,
    server_authoritative: bool,
}

/// Shared authority flag handed to whatever tracks one replicated object.
/// The table keeps the writing half; holders can answer "who owns this" and
/// "is the local side the authority" without a network round-trip, which is
/// what makes authority checks after a host migration immediate.
#[derive(Clone)]
pub struct AuthorityMarker {
    state: Rc<Cell<MarkerState>>,
}

impl AuthorityMarker {
    pub fn owner(&self) -> Option<PlayerId> {
        self.state.get().owner
    }

    pub fn is_owned_by(&self, player: &PlayerId) -> bool {
        self.state.get().owner.as_ref() == Some(player)
    }

    /// Whether the local runtime holds server authority over this identity.
    pub fn is_server_authoritative(&self) -> bool {
        self.state.get().server_authoritative
    }
}

/// Map from replicated-object identity to owning player, with a reverse
/// per-player index. The server's table is the source of truth; a client
/// holds a best-effort mirror updated only via authorized server messages.
///
/// Invariant: an identity is owned by at most one player, and removing
/// ownership clears the forward map and the reverse index together.
pub struct OwnershipTable {
    markers: HashMap<NetworkId, Rc<Cell<MarkerState>>>,
    owners: HashMap<NetworkId, PlayerId>,
    owned: HashMap<PlayerId, HashSet<NetworkId>>,
    authoritative: bool,
}

impl OwnershipTable {
    pub fn new(authoritative: bool) -> Self {
        Self {
            markers: HashMap::new(),
            owners: HashMap::new(),
            owned: HashMap::new(),
            authoritative,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Register an identity and receive its authority marker
    ///
    /// # Panics
    ///
    /// Panics if the identity is already registered.
    /// Consider using `try_register` for non-panicking error handling.
    pub fn register(&mut self, identity: NetworkId) -> AuthorityMarker {
        self.try_register(identity)
            .expect("identity cannot register with the ownership table more than once!")
    }

    /// Register an identity and receive its authority marker
    ///
    /// Returns an error if the identity is already registered.
    pub fn try_register(&mut self, identity: NetworkId) -> Result<AuthorityMarker, OwnershipError> {
        if self.markers.contains_key(&identity) {
            return Err(OwnershipError::AlreadyRegistered {
                identity: format!("{:?}", identity),
            });
        }

        let state = Rc::new(Cell::new(MarkerState {
            owner: None,
            server_authoritative: self.authoritative,
        }));
        self.markers.insert(identity, Rc::clone(&state));

        Ok(AuthorityMarker { state })
    }

    pub fn is_registered(&self, identity: &NetworkId) -> bool {
        self.markers.contains_key(identity)
    }

    /// Removes the identity and its ownership record together.
    pub fn deregister(&mut self, identity: &NetworkId) {
        self.remove_ownership(identity);
        self.markers.remove(identity);
    }

    pub fn marker(&self, identity: &NetworkId) -> Option<AuthorityMarker> {
        self.markers.get(identity).map(|state| AuthorityMarker {
            state: Rc::clone(state),
        })
    }

    /// Makes `player` the owner of `identity`. Idempotent toward the new
    /// owner; always detaches the identity from any previous owner's
    /// reverse set first, compacting empty sets away.
    ///
    /// # Panics
    ///
    /// Panics if the identity is not registered.
    pub fn give_ownership(&mut self, identity: NetworkId, player: PlayerId) {
        self.try_give_ownership(identity, player)
            .expect("identity must be registered before it can be owned!")
    }

    pub fn try_give_ownership(
        &mut self,
        identity: NetworkId,
        player: PlayerId,
    ) -> Result<(), OwnershipError> {
        let Some(state) = self.markers.get(&identity).map(Rc::clone) else {
            return Err(OwnershipError::NotRegistered {
                identity: format!("{:?}", identity),
            });
        };

        if let Some(previous) = self.owners.insert(identity, player) {
            if previous == player {
                return Ok(());
            }
            self.detach_from_owner(&identity, &previous);
        }

        self.owned.entry(player).or_default().insert(identity);

        let mut marker = state.get();
        marker.owner = Some(player);
        state.set(marker);

        Ok(())
    }

    /// Clears ownership of `identity`, if any. Forward map and reverse
    /// index are updated together.
    pub fn remove_ownership(&mut self, identity: &NetworkId) {
        let Some(previous) = self.owners.remove(identity) else {
            return;
        };
        self.detach_from_owner(identity, &previous);

        if let Some(state) = self.markers.get(identity) {
            let mut marker = state.get();
            marker.owner = None;
            state.set(marker);
        }
    }

    fn detach_from_owner(&mut self, identity: &NetworkId, owner: &PlayerId) {
        if let Some(set) = self.owned.get_mut(owner) {
            set.remove(identity);
            if set.is_empty() {
                self.owned.remove(owner);
            }
        }
    }

    pub fn try_owner(&self, identity: &NetworkId) -> Option<PlayerId> {
        self.owners.get(identity).copied()
    }

    pub fn owned_objects<'t>(&'t self, player: &PlayerId) -> impl Iterator<Item = &'t NetworkId> {
        self.owned.get(player).into_iter().flatten()
    }

    pub fn registered_identities(&self) -> impl Iterator<Item = &NetworkId> {
        self.markers.keys()
    }

    /// Host migration: re-derives a server-authoritative table from
    /// whatever mirror state this side held, and pushes server authority
    /// into every live marker so local authority checks are immediately
    /// correct.
    pub fn promote_to_authoritative(&mut self) {
        self.authoritative = true;

        for state in self.markers.values() {
            let mut marker = state.get();
            marker.server_authoritative = true;
            state.set(marker);
        }

        info!(
            "ownership table promoted to authoritative ({} identities)",
            self.markers.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::OwnershipTable;
    use rooknet_shared::{NetworkId, PlayerId, SceneId};

    fn identity(value: u16) -> NetworkId {
        NetworkId::new(SceneId::new(0), PlayerId::new(0), value)
    }

    #[test]
    fn ownership_moves_between_players() {
        let mut table = OwnershipTable::new(true);
        let id = identity(1);
        let alice = PlayerId::new(1);
        let bob = PlayerId::new(2);

        table.register(id);
        table.give_ownership(id, alice);
        assert_eq!(table.try_owner(&id), Some(alice));
        assert!(table.owned_objects(&alice).any(|owned| *owned == id));

        table.give_ownership(id, bob);
        assert_eq!(table.try_owner(&id), Some(bob));
        assert!(!table.owned_objects(&alice).any(|owned| *owned == id));
        assert!(table.owned_objects(&bob).any(|owned| *owned == id));
    }

    #[test]
    fn give_is_idempotent_toward_the_same_owner() {
        let mut table = OwnershipTable::new(true);
        let id = identity(1);
        let alice = PlayerId::new(1);

        table.register(id);
        table.give_ownership(id, alice);
        table.give_ownership(id, alice);

        assert_eq!(table.try_owner(&id), Some(alice));
        assert_eq!(table.owned_objects(&alice).count(), 1);
    }

    #[test]
    fn remove_clears_both_maps() {
        let mut table = OwnershipTable::new(true);
        let id = identity(1);
        let alice = PlayerId::new(1);

        table.register(id);
        table.give_ownership(id, alice);
        table.remove_ownership(&id);

        assert_eq!(table.try_owner(&id), None);
        assert_eq!(table.owned_objects(&alice).count(), 0);
    }

    #[test]
    fn at_most_one_owner_after_any_sequence() {
        let mut table = OwnershipTable::new(true);
        let players: Vec<PlayerId> = (1..=3).map(PlayerId::new).collect();
        let identities: Vec<_> = (1..=4).map(identity).collect();
        for id in &identities {
            table.register(*id);
        }

        // arbitrary churn
        for (step, id) in identities.iter().cycle().take(20).enumerate() {
            let player = players[step % players.len()];
            if step % 5 == 4 {
                table.remove_ownership(id);
            } else {
                table.give_ownership(*id, player);
            }
        }

        for id in &identities {
            let holders: Vec<_> = players
                .iter()
                .filter(|player| table.owned_objects(player).any(|owned| owned == id))
                .collect();
            match table.try_owner(id) {
                Some(owner) => {
                    assert_eq!(holders.len(), 1);
                    assert_eq!(*holders[0], owner);
                }
                None => assert!(holders.is_empty()),
            }
        }
    }

    #[test]
    fn markers_reflect_owner_and_promotion() {
        let mut table = OwnershipTable::new(false);
        let id = identity(1);
        let alice = PlayerId::new(1);

        let marker = table.register(id);
        assert!(!marker.is_server_authoritative());

        table.give_ownership(id, alice);
        assert!(marker.is_owned_by(&alice));

        table.promote_to_authoritative();
        assert!(marker.is_server_authoritative());
        assert_eq!(marker.owner(), Some(alice));
    }

    #[test]
    #[should_panic]
    fn double_registration_panics() {
        let mut table = OwnershipTable::new(true);
        let id = identity(1);
        table.register(id);
        table.register(id);
    }
}
