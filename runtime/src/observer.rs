use std::collections::{HashMap, HashSet};

use rooknet_shared::{NetworkId, PlayerId};

/// Which players are currently entitled to receive replication and RPC
/// traffic for each object. The game drives membership (interest
/// management, rooms, spectators); the dispatch layer only reads it.
pub struct ObserverMap {
    observers: HashMap<NetworkId, HashSet<PlayerId>>,
}

impl ObserverMap {
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
        }
    }

    /// Returns whether the player was newly added.
    pub fn add(&mut self, network_id: NetworkId, player: PlayerId) -> bool {
        self.observers.entry(network_id).or_default().insert(player)
    }

    pub fn remove(&mut self, network_id: &NetworkId, player: &PlayerId) {
        if let Some(set) = self.observers.get_mut(network_id) {
            set.remove(player);
            if set.is_empty() {
                self.observers.remove(network_id);
            }
        }
    }

    /// Forgets a departing player everywhere.
    pub fn remove_player(&mut self, player: &PlayerId) {
        self.observers.retain(|_, set| {
            set.remove(player);
            !set.is_empty()
        });
    }

    /// Forgets a despawned object.
    pub fn remove_object(&mut self, network_id: &NetworkId) {
        self.observers.remove(network_id);
    }

    pub fn is_observer(&self, network_id: &NetworkId, player: &PlayerId) -> bool {
        self.observers
            .get(network_id)
            .map(|set| set.contains(player))
            .unwrap_or(false)
    }

    pub fn observers_of<'m>(&'m self, network_id: &NetworkId) -> impl Iterator<Item = &'m PlayerId> {
        self.observers.get(network_id).into_iter().flatten()
    }

    pub fn observer_count(&self, network_id: &NetworkId) -> usize {
        self.observers
            .get(network_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }
}

impl Default for ObserverMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ObserverMap;
    use rooknet_shared::{NetworkId, PlayerId, SceneId};

    fn object(value: u16) -> NetworkId {
        NetworkId::new(SceneId::new(0), PlayerId::new(0), value)
    }

    #[test]
    fn membership_round_trips() {
        let mut map = ObserverMap::new();
        let id = object(1);
        let alice = PlayerId::new(1);

        assert!(map.add(id, alice));
        assert!(!map.add(id, alice));
        assert!(map.is_observer(&id, &alice));

        map.remove(&id, &alice);
        assert!(!map.is_observer(&id, &alice));
        assert_eq!(map.observer_count(&id), 0);
    }

    #[test]
    fn removing_a_player_clears_every_object() {
        let mut map = ObserverMap::new();
        let alice = PlayerId::new(1);
        let bob = PlayerId::new(2);

        map.add(object(1), alice);
        map.add(object(2), alice);
        map.add(object(2), bob);

        map.remove_player(&alice);

        assert_eq!(map.observer_count(&object(1)), 0);
        assert!(map.is_observer(&object(2), &bob));
    }
}
