use std::{collections::VecDeque, marker::PhantomData, time::Duration, time::Instant};

/// Hands out monotonically increasing u16-backed keys and recycles returned
/// ones after a cool-off, so a key observed on the wire shortly before its
/// despawn cannot immediately alias a freshly spawned object.
pub struct KeyGenerator<K: From<u16> + Into<u16> + Copy> {
    recycle_cooloff: Duration,
    recycled: VecDeque<(Instant, u16)>,
    next_key: u16,
    phantom: PhantomData<K>,
}

impl<K: From<u16> + Into<u16> + Copy> KeyGenerator<K> {
    pub fn new(recycle_cooloff: Duration) -> Self {
        Self::starting_at(0, recycle_cooloff)
    }

    /// Starts allocation at `next_key`, for allocators seeded from a
    /// remotely-supplied counter (e.g. a login response).
    pub fn starting_at(next_key: u16, recycle_cooloff: Duration) -> Self {
        Self {
            recycle_cooloff,
            recycled: VecDeque::new(),
            next_key,
            phantom: PhantomData,
        }
    }

    pub fn generate(&mut self) -> K {
        if let Some((returned_at, _)) = self.recycled.front() {
            if returned_at.elapsed() >= self.recycle_cooloff {
                // front is always the oldest return, checked above
                let (_, value) = self.recycled.pop_front().unwrap();
                return K::from(value);
            }
        }

        let value = self.next_key;
        self.next_key = self.next_key.wrapping_add(1);
        K::from(value)
    }

    /// Returns a key to the generator. It becomes available again once the
    /// cool-off has elapsed, in FIFO order.
    pub fn recycle_key(&mut self, key: &K) {
        self.recycled.push_back((Instant::now(), (*key).into()));
    }
}
