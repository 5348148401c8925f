use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Correlates one in-flight request with its eventual response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u16);

impl RequestId {
    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Pending-completion table for request/response RPC pairs. Nothing here
/// blocks: a request parks whatever state it borrowed (`P` is typically a
/// pooled buffer or a callback) under an allocated id, and either the
/// response completes it or [`PendingRequests::poll_timeouts`] expires it.
/// Dropping the returned `P` releases the parked resources either way.
pub struct PendingRequests<P> {
    next_id: u16,
    pending: HashMap<u16, (Instant, P)>,
    timeout: Duration,
}

impl<P> PendingRequests<P> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
            timeout,
        }
    }

    pub fn allocate(&mut self, parked: P, now: Instant) -> RequestId {
        // skip ids still in flight; with a u16 space and short timeouts a
        // collision means the peer has stopped responding entirely
        let mut id = self.next_id;
        while self.pending.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        self.next_id = id.wrapping_add(1);

        self.pending.insert(id, (now, parked));
        RequestId(id)
    }

    /// Completes a request, handing back what it parked. Returns `None` for
    /// an unknown or already-expired id.
    pub fn complete(&mut self, id: RequestId) -> Option<P> {
        self.pending.remove(&id.0).map(|(_, parked)| parked)
    }

    /// Expires requests older than the timeout, handing back their parked
    /// state so the caller can observe the failures; dropping the results
    /// releases the resources.
    pub fn poll_timeouts(&mut self, now: Instant) -> Vec<(RequestId, P)> {
        let timeout = self.timeout;
        let expired: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, (issued_at, _))| now.duration_since(*issued_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .map(|id| {
                let (_, parked) = self.pending.remove(&id).unwrap();
                (RequestId(id), parked)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::PendingRequests;
    use std::time::{Duration, Instant};

    #[test]
    fn complete_returns_the_parked_state() {
        let mut requests: PendingRequests<&'static str> =
            PendingRequests::new(Duration::from_secs(1));
        let now = Instant::now();

        let id = requests.allocate("payload", now);
        assert_eq!(requests.complete(id), Some("payload"));
        assert_eq!(requests.complete(id), None);
    }

    #[test]
    fn timeouts_release_parked_state() {
        let mut requests: PendingRequests<&'static str> =
            PendingRequests::new(Duration::from_millis(5));
        let now = Instant::now();

        let id = requests.allocate("stale", now);
        let later = now + Duration::from_millis(10);

        let expired = requests.poll_timeouts(later);
        assert_eq!(expired, vec![(id, "stale")]);
        assert!(requests.is_empty());
    }

    #[test]
    fn unexpired_requests_survive_polling() {
        let mut requests: PendingRequests<u32> = PendingRequests::new(Duration::from_secs(60));
        let now = Instant::now();

        requests.allocate(1, now);
        assert!(requests.poll_timeouts(now).is_empty());
        assert_eq!(requests.len(), 1);
    }
}
