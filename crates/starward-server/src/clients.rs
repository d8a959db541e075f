//! Per-client bookkeeping shared between the IO, session, and match
//! threads.
//!
//! Each entry is behind its own mutex and held briefly: the IO side stamps
//! last-seen and resolves addresses, the match thread drives the
//! reliability endpoint and delta tracker, the session thread reads
//! identity.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use starward_core::snapshot::PeerDeltaTracker;
use starward_net::reliable::ReliableEndpoint;

pub type SharedClient = Arc<Mutex<ClientEntry>>;

#[derive(Debug)]
pub struct ClientEntry {
    pub id: u16,
    pub username: String,
    /// IO-layer token of the TCP connection.
    pub conn_id: usize,
    pub udp_addr: Option<SocketAddr>,
    pub last_seen: Instant,
    pub endpoint: ReliableEndpoint,
    pub delta: PeerDeltaTracker,
}

#[derive(Default)]
pub struct ClientManager {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    clients: HashMap<u16, SharedClient>,
    by_addr: HashMap<SocketAddr, u16>,
    by_conn: HashMap<usize, u16>,
    next_id: u16,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authenticated TCP connection, assigning the
    /// player id.
    pub fn add_from_tcp(&self, conn_id: usize, username: String) -> (u16, SharedClient) {
        let mut inner = self.inner.lock().expect("client manager poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        let entry = Arc::new(Mutex::new(ClientEntry {
            id,
            username,
            conn_id,
            udp_addr: None,
            last_seen: Instant::now(),
            endpoint: ReliableEndpoint::new(),
            delta: PeerDeltaTracker::new(),
        }));
        inner.clients.insert(id, entry.clone());
        inner.by_conn.insert(conn_id, id);
        (id, entry)
    }

    /// Bind the player's UDP return address on first sighting.
    pub fn associate_udp(&self, id: u16, addr: SocketAddr) -> bool {
        let mut inner = self.inner.lock().expect("client manager poisoned");
        let Some(entry) = inner.clients.get(&id).cloned() else {
            return false;
        };
        entry.lock().expect("client entry poisoned").udp_addr = Some(addr);
        inner.by_addr.insert(addr, id);
        true
    }

    pub fn get(&self, id: u16) -> Option<SharedClient> {
        self.inner
            .lock()
            .expect("client manager poisoned")
            .clients
            .get(&id)
            .cloned()
    }

    pub fn by_addr(&self, addr: &SocketAddr) -> Option<SharedClient> {
        let inner = self.inner.lock().expect("client manager poisoned");
        let id = inner.by_addr.get(addr)?;
        inner.clients.get(id).cloned()
    }

    pub fn by_conn(&self, conn_id: usize) -> Option<SharedClient> {
        let inner = self.inner.lock().expect("client manager poisoned");
        let id = inner.by_conn.get(&conn_id)?;
        inner.clients.get(id).cloned()
    }

    pub fn remove(&self, id: u16) {
        let mut inner = self.inner.lock().expect("client manager poisoned");
        if let Some(entry) = inner.clients.remove(&id) {
            let entry = entry.lock().expect("client entry poisoned");
            if let Some(addr) = entry.udp_addr {
                inner.by_addr.remove(&addr);
            }
            inner.by_conn.remove(&entry.conn_id);
        }
    }

    pub fn touch(&self, id: u16) {
        if let Some(entry) = self.get(id) {
            entry.lock().expect("client entry poisoned").last_seen = Instant::now();
        }
    }

    /// Ids of clients whose UDP channel has been silent past `ttl`.
    /// Clients that never associated UDP are the TCP layer's problem.
    pub fn timed_out(&self, ttl: Duration) -> Vec<u16> {
        let inner = self.inner.lock().expect("client manager poisoned");
        let now = Instant::now();
        inner
            .clients
            .values()
            .filter_map(|shared| {
                let entry = shared.lock().expect("client entry poisoned");
                (entry.udp_addr.is_some() && now.duration_since(entry.last_seen) >= ttl)
                    .then_some(entry.id)
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner
            .lock()
            .expect("client manager poisoned")
            .clients
            .len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
