//! The coordinator's local index: an advisory, single-process mirror of the
//! leases it granted and the clients currently waiting through it.

use crate::types::{CoordinatorStats, Lease};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

struct IndexedLease {
    seq: u64,
    lease: Lease,
}

#[derive(Default)]
pub struct LocalIndex {
    // lease_id -> lease, with insertion sequence for ordered listing
    active_leases: HashMap<String, IndexedLease>,
    // lock_name -> clients polling for it
    waiting_clients: HashMap<String, HashSet<String>>,
    // client_id -> locks it holds
    client_leases: HashMap<String, HashSet<String>>,
    next_seq: u64,
}

/// Wait-for graph inputs copied out of the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    /// client -> locks it is waiting on
    pub waiting_for: BTreeMap<String, BTreeSet<String>>,
    /// lock -> client holding it
    pub held_by: HashMap<String, String>,
}

impl LocalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lease the store just granted. Any local entry for the same
    /// lock is necessarily stale and is dropped.
    pub fn insert_lease(&mut self, lease: Lease) {
        let stale: Vec<(String, String)> = self
            .active_leases
            .values()
            .filter(|e| e.lease.lock_name == lease.lock_name)
            .map(|e| (e.lease.lease_id.clone(), e.lease.holder_id.clone()))
            .collect();
        for (lease_id, holder_id) in stale {
            self.remove_lease(&lease_id, &lease.lock_name, &holder_id);
        }

        self.client_leases
            .entry(lease.holder_id.clone())
            .or_default()
            .insert(lease.lock_name.clone());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.active_leases
            .insert(lease.lease_id.clone(), IndexedLease { seq, lease });
    }

    /// Drop a lease and its `client_leases` entries for `client_id` and the
    /// recorded holder.
    pub fn remove_lease(&mut self, lease_id: &str, lock_name: &str, client_id: &str) -> Option<Lease> {
        let removed = self.active_leases.remove(lease_id).map(|e| e.lease);
        self.forget_client_lock(client_id, lock_name);
        if let Some(lease) = &removed {
            if lease.holder_id != client_id {
                self.forget_client_lock(&lease.holder_id, lock_name);
            }
        }
        removed
    }

    fn forget_client_lock(&mut self, client_id: &str, lock_name: &str) {
        if let Some(locks) = self.client_leases.get_mut(client_id) {
            locks.remove(lock_name);
            if locks.is_empty() {
                self.client_leases.remove(client_id);
            }
        }
    }

    pub fn get_lease(&self, lease_id: &str) -> Option<&Lease> {
        self.active_leases.get(lease_id).map(|e| &e.lease)
    }

    /// Apply a successful renewal. Returns the updated lease if it is known
    /// locally. The stored expiry strictly increases on every renewal.
    pub fn record_renewal(&mut self, lease_id: &str, expires_at: u64) -> Option<&Lease> {
        let entry = self.active_leases.get_mut(lease_id)?;
        entry.lease.expires_at = expires_at.max(entry.lease.expires_at + 1);
        entry.lease.renewal_count += 1;
        Some(&entry.lease)
    }

    /// Leases in the order they were granted
    pub fn leases(&self) -> Vec<Lease> {
        let mut entries: Vec<&IndexedLease> = self.active_leases.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.lease.clone()).collect()
    }

    pub fn lease_count(&self) -> usize {
        self.active_leases.len()
    }

    pub fn add_waiter(&mut self, lock_name: &str, client_id: &str) {
        self.waiting_clients
            .entry(lock_name.to_string())
            .or_default()
            .insert(client_id.to_string());
    }

    pub fn remove_waiter(&mut self, lock_name: &str, client_id: &str) {
        if let Some(clients) = self.waiting_clients.get_mut(lock_name) {
            clients.remove(client_id);
            if clients.is_empty() {
                self.waiting_clients.remove(lock_name);
            }
        }
    }

    pub fn waiters(&self) -> BTreeMap<String, Vec<String>> {
        self.waiting_clients
            .iter()
            .map(|(lock, clients)| {
                let mut clients: Vec<String> = clients.iter().cloned().collect();
                clients.sort();
                (lock.clone(), clients)
            })
            .collect()
    }

    /// Drop leases whose expiry has passed locally and that the renewal loop
    /// is not keeping alive. The store already treats them as absent.
    pub fn prune_expired(&mut self, now: u64) -> Vec<Lease> {
        let expired: Vec<Lease> = self
            .active_leases
            .values()
            .filter(|e| !e.lease.auto_renew && e.lease.is_expired(now))
            .map(|e| e.lease.clone())
            .collect();
        for lease in &expired {
            self.remove_lease(&lease.lease_id, &lease.lock_name, &lease.holder_id);
        }
        expired
    }

    /// Snapshot of who waits on what and who holds what. Leases already past
    /// their local expiry are left out.
    pub fn wait_for_graph(&self, now: u64) -> WaitForGraph {
        let mut graph = WaitForGraph::default();
        for (lock_name, clients) in &self.waiting_clients {
            for client_id in clients {
                graph
                    .waiting_for
                    .entry(client_id.clone())
                    .or_default()
                    .insert(lock_name.clone());
            }
        }
        for entry in self.active_leases.values().filter(|e| !e.lease.is_expired(now)) {
            graph
                .held_by
                .insert(entry.lease.lock_name.clone(), entry.lease.holder_id.clone());
        }
        graph
    }

    pub fn stats(&self) -> CoordinatorStats {
        let active = self.active_leases.len();
        let renewals: u64 = self
            .active_leases
            .values()
            .map(|e| e.lease.renewal_count)
            .sum();
        CoordinatorStats {
            active_leases: active,
            waiting_clients: self.waiting_clients.values().map(HashSet::len).sum(),
            clients_holding: self.client_leases.len(),
            average_renewals: renewals as f64 / active.max(1) as f64,
        }
    }

    pub fn clear(&mut self) {
        self.active_leases.clear();
        self.waiting_clients.clear();
        self.client_leases.clear();
    }
}
