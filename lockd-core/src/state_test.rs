#[cfg(test)]
mod tests {
    use crate::state::LocalIndex;
    use crate::types::{Lease, Metadata};
    use std::time::Duration;

    fn create_lease(lock: &str, lease_id: &str, holder: &str, now: u64) -> Lease {
        Lease::new(
            lock.to_string(),
            lease_id.to_string(),
            holder.to_string(),
            Duration::from_millis(5000),
            false,
            Metadata::new(),
            now,
        )
    }

    #[test]
    fn test_leases_listed_in_insertion_order() {
        let mut index = LocalIndex::new();
        index.insert_lease(create_lease("zeta", "l1", "a", 1000));
        index.insert_lease(create_lease("alpha", "l2", "b", 1000));
        index.insert_lease(create_lease("mid", "l3", "a", 1000));

        let ids: Vec<String> = index.leases().into_iter().map(|l| l.lease_id).collect();
        assert_eq!(ids, vec!["l1", "l2", "l3"]);
        assert_eq!(index.stats().clients_holding, 2);
    }

    #[test]
    fn test_remove_lease_cleans_client_index() {
        let mut index = LocalIndex::new();
        index.insert_lease(create_lease("res1", "l1", "a", 1000));

        let removed = index.remove_lease("l1", "res1", "a");
        assert_eq!(removed.map(|l| l.lease_id), Some("l1".to_string()));
        assert_eq!(index.lease_count(), 0);
        assert_eq!(index.stats().clients_holding, 0);

        // Unknown lease is a no-op
        assert!(index.remove_lease("l1", "res1", "a").is_none());
    }

    #[test]
    fn test_new_lease_replaces_stale_entry_for_same_lock() {
        let mut index = LocalIndex::new();
        index.insert_lease(create_lease("res1", "old", "a", 1000));
        index.insert_lease(create_lease("res1", "new", "b", 9000));

        let leases = index.leases();
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].holder_id, "b");
        assert_eq!(index.stats().clients_holding, 1);
    }

    #[test]
    fn test_renewal_updates_expiry_and_count() {
        let mut index = LocalIndex::new();
        index.insert_lease(create_lease("res1", "l1", "a", 1000));

        let lease = index.record_renewal("l1", 20_000).cloned();
        let lease = lease.expect("lease should be indexed");
        assert_eq!(lease.expires_at, 20_000);
        assert_eq!(lease.renewal_count, 1);
        assert!(index.record_renewal("missing", 20_000).is_none());
    }

    #[test]
    fn test_renewal_never_moves_expiry_backwards() {
        let mut index = LocalIndex::new();
        index.insert_lease(create_lease("res1", "l1", "a", 1000));

        let first = index.record_renewal("l1", 20_000).map(|l| l.expires_at);
        assert_eq!(first, Some(20_000));

        // Same requested expiry twice, then a shorter one
        let same = index.record_renewal("l1", 20_000).map(|l| l.expires_at);
        assert_eq!(same, Some(20_001));
        let shorter = index.record_renewal("l1", 5_000).map(|l| l.expires_at);
        assert_eq!(shorter, Some(20_002));
    }

    #[test]
    fn test_waiters_use_set_semantics_and_prune_empty_locks() {
        let mut index = LocalIndex::new();
        index.add_waiter("res1", "b");
        index.add_waiter("res1", "b");
        index.add_waiter("res1", "c");
        assert_eq!(index.waiters()["res1"], vec!["b", "c"]);
        assert_eq!(index.stats().waiting_clients, 2);

        index.remove_waiter("res1", "b");
        index.remove_waiter("res1", "c");
        assert!(index.waiters().is_empty());
    }

    #[test]
    fn test_prune_expired_skips_auto_renew() {
        let mut index = LocalIndex::new();
        index.insert_lease(create_lease("res1", "l1", "a", 1000));
        let mut renewing = create_lease("res2", "l2", "a", 1000);
        renewing.auto_renew = true;
        index.insert_lease(renewing);

        // Not expired yet
        assert!(index.prune_expired(5000).is_empty());

        let pruned = index.prune_expired(7000);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].lease_id, "l1");
        assert_eq!(index.lease_count(), 1);
    }

    #[test]
    fn test_wait_for_graph_ignores_expired_holders() {
        let mut index = LocalIndex::new();
        index.insert_lease(create_lease("res1", "l1", "a", 1000));
        index.add_waiter("res1", "b");

        let graph = index.wait_for_graph(2000);
        assert_eq!(graph.held_by.get("res1"), Some(&"a".to_string()));
        assert!(graph.waiting_for["b"].contains("res1"));

        let graph = index.wait_for_graph(7000);
        assert!(graph.held_by.is_empty());
    }

    #[test]
    fn test_stats_average_renewals() {
        let mut index = LocalIndex::new();
        assert_eq!(index.stats().average_renewals, 0.0);

        index.insert_lease(create_lease("res1", "l1", "a", 1000));
        index.insert_lease(create_lease("res2", "l2", "b", 1000));
        index.record_renewal("l1", 9000);
        index.record_renewal("l1", 9500);

        let stats = index.stats();
        assert_eq!(stats.active_leases, 2);
        assert_eq!(stats.average_renewals, 1.0);

        index.clear();
        assert_eq!(index.stats().active_leases, 0);
    }
}
