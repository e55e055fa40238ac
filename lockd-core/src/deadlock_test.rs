#[cfg(test)]
mod tests {
    use crate::config::CoordinatorConfig;
    use crate::coordinator::{AcquireRequest, LockCoordinator};
    use crate::deadlock::detect_cycles;
    use crate::infrastructure_in_memory::InMemoryLeaseStore;
    use crate::state::WaitForGraph;
    use std::sync::Arc;
    use std::time::Duration;

    /// Build a graph from `(client, lock)` waits and `(lock, holder)` holds.
    fn graph(waits: &[(&str, &str)], holds: &[(&str, &str)]) -> WaitForGraph {
        let mut graph = WaitForGraph::default();
        for (client, lock) in waits {
            graph
                .waiting_for
                .entry(client.to_string())
                .or_default()
                .insert(lock.to_string());
        }
        for (lock, holder) in holds {
            graph.held_by.insert(lock.to_string(), holder.to_string());
        }
        graph
    }

    #[test]
    fn test_two_client_cycle_reported_once() {
        let g = graph(&[("a", "L2"), ("b", "L1")], &[("L1", "a"), ("L2", "b")]);

        let reports = detect_cycles(&g, 1000);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].clients, vec!["a", "b"]);
        assert_eq!(reports[0].locks, vec!["L2", "L1"]);
        assert_eq!(reports[0].detected_at, 1000);
    }

    #[test]
    fn test_chain_without_cycle_not_reported() {
        // a waits on L2 held by b; b waits on nothing contested
        let g = graph(&[("a", "L2")], &[("L1", "a"), ("L2", "b")]);
        assert!(detect_cycles(&g, 1000).is_empty());

        // Longer chain ending at a free lock
        let g = graph(
            &[("a", "L2"), ("b", "L3"), ("c", "L4")],
            &[("L1", "a"), ("L2", "b"), ("L3", "c")],
        );
        assert!(detect_cycles(&g, 1000).is_empty());
    }

    #[test]
    fn test_diamond_not_reported() {
        // a reaches d through both b and c; no edge returns to the path
        let g = graph(
            &[("a", "L2"), ("a", "L3"), ("b", "L4"), ("c", "L4")],
            &[("L2", "b"), ("L3", "c"), ("L4", "d")],
        );
        assert!(detect_cycles(&g, 1000).is_empty());
    }

    #[test]
    fn test_three_client_cycle_normalized() {
        let g = graph(
            &[("carol", "L1"), ("alice", "L2"), ("bob", "L3")],
            &[("L1", "alice"), ("L2", "bob"), ("L3", "carol")],
        );

        let reports = detect_cycles(&g, 1000);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].clients, vec!["alice", "bob", "carol"]);
        assert_eq!(reports[0].locks, vec!["L2", "L3", "L1"]);
    }

    #[test]
    fn test_client_waiting_on_own_lock_is_a_cycle() {
        let g = graph(&[("a", "L1")], &[("L1", "a")]);

        let reports = detect_cycles(&g, 1000);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].clients, vec!["a"]);
        assert_eq!(reports[0].locks, vec!["L1"]);
    }

    #[test]
    fn test_cycle_reached_from_outside_reports_only_members() {
        // x waits into the a <-> b cycle but is not part of it
        let g = graph(
            &[("x", "L1"), ("a", "L2"), ("b", "L1")],
            &[("L1", "a"), ("L2", "b"), ("L9", "x")],
        );

        let reports = detect_cycles(&g, 1000);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].clients, vec!["a", "b"]);
    }

    #[test]
    fn test_disjoint_cycles_both_reported() {
        let g = graph(
            &[("a", "L2"), ("b", "L1"), ("c", "L4"), ("d", "L3")],
            &[("L1", "a"), ("L2", "b"), ("L3", "c"), ("L4", "d")],
        );

        let reports = detect_cycles(&g, 1000);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].clients, vec!["a", "b"]);
        assert_eq!(reports[1].clients, vec!["c", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_reports_cycle_within_interval() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let coordinator = Arc::new(LockCoordinator::new(store, CoordinatorConfig::default()));
        let mut reports = coordinator.subscribe_deadlocks();
        let tasks = coordinator.start();

        coordinator
            .acquire(AcquireRequest::new("L1", "client_a"))
            .await
            .unwrap();
        coordinator
            .acquire(AcquireRequest::new("L2", "client_b"))
            .await
            .unwrap();

        for (client, lock) in [("client_a", "L2"), ("client_b", "L1")] {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let _ = coordinator
                    .acquire(AcquireRequest::new(lock, client).wait_timeout(Duration::from_secs(60)))
                    .await;
            });
        }

        let interval = coordinator.config().detection_interval();
        let report = tokio::time::timeout(interval + Duration::from_secs(1), reports.recv())
            .await
            .expect("no deadlock reported within one detection interval")
            .unwrap();

        assert_eq!(report.clients, vec!["client_a", "client_b"]);
        assert_eq!(report.locks, vec!["L2", "L1"]);

        // Detection is advisory: both leases are still held
        assert_eq!(coordinator.list_active().len(), 2);
        assert_eq!(coordinator.waiting_clients().len(), 2);

        tasks.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_now_ignores_plain_contention() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let coordinator = Arc::new(LockCoordinator::new(store, CoordinatorConfig::default()));

        coordinator
            .acquire(AcquireRequest::new("L2", "client_b"))
            .await
            .unwrap();
        let waiter = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let _ = waiter
                .acquire(AcquireRequest::new("L2", "client_a").wait_timeout(Duration::from_secs(60)))
                .await;
        });

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(coordinator.waiting_clients()["L2"], vec!["client_a"]);
        assert!(coordinator.detect_now().is_empty());
    }
}
