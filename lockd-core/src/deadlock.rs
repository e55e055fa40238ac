//! Wait-for cycle detection over the coordinator's local index.
//!
//! A client waiting on a lock has an edge to the lock's holder. A cycle in
//! that graph means every client on it waits on another client on it, which
//! no amount of polling will resolve. Detection is advisory: findings are
//! logged and broadcast, never acted on.

use crate::coordinator::LockCoordinator;
use crate::state::WaitForGraph;
use crate::types::DeadlockReport;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Frame<'a> {
    edges: Vec<(&'a str, &'a str)>,
    next: usize,
}

/// Outgoing `(lock, holder)` edges of a client, in lock-name order.
fn edges<'a>(graph: &'a WaitForGraph, client: &str) -> Vec<(&'a str, &'a str)> {
    graph
        .waiting_for
        .get(client)
        .into_iter()
        .flatten()
        .filter_map(|lock| {
            graph
                .held_by
                .get(lock)
                .map(|holder| (lock.as_str(), holder.as_str()))
        })
        .collect()
}

/// Rotate a cycle so it starts at its smallest client id.
fn normalize(clients: Vec<String>, locks: Vec<String>) -> (Vec<String>, Vec<String>) {
    let start = clients
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut clients = clients;
    let mut locks = locks;
    clients.rotate_left(start);
    locks.rotate_left(start);
    (clients, locks)
}

/// Find every distinct wait-for cycle in `graph`.
///
/// Runs an iterative depth-first traversal from each waiting client, keeping
/// one visited set and one on-path set per starting client. Only an edge back
/// to a client on the current path is a cycle; reaching an already finished
/// client through a second branch is not.
pub fn detect_cycles(graph: &WaitForGraph, now: u64) -> Vec<DeadlockReport> {
    let mut seen: HashSet<(Vec<String>, Vec<String>)> = HashSet::new();
    let mut reports = Vec::new();

    for start in graph.waiting_for.keys() {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_path: HashMap<&str, usize> = HashMap::new();
        // path[i + 1] holds path_locks[i], which path[i] waits on
        let mut path: Vec<&str> = Vec::new();
        let mut path_locks: Vec<&str> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        visited.insert(start.as_str());
        on_path.insert(start.as_str(), 0);
        path.push(start.as_str());
        stack.push(Frame {
            edges: edges(graph, start),
            next: 0,
        });

        loop {
            let next_edge = match stack.last_mut() {
                None => break,
                Some(frame) if frame.next < frame.edges.len() => {
                    frame.next += 1;
                    Some(frame.edges[frame.next - 1])
                }
                Some(_) => None,
            };

            match next_edge {
                Some((lock, holder)) => {
                    if let Some(&idx) = on_path.get(holder) {
                        let clients: Vec<String> =
                            path[idx..].iter().map(|c| c.to_string()).collect();
                        let mut locks: Vec<String> =
                            path_locks[idx..].iter().map(|l| l.to_string()).collect();
                        locks.push(lock.to_string());

                        let key = normalize(clients, locks);
                        if seen.insert(key.clone()) {
                            reports.push(DeadlockReport {
                                clients: key.0,
                                locks: key.1,
                                detected_at: now,
                            });
                        }
                    } else if visited.insert(holder) {
                        path_locks.push(lock);
                        path.push(holder);
                        on_path.insert(holder, path.len() - 1);
                        stack.push(Frame {
                            edges: edges(graph, holder),
                            next: 0,
                        });
                    }
                }
                None => {
                    stack.pop();
                    if let Some(client) = path.pop() {
                        on_path.remove(client);
                    }
                    if !path.is_empty() {
                        path_locks.pop();
                    }
                }
            }
        }
    }

    reports
}

/// Start the periodic detector. Stops when `shutdown` is cancelled.
pub(crate) fn spawn(
    coordinator: Arc<LockCoordinator>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; the index is empty at that point.
        timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Deadlock detector shutting down");
                    break;
                }
                _ = timer.tick() => {
                    let reports = coordinator.detect_now();
                    if !reports.is_empty() {
                        warn!(cycles = reports.len(), "Deadlock scan found wait-for cycles");
                    }
                }
            }
        }
    })
}
