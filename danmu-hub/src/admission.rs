//! Admission control for upstream comment fetches.
//!
//! A sliding-window counter per client identifier gates the expensive
//! upstream paths. Cache hits never reach this gate: the contract limits
//! upstream cost, not raw client traffic.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use crate::config::AdmissionConfig;

/// Sliding-window admission controller keyed by client id.
#[derive(Debug)]
pub struct AdmissionController {
    clients: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl AdmissionController {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_requests: config.max_requests,
            window: config.window(),
        }
    }

    /// Decide whether `client` may perform an upstream fetch right now.
    ///
    /// Expired entries are pruned for every tracked client on each call.
    /// A denied attempt is not recorded, so hammering while over the limit
    /// does not extend the penalty.
    pub fn admit(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock();

        clients.retain(|_, stamps| {
            stamps.retain(|stamp| now.duration_since(*stamp) < self.window);
            !stamps.is_empty()
        });

        let stamps = clients.entry(client.to_string()).or_default();
        if stamps.len() >= self.max_requests as usize {
            trace!(client, count = stamps.len(), "admission denied");
            return false;
        }
        stamps.push(now);
        true
    }

    /// Requests the client has left in the current window.
    pub fn remaining(&self, client: &str) -> u32 {
        let now = Instant::now();
        let clients = self.clients.lock();
        let used = clients
            .get(client)
            .map(|stamps| {
                stamps
                    .iter()
                    .filter(|stamp| now.duration_since(**stamp) < self.window)
                    .count()
            })
            .unwrap_or(0);
        self.max_requests.saturating_sub(used as u32)
    }

    /// Number of clients currently holding live window entries.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn clear(&self) {
        self.clients.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(max_requests: u32, window: Duration) -> AdmissionController {
        AdmissionController {
            clients: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    #[test]
    fn test_admit_up_to_max_then_deny() {
        let controller = controller(3, Duration::from_secs(60));

        assert!(controller.admit("1.2.3.4"));
        assert!(controller.admit("1.2.3.4"));
        assert!(controller.admit("1.2.3.4"));
        assert!(!controller.admit("1.2.3.4"));
        assert_eq!(controller.remaining("1.2.3.4"), 0);
    }

    #[test]
    fn test_denied_attempt_not_recorded() {
        let controller = controller(1, Duration::from_millis(50));

        assert!(controller.admit("c"));
        // Denials inside the window must not push the window forward.
        assert!(!controller.admit("c"));
        assert!(!controller.admit("c"));

        std::thread::sleep(Duration::from_millis(60));
        assert!(controller.admit("c"));
    }

    #[test]
    fn test_window_elapses() {
        let controller = controller(2, Duration::from_millis(30));

        assert!(controller.admit("c"));
        assert!(controller.admit("c"));
        assert!(!controller.admit("c"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(controller.admit("c"));
    }

    #[test]
    fn test_clients_are_independent() {
        let controller = controller(1, Duration::from_secs(60));

        assert!(controller.admit("a"));
        assert!(controller.admit("b"));
        assert!(!controller.admit("a"));
        assert!(!controller.admit("b"));
    }

    #[test]
    fn test_opportunistic_prune_drops_idle_clients() {
        let controller = controller(5, Duration::from_millis(20));

        assert!(controller.admit("idle"));
        assert_eq!(controller.tracked_clients(), 1);

        std::thread::sleep(Duration::from_millis(30));
        // A different client's request prunes the idle one.
        assert!(controller.admit("active"));
        assert_eq!(controller.tracked_clients(), 1);
    }
}
