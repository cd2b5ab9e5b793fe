//! Per-service circuit breaker (spec §4.2). After `threshold` consecutive
//! `service-unavailable` classifications the breaker opens and short-circuits
//! further calls for `cooldown`, without attempting the network round trip.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open(std::time::Instant),
}

struct Breaker {
    state: State,
    consecutive_failures: u32,
}

pub struct CircuitBreakers {
    threshold: u32,
    cooldown: Duration,
    services: Mutex<HashMap<String, Breaker>>,
}

impl CircuitBreakers {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `service` is currently open and calls should be
    /// short-circuited without attempting the request.
    pub fn is_open(&self, service: &str) -> bool {
        let mut services = self.services.lock();
        match services.get(service) {
            Some(Breaker { state: State::Open(opened_at), .. }) => {
                if opened_at.elapsed() >= self.cooldown {
                    // Half-open: let the next call through as a trial.
                    if let Some(b) = services.get_mut(service) {
                        b.state = State::Closed;
                        b.consecutive_failures = 0;
                    }
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, service: &str) {
        let mut services = self.services.lock();
        services.insert(
            service.to_string(),
            Breaker { state: State::Closed, consecutive_failures: 0 },
        );
    }

    /// Returns `true` if this failure tripped the breaker open.
    pub fn record_failure(&self, service: &str) -> bool {
        let mut services = self.services.lock();
        let entry = services.entry(service.to_string()).or_insert(Breaker {
            state: State::Closed,
            consecutive_failures: 0,
        });
        entry.consecutive_failures += 1;
        if entry.consecutive_failures >= self.threshold {
            entry.state = State::Open(Instant::now());
            true
        } else {
            false
        }
    }
}
