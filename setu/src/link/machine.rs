//! Connectivity state machine
//!
//! Pure transition logic: the monitor feeds it events and carries out the
//! actions it returns, so every transition can be tested without a network.

use super::ConnectivityState;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Link events reported by a [`Station`](super::Station)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Station interface came up
    StationStarted,
    /// Link lost or a connect attempt failed
    Disconnected { reason: String },
    /// Link is usable
    AddressAcquired(IpAddr),
}

/// What the monitor should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Issue a connect attempt once `after` has elapsed
    Connect { after: Duration },
}

/// Delay between a disconnect and the next connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Reconnect at once, forever
    #[default]
    Immediate,
    /// Same delay every time
    Fixed { delay_ms: u64 },
    /// `initial_ms * 2^failures`, capped at `max_ms`
    Exponential { initial_ms: u64, max_ms: u64 },
}

impl BackoffPolicy {
    /// Delay before the attempt following `failures` consecutive failures
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            BackoffPolicy::Immediate => Duration::ZERO,
            BackoffPolicy::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            BackoffPolicy::Exponential { initial_ms, max_ms } => {
                let factor = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
                Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms))
            }
        }
    }
}

/// Connectivity state machine
#[derive(Debug)]
pub struct ConnectivityMachine {
    state: ConnectivityState,
    backoff: BackoffPolicy,
    /// Consecutive disconnects since the last successful connect
    failures: u32,
}

impl ConnectivityMachine {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            backoff,
            failures: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Consecutive failed attempts
    #[inline]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Apply an event; returns the action the monitor must take, if any
    pub fn on_event(&mut self, event: &LinkEvent) -> Option<LinkAction> {
        match event {
            LinkEvent::StationStarted => {
                if self.state == ConnectivityState::Connected {
                    return None;
                }
                self.state = ConnectivityState::Connecting;
                Some(LinkAction::Connect {
                    after: Duration::ZERO,
                })
            }
            LinkEvent::Disconnected { .. } => {
                self.state = ConnectivityState::Disconnected;
                let after = self.backoff.delay(self.failures);
                self.failures = self.failures.saturating_add(1);
                Some(LinkAction::Connect { after })
            }
            LinkEvent::AddressAcquired(_) => {
                self.state = ConnectivityState::Connected;
                self.failures = 0;
                None
            }
        }
    }

    /// A scheduled connect attempt is being issued
    pub fn begin_attempt(&mut self) {
        if self.state == ConnectivityState::Disconnected {
            self.state = ConnectivityState::Connecting;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn lost() -> LinkEvent {
        LinkEvent::Disconnected {
            reason: "beacon timeout".to_string(),
        }
    }

    fn up() -> LinkEvent {
        LinkEvent::AddressAcquired(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)))
    }

    #[test]
    fn test_startup_sequence() {
        let mut m = ConnectivityMachine::new(BackoffPolicy::Immediate);
        assert_eq!(m.state(), ConnectivityState::Disconnected);

        let action = m.on_event(&LinkEvent::StationStarted);
        assert_eq!(action, Some(LinkAction::Connect { after: Duration::ZERO }));
        assert_eq!(m.state(), ConnectivityState::Connecting);

        assert_eq!(m.on_event(&up()), None);
        assert_eq!(m.state(), ConnectivityState::Connected);
    }

    #[test]
    fn test_disconnect_from_any_state_reconnects() {
        for setup in [vec![], vec![LinkEvent::StationStarted], vec![up()]] {
            let mut m = ConnectivityMachine::new(BackoffPolicy::Immediate);
            for event in &setup {
                m.on_event(event);
            }
            let action = m.on_event(&lost());
            assert_eq!(action, Some(LinkAction::Connect { after: Duration::ZERO }));
            assert_eq!(m.state(), ConnectivityState::Disconnected);

            m.begin_attempt();
            assert_eq!(m.state(), ConnectivityState::Connecting);
        }
    }

    #[test]
    fn test_station_start_while_connected_is_ignored() {
        let mut m = ConnectivityMachine::new(BackoffPolicy::Immediate);
        m.on_event(&up());
        assert_eq!(m.on_event(&LinkEvent::StationStarted), None);
        assert_eq!(m.state(), ConnectivityState::Connected);
    }

    #[test]
    fn test_begin_attempt_does_not_demote_connected() {
        let mut m = ConnectivityMachine::new(BackoffPolicy::Immediate);
        m.on_event(&up());
        m.begin_attempt();
        assert_eq!(m.state(), ConnectivityState::Connected);
    }

    #[test]
    fn test_exponential_backoff_grows_and_resets() {
        let mut m = ConnectivityMachine::new(BackoffPolicy::Exponential {
            initial_ms: 100,
            max_ms: 350,
        });

        let delays: Vec<_> = (0..4)
            .map(|_| match m.on_event(&lost()) {
                Some(LinkAction::Connect { after }) => after,
                None => panic!("disconnect must schedule a reconnect"),
            })
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(350),
                Duration::from_millis(350),
            ]
        );
        assert_eq!(m.failures(), 4);

        m.on_event(&up());
        assert_eq!(m.failures(), 0);
        assert_eq!(
            m.on_event(&lost()),
            Some(LinkAction::Connect {
                after: Duration::from_millis(100)
            })
        );
    }

    #[test]
    fn test_backoff_policies() {
        assert_eq!(BackoffPolicy::Immediate.delay(7), Duration::ZERO);
        assert_eq!(
            BackoffPolicy::Fixed { delay_ms: 500 }.delay(3),
            Duration::from_millis(500)
        );
        let exp = BackoffPolicy::Exponential {
            initial_ms: 1000,
            max_ms: 60_000,
        };
        assert_eq!(exp.delay(200), Duration::from_millis(60_000));
    }
}
