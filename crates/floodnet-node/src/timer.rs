//! Deterministic timers keyed to the simulated clock
//!
//! A timer is a `(fire_at, token, event)` record, not an asynchronous
//! task. Arming always targets a strictly later tick, so a timer can never
//! fire within the tick that armed it. Cancellation is idempotent and
//! succeeds even if the timer already fired.

use floodnet_core::{Address, DatagramId, SimTime};

/// Handle for cancelling an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// What to do when a timer fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Re-issue the outstanding resolve request with this response id
    ResolveRetry(Address),
    /// Request retransmission of this datagram's missing fragments
    NackDelay(DatagramId),
}

#[derive(Debug, Clone)]
struct TimerEntry {
    fire_at: SimTime,
    token: TimerToken,
    event: TimerEvent,
}

/// Scheduler-owned timer records for one node
#[derive(Debug, Clone, Default)]
pub struct TimerWheel {
    entries: Vec<TimerEntry>,
    next_token: u64,
}

impl TimerWheel {
    /// Create an empty wheel
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer `delay` time units from `now`
    ///
    /// A zero delay is rounded up to one unit so the timer fires on a
    /// strictly later tick.
    pub fn arm(&mut self, now: SimTime, delay: SimTime, event: TimerEvent) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.entries.push(TimerEntry {
            fire_at: now + delay.max(1),
            token,
            event,
        });
        token
    }

    /// Cancel a timer; a no-op if it already fired or was never armed
    pub fn cancel(&mut self, token: TimerToken) {
        self.entries.retain(|entry| entry.token != token);
    }

    /// Check whether a token still refers to an armed timer
    pub fn is_armed(&self, token: TimerToken) -> bool {
        self.entries.iter().any(|entry| entry.token == token)
    }

    /// Pop every due event, in arm order
    pub fn fire(&mut self, now: SimTime) -> Vec<TimerEvent> {
        let mut due = Vec::new();
        self.entries.retain(|entry| {
            if entry.fire_at <= now {
                due.push(entry.event.clone());
                false
            } else {
                true
            }
        });
        due
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no timers are armed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_event(tag: u8) -> TimerEvent {
        TimerEvent::ResolveRetry(Address([tag; 32]))
    }

    #[test]
    fn test_fires_at_deadline() {
        let mut wheel = TimerWheel::new();
        wheel.arm(10, 5, retry_event(1));

        assert!(wheel.fire(14).is_empty());
        let fired = wheel.fire(15);
        assert_eq!(fired, vec![retry_event(1)]);
        assert!(wheel.is_empty());
    }

    #[test]
    fn test_never_fires_on_arming_tick() {
        let mut wheel = TimerWheel::new();
        wheel.arm(10, 0, retry_event(1));
        assert!(wheel.fire(10).is_empty());
        assert_eq!(wheel.fire(11).len(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut wheel = TimerWheel::new();
        let token = wheel.arm(0, 5, retry_event(1));

        wheel.cancel(token);
        assert!(!wheel.is_armed(token));
        // Cancelling again, or after firing, must not fail
        wheel.cancel(token);
        assert!(wheel.fire(100).is_empty());
    }

    #[test]
    fn test_due_events_in_arm_order() {
        let mut wheel = TimerWheel::new();
        wheel.arm(0, 3, retry_event(1));
        wheel.arm(0, 2, TimerEvent::NackDelay(DatagramId(7)));
        wheel.arm(0, 10, retry_event(2));

        let fired = wheel.fire(5);
        assert_eq!(
            fired,
            vec![retry_event(1), TimerEvent::NackDelay(DatagramId(7))]
        );
        assert_eq!(wheel.len(), 1);
    }
}
