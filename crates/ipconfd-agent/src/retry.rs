//! DHCP retry back-off while on a link-local address

use crate::state::InterfaceState;
use crate::timer::{TimerKind, Timers};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Short delay for the first attempts, long delay afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub short_delay_ms: u64,
    pub long_delay_ms: u64,
    /// Attempts that use the short delay
    pub short_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            short_delay_ms: 10_000,
            long_delay_ms: 60_000,
            short_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given how many have been scheduled
    pub fn delay_for(&self, retries: u32) -> Duration {
        if retries < self.short_attempts {
            Duration::from_millis(self.short_delay_ms)
        } else {
            Duration::from_millis(self.long_delay_ms)
        }
    }

    /// Arm the retry timer and count it
    pub fn arm(&self, timers: &mut Timers, state: &mut InterfaceState) -> Duration {
        let delay = self.delay_for(state.dhcp_retries);
        timers.arm(TimerKind::Retry, delay);
        state.dhcp_retries = state.dhcp_retries.saturating_add(1);
        delay
    }
}
