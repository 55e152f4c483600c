//! Cancellable countdown that precedes automatic dispatch.
//!
//! The controller never sleeps. The owner schedules a tick every
//! [`TICK_INTERVAL`] while the countdown reports [`Countdown::is_running`]
//! and feeds each tick back through [`Countdown::tick`]. Once a terminal
//! event has been produced every further call is a no-op, so a late timer
//! callback can't move the state.

use std::time::Duration;

use serde::Serialize;

use crate::core::model::Severity;

/// Interval between countdown ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Countdown length in seconds for a severity.
pub fn duration_for(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 5,
        Severity::High => 8,
        Severity::Medium => 12,
        Severity::Low => 8,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountdownState {
    Idle,
    Running,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Ticked { remaining: u32 },
    Expired,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    total: u32,
    remaining: u32,
    state: CountdownState,
}

impl Countdown {
    pub fn new(severity: Severity) -> Self {
        let total = duration_for(severity);
        Self {
            total,
            remaining: total,
            state: CountdownState::Idle,
        }
    }

    /// Begin counting. Returns false if already started or finished.
    pub fn start(&mut self) -> bool {
        if self.state != CountdownState::Idle {
            return false;
        }
        self.state = CountdownState::Running;
        true
    }

    /// Consume one elapsed second.
    pub fn tick(&mut self) -> Option<CountdownEvent> {
        if self.state != CountdownState::Running {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = CountdownState::Expired;
            Some(CountdownEvent::Expired)
        } else {
            Some(CountdownEvent::Ticked {
                remaining: self.remaining,
            })
        }
    }

    pub fn cancel(&mut self) -> Option<CountdownEvent> {
        match self.state {
            CountdownState::Idle | CountdownState::Running => {
                self.state = CountdownState::Cancelled;
                Some(CountdownEvent::Cancelled)
            }
            CountdownState::Expired | CountdownState::Cancelled => None,
        }
    }

    /// Skip the remaining seconds ("send now").
    pub fn force_expire(&mut self) -> Option<CountdownEvent> {
        match self.state {
            CountdownState::Idle | CountdownState::Running => {
                self.remaining = 0;
                self.state = CountdownState::Expired;
                Some(CountdownEvent::Expired)
            }
            CountdownState::Expired | CountdownState::Cancelled => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Fraction of the countdown already elapsed, 0.0-1.0.
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.total - self.remaining) as f32 / self.total as f32
    }
}
