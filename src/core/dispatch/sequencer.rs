//! Sequential multi-channel delivery.
//!
//! Channels are processed strictly in plan order. After each channel is
//! handed off (or skipped) the owner waits [`SETTLE_DELAY`] and then calls
//! [`Sequencer::settle_elapsed`] to move on, so two deliveries never overlap.

use std::time::Duration;

use serde::Serialize;

use super::plan::DispatchPlan;
use crate::core::model::ResponderChannel;

/// Pause between consecutive channel deliveries.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1200);

/// Per-channel progress. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelStatus {
    Queued,
    Sending,
    Sent,
    Skipped,
}

impl ChannelStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Sending => 1,
            Self::Sent | Self::Skipped => 2,
        }
    }
}

/// How a channel can be reached right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Deliver(String),
    NoContact,
    AlreadyNotified,
}

pub trait ChannelResolver {
    fn resolve(&self, channel: ResponderChannel) -> Resolution;
}

impl<F> ChannelResolver for F
where
    F: Fn(ResponderChannel) -> Resolution,
{
    fn resolve(&self, channel: ResponderChannel) -> Resolution {
        self(channel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NoContact,
    AlreadyNotified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub plan: DispatchPlan,
    /// Channels that ended `Sent`, in plan order
    pub delivered: Vec<ResponderChannel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerStep {
    /// Hand the payload to the communication channel, then wait for the settle delay.
    Deliver {
        channel: ResponderChannel,
        phone: String,
    },
    /// Nothing to send for this channel, but the settle delay still applies.
    Skip {
        channel: ResponderChannel,
        reason: SkipReason,
    },
    Complete(DispatchReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequencerState {
    Idle,
    Settling,
    Complete,
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    plan: DispatchPlan,
    statuses: Vec<ChannelStatus>,
    index: usize,
    state: SequencerState,
}

impl Sequencer {
    pub fn new(plan: DispatchPlan) -> Self {
        let statuses = vec![ChannelStatus::Queued; plan.len()];
        Self {
            plan,
            statuses,
            index: 0,
            state: SequencerState::Idle,
        }
    }

    /// Process the first channel. Returns `None` if already started.
    pub fn begin(&mut self, resolver: &impl ChannelResolver) -> Option<SequencerStep> {
        if self.state != SequencerState::Idle {
            return None;
        }
        if self.plan.is_empty() {
            return Some(self.finish());
        }
        Some(self.enter(0, resolver))
    }

    /// The settle delay for the current channel has passed.
    pub fn settle_elapsed(&mut self, resolver: &impl ChannelResolver) -> Option<SequencerStep> {
        if self.state != SequencerState::Settling {
            return None;
        }
        self.advance_status(self.index, ChannelStatus::Sent);

        let next = self.index + 1;
        if next < self.plan.len() {
            Some(self.enter(next, resolver))
        } else {
            Some(self.finish())
        }
    }

    pub fn plan(&self) -> &DispatchPlan {
        &self.plan
    }

    pub fn statuses(&self) -> &[ChannelStatus] {
        &self.statuses
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn is_complete(&self) -> bool {
        self.state == SequencerState::Complete
    }

    fn enter(&mut self, index: usize, resolver: &impl ChannelResolver) -> SequencerStep {
        self.index = index;
        self.state = SequencerState::Settling;
        let channel = self.plan[index];

        match resolver.resolve(channel) {
            Resolution::Deliver(phone) if !phone.trim().is_empty() => {
                self.advance_status(index, ChannelStatus::Sending);
                SequencerStep::Deliver { channel, phone }
            }
            Resolution::Deliver(_) | Resolution::NoContact => {
                self.advance_status(index, ChannelStatus::Skipped);
                SequencerStep::Skip {
                    channel,
                    reason: SkipReason::NoContact,
                }
            }
            Resolution::AlreadyNotified => {
                self.advance_status(index, ChannelStatus::Sent);
                SequencerStep::Skip {
                    channel,
                    reason: SkipReason::AlreadyNotified,
                }
            }
        }
    }

    fn finish(&mut self) -> SequencerStep {
        self.state = SequencerState::Complete;
        let delivered = self
            .plan
            .iter()
            .zip(&self.statuses)
            .filter(|(_, status)| **status == ChannelStatus::Sent)
            .map(|(channel, _)| *channel)
            .collect();
        SequencerStep::Complete(DispatchReport {
            plan: self.plan.clone(),
            delivered,
        })
    }

    fn advance_status(&mut self, index: usize, next: ChannelStatus) {
        let current = self.statuses[index];
        if next.rank() > current.rank() {
            self.statuses[index] = next;
        }
    }
}
