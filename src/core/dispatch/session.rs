//! Dispatch session: countdown followed by sequential delivery.
//!
//! ```text
//!  Countdown ──Expired / send now──▶ Dispatching ──AllDispatched──▶ Done
//!      │
//!      └──Cancel──▶ Cancelled
//! ```
//!
//! [`DispatchSession::step`] consumes one [`SessionInput`] and returns the
//! effects the owner must carry out: schedule a timer, hand a payload to the
//! communication port, or publish an event. The session itself performs no
//! I/O and never waits, which keeps every transition unit-testable.
//!
//! Once `Dispatching` is entered the session can no longer be cancelled;
//! the sequence always runs to completion.

use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use super::countdown::{Countdown, CountdownEvent, TICK_INTERVAL};
use super::plan::{resolve_channels, DispatchPlan};
use super::sequencer::{
    ChannelResolver, ChannelStatus, DispatchReport, Sequencer, SequencerStep, SkipReason,
    SETTLE_DELAY,
};
use crate::core::model::{ResponderChannel, ThreatEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Countdown,
    Dispatching,
    Done,
    Cancelled,
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Countdown => "Countdown",
            Self::Dispatching => "Dispatching",
            Self::Done => "Done",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// What caused a phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTrigger {
    Expired,
    Cancel,
    AllDispatched,
}

/// Legal phase transitions. `None` means the trigger is ignored in that phase.
pub fn next_phase(phase: SessionPhase, trigger: PhaseTrigger) -> Option<SessionPhase> {
    match (phase, trigger) {
        (SessionPhase::Countdown, PhaseTrigger::Expired) => Some(SessionPhase::Dispatching),
        (SessionPhase::Countdown, PhaseTrigger::Cancel) => Some(SessionPhase::Cancelled),
        (SessionPhase::Dispatching, PhaseTrigger::AllDispatched) => Some(SessionPhase::Done),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    Start,
    Tick,
    Cancel,
    ForceExpire,
    SettleElapsed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    CountdownStarted { total: u32 },
    Ticked { remaining: u32 },
    Cancelled,
    DispatchStarted { plan: DispatchPlan },
    ChannelSending { channel: ResponderChannel },
    ChannelSkipped { channel: ResponderChannel, reason: SkipReason },
    AllDispatched { report: DispatchReport },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    ScheduleTick(Duration),
    ScheduleSettle(Duration),
    Deliver {
        channel: ResponderChannel,
        phone: String,
    },
    Emit(SessionEvent),
}

pub struct DispatchSession {
    threat: ThreatEvent,
    phase: SessionPhase,
    countdown: Countdown,
    sequencer: Sequencer,
}

impl DispatchSession {
    pub fn new(threat: ThreatEvent) -> Self {
        let plan = resolve_channels(threat.kind);
        Self {
            countdown: Countdown::new(threat.severity),
            sequencer: Sequencer::new(plan),
            threat,
            phase: SessionPhase::Countdown,
        }
    }

    pub fn step(&mut self, input: SessionInput, resolver: &impl ChannelResolver) -> Vec<SessionEffect> {
        let mut effects = Vec::new();

        match input {
            SessionInput::Start => {
                if self.countdown.start() {
                    info!(
                        "Countdown started: {}s for {} ({})",
                        self.countdown.total(),
                        self.threat.label,
                        self.threat.severity
                    );
                    effects.push(SessionEffect::Emit(SessionEvent::CountdownStarted {
                        total: self.countdown.total(),
                    }));
                    effects.push(SessionEffect::ScheduleTick(TICK_INTERVAL));
                }
            }
            SessionInput::Tick => match self.countdown.tick() {
                Some(CountdownEvent::Ticked { remaining }) => {
                    debug!("Countdown tick: {}s remaining", remaining);
                    effects.push(SessionEffect::Emit(SessionEvent::Ticked { remaining }));
                    effects.push(SessionEffect::ScheduleTick(TICK_INTERVAL));
                }
                Some(CountdownEvent::Expired) => {
                    self.begin_dispatch(resolver, &mut effects);
                }
                Some(CountdownEvent::Cancelled) | None => {
                    debug!("Ignoring tick in phase {}", self.phase.name());
                }
            },
            SessionInput::Cancel => {
                if self.phase != SessionPhase::Countdown {
                    warn!("Cancel ignored in phase {}", self.phase.name());
                } else if self.countdown.cancel().is_some() && self.transition(PhaseTrigger::Cancel) {
                    effects.push(SessionEffect::Emit(SessionEvent::Cancelled));
                }
            }
            SessionInput::ForceExpire => {
                if self.countdown.force_expire().is_some() {
                    self.begin_dispatch(resolver, &mut effects);
                }
            }
            SessionInput::SettleElapsed => {
                if self.phase != SessionPhase::Dispatching {
                    debug!("Ignoring settle in phase {}", self.phase.name());
                } else if let Some(step) = self.sequencer.settle_elapsed(resolver) {
                    self.apply_step(step, &mut effects);
                }
            }
        }

        effects
    }

    pub fn threat(&self) -> &ThreatEvent {
        &self.threat
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn plan(&self) -> &DispatchPlan {
        self.sequencer.plan()
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn current_index(&self) -> usize {
        self.sequencer.current_index()
    }

    pub fn statuses(&self) -> &[ChannelStatus] {
        self.sequencer.statuses()
    }

    fn begin_dispatch(&mut self, resolver: &impl ChannelResolver, effects: &mut Vec<SessionEffect>) {
        if !self.transition(PhaseTrigger::Expired) {
            return;
        }
        effects.push(SessionEffect::Emit(SessionEvent::DispatchStarted {
            plan: self.sequencer.plan().clone(),
        }));
        if let Some(step) = self.sequencer.begin(resolver) {
            self.apply_step(step, effects);
        }
    }

    fn apply_step(&mut self, step: SequencerStep, effects: &mut Vec<SessionEffect>) {
        match step {
            SequencerStep::Deliver { channel, phone } => {
                effects.push(SessionEffect::Emit(SessionEvent::ChannelSending { channel }));
                effects.push(SessionEffect::Deliver { channel, phone });
                effects.push(SessionEffect::ScheduleSettle(SETTLE_DELAY));
            }
            SequencerStep::Skip { channel, reason } => {
                match reason {
                    SkipReason::NoContact => warn!("Skipping {}: no phone number", channel),
                    SkipReason::AlreadyNotified => info!("Skipping {}: already notified", channel),
                }
                effects.push(SessionEffect::Emit(SessionEvent::ChannelSkipped { channel, reason }));
                effects.push(SessionEffect::ScheduleSettle(SETTLE_DELAY));
            }
            SequencerStep::Complete(report) => {
                if self.transition(PhaseTrigger::AllDispatched) {
                    effects.push(SessionEffect::Emit(SessionEvent::AllDispatched { report }));
                }
            }
        }
    }

    fn transition(&mut self, trigger: PhaseTrigger) -> bool {
        match next_phase(self.phase, trigger) {
            Some(next) => {
                info!("Dispatch session: {} -> {}", self.phase.name(), next.name());
                self.phase = next;
                true
            }
            None => false,
        }
    }
}
