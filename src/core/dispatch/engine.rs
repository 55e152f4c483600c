// Dispatch engine - owns the session, the manual alert and the sent registry,
// and carries out the effects they request.
//
// The engine never sleeps. Operations that start a timer return
// `TimerRequest`s; the owner waits `after` and calls `on_timer` with the
// token. Tokens carry a generation number, so a timer that outlives its
// session or manual alert is dropped instead of acting on newer state.

use std::time::Duration;

use chrono::Local;
use log::{debug, info, warn};
use serde::Serialize;

use super::manual::{ManualAlert, ManualEffect, ManualEvent, ManualPhase};
use super::payload::{build_message, CommunicationIntent, CommunicationPort, MessageKind};
use super::registry::{SentAlertRegistry, SentEntry};
use super::sequencer::{ChannelResolver, ChannelStatus, Resolution};
use super::session::{DispatchSession, SessionEffect, SessionEvent, SessionInput, SessionPhase};
use crate::core::config::{ResponderNumbers, Settings};
use crate::core::contacts::{ContactStore, KeyValueStore};
use crate::core::error::{DispatchError, DispatchResult};
use crate::core::model::{DeliveryMethod, Location, ResponderChannel, ThreatEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    CountdownTick,
    DispatchSettle,
    ManualSettle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    generation: u64,
    pub kind: TimerKind,
}

/// Call `on_timer(token)` once `after` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub token: TimerToken,
    pub after: Duration,
}

/// Notifications for the UI, collected until `drain_events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    ThreatPresented(ThreatEvent),
    /// Held until the running dispatch completes
    ThreatQueued(ThreatEvent),
    Session(SessionEvent),
    Manual(ManualEvent),
    ContactMissing {
        channel: ResponderChannel,
        message: String,
    },
    Dismissed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    pub channel: ResponderChannel,
    pub label: &'static str,
    pub emoji: &'static str,
    pub status: ChannelStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: SessionPhase,
    pub total: u32,
    pub seconds_remaining: u32,
    pub progress: f32,
    pub current_index: usize,
    pub channels: Vec<ChannelView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualView {
    pub channel: ResponderChannel,
    pub title: &'static str,
    pub emoji: &'static str,
    pub phone: String,
    pub available: bool,
    pub warning: Option<String>,
    pub phase: ManualPhase,
    pub already_sent: bool,
}

/// Everything the UI renders, in one serializable value.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub threat: Option<ThreatEvent>,
    pub location: Option<Location>,
    pub location_label: String,
    pub session: Option<SessionView>,
    pub pending_threat: Option<ThreatEvent>,
    pub manual: Option<ManualView>,
    pub sent: Vec<SentEntry>,
    pub sos_contact: String,
    pub auto_dispatch: bool,
}

/// Phone lookup used by the sequencer.
struct EngineResolver<'a> {
    responders: &'a ResponderNumbers,
    sos_contact: &'a str,
    registry: &'a SentAlertRegistry,
}

impl EngineResolver<'_> {
    fn number(&self, channel: ResponderChannel) -> &str {
        match channel {
            ResponderChannel::SosContact => self.sos_contact,
            other => self.responders.number_for(other).unwrap_or(""),
        }
    }
}

impl ChannelResolver for EngineResolver<'_> {
    fn resolve(&self, channel: ResponderChannel) -> Resolution {
        if self.registry.contains(channel) {
            return Resolution::AlreadyNotified;
        }
        let phone = self.number(channel);
        if phone.is_empty() {
            Resolution::NoContact
        } else {
            Resolution::Deliver(phone.to_string())
        }
    }
}

pub struct DispatchEngine<C: CommunicationPort, S: KeyValueStore> {
    settings: Settings,
    contacts: ContactStore<S>,
    comms: C,
    registry: SentAlertRegistry,
    threat: Option<ThreatEvent>,
    location: Option<Location>,
    session: Option<DispatchSession>,
    /// Threat that arrived while a dispatch was running
    pending_threat: Option<ThreatEvent>,
    manual: Option<ManualAlert>,
    session_generation: u64,
    manual_generation: u64,
    events: Vec<EngineEvent>,
}

impl<C: CommunicationPort, S: KeyValueStore> DispatchEngine<C, S> {
    pub fn new(settings: &Settings, contacts: ContactStore<S>, comms: C) -> Self {
        Self {
            settings: settings.clone(),
            contacts,
            comms,
            registry: SentAlertRegistry::new(),
            threat: None,
            location: None,
            session: None,
            pending_threat: None,
            manual: None,
            session_generation: 0,
            manual_generation: 0,
            events: Vec::new(),
        }
    }

    /// Takes effect for channels not yet resolved.
    pub fn update_settings(&mut self, settings: &Settings) {
        self.settings = settings.clone();
        self.refresh_manual_phone();
    }

    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    /// Present a classified threat.
    ///
    /// Typed threats start a countdown session, superseding any session that
    /// has not begun dispatching, and the sent registry starts over. While a
    /// dispatch is running the threat is held and presented once the sequence
    /// completes.
    pub fn present_threat(&mut self, threat: ThreatEvent) -> Vec<TimerRequest> {
        if !threat.is_actionable() {
            debug!("Untyped threat '{}' recorded without dispatch", threat.label);
            self.threat = Some(threat.clone());
            self.events.push(EngineEvent::ThreatPresented(threat));
            return Vec::new();
        }

        if self.session_phase() == Some(SessionPhase::Dispatching) {
            info!("Holding threat '{}' until the running dispatch completes", threat.label);
            self.pending_threat = Some(threat.clone());
            self.events.push(EngineEvent::ThreatQueued(threat));
            return Vec::new();
        }

        self.threat = Some(threat.clone());
        self.events.push(EngineEvent::ThreatPresented(threat.clone()));

        // A replaced session ends the previous threat context.
        if self.session.take().is_some() {
            debug!("Previous session superseded");
            self.registry.reset();
        }
        self.session_generation += 1;

        if !self.settings.auto_dispatch {
            info!("Auto-dispatch disabled; '{}' shown without countdown", threat.label);
            return Vec::new();
        }

        self.session = Some(DispatchSession::new(threat));
        self.drive_session(SessionInput::Start)
    }

    /// Stop the countdown. Rejected once dispatching has begun.
    pub fn cancel(&mut self) -> DispatchResult<()> {
        match self.session_phase() {
            None => Err(DispatchError::NoSession),
            Some(SessionPhase::Countdown) => {
                let timers = self.drive_session(SessionInput::Cancel);
                debug_assert!(timers.is_empty());
                self.session_generation += 1;
                Ok(())
            }
            Some(phase) => {
                warn!("Cancel rejected in phase {}", phase.name());
                Err(DispatchError::NotCancellable)
            }
        }
    }

    /// Skip the rest of the countdown and dispatch immediately.
    pub fn send_now(&mut self) -> DispatchResult<Vec<TimerRequest>> {
        match self.session_phase() {
            None => Err(DispatchError::NoSession),
            Some(SessionPhase::Countdown) => {
                info!("Countdown skipped by user");
                Ok(self.drive_session(SessionInput::ForceExpire))
            }
            Some(phase) => {
                debug!("Send now ignored in phase {}", phase.name());
                Ok(Vec::new())
            }
        }
    }

    /// Discard the session and end the threat context.
    pub fn dismiss(&mut self) -> DispatchResult<()> {
        match self.session_phase() {
            Some(SessionPhase::Dispatching) => {
                warn!("Dismiss rejected while dispatching");
                return Err(DispatchError::NotCancellable);
            }
            Some(SessionPhase::Countdown) => {
                self.drive_session(SessionInput::Cancel);
            }
            Some(SessionPhase::Done) | Some(SessionPhase::Cancelled) => {}
            None if self.threat.is_none() => return Err(DispatchError::NoSession),
            None => {}
        }

        self.session = None;
        self.session_generation += 1;
        self.threat = None;
        self.pending_threat = None;
        self.registry.reset();
        self.events.push(EngineEvent::Dismissed);
        info!("Threat context dismissed");
        Ok(())
    }

    /// Resume after a timer requested earlier. Stale tokens are ignored.
    pub fn on_timer(&mut self, token: TimerToken) -> Vec<TimerRequest> {
        match token.kind {
            TimerKind::CountdownTick | TimerKind::DispatchSettle => {
                if token.generation != self.session_generation {
                    debug!("Dropping stale {:?} timer", token.kind);
                    return Vec::new();
                }
                let input = if token.kind == TimerKind::CountdownTick {
                    SessionInput::Tick
                } else {
                    SessionInput::SettleElapsed
                };
                self.drive_session(input)
            }
            TimerKind::ManualSettle => {
                if token.generation != self.manual_generation {
                    debug!("Dropping stale manual settle timer");
                    return Vec::new();
                }
                if let Some(event) = self.manual.as_mut().and_then(|m| m.settle_elapsed()) {
                    self.events.push(EngineEvent::Manual(event));
                    self.manual = None;
                }
                Vec::new()
            }
        }
    }

    /// Open the manual alert dialog for one channel, replacing any open one.
    pub fn open_manual(&mut self, channel: ResponderChannel) -> ManualView {
        let phone = self.resolver().number(channel).to_string();
        let alert = ManualAlert::open(channel, phone);

        if let Some(message) = alert.warning() {
            warn!("{}", message);
            self.events.push(EngineEvent::ContactMissing { channel, message });
        }

        let view = self.view_of(&alert);
        self.manual_generation += 1;
        self.manual = Some(alert);
        view
    }

    /// Send the open manual alert by call or text.
    pub fn confirm_manual(&mut self, method: DeliveryMethod) -> DispatchResult<Vec<TimerRequest>> {
        let already_sent = match &self.manual {
            Some(alert) => self.registry.contains(alert.channel()),
            None => return Err(DispatchError::NoManualAlert),
        };
        let effects = match self.manual.as_mut() {
            Some(alert) => alert.confirm(method, already_sent)?,
            None => return Err(DispatchError::NoManualAlert),
        };

        let mut timers = Vec::new();
        for effect in effects {
            match effect {
                ManualEffect::Deliver {
                    channel,
                    phone,
                    method,
                } => {
                    self.registry.manual().mark(channel);
                    let intent = match method {
                        DeliveryMethod::Call => CommunicationIntent::call(channel, phone),
                        DeliveryMethod::Sms => {
                            let body = build_message(
                                MessageKind::Manual,
                                channel,
                                self.threat.as_ref(),
                                self.location.as_ref(),
                                &Local::now(),
                            );
                            CommunicationIntent::sms(channel, phone, body)
                        }
                    };
                    self.open_intent(intent);
                }
                ManualEffect::ScheduleSettle(after) => timers.push(TimerRequest {
                    token: TimerToken {
                        generation: self.manual_generation,
                        kind: TimerKind::ManualSettle,
                    },
                    after,
                }),
                ManualEffect::Emit(event) => self.events.push(EngineEvent::Manual(event)),
            }
        }
        Ok(timers)
    }

    pub fn close_manual(&mut self) -> DispatchResult<()> {
        match self.manual.take() {
            Some(mut alert) => {
                alert.close();
                self.manual_generation += 1;
                Ok(())
            }
            None => Err(DispatchError::NoManualAlert),
        }
    }

    pub fn sos_contact(&self) -> &str {
        self.contacts.get()
    }

    pub fn save_sos_contact(&mut self, value: &str) -> DispatchResult<()> {
        self.contacts.set(value)?;
        self.refresh_manual_phone();
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &SentAlertRegistry {
        &self.registry
    }

    pub fn session(&self) -> Option<&DispatchSession> {
        self.session.as_ref()
    }

    pub fn session_phase(&self) -> Option<SessionPhase> {
        self.session.as_ref().map(|s| s.phase())
    }

    pub fn comms(&self) -> &C {
        &self.comms
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let session = self.session.as_ref().map(|s| SessionView {
            phase: s.phase(),
            total: s.countdown().total(),
            seconds_remaining: s.seconds_remaining(),
            progress: s.countdown().progress(),
            current_index: s.current_index(),
            channels: s
                .plan()
                .iter()
                .zip(s.statuses())
                .map(|(channel, status)| ChannelView {
                    channel: *channel,
                    label: channel.label(),
                    emoji: channel.emoji(),
                    status: *status,
                })
                .collect(),
        });

        EngineSnapshot {
            threat: self.threat.clone(),
            location: self.location.clone(),
            location_label: Location::describe(self.location.as_ref()).to_string(),
            session,
            pending_threat: self.pending_threat.clone(),
            manual: self.manual_view(),
            sent: self.registry.entries(),
            sos_contact: self.contacts.get().to_string(),
            auto_dispatch: self.settings.auto_dispatch,
        }
    }

    fn manual_view(&self) -> Option<ManualView> {
        self.manual.as_ref().map(|m| self.view_of(m))
    }

    fn view_of(&self, alert: &ManualAlert) -> ManualView {
        let channel = alert.channel();
        ManualView {
            channel,
            title: channel.title(),
            emoji: channel.emoji(),
            phone: alert.phone().to_string(),
            available: alert.is_available(),
            warning: alert.warning(),
            phase: alert.phase(),
            already_sent: self.registry.contains(channel),
        }
    }

    /// Re-read the number of an unconfirmed manual alert.
    fn refresh_manual_phone(&mut self) {
        let channel = match &self.manual {
            Some(alert) if alert.phase() == ManualPhase::Composing => alert.channel(),
            _ => return,
        };
        let phone = self.resolver().number(channel).to_string();
        self.manual = Some(ManualAlert::open(channel, phone));
    }

    fn resolver(&self) -> EngineResolver<'_> {
        EngineResolver {
            responders: &self.settings.responders,
            sos_contact: self.contacts.get(),
            registry: &self.registry,
        }
    }

    fn drive_session(&mut self, input: SessionInput) -> Vec<TimerRequest> {
        let effects = match self.session.as_mut() {
            Some(session) => {
                let resolver = EngineResolver {
                    responders: &self.settings.responders,
                    sos_contact: self.contacts.get(),
                    registry: &self.registry,
                };
                session.step(input, &resolver)
            }
            None => return Vec::new(),
        };

        let mut timers = Vec::new();
        let mut completed = false;

        for effect in effects {
            match effect {
                SessionEffect::ScheduleTick(after) => {
                    timers.push(self.session_timer(TimerKind::CountdownTick, after))
                }
                SessionEffect::ScheduleSettle(after) => {
                    timers.push(self.session_timer(TimerKind::DispatchSettle, after))
                }
                SessionEffect::Deliver { channel, phone } => {
                    self.registry.auto().mark(channel);
                    let body = build_message(
                        MessageKind::Auto,
                        channel,
                        self.session.as_ref().map(|s| s.threat()),
                        self.location.as_ref(),
                        &Local::now(),
                    );
                    self.open_intent(CommunicationIntent::sms(channel, phone, body));
                }
                SessionEffect::Emit(event) => {
                    if let SessionEvent::AllDispatched { report } = &event {
                        self.registry.auto().mark_all(&report.delivered);
                        info!(
                            "Dispatch complete: {}/{} channels notified",
                            report.delivered.len(),
                            report.plan.len()
                        );
                        completed = true;
                    }
                    self.events.push(EngineEvent::Session(event));
                }
            }
        }

        if completed {
            if let Some(next) = self.pending_threat.take() {
                timers.extend(self.present_threat(next));
            }
        }
        timers
    }

    fn session_timer(&self, kind: TimerKind, after: Duration) -> TimerRequest {
        TimerRequest {
            token: TimerToken {
                generation: self.session_generation,
                kind,
            },
            after,
        }
    }

    fn open_intent(&mut self, intent: CommunicationIntent) {
        info!(
            "Opening {:?} intent for {} to {}",
            intent.method, intent.channel, intent.phone
        );
        self.comms.open(&intent);
    }
}
