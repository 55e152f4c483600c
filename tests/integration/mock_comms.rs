//! Recording communication port and a virtual clock for the engine.
//!
//! `Timeline` owns the engine and a queue of pending timer requests. Advancing
//! the timeline fires due timers in order and feeds them back to the engine,
//! exactly as the desktop shell does with real sleeps.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use sentinel_x::core::config::Settings;
use sentinel_x::core::contacts::{ContactStore, KeyValueStore, MemoryStore, SOS_CONTACT_KEY};
use sentinel_x::core::dispatch::engine::{DispatchEngine, TimerRequest};
use sentinel_x::core::dispatch::payload::{CommunicationIntent, CommunicationPort};
use sentinel_x::core::model::{ResponderChannel, Severity, ThreatEvent, ThreatType};

// ── Virtual clock ─────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Clock(Rc<Cell<Duration>>);

impl Clock {
    pub fn now(&self) -> Duration {
        self.0.get()
    }

    fn set(&self, at: Duration) {
        self.0.set(at);
    }
}

// ── Recording port ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Invocation {
    pub at: Duration,
    pub intent: CommunicationIntent,
}

pub struct RecordingPort {
    clock: Clock,
    pub invocations: Vec<Invocation>,
}

impl CommunicationPort for RecordingPort {
    fn open(&mut self, intent: &CommunicationIntent) {
        self.invocations.push(Invocation {
            at: self.clock.now(),
            intent: intent.clone(),
        });
    }
}

// ── Timeline ──────────────────────────────────────────────────

pub type TestEngine = DispatchEngine<RecordingPort, MemoryStore>;

pub struct Timeline {
    pub engine: TestEngine,
    clock: Clock,
    /// (due, sequence, request)
    pending: Vec<(Duration, u64, TimerRequest)>,
    seq: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::with(Settings::default(), None)
    }

    pub fn with(settings: Settings, sos_contact: Option<&str>) -> Self {
        let mut store = MemoryStore::new();
        if let Some(number) = sos_contact {
            store.set(SOS_CONTACT_KEY, number).unwrap();
        }
        let clock = Clock::default();
        let port = RecordingPort {
            clock: clock.clone(),
            invocations: Vec::new(),
        };
        Self {
            engine: DispatchEngine::new(&settings, ContactStore::new(store), port),
            clock,
            pending: Vec::new(),
            seq: 0,
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn schedule(&mut self, timers: Vec<TimerRequest>) {
        let now = self.now();
        for timer in timers {
            self.seq += 1;
            self.pending.push((now + timer.after, self.seq, timer));
        }
    }

    /// Fire every timer due within `by`, including ones scheduled meanwhile.
    pub fn advance(&mut self, by: Duration) {
        let target = self.now() + by;
        loop {
            let next = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, (due, _, _))| *due <= target)
                .min_by_key(|(_, (due, seq, _))| (*due, *seq))
                .map(|(i, _)| i);
            let Some(index) = next else { break };

            let (due, _, timer) = self.pending.remove(index);
            self.clock.set(due);
            let follow_up = self.engine.on_timer(timer.token);
            self.schedule(follow_up);
        }
        self.clock.set(target);
    }

    pub fn advance_ms(&mut self, millis: u64) {
        self.advance(ms(millis));
    }

    /// Fire timers until none remain.
    pub fn run_until_idle(&mut self) {
        let mut rounds = 0;
        while let Some(latest) = self.pending.iter().map(|(due, _, _)| *due).max() {
            let by = latest.saturating_sub(self.now());
            self.advance(by);
            rounds += 1;
            assert!(rounds < 1000, "timeline did not settle");
        }
    }

    pub fn present(&mut self, threat: ThreatEvent) {
        let timers = self.engine.present_threat(threat);
        self.schedule(timers);
    }

    pub fn send_now(&mut self) {
        let timers = self.engine.send_now().unwrap();
        self.schedule(timers);
    }

    pub fn invocations(&self) -> &[Invocation] {
        &self.engine.comms().invocations
    }

    pub fn invoked_channels(&self) -> Vec<ResponderChannel> {
        self.invocations().iter().map(|i| i.intent.channel).collect()
    }
}

pub fn threat(kind: ThreatType, severity: Severity, confidence: u32) -> ThreatEvent {
    ThreatEvent::new(
        Some(kind),
        kind.display_name(),
        confidence,
        severity,
        format!("{} detected", kind.display_name()),
    )
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
