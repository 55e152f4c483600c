//! End-to-end automatic dispatch scenarios on the virtual timeline.

use crate::mock_comms::{ms, threat, Timeline};
use sentinel_x::core::config::{ResponderNumbers, Settings};
use sentinel_x::core::dispatch::engine::EngineEvent;
use sentinel_x::core::dispatch::registry::SentOrigin;
use sentinel_x::core::dispatch::sequencer::{ChannelStatus, SETTLE_DELAY};
use sentinel_x::core::dispatch::session::{SessionEvent, SessionPhase};
use sentinel_x::core::error::DispatchError;
use sentinel_x::core::model::{
    DeliveryMethod, Location, ResponderChannel, Severity, ThreatEvent, ThreatType,
};

use ResponderChannel::{Fire, Hospital, Police};

#[test]
fn gunshot_critical_dispatches_police_after_five_seconds() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Gunshot, Severity::Critical, 94));

    let snapshot = t.engine.snapshot();
    let session = snapshot.session.unwrap();
    assert_eq!(session.seconds_remaining, 5);
    assert_eq!(session.channels.len(), 1);

    t.advance_ms(4999);
    assert!(t.invocations().is_empty());
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Countdown));
    assert_eq!(t.engine.session().unwrap().seconds_remaining(), 1);

    t.advance_ms(1);
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Dispatching));
    assert_eq!(t.invoked_channels(), vec![Police]);
    assert_eq!(t.invocations()[0].at, ms(5000));
    assert_eq!(t.invocations()[0].intent.phone, "911");
    assert_eq!(t.invocations()[0].intent.method, DeliveryMethod::Sms);

    t.advance(SETTLE_DELAY);
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Done));
    assert_eq!(t.engine.registry().len(), 1);
    assert_eq!(t.engine.registry().origin(Police), Some(SentOrigin::Auto));

    t.run_until_idle();
    assert_eq!(t.invocations().len(), 1);
}

#[test]
fn cancelling_explosion_countdown_sends_nothing() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Explosion, Severity::High, 80));
    assert_eq!(t.engine.session().unwrap().plan(), &vec![Police, Fire]);

    t.advance_ms(3000);
    assert_eq!(t.engine.session().unwrap().seconds_remaining(), 5);
    t.engine.cancel().unwrap();

    t.run_until_idle();
    assert!(t.invocations().is_empty());
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Cancelled));
    assert!(t.engine.registry().is_empty());
    assert!(!t.engine.drain_events().iter().any(|e| matches!(
        e,
        EngineEvent::Session(SessionEvent::AllDispatched { .. })
    )));
}

#[test]
fn send_now_collapses_countdown_and_keeps_spacing() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Collision, Severity::High, 85));

    t.advance_ms(1000);
    t.send_now();
    assert_eq!(t.engine.session().unwrap().seconds_remaining(), 0);
    assert_eq!(t.invoked_channels(), vec![Police]);

    t.advance(SETTLE_DELAY);
    assert_eq!(t.invoked_channels(), vec![Police, Hospital]);
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Dispatching));

    t.advance(SETTLE_DELAY);
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Done));

    let times: Vec<_> = t.invocations().iter().map(|i| i.at).collect();
    assert_eq!(times, vec![ms(1000), ms(2200)]);
    assert!(t.engine.registry().contains(Police));
    assert!(t.engine.registry().contains(Hospital));

    t.run_until_idle();
    assert_eq!(t.invocations().len(), 2);
}

#[test]
fn all_dispatched_is_emitted_once() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Scream, Severity::Medium, 70));
    t.run_until_idle();

    let completions = t
        .engine
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::Session(SessionEvent::AllDispatched { .. })))
        .count();
    assert_eq!(completions, 1);
    assert_eq!(t.invocations()[0].at, ms(12_000));
}

#[test]
fn missing_public_number_is_skipped_but_delayed() {
    let settings = Settings {
        responders: ResponderNumbers {
            fire: "  ".to_string(),
            ..ResponderNumbers::default()
        },
        auto_dispatch: true,
    };
    let mut t = Timeline::with(settings, None);
    t.present(threat(ThreatType::Fire, Severity::High, 90));
    t.send_now();

    assert!(t.invocations().is_empty());
    let statuses = t.engine.session().unwrap().statuses().to_vec();
    assert_eq!(statuses, vec![ChannelStatus::Skipped, ChannelStatus::Queued]);

    t.advance(SETTLE_DELAY);
    assert_eq!(t.invoked_channels(), vec![Police]);
    assert_eq!(t.invocations()[0].at, SETTLE_DELAY);

    t.run_until_idle();
    assert!(!t.engine.registry().contains(Fire));
    assert_eq!(
        t.engine.session().unwrap().statuses(),
        &[ChannelStatus::Skipped, ChannelStatus::Sent]
    );
}

#[test]
fn cancel_and_dismiss_are_rejected_mid_sequence() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Explosion, Severity::Critical, 99));
    t.send_now();

    assert!(matches!(t.engine.cancel(), Err(DispatchError::NotCancellable)));
    assert!(matches!(t.engine.dismiss(), Err(DispatchError::NotCancellable)));

    t.run_until_idle();
    assert_eq!(t.invoked_channels(), vec![Police, Fire]);
    t.engine.dismiss().unwrap();
    assert!(t.engine.registry().is_empty());
}

#[test]
fn threat_during_dispatch_waits_for_completion() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Gunshot, Severity::Critical, 95));
    t.send_now();

    t.present(threat(ThreatType::Gas, Severity::Critical, 75));
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Dispatching));

    t.advance(SETTLE_DELAY);
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Countdown));
    assert_eq!(t.engine.snapshot().threat.unwrap().kind, Some(ThreatType::Gas));

    t.run_until_idle();
    assert_eq!(t.invoked_channels(), vec![Police, Fire]);
    assert_eq!(t.invocations()[1].at, SETTLE_DELAY + ms(5000));
}

#[test]
fn next_threat_after_completion_notifies_again() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Gunshot, Severity::Critical, 94));
    t.run_until_idle();
    assert_eq!(t.engine.session_phase(), Some(SessionPhase::Done));
    assert_eq!(t.invoked_channels(), vec![Police]);

    t.present(threat(ThreatType::Explosion, Severity::Critical, 97));
    assert_eq!(t.engine.registry().len(), 0);
    t.run_until_idle();

    assert_eq!(t.invoked_channels(), vec![Police, Police, Fire]);
    assert_eq!(
        t.engine.session().unwrap().statuses(),
        &[ChannelStatus::Sent, ChannelStatus::Sent]
    );
    assert!(t.invocations()[1].intent.body.contains("Threat: Explosion"));
}

#[test]
fn held_threat_notifies_channels_of_the_finished_dispatch() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Gunshot, Severity::Critical, 95));
    t.send_now();
    t.present(threat(ThreatType::Scream, Severity::High, 88));

    t.run_until_idle();
    assert_eq!(t.invoked_channels(), vec![Police, Police, Hospital]);
}

#[test]
fn unrecognized_threat_type_dispatches_police() {
    let mut t = Timeline::new();
    let unknown: ThreatEvent = serde_json::from_str(
        r#"{"type":"earthquake","label":"Tremor","confidence":81,"severity":"High"}"#,
    )
    .unwrap();
    t.present(unknown);
    assert_eq!(t.engine.session().unwrap().plan(), &vec![Police]);

    t.run_until_idle();
    assert_eq!(t.invoked_channels(), vec![Police]);
    assert_eq!(t.invocations()[0].at, ms(8000));
}

#[test]
fn message_carries_location_and_threat() {
    let mut t = Timeline::new();
    t.engine.set_location(Some(Location {
        lat: 34.05226,
        lon: -118.24368,
        address: "5th & Main".to_string(),
    }));
    t.present(threat(ThreatType::Gunshot, Severity::Critical, 94));
    t.send_now();

    let body = &t.invocations()[0].intent.body;
    assert!(body.contains("Threat: Gunshot"));
    assert!(body.contains("Severity: Critical"));
    assert!(body.contains("Confidence: 94%"));
    assert!(body.contains("Details: Gunshot detected"));
    assert!(body.contains("Location: 5th & Main"));
    assert!(body.contains("Coords: 34.05226, -118.24368"));
    assert!(body.contains("Maps: https://maps.google.com/?q=34.05226,-118.24368"));
    assert!(t.invocations()[0].intent.uri().contains("5th%20%26%20Main"));
}
