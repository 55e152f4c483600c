//! Manual alerts and their interaction with automatic dispatch.

use crate::mock_comms::{ms, threat, Timeline};
use sentinel_x::core::config::Settings;
use sentinel_x::core::dispatch::engine::EngineEvent;
use sentinel_x::core::dispatch::manual::{ManualEvent, ManualPhase, MANUAL_SETTLE};
use sentinel_x::core::dispatch::registry::SentOrigin;
use sentinel_x::core::error::DispatchError;
use sentinel_x::core::model::{DeliveryMethod, ResponderChannel, Severity, ThreatType};

use ResponderChannel::{Fire, Police, SosContact};

#[test]
fn manual_fire_then_auto_plan_does_not_resend_fire() {
    let mut t = Timeline::new();

    t.engine.open_manual(Fire);
    let timers = t.engine.confirm_manual(DeliveryMethod::Call).unwrap();
    t.schedule(timers);
    assert_eq!(t.invoked_channels(), vec![Fire]);
    assert_eq!(t.invocations()[0].intent.uri(), "tel:911");
    assert_eq!(t.engine.registry().origin(Fire), Some(SentOrigin::Manual));

    t.advance(MANUAL_SETTLE);
    assert!(t.engine.snapshot().manual.is_none());

    t.present(threat(ThreatType::Fire, Severity::High, 88));
    t.run_until_idle();

    assert_eq!(t.invoked_channels(), vec![Fire, Police]);
    assert_eq!(t.engine.registry().len(), 2);
    assert_eq!(t.engine.registry().origin(Fire), Some(SentOrigin::Manual));
    assert_eq!(t.engine.registry().origin(Police), Some(SentOrigin::Auto));
}

#[test]
fn manual_send_during_dispatch_is_not_repeated_by_sequencer() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Explosion, Severity::Critical, 97));
    t.send_now();
    assert_eq!(t.invoked_channels(), vec![Police]);

    t.advance_ms(500);
    t.engine.open_manual(Fire);
    let timers = t.engine.confirm_manual(DeliveryMethod::Sms).unwrap();
    t.schedule(timers);

    t.run_until_idle();
    assert_eq!(t.invoked_channels(), vec![Police, Fire]);
    assert_eq!(t.invocations()[1].at, ms(500));
    assert!(t.invocations()[1].intent.body.contains("SENTINEL-X EMERGENCY ALERT"));
}

#[test]
fn confirming_an_already_sent_channel_does_not_reinvoke() {
    let mut t = Timeline::new();
    t.present(threat(ThreatType::Gunshot, Severity::Critical, 92));
    t.send_now();
    t.run_until_idle();
    assert_eq!(t.invocations().len(), 1);

    let view = t.engine.open_manual(Police);
    assert!(view.already_sent);
    let timers = t.engine.confirm_manual(DeliveryMethod::Call).unwrap();
    t.schedule(timers);
    t.run_until_idle();

    assert_eq!(t.invocations().len(), 1);
    assert_eq!(t.engine.registry().origin(Police), Some(SentOrigin::Auto));
    assert!(t.engine.drain_events().iter().any(|e| matches!(
        e,
        EngineEvent::Manual(ManualEvent::AlreadySent { channel: Police })
    )));
}

#[test]
fn double_confirm_sends_once() {
    let mut t = Timeline::new();
    t.engine.open_manual(Police);
    let first = t.engine.confirm_manual(DeliveryMethod::Sms).unwrap();
    let second = t.engine.confirm_manual(DeliveryMethod::Sms).unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(t.invocations().len(), 1);
}

#[test]
fn missing_sos_contact_disables_manual_alert() {
    let mut t = Timeline::new();
    let view = t.engine.open_manual(SosContact);

    assert!(!view.available);
    assert_eq!(view.phase, ManualPhase::Composing);
    assert!(view.warning.is_some());
    for method in [DeliveryMethod::Call, DeliveryMethod::Sms] {
        assert!(matches!(
            t.engine.confirm_manual(method),
            Err(DispatchError::MissingContact(SosContact))
        ));
    }
    assert!(t.invocations().is_empty());
    assert!(t.engine.registry().is_empty());
}

#[test]
fn saved_sos_contact_enables_manual_alert() {
    let mut t = Timeline::with(Settings::default(), Some("555-0100"));
    let view = t.engine.open_manual(SosContact);
    assert!(view.available);
    assert_eq!(view.phone, "555-0100");

    t.engine.confirm_manual(DeliveryMethod::Call).unwrap();
    assert_eq!(t.invocations()[0].intent.uri(), "tel:555-0100");
    assert!(t.engine.registry().contains(SosContact));
}

#[test]
fn closing_manual_alert_cancels_completion() {
    let mut t = Timeline::new();
    t.engine.open_manual(Fire);
    let timers = t.engine.confirm_manual(DeliveryMethod::Call).unwrap();
    t.schedule(timers);
    t.engine.close_manual().unwrap();
    t.engine.drain_events();

    t.run_until_idle();
    assert!(t.engine.drain_events().is_empty());
    assert!(matches!(t.engine.close_manual(), Err(DispatchError::NoManualAlert)));
    assert!(t.engine.registry().contains(Fire));
}

#[test]
fn manual_completion_after_settle() {
    let mut t = Timeline::new();
    t.engine.open_manual(Police);
    let timers = t.engine.confirm_manual(DeliveryMethod::Call).unwrap();
    t.schedule(timers);

    t.advance(MANUAL_SETTLE - ms(1));
    assert!(t.engine.snapshot().manual.is_some());
    t.advance_ms(1);
    assert!(t.engine.snapshot().manual.is_none());
}

#[test]
fn contact_saved_while_alert_open_enables_it() {
    let mut t = Timeline::new();
    assert!(!t.engine.open_manual(SosContact).available);

    t.engine.save_sos_contact("555-0100").unwrap();
    let view = t.engine.snapshot().manual.unwrap();
    assert!(view.available);
    assert_eq!(view.phone, "555-0100");

    let timers = t.engine.confirm_manual(DeliveryMethod::Sms).unwrap();
    t.schedule(timers);
    assert!(t.invocations()[0].intent.uri().starts_with("sms:555-0100?body="));
}
