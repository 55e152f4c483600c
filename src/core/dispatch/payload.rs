// Message bodies and communication intents handed to the platform.

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::core::model::{DeliveryMethod, Location, ResponderChannel, ThreatEvent};

pub const SIGNATURE_AUTO: &str = "— Auto-dispatched by Sentinel-X Personal Safety System";
pub const SIGNATURE_MANUAL: &str = "— Sent via Sentinel-X Personal Safety System";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Which flow produced the message; the wording differs slightly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Auto,
    Manual,
}

/// Build the text body for a responder.
///
/// Absent threat or location fields are rendered as "Unknown". Coordinates and
/// the map link are only included when a location is known.
pub fn build_message<Tz: TimeZone>(
    kind: MessageKind,
    channel: ResponderChannel,
    threat: Option<&ThreatEvent>,
    location: Option<&Location>,
    sent_at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut lines = Vec::new();

    match kind {
        MessageKind::Auto => {
            lines.push("🚨 SENTINEL-X AUTO ALERT 🚨".to_string());
            lines.push(format!("Service: {}", channel.label().to_uppercase()));
        }
        MessageKind::Manual => {
            lines.push("🚨 SENTINEL-X EMERGENCY ALERT 🚨".to_string());
            lines.push(format!("Type: {} ALERT", channel.label().to_uppercase()));
        }
    }

    lines.push(format!(
        "Threat: {}",
        threat.map_or("Unknown", |t| t.label.as_str())
    ));
    lines.push(format!(
        "Severity: {}",
        threat.map_or_else(|| "Unknown".to_string(), |t| t.severity.to_string())
    ));
    lines.push(format!(
        "Confidence: {}",
        threat.map_or_else(|| "—".to_string(), |t| format!("{}%", t.confidence))
    ));
    let details = threat
        .map(|t| t.message.trim())
        .filter(|m| !m.is_empty())
        .unwrap_or("Threat detected. Assistance required immediately.");
    lines.push(format!("Details: {}", details));
    lines.push(format!("Location: {}", Location::describe(location)));

    if let Some(loc) = location {
        lines.push(format!("Coords: {:.5}, {:.5}", loc.lat, loc.lon));
        lines.push(format!("Maps: {}", loc.map_link()));
    }

    lines.push(format!("Time: {}", sent_at.format(TIMESTAMP_FORMAT)));

    let signature = match kind {
        MessageKind::Auto => SIGNATURE_AUTO,
        MessageKind::Manual => SIGNATURE_MANUAL,
    };

    format!("{}\n\n{}", lines.join("\n"), signature)
}

/// A request to open the platform's call or messaging UI.
/// Fire-and-forget: nothing reports whether it was actually delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunicationIntent {
    pub channel: ResponderChannel,
    pub phone: String,
    pub method: DeliveryMethod,
    /// Message body; empty for calls
    pub body: String,
}

impl CommunicationIntent {
    pub fn call(channel: ResponderChannel, phone: impl Into<String>) -> Self {
        Self {
            channel,
            phone: phone.into(),
            method: DeliveryMethod::Call,
            body: String::new(),
        }
    }

    pub fn sms(channel: ResponderChannel, phone: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel,
            phone: phone.into(),
            method: DeliveryMethod::Sms,
            body: body.into(),
        }
    }

    /// Deep link understood by mobile and desktop handlers.
    pub fn uri(&self) -> String {
        let phone: String = self.phone.chars().filter(|c| !c.is_whitespace()).collect();
        match self.method {
            DeliveryMethod::Call => format!("tel:{}", phone),
            DeliveryMethod::Sms => format!("sms:{}?body={}", phone, encode_component(&self.body)),
        }
    }
}

/// Percent-encode like JavaScript's encodeURIComponent.
fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Destination for communication intents (the effect boundary).
pub trait CommunicationPort {
    fn open(&mut self, intent: &CommunicationIntent);
}
