// Threat, location and responder types shared by the dispatch engine.
//
// NOTE: ui/index.html reads the serialized field names.
// Keep both in sync when renaming fields.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Standing notice shown next to the emergency controls. Delivery through the
/// platform's call/SMS handler cannot be confirmed by the app.
pub const LIMITATION_NOTICE: &str = "Privacy Protected: Sentinel-X does not store raw audio or images. \
Only threat metadata (type, severity, timestamp, location) is shared with emergency responders. \
Calls and messages are handed to your device's phone and messaging apps; \
Sentinel-X cannot confirm that they were delivered.";

/// Category of a classified threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatType {
    Gunshot,
    Explosion,
    Fire,
    Collision,
    Scream,
    Gas,
    /// Any type name this build does not recognize
    #[serde(other)]
    Unknown,
}

impl ThreatType {
    /// Recognized types; `Unknown` is left out.
    pub fn all() -> &'static [ThreatType] {
        &[
            Self::Gunshot,
            Self::Explosion,
            Self::Fire,
            Self::Collision,
            Self::Scream,
            Self::Gas,
        ]
    }

    /// Label used when the classifier has nothing more specific.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gunshot => "Gunshot",
            Self::Explosion => "Explosion",
            Self::Fire => "Fire",
            Self::Collision => "Vehicle Collision",
            Self::Scream => "Scream / Distress",
            Self::Gas => "Gas Leak",
            Self::Unknown => "Unknown Threat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        f.write_str(name)
    }
}

/// A classified event as produced by the analysis collaborator.
/// Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<ThreatType>,
    pub label: String,
    /// Percentage, 0-100
    #[serde(deserialize_with = "clamped_confidence")]
    pub confidence: u8,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_detail: Option<String>,
}

impl ThreatEvent {
    pub fn new(
        kind: Option<ThreatType>,
        label: impl Into<String>,
        confidence: u32,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            confidence: confidence.min(100) as u8,
            severity,
            message: message.into(),
            audio_detail: None,
            visual_detail: None,
        }
    }

    pub fn with_details(mut self, audio: Option<String>, visual: Option<String>) -> Self {
        self.audio_detail = audio;
        self.visual_detail = visual;
        self
    }

    /// Only typed threats start an automatic dispatch session.
    pub fn is_actionable(&self) -> bool {
        self.kind.is_some()
    }
}

/// Accepts any JSON number and clamps it to 0-100.
fn clamped_confidence<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.clamp(0.0, 100.0).round() as u8)
}

/// Position reported by the geolocation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub address: String,
}

impl Location {
    /// Build a location whose address is just the formatted coordinates.
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            address: format!("{:.4}°N, {:.4}°E", lat, lon),
        }
    }

    /// Address to render or transmit; "Unknown" when no fix is available.
    pub fn describe(location: Option<&Location>) -> &str {
        match location {
            Some(loc) if !loc.address.trim().is_empty() => loc.address.as_str(),
            _ => "Unknown",
        }
    }

    pub fn map_link(&self) -> String {
        format!("https://maps.google.com/?q={},{}", self.lat, self.lon)
    }
}

/// A responder that can be reached by call or text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponderChannel {
    Police,
    Hospital,
    Fire,
    #[serde(alias = "sos")]
    SosContact,
}

impl ResponderChannel {
    pub fn all() -> &'static [ResponderChannel] {
        &[Self::Police, Self::Hospital, Self::Fire, Self::SosContact]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Police => "Police",
            Self::Hospital => "Ambulance",
            Self::Fire => "Fire Dept",
            Self::SosContact => "SOS Contact",
        }
    }

    /// Heading of the manual alert dialog.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Police => "Police Station",
            Self::Hospital => "Hospital / Ambulance",
            Self::Fire => "Fire Station",
            Self::SosContact => "Emergency Contact",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Police => "🚓",
            Self::Hospital => "🚑",
            Self::Fire => "🚒",
            Self::SosContact => "📞",
        }
    }

    /// Built-in number; the SOS contact comes from the contact store instead.
    pub fn default_number(&self) -> &'static str {
        match self {
            Self::Police | Self::Hospital | Self::Fire => "911",
            Self::SosContact => "",
        }
    }
}

impl fmt::Display for ResponderChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Voice call or text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Call,
    Sms,
}
