//! Analysis intake.
//!
//! Turns the analysis service's JSON response into a [`ThreatEvent`]. Every
//! field is optional: missing, `null` or wrongly typed values fall back to
//! zero confidence and empty lists, and an unparseable body becomes the
//! default response. Nothing here returns an error.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::model::{ResponderChannel, Severity, ThreatEvent, ThreatType};

lazy_static! {
    /// Detection keywords per threat type, in priority order.
    static ref RULES: Vec<(ThreatType, Regex)> = vec![
        (
            ThreatType::Explosion,
            Regex::new(r"(?i)\b(explosion|explosive|blast|bomb|detonation)s?\b")
                .expect("Invalid explosion regex"),
        ),
        (
            ThreatType::Gunshot,
            Regex::new(r"(?i)\b(gun|gunshot|gunfire|pistol|rifle|firearm|handgun|weapon|knife)s?\b")
                .expect("Invalid gunshot regex"),
        ),
        (
            ThreatType::Fire,
            Regex::new(r"(?i)\b(fire|smoke|flame|fire alarm|burning)s?\b")
                .expect("Invalid fire regex"),
        ),
        (
            ThreatType::Gas,
            Regex::new(r"(?i)\b(gas|gas leak|hiss|hissing)\b").expect("Invalid gas regex"),
        ),
        (
            ThreatType::Collision,
            Regex::new(r"(?i)\b(collision|crash|accident|skid|skidding|car horn)s?\b")
                .expect("Invalid collision regex"),
        ),
        (
            ThreatType::Scream,
            Regex::new(r"(?i)\b(scream|screaming|shout|shouting|yell|crying|help)s?\b")
                .expect("Invalid scream regex"),
        ),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfidenceScores {
    /// 0.0-1.0
    pub visual: f64,
    /// 0.0-1.0
    pub audio: f64,
}

/// Response of the analysis endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub confidence_scores: ConfidenceScores,
    pub visual_detections: Vec<String>,
    pub audio_detections: Vec<String>,
    pub dispatched_agencies: Vec<String>,
}

impl AnalysisResponse {
    pub fn from_json(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                log::warn!("Malformed analysis response, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                log::warn!("Analysis response is not an object, using defaults");
                return Self::default();
            }
        };

        let scores = obj.get("confidence_scores");
        Self {
            confidence_scores: ConfidenceScores {
                visual: score(scores.and_then(|s| s.get("visual"))),
                audio: score(scores.and_then(|s| s.get("audio"))),
            },
            visual_detections: strings(obj.get("visual_detections")),
            audio_detections: strings(obj.get("audio_detections")),
            dispatched_agencies: strings(obj.get("dispatched_agencies")),
        }
    }

    /// Highest of the two scores as a percentage.
    pub fn confidence_percent(&self) -> u32 {
        let best = self.confidence_scores.visual.max(self.confidence_scores.audio);
        (best * 100.0).round() as u32
    }

    /// Derive the threat event for the dispatch engine.
    pub fn classify(&self) -> ThreatEvent {
        let kind = classify_detections(&self.visual_detections, &self.audio_detections);
        let confidence = self.confidence_percent();
        let severity = severity_for(kind, confidence);

        let label = kind.map_or("No Threat Detected", |k| k.display_name());
        let message = match kind {
            Some(_) => self.describe_detections(),
            None => "No threat indicators found in the analyzed clip.".to_string(),
        };

        ThreatEvent::new(kind, label, confidence, severity, message)
            .with_details(joined(&self.audio_detections), joined(&self.visual_detections))
    }

    /// Agencies the service itself suggested. Unknown names are dropped.
    pub fn agencies(&self) -> Vec<ResponderChannel> {
        let mut channels = Vec::new();
        for name in &self.dispatched_agencies {
            let channel = match name.trim().to_ascii_uppercase().as_str() {
                "POLICE" => ResponderChannel::Police,
                "FIRE" => ResponderChannel::Fire,
                "AMBULANCE" | "HOSPITAL" => ResponderChannel::Hospital,
                other => {
                    log::debug!("Ignoring unknown agency {:?}", other);
                    continue;
                }
            };
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
        channels
    }

    fn describe_detections(&self) -> String {
        let mut parts = Vec::new();
        if let Some(visual) = joined(&self.visual_detections) {
            parts.push(format!("visual: {}", visual));
        }
        if let Some(audio) = joined(&self.audio_detections) {
            parts.push(format!("audio: {}", audio));
        }
        format!("Detected {}.", parts.join("; "))
    }
}

/// First rule (in priority order) matching any detection.
pub fn classify_detections(visual: &[String], audio: &[String]) -> Option<ThreatType> {
    RULES
        .iter()
        .find(|(_, re)| visual.iter().chain(audio).any(|d| re.is_match(d)))
        .map(|(kind, _)| *kind)
}

pub fn severity_for(kind: Option<ThreatType>, confidence: u32) -> Severity {
    match kind {
        Some(ThreatType::Gunshot) | Some(ThreatType::Explosion) => {
            if confidence >= 70 {
                Severity::Critical
            } else {
                Severity::High
            }
        }
        Some(ThreatType::Fire) | Some(ThreatType::Gas) => {
            if confidence >= 60 {
                Severity::High
            } else {
                Severity::Medium
            }
        }
        Some(ThreatType::Collision) | Some(ThreatType::Scream) | Some(ThreatType::Unknown) => {
            if confidence >= 80 {
                Severity::High
            } else {
                Severity::Medium
            }
        }
        None => Severity::Low,
    }
}

fn score(value: Option<&Value>) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn joined(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(", "))
    }
}
