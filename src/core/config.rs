use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

use super::model::ResponderChannel;

/// Phone numbers for the public responder channels.
/// The SOS contact is kept in the contact store, not here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResponderNumbers {
    #[serde(default = "default_emergency_number")]
    pub police: String,
    #[serde(default = "default_emergency_number")]
    pub hospital: String,
    #[serde(default = "default_emergency_number")]
    pub fire: String,
}

fn default_emergency_number() -> String {
    "911".to_string()
}

fn default_auto_dispatch() -> bool {
    true
}

impl Default for ResponderNumbers {
    fn default() -> Self {
        Self {
            police: ResponderChannel::Police.default_number().to_string(),
            hospital: ResponderChannel::Hospital.default_number().to_string(),
            fire: ResponderChannel::Fire.default_number().to_string(),
        }
    }
}

impl ResponderNumbers {
    /// Configured number for a public channel. `None` for the SOS contact.
    pub fn number_for(&self, channel: ResponderChannel) -> Option<&str> {
        match channel {
            ResponderChannel::Police => Some(self.police.trim()),
            ResponderChannel::Hospital => Some(self.hospital.trim()),
            ResponderChannel::Fire => Some(self.fire.trim()),
            ResponderChannel::SosContact => None,
        }
    }
}

/// Application settings.
/// NOTE: ui/index.html reads these field names
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub responders: ResponderNumbers,
    /// Start the countdown automatically when a typed threat is classified
    #[serde(default = "default_auto_dispatch")]
    pub auto_dispatch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            responders: ResponderNumbers::default(),
            auto_dispatch: true,
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            match fs::read_to_string(&self.config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => log::warn!("Ignoring unreadable settings file: {}", e),
                },
                Err(e) => log::warn!("Could not read {:?}: {}", self.config_path, e),
            }
        }
        Settings::default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }
}
