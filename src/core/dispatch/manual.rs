// Manual alert: one channel, sent on explicit confirmation.

use std::time::Duration;

use serde::Serialize;

use crate::core::error::{DispatchError, DispatchResult};
use crate::core::model::{DeliveryMethod, ResponderChannel};

/// How long the "dispatched" confirmation stays visible before the alert closes.
pub const MANUAL_SETTLE: Duration = Duration::from_millis(1800);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "method")]
pub enum ManualPhase {
    Composing,
    Dispatched(DeliveryMethod),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ManualEvent {
    Dispatched {
        channel: ResponderChannel,
        method: DeliveryMethod,
    },
    /// Confirmed, but the channel was already notified in this context
    AlreadySent { channel: ResponderChannel },
    Completed { channel: ResponderChannel },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualEffect {
    Deliver {
        channel: ResponderChannel,
        phone: String,
        method: DeliveryMethod,
    },
    ScheduleSettle(Duration),
    Emit(ManualEvent),
}

#[derive(Debug, Clone)]
pub struct ManualAlert {
    channel: ResponderChannel,
    phone: String,
    phase: ManualPhase,
}

impl ManualAlert {
    pub fn open(channel: ResponderChannel, phone: impl Into<String>) -> Self {
        let phone: String = phone.into();
        Self {
            channel,
            phone: phone.trim().to_string(),
            phase: ManualPhase::Composing,
        }
    }

    /// Both delivery actions are disabled without a number.
    pub fn is_available(&self) -> bool {
        !self.phone.is_empty()
    }

    /// Configuration warning shown instead of the delivery actions.
    pub fn warning(&self) -> Option<String> {
        if self.is_available() {
            return None;
        }
        Some(match self.channel {
            ResponderChannel::SosContact => {
                "No SOS contact configured. Save an emergency contact number first.".to_string()
            }
            other => format!(
                "No phone number configured for {}. Add one in settings first.",
                other.label()
            ),
        })
    }

    /// User picked call or text. A second confirmation is a no-op.
    pub fn confirm(
        &mut self,
        method: DeliveryMethod,
        already_sent: bool,
    ) -> DispatchResult<Vec<ManualEffect>> {
        if self.phase != ManualPhase::Composing {
            log::debug!("Manual alert for {} already confirmed", self.channel);
            return Ok(Vec::new());
        }
        if !self.is_available() {
            return Err(DispatchError::MissingContact(self.channel));
        }

        self.phase = ManualPhase::Dispatched(method);
        let channel = self.channel;

        let mut effects = Vec::with_capacity(3);
        if already_sent {
            effects.push(ManualEffect::Emit(ManualEvent::AlreadySent { channel }));
        } else {
            effects.push(ManualEffect::Deliver {
                channel,
                phone: self.phone.clone(),
                method,
            });
            effects.push(ManualEffect::Emit(ManualEvent::Dispatched { channel, method }));
        }
        effects.push(ManualEffect::ScheduleSettle(MANUAL_SETTLE));
        Ok(effects)
    }

    /// The confirmation delay passed; the alert closes.
    pub fn settle_elapsed(&mut self) -> Option<ManualEvent> {
        match self.phase {
            ManualPhase::Dispatched(_) => {
                self.phase = ManualPhase::Closed;
                Some(ManualEvent::Completed {
                    channel: self.channel,
                })
            }
            ManualPhase::Composing | ManualPhase::Closed => None,
        }
    }

    pub fn close(&mut self) {
        self.phase = ManualPhase::Closed;
    }

    pub fn channel(&self) -> ResponderChannel {
        self.channel
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn phase(&self) -> ManualPhase {
        self.phase
    }
}
