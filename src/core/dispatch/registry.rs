// Sent-alert registry: union of automatically and manually notified channels.
//
// One owned map, written through two producer handles. Entries are never
// removed within a threat context; `reset` starts a new context.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::model::ResponderChannel;

/// Which path first notified a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentOrigin {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SentEntry {
    pub channel: ResponderChannel,
    pub origin: SentOrigin,
}

#[derive(Debug, Default, Clone)]
pub struct SentAlertRegistry {
    entries: BTreeMap<ResponderChannel, SentOrigin>,
}

impl SentAlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer for the automatic dispatch path.
    pub fn auto(&mut self) -> RegistryHandle<'_> {
        RegistryHandle {
            registry: self,
            origin: SentOrigin::Auto,
        }
    }

    /// Producer for manual confirmations.
    pub fn manual(&mut self) -> RegistryHandle<'_> {
        RegistryHandle {
            registry: self,
            origin: SentOrigin::Manual,
        }
    }

    pub fn contains(&self, channel: ResponderChannel) -> bool {
        self.entries.contains_key(&channel)
    }

    pub fn origin(&self, channel: ResponderChannel) -> Option<SentOrigin> {
        self.entries.get(&channel).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<SentEntry> {
        self.entries
            .iter()
            .map(|(channel, origin)| SentEntry {
                channel: *channel,
                origin: *origin,
            })
            .collect()
    }

    /// Forget everything; called when a new threat context begins.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, channel: ResponderChannel, origin: SentOrigin) -> bool {
        if self.entries.contains_key(&channel) {
            return false;
        }
        self.entries.insert(channel, origin);
        true
    }
}

/// Write access for one producer. Marking is idempotent; the first origin wins.
pub struct RegistryHandle<'a> {
    registry: &'a mut SentAlertRegistry,
    origin: SentOrigin,
}

impl RegistryHandle<'_> {
    /// Returns true if the channel was not already marked.
    pub fn mark(&mut self, channel: ResponderChannel) -> bool {
        self.registry.insert(channel, self.origin)
    }

    pub fn mark_all(&mut self, channels: &[ResponderChannel]) -> usize {
        channels.iter().filter(|c| self.mark(**c)).count()
    }
}
