// Static threat → responder table.

use crate::core::model::{ResponderChannel, ThreatType};

/// Ordered responders for one threat; the first entry is contacted first.
pub type DispatchPlan = Vec<ResponderChannel>;

/// Resolve which responders are notified for a threat type.
/// Untyped and unrecognized threats fall back to the police.
pub fn resolve_channels(threat_type: Option<ThreatType>) -> DispatchPlan {
    use ResponderChannel::{Fire, Hospital, Police};

    match threat_type {
        Some(ThreatType::Gunshot) => vec![Police],
        Some(ThreatType::Explosion) => vec![Police, Fire],
        Some(ThreatType::Fire) => vec![Fire, Police],
        Some(ThreatType::Collision) => vec![Police, Hospital],
        Some(ThreatType::Scream) => vec![Police, Hospital],
        Some(ThreatType::Gas) => vec![Fire],
        Some(ThreatType::Unknown) | None => vec![Police],
    }
}
