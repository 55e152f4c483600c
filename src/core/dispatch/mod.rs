// Emergency dispatch orchestration.
//
// Architecture:
// - plan.rs: Static threat type -> responder table
// - countdown.rs: Cancellable pre-dispatch countdown
// - sequencer.rs: One-at-a-time channel delivery with settle delay
// - session.rs: Countdown + sequencer lifecycle for one threat
// - manual.rs: Single-channel alert sent on user confirmation
// - registry.rs: Channels notified in the current threat context
// - payload.rs: Message bodies and communication intents
// - engine.rs: Owns all of the above and executes their effects

pub mod countdown;
pub mod engine;
pub mod manual;
pub mod payload;
pub mod plan;
pub mod registry;
pub mod sequencer;
pub mod session;
