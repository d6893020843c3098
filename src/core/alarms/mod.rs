// Alarm system for time-restricted gatherables.
//
// Architecture:
// - model.rs: Alarm, group and settings types plus emitted events
// - registry.rs: Validated CRUD and ordering of groups and alarms
// - scheduler.rs: Once-per-window firing against the server clock
// - message.rs: Chat message templates for fired alarms
// - export.rs: Clipboard encoding of alarm groups

pub mod export;
pub mod message;
pub mod model;
pub mod registry;
pub mod scheduler;
