//! Application layer: coordinates the state machines over the ports.
//!
//! `LifecycleOrchestrator` is the entry point for every lifecycle operation. It
//! serialises writers per request or booking with [`locks::EntityLocks`] and commits
//! each transition as one atomic changeset. `NotificationDispatcher` drains the
//! outbox those changesets fill.

pub mod dispatcher;
pub mod locks;
pub mod notices;
pub mod orchestrator;

pub use dispatcher::{DispatchReport, DispatcherSettings, NotificationDispatcher};
pub use orchestrator::{LifecycleOrchestrator, LifecyclePolicy};
