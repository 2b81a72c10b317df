//! Reconciliation of the local store with the remote catalog.

mod diff;
mod engine;
mod events;
mod scheduler;

pub use diff::{Change, ClassifiedPage, classify, classify_page};
pub use engine::{EngineConfig, SyncEngine, SyncEngineBuilder, SyncRequest};
pub use events::{NetworkState, SessionSummary, SyncEvent, SyncPhase, SyncReason};
pub use scheduler::SchedulerHandle;
