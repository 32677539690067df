pub mod orchestrator;
pub mod policy;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{GroupPlan, SyncOrchestrator};
pub use policy::{derive_action, normalize_completion, prepare_delivery, COMPLETION_THRESHOLD};
pub use store::SessionStore;
pub use worker::{SyncGroup, SyncWorker};
