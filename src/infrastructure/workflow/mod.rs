//! Workflow runtime: retrying activity executor, signal inbox, engine and
//! dispatcher

mod dispatcher;
mod engine;
mod executor;
mod inbox;
mod instance;
mod key_lock;
mod shutdown;
mod storage_repository;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::WorkflowDispatcher;
pub use engine::{RunExit, WorkflowEngine, WorkflowEngineConfig, WorkflowEngineDeps};
pub use executor::{ActivityExecutor, ActivityOutcome};
pub use inbox::SignalInbox;
pub use instance::WorkflowInstance;
pub use key_lock::{KeyGuard, KeyedLocks};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use storage_repository::StorageWorkflowStateRepository;
