// ============================================================================
// Modelflow Library
// ============================================================================

//! Deferred-based data model layer with asynchronous load/save
//! orchestration.
//!
//! The promise layer provides [`Deferred`], a single-assignment completion
//! box that resolves and rejects with an explicit context, fans out through
//! attached [`Consequence`]s, and defers transform execution onto a
//! [`Scheduler`]. The model layer builds record load/save orchestration on
//! top of it: single-flight loads, create/update/destroy branching on save,
//! and completion delivery through the deferred chain.
//!
//! # Examples
//!
//! ```
//! use modelflow::{LoadOptions, MemoryProxy, QueueScheduler, Record, RecordDescriptor};
//! use serde_json::json;
//!
//! let scheduler = QueueScheduler::new();
//! let proxy = MemoryProxy::new(scheduler.clone());
//! proxy.insert_row("1", json!({"id": "1", "name": "Alice"}));
//!
//! let user = Record::new(RecordDescriptor::new("User"), proxy.clone(), json!({"id": "1"}));
//! let loaded = user.load(LoadOptions::new());
//!
//! // Completion is delivered once the scheduler runs the proxy's work.
//! scheduler.run_until_idle();
//!
//! assert!(loaded.is_fulfilled());
//! assert_eq!(user.get("name"), Some(json!("Alice")));
//! ```

pub mod core;
pub mod model;
pub mod promise;
pub mod proxy;

// Re-export main types for convenience
pub use core::{ModelError, Result};
pub use model::{
    LifecycleEvent, LifecycleHook, LoadOptions, Record, RecordDeferred, RecordDescriptor,
    RecordOutcome, SaveOptions,
};
pub use promise::{
    Consequence, Deferred, OnFulfilled, OnRejected, QueueScheduler, Scheduler, Settlement, Task,
    Transform, WorkerScheduler,
};
pub use proxy::{
    CompletionCallback, MemoryProxy, Operation, OperationKind, OperationRequest, Proxy,
    RecordCreator, ResultSet,
};
