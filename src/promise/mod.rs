pub mod consequence;
pub mod deferred;
pub mod scheduler;

pub use consequence::{Consequence, OnFulfilled, OnRejected, Transform};
pub use deferred::{Deferred, Settlement};
pub use scheduler::{QueueScheduler, Scheduler, Task, WorkerScheduler};
