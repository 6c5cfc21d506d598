pub mod load;
pub mod record;
pub mod save;

pub use load::{LoadOptions, RecordDeferred, RecordOutcome};
pub use record::{LifecycleEvent, LifecycleHook, Record, RecordDescriptor};
pub use save::SaveOptions;
