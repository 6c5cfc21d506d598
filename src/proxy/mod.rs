pub mod memory;
pub mod operation;

pub use memory::MemoryProxy;
pub use operation::{
    CompletionCallback, Operation, OperationKind, OperationRequest, Proxy, RecordCreator,
    ResultSet,
};
