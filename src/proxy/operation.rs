use crate::core::lock_unpoisoned;
use crate::model::Record;
use crate::promise::Scheduler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};
use tracing::{Level, event};

/// The four persistence actions a proxy can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Destroy,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

/// Rows and status returned by a transport for one operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSet {
    pub records: Vec<Value>,
    pub total: usize,
    pub success: bool,
}

impl ResultSet {
    pub fn new(records: Vec<Value>) -> Self {
        let total = records.len();
        Self {
            records,
            total,
            success: true,
        }
    }

    /// A successful result set carrying no rows. Used when an operation is
    /// acknowledged without a transport round trip.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            success: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            success: false,
        }
    }
}

/// Materializes a record from one row of fetched data.
pub type RecordCreator = Box<dyn FnMut(Value) -> Record + Send>;

/// Invoked exactly once when an operation completes.
pub type CompletionCallback = Box<dyn FnOnce(&Arc<Operation>) + Send>;

/// Everything an orchestrator hands to the proxy for one operation.
#[derive(Default)]
pub struct OperationRequest {
    /// Expected id for reads.
    pub id: Option<Value>,
    /// Payload records for writes.
    pub records: Vec<Record>,
    /// Materialization callback, invoked once per fetched row.
    pub record_creator: Option<RecordCreator>,
    /// Completion callback; the proxy must arrange for it to run exactly once.
    pub internal_callback: Option<CompletionCallback>,
    /// Transport-specific options, forwarded verbatim.
    pub params: Value,
}

impl OperationRequest {
    pub fn new() -> Self {
        Self {
            id: None,
            records: Vec::new(),
            record_creator: None,
            internal_callback: None,
            params: Value::Null,
        }
    }

    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    pub fn with_record_creator(mut self, record_creator: RecordCreator) -> Self {
        self.record_creator = Some(record_creator);
        self
    }

    pub fn with_internal_callback(mut self, internal_callback: CompletionCallback) -> Self {
        self.internal_callback = Some(internal_callback);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

struct OperationState {
    request: OperationRequest,
    result_set: Option<ResultSet>,
    produced: Vec<Record>,
    successful: bool,
    completed: bool,
}

/// One asynchronous persistence operation in flight between an orchestrator
/// and its proxy.
///
/// Completion is exactly-once: the internal callback is taken out of the
/// request under the operation's lock, so a second completion attempt finds
/// nothing to fire and becomes a no-op.
pub struct Operation {
    kind: OperationKind,
    created_at: DateTime<Utc>,
    proxy: Arc<dyn Proxy>,
    me: Weak<Operation>,
    state: Mutex<OperationState>,
}

impl Operation {
    pub(crate) fn new(
        proxy: Arc<dyn Proxy>,
        kind: OperationKind,
        request: OperationRequest,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            kind,
            created_at: Utc::now(),
            proxy,
            me: me.clone(),
            state: Mutex::new(OperationState {
                request,
                result_set: None,
                produced: Vec::new(),
                successful: false,
                completed: false,
            }),
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Hands this operation to its proxy for asynchronous execution.
    pub fn execute(&self) {
        let Some(operation) = self.me.upgrade() else {
            return;
        };
        Arc::clone(&self.proxy).perform(operation);
    }

    pub fn was_successful(&self) -> bool {
        let state = lock_unpoisoned(&self.state);
        state.completed && state.successful
    }

    pub fn is_complete(&self) -> bool {
        lock_unpoisoned(&self.state).completed
    }

    /// Records this operation produced (reads) or carries (writes).
    pub fn records(&self) -> Vec<Record> {
        let state = lock_unpoisoned(&self.state);
        if state.completed {
            state.produced.clone()
        } else {
            state.request.records.clone()
        }
    }

    pub fn result_set(&self) -> Option<ResultSet> {
        lock_unpoisoned(&self.state).result_set.clone()
    }

    /// Expected id from the request, if any.
    pub fn request_id(&self) -> Option<Value> {
        lock_unpoisoned(&self.state).request.id.clone()
    }

    pub fn params(&self) -> Value {
        lock_unpoisoned(&self.state).request.params.clone()
    }

    /// Stores a result set without completing the operation.
    pub fn set_result_set(&self, result_set: ResultSet) {
        lock_unpoisoned(&self.state).result_set = Some(result_set);
    }

    /// Marks the operation complete with the given outcome and fires the
    /// internal callback. No transport work happens; this is the hook for
    /// synthesized completions.
    pub fn set_successful(&self, success: bool) {
        let callback = {
            let mut state = lock_unpoisoned(&self.state);
            if state.completed {
                return;
            }
            state.successful = success;
            state.completed = true;
            state.produced = state.request.records.clone();
            state.request.internal_callback.take()
        };
        self.fire(callback);
    }

    /// Proxy-side completion: stores the result set, materializes records
    /// through the request's creator (reads) or adopts the request records
    /// (writes), then fires the internal callback.
    pub fn complete_with(&self, result_set: ResultSet) {
        let (creator, rows, callback) = {
            let mut state = lock_unpoisoned(&self.state);
            if state.completed {
                return;
            }
            state.successful = result_set.success;
            state.completed = true;
            let rows = result_set.records.clone();
            state.result_set = Some(result_set);
            (
                state.request.record_creator.take(),
                rows,
                state.request.internal_callback.take(),
            )
        };

        let produced = match creator {
            Some(mut record_creator) => rows.into_iter().map(|row| record_creator(row)).collect(),
            None => {
                let state = lock_unpoisoned(&self.state);
                state.request.records.clone()
            }
        };
        lock_unpoisoned(&self.state).produced = produced;

        self.fire(callback);
    }

    fn fire(&self, callback: Option<CompletionCallback>) {
        let Some(callback) = callback else {
            return;
        };
        let Some(operation) = self.me.upgrade() else {
            return;
        };
        event!(
            Level::DEBUG,
            kind = self.kind.as_str(),
            successful = self.was_successful(),
            "operation completed"
        );
        callback(&operation);
    }
}

/// The external transport collaborator: turns an operation into a
/// network/storage call and eventually completes it.
pub trait Proxy: Send + Sync {
    /// The scheduler this proxy defers completions onto. Orchestrators use
    /// it for the deferreds they hand out.
    fn scheduler(&self) -> Arc<dyn Scheduler>;

    /// Executes the operation asynchronously. Implementations must complete
    /// it exactly once, never on the caller's stack.
    fn perform(self: Arc<Self>, operation: Arc<Operation>);
}

impl dyn Proxy {
    /// Builds an operation bound to this proxy. Call
    /// [`execute`](Operation::execute) to run it.
    pub fn create_operation(
        self: Arc<Self>,
        kind: OperationKind,
        request: OperationRequest,
    ) -> Arc<Operation> {
        Operation::new(self, kind, request)
    }
}

/// Canonical string form of an id value, used as the row key and in error
/// messages. JSON strings are used verbatim; other values use their JSON
/// rendering.
pub(crate) fn id_key(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
