use crate::core::lock_unpoisoned;
use crate::proxy::{Operation, Proxy};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tracing::{Level, event};

/// Per-type configuration for records.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    name: String,
    id_property: String,
    strict_ids: bool,
}

impl RecordDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_property: "id".to_string(),
            strict_ids: false,
        }
    }

    pub fn with_id_property(mut self, id_property: impl Into<String>) -> Self {
        self.id_property = id_property.into();
        self
    }

    /// Enables the id-consistency check on loads. A loaded record whose id
    /// differs from the requested id then panics: that mismatch signals a
    /// corrupted data source, not a failure the reject path can represent.
    pub fn with_strict_ids(mut self, strict_ids: bool) -> Self {
        self.strict_ids = strict_ids;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    pub fn strict_ids(&self) -> bool {
        self.strict_ids
    }
}

/// Lifecycle notifications raised by the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    AfterLoad,
}

/// Observer for lifecycle events on a record and its joined records.
pub trait LifecycleHook: Send + Sync {
    fn on_event(&self, event: LifecycleEvent, record: &Record);
}

impl<F> LifecycleHook for F
where
    F: Fn(LifecycleEvent, &Record) + Send + Sync,
{
    fn on_event(&self, event: LifecycleEvent, record: &Record) {
        self(event, record);
    }
}

struct RecordState {
    data: Value,
    phantom: bool,
    dropped: bool,
    erased: bool,
    load_operation: Option<Arc<Operation>>,
    joined: Vec<Record>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

/// A data-entity instance bound to a proxy.
///
/// Handles are cheap to clone and share one underlying state. Field data is
/// a raw JSON object; field definition and validation live outside this
/// crate.
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<RecordDescriptor>,
    proxy: Arc<dyn Proxy>,
    state: Arc<Mutex<RecordState>>,
}

impl Record {
    /// Creates a record. A record constructed without a value for the id
    /// property is a phantom: it has never been created remotely.
    pub fn new(descriptor: RecordDescriptor, proxy: Arc<dyn Proxy>, data: Value) -> Self {
        let data = match data {
            Value::Object(fields) => Value::Object(fields),
            Value::Null => Value::Object(Map::new()),
            other => {
                event!(Level::DEBUG, data = %other, "non-object record data ignored");
                Value::Object(Map::new())
            }
        };
        let phantom = data.get(descriptor.id_property()).is_none_or(Value::is_null);
        Self {
            descriptor: Arc::new(descriptor),
            proxy,
            state: Arc::new(Mutex::new(RecordState {
                data,
                phantom,
                dropped: false,
                erased: false,
                load_operation: None,
                joined: Vec::new(),
                hooks: Vec::new(),
            })),
        }
    }

    pub fn descriptor(&self) -> Arc<RecordDescriptor> {
        Arc::clone(&self.descriptor)
    }

    pub fn proxy(&self) -> Arc<dyn Proxy> {
        Arc::clone(&self.proxy)
    }

    /// The record's id value, if assigned.
    pub fn id(&self) -> Option<Value> {
        let state = lock_unpoisoned(&self.state);
        match state.data.get(self.descriptor.id_property()) {
            Some(Value::Null) | None => None,
            Some(id) => Some(id.clone()),
        }
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        lock_unpoisoned(&self.state).data.get(field).cloned()
    }

    /// Snapshot of the raw field data.
    pub fn data(&self) -> Value {
        lock_unpoisoned(&self.state).data.clone()
    }

    /// Merges raw field data into the record.
    pub fn set(&self, data: Value) {
        let Value::Object(fields) = data else {
            return;
        };
        let mut state = lock_unpoisoned(&self.state);
        if let Value::Object(existing) = &mut state.data {
            for (field, value) in fields {
                existing.insert(field, value);
            }
        }
    }

    pub fn phantom(&self) -> bool {
        lock_unpoisoned(&self.state).phantom
    }

    pub fn dropped(&self) -> bool {
        lock_unpoisoned(&self.state).dropped
    }

    pub fn erased(&self) -> bool {
        lock_unpoisoned(&self.state).erased
    }

    /// Marks the record for deletion on the next save.
    pub fn drop_record(&self) {
        lock_unpoisoned(&self.state).dropped = true;
    }

    /// Marks the record as gone from the remote side.
    pub fn set_erased(&self) {
        lock_unpoisoned(&self.state).erased = true;
    }

    /// Adopts server-confirmed data after a successful write. Clears the
    /// phantom flag; the remote side now knows this record.
    pub fn commit(&self, server_data: Option<Value>) {
        if let Some(data) = server_data {
            self.set(data);
        }
        lock_unpoisoned(&self.state).phantom = false;
    }

    /// Links a child record for transitive lifecycle notification. Joined
    /// links must form a tree.
    pub fn join(&self, child: Record) {
        lock_unpoisoned(&self.state).joined.push(child);
    }

    pub fn add_hook(&self, hook: Arc<dyn LifecycleHook>) {
        lock_unpoisoned(&self.state).hooks.push(hook);
    }

    /// Notifies this record's hooks, then every joined record, recursively.
    pub fn call_joined(&self, event: LifecycleEvent) {
        let (hooks, joined) = {
            let state = lock_unpoisoned(&self.state);
            (state.hooks.clone(), state.joined.clone())
        };
        for hook in hooks {
            hook.on_event(event, self);
        }
        for child in joined {
            child.call_joined(event);
        }
    }

    /// The in-flight load operation, if one exists.
    pub fn load_operation(&self) -> Option<Arc<Operation>> {
        lock_unpoisoned(&self.state).load_operation.clone()
    }

    pub(crate) fn begin_load(&self, operation: Arc<Operation>) {
        lock_unpoisoned(&self.state).load_operation = Some(operation);
    }

    pub(crate) fn finish_load(&self) {
        lock_unpoisoned(&self.state).load_operation = None;
    }
}
