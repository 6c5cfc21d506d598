use super::record::{LifecycleEvent, Record, RecordDescriptor};
use crate::core::ModelError;
use crate::promise::Deferred;
use crate::proxy::operation::id_key;
use crate::proxy::{CompletionCallback, Operation, OperationKind, OperationRequest, Proxy, RecordCreator};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Settlement payload for load and save deferreds: the record the operation
/// ran for, and the operation itself.
pub type RecordOutcome = (Record, Arc<Operation>);

/// The deferred handed out by the orchestration layer. Context is the
/// configured scope record; value and reason are both [`RecordOutcome`].
pub type RecordDeferred = Deferred<Record, RecordOutcome>;

/// Options recognized by [`Record::load`].
#[derive(Default)]
pub struct LoadOptions {
    /// Context the completion is delivered with. Defaults to the record.
    pub scope: Option<Record>,
    /// Transport pass-through options, forwarded verbatim.
    pub params: Value,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, scope: Record) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

impl Record {
    /// Loads the record through its proxy. The load is asynchronous; attach
    /// to the returned deferred to process the outcome.
    ///
    /// At most one load is in flight per record. A `load` call while one is
    /// outstanding returns a fresh deferred that never settles; the
    /// in-flight load's deferred settles normally.
    ///
    /// Success means the operation succeeded and returned at least one
    /// record. Either way, `AfterLoad` is raised on this record and its
    /// joined records once the operation completes.
    pub fn load(&self, options: LoadOptions) -> RecordDeferred {
        let deferred = RecordDeferred::new(self.proxy().scheduler());

        if self.load_operation().is_some() {
            // Collapsed duplicate: the caller's deferred stays pending
            // forever by contract.
            event!(
                Level::DEBUG,
                entity = self.descriptor().name(),
                "load already in flight, collapsed"
            );
            return deferred;
        }

        let id = self.id();
        let span = info_span!(
            "record.load",
            entity = self.descriptor().name(),
            id = %id.as_ref().map(id_key).unwrap_or_default()
        );
        let _enter = span.enter();

        let scope = options.scope.unwrap_or_else(|| self.clone());
        // A phantom has no meaningful requested id to check against.
        let check_id = self.descriptor().strict_ids() && !self.phantom();

        let me = self.clone();
        let requested_id = id.clone();
        let record_creator: RecordCreator = Box::new(move |data| {
            me.set(data);
            // Check after set: the data source decides the final id value.
            if check_id && me.id() != requested_id {
                let violation = ModelError::IdMismatch {
                    entity: me.descriptor().name().to_string(),
                    expected: requested_id.as_ref().map(id_key).unwrap_or_default(),
                    actual: me.id().as_ref().map(id_key).unwrap_or_default(),
                };
                panic!("{violation}");
            }
            me.clone()
        });

        let me = self.clone();
        let settle = deferred.clone();
        let internal_callback: CompletionCallback = Box::new(move |operation| {
            let success = operation.was_successful() && !operation.records().is_empty();
            me.finish_load();

            if success {
                settle.resolve_with(scope, (me.clone(), Arc::clone(operation)));
            } else {
                settle.reject_with(scope, (me.clone(), Arc::clone(operation)));
            }

            me.call_joined(LifecycleEvent::AfterLoad);
        });

        let request = OperationRequest::new()
            .with_id(id)
            .with_params(options.params)
            .with_record_creator(record_creator)
            .with_internal_callback(internal_callback);

        let operation = self.proxy().create_operation(OperationKind::Read, request);
        self.begin_load(Arc::clone(&operation));
        operation.execute();

        deferred
    }

    /// Loads a record by id: seeds a bare instance carrying only the id
    /// field and delegates to [`load`](Record::load). The loaded record
    /// arrives in the deferred's settlement payload.
    pub fn load_by_id(
        descriptor: RecordDescriptor,
        proxy: Arc<dyn Proxy>,
        id: Value,
        options: LoadOptions,
    ) -> RecordDeferred {
        let mut data = Map::new();
        data.insert(descriptor.id_property().to_string(), id);
        let record = Record::new(descriptor, proxy, Value::Object(data));
        record.load(options)
    }
}
