use super::load::{RecordDeferred, RecordOutcome};
use super::record::Record;
use crate::proxy::{CompletionCallback, OperationKind, OperationRequest, ResultSet};
use serde_json::Value;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Options recognized by [`Record::save`].
#[derive(Default)]
pub struct SaveOptions {
    /// Context the completion is delivered with. Defaults to the record.
    pub scope: Option<Record>,
    /// Transport pass-through options, forwarded verbatim.
    pub params: Value,
}

impl SaveOptions {
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
    /// Saves the record through its proxy. The save is asynchronous; attach
    /// to the returned deferred to process the outcome.
    ///
    /// The operation kind is chosen by priority: a dropped record is
    /// destroyed, an unpersisted (phantom) record is created, anything else
    /// is updated. A record that is both dropped and phantom was never sent
    /// to the remote side, so no transport call is made: the operation
    /// completes with a synthesized empty success and the record is marked
    /// erased.
    ///
    /// Saves carry no single-flight guard; overlapping calls each produce
    /// an independent operation.
    pub fn save(&self, options: SaveOptions) -> RecordDeferred {
        let deferred = RecordDeferred::new(self.proxy().scheduler());

        let phantom = self.phantom();
        let dropped = self.dropped();
        let kind = if dropped {
            OperationKind::Destroy
        } else if phantom {
            OperationKind::Create
        } else {
            OperationKind::Update
        };

        let span = info_span!(
            "record.save",
            entity = self.descriptor().name(),
            kind = kind.as_str()
        );
        let _enter = span.enter();

        let scope = options.scope.unwrap_or_else(|| self.clone());
        let me = self.clone();
        let settle = deferred.clone();
        let internal_callback: CompletionCallback = Box::new(move |operation| {
            let outcome: RecordOutcome = (me.clone(), Arc::clone(operation));
            if operation.was_successful() {
                settle.resolve_with(scope, outcome);
            } else {
                settle.reject_with(scope, outcome);
            }
        });

        let request = OperationRequest::new()
            .with_records(vec![self.clone()])
            .with_params(options.params)
            .with_internal_callback(internal_callback);
        let operation = self.proxy().create_operation(kind, request);

        if dropped && phantom {
            // Never persisted and locally deleted: the remote side has
            // nothing to destroy.
            event!(Level::DEBUG, "destroy of unpersisted record short-circuited");
            operation.set_result_set(ResultSet::empty());
            self.set_erased();
            operation.set_successful(true);
        } else {
            operation.execute();
        }

        deferred
    }
}
