use super::operation::{Operation, OperationKind, ResultSet, id_key};
use crate::core::{ModelError, lock_unpoisoned};
use crate::promise::Scheduler;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{Level, event, info_span};
use uuid::Uuid;

/// In-memory reference transport: a row store keyed by id.
///
/// Operations complete through the shared scheduler, so a completion is
/// never synchronous with [`Operation::execute`]. Server-assigned ids for
/// created phantoms are minted as UUIDs.
pub struct MemoryProxy {
    scheduler: Arc<dyn Scheduler>,
    id_property: String,
    rows: Mutex<HashMap<String, Value>>,
    fail_next: Mutex<Option<OperationKind>>,
}

impl MemoryProxy {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Self::with_id_property(scheduler, "id")
    }

    pub fn with_id_property(
        scheduler: Arc<dyn Scheduler>,
        id_property: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            id_property: id_property.into(),
            rows: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(None),
        })
    }

    /// Seeds a row, as if it had been created remotely.
    pub fn insert_row(&self, id: impl Into<String>, row: Value) {
        lock_unpoisoned(&self.rows).insert(id.into(), row);
    }

    pub fn row(&self, id: &str) -> Option<Value> {
        lock_unpoisoned(&self.rows).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forces the next operation of the given kind to complete
    /// unsuccessfully.
    pub fn fail_next(&self, kind: OperationKind) {
        *lock_unpoisoned(&self.fail_next) = Some(kind);
    }

    fn take_forced_failure(&self, kind: OperationKind) -> bool {
        let mut forced = lock_unpoisoned(&self.fail_next);
        if *forced == Some(kind) {
            *forced = None;
            return true;
        }
        false
    }

    fn run(&self, operation: &Arc<Operation>) {
        let span = info_span!("proxy.memory", kind = operation.kind().as_str());
        let _enter = span.enter();

        if self.take_forced_failure(operation.kind()) {
            event!(Level::DEBUG, "forced failure");
            operation.complete_with(ResultSet::failed());
            return;
        }

        let result_set = match operation.kind() {
            OperationKind::Read => self.run_read(operation),
            OperationKind::Create => self.run_create(operation),
            OperationKind::Update => self.run_update(operation),
            OperationKind::Destroy => self.run_destroy(operation),
        };
        operation.complete_with(result_set);
    }

    fn run_read(&self, operation: &Arc<Operation>) -> ResultSet {
        let Some(id) = operation.request_id() else {
            return ResultSet::failed();
        };
        match self.row(&id_key(&id)) {
            Some(row) => ResultSet::new(vec![row]),
            // A miss is still a successful operation; it just found nothing.
            None => ResultSet::new(Vec::new()),
        }
    }

    fn run_create(&self, operation: &Arc<Operation>) -> ResultSet {
        let mut created = Vec::new();
        for record in operation.records() {
            let id_value = match record.id() {
                Some(id) => id,
                None => Value::String(Uuid::new_v4().to_string()),
            };
            let mut row = record.data();
            if let Value::Object(fields) = &mut row {
                fields.insert(self.id_property.clone(), id_value.clone());
            }
            lock_unpoisoned(&self.rows).insert(id_key(&id_value), row.clone());
            record.commit(Some(row.clone()));
            created.push(row);
        }
        ResultSet::new(created)
    }

    fn run_update(&self, operation: &Arc<Operation>) -> ResultSet {
        let mut updated = Vec::new();
        for record in operation.records() {
            let Some(id) = record.id() else {
                let refusal = ModelError::MissingId(record.descriptor().id_property().to_string());
                event!(Level::DEBUG, error = %refusal, "update refused");
                return ResultSet::failed();
            };
            let row = record.data();
            lock_unpoisoned(&self.rows).insert(id_key(&id), row.clone());
            record.commit(None);
            updated.push(row);
        }
        ResultSet::new(updated)
    }

    fn run_destroy(&self, operation: &Arc<Operation>) -> ResultSet {
        for record in operation.records() {
            if let Some(id) = record.id() {
                lock_unpoisoned(&self.rows).remove(&id_key(&id));
            }
            record.set_erased();
        }
        ResultSet::empty()
    }
}

impl super::operation::Proxy for MemoryProxy {
    fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.scheduler)
    }

    fn perform(self: Arc<Self>, operation: Arc<Operation>) {
        let proxy = Arc::clone(&self);
        self.scheduler.schedule(Box::new(move || {
            proxy.run(&operation);
        }));
    }
}
