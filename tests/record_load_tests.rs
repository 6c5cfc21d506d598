use modelflow::{
    LifecycleEvent, LoadOptions, MemoryProxy, QueueScheduler, Record, RecordDescriptor,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn user_descriptor() -> RecordDescriptor {
    RecordDescriptor::new("User")
}

#[test]
fn load_materializes_fetched_fields() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    proxy.insert_row("1", json!({"id": "1", "name": "Alice", "age": 30}));

    let user = Record::new(user_descriptor(), proxy.clone(), json!({"id": "1"}));
    let loaded = user.load(LoadOptions::new());

    assert!(loaded.is_pending());
    assert!(user.load_operation().is_some());

    scheduler.run_until_idle();

    assert!(loaded.is_fulfilled());
    assert!(user.load_operation().is_none(), "load guard must clear on completion");
    assert_eq!(user.get("name"), Some(json!("Alice")));
    assert_eq!(user.get("age"), Some(json!(30)));

    let settlement = loaded.settlement().expect("settled");
    let (record, operation) = settlement.value().expect("fulfilled").clone();
    assert_eq!(record.id(), Some(json!("1")));
    assert!(operation.was_successful());
    assert_eq!(operation.records().len(), 1);
}

#[test]
fn duplicate_load_collapses_to_forever_pending() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    proxy.insert_row("1", json!({"id": "1", "name": "Alice"}));

    let user = Record::new(user_descriptor(), proxy.clone(), json!({"id": "1"}));
    let first = user.load(LoadOptions::new());
    let second = user.load(LoadOptions::new());

    scheduler.run_until_idle();

    assert!(first.is_fulfilled(), "the in-flight load settles normally");
    assert!(second.is_pending(), "the collapsed duplicate never settles");

    // The guard cleared, so a fresh load works again.
    let third = user.load(LoadOptions::new());
    scheduler.run_until_idle();
    assert!(third.is_fulfilled());
    assert!(second.is_pending());
}

#[test]
fn load_with_zero_records_rejects() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());

    let user = Record::new(user_descriptor(), proxy.clone(), json!({"id": "404"}));
    let loaded = user.load(LoadOptions::new());
    scheduler.run_until_idle();

    assert!(loaded.is_rejected());
    let settlement = loaded.settlement().expect("settled");
    let (_, operation) = settlement.reason().expect("rejected").clone();
    assert!(operation.was_successful(), "the operation itself succeeded, it found nothing");
    assert!(operation.records().is_empty());
}

#[test]
fn failed_read_rejects() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    proxy.insert_row("1", json!({"id": "1"}));
    proxy.fail_next(modelflow::OperationKind::Read);

    let user = Record::new(user_descriptor(), proxy.clone(), json!({"id": "1"}));
    let loaded = user.load(LoadOptions::new());
    scheduler.run_until_idle();

    assert!(loaded.is_rejected());
}

#[test]
#[should_panic(expected = "Invalid record id returned for 1@User")]
fn strict_mode_panics_on_id_mismatch() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    // The data source answers the read for "1" with a row claiming id "2".
    proxy.insert_row("1", json!({"id": "2", "name": "Mallory"}));

    let descriptor = user_descriptor().with_strict_ids(true);
    let user = Record::new(descriptor, proxy.clone(), json!({"id": "1"}));
    user.load(LoadOptions::new());
    scheduler.run_until_idle();
}

#[test]
fn lenient_mode_accepts_id_mismatch() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    proxy.insert_row("1", json!({"id": "2", "name": "Mallory"}));

    let user = Record::new(user_descriptor(), proxy.clone(), json!({"id": "1"}));
    let loaded = user.load(LoadOptions::new());
    scheduler.run_until_idle();

    assert!(loaded.is_fulfilled());
    assert_eq!(user.id(), Some(json!("2")));
}

#[test]
fn after_load_fires_on_record_and_joined_children() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    proxy.insert_row("1", json!({"id": "1", "name": "Alice"}));

    let parent = Record::new(user_descriptor(), proxy.clone(), json!({"id": "1"}));
    let child = Record::new(
        RecordDescriptor::new("Address"),
        proxy.clone(),
        json!({"id": "a1"}),
    );
    let grandchild = Record::new(
        RecordDescriptor::new("Street"),
        proxy.clone(),
        json!({"id": "s1"}),
    );
    child.join(grandchild.clone());
    parent.join(child.clone());

    let events = Arc::new(Mutex::new(Vec::new()));
    for (tag, record) in [("parent", &parent), ("child", &child), ("grandchild", &grandchild)] {
        let events = events.clone();
        record.add_hook(Arc::new(move |event: LifecycleEvent, _: &Record| {
            events.lock().unwrap().push((tag, event));
        }));
    }

    parent.load(LoadOptions::new());
    scheduler.run_until_idle();

    assert_eq!(
        *events.lock().unwrap(),
        [
            ("parent", LifecycleEvent::AfterLoad),
            ("child", LifecycleEvent::AfterLoad),
            ("grandchild", LifecycleEvent::AfterLoad),
        ]
    );
}

#[test]
fn after_load_fires_even_when_load_rejects() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());

    let user = Record::new(user_descriptor(), proxy.clone(), json!({"id": "404"}));
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_in = events.clone();
    user.add_hook(Arc::new(move |event: LifecycleEvent, _: &Record| {
        events_in.lock().unwrap().push(event);
    }));

    let loaded = user.load(LoadOptions::new());
    scheduler.run_until_idle();

    assert!(loaded.is_rejected());
    assert_eq!(*events.lock().unwrap(), [LifecycleEvent::AfterLoad]);
}

#[test]
fn load_by_id_seeds_and_loads() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    proxy.insert_row("7", json!({"id": "7", "name": "Grace"}));

    let loaded = Record::load_by_id(
        user_descriptor(),
        proxy.clone(),
        json!("7"),
        LoadOptions::new(),
    );
    scheduler.run_until_idle();

    let settlement = loaded.settlement().expect("settled");
    let (record, _) = settlement.value().expect("fulfilled").clone();
    assert_eq!(record.id(), Some(json!("7")));
    assert_eq!(record.get("name"), Some(json!("Grace")));
    assert!(!record.phantom());
}

#[test]
fn load_scope_becomes_transform_context() {
    let scheduler = QueueScheduler::new();
    let proxy = MemoryProxy::new(scheduler.clone());
    proxy.insert_row("1", json!({"id": "1"}));

    let user = Record::new(user_descriptor(), proxy.clone(), json!({"id": "1"}));
    let scope = Record::new(
        RecordDescriptor::new("Controller"),
        proxy.clone(),
        json!({"id": "scope-marker"}),
    );

    let seen = Arc::new(Mutex::new(None));
    let seen_in = seen.clone();
    user.load(LoadOptions::new().with_scope(scope.clone()))
        .then(move |context, outcome| {
            *seen_in.lock().unwrap() = context.id();
            Ok(outcome)
        });
    scheduler.run_until_idle();

    assert_eq!(*seen.lock().unwrap(), Some(json!("scope-marker")));
}
