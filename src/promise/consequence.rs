use super::deferred::{Deferred, Settlement};
use super::scheduler::Scheduler;
use std::sync::Arc;

/// A transform applied to a settlement value before it reaches the
/// downstream deferred. The context is passed positionally; `Ok` resolves
/// the downstream deferred, `Err` rejects it.
pub type Transform<C, In, V, R> =
    Box<dyn FnOnce(&C, In) -> std::result::Result<V, R> + Send>;

pub type OnFulfilled<C, V, R> = Transform<C, V, V, R>;
pub type OnRejected<C, V, R> = Transform<C, R, V, R>;

/// One continuation attached to a deferred: optional transforms for each
/// settlement action and the downstream deferred they must settle.
///
/// Triggered at most once, by the owning deferred's single-completion
/// invariant.
pub struct Consequence<C, V, R> {
    on_fulfilled: Option<OnFulfilled<C, V, R>>,
    on_rejected: Option<OnRejected<C, V, R>>,
    downstream: Deferred<C, V, R>,
    scheduler: Arc<dyn Scheduler>,
}

impl<C, V, R> Consequence<C, V, R>
where
    C: Clone + Send + 'static,
    V: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    pub(crate) fn new(
        on_fulfilled: Option<OnFulfilled<C, V, R>>,
        on_rejected: Option<OnRejected<C, V, R>>,
        downstream: Deferred<C, V, R>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            on_fulfilled,
            on_rejected,
            downstream,
            scheduler,
        }
    }

    /// Dispatches the settlement to the matching transform and downstream
    /// settle method.
    pub(crate) fn trigger(self, context: C, settlement: Settlement<V, R>) {
        let Self {
            on_fulfilled,
            on_rejected,
            downstream,
            scheduler,
        } = self;

        match settlement {
            Settlement::Fulfilled(value) => propagate(
                context,
                value,
                on_fulfilled,
                downstream,
                Deferred::resolve_with,
                &scheduler,
            ),
            Settlement::Rejected(reason) => propagate(
                context,
                reason,
                on_rejected,
                downstream,
                Deferred::reject_with,
                &scheduler,
            ),
        }
    }
}

/// Transforms and propagates a settlement value.
///
/// With a transform present, the work is scheduled so it never runs inside
/// the `resolve`/`reject` call that triggered it; the transform's `Result`
/// settles the downstream deferred. Without a transform the value passes
/// through synchronously via `downstream_settle`; no user code runs, so no
/// task is needed.
fn propagate<C, T, V, R>(
    context: C,
    value: T,
    transform: Option<Transform<C, T, V, R>>,
    downstream: Deferred<C, V, R>,
    downstream_settle: fn(&Deferred<C, V, R>, C, T),
    scheduler: &Arc<dyn Scheduler>,
) where
    C: Clone + Send + 'static,
    T: Send + 'static,
    V: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    match transform {
        Some(transform) => scheduler.schedule(Box::new(move || {
            match transform(&context, value) {
                Ok(value) => downstream.resolve_with(context, value),
                Err(reason) => downstream.reject_with(context, reason),
            }
        })),
        None => downstream_settle(&downstream, context, value),
    }
}
