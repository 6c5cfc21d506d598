use super::consequence::{Consequence, OnFulfilled, OnRejected};
use super::scheduler::Scheduler;
use crate::core::lock_unpoisoned;
use std::sync::{Arc, Mutex};

/// The outcome a deferred settled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<V, R> {
    Fulfilled(V),
    Rejected(R),
}

impl<V, R> Settlement<V, R> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns the fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Fulfilled(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// Returns the rejection reason, if rejected.
    pub fn reason(&self) -> Option<&R> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

struct DeferredState<C, V, R> {
    settlement: Option<(C, Settlement<V, R>)>,
    consequences: Vec<Consequence<C, V, R>>,
}

/// A single-assignment completion box with explicit resolution context.
///
/// `C` is the context ("scope") a completion is delivered with, `V` the
/// fulfillment value type and `R` the rejection reason type. Handles are
/// cheap to clone and share one underlying completion state.
///
/// Once a `Deferred` has been fulfilled or rejected it is complete;
/// subsequent calls to [`resolve_with`](Deferred::resolve_with) or
/// [`reject_with`](Deferred::reject_with) are ignored.
pub struct Deferred<C, V, R = V> {
    state: Arc<Mutex<DeferredState<C, V, R>>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<C, V, R> Clone for Deferred<C, V, R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<C, V, R> Deferred<C, V, R>
where
    C: Clone + Send + 'static,
    V: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    /// Creates a pending deferred whose consequences run on `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeferredState {
                settlement: None,
                consequences: Vec::new(),
            })),
            scheduler,
        }
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Fulfills this deferred with the given context and value.
    pub fn resolve_with(&self, context: C, value: V) {
        self.settle(context, Settlement::Fulfilled(value));
    }

    /// Rejects this deferred with the given context and reason.
    pub fn reject_with(&self, context: C, reason: R) {
        self.settle(context, Settlement::Rejected(reason));
    }

    fn settle(&self, context: C, settlement: Settlement<V, R>) {
        let drained = {
            let mut state = lock_unpoisoned(&self.state);
            if state.settlement.is_some() {
                return;
            }
            state.settlement = Some((context.clone(), settlement.clone()));
            std::mem::take(&mut state.consequences)
        };

        // Fan-out happens outside the lock: a transform-less consequence
        // settles its downstream on this same stack.
        for consequence in drained {
            consequence.trigger(context.clone(), settlement.clone());
        }
    }

    /// Attaches transforms and returns the downstream deferred they settle.
    ///
    /// While pending, the consequence fires when this deferred completes, in
    /// attachment order. On an already-completed deferred the consequence
    /// fires immediately with the original context and outcome.
    pub fn attach(
        &self,
        on_fulfilled: Option<OnFulfilled<C, V, R>>,
        on_rejected: Option<OnRejected<C, V, R>>,
    ) -> Deferred<C, V, R> {
        let downstream = Deferred::new(Arc::clone(&self.scheduler));
        let consequence = Consequence::new(
            on_fulfilled,
            on_rejected,
            downstream.clone(),
            Arc::clone(&self.scheduler),
        );

        let mut slot = Some(consequence);
        let replay = {
            let mut state = lock_unpoisoned(&self.state);
            match state.settlement.clone() {
                None => {
                    if let Some(consequence) = slot.take() {
                        state.consequences.push(consequence);
                    }
                    None
                }
                settled => settled,
            }
        };

        if let (Some(consequence), Some((context, settlement))) = (slot, replay) {
            consequence.trigger(context, settlement);
        }

        downstream
    }

    /// Attaches a fulfillment transform; see [`attach`](Deferred::attach).
    pub fn then<F>(&self, on_fulfilled: F) -> Deferred<C, V, R>
    where
        F: FnOnce(&C, V) -> std::result::Result<V, R> + Send + 'static,
    {
        self.attach(Some(Box::new(on_fulfilled)), None)
    }

    /// Attaches a rejection transform; see [`attach`](Deferred::attach).
    pub fn on_error<F>(&self, on_rejected: F) -> Deferred<C, V, R>
    where
        F: FnOnce(&C, R) -> std::result::Result<V, R> + Send + 'static,
    {
        self.attach(None, Some(Box::new(on_rejected)))
    }

    pub fn is_pending(&self) -> bool {
        lock_unpoisoned(&self.state).settlement.is_none()
    }

    pub fn is_fulfilled(&self) -> bool {
        lock_unpoisoned(&self.state)
            .settlement
            .as_ref()
            .is_some_and(|(_, settlement)| settlement.is_fulfilled())
    }

    pub fn is_rejected(&self) -> bool {
        lock_unpoisoned(&self.state)
            .settlement
            .as_ref()
            .is_some_and(|(_, settlement)| settlement.is_rejected())
    }

    /// The outcome this deferred settled with, if complete.
    pub fn settlement(&self) -> Option<Settlement<V, R>> {
        lock_unpoisoned(&self.state)
            .settlement
            .as_ref()
            .map(|(_, settlement)| settlement.clone())
    }
}
