//! The dispatch loop.

use std::any::type_name;
use std::cell::Cell;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::error::{BusResult, HandlerFailure, PublishError};
use crate::handler::{panic_message, Handler};
use crate::options::DispatcherOptions;
use crate::registry::{EventName, Registration, Registry, Subscription};
use crate::report::FailureReporter;

thread_local! {
    static PUBLISH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one level of publish nesting on the current thread for as long as
/// it is alive. Unwinding drops it too.
struct DepthGuard;

impl DepthGuard {
    fn enter(limit: usize) -> Option<Self> {
        PUBLISH_DEPTH.with(|depth| {
            if depth.get() >= limit {
                return None;
            }
            depth.set(depth.get() + 1);
            Some(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        PUBLISH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Event dispatcher.
///
/// Snapshot → invoke each handler in order → contain failures → report.
/// Construct one per application context and share it through an `Arc`; the
/// dispatcher is `Send + Sync` and every method takes `&self`.
pub struct Dispatcher<P> {
    registry: Registry<P>,
    reporter: Arc<dyn FailureReporter>,
    max_depth: usize,
    warn_handler_threshold: Option<usize>,
    catch_panics: bool,
    warned: Mutex<HashSet<EventName>>,
}

impl<P: 'static> Dispatcher<P> {
    pub fn new() -> Self {
        Self::with_options(DispatcherOptions::default())
    }

    pub fn with_options(options: DispatcherOptions) -> Self {
        Self {
            registry: Registry::new(),
            reporter: options.reporter,
            max_depth: options.max_depth,
            warn_handler_threshold: options.warn_handler_threshold,
            catch_panics: options.catch_panics,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Append `handler` to the list for `event`. The same closure logic may be
    /// subscribed any number of times; each registration runs once per publish.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> BusResult<Subscription>
    where
        F: Fn(&P) -> Result<()> + Send + Sync + 'static,
    {
        self.register(event, type_name::<F>().into(), Arc::new(handler), false)
    }

    /// Like [`subscribe`](Self::subscribe), with the label used in failure
    /// reports and logs.
    pub fn subscribe_labeled<F>(
        &self,
        event: &str,
        label: &str,
        handler: F,
    ) -> BusResult<Subscription>
    where
        F: Fn(&P) -> Result<()> + Send + Sync + 'static,
    {
        self.register(event, label.into(), Arc::new(handler), false)
    }

    /// Register an already shared handler. Subscribing the same `Arc` twice
    /// makes it run twice.
    pub fn subscribe_shared(
        &self,
        event: &str,
        label: &str,
        handler: Arc<dyn Handler<P>>,
    ) -> BusResult<Subscription> {
        self.register(event, label.into(), handler, false)
    }

    /// Register a handler that is removed the first time it is dispatched.
    pub fn once<F>(&self, event: &str, handler: F) -> BusResult<Subscription>
    where
        F: Fn(&P) -> Result<()> + Send + Sync + 'static,
    {
        self.register(event, type_name::<F>().into(), Arc::new(handler), true)
    }

    fn register(
        &self,
        event: &str,
        label: Arc<str>,
        handler: Arc<dyn Handler<P>>,
        once: bool,
    ) -> BusResult<Subscription> {
        let name = EventName::new(event)?;
        let (subscription, count) = self.registry.insert(name, label, handler, once);

        debug!(
            event = %subscription.event,
            handler_id = %subscription.id,
            handlers = count,
            once,
            "Handler subscribed"
        );
        self.check_handler_threshold(&subscription.event, count);

        Ok(subscription)
    }

    fn check_handler_threshold(&self, event: &EventName, count: usize) {
        let Some(threshold) = self.warn_handler_threshold else {
            return;
        };
        if count <= threshold {
            return;
        }
        let first_time = self
            .warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.clone());
        if first_time {
            warn!(
                event = %event,
                handlers = count,
                threshold,
                "Possible handler leak: handler count exceeds threshold"
            );
        }
    }

    /// Remove exactly the registration behind `subscription`. Returns `false`
    /// if it was already gone. Publishes already in flight are unaffected.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let removed = self
            .registry
            .remove(subscription.event.as_str(), subscription.id);
        if removed {
            debug!(
                event = %subscription.event,
                handler_id = %subscription.id,
                "Handler unsubscribed"
            );
        }
        removed
    }

    /// Deliver `payload` to every handler registered for `event`.
    ///
    /// Handlers run on the calling thread, in registration order, against the
    /// list as it stood when this call started. Unknown events are a no-op.
    /// Every handler runs even if earlier ones fail; failures are reported as
    /// they happen and returned together at the end.
    pub fn publish(&self, event: &str, payload: &P) -> Result<(), PublishError> {
        let Some((name, snapshot)) = self.registry.snapshot(event) else {
            debug!(event, "No handlers for event");
            return Ok(());
        };
        let Some(_depth) = DepthGuard::enter(self.max_depth) else {
            return Err(PublishError::DepthExceeded {
                event: name,
                limit: self.max_depth,
            });
        };

        debug!(event = %name, handlers = snapshot.len(), "Publishing event");

        let mut invoked = 0;
        let mut failures = Vec::new();
        for registration in snapshot.iter() {
            if !self.claim(&name, registration) {
                continue;
            }
            invoked += 1;
            if let Err(error) = invoke(&**registration, payload, self.catch_panics) {
                failures.push(self.contain(&name, registration, error));
            }
        }

        finish(name, invoked, failures)
    }

    /// Take the right to run `registration` for this publish. Fired `once`
    /// registrations are skipped; unfired ones are removed before they run.
    pub(crate) fn claim(&self, event: &EventName, registration: &Registration<P>) -> bool {
        if !registration.claim() {
            return false;
        }
        if registration.is_once() {
            self.registry.remove(event.as_str(), registration.id);
        }
        true
    }

    /// Wrap a handler error and hand it to the reporter.
    pub(crate) fn contain(
        &self,
        event: &EventName,
        registration: &Registration<P>,
        error: anyhow::Error,
    ) -> HandlerFailure {
        contain(self.reporter.as_ref(), event, registration, error)
    }

    pub(crate) fn reporter(&self) -> Arc<dyn FailureReporter> {
        Arc::clone(&self.reporter)
    }

    pub(crate) fn catches_panics(&self) -> bool {
        self.catch_panics
    }

    pub(crate) fn snapshot(
        &self,
        event: &str,
    ) -> Option<(EventName, crate::registry::Snapshot<P>)> {
        self.registry.snapshot(event)
    }

    /// Number of handlers currently registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.registry.len(event)
    }

    /// Names with at least one handler, sorted.
    pub fn event_names(&self) -> Vec<EventName> {
        self.registry.names()
    }

    /// Remove every handler for `event`. Returns how many were removed.
    pub fn clear(&self, event: &str) -> usize {
        let removed = self.registry.clear(event);
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event);
        removed
    }

    /// Remove every handler for every event.
    pub fn clear_all(&self) -> usize {
        let removed = self.registry.clear_all();
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        removed
    }
}

impl<P: 'static> Default for Dispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one handler, turning a panic into an error unless `catch_panics` is off.
pub(crate) fn invoke<P>(
    registration: &Registration<P>,
    payload: &P,
    catch_panics: bool,
) -> Result<()> {
    if !catch_panics {
        return registration.handler.handle(payload);
    }
    match panic::catch_unwind(AssertUnwindSafe(|| registration.handler.handle(payload))) {
        Ok(result) => result,
        Err(panic) => Err(anyhow!("handler panicked: {}", panic_message(&*panic))),
    }
}

pub(crate) fn contain<P>(
    reporter: &dyn FailureReporter,
    event: &EventName,
    registration: &Registration<P>,
    error: anyhow::Error,
) -> HandlerFailure {
    let failure = HandlerFailure {
        event: event.clone(),
        handler_id: registration.id,
        handler: registration.label.to_string(),
        error,
    };
    reporter.report(&failure);
    failure
}

pub(crate) fn finish(
    event: EventName,
    invoked: usize,
    failures: Vec<HandlerFailure>,
) -> Result<(), PublishError> {
    if failures.is_empty() {
        return Ok(());
    }
    Err(PublishError::HandlerFailures {
        event,
        invoked,
        failures,
    })
}
