//! FailureReporter implementations.

use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::error::HandlerFailure;

/// Receives each handler failure as soon as it is contained, before the
/// publish finishes.
///
/// Configured once per dispatcher through `DispatcherOptions`. Closures of the
/// shape `Fn(&HandlerFailure)` are reporters too.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: &HandlerFailure);
}

impl<F> FailureReporter for F
where
    F: Fn(&HandlerFailure) + Send + Sync,
{
    fn report(&self, failure: &HandlerFailure) {
        self(failure)
    }
}

// ---------------------------------------------------------------------------
// TracingReporter (default)
// ---------------------------------------------------------------------------

/// Logs every failure at `warn` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: &HandlerFailure) {
        warn!(
            event = %failure.event,
            handler_id = %failure.handler_id,
            handler = %failure.handler,
            error = %format!("{:#}", failure.error),
            "Event handler failed"
        );
    }
}

// ---------------------------------------------------------------------------
// CollectingReporter (tests and diagnostics)
// ---------------------------------------------------------------------------

/// A failure as recorded by [`CollectingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedFailure {
    pub event: String,
    pub handler_id: u64,
    pub handler: String,
    pub error: String,
}

/// Keeps every reported failure in memory. Hand the dispatcher an
/// `Arc<CollectingReporter>` and keep a clone to inspect what it reported.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    failures: Mutex<Vec<ReportedFailure>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All failures reported so far, oldest first.
    pub fn failures(&self) -> Vec<ReportedFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureReporter for CollectingReporter {
    fn report(&self, failure: &HandlerFailure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ReportedFailure {
                event: failure.event.to_string(),
                handler_id: failure.handler_id.as_u64(),
                handler: failure.handler.clone(),
                error: format!("{:#}", failure.error),
            });
    }
}
