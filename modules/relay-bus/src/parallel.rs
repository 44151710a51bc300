//! Opt-in parallel publish.
//!
//! Each handler of the snapshot runs on tokio's blocking pool and all of them
//! are awaited before returning. Execution order between handlers is
//! unspecified; failure containment is the same as `publish`, and failures are
//! returned in registration order. Each failure is reported from the worker
//! that ran the handler, so dropping the returned future loses nothing. Nested
//! publish depth is tracked per thread, so handlers start at depth zero on
//! their worker thread.

use std::panic;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::join_all;
use tracing::debug;

use crate::dispatcher::{contain, finish, invoke, Dispatcher};
use crate::error::PublishError;

impl<P: Send + Sync + 'static> Dispatcher<P> {
    /// Deliver `payload` to every handler for `event` concurrently.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn publish_parallel(
        &self,
        event: &str,
        payload: Arc<P>,
    ) -> Result<(), PublishError> {
        let Some((name, snapshot)) = self.snapshot(event) else {
            debug!(event, "No handlers for event");
            return Ok(());
        };

        let claimed: Vec<_> = snapshot
            .iter()
            .filter(|registration| self.claim(&name, registration))
            .cloned()
            .collect();

        debug!(event = %name, handlers = claimed.len(), "Publishing event in parallel");

        let catch_panics = self.catches_panics();
        let tasks = claimed.iter().map(|registration| {
            let registration = Arc::clone(registration);
            let payload = Arc::clone(&payload);
            let reporter = self.reporter();
            let name = name.clone();
            tokio::task::spawn_blocking(move || {
                invoke(&*registration, &*payload, catch_panics)
                    .map_err(|error| contain(reporter.as_ref(), &name, &*registration, error))
            })
        });
        let outcomes = join_all(tasks).await;

        let mut failures = Vec::new();
        for (registration, outcome) in claimed.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => failures.push(failure),
                Err(join) if join.is_panic() => panic::resume_unwind(join.into_panic()),
                Err(join) => failures.push(self.contain(
                    &name,
                    registration,
                    anyhow!("handler task did not complete: {join}"),
                )),
            }
        }

        finish(name, claimed.len(), failures)
    }
}
