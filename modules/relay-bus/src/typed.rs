//! Typed events over a JSON payload bus.

use std::any::type_name;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::dispatcher::Dispatcher;
use crate::error::{BusResult, PublishError};
use crate::registry::{EventName, Subscription};

/// Dispatcher whose payloads are raw JSON values.
pub type JsonDispatcher = Dispatcher<Value>;

/// An event type with a fixed name. Producers and handlers agree on its shape
/// through the Rust type instead of through convention.
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}

impl Dispatcher<Value> {
    /// Serialize `event` and publish it under `E::NAME`.
    pub fn emit<E: Event>(&self, event: &E) -> Result<(), PublishError> {
        let payload =
            serde_json::to_value(event).map_err(|source| PublishError::InvalidPayload {
                event: EventName::unchecked(E::NAME),
                source,
            })?;
        self.publish(E::NAME, &payload)
    }

    /// Subscribe a handler that receives `E` decoded from the payload.
    ///
    /// A payload that does not decode as `E` fails this handler only; other
    /// handlers for the same name still run.
    pub fn subscribe_event<E, F>(&self, handler: F) -> BusResult<Subscription>
    where
        E: Event,
        F: Fn(E) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe_event_labeled(type_name::<F>(), handler)
    }

    pub fn subscribe_event_labeled<E, F>(&self, label: &str, handler: F) -> BusResult<Subscription>
    where
        E: Event,
        F: Fn(E) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe_labeled(E::NAME, label, move |payload: &Value| {
            let event = E::deserialize(payload)
                .with_context(|| format!("payload does not match '{}'", E::NAME))?;
            handler(event)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::options::DispatcherOptions;
    use crate::report::CollectingReporter;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderPlaced {
        id: u32,
        total_cents: u64,
    }

    impl Event for OrderPlaced {
        const NAME: &'static str = "order:placed";
    }

    #[test]
    fn emit_reaches_typed_and_raw_handlers() {
        let bus = JsonDispatcher::new();
        let typed = Arc::new(Mutex::new(Vec::new()));
        let raw = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&typed);
        bus.subscribe_event(move |order: OrderPlaced| {
            sink.lock().unwrap().push(order);
            Ok(())
        })
        .unwrap();
        let sink = Arc::clone(&raw);
        bus.subscribe("order:placed", move |payload: &Value| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        })
        .unwrap();

        bus.emit(&OrderPlaced { id: 7, total_cents: 1250 }).unwrap();

        assert_eq!(
            *typed.lock().unwrap(),
            vec![OrderPlaced { id: 7, total_cents: 1250 }]
        );
        assert_eq!(*raw.lock().unwrap(), vec![json!({"id": 7, "total_cents": 1250})]);
    }

    #[test]
    fn shape_mismatch_fails_only_the_typed_handler() {
        let reporter = Arc::new(CollectingReporter::new());
        let bus = JsonDispatcher::with_options(
            DispatcherOptions::builder().reporter(reporter.clone()).build(),
        );
        let raw_calls = Arc::new(Mutex::new(0));

        bus.subscribe_event(|_: OrderPlaced| Ok(())).unwrap();
        let calls = Arc::clone(&raw_calls);
        bus.subscribe("order:placed", move |_: &Value| {
            *calls.lock().unwrap() += 1;
            Ok(())
        })
        .unwrap();

        let err = bus
            .publish("order:placed", &json!({"id": "not a number"}))
            .unwrap_err();

        assert_eq!(err.failures().len(), 1);
        assert!(reporter.failures()[0]
            .error
            .starts_with("payload does not match 'order:placed'"));
        assert_eq!(*raw_calls.lock().unwrap(), 1);
    }
}
