//! Typed errors for registration and delivery.

use std::fmt;

use thiserror::Error;

use crate::handler::HandlerId;
use crate::registry::EventName;

/// Errors returned synchronously by registration calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Empty event name, or another malformed registration.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
}

/// Result type alias for registration calls.
pub type BusResult<T> = std::result::Result<T, BusError>;

/// A single handler's failure during one publish.
#[derive(Debug)]
pub struct HandlerFailure {
    pub event: EventName,
    pub handler_id: HandlerId,
    pub handler: String,
    pub error: anyhow::Error,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler {} ({}) failed on '{}': {:#}",
            self.handler_id, self.handler, self.event, self.error
        )
    }
}

/// Errors returned from `publish` once every handler has had its turn.
#[derive(Debug, Error)]
pub enum PublishError {
    /// One or more handlers returned an error or panicked. Siblings still ran.
    #[error("{} of {invoked} handler(s) failed for '{event}'", .failures.len())]
    HandlerFailures {
        event: EventName,
        invoked: usize,
        failures: Vec<HandlerFailure>,
    },

    /// Nested publishes on this thread went deeper than the configured limit.
    #[error("publish depth limit of {limit} exceeded while publishing '{event}'")]
    DepthExceeded { event: EventName, limit: usize },

    /// A typed event could not be turned into a JSON payload.
    #[error("payload for '{event}' could not be serialized: {source}")]
    InvalidPayload {
        event: EventName,
        #[source]
        source: serde_json::Error,
    },
}

impl PublishError {
    /// Handler failures carried by this error. Empty for the other variants.
    pub fn failures(&self) -> &[HandlerFailure] {
        match self {
            PublishError::HandlerFailures { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn event(&self) -> &EventName {
        match self {
            PublishError::HandlerFailures { event, .. }
            | PublishError::DepthExceeded { event, .. }
            | PublishError::InvalidPayload { event, .. } => event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_failures_message_counts_failed_and_invoked() {
        let event = EventName::new("user:loggedIn").unwrap();
        let err = PublishError::HandlerFailures {
            event: event.clone(),
            invoked: 3,
            failures: vec![HandlerFailure {
                event,
                handler_id: HandlerId::from_raw(7),
                handler: "audit".into(),
                error: anyhow::anyhow!("sink closed"),
            }],
        };

        assert_eq!(err.to_string(), "1 of 3 handler(s) failed for 'user:loggedIn'");
        assert_eq!(
            err.failures()[0].to_string(),
            "handler #7 (audit) failed on 'user:loggedIn': sink closed"
        );
    }

    #[test]
    fn depth_exceeded_has_no_failures() {
        let err = PublishError::DepthExceeded {
            event: EventName::new("loop").unwrap(),
            limit: 4,
        };

        assert!(err.failures().is_empty());
        assert_eq!(err.event().as_str(), "loop");
    }
}
