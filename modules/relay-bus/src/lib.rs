//! In-process event dispatch.
//!
//! A [`Dispatcher`] maps event names to ordered handler lists. Producers call
//! `publish`; every handler registered for that name runs synchronously, in
//! registration order, against a snapshot of the list taken when the publish
//! started. A failing or panicking handler never stops its siblings: failures
//! are handed to the configured [`FailureReporter`] and returned together in a
//! [`PublishError`].
//!
//! Payloads are generic. [`JsonDispatcher`] plus the [`Event`] trait give a
//! typed layer over `serde_json::Value` payloads.

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod options;
pub mod parallel;
pub mod registry;
pub mod report;
pub mod typed;

pub use dispatcher::Dispatcher;
pub use error::{BusError, BusResult, HandlerFailure, PublishError};
pub use handler::{Handler, HandlerId};
pub use options::DispatcherOptions;
pub use registry::{EventName, Subscription};
pub use report::{CollectingReporter, FailureReporter, ReportedFailure, TracingReporter};
pub use typed::{Event, JsonDispatcher};
