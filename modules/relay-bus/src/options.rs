//! Dispatcher construction options.

use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::report::{FailureReporter, TracingReporter};

/// Nested publish depth allowed on one thread before publish refuses.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Handler count per event above which a leak warning is logged.
pub const DEFAULT_WARN_HANDLER_THRESHOLD: usize = 10;

#[derive(Clone, TypedBuilder)]
pub struct DispatcherOptions {
    /// Where contained handler failures are reported.
    #[builder(default = Arc::new(TracingReporter) as Arc<dyn FailureReporter>)]
    pub reporter: Arc<dyn FailureReporter>,

    #[builder(default = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// `None` disables the warning.
    #[builder(default = Some(DEFAULT_WARN_HANDLER_THRESHOLD))]
    pub warn_handler_threshold: Option<usize>,

    /// When false, a panicking handler unwinds through `publish`.
    #[builder(default = true)]
    pub catch_panics: bool,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
