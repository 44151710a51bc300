//! Handler trait and registration identity.

use std::any::Any;
use std::fmt;

use anyhow::Result;

/// Identifies one registration within a dispatcher.
///
/// Ids are assigned in subscribe order and never reused, so the same handler
/// subscribed twice gets two ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reacts to a published payload. May perform I/O, mutate shared state, or
/// publish further events.
///
/// Returning `Err` marks this handler as failed for the current publish; the
/// remaining handlers still run. Closures of the shape `Fn(&P) -> Result<()>`
/// implement this trait, so most callers never name it directly.
pub trait Handler<P>: Send + Sync {
    fn handle(&self, payload: &P) -> Result<()>;
}

impl<P, F> Handler<P> for F
where
    F: Fn(&P) -> Result<()> + Send + Sync,
{
    fn handle(&self, payload: &P) -> Result<()> {
        self(payload)
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
