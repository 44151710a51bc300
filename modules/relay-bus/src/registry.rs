//! Event names, subscriptions, and the copy-on-write handler registry.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BusError, BusResult};
use crate::handler::{Handler, HandlerId};

/// Name of a category of occurrence. Any non-empty string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventName(Arc<str>);

impl EventName {
    pub fn new(name: impl AsRef<str>) -> BusResult<Self> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(BusError::InvalidRegistration(
                "event name must not be empty".into(),
            ));
        }
        Ok(Self(Arc::from(name)))
    }

    /// Wraps a name without validation. Only for names that are looked up,
    /// never registered.
    pub(crate) fn unchecked(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EventName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EventName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// Handle returned by subscribe. Passing it to `unsubscribe` removes exactly
/// this registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub event: EventName,
    pub id: HandlerId,
}

/// One entry in an event's handler list.
pub(crate) struct Registration<P> {
    pub(crate) id: HandlerId,
    pub(crate) label: Arc<str>,
    pub(crate) handler: Arc<dyn Handler<P>>,
    /// `Some` for `once` registrations; flips to `true` when claimed.
    fired: Option<AtomicBool>,
}

impl<P> Registration<P> {
    pub(crate) fn is_once(&self) -> bool {
        self.fired.is_some()
    }

    /// Whether this registration may run now. A `once` registration can be
    /// claimed a single time across all publishes, nested ones included.
    pub(crate) fn claim(&self) -> bool {
        match &self.fired {
            Some(fired) => !fired.swap(true, Ordering::AcqRel),
            None => true,
        }
    }
}

// Shared by every dispatcher in the process, so handles never collide.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type Snapshot<P> = Arc<Vec<Arc<Registration<P>>>>;

/// EventName → ordered registrations.
///
/// Each list sits behind an `Arc`. Publishers clone the `Arc` and iterate
/// without holding the lock; writers go through `Arc::make_mut`, which copies
/// the list only while a publish still holds the old one.
pub(crate) struct Registry<P> {
    entries: RwLock<HashMap<EventName, Snapshot<P>>>,
}

impl<P> Registry<P> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    // Handler code never runs under these locks, so a poisoned lock still
    // guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<EventName, Snapshot<P>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EventName, Snapshot<P>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a registration and returns its handle plus the new list length.
    pub(crate) fn insert(
        &self,
        event: EventName,
        label: Arc<str>,
        handler: Arc<dyn Handler<P>>,
        once: bool,
    ) -> (Subscription, usize) {
        let id = HandlerId::from_raw(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            label,
            handler,
            fired: once.then(|| AtomicBool::new(false)),
        });

        let mut entries = self.write();
        let list = entries.entry(event.clone()).or_default();
        Arc::make_mut(list).push(registration);
        let len = list.len();

        (Subscription { event, id }, len)
    }

    /// The current list for `event`, with the stored name.
    pub(crate) fn snapshot(&self, event: &str) -> Option<(EventName, Snapshot<P>)> {
        let entries = self.read();
        let (name, list) = entries.get_key_value(event)?;
        Some((name.clone(), Arc::clone(list)))
    }

    pub(crate) fn remove(&self, event: &str, id: HandlerId) -> bool {
        let mut entries = self.write();
        let Some(list) = entries.get_mut(event) else {
            return false;
        };
        let Some(pos) = list.iter().position(|r| r.id == id) else {
            return false;
        };
        Arc::make_mut(list).remove(pos);
        if list.is_empty() {
            entries.remove(event);
        }
        true
    }

    pub(crate) fn len(&self, event: &str) -> usize {
        self.read().get(event).map_or(0, |list| list.len())
    }

    pub(crate) fn names(&self) -> Vec<EventName> {
        let mut names: Vec<EventName> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn clear(&self, event: &str) -> usize {
        self.write().remove(event).map_or(0, |list| list.len())
    }

    pub(crate) fn clear_all(&self) -> usize {
        self.write().drain().map(|(_, list)| list.len()).sum()
    }
}
