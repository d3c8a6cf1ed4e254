//! Change events emitted by [`CookieStore`](crate::CookieStore) mutations

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::CookieRecord;

/// One mutation applied to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CookieChange {
    /// A cookie that did not exist before
    Added(CookieRecord),

    /// An existing cookie was replaced
    Updated {
        previous: CookieRecord,
        current: CookieRecord,
    },

    /// A cookie was removed
    Deleted(CookieRecord),
}

impl CookieChange {
    /// The record as it stands after the change (the removed record for deletions)
    pub fn record(&self) -> &CookieRecord {
        match self {
            CookieChange::Added(record) | CookieChange::Deleted(record) => record,
            CookieChange::Updated { current, .. } => current,
        }
    }
}

/// A batch of changes produced by a single store operation
///
/// Mirrors the browser cookie-store `change` event: `changed()` lists
/// added and updated cookies, `deleted()` lists removed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieChangeEvent {
    pub changes: Vec<CookieChange>,
}

impl CookieChangeEvent {
    /// Cookies that were added or updated
    pub fn changed(&self) -> impl Iterator<Item = &CookieRecord> {
        self.changes.iter().filter_map(|change| match change {
            CookieChange::Added(record) => Some(record),
            CookieChange::Updated { current, .. } => Some(current),
            CookieChange::Deleted(_) => None,
        })
    }

    /// Cookies that were deleted
    pub fn deleted(&self) -> impl Iterator<Item = &CookieRecord> {
        self.changes.iter().filter_map(|change| match change {
            CookieChange::Deleted(record) => Some(record),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Receives change events from a store
///
/// Events are delivered one at a time, in the order the mutations were
/// applied. A listener normally runs on the mutating thread once the write
/// lock is released; if another thread is already delivering, that thread
/// delivers the event instead, so a mutation may return before its listeners
/// run. Listeners may read the store, and may mutate it: the resulting event
/// is delivered after the current one.
pub trait CookieChangeListener: Send + Sync {
    fn on_change(&self, event: &CookieChangeEvent);
}

impl<F> CookieChangeListener for F
where
    F: Fn(&CookieChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &CookieChangeEvent) {
        self(event)
    }
}

/// Handle returned by [`CookieStore::subscribe`](crate::CookieStore::subscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}
