//! In-memory cookie store with change subscriptions
//!
//! The store is the authoritative copy of a client's cookies. It is meant to
//! be shared behind an `Arc` by every request a client issues: mutations take
//! a single write lock, reads share a read lock, so concurrent readers never
//! observe a half-applied update.
//!
//! Change events are queued while the write lock is held and delivered one at
//! a time in queue order, so a listener sees mutations in the order they were
//! applied even when several threads write at once.

use chrono::Utc;
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

use crate::error::CookieResult;
use crate::event::{CookieChange, CookieChangeEvent, CookieChangeListener, SubscriptionId};
use crate::parse::{parse_cookie_string, serialize_cookie_string};
use crate::record::CookieRecord;

/// Ordered, observable collection of cookies
///
/// Method names follow the browser cookie-store API (`get`, `get_all`,
/// `set`, `delete`, change subscriptions) so the store can stand in for a
/// native one outside the browser.
///
/// # Examples
///
/// ```rust
/// use hookfetch_cookies::CookieStore;
///
/// let store = CookieStore::new("theme=dark; lang=en");
/// assert_eq!(store.get("theme").map(|c| c.value), Some("dark".to_string()));
///
/// store.set("lang", "fr").unwrap();
/// store.delete("theme");
/// assert_eq!(store.cookie_string(), "lang=fr");
/// ```
pub struct CookieStore {
    records: RwLock<Vec<CookieRecord>>,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn CookieChangeListener>)>>,
    next_subscription: AtomicU64,
    dispatch: Mutex<Dispatch>,
}

/// Events waiting for delivery, and whether some thread is delivering them
#[derive(Default)]
struct Dispatch {
    pending: VecDeque<CookieChangeEvent>,
    active: bool,
}

/// Clears the `active` flag if a listener panics mid-delivery
struct DeliveryGuard<'a>(&'a Mutex<Dispatch>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().active = false;
        }
    }
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::from_records(Vec::new())
    }
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("records", &*self.records.read())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl CookieStore {
    /// Create a store from a serialized cookie string such as `a=1; b=2`
    ///
    /// An empty string yields an empty store. Later duplicates of a name
    /// replace earlier ones.
    pub fn new(cookie_string: &str) -> Self {
        Self::from_records(parse_cookie_string(cookie_string))
    }

    /// Create a store from existing records, keeping the last record per identity
    pub fn from_records(records: impl IntoIterator<Item = CookieRecord>) -> Self {
        let mut initial: Vec<CookieRecord> = Vec::new();
        for record in records {
            match initial.iter_mut().find(|r| r.same_identity(&record)) {
                Some(existing) => *existing = record,
                None => initial.push(record),
            }
        }
        Self {
            records: RwLock::new(initial),
            listeners: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            dispatch: Mutex::new(Dispatch::default()),
        }
    }

    /// First live cookie with the given name
    pub fn get(&self, name: &str) -> Option<CookieRecord> {
        let now = Utc::now();
        self.records
            .read()
            .iter()
            .find(|r| r.name == name && !r.is_expired_at(now))
            .cloned()
    }

    /// All live cookies, in insertion order
    pub fn get_all(&self) -> Vec<CookieRecord> {
        let now = Utc::now();
        self.records
            .read()
            .iter()
            .filter(|r| !r.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// All live cookies with the given name (one per domain/path scope)
    pub fn get_all_named(&self, name: &str) -> Vec<CookieRecord> {
        let now = Utc::now();
        self.records
            .read()
            .iter()
            .filter(|r| r.name == name && !r.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Iterate over a snapshot of the live cookies
    ///
    /// The iterator is `Clone`, so a copy taken before consumption replays
    /// the same snapshot.
    pub fn iter(&self) -> std::vec::IntoIter<CookieRecord> {
        self.get_all().into_iter()
    }

    /// Number of live cookies
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.records
            .read()
            .iter()
            .filter(|r| !r.is_expired_at(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set a session cookie with default attributes
    ///
    /// # Errors
    ///
    /// Returns a [`CookieError`](crate::CookieError) when the name or value
    /// cannot be carried in a `Cookie` header.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> CookieResult<()> {
        self.set_with(CookieRecord::new(name, value))
    }

    /// Insert or replace a cookie with explicit attributes
    ///
    /// A record with the same `(name, domain, path)` is replaced in place.
    /// Setting an already-expired record deletes the stored one. Other
    /// records found expired along the way are dropped and reported as
    /// deletions in the same event.
    ///
    /// # Errors
    ///
    /// Returns a [`CookieError`](crate::CookieError) when the record fails
    /// [`CookieRecord::validate`].
    pub fn set_with(&self, record: CookieRecord) -> CookieResult<()> {
        record.validate()?;
        let now = Utc::now();

        let mut records = self.records.write();
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *records)
            .into_iter()
            .partition(|r| r.is_expired_at(now) && !r.same_identity(&record));
        *records = kept;
        let mut changes: Vec<CookieChange> =
            expired.into_iter().map(CookieChange::Deleted).collect();

        let position = records.iter().position(|r| r.same_identity(&record));
        match (position, record.is_expired_at(now)) {
            (Some(index), true) => changes.push(CookieChange::Deleted(records.remove(index))),
            (None, true) => {}
            (Some(index), false) => {
                if records[index] != record {
                    let previous = std::mem::replace(&mut records[index], record.clone());
                    changes.push(CookieChange::Updated {
                        previous,
                        current: record,
                    });
                }
            }
            (None, false) => {
                records.push(record.clone());
                changes.push(CookieChange::Added(record));
            }
        }

        if let Some(change) = changes.last() {
            trace!(cookie = %change.record().name, "Cookie store mutated");
        }
        self.publish(records, changes);
        Ok(())
    }

    /// Delete every cookie with the given name, returning how many were removed
    pub fn delete(&self, name: &str) -> usize {
        let mut records = self.records.write();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *records)
            .into_iter()
            .partition(|r| r.name == name);
        *records = kept;

        let count = removed.len();
        self.publish(records, removed.into_iter().map(CookieChange::Deleted).collect());
        count
    }

    /// Delete the cookie with an exact `(name, domain, path)` identity
    pub fn delete_matching(&self, name: &str, domain: Option<&str>, path: &str) -> bool {
        let key = CookieRecord::new(name, "").with_path(path);
        let key = match domain {
            Some(domain) => key.with_domain(domain),
            None => key,
        };

        let mut records = self.records.write();
        let position = records.iter().position(|r| r.same_identity(&key));
        let removed = position.map(|index| records.remove(index));

        let found = removed.is_some();
        self.publish(records, removed.into_iter().map(CookieChange::Deleted).collect());
        found
    }

    /// Remove all cookies
    pub fn clear(&self) {
        let mut records = self.records.write();
        let removed = std::mem::take(&mut *records);
        self.publish(records, removed.into_iter().map(CookieChange::Deleted).collect());
    }

    /// Serialize all live cookies as a `Cookie` header value
    ///
    /// The output carries only `name=value` pairs. Records that share a name
    /// under different domains or paths all appear, and [`CookieStore::new`]
    /// collapses them back into a single unscoped record holding the last value.
    pub fn cookie_string(&self) -> String {
        serialize_cookie_string(&self.get_all())
    }

    /// Live cookies that should be sent to `host` + `path`
    pub fn matching(&self, host: &str, path: &str, secure: bool) -> Vec<CookieRecord> {
        let now = Utc::now();
        self.records
            .read()
            .iter()
            .filter(|r| !r.is_expired_at(now) && r.matches(host, path, secure))
            .cloned()
            .collect()
    }

    /// `Cookie` header value for a request, or `None` if nothing matches
    pub fn cookie_header_for(&self, host: &str, path: &str, secure: bool) -> Option<String> {
        let matching = self.matching(host, path, secure);
        if matching.is_empty() {
            None
        } else {
            Some(serialize_cookie_string(&matching))
        }
    }

    /// Register a listener for change events
    pub fn subscribe(&self, listener: Arc<dyn CookieChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        debug!("Cookie store listener registered: {}", id);
        id
    }

    /// Remove a listener. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() < before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Queue `changes` while the write lock is still held, release it, then deliver
    fn publish(&self, records: RwLockWriteGuard<'_, Vec<CookieRecord>>, changes: Vec<CookieChange>) {
        if changes.is_empty() {
            return;
        }
        self.dispatch
            .lock()
            .pending
            .push_back(CookieChangeEvent { changes });
        drop(records);
        self.deliver();
    }

    /// Drain the queue unless another thread (or an outer frame of this one) already is
    fn deliver(&self) {
        {
            let mut dispatch = self.dispatch.lock();
            if dispatch.active {
                return;
            }
            dispatch.active = true;
        }

        let _guard = DeliveryGuard(&self.dispatch);
        loop {
            let event = {
                let mut dispatch = self.dispatch.lock();
                match dispatch.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        dispatch.active = false;
                        return;
                    }
                }
            };
            self.notify(&event);
        }
    }

    fn notify(&self, event: &CookieChangeEvent) {
        // Snapshot so listeners may subscribe, unsubscribe or mutate the store
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener.on_change(event);
        }
    }
}
