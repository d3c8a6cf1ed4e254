//! # hookfetch cookies
//!
//! Cookie records, the `Cookie` / `Set-Cookie` header codec, and an
//! in-memory [`CookieStore`] that can be shared by every request a client
//! issues.
//!
//! ## Features
//!
//! - Browser-style store API: `get`, `get_all`, `set`, `delete`
//! - Uniqueness by `(name, domain, path)`, most recent write wins
//! - Change subscriptions for syncing to external storage
//! - Single-writer locking with concurrent readers
//!
//! ## Usage
//!
//! ```rust
//! use hookfetch_cookies::{CookieChangeEvent, CookieStore, parse_set_cookie};
//! use std::sync::Arc;
//!
//! let store = CookieStore::new("session=abc");
//! let id = store.subscribe(Arc::new(|event: &CookieChangeEvent| {
//!     for cookie in event.changed() {
//!         println!("persist {}", cookie);
//!     }
//! }));
//!
//! let record = parse_set_cookie("theme=dark; Path=/; HttpOnly").unwrap();
//! store.set_with(record).unwrap();
//! assert_eq!(store.cookie_string(), "session=abc; theme=dark");
//!
//! store.unsubscribe(id);
//! ```

pub mod error;
pub mod event;
pub mod parse;
pub mod record;
pub mod store;

pub use error::{CookieError, CookieResult};
pub use event::{CookieChange, CookieChangeEvent, CookieChangeListener, SubscriptionId};
pub use parse::{parse_cookie_string, parse_set_cookie, parse_set_cookie_at, serialize_cookie_string};
pub use record::{CookieRecord, DEFAULT_PATH, SameSite};
pub use store::CookieStore;
