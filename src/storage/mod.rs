//! Storage Module
//!
//! An in-memory map from string keys to string values, each optionally
//! carrying an absolute expiry instant. Expiry is lazy: entries are checked
//! against the clock when read, and nothing runs in the background.
//!
//! ## Example
//!
//! ```
//! use lazykv::storage::ExpiringStore;
//! use std::time::Duration;
//!
//! let store = ExpiringStore::new();
//!
//! store.put("name", "Ariz", None);
//! assert_eq!(store.get("name").as_deref(), Some("Ariz"));
//!
//! store.put("session", "token123", Some(Duration::from_secs(3600)));
//! ```

pub mod clock;
pub mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Entry, ExpiringStore, StorageStats};
