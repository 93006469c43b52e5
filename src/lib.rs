//! # kvindex
//!
//! Two in-memory index engines for a key-value server:
//!
//! - [`OrderedIndex`]: a skip list whose links carry spans, giving ordered
//!   iteration, lower/upper bounds and O(log n) rank queries over keys that
//!   may repeat.
//! - [`HashIndex`]: a chained hash table that grows and shrinks in small
//!   steps spread over later operations, with a cursor-based
//!   [`scan`](HashIndex::scan) that stays correct across resizes.
//!
//! Both engines are single-threaded. [`SharedHashIndex`] and
//! [`SharedOrderedIndex`] wrap them in `parking_lot` locks.
//!
//! Resize progress is reported through `tracing` events; install any
//! subscriber to see them.
//!
//! ## Example
//!
//! ```rust
//! use kvindex::{HashIndex, OrderedIndex};
//!
//! let mut ranked = OrderedIndex::with_seed(1);
//! ranked.insert(30, "carol");
//! ranked.insert(10, "alice");
//! ranked.insert(20, "bob");
//! assert_eq!(ranked.rank(&20), 2);
//! assert_eq!(ranked.lower_bound(&15), Some((&20, &"bob")));
//!
//! let mut names = HashIndex::new();
//! names.insert("alice", 10);
//! assert_eq!(names.get("alice"), Ok(&10));
//! assert!(!names.erase("doubi"));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod arena;
pub mod config;
mod error;
pub mod hash;
pub mod ordered;
mod shared;

pub use config::{HashConfig, OrderedConfig, RehashStep};
pub use error::{Error, Result};
pub use hash::{HashIndex, HashStats, KeySet};
pub use ordered::{OrderedIndex, Score};
pub use shared::{SharedHashIndex, SharedOrderedIndex};

#[cfg(test)]
mod proptests;
