//! Cache Module
//!
//! Key composition, the typed value codec and the cache client built on them.

mod client;
pub mod codec;
mod keys;
mod value;


// Re-export public types
pub use client::{CacheClient, SetOptions, DEFAULT_KEY_PATTERN};
pub use codec::TAG_SEPARATOR;
pub use keys::{KeyComposer, KEY_SEPARATOR};
pub use value::{CacheValue, Record, TypeTag};
