//! Interaction memory.
//!
//! An append-only SQLite log of handled utterances plus a small preference
//! table, with similarity recall over past utterances.

pub mod keywords;
pub mod record;
pub mod store;

pub use record::{MemoryRecord, Preference, RecallMatch};
pub use store::{MemoryStore, RECALL_THRESHOLD};
