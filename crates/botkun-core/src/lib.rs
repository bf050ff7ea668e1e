//! Foundational low-level utilities shared across botkun crates.
//!
//! Provides the nanosecond-precision timestamp format used as the per-thread
//! sort key and the mention-markup stripping applied to persisted content.

pub mod mention;
pub mod time_utils;

pub use mention::strip_mentions;
pub use time_utils::{format_said_at, said_at_now};
