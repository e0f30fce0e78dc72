//! Utility modules for the cartridge sync agent.
//!
//! - [`debounce`]: per-key debouncing for coalescing rapid file system events

pub mod debounce;

pub use debounce::{Debouncer, DebouncerError, DEFAULT_DEBOUNCE_MS};
