//! # ratelimit
//!
//! Trailing-edge debounce primitives used to keep outbound calls under a platform rate limit.
//!
//! - **[`DebounceWithArgs`]** – coalesces calls carrying arguments; the action runs once with the latest arguments.
//! - **[`Debounce`]** – zero-argument form for signals such as a typing indicator.
//!
//! Each instance owns one tokio task that holds the timer and runs the action, so firings of one
//! instance never overlap. Both types must be created inside a tokio runtime.

mod debounce;

pub use debounce::{Debounce, DebounceWithArgs};
