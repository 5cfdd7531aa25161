//! Concrete implementations of the traits in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: test doubles for desktop development and tests
//!
//! The async channel-backed transport lives in `services` (requires the
//! `runtime` feature).

pub mod mock;

pub use mock::*;
