//! Trait definitions for the external collaborators of the controller core.
//!
//! # Submodules
//!
//! - `transport`: byte stream per device address, connect/disconnect requests
//! - `clock`: millisecond time source for the event loop
//!
//! Test doubles for both live in [`crate::hal::mock`].

pub mod clock;
pub mod transport;

pub use clock::*;
pub use transport::*;
