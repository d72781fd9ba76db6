//! Browser automation capability for JavaScript-rendered listings.
//!
//! The extraction engine only sees [`BrowserSession`] and [`SessionLauncher`].
//! [`ChromiumLauncher`] drives a real Chromium over CDP; with the `mock`
//! feature, [`mock::MockSession`] provides an in-memory page for tests.

pub mod actions;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod scripts;

pub use actions::{as_height, BrowserSession, ElementHandle, Key, SessionLauncher};
pub use engine::{ChromiumLauncher, ChromiumSession};
pub use error::{BrowserError, Result};
