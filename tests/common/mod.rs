//! Common test utilities and helpers
//!
//! - Engine and payload fixtures
//! - wiremock backend helpers

pub mod fixtures;
pub mod mock_server;

pub use fixtures::*;
pub use mock_server::*;
