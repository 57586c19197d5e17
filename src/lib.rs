// Library exports for the player front-end and integration tests

pub mod api;
pub mod config;
pub mod playback;
pub mod session;
pub mod sync;

// Test support (unit tests, or integration tests via the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
