pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
