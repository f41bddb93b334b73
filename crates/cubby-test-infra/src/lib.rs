//! Disposable infrastructure for integration tests.
//!
//! Containers started here are throwaway: each test gets its own server
//! and the container is torn down when the fixture drops.

pub mod error;
pub mod postgres;

pub use error::{Result, TestInfraError};
