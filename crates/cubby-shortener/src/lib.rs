//! Facade and background plumbing for the cubby persistence core.
//!
//! [`UrlStore`] wraps any [`UrlRepository`](cubby_core::UrlRepository),
//! exploits optional backend capabilities when they are present, and
//! degrades to a portable fallback when they are not. Soft deletes ride
//! a background [`DeletePipeline`](delete::DeletePipeline) that batches
//! tasks before they hit the backend.

pub mod config;
pub mod delete;
pub mod service;

pub use config::StorageSettings;
pub use delete::{DeletePipeline, DeleteQueueSettings};
pub use service::UrlStore;
