//! Core types and traits for the cubby URL shortener.
//!
//! This crate provides the content-derived short key, the record types,
//! the storage capability contracts, and the error taxonomy shared by
//! every backend and by the service layer.

pub mod error;
pub mod key;
pub mod record;
pub mod repository;

pub use error::{Result, StoreError};
pub use key::ShortKey;
pub use record::{DeleteTask, SaveOutcome, UrlPair, UrlRecord};
pub use repository::{BatchSaver, OwnerIndex, SoftDeleter, UrlRepository};
