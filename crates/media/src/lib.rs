//! Attachment store: validate, persist under per-category directories,
//! compensate on downstream failure.

pub mod category;
pub mod error;
pub mod store;

pub use {
    category::MediaCategory,
    error::{Error, Result},
    store::MediaStore,
};

/// Shared per-attachment size bound: 16 MiB.
pub const DEFAULT_MAX_BYTES: usize = 16 * 1024 * 1024;
