//! Shared utilities: phone canonicalization and time helpers.

pub mod phone;
pub mod time;

pub use {phone::canonical_phone, time::now_epoch};
