//! HTTP handlers
//!
//! Each handler validates its input, runs one ledger call and wraps the
//! result in an `ApiResponse`.

pub mod account;
pub mod entry;
pub mod health;
pub mod transfer;

// Globs so the `__path_*` types generated by `#[utoipa::path]` come along
pub use account::*;
pub use entry::*;
pub use health::*;
pub use transfer::*;
