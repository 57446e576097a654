//! Row structs for the `adv_suggest` table.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct matching the
//! database row, convertible into the storage-agnostic core types.

pub mod adv_suggest;
