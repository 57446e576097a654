//! Repository layer.
//!
//! Each repository owns a clone of the pool and implements the matching
//! storage-agnostic trait from `advsuggest-core`.

pub mod adv_suggest_repo;

pub use adv_suggest_repo::AdvSuggestRepo;
