//! Storage-agnostic core of the advertising suggestion data-access layer.
//!
//! Holds the record type, the error taxonomy, the per-call context, the
//! streaming cursor and the [`AdvSuggestRepository`] contract, plus two
//! in-process implementations of that contract: an in-memory backend and a
//! scriptable mock for caller tests. The PostgreSQL backend lives in
//! `advsuggest-db`.

pub mod context;
pub mod error;
pub mod item;
pub mod iterator;
pub mod memory;
pub mod mock;
pub mod repository;
pub mod types;

pub use context::CallContext;
pub use error::{AdvSuggestError, ErrorKind};
pub use item::{Item, StoredSuggest};
pub use iterator::{pump_rows, AdvSuggestIterator, IteratorState, RowStream};
pub use memory::InMemoryAdvSuggestRepository;
pub use mock::MockAdvSuggestRepository;
pub use repository::AdvSuggestRepository;
pub use types::{DbId, Timestamp};
