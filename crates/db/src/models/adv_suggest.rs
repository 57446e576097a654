//! Row model for the `adv_suggest` table.

use advsuggest_core::types::{DbId, Timestamp};
use advsuggest_core::StoredSuggest;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `adv_suggest` table, columns in table order.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AdvSuggestRow {
    pub id: DbId,
    pub link_url: String,
    pub title: String,
    pub queries: Vec<String>,
    pub active: bool,
    /// `NULL` until the first state change.
    pub updated_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<AdvSuggestRow> for StoredSuggest {
    fn from(row: AdvSuggestRow) -> Self {
        Self {
            id: row.id,
            link_url: row.link_url,
            title: row.title,
            queries: row.queries,
            active: row.active,
            updated_at: row.updated_at,
            created_at: row.created_at,
        }
    }
}
