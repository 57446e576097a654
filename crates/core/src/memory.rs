//! Process-local backend.
//!
//! Keeps rows in a `BTreeMap` behind a mutex and follows the same rules as
//! the PostgreSQL backend: storage-assigned ids, active-only id lookups,
//! delete-then-insert for `clean`, `updated_at` that never moves backwards,
//! and the 255-character limit on each query string.
//!
//! Ids come from a sequence modelled on `BIGSERIAL`. A default id is taken
//! from the sequence without looking at the table, so it can collide with an
//! explicit id in the same call (a constraint violation, as in PostgreSQL).
//! Writing explicit ids moves the sequence to one past the largest stored id.
//! An exhausted sequence is a constraint violation rather than a wrap.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::context::CallContext;
use crate::error::AdvSuggestError;
use crate::item::{Item, StoredSuggest};
use crate::iterator::AdvSuggestIterator;
use crate::repository::AdvSuggestRepository;
use crate::types::{self, DbId};

/// Longest query string the `queries` column accepts.
pub const MAX_QUERY_LEN: usize = 255;

#[derive(Debug)]
struct Table {
    rows: BTreeMap<DbId, StoredSuggest>,
    /// `None` once the sequence has handed out `i64::MAX`.
    next_id: Option<DbId>,
}

#[derive(Debug)]
pub struct InMemoryAdvSuggestRepository {
    table: Mutex<Table>,
}

impl Default for InMemoryAdvSuggestRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAdvSuggestRepository {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                rows: BTreeMap::new(),
                next_id: Some(1),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.table().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&self) -> usize {
        let mut table = self.table();
        let deleted = table.rows.len();
        table.rows.clear();
        deleted
    }

    /// Stage every row first so a rejected batch leaves the table untouched.
    fn insert(&self, items: &[Item]) -> Result<Vec<DbId>, AdvSuggestError> {
        const OP: &str = "add";

        let mut table = self.table();
        let mut next_id = table.next_id;
        let mut staged = Vec::with_capacity(items.len());
        let mut batch_ids = HashSet::with_capacity(items.len());

        for item in items {
            if let Some(query) = item.queries.iter().find(|q| q.chars().count() > MAX_QUERY_LEN) {
                return Err(AdvSuggestError::constraint(
                    OP,
                    format!("query exceeds {MAX_QUERY_LEN} characters: {query:.32}…"),
                ));
            }

            let id = if item.is_persisted() {
                item.id
            } else {
                let id = next_id.ok_or_else(|| {
                    AdvSuggestError::constraint(OP, "adv_suggest id sequence reached its maximum value")
                })?;
                next_id = id.checked_add(1);
                id
            };

            if table.rows.contains_key(&id) || !batch_ids.insert(id) {
                return Err(AdvSuggestError::constraint(
                    OP,
                    format!("duplicate key value violates unique constraint: id={id}"),
                ));
            }

            let created_at = if item.created_at == types::zero_timestamp() {
                Utc::now()
            } else {
                item.created_at
            };

            staged.push(StoredSuggest {
                id,
                link_url: item.link_url.clone(),
                title: item.title.clone(),
                queries: item.queries.clone(),
                active: item.active,
                updated_at: types::to_nullable(item.updated_at),
                created_at,
            });
        }

        let ids: Vec<DbId> = staged.iter().map(|row| row.id).collect();
        table.rows.extend(staged.into_iter().map(|row| (row.id, row)));
        table.next_id = if items.iter().any(Item::is_persisted) {
            table.rows.keys().next_back().and_then(|max| max.checked_add(1))
        } else {
            next_id
        };
        Ok(ids)
    }
}

#[async_trait]
impl AdvSuggestRepository for InMemoryAdvSuggestRepository {
    async fn get_adv_suggest_by_ids(
        &self,
        ctx: &CallContext,
        ids: &[DbId],
    ) -> Result<Vec<Item>, AdvSuggestError> {
        ctx.check("get_adv_suggest_by_ids")?;
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let wanted: HashSet<DbId> = ids.iter().copied().collect();
        let table = self.table();
        Ok(table
            .rows
            .values()
            .filter(|row| row.active && wanted.contains(&row.id))
            .cloned()
            .map(Item::from)
            .collect())
    }

    async fn get_list_adv_suggest<'a>(
        &'a self,
        ctx: &CallContext,
    ) -> Result<AdvSuggestIterator<'a>, AdvSuggestError> {
        ctx.check("get_list_adv_suggest")?;
        let snapshot: Vec<_> = self.table().rows.values().cloned().map(Ok).collect();
        Ok(AdvSuggestIterator::from_rows(snapshot, ctx.clone()))
    }

    async fn add(
        &self,
        ctx: &CallContext,
        items: &[Item],
        clean: bool,
    ) -> Result<Vec<DbId>, AdvSuggestError> {
        ctx.check("add")?;

        if clean {
            let deleted = self.clear();
            tracing::info!(deleted, "Cleared in-memory suggestions before replace");
        }
        if items.is_empty() {
            return Ok(vec![]);
        }

        self.insert(items).inspect_err(|e| {
            if clean {
                tracing::warn!(error = %e, "Suggestions cleared but insert failed");
            }
        })
    }

    async fn change_state_adv_suggest_by_id(
        &self,
        ctx: &CallContext,
        active: bool,
        id: DbId,
    ) -> Result<(), AdvSuggestError> {
        ctx.check("change_state_adv_suggest_by_id")?;

        let mut table = self.table();
        match table.rows.get_mut(&id) {
            Some(row) => {
                let now = Utc::now();
                row.active = active;
                row.updated_at = Some(row.updated_at.map_or(now, |prev| prev.max(now)));
            }
            None => tracing::debug!(id, "State change matched no suggestion"),
        }
        Ok(())
    }
}
