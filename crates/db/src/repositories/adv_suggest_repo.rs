//! Repository for the `adv_suggest` table.
//!
//! Implements [`AdvSuggestRepository`] over a shared [`DbPool`]: id lookups
//! of active rows, a streamed full scan, bulk insert with optional
//! clean-replace, and the active/updated_at toggle.

use std::pin::Pin;

use advsuggest_core::types::{self, DbId};
use advsuggest_core::{
    pump_rows, AdvSuggestError, AdvSuggestIterator, AdvSuggestRepository, CallContext, Item,
    RowStream, StoredSuggest,
};
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::{Postgres, QueryBuilder};

use crate::error::classify;
use crate::models::adv_suggest::AdvSuggestRow;
use crate::DbPool;

/// Column list for `adv_suggest` queries, in table order.
const COLUMNS: &str = "id, link_url, title, queries, active, updated_at, created_at";

/// Full-table scan feeding the streaming iterator.
const LIST_QUERY: &str =
    "SELECT id, link_url, title, queries, active, updated_at, created_at FROM adv_suggest";

/// Rows per INSERT statement; keeps bind parameters well under PostgreSQL's 65535 cap.
pub const INSERT_BATCH_SIZE: usize = 1000;

const OP_BY_IDS: &str = "get_adv_suggest_by_ids";
const OP_LIST: &str = "get_list_adv_suggest";
const OP_ADD: &str = "add";
const OP_CHANGE_STATE: &str = "change_state_adv_suggest_by_id";

/// PostgreSQL-backed suggestion repository.
/// Open the full-table scan on `pool`.
fn scan_all(pool: &DbPool) -> RowStream<'_> {
    sqlx::query_as::<_, AdvSuggestRow>(LIST_QUERY)
        .fetch(pool)
        .map(|row| row.map(StoredSuggest::from).map_err(|e| classify(OP_LIST, e)))
        .boxed()
}

#[derive(Debug, Clone)]
pub struct AdvSuggestRepo {
    pool: DbPool,
}

impl AdvSuggestRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Delete every row. Returns the number of rows removed.
    async fn delete_all(&self) -> Result<u64, AdvSuggestError> {
        let result = sqlx::query("DELETE FROM adv_suggest")
            .execute(&self.pool)
            .await
            .map_err(|e| classify(OP_ADD, e))?;
        Ok(result.rows_affected())
    }

    /// Insert `items` in batches inside one transaction.
    ///
    /// A zero `id` takes the column default; a zero `created_at` takes
    /// `NOW()`; a zero `updated_at` is stored as `NULL`. When explicit ids
    /// were written the id sequence is moved past the largest id.
    async fn insert_all(&self, items: &[Item]) -> Result<Vec<DbId>, AdvSuggestError> {
        let mut tx = self.pool.begin().await.map_err(|e| classify(OP_ADD, e))?;
        let mut ids = Vec::with_capacity(items.len());

        for batch in items.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO adv_suggest \
                    (id, link_url, title, queries, active, updated_at, created_at) ",
            );
            builder.push_values(batch, |mut row, item| {
                if item.is_persisted() {
                    row.push_bind(item.id);
                } else {
                    row.push("DEFAULT");
                }
                row.push_bind(&item.link_url)
                    .push_bind(&item.title)
                    .push_bind(&item.queries)
                    .push_bind(item.active)
                    .push_bind(types::to_nullable(item.updated_at));
                if item.created_at == types::zero_timestamp() {
                    row.push("NOW()");
                } else {
                    row.push_bind(item.created_at);
                }
            });
            builder.push(" RETURNING id");

            let inserted: Vec<DbId> = builder
                .build_query_scalar()
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| classify(OP_ADD, e))?;
            ids.extend(inserted);
        }

        if items.iter().any(Item::is_persisted) {
            sqlx::query(
                "SELECT setval(pg_get_serial_sequence('adv_suggest', 'id'), \
                    (SELECT MAX(id) FROM adv_suggest))",
            )
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(OP_ADD, e))?;
        }

        tx.commit().await.map_err(|e| classify(OP_ADD, e))?;
        Ok(ids)
    }
}

#[async_trait]
impl AdvSuggestRepository for AdvSuggestRepo {
    async fn get_adv_suggest_by_ids(
        &self,
        ctx: &CallContext,
        ids: &[DbId],
    ) -> Result<Vec<Item>, AdvSuggestError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let query = format!("SELECT {COLUMNS} FROM adv_suggest WHERE active AND id = ANY($1)");
        let rows = ctx
            .run(OP_BY_IDS, async {
                sqlx::query_as::<_, AdvSuggestRow>(&query)
                    .bind(ids)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| classify(OP_BY_IDS, e))
            })
            .await?;

        tracing::debug!(requested = ids.len(), found = rows.len(), "Looked up suggestions by id");
        Ok(rows
            .into_iter()
            .map(|row| Item::from(StoredSuggest::from(row)))
            .collect())
    }

    async fn get_list_adv_suggest<'a>(
        &'a self,
        ctx: &CallContext,
    ) -> Result<AdvSuggestIterator<'a>, AdvSuggestError> {
        // The scan runs on its own pump so its connection goes back to the
        // pool as soon as `ctx` finishes, whether or not the caller reads on.
        let mut rows = pump_rows(ctx, self.pool.clone(), scan_all).peekable();

        // Pull the first row so a failure to open the scan is reported here
        // rather than on the first `next`.
        ctx.run(OP_LIST, async {
            let open_failed = matches!(Pin::new(&mut rows).peek().await, Some(Err(_)));
            if open_failed {
                if let Some(Err(err)) = rows.next().await {
                    return Err(err);
                }
            }
            Ok(())
        })
        .await?;

        Ok(AdvSuggestIterator::new(rows.boxed(), ctx.clone()))
    }

    async fn add(
        &self,
        ctx: &CallContext,
        items: &[Item],
        clean: bool,
    ) -> Result<Vec<DbId>, AdvSuggestError> {
        if clean {
            let deleted = ctx.run(OP_ADD, self.delete_all()).await?;
            tracing::info!(deleted, "Cleared adv_suggest before replace");
        }
        if items.is_empty() {
            return Ok(vec![]);
        }

        let ids = ctx
            .run(OP_ADD, self.insert_all(items))
            .await
            .inspect_err(|e| {
                if clean {
                    tracing::warn!(error = %e, "adv_suggest cleared but insert failed; table is empty");
                }
            })?;
        tracing::debug!(inserted = ids.len(), clean, "Inserted suggestions");
        Ok(ids)
    }

    async fn change_state_adv_suggest_by_id(
        &self,
        ctx: &CallContext,
        active: bool,
        id: DbId,
    ) -> Result<(), AdvSuggestError> {
        // GREATEST ignores a NULL updated_at.
        let result = ctx
            .run(OP_CHANGE_STATE, async {
                sqlx::query(
                    "UPDATE adv_suggest \
                     SET active = $1, updated_at = GREATEST(NOW(), updated_at) \
                     WHERE id = $2",
                )
                .bind(active)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| classify(OP_CHANGE_STATE, e))
            })
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(id, active, "State change matched no suggestion");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sqlx::postgres::PgPoolOptions;

    /// A pool that never connects until first use.
    fn lazy_repo() -> AdvSuggestRepo {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://advsuggest@127.0.0.1:1/unused")
            .unwrap();
        AdvSuggestRepo::new(pool)
    }

    #[test]
    fn list_query_selects_columns_in_table_order() {
        assert!(LIST_QUERY.contains(COLUMNS));
    }

    #[tokio::test]
    async fn empty_inputs_skip_storage() {
        let repo = lazy_repo();
        let ctx = CallContext::background();

        assert!(repo.get_adv_suggest_by_ids(&ctx, &[]).await.unwrap().is_empty());
        assert!(repo.add(&ctx, &[], false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_context_fails_before_storage() {
        let repo = lazy_repo();
        let ctx = CallContext::background();
        ctx.cancel();

        assert_matches!(
            repo.get_list_adv_suggest(&ctx).await,
            Err(AdvSuggestError::Canceled { operation: "get_list_adv_suggest" })
        );
        assert_matches!(
            repo.change_state_adv_suggest_by_id(&ctx, true, 1).await,
            Err(AdvSuggestError::Canceled { operation: "change_state_adv_suggest_by_id" })
        );
        assert_matches!(
            repo.add(&ctx, &[Item::new("a", "A", vec![])], true).await,
            Err(AdvSuggestError::Canceled { operation: "add" })
        );
    }
}
