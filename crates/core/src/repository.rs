//! The repository contract shared by every storage backend.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::AdvSuggestError;
use crate::item::Item;
use crate::iterator::AdvSuggestIterator;
use crate::types::DbId;

/// Persistence and query operations for advertising suggestions.
///
/// Every method honours `ctx`: once it is cancelled or past its deadline the
/// call returns a cancellation-kind error. Errors carry the failing operation
/// name; nothing is retried.
#[async_trait]
pub trait AdvSuggestRepository: Send + Sync {
    /// Every **active** item whose id is in `ids`, in storage order.
    ///
    /// An empty `ids` or no matches yields an empty vector, not an error.
    async fn get_adv_suggest_by_ids(
        &self,
        ctx: &CallContext,
        ids: &[DbId],
    ) -> Result<Vec<Item>, AdvSuggestError>;

    /// Open a streaming scan over the whole table.
    ///
    /// The returned iterator is bound to `ctx` and must be released (or
    /// dropped) on every exit path. Backends that hold a storage cursor also
    /// free it once `ctx` is cancelled or expires, even if the iterator is
    /// left idle.
    async fn get_list_adv_suggest<'a>(
        &'a self,
        ctx: &CallContext,
    ) -> Result<AdvSuggestIterator<'a>, AdvSuggestError>;

    /// Insert `items`, returning the assigned ids in input order.
    ///
    /// With `clean`, every existing row is deleted first. The delete and the
    /// insert are separate statements: if the insert fails after the delete
    /// succeeded, the table is left empty and the insert error is returned.
    /// Empty `items` without `clean` is a successful no-op.
    async fn add(
        &self,
        ctx: &CallContext,
        items: &[Item],
        clean: bool,
    ) -> Result<Vec<DbId>, AdvSuggestError>;

    /// Set `active` and refresh `updated_at` for the row with `id`.
    ///
    /// Matching no row is not reported: callers that need to know must read
    /// the row back.
    async fn change_state_adv_suggest_by_id(
        &self,
        ctx: &CallContext,
        active: bool,
        id: DbId,
    ) -> Result<(), AdvSuggestError>;
}
