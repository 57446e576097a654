//! Scriptable repository double for exercising caller code.
//!
//! Tests register the calls they expect together with canned results. Each
//! incoming call consumes the first registered expectation whose operation
//! and argument matchers fit; a call with no fitting expectation panics, and
//! so does [`verify`](MockAdvSuggestRepository::verify) (or dropping the mock)
//! while expectations remain.
//!
//! ```ignore
//! let repo = MockAdvSuggestRepository::new();
//! repo.expect_add(Arg::Any, true, Ok(vec![1, 2]));
//! repo.expect_change_state_adv_suggest_by_id(false, 7, Err(AdvSuggestError::canceled("x")));
//! service_under_test(&repo).await;
//! repo.verify();
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::AdvSuggestError;
use crate::item::{Item, StoredSuggest};
use crate::iterator::AdvSuggestIterator;
use crate::repository::AdvSuggestRepository;
use crate::types::DbId;

/// Argument matcher for an expectation.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<T> {
    Any,
    Eq(T),
}

impl<T: PartialEq> Arg<T> {
    fn matches(&self, actual: &T) -> bool {
        match self {
            Arg::Any => true,
            Arg::Eq(expected) => expected == actual,
        }
    }
}

impl<T> From<T> for Arg<T> {
    fn from(value: T) -> Self {
        Arg::Eq(value)
    }
}

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetAdvSuggestByIds { ids: Vec<DbId> },
    GetListAdvSuggest,
    Add { items: Vec<Item>, clean: bool },
    ChangeStateAdvSuggestById { active: bool, id: DbId },
}

/// Canned rows for an expected `get_list_adv_suggest`; an `Err` row is
/// delivered mid-stream.
pub type CannedRows = Vec<Result<StoredSuggest, AdvSuggestError>>;

#[derive(Debug)]
enum Expectation {
    GetAdvSuggestByIds {
        ids: Arg<Vec<DbId>>,
        result: Result<Vec<Item>, AdvSuggestError>,
    },
    GetListAdvSuggest {
        result: Result<CannedRows, AdvSuggestError>,
    },
    Add {
        items: Arg<Vec<Item>>,
        clean: Arg<bool>,
        result: Result<Vec<DbId>, AdvSuggestError>,
    },
    ChangeStateAdvSuggestById {
        active: Arg<bool>,
        id: Arg<DbId>,
        result: Result<(), AdvSuggestError>,
    },
}

impl Expectation {
    fn matches(&self, call: &Call) -> bool {
        match (self, call) {
            (Self::GetAdvSuggestByIds { ids, .. }, Call::GetAdvSuggestByIds { ids: actual }) => {
                ids.matches(actual)
            }
            (Self::GetListAdvSuggest { .. }, Call::GetListAdvSuggest) => true,
            (
                Self::Add { items, clean, .. },
                Call::Add {
                    items: actual_items,
                    clean: actual_clean,
                },
            ) => items.matches(actual_items) && clean.matches(actual_clean),
            (
                Self::ChangeStateAdvSuggestById { active, id, .. },
                Call::ChangeStateAdvSuggestById {
                    active: actual_active,
                    id: actual_id,
                },
            ) => active.matches(actual_active) && id.matches(actual_id),
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    expectations: VecDeque<Expectation>,
    calls: Vec<Call>,
}

#[derive(Debug, Default)]
pub struct MockAdvSuggestRepository {
    state: Mutex<State>,
}

impl MockAdvSuggestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_get_adv_suggest_by_ids(
        &self,
        ids: impl Into<Arg<Vec<DbId>>>,
        result: Result<Vec<Item>, AdvSuggestError>,
    ) {
        self.push(Expectation::GetAdvSuggestByIds {
            ids: ids.into(),
            result,
        });
    }

    pub fn expect_get_list_adv_suggest(&self, result: Result<CannedRows, AdvSuggestError>) {
        self.push(Expectation::GetListAdvSuggest { result });
    }

    pub fn expect_add(
        &self,
        items: impl Into<Arg<Vec<Item>>>,
        clean: impl Into<Arg<bool>>,
        result: Result<Vec<DbId>, AdvSuggestError>,
    ) {
        self.push(Expectation::Add {
            items: items.into(),
            clean: clean.into(),
            result,
        });
    }

    pub fn expect_change_state_adv_suggest_by_id(
        &self,
        active: impl Into<Arg<bool>>,
        id: impl Into<Arg<DbId>>,
        result: Result<(), AdvSuggestError>,
    ) {
        self.push(Expectation::ChangeStateAdvSuggestById {
            active: active.into(),
            id: id.into(),
            result,
        });
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Panic if any registered expectation was not consumed.
    pub fn verify(&self) {
        let state = self.state();
        if !state.expectations.is_empty() {
            panic!(
                "MockAdvSuggestRepository: {} expected call(s) not made: {:?}",
                state.expectations.len(),
                state.expectations
            );
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, expectation: Expectation) {
        self.state().expectations.push_back(expectation);
    }

    /// Record `call` and consume the first expectation that fits it.
    fn take(&self, call: Call) -> Expectation {
        let mut state = self.state();
        state.calls.push(call.clone());
        let position = state.expectations.iter().position(|e| e.matches(&call));
        match position.and_then(|i| state.expectations.remove(i)) {
            Some(expectation) => expectation,
            None => {
                let pending = state.expectations.len();
                drop(state);
                panic!("MockAdvSuggestRepository: unexpected call {call:?} ({pending} expectation(s) pending)")
            }
        }
    }
}

impl Drop for MockAdvSuggestRepository {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.verify();
        }
    }
}

#[async_trait]
impl AdvSuggestRepository for MockAdvSuggestRepository {
    async fn get_adv_suggest_by_ids(
        &self,
        _ctx: &CallContext,
        ids: &[DbId],
    ) -> Result<Vec<Item>, AdvSuggestError> {
        match self.take(Call::GetAdvSuggestByIds { ids: ids.to_vec() }) {
            Expectation::GetAdvSuggestByIds { result, .. } => result,
            other => unreachable!("matcher returned {other:?}"),
        }
    }

    async fn get_list_adv_suggest<'a>(
        &'a self,
        ctx: &CallContext,
    ) -> Result<AdvSuggestIterator<'a>, AdvSuggestError> {
        match self.take(Call::GetListAdvSuggest) {
            Expectation::GetListAdvSuggest { result } => {
                result.map(|rows| AdvSuggestIterator::from_rows(rows, ctx.clone()))
            }
            other => unreachable!("matcher returned {other:?}"),
        }
    }

    async fn add(
        &self,
        _ctx: &CallContext,
        items: &[Item],
        clean: bool,
    ) -> Result<Vec<DbId>, AdvSuggestError> {
        let call = Call::Add {
            items: items.to_vec(),
            clean,
        };
        match self.take(call) {
            Expectation::Add { result, .. } => result,
            other => unreachable!("matcher returned {other:?}"),
        }
    }

    async fn change_state_adv_suggest_by_id(
        &self,
        _ctx: &CallContext,
        active: bool,
        id: DbId,
    ) -> Result<(), AdvSuggestError> {
        match self.take(Call::ChangeStateAdvSuggestById { active, id }) {
            Expectation::ChangeStateAdvSuggestById { result, .. } => result,
            other => unreachable!("matcher returned {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn item(id: DbId) -> Item {
        Item {
            id,
            ..Item::new(format!("link{id}"), format!("title{id}"), vec!["q1".into()])
        }
    }

    fn stored(id: DbId) -> StoredSuggest {
        StoredSuggest::from(item(id))
    }

    /// Caller code written only against the trait.
    async fn activate_all(repo: &dyn AdvSuggestRepository, ids: &[DbId]) -> Result<usize, AdvSuggestError> {
        let ctx = CallContext::background();
        let found = repo.get_adv_suggest_by_ids(&ctx, ids).await?;
        for item in &found {
            repo.change_state_adv_suggest_by_id(&ctx, true, item.id).await?;
        }
        Ok(found.len())
    }

    #[tokio::test]
    async fn canned_results_drive_caller_code() {
        let repo = MockAdvSuggestRepository::new();
        repo.expect_get_adv_suggest_by_ids(vec![1, 2], Ok(vec![item(1), item(2)]));
        repo.expect_change_state_adv_suggest_by_id(true, Arg::Any, Ok(()));
        repo.expect_change_state_adv_suggest_by_id(true, 2, Ok(()));

        assert_eq!(activate_all(&repo, &[1, 2]).await.unwrap(), 2);
        assert_eq!(
            repo.calls().last(),
            Some(&Call::ChangeStateAdvSuggestById { active: true, id: 2 })
        );
        repo.verify();
    }

    #[tokio::test]
    async fn injected_failure_is_returned() {
        let repo = MockAdvSuggestRepository::new();
        repo.expect_get_adv_suggest_by_ids(
            Arg::Any,
            Err(AdvSuggestError::connection(
                "get_adv_suggest_by_ids",
                std::io::Error::other("connection reset"),
            )),
        );

        let err = activate_all(&repo, &[3]).await.unwrap_err();
        assert_matches!(err, AdvSuggestError::Connection { .. });
    }

    #[tokio::test]
    async fn same_operation_can_succeed_then_fail() {
        let repo = MockAdvSuggestRepository::new();
        let ctx = CallContext::background();
        repo.expect_add(Arg::Any, false, Ok(vec![1]));
        repo.expect_add(
            Arg::Any,
            true,
            Err(AdvSuggestError::constraint("add", std::io::Error::other("dup"))),
        );

        assert_eq!(repo.add(&ctx, &[item(1)], false).await.unwrap(), vec![1]);
        assert!(repo.add(&ctx, &[item(1)], true).await.is_err());
    }

    #[tokio::test]
    async fn canned_iterator_can_fail_mid_stream() {
        let repo = MockAdvSuggestRepository::new();
        repo.expect_get_list_adv_suggest(Ok(vec![
            Ok(stored(1)),
            Err(AdvSuggestError::decode("get_list_adv_suggest", "bad row")),
        ]));

        let ctx = CallContext::background();
        let mut iter = repo.get_list_adv_suggest(&ctx).await.unwrap();
        let mut dest = Item::default();
        assert!(iter.next(&mut dest).await);
        assert_eq!(dest.id, 1);
        assert!(!iter.next(&mut dest).await);
        assert_matches!(iter.finish(), Err(AdvSuggestError::DecodeMismatch { .. }));
    }

    #[tokio::test]
    #[should_panic(expected = "unexpected call")]
    async fn unexpected_call_fails_the_test() {
        let repo = MockAdvSuggestRepository::new();
        let _ = repo
            .change_state_adv_suggest_by_id(&CallContext::background(), true, 1)
            .await;
    }

    #[tokio::test]
    #[should_panic(expected = "unexpected call")]
    async fn argument_mismatch_is_unexpected() {
        let repo = MockAdvSuggestRepository::new();
        repo.expect_add(Arg::Any, true, Ok(vec![]));
        let _ = repo.add(&CallContext::background(), &[], false).await;
    }

    #[test]
    #[should_panic(expected = "not made")]
    fn unmet_expectation_fails_on_drop() {
        let repo = MockAdvSuggestRepository::new();
        repo.expect_get_list_adv_suggest(Ok(vec![]));
    }
}
