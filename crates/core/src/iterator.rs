//! Streaming cursor over a full-table read.
//!
//! [`AdvSuggestIterator`] wraps an already-opened row stream and decodes one
//! row per [`next`](AdvSuggestIterator::next) call into a caller-owned
//! [`Item`], so an unbounded result set never has to fit in memory.
//!
//! ```text
//! Created --next--> Iterating --+--> Exhausted
//!                               +--> Errored
//! (any state) --release--> Released
//! ```
//!
//! `next` returns `false` both at the end of the stream and on failure;
//! [`err`](AdvSuggestIterator::err) tells them apart. The stream is released
//! by [`release`](AdvSuggestIterator::release), by reaching a terminal state,
//! by the bound [`CallContext`] finishing while `next` waits, or by drop.
//!
//! A stream that holds a storage cursor should go through [`pump_rows`]
//! first: its cursor is then dropped as soon as the context finishes, even
//! when nobody calls `next` again.

use std::any::Any;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::context::CallContext;
use crate::error::AdvSuggestError;
use crate::item::{Item, StoredSuggest};

const OP_NEXT: &str = "adv_suggest_iterator.next";

/// Stream of storage rows feeding an [`AdvSuggestIterator`].
pub type RowStream<'a> = BoxStream<'a, Result<StoredSuggest, AdvSuggestError>>;

/// Drive the stream opened by `open` on a task of its own and hand its rows
/// over one at a time.
///
/// `owner` is moved into the task and lent to `open`, so the source may
/// borrow from it (a pool, a snapshot). The task drops the source, and with
/// it any storage cursor, once the source ends, once the returned stream is
/// dropped, or once `ctx` finishes. The last needs no further polling by the
/// consumer, who sees the cancellation on its next read through the
/// iterator's own context check.
///
/// Must be called within a Tokio runtime.
pub fn pump_rows<T, F>(ctx: &CallContext, owner: T, open: F) -> RowStream<'static>
where
    T: Send + Sync + 'static,
    F: for<'o> FnOnce(&'o T) -> RowStream<'o> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let ctx = ctx.clone();

    tokio::spawn(async move {
        let mut rows = open(&owner);
        let reason = loop {
            let row = tokio::select! {
                biased;
                _ = ctx.done(OP_NEXT) => break "context finished",
                _ = tx.closed() => break "cursor dropped",
                row = rows.next() => row,
            };
            let Some(row) = row else {
                break "source exhausted";
            };
            tokio::select! {
                biased;
                _ = ctx.done(OP_NEXT) => break "context finished",
                sent = tx.send(row) => {
                    if sent.is_err() {
                        break "cursor dropped";
                    }
                }
            }
        };
        drop(rows);
        tracing::trace!(reason, "Suggestion row pump stopped");
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|row| (row, rx)) }).boxed()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    Created,
    Iterating,
    Exhausted,
    Errored,
    Released,
}

pub struct AdvSuggestIterator<'a> {
    rows: Option<RowStream<'a>>,
    ctx: CallContext,
    err: Option<AdvSuggestError>,
    state: IteratorState,
}

impl<'a> AdvSuggestIterator<'a> {
    /// Bind an opened row stream to the context that governs it.
    pub fn new(rows: RowStream<'a>, ctx: CallContext) -> Self {
        Self {
            rows: Some(rows),
            ctx,
            err: None,
            state: IteratorState::Created,
        }
    }

    /// Iterator over a fixed set of rows; used by in-process backends and test doubles.
    pub fn from_rows(rows: Vec<Result<StoredSuggest, AdvSuggestError>>, ctx: CallContext) -> Self {
        Self::new(stream::iter(rows).boxed(), ctx)
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Advance one row and decode it into `dest`.
    pub async fn next(&mut self, dest: &mut Item) -> bool {
        self.next_into(dest).await
    }

    /// Advance one row and decode it into `dest`, which must be an [`Item`].
    ///
    /// Any other destination type records a permanent
    /// [`AdvSuggestError::DecodeMismatch`]; this and every later call return
    /// `false`.
    pub async fn next_into(&mut self, dest: &mut (dyn Any + Send)) -> bool {
        match self.state {
            IteratorState::Released | IteratorState::Exhausted | IteratorState::Errored => {
                return false
            }
            IteratorState::Created | IteratorState::Iterating => {}
        }

        let Some(item) = dest.downcast_mut::<Item>() else {
            self.fail(AdvSuggestError::decode(
                OP_NEXT,
                "destination is not an advsuggest Item",
            ));
            return false;
        };

        let Some(rows) = self.rows.as_mut() else {
            return false;
        };
        self.state = IteratorState::Iterating;

        let polled = match self.ctx.check(OP_NEXT) {
            Err(err) => Err(err),
            Ok(()) => tokio::select! {
                biased;
                err = self.ctx.done(OP_NEXT) => Err(err),
                row = rows.next() => Ok(row),
            },
        };

        match polled {
            Ok(Some(Ok(row))) => {
                row.decode_into(item);
                true
            }
            Ok(Some(Err(err))) | Err(err) => {
                self.fail(err);
                false
            }
            Ok(None) => {
                self.state = IteratorState::Exhausted;
                self.rows = None;
                false
            }
        }
    }

    /// The failure that stopped iteration, or `None` after natural exhaustion.
    pub fn err(&self) -> Option<&AdvSuggestError> {
        self.err.as_ref()
    }

    /// Close the underlying stream. Idempotent.
    ///
    /// The error slot is kept as it was at release time.
    pub fn release(&mut self) {
        if self.rows.take().is_some() {
            tracing::trace!(state = ?self.state, "Released suggestion cursor");
        }
        self.state = IteratorState::Released;
    }

    /// Release and hand back the outstanding error, if any.
    pub fn finish(mut self) -> Result<(), AdvSuggestError> {
        self.release();
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: AdvSuggestError) {
        tracing::debug!(error = %err, "Suggestion cursor failed");
        self.err = Some(err);
        self.state = IteratorState::Errored;
        self.rows = None;
    }
}

impl std::fmt::Debug for AdvSuggestIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvSuggestIterator")
            .field("state", &self.state)
            .field("open", &self.rows.is_some())
            .field("err", &self.err)
            .finish()
    }
}
