//! `Pager`: owns a read transaction for snapshot isolation across
//! successive `PageFromOffset` calls (spec §4.C, Design Note in spec.md
//! §9 "Pager lifetime").
//!
//! Unlike the original Go `ReferencePager`, which required an explicit
//! `defer closeTx` on every exit path, an un-committed `sqlx::Transaction`
//! rolls back automatically on drop — so cancellation and early returns
//! are safe even if `close` is never called. `close` remains the
//! preferred, explicit path (documented as an Open Question resolution
//! in DESIGN.md).

use anyhow::Result;
use sqlx::Postgres;
use sqlx::Transaction;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::future::Future;
use std::pin::Pin;

/// One row of `lsif_references`: the consuming bundle and its encoded
/// Bloom filter.
#[derive(Debug, Clone)]
pub struct ReferenceRow {
    pub dump_id: i64,
    pub filter: Vec<u8>,
}

impl FromRow<'_, PgRow> for ReferenceRow {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            dump_id: row.try_get("dump_id")?,
            filter: row.try_get("filter")?,
        })
    }
}

type PageFn = Box<
    dyn for<'a> FnMut(
            &'a mut Transaction<'static, Postgres>,
            i64,
            i64,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<ReferenceRow>>> + Send + 'a>>
        + Send,
>;

/// A paged read over `lsif_references`, bound to a transaction for the
/// duration of the walk.
pub struct Pager {
    tx: Option<Transaction<'static, Postgres>>,
    page_from_offset: PageFn,
}

impl Pager {
    pub(super) fn new<F>(tx: Transaction<'static, Postgres>, page_from_offset: F) -> Self
    where
        F: for<'a> FnMut(
                &'a mut Transaction<'static, Postgres>,
                i64,
                i64,
            ) -> Pin<Box<dyn Future<Output = Result<Vec<ReferenceRow>>> + Send + 'a>>
            + Send
            + 'static,
    {
        Self {
            tx: Some(tx),
            page_from_offset: Box::new(page_from_offset),
        }
    }

    pub(super) fn empty(tx: Transaction<'static, Postgres>) -> Self {
        Self::new(tx, |_tx, _offset, _limit| Box::pin(async { Ok(Vec::new()) }))
    }

    /// `PageFromOffset(offset) -> []Reference`.
    pub async fn page_from_offset(&mut self, offset: i64, limit: i64) -> Result<Vec<ReferenceRow>> {
        let tx = self
            .tx
            .as_mut()
            .expect("page_from_offset called after close");
        (self.page_from_offset)(tx, offset, limit).await
    }

    /// `Close(err)`: commits on success, rolls back on error or
    /// cancellation. Safe to skip — an un-committed transaction rolls
    /// back on drop regardless.
    pub async fn close(mut self, err: Option<&anyhow::Error>) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            if err.is_some() {
                tx.rollback().await?;
            } else {
                tx.commit().await?;
            }
        }
        Ok(())
    }
}
