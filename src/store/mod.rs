//! Snapshot-isolated metadata queries over dumps, packages, and references
//! (spec §4.C), plus the commit-graph visibility CTEs they build on
//! (spec §4.D).

mod pager;
mod visibility;

pub use pager::{Pager, ReferenceRow};

use crate::config::ResolverConfig;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// Metadata row for a completed upload (spec §3 "Dump").
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dump {
    pub id: i64,
    pub commit: String,
    pub root: String,
    pub visible_at_tip: bool,
    pub uploaded_at: DateTime<Utc>,
    pub state: String,
    pub failure_summary: Option<String>,
    pub failure_stacktrace: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tracing_context: String,
    pub repository_id: i64,
    pub indexer: String,
}

impl FromRow<'_, PgRow> for Dump {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            commit: row.try_get("commit")?,
            root: row.try_get("root")?,
            visible_at_tip: row.try_get("visible_at_tip")?,
            uploaded_at: row.try_get("uploaded_at")?,
            state: row.try_get("state")?,
            failure_summary: row.try_get("failure_summary")?,
            failure_stacktrace: row.try_get("failure_stacktrace")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            tracing_context: row.try_get("tracing_context")?,
            repository_id: row.try_get("repository_id")?,
            indexer: row.try_get("indexer")?,
        })
    }
}

const DUMP_COLUMNS: &str = r#"
    id, "commit", root, visible_at_tip, uploaded_at, state,
    failure_summary, failure_stacktrace, started_at, finished_at,
    tracing_context, repository_id, indexer
"#;

/// Read-only access to dump/package/reference metadata, backed by a shared
/// Postgres pool.
#[derive(Clone)]
pub struct MetadataStore {
    pool: PgPool,
    config: ResolverConfig,
}

impl MetadataStore {
    pub fn new(pool: PgPool, config: ResolverConfig) -> Self {
        Self { pool, config }
    }

    /// `GetDumpByID(id) -> (Dump, found)`.
    pub async fn get_dump_by_id(&self, id: i64) -> Result<Option<Dump>> {
        let query = format!("SELECT {DUMP_COLUMNS} FROM lsif_dumps WHERE id = $1");
        let dump = sqlx::query_as::<_, Dump>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dump)
    }

    /// `GetPackage(scheme, name, version) -> (Dump, found)`: the dump
    /// defining the package.
    pub async fn get_package(&self, scheme: &str, name: &str, version: &str) -> Result<Option<Dump>> {
        let query = r#"SELECT u.id, u."commit", u.root, u.visible_at_tip, u.uploaded_at, u.state,
                    u.failure_summary, u.failure_stacktrace, u.started_at, u.finished_at,
                    u.tracing_context, u.repository_id, u.indexer
             FROM lsif_packages p
             JOIN lsif_uploads u ON p.dump_id = u.id
             WHERE p.scheme = $1 AND p.name = $2 AND p.version = $3
             LIMIT 1"#;
        let dump = sqlx::query_as::<_, Dump>(query)
            .bind(scheme)
            .bind(name)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dump)
    }

    /// `FindClosestDumps(repositoryID, commit, file) -> []Dump` (spec §4.D).
    ///
    /// Computes the bidirectional visible set, restricts to dumps whose
    /// root prefixes `file`, orders by discovery depth `n`, and
    /// deduplicates by `dump_id` (a dump's commit may appear on more than
    /// one lineage path).
    pub async fn find_closest_dumps(
        &self,
        repository_id: i64,
        commit: &str,
        file: &str,
    ) -> Result<Vec<Dump>> {
        let mut tx = self.pool.begin().await?;

        let query = visibility::bidirectional_lineage_query(
            "SELECT d.dump_id FROM lineage_with_dumps d
             WHERE $3 LIKE (d.root || '%') AND d.dump_id IN (SELECT id FROM visible_ids)
             ORDER BY d.n",
            self.config.max_traversal_limit,
        );
        let ids: Vec<i64> = sqlx::query_scalar(&query)
            .bind(repository_id)
            .bind(commit)
            .bind(file)
            .fetch_all(&mut *tx)
            .await?;

        if ids.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let query = format!("SELECT {DUMP_COLUMNS} FROM lsif_dumps d WHERE id = ANY($1)");
        let mut dumps_by_id = sqlx::query_as::<_, Dump>(&query)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        // Reorder to match `ids` (the `n`-ordered discovery sequence) and
        // dedup by id, keeping the first (smallest-n) occurrence.
        dumps_by_id.sort_by_key(|d| ids.iter().position(|id| *id == d.id).unwrap_or(usize::MAX));

        let mut seen = std::collections::HashSet::new();
        let mut dumps = Vec::new();
        for id in &ids {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(dump) = dumps_by_id.iter().find(|d| d.id == *id) {
                dumps.push(dump.clone());
            }
        }
        Ok(dumps)
    }

    /// `SameRepoPager(repositoryID, commit, scheme, name, version, limit)
    /// -> (total, Pager)` restricted to the visible set for
    /// `(repositoryID, commit)`, ordered by `dump.root`.
    pub async fn same_repo_pager(
        &self,
        repository_id: i64,
        commit: &str,
        scheme: &str,
        name: &str,
        version: &str,
    ) -> Result<(i64, Pager)> {
        let mut tx = self.pool.begin().await?;

        let query = visibility::bidirectional_lineage_query(
            "SELECT id FROM visible_ids",
            self.config.max_traversal_limit,
        );
        let visible_ids: Vec<i64> = sqlx::query_scalar(&query)
            .bind(repository_id)
            .bind(commit)
            .fetch_all(&mut *tx)
            .await?;

        if visible_ids.is_empty() {
            return Ok((0, Pager::empty(tx)));
        }

        let count_query = "SELECT COUNT(1) FROM lsif_references r
             WHERE r.scheme = $1 AND r.name = $2 AND r.version = $3 AND r.dump_id = ANY($4)";
        let total: i64 = sqlx::query_scalar(count_query)
            .bind(scheme)
            .bind(name)
            .bind(version)
            .bind(&visible_ids)
            .fetch_one(&mut *tx)
            .await?;

        let scheme = scheme.to_string();
        let name = name.to_string();
        let version = version.to_string();

        let pager = Pager::new(tx, move |tx, offset, limit| {
            let scheme = scheme.clone();
            let name = name.clone();
            let version = version.clone();
            let visible_ids = visible_ids.clone();
            Box::pin(async move {
                let query = "SELECT r.dump_id, r.filter FROM lsif_references r
                     LEFT JOIN lsif_dumps d ON r.dump_id = d.id
                     WHERE r.scheme = $1 AND r.name = $2 AND r.version = $3 AND r.dump_id = ANY($4)
                     ORDER BY d.root OFFSET $5 LIMIT $6";
                let rows: Vec<ReferenceRow> = sqlx::query_as(query)
                    .bind(&scheme)
                    .bind(&name)
                    .bind(&version)
                    .bind(&visible_ids)
                    .bind(offset)
                    .bind(limit)
                    .fetch_all(&mut **tx)
                    .await?;
                Ok(rows)
            })
        });

        Ok((total, pager))
    }

    /// `PackageReferencePager(scheme, name, version, excludeRepositoryID,
    /// limit) -> (total, Pager)` restricted to `visibleAtTip=true` bundles
    /// outside `excludeRepositoryID`, ordered by `(repositoryID, root)`.
    pub async fn package_reference_pager(
        &self,
        scheme: &str,
        name: &str,
        version: &str,
        exclude_repository_id: i64,
    ) -> Result<(i64, Pager)> {
        let mut tx = self.pool.begin().await?;

        let count_query = "SELECT COUNT(1) FROM lsif_references r
             LEFT JOIN lsif_dumps d ON r.dump_id = d.id
             WHERE r.scheme = $1 AND r.name = $2 AND r.version = $3
               AND d.repository_id != $4 AND d.visible_at_tip = true";
        let total: i64 = sqlx::query_scalar(count_query)
            .bind(scheme)
            .bind(name)
            .bind(version)
            .bind(exclude_repository_id)
            .fetch_one(&mut *tx)
            .await?;

        let scheme = scheme.to_string();
        let name = name.to_string();
        let version = version.to_string();

        let pager = Pager::new(tx, move |tx, offset, limit| {
            let scheme = scheme.clone();
            let name = name.clone();
            let version = version.clone();
            Box::pin(async move {
                let query = "SELECT r.dump_id, r.filter FROM lsif_references r
                     LEFT JOIN lsif_dumps d ON r.dump_id = d.id
                     WHERE r.scheme = $1 AND r.name = $2 AND r.version = $3
                       AND d.repository_id != $4 AND d.visible_at_tip = true
                     ORDER BY d.repository_id, d.root LIMIT $5 OFFSET $6";
                let rows: Vec<ReferenceRow> = sqlx::query_as(query)
                    .bind(&scheme)
                    .bind(&name)
                    .bind(&version)
                    .bind(exclude_repository_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&mut **tx)
                    .await?;
                Ok(rows)
            })
        });

        Ok((total, pager))
    }

    pub fn remote_dump_limit(&self) -> i64 {
        self.config.remote_dump_limit
    }

    /// A store whose pool never actually connects (`sqlx`'s lazy-pool
    /// support), for resolver unit tests whose code path never touches
    /// metadata — e.g. an all-local same-bundle definition lookup. Any
    /// attempt to run a query against it fails; tests that need real
    /// dump/package rows should use [`crate::test_helpers::test_pool`]
    /// instead.
    #[cfg(any(test, feature = "test-support"))]
    pub fn unconnected() -> Self {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unconnected/unconnected")
            .expect("lazy pool construction does not touch the network");
        Self::new(pool, ResolverConfig::default())
    }
}
