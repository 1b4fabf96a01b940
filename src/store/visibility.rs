//! Commit-graph visibility CTEs (spec §4.D).
//!
//! Computes, for a `(repository_id, commit)` pair, the set of dump ids
//! visible via a bounded bidirectional walk of the commit DAG, with
//! per-indexer root-overlap deduplication. Implemented as a single
//! recursive CTE sent to Postgres in one round trip, per the Design Note
//! in spec.md §9 ("Commit walk as CTE vs. in-process").
//!
//! `commit` is a reserved word in SQL, so every reference to the column
//! is quoted.

/// Default commits visited before the walk is truncated (spec §6
/// "Environment"), absent an override in [`crate::config::ResolverConfig`].
pub const MAX_TRAVERSAL_LIMIT: i64 = 100;

/// Shared CTE body: bounds the recursive lineage to `max_traversal_limit`
/// rows (approximating depth by row number), joins against completed
/// dumps, and computes `visible_ids` by removing dumps shadowed by a
/// smaller-`n` dump from the same indexer with an overlapping root.
///
/// `max_traversal_limit` is spliced directly into the query text rather
/// than bound as a parameter — it comes from trusted server config, never
/// from request input, and `LIMIT` doesn't accept a bind parameter in
/// every query shape this is embedded into.
fn visible_ids_cte(max_traversal_limit: i64) -> String {
    format!(
        r#"limited_lineage AS (
            SELECT a.*, row_number() OVER () AS n FROM lineage a LIMIT {max_traversal_limit}
        ),
        lineage_with_dumps AS (
            SELECT a.*, d.root, d.indexer, d.id AS dump_id FROM limited_lineage a
            JOIN lsif_dumps d ON d.repository_id = a.repository_id AND d."commit" = a."commit"
        ),
        visible_ids AS (
            SELECT DISTINCT t1.dump_id AS id FROM lineage_with_dumps t1 WHERE NOT EXISTS (
                SELECT 1 FROM lineage_with_dumps t2
                WHERE t2.n < t1.n AND t1.indexer = t2.indexer AND (
                    t2.root LIKE (t1.root || '%') OR
                    t1.root LIKE (t2.root || '%')
                )
            )
        )"#
    )
}

/// Builds a query against the bidirectional lineage CTE. Bind parameters
/// `$1 = repository_id`, `$2 = commit`, followed by whatever the caller's
/// `tail` references starting at `$3`.
///
/// The bidirectional walk seeds the recursion with the origin commit in
/// both the ancestor ("A") and descendant ("D") direction, then at each
/// step takes one ancestor hop and one descendant hop before the next
/// recursive pass — so traversal budget is spent evenly in both
/// directions as the commits are discovered.
pub fn bidirectional_lineage_query(tail: &str, max_traversal_limit: i64) -> String {
    format!(
        r#"WITH RECURSIVE lineage("commit", parent_commit, repository_id, direction) AS (
            SELECT l.* FROM (
                SELECT c."commit", c.parent_commit, c.repository_id, 'A' AS direction
                FROM lsif_commits c WHERE c.repository_id = $1 AND c."commit" = $2
                UNION
                SELECT c."commit", c.parent_commit, c.repository_id, 'D' AS direction
                FROM lsif_commits c WHERE c.repository_id = $1 AND c."commit" = $2
            ) l

            UNION

            SELECT * FROM (
                WITH l_inner AS (SELECT * FROM lineage)
                SELECT c."commit", c.parent_commit, c.repository_id, 'A' AS direction
                FROM l_inner l JOIN lsif_commits c
                  ON l.direction = 'A' AND c.repository_id = l.repository_id AND c."commit" = l.parent_commit
                UNION
                SELECT c."commit", c.parent_commit, c.repository_id, 'D' AS direction
                FROM l_inner l JOIN lsif_commits c
                  ON l.direction = 'D' AND c.repository_id = l.repository_id AND c.parent_commit = l."commit"
            ) subquery
        ),
        {cte},
        {tail}"#,
        cte = visible_ids_cte(max_traversal_limit),
    )
}

/// Builds a query against the ancestor-only lineage CTE. Not used by the
/// query core (spec.md §9 notes this variant belongs to the out-of-scope
/// tip-visibility recomputation job); kept so `lsif_commits` schema
/// decisions stay consistent with both walk shapes, and so a future
/// tip-maintenance job has a matching building block.
#[allow(dead_code)]
pub fn ancestor_lineage_query(tail: &str, max_traversal_limit: i64) -> String {
    format!(
        r#"WITH RECURSIVE lineage("commit", parent_commit, repository_id) AS (
            SELECT c."commit", c.parent_commit, c.repository_id
            FROM lsif_commits c WHERE c.repository_id = $1 AND c."commit" = $2
            UNION
            SELECT c."commit", c.parent_commit, c.repository_id
            FROM lineage a JOIN lsif_commits c
              ON a.repository_id = c.repository_id AND a.parent_commit = c."commit"
        ),
        {cte},
        {tail}"#,
        cte = visible_ids_cte(max_traversal_limit),
    )
}
