//! Four-phase cross-repository reference pagination (spec §4.H):
//! same-dump → definition-monikers → same-repo → remote-repo, resumed
//! across HTTP round trips via an opaque [`Cursor`].

use super::{BundleManager, Resolvers, path_in_bundle};
use crate::bloom;
use crate::bundles::{BundleClient, MonikerModel, Paging, Position};
use crate::cursor::{Cursor, Phase};
use crate::errors::{ApiError, ApiResult};
use crate::locations::{ResolvedLocation, resolve_with_dump, slice_locations};
use crate::store::{Dump, Pager, ReferenceRow};
use tokio_util::sync::CancellationToken;

impl<M: BundleManager> Resolvers<M> {
    /// Builds the initial same-dump cursor for a fresh `/references` request
    /// (spec §4.H "start").
    #[tracing::instrument(skip(self, cancel))]
    pub async fn start_reference_cursor(
        &self,
        file: &str,
        position: Position,
        upload_id: i64,
        cancel: &CancellationToken,
    ) -> ApiResult<Cursor> {
        let dump = self.require_dump(upload_id).await?;
        let path = path_in_bundle(file, &dump.root);
        let bundle = self.bundles.bundle_client(dump.id);

        let monikers = bundle
            .monikers_by_position(&path, position, cancel)
            .await?
            .into_iter()
            .flatten()
            .collect();

        Ok(Cursor {
            phase: Some(Phase::SameDump),
            dump_id: dump.id,
            path,
            line: position.line,
            character: position.character,
            monikers,
            ..Default::default()
        })
    }

    /// `ReferencePage(repositoryID, commit, limit, cursor) ->
    /// ([]ResolvedLocation, *Cursor)` (spec §4.H). Dispatches on
    /// `cursor.phase` in a loop, decrementing the remaining limit by each
    /// batch's size, until either the limit is exhausted or a phase
    /// handler reports there is nothing left to page.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn reference_page(
        &self,
        repository_id: i64,
        commit: &str,
        limit: i64,
        mut cursor: Cursor,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let mut locations = Vec::new();
        let mut remaining = limit;

        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let Some(phase) = cursor.phase else {
                break;
            };

            let (batch, next) = match phase {
                Phase::SameDump => self.handle_same_dump(remaining, cursor.clone(), cancel).await?,
                Phase::DefinitionMonikers => {
                    self.handle_definition_monikers(remaining, cursor.clone(), cancel).await?
                }
                Phase::SameRepo => {
                    self.handle_same_repo(repository_id, commit, remaining, cursor.clone(), cancel)
                        .await?
                }
                Phase::RemoteRepo => {
                    self.handle_remote_repo(repository_id, remaining, cursor.clone(), cancel).await?
                }
            };

            remaining -= batch.len() as i64;
            locations.extend(batch);

            match next {
                Some(next_cursor) => cursor = next_cursor,
                None => return Ok((locations, None)),
            }
        }

        Ok((locations, Some(cursor)))
    }

    async fn handle_same_dump(
        &self,
        limit: i64,
        cursor: Cursor,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let dump = self.require_dump(cursor.dump_id).await?;
        self.same_dump_reference_page(&dump, limit, cursor, cancel).await
    }

    /// Shared core of the same-dump phase, taking an already-loaded `dump`
    /// so it can be exercised in tests without a live store.
    async fn same_dump_reference_page(
        &self,
        dump: &Dump,
        limit: i64,
        cursor: Cursor,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let bundle = self.bundles.bundle_client(dump.id);
        let position = Position {
            line: cursor.line,
            character: cursor.character,
        };

        let mut all_locations = bundle.references(&cursor.path, position, cancel).await?;
        for moniker in &cursor.monikers {
            let (moniker_locations, _count) = bundle
                .moniker_results(
                    MonikerModel::References,
                    &moniker.scheme,
                    &moniker.identifier,
                    Paging::default(),
                    cancel,
                )
                .await?;
            all_locations.extend(moniker_locations);
        }

        let skip = cursor.skip_results as usize;
        let take_hi = skip + limit.max(0) as usize;
        let page = slice_locations(&all_locations, skip, take_hi).to_vec();
        let page_len = page.len();
        let resolved = resolve_with_dump(dump, page);

        let next = if take_hi < all_locations.len() {
            Cursor {
                skip_results: cursor.skip_results + page_len as i64,
                ..cursor
            }
        } else {
            Cursor {
                phase: Some(Phase::DefinitionMonikers),
                skip_results: 0,
                ..cursor
            }
        };

        Ok((resolved, Some(next)))
    }

    /// `definitionMonikersReference`: follows the first `import` moniker
    /// with unpaged results, paginating within it. Returns `None` when no
    /// import moniker yields anything.
    async fn definition_monikers_reference(
        &self,
        limit: i64,
        cursor: &Cursor,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<(Vec<ResolvedLocation>, Option<Cursor>)>> {
        for moniker in &cursor.monikers {
            if moniker.kind != "import" {
                continue;
            }

            let (locations, count) = self
                .lookup_moniker(
                    cursor.dump_id,
                    &cursor.path,
                    moniker,
                    MonikerModel::References,
                    Paging {
                        skip: cursor.skip_results,
                        take: limit,
                    },
                    cancel,
                )
                .await?;

            if locations.is_empty() {
                continue;
            }

            let new_offset = cursor.skip_results + locations.len() as i64;
            let next = if new_offset >= count {
                None
            } else {
                Some(Cursor {
                    skip_results: new_offset,
                    ..cursor.clone()
                })
            };

            return Ok(Some((locations, next)));
        }

        Ok(None)
    }

    async fn handle_definition_monikers(
        &self,
        limit: i64,
        cursor: Cursor,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let outcome = self.definition_monikers_reference(limit, &cursor, cancel).await?;

        let locations = match &outcome {
            Some((locations, _)) => locations.clone(),
            None => Vec::new(),
        };

        if let Some((_, Some(next))) = outcome {
            return Ok((locations, Some(next)));
        }

        // Either no import moniker produced results, or the one that did
        // is now exhausted: look for a moniker carrying package
        // information to seed the same-repo batch.
        for moniker in &cursor.monikers {
            if moniker.package_information_id.is_empty() {
                continue;
            }

            let package_information = self
                .package_information(cursor.dump_id, &cursor.path, &moniker.package_information_id, cancel)
                .await?;

            let next = Cursor {
                phase: Some(Phase::SameRepo),
                dump_id: cursor.dump_id,
                scheme: moniker.scheme.clone(),
                identifier: moniker.identifier.clone(),
                name: package_information.name,
                version: package_information.version,
                ..Default::default()
            };
            return Ok((locations, Some(next)));
        }

        Ok((locations, None))
    }

    async fn handle_same_repo(
        &self,
        repository_id: i64,
        commit: &str,
        limit: i64,
        mut cursor: Cursor,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, Option<Cursor>)> {
        if cursor.dump_ids.is_empty() {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let (total, pager) = self
                .store
                .same_repo_pager(repository_id, commit, &cursor.scheme, &cursor.name, &cursor.version)
                .await?;

            let page_size = self.store.remote_dump_limit();
            let (dump_ids, new_offset) = gather_package_references(
                pager,
                &cursor.identifier,
                cursor.skip_dumps_when_batching,
                page_size,
                total,
                page_size,
            )
            .await?;

            cursor.dump_ids = dump_ids;
            cursor.skip_dumps_when_batching = new_offset;
            cursor.total_dumps_when_batching = total;
            cursor.skip_dumps_in_batch = 0;
            cursor.skip_results_in_dump = 0;
        }

        self.fan_out_over_dump_ids(limit, cursor, Some(Phase::RemoteRepo), cancel).await
    }

    async fn handle_remote_repo(
        &self,
        repository_id: i64,
        limit: i64,
        mut cursor: Cursor,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, Option<Cursor>)> {
        if cursor.dump_ids.is_empty() {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let (total, pager) = self
                .store
                .package_reference_pager(&cursor.scheme, &cursor.name, &cursor.version, repository_id)
                .await?;

            let page_size = self.store.remote_dump_limit();
            let (dump_ids, new_offset) = gather_package_references(
                pager,
                &cursor.identifier,
                cursor.skip_dumps_when_batching,
                page_size,
                total,
                page_size,
            )
            .await?;

            cursor.dump_ids = dump_ids;
            cursor.skip_dumps_when_batching = new_offset;
            cursor.total_dumps_when_batching = total;
            cursor.skip_dumps_in_batch = 0;
            cursor.skip_results_in_dump = 0;
        }

        self.fan_out_over_dump_ids(limit, cursor, None, cancel).await
    }

    /// Shared fan-out over a batch of candidate dump ids, used by both the
    /// same-repo and remote-repo phases (`locationsFromRemoteReferences`).
    ///
    /// Looks up each candidate's own dump (`batch_dump_id`, not
    /// `cursor.dump_id`) before querying its bundle — spec §4.H describes
    /// per-bundle fan-out explicitly, which this follows even though the
    /// original Go source reused the origin dump id here.
    async fn fan_out_over_dump_ids(
        &self,
        limit: i64,
        cursor: Cursor,
        next_phase: Option<Phase>,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, Option<Cursor>)> {
        let origin_dump_id = cursor.dump_id;

        for i in cursor.skip_dumps_in_batch..cursor.dump_ids.len() {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let batch_dump_id = cursor.dump_ids[i];
            if batch_dump_id == origin_dump_id {
                continue;
            }

            let Some(dump) = self.store.get_dump_by_id(batch_dump_id).await? else {
                continue;
            };
            let bundle = self.bundles.bundle_client(dump.id);

            let (locations, count) = bundle
                .moniker_results(
                    MonikerModel::References,
                    &cursor.scheme,
                    &cursor.identifier,
                    Paging {
                        skip: cursor.skip_results_in_dump,
                        take: limit,
                    },
                    cancel,
                )
                .await?;

            if locations.is_empty() {
                continue;
            }

            let resolved = resolve_with_dump(&dump, locations.clone());
            let new_offset_in_dump = cursor.skip_results_in_dump + locations.len() as i64;

            let next = if new_offset_in_dump < count {
                Some(Cursor {
                    skip_results_in_dump: new_offset_in_dump,
                    ..cursor
                })
            } else if i + 1 < cursor.dump_ids.len() {
                Some(Cursor {
                    skip_dumps_in_batch: i + 1,
                    skip_results_in_dump: 0,
                    ..cursor
                })
            } else {
                next_batch_or_phase(cursor, next_phase)
            };

            return Ok((resolved, next));
        }

        // No candidate in this batch yielded anything: move to the next
        // batch of candidate dumps, or the next phase if none remain.
        Ok((Vec::new(), next_batch_or_phase(cursor, next_phase)))
    }
}

/// Either requests another batch from the same pager (more candidates
/// remain beyond the ones already gathered) or transitions to `next_phase`
/// (or ends pagination if `next_phase` is `None`).
fn next_batch_or_phase(cursor: Cursor, next_phase: Option<Phase>) -> Option<Cursor> {
    if cursor.skip_dumps_when_batching < cursor.total_dumps_when_batching {
        return Some(Cursor {
            dump_ids: Vec::new(),
            skip_dumps_in_batch: 0,
            skip_results_in_dump: 0,
            ..cursor
        });
    }

    next_phase.map(|phase| Cursor {
        phase: Some(phase),
        dump_id: cursor.dump_id,
        scheme: cursor.scheme.clone(),
        identifier: cursor.identifier.clone(),
        name: cursor.name.clone(),
        version: cursor.version.clone(),
        ..Default::default()
    })
}

/// `gatherPackageReferences`: pages through a reference pager, applying the
/// Bloom filter to each page, until either `limit` matching dump ids are
/// found or the pager is exhausted. Returns `(matched_dump_ids,
/// resume_offset)`. Takes ownership of `pager` so it can close it (commit
/// on success, rollback on error) before returning.
async fn gather_package_references(
    mut pager: Pager,
    identifier: &str,
    mut offset: i64,
    page_size: i64,
    total_count: i64,
    limit: i64,
) -> ApiResult<(Vec<i64>, i64)> {
    let mut matched = Vec::new();
    let mut failure: Option<ApiError> = None;

    while offset < total_count && (matched.len() as i64) < limit {
        match pager.page_from_offset(offset, page_size).await {
            Ok(page) => {
                if page.is_empty() {
                    break;
                }
                let remaining = limit - matched.len() as i64;
                let (found, scanned) = apply_bloom_filter(&page, identifier, remaining);
                matched.extend(found);
                offset += scanned;
            }
            Err(err) => {
                failure = Some(ApiError::from(err));
                break;
            }
        }
    }

    match &failure {
        None => {
            pager.close(None).await.map_err(ApiError::from)?;
        }
        Some(_) => {
            let close_err = anyhow::anyhow!("aborting reference gather");
            let _ = pager.close(Some(&close_err)).await;
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }

    Ok((matched, offset))
}

/// `applyBloomFilter`: scans `page` one entry at a time, testing the
/// identifier against each entry's encoded filter, until `limit` matches
/// are found or the page is exhausted. Decode failures are logged and
/// treated as "no match" rather than failing the request (spec §4.H
/// "Filter-decode"). Returns `(matched_dump_ids, entries_scanned)`.
fn apply_bloom_filter(page: &[ReferenceRow], identifier: &str, limit: i64) -> (Vec<i64>, i64) {
    let mut matched = Vec::new();
    let mut scanned = 0i64;

    for row in page {
        scanned += 1;
        match bloom::test(&row.filter, identifier) {
            Ok(true) => matched.push(row.dump_id),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(dump_id = row.dump_id, "failed to decode bloom filter: {err:#}");
            }
        }
        if matched.len() as i64 >= limit {
            break;
        }
    }

    (matched, scanned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundles::test_support::{FakeBundleClient, FakeBundleManager};
    use crate::bundles::{Location, MonikerData, Range};
    use crate::config::ResolverConfig;

    fn dump_fixture(id: i64, root: &str) -> Dump {
        Dump {
            id,
            commit: "a".repeat(40),
            root: root.to_string(),
            visible_at_tip: true,
            uploaded_at: chrono::Utc::now(),
            state: "completed".to_string(),
            failure_summary: None,
            failure_stacktrace: None,
            started_at: None,
            finished_at: None,
            tracing_context: String::new(),
            repository_id: 1,
            indexer: "lsif-go".to_string(),
        }
    }

    fn resolvers(bundles: FakeBundleManager) -> Resolvers<FakeBundleManager> {
        Resolvers {
            store: crate::store::MetadataStore::unconnected(),
            bundles,
            config: ResolverConfig::default(),
        }
    }

    fn location(path: &str) -> Location {
        Location {
            dump_id: 1,
            path: path.to_string(),
            range: Range::default(),
        }
    }

    fn fresh_cursor() -> Cursor {
        Cursor {
            phase: Some(Phase::SameDump),
            dump_id: 1,
            path: "main.go".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn same_dump_phase_paginates_and_then_moves_to_definition_monikers() {
        let dump = dump_fixture(1, "");
        let mut client = FakeBundleClient::default();
        client.references = vec![location("a.go"), location("b.go"), location("c.go")];

        let resolvers = resolvers(FakeBundleManager::with_client(1, client));

        let (first, next) = resolvers
            .same_dump_reference_page(&dump, 2, fresh_cursor(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        let next = next.unwrap();
        assert_eq!(next.phase, Some(Phase::SameDump));
        assert_eq!(next.skip_results, 2);

        let (second, next) = resolvers
            .same_dump_reference_page(&dump, 2, next, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(next.unwrap().phase, Some(Phase::DefinitionMonikers));
    }

    #[tokio::test]
    async fn definition_monikers_phase_ends_pagination_without_package_info() {
        let cursor = Cursor {
            phase: Some(Phase::DefinitionMonikers),
            dump_id: 1,
            path: "main.go".to_string(),
            monikers: vec![MonikerData {
                kind: "export".to_string(),
                scheme: "gomod".to_string(),
                identifier: "pad".to_string(),
                package_information_id: String::new(),
            }],
            ..Default::default()
        };

        let resolvers = resolvers(FakeBundleManager::with_client(1, FakeBundleClient::default()));

        let (locations, next) = resolvers
            .handle_definition_monikers(10, cursor, &CancellationToken::new())
            .await
            .unwrap();

        assert!(locations.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn apply_bloom_filter_counts_scanned_entries_on_decode_failure() {
        // Rows with empty filters never match (decode failure -> "no
        // match"), so this only exercises the scan-until-limit bookkeeping.
        let page = vec![
            ReferenceRow { dump_id: 1, filter: Vec::new() },
            ReferenceRow { dump_id: 2, filter: Vec::new() },
        ];
        let (matched, scanned) = apply_bloom_filter(&page, "anything", 5);
        assert!(matched.is_empty());
        assert_eq!(scanned, 2);
    }
}
