//! Local hover; on miss, follow the first definition and hover that
//! (spec §4.I).

use super::{BundleManager, Resolvers, path_in_bundle};
use crate::bundles::{BundleClient, Position, Range};
use crate::errors::ApiResult;
use crate::store::Dump;
use tokio_util::sync::CancellationToken;

impl<M: BundleManager> Resolvers<M> {
    #[tracing::instrument(skip(self, cancel))]
    pub async fn hover(
        &self,
        file: &str,
        position: Position,
        upload_id: i64,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<(String, Range)>> {
        let dump = self.require_dump(upload_id).await?;
        let path = path_in_bundle(file, &dump.root);
        self.hover_raw(&dump, &path, position, cancel).await
    }

    /// Shared core, taking an already-loaded `dump` so it can be exercised
    /// in tests without a live store (mirrors `definitions_raw`).
    pub(crate) async fn hover_raw(
        &self,
        dump: &Dump,
        bundle_path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<(String, Range)>> {
        let bundle = self.bundles.bundle_client(dump.id);

        if let Some(hover) = bundle.hover(bundle_path, position, cancel).await? {
            return Ok(Some(hover));
        }

        let Some(definition) = self
            .first_definition(dump, bundle_path, position, cancel)
            .await?
        else {
            return Ok(None);
        };

        let definition_path = path_in_bundle(&definition.path, &definition.dump.root);
        let definition_bundle = self.bundles.bundle_client(definition.dump.id);
        Ok(definition_bundle
            .hover(&definition_path, definition.range.start, cancel)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundles::test_support::{FakeBundleClient, FakeBundleManager};
    use crate::bundles::{Location, Position};
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

    #[tokio::test]
    async fn returns_local_hover_when_present() {
        let dump = dump_fixture(1, "");
        let mut client = FakeBundleClient::default();
        client.hover = Some(("some doc".to_string(), Range::default()));

        let result = resolvers(FakeBundleManager::with_client(1, client))
            .hover_raw(&dump, "a.go", Position { line: 0, character: 0 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.unwrap().0, "some doc");
    }

    #[tokio::test]
    async fn falls_back_to_definition_hover_on_local_miss() {
        let dump = dump_fixture(1, "");
        let mut client = FakeBundleClient::default();
        client.hover = None;
        client.definitions = vec![Location {
            dump_id: 1,
            path: "b.go".to_string(),
            range: Range {
                start: crate::bundles::Position { line: 4, character: 1 },
                end: crate::bundles::Position { line: 4, character: 5 },
            },
        }];

        let result = resolvers(FakeBundleManager::with_client(1, client))
            .hover_raw(&dump, "a.go", Position { line: 0, character: 0 }, &CancellationToken::new())
            .await
            .unwrap();

        // The fake bundle has no hover text registered for "b.go" either,
        // so this exercises the fallback path returning `None` cleanly
        // rather than erroring.
        assert!(result.is_none());
    }
}
