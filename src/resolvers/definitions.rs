//! Local-then-moniker definition lookup for one position (spec §4.G).

use super::{BundleManager, Resolvers, path_in_bundle};
use crate::bundles::{BundleClient, MonikerModel, Paging, Position};
use crate::errors::ApiResult;
use crate::locations::{ResolvedLocation, resolve_with_dump};
use crate::store::Dump;
use tokio_util::sync::CancellationToken;

impl<M: BundleManager> Resolvers<M> {
    /// `(file, line, character, uploadID) -> []ResolvedLocation` (spec §4.G).
    #[tracing::instrument(skip(self, cancel))]
    pub async fn definitions(
        &self,
        file: &str,
        position: Position,
        upload_id: i64,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<ResolvedLocation>> {
        let dump = self.require_dump(upload_id).await?;
        let path = path_in_bundle(file, &dump.root);
        self.definitions_raw(&dump, &path, position, cancel).await
    }

    /// Shared with the hover and reference resolvers, which already hold a
    /// loaded `dump` and a bundle-relative path.
    pub(crate) async fn definitions_raw(
        &self,
        dump: &Dump,
        path_in_bundle: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<ResolvedLocation>> {
        let bundle = self.bundles.bundle_client(dump.id);

        let locations = bundle.definitions(path_in_bundle, position, cancel).await?;
        if !locations.is_empty() {
            return Ok(resolve_with_dump(dump, locations));
        }

        let range_monikers = bundle
            .monikers_by_position(path_in_bundle, position, cancel)
            .await?;

        for monikers in &range_monikers {
            for moniker in monikers {
                if moniker.kind == "import" {
                    let (locations, _count) = self
                        .lookup_moniker(
                            dump.id,
                            path_in_bundle,
                            moniker,
                            MonikerModel::Definitions,
                            Paging::default(),
                            cancel,
                        )
                        .await?;
                    if !locations.is_empty() {
                        return Ok(locations);
                    }
                } else {
                    // Not imported from another bundle: fall back to this
                    // bundle's own definitions table, in case a result set
                    // carries the right moniker without being linked.
                    let (locations, _count) = bundle
                        .moniker_results(
                            MonikerModel::Definitions,
                            &moniker.scheme,
                            &moniker.identifier,
                            Paging::default(),
                            cancel,
                        )
                        .await?;
                    if !locations.is_empty() {
                        return Ok(resolve_with_dump(dump, locations));
                    }
                }
            }
        }

        Ok(Vec::new())
    }

    /// First definition only, short-circuiting (spec §4.I's "follow
    /// definition").
    pub(crate) async fn first_definition(
        &self,
        dump: &Dump,
        path_in_bundle: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<ResolvedLocation>> {
        let mut resolved = self
            .definitions_raw(dump, path_in_bundle, position, cancel)
            .await?;
        Ok(if resolved.is_empty() {
            None
        } else {
            Some(resolved.remove(0))
        })
    }
}
