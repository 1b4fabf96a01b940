//! Cross-bundle code-intelligence resolvers (spec §4.G/H/I): the
//! definition, reference-page, and hover resolvers that stitch together
//! [`crate::store::MetadataStore`] (dump/package/reference metadata) and
//! a [`BundleManager`] (the external bundle service) into answers for one
//! query-time request.

pub mod definitions;
pub mod hover;
pub mod references;

use crate::bundles::{
    BundleClient, BundleManagerClient, HttpBundleClient, MonikerData, MonikerModel,
    PackageInformationData, Paging,
};
use crate::config::ResolverConfig;
use crate::errors::{ApiError, ApiResult};
use crate::locations::{ResolvedLocation, resolve_with_dump};
use crate::store::{Dump, MetadataStore};
use tokio_util::sync::CancellationToken;

/// Factory for per-bundle [`BundleClient`]s, addressed by `bundleID`.
///
/// Abstracted as a trait (rather than using [`BundleManagerClient`]
/// directly) so resolver logic can be exercised in tests against an
/// in-memory fake instead of a live bundle service — mirroring how the
/// original Go implementation drove its resolver tests off hand-rolled
/// mocks (`mock_bundle_manager_test.go`).
pub trait BundleManager: Clone + Send + Sync {
    type Client: BundleClient;

    fn bundle_client(&self, bundle_id: i64) -> Self::Client;
}

impl BundleManager for BundleManagerClient {
    type Client = HttpBundleClient;

    fn bundle_client(&self, bundle_id: i64) -> HttpBundleClient {
        BundleManagerClient::bundle_client(self, bundle_id)
    }
}

/// Shared state for the G/H/I resolvers: metadata store, bundle client
/// factory, and the tunable constants of spec.md §6.
#[derive(Clone)]
pub struct Resolvers<M: BundleManager = BundleManagerClient> {
    pub store: MetadataStore,
    pub bundles: M,
    pub config: ResolverConfig,
}

impl<M: BundleManager> Resolvers<M> {
    pub fn new(store: MetadataStore, bundles: M, config: ResolverConfig) -> Self {
        Self {
            store,
            bundles,
            config,
        }
    }

    /// Loads a dump by id, translating "not found" into [`ApiError::MissingDump`]
    /// (spec §4.G step 1, §4.I, §4.H "same-dump").
    pub(crate) async fn require_dump(&self, id: i64) -> ApiResult<Dump> {
        self.store
            .get_dump_by_id(id)
            .await?
            .ok_or(ApiError::MissingDump)
    }

    /// `lookupMoniker(originDumpID, path, moniker, model, skip, take)` (spec §4.G).
    ///
    /// Follows an import moniker to the bundle that defines its package and
    /// queries that bundle's moniker index. Returns `(locations, count)`
    /// where `locations` are already resolved against the *defining* dump.
    pub(crate) async fn lookup_moniker(
        &self,
        origin_dump_id: i64,
        path: &str,
        moniker: &MonikerData,
        model: MonikerModel,
        paging: Paging,
        cancel: &CancellationToken,
    ) -> ApiResult<(Vec<ResolvedLocation>, i64)> {
        if moniker.package_information_id.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let package_information = self
            .package_information(origin_dump_id, path, &moniker.package_information_id, cancel)
            .await?;

        let Some(defining_dump) = self
            .store
            .get_package(&moniker.scheme, &package_information.name, &package_information.version)
            .await?
        else {
            return Ok((Vec::new(), 0));
        };

        let defining_bundle = self.bundles.bundle_client(defining_dump.id);
        let (locations, count) = defining_bundle
            .moniker_results(model, &moniker.scheme, &moniker.identifier, paging, cancel)
            .await?;

        Ok((resolve_with_dump(&defining_dump, locations), count))
    }

    pub(crate) async fn package_information(
        &self,
        origin_dump_id: i64,
        path: &str,
        package_information_id: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<PackageInformationData> {
        let origin_bundle = self.bundles.bundle_client(origin_dump_id);
        Ok(origin_bundle
            .package_information(path, package_information_id, cancel)
            .await?)
    }
}

/// `file \ dump.root`: the bundle-relative path of a repository-relative
/// `file` (spec §4.G step 2, invariant I3).
pub(crate) fn path_in_bundle(file: &str, root: &str) -> String {
    file.strip_prefix(root).unwrap_or(file).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dump_root_prefix() {
        assert_eq!(path_in_bundle("sub/a.go", "sub/"), "a.go");
        assert_eq!(path_in_bundle("a.go", ""), "a.go");
    }

    #[test]
    fn leaves_file_unchanged_when_root_is_not_a_prefix() {
        assert_eq!(path_in_bundle("other/a.go", "sub/"), "other/a.go");
    }
}
