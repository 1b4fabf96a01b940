//! In-memory [`BundleClient`]/[`BundleManager`] fakes used by resolver unit
//! tests, in place of the hand-rolled mocks (`mock_bundle_manager_test.go`)
//! the original implementation drove its own tests against. Only built
//! under `cfg(test)` or the `test-support` feature.

use super::{
    BundleClient, Location, MonikerData, MonikerModel, PackageInformationData, Paging, Position,
    Range,
};
use crate::resolvers::BundleManager;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A scripted bundle: canned responses for each capability, keyed the same
/// way the real bundle service's query parameters would be.
#[derive(Clone, Default)]
pub struct FakeBundleClient {
    pub exists: bool,
    pub definitions: Vec<Location>,
    pub references: Vec<Location>,
    pub hover: Option<(String, Range)>,
    pub monikers_by_position: Vec<Vec<MonikerData>>,
    pub moniker_results: HashMap<(String, String, String), (Vec<Location>, i64)>,
    pub package_information: HashMap<String, PackageInformationData>,
}

impl BundleClient for FakeBundleClient {
    async fn exists(&self, _path: &str, _cancel: &CancellationToken) -> Result<bool> {
        Ok(self.exists)
    }

    async fn definitions(
        &self,
        _path: &str,
        _position: Position,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Location>> {
        Ok(self.definitions.clone())
    }

    async fn references(
        &self,
        _path: &str,
        _position: Position,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Location>> {
        Ok(self.references.clone())
    }

    async fn hover(
        &self,
        _path: &str,
        _position: Position,
        _cancel: &CancellationToken,
    ) -> Result<Option<(String, Range)>> {
        Ok(self.hover.clone())
    }

    async fn monikers_by_position(
        &self,
        _path: &str,
        _position: Position,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Vec<MonikerData>>> {
        Ok(self.monikers_by_position.clone())
    }

    async fn moniker_results(
        &self,
        model: MonikerModel,
        scheme: &str,
        identifier: &str,
        paging: Paging,
        _cancel: &CancellationToken,
    ) -> Result<(Vec<Location>, i64)> {
        let key = (model.as_str().to_string(), scheme.to_string(), identifier.to_string());
        let Some((locations, count)) = self.moniker_results.get(&key) else {
            return Ok((Vec::new(), 0));
        };

        if paging.skip == 0 && paging.take == 0 {
            return Ok((locations.clone(), *count));
        }

        let lo = paging.skip.max(0) as usize;
        let hi = if paging.take == 0 {
            locations.len()
        } else {
            (paging.skip + paging.take).max(0) as usize
        };
        let lo = lo.min(locations.len());
        let hi = hi.min(locations.len());
        Ok((locations[lo..hi].to_vec(), *count))
    }

    async fn package_information(
        &self,
        _path: &str,
        package_information_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<PackageInformationData> {
        self.package_information
            .get(package_information_id)
            .cloned()
            .ok_or_else(|| anyhow!("no package information for id {package_information_id}"))
    }
}

/// Maps bundle ids to their scripted [`FakeBundleClient`].
#[derive(Clone, Default)]
pub struct FakeBundleManager {
    clients: Arc<HashMap<i64, FakeBundleClient>>,
}

impl FakeBundleManager {
    pub fn with_client(bundle_id: i64, client: FakeBundleClient) -> Self {
        let mut clients = HashMap::new();
        clients.insert(bundle_id, client);
        Self { clients: Arc::new(clients) }
    }

    pub fn with_clients(clients: HashMap<i64, FakeBundleClient>) -> Self {
        Self { clients: Arc::new(clients) }
    }
}

impl BundleManager for FakeBundleManager {
    type Client = FakeBundleClient;

    fn bundle_client(&self, bundle_id: i64) -> FakeBundleClient {
        self.clients.get(&bundle_id).cloned().unwrap_or_default()
    }
}
