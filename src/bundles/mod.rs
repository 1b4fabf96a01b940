//! Typed facade over the external bundle service's per-bundle HTTP API
//! (spec §4.B). Each bundle (one upload's index data) is addressed by
//! `bundleID` and exposed through a handful of read-only operations.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Zero-based position inside a file.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct Position {
    pub line: i32,
    pub character: i32,
}

/// Half-open `[start, end)` range inside a file, zero-based.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 0,
            character: 0,
        }
    }
}

/// An in-bundle location: bundle-relative path, no dump root prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Location {
    #[serde(rename = "dumpId", default)]
    pub dump_id: i64,
    pub path: String,
    pub range: Range,
}

/// A moniker attached to a range inside a bundle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonikerData {
    pub kind: String,
    pub scheme: String,
    pub identifier: String,
    #[serde(rename = "packageInformationId", default)]
    pub package_information_id: String,
}

/// `(name, version)` fetched by `packageInformationId`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PackageInformationData {
    pub name: String,
    pub version: String,
}

/// Model type passed to `MonikerResults`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonikerModel {
    Definitions,
    References,
}

impl MonikerModel {
    fn as_str(self) -> &'static str {
        match self {
            MonikerModel::Definitions => "definitions",
            MonikerModel::References => "references",
        }
    }
}

/// `skip=0, take=0` means "all results" (spec §4.B).
#[derive(Debug, Clone, Copy, Default)]
pub struct Paging {
    pub skip: i64,
    pub take: i64,
}

#[derive(Debug, Deserialize)]
struct MonikerResultsResponse {
    locations: Vec<Location>,
    count: i64,
}

#[derive(Debug, Deserialize)]
struct HoverResponse {
    text: String,
    range: Range,
}

/// Per-bundle capabilities, addressed by `bundleID` (spec §4.B).
///
/// Uses native async-fn-in-trait so callers get static dispatch; the only
/// implementation shipped is [`HttpBundleClient`], but tests substitute an
/// in-memory fake that implements the same trait.
pub trait BundleClient: Send + Sync {
    fn exists(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn definitions(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Location>>> + Send;

    fn references(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Location>>> + Send;

    fn hover(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<(String, Range)>>> + Send;

    fn monikers_by_position(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Vec<MonikerData>>>> + Send;

    fn moniker_results(
        &self,
        model: MonikerModel,
        scheme: &str,
        identifier: &str,
        paging: Paging,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(Vec<Location>, i64)>> + Send;

    fn package_information(
        &self,
        path: &str,
        package_information_id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<PackageInformationData>> + Send;
}

/// Builds [`HttpBundleClient`]s bound to individual bundle IDs, all sharing
/// one `reqwest::Client` connection pool and base URL.
#[derive(Clone)]
pub struct BundleManagerClient {
    http: reqwest::Client,
    bundle_manager_url: String,
}

impl BundleManagerClient {
    pub fn new(bundle_manager_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bundle_manager_url,
        }
    }

    pub fn bundle_client(&self, bundle_id: i64) -> HttpBundleClient {
        HttpBundleClient {
            http: self.http.clone(),
            bundle_manager_url: self.bundle_manager_url.clone(),
            bundle_id,
        }
    }
}

/// HTTP-backed [`BundleClient`]. One GET per capability against
/// `{bundle_manager_url}/dbs/{bundle_id}/{op}`, matching the bundle
/// service's original URL shape.
#[derive(Clone)]
pub struct HttpBundleClient {
    http: reqwest::Client,
    bundle_manager_url: String,
    bundle_id: i64,
}

impl HttpBundleClient {
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        op: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T> {
        let url = format!("{}/dbs/{}/{}", self.bundle_manager_url, self.bundle_id, op);

        let request = self.http.get(&url).query(query).send();
        let response = tokio::select! {
            result = request => result.with_context(|| format!("bundle request failed: {url}"))?,
            _ = cancel.cancelled() => bail!("bundle request cancelled: {url}"),
        };

        if !response.status().is_success() {
            bail!("bad status {} from {}", response.status(), url);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }

    fn stamp_dump_id(&self, mut locations: Vec<Location>) -> Vec<Location> {
        for location in &mut locations {
            location.dump_id = self.bundle_id;
        }
        locations
    }
}

impl BundleClient for HttpBundleClient {
    async fn exists(&self, path: &str, cancel: &CancellationToken) -> Result<bool> {
        self.request("exists", &[("path", path.to_string())], cancel)
            .await
    }

    async fn definitions(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>> {
        let query = [
            ("path", path.to_string()),
            ("line", position.line.to_string()),
            ("character", position.character.to_string()),
        ];
        let locations: Vec<Location> = self.request("definitions", &query, cancel).await?;
        Ok(self.stamp_dump_id(locations))
    }

    async fn references(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>> {
        let query = [
            ("path", path.to_string()),
            ("line", position.line.to_string()),
            ("character", position.character.to_string()),
        ];
        let locations: Vec<Location> = self.request("references", &query, cancel).await?;
        Ok(self.stamp_dump_id(locations))
    }

    async fn hover(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> Result<Option<(String, Range)>> {
        let query = [
            ("path", path.to_string()),
            ("line", position.line.to_string()),
            ("character", position.character.to_string()),
        ];
        let raw: serde_json::Value = self.request("hover", &query, cancel).await?;
        if raw.is_null() {
            return Ok(None);
        }
        let payload: HoverResponse = serde_json::from_value(raw)
            .context("failed to decode hover payload")?;
        Ok(Some((payload.text, payload.range)))
    }

    async fn monikers_by_position(
        &self,
        path: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<MonikerData>>> {
        let query = [
            ("path", path.to_string()),
            ("line", position.line.to_string()),
            ("character", position.character.to_string()),
        ];
        self.request("monikersByPosition", &query, cancel).await
    }

    async fn moniker_results(
        &self,
        model: MonikerModel,
        scheme: &str,
        identifier: &str,
        paging: Paging,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Location>, i64)> {
        let mut query = vec![
            ("modelType", model.as_str().to_string()),
            ("scheme", scheme.to_string()),
            ("identifier", identifier.to_string()),
        ];
        if paging.skip != 0 {
            query.push(("skip", paging.skip.to_string()));
        }
        if paging.take != 0 {
            query.push(("take", paging.take.to_string()));
        }

        let response: MonikerResultsResponse =
            self.request("monikerResults", &query, cancel).await?;
        Ok((self.stamp_dump_id(response.locations), response.count))
    }

    async fn package_information(
        &self,
        path: &str,
        package_information_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PackageInformationData> {
        let query = [
            ("path", path.to_string()),
            ("packageInformationId", package_information_id.to_string()),
        ];
        self.request("packageInformation", &query, cancel).await
    }
}
