//! Configuration management for the query server.
//!
//! Tunable constants from the spec (traversal cap, batching size, stalled
//! upload age) have sane defaults but can be overridden via a RON file for
//! environments that need to deviate without recompiling.

pub mod loader;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the query server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
        }
    }
}

/// Tunables governing the cross-bundle resolver (spec §6 "Environment").
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolverConfig {
    /// Maximum number of commits visited by the bidirectional commit-graph
    /// walk before truncating (spec §4.D).
    #[serde(default = "default_max_traversal_limit")]
    pub max_traversal_limit: i64,

    /// Candidate-bundle batch size used while paging same-repo/remote-repo
    /// references (spec §4.H).
    #[serde(default = "default_remote_dump_limit")]
    pub remote_dump_limit: i64,

    /// Base URL of the external bundle service (spec §4.B).
    #[serde(default = "default_bundle_manager_url")]
    pub bundle_manager_url: String,

    /// HTTP address this server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_traversal_limit: default_max_traversal_limit(),
            remote_dump_limit: default_remote_dump_limit(),
            bundle_manager_url: default_bundle_manager_url(),
            bind_address: default_bind_address(),
        }
    }
}

fn default_max_traversal_limit() -> i64 {
    100
}

fn default_remote_dump_limit() -> i64 {
    20
}

fn default_bundle_manager_url() -> String {
    "http://127.0.0.1:3187".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:3186".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.resolver.max_traversal_limit, 100);
        assert_eq!(config.resolver.remote_dump_limit, 20);
    }
}
