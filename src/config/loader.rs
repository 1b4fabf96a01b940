//! Configuration file loading and parsing.
//!
//! Loads the resolver's tunable constants from a RON file, with fallback
//! strategies for finding the file in standard locations. Absent a file,
//! the compiled-in defaults in [`super::Config`] apply.

use super::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Standard config file names to search for.
const CONFIG_FILENAMES: &[&str] = &["codeintel.ron", ".codeintel/config.ron"];

/// Load configuration from a specific file path.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_ron(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration with automatic file discovery.
///
/// Searches for config files in the following locations (in order):
/// 1. Path specified in the `CODEINTEL_CONFIG_PATH` environment variable
/// 2. `codeintel.ron` in current directory
/// 3. `.codeintel/config.ron` relative to current directory
///
/// If no config file is found, returns a default configuration.
pub fn load_with_discovery() -> Result<Config> {
    if let Ok(env_path) = std::env::var("CODEINTEL_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            tracing::info!("Loading config from CODEINTEL_CONFIG_PATH: {}", path.display());
            return load_from_file(&path);
        } else {
            tracing::warn!(
                "CODEINTEL_CONFIG_PATH specified but file not found: {}",
                path.display()
            );
        }
    }

    for filename in CONFIG_FILENAMES {
        let path = PathBuf::from(filename);
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            return load_from_file(&path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

/// Parse RON configuration string.
fn parse_ron(content: &str) -> Result<Config> {
    ron::from_str(content).context("Failed to parse RON configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let ron = r#"
Config(
    resolver: ResolverConfig(
        max_traversal_limit: 100,
        remote_dump_limit: 20,
        bundle_manager_url: "http://127.0.0.1:3187",
        bind_address: "0.0.0.0:3186",
    ),
)
        "#;

        let config = parse_ron(ron).unwrap();
        assert_eq!(config.resolver.max_traversal_limit, 100);
        assert_eq!(config.resolver.remote_dump_limit, 20);
    }

    #[test]
    fn test_parse_overridden_limits() {
        let ron = r#"
Config(
    resolver: ResolverConfig(
        max_traversal_limit: 250,
        remote_dump_limit: 50,
        bundle_manager_url: "http://bundles.internal:8080",
        bind_address: "127.0.0.1:9000",
    ),
)
        "#;

        let config = parse_ron(ron).unwrap();
        assert_eq!(config.resolver.max_traversal_limit, 250);
        assert_eq!(config.resolver.remote_dump_limit, 50);
        assert_eq!(config.resolver.bundle_manager_url, "http://bundles.internal:8080");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.ron");

        let ron_content = r#"
Config(
    resolver: ResolverConfig(
        max_traversal_limit: 42,
        remote_dump_limit: 7,
        bundle_manager_url: "http://localhost:5000",
        bind_address: "0.0.0.0:3186",
    ),
)
        "#;

        std::fs::write(&config_path, ron_content).unwrap();

        let config = load_from_file(&config_path).unwrap();
        assert_eq!(config.resolver.max_traversal_limit, 42);
        assert_eq!(config.resolver.remote_dump_limit, 7);
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let result = load_from_file("/nonexistent/path/config.ron");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_with_discovery_defaults() {
        unsafe {
            std::env::remove_var("CODEINTEL_CONFIG_PATH");
        }

        let config = load_with_discovery().unwrap();
        assert_eq!(config.resolver.max_traversal_limit, 100);
    }

    #[test]
    fn test_parse_invalid_ron() {
        let invalid_ron = "This is not valid RON";
        let result = parse_ron(invalid_ron);
        assert!(result.is_err());
    }
}
