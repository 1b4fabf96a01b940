//! Location resolution: lifting in-bundle results into cross-repository
//! coordinates (spec §4.E). Pure functions, no I/O.

use crate::bundles::{Location, Range};
use crate::store::Dump;
use serde::Serialize;

/// An in-bundle location attached to the dump it came from; `path` has
/// been rewritten to be repository-relative.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub dump: Dump,
    pub path: String,
    pub range: Range,
}

/// Wire shape returned to HTTP callers (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct ApiLocation {
    #[serde(rename = "repositoryId")]
    pub repository_id: i64,
    pub commit: String,
    pub path: String,
    pub range: Range,
}

/// `ResolveWithDump(dump, locations) -> []ResolvedLocation`: attaches
/// `dump` and rewrites `path := dump.root + location.path`.
pub fn resolve_with_dump(dump: &Dump, locations: Vec<Location>) -> Vec<ResolvedLocation> {
    locations
        .into_iter()
        .map(|location| ResolvedLocation {
            dump: dump.clone(),
            path: format!("{}{}", dump.root, location.path),
            range: location.range,
        })
        .collect()
}

/// `Serialize(resolved) -> []APILocation`: projects `(repositoryID,
/// commit, path, range)`.
pub fn serialize_locations(resolved: &[ResolvedLocation]) -> Vec<ApiLocation> {
    resolved
        .iter()
        .map(|r| ApiLocation {
            repository_id: r.dump.repository_id,
            commit: r.dump.commit.clone(),
            path: r.path.clone(),
            range: r.range,
        })
        .collect()
}

/// Clamps `[lo, hi)` to the slice bounds; returns `None` when `lo` is
/// already past the end (matching `sliceLocations`'s "return nil" case).
pub fn slice_locations(locations: &[Location], lo: usize, hi: usize) -> &[Location] {
    if lo >= locations.len() {
        return &[];
    }
    let hi = hi.min(locations.len());
    &locations[lo..hi]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundles::Position;
    use chrono::Utc;

    fn dump_fixture(root: &str) -> Dump {
        Dump {
            id: 1,
            commit: "a".repeat(40),
            root: root.to_string(),
            visible_at_tip: true,
            uploaded_at: Utc::now(),
            state: "completed".to_string(),
            failure_summary: None,
            failure_stacktrace: None,
            started_at: None,
            finished_at: None,
            tracing_context: String::new(),
            repository_id: 7,
            indexer: "lsif-go".to_string(),
        }
    }

    fn location(path: &str) -> Location {
        Location {
            dump_id: 1,
            path: path.to_string(),
            range: Range {
                start: Position { line: 1, character: 2 },
                end: Position { line: 1, character: 5 },
            },
        }
    }

    #[test]
    fn prefixes_path_with_dump_root() {
        let dump = dump_fixture("sub/");
        let resolved = resolve_with_dump(&dump, vec![location("a.go")]);
        assert_eq!(resolved[0].path, "sub/a.go");
    }

    #[test]
    fn serialize_projects_repository_coordinates() {
        let dump = dump_fixture("sub/");
        let resolved = resolve_with_dump(&dump, vec![location("a.go")]);
        let api = serialize_locations(&resolved);
        assert_eq!(api[0].repository_id, 7);
        assert_eq!(api[0].path, "sub/a.go");
    }

    #[test]
    fn slice_locations_clamps_to_bounds() {
        let locations = vec![location("a.go"), location("b.go"), location("c.go")];
        assert_eq!(slice_locations(&locations, 1, 10).len(), 2);
        assert!(slice_locations(&locations, 5, 10).is_empty());
    }
}
