//! Serializes/deserializes the multi-phase reference-search state across
//! HTTP round trips (spec §4.F).

use crate::bundles::MonikerData;
use crate::errors::{ApiError, ApiResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// One of the four phases the reference-page resolver walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    SameDump,
    DefinitionMonikers,
    SameRepo,
    RemoteRepo,
}

/// Opaque pagination state (spec §4.F). Unknown/absent fields default to
/// their zero value so a fresh cursor only needs to set what its phase
/// uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub phase: Option<Phase>,
    #[serde(rename = "dumpId", default)]
    pub dump_id: i64,

    // same-dump / definition-monikers
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub line: i32,
    #[serde(default)]
    pub character: i32,
    #[serde(default)]
    pub monikers: Vec<MonikerData>,
    #[serde(rename = "skipResults", default)]
    pub skip_results: i64,

    // same-repo / remote-repo
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "dumpIds", default)]
    pub dump_ids: Vec<i64>,
    #[serde(rename = "totalDumpsWhenBatching", default)]
    pub total_dumps_when_batching: i64,
    #[serde(rename = "skipDumpsWhenBatching", default)]
    pub skip_dumps_when_batching: i64,
    #[serde(rename = "skipDumpsInBatch", default)]
    pub skip_dumps_in_batch: usize,
    #[serde(rename = "skipResultsInDump", default)]
    pub skip_results_in_dump: i64,
}

/// Decodes a raw URL-safe, unpadded base64 cursor. Decode failures are
/// reported as invalid-argument (spec §4.F).
pub fn decode(raw_encoded: &str) -> ApiResult<Cursor> {
    let raw = URL_SAFE_NO_PAD
        .decode(raw_encoded)
        .map_err(|e| ApiError::InvalidArgument(format!("malformed cursor: {e}")))?;

    serde_json::from_slice(&raw)
        .map_err(|e| ApiError::InvalidArgument(format!("malformed cursor: {e}")))
}

/// Encodes a cursor to its wire form.
pub fn encode(cursor: &Cursor) -> String {
    let raw = serde_json::to_vec(cursor).expect("Cursor serialization is infallible");
    URL_SAFE_NO_PAD.encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundles::MonikerData;

    #[test]
    fn round_trips_minimal_cursor() {
        let cursor = Cursor {
            phase: Some(Phase::SameDump),
            dump_id: 42,
            path: "src/main.rs".to_string(),
            line: 10,
            character: 4,
            skip_results: 2,
            ..Default::default()
        };

        let decoded = decode(&encode(&cursor)).unwrap();
        assert_eq!(decoded.dump_id, cursor.dump_id);
        assert_eq!(decoded.phase, cursor.phase);
        assert_eq!(decoded.path, cursor.path);
        assert_eq!(decoded.skip_results, cursor.skip_results);
    }

    #[test]
    fn round_trips_fully_populated_cursor() {
        let cursor = Cursor {
            phase: Some(Phase::RemoteRepo),
            dump_id: 7,
            path: "a.go".to_string(),
            line: 1,
            character: 1,
            monikers: vec![MonikerData {
                kind: "import".to_string(),
                scheme: "gomod".to_string(),
                identifier: "pad".to_string(),
                package_information_id: "pid-1".to_string(),
            }],
            skip_results: 3,
            scheme: "gomod".to_string(),
            identifier: "pad".to_string(),
            name: "leftpad".to_string(),
            version: "0.1.0".to_string(),
            dump_ids: vec![1, 2, 3],
            total_dumps_when_batching: 10,
            skip_dumps_when_batching: 6,
            skip_dumps_in_batch: 2,
            skip_results_in_dump: 5,
        };

        let decoded = decode(&encode(&cursor)).unwrap();
        assert_eq!(decoded.dump_ids, cursor.dump_ids);
        assert_eq!(decoded.monikers.len(), 1);
        assert_eq!(decoded.monikers[0].identifier, "pad");
        assert_eq!(decoded.skip_dumps_in_batch, 2);
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(decode("not-valid-base64!!!").is_err());
    }

    #[test]
    fn decode_rejects_valid_base64_invalid_json() {
        let encoded = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(decode(&encoded).is_err());
    }
}
