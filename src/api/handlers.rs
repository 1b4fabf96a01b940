//! Request handlers for the four query-time routes (spec §6).

use super::server::ApiState;
use crate::bundles::{Position, Range};
use crate::cursor::{self, Cursor};
use crate::errors::{ApiError, ApiResult};
use crate::locations::{ApiLocation, serialize_locations};
use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct DefinitionsQuery {
    pub path: String,
    pub line: i32,
    pub character: i32,
    #[serde(rename = "uploadId")]
    pub upload_id: i64,
}

pub async fn definitions(
    State(state): State<ApiState>,
    Query(q): Query<DefinitionsQuery>,
) -> ApiResult<Json<Vec<ApiLocation>>> {
    let cancel = state.shutdown.child_token();
    let position = Position { line: q.line, character: q.character };
    let resolved = state
        .resolvers
        .definitions(&q.path, position, q.upload_id, &cancel)
        .await?;
    Ok(Json(serialize_locations(&resolved)))
}

#[derive(Debug, Deserialize)]
pub struct HoverQuery {
    pub path: String,
    pub line: i32,
    pub character: i32,
    #[serde(rename = "uploadId")]
    pub upload_id: i64,
}

#[derive(Debug, Serialize)]
pub struct HoverResponse {
    pub text: String,
    pub range: Range,
}

pub async fn hover(
    State(state): State<ApiState>,
    Query(q): Query<HoverQuery>,
) -> ApiResult<Json<Option<HoverResponse>>> {
    let cancel = state.shutdown.child_token();
    let position = Position { line: q.line, character: q.character };
    let result = state
        .resolvers
        .hover(&q.path, position, q.upload_id, &cancel)
        .await?;
    Ok(Json(result.map(|(text, range)| HoverResponse { text, range })))
}

#[derive(Debug, Deserialize)]
pub struct ReferencesQuery {
    #[serde(rename = "repositoryId")]
    pub repository_id: i64,
    pub commit: String,
    pub path: Option<String>,
    pub line: Option<i32>,
    pub character: Option<i32>,
    #[serde(rename = "uploadId")]
    pub upload_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReferencesResponse {
    pub locations: Vec<ApiLocation>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

pub async fn references(
    State(state): State<ApiState>,
    Query(q): Query<ReferencesQuery>,
) -> ApiResult<Json<ReferencesResponse>> {
    let cancel = state.shutdown.child_token();

    let start_cursor = match q.cursor {
        Some(raw) => cursor::decode(&raw)?,
        None => {
            let (path, line, character, upload_id) = required_fresh_page_params(&q)?;
            state
                .resolvers
                .start_reference_cursor(
                    path,
                    Position { line, character },
                    upload_id,
                    &cancel,
                )
                .await?
        }
    };

    let (resolved, next) = state
        .resolvers
        .reference_page(q.repository_id, &q.commit, q.limit, start_cursor, &cancel)
        .await?;

    Ok(Json(ReferencesResponse {
        locations: serialize_locations(&resolved),
        next_cursor: next.as_ref().map(cursor::encode),
    }))
}

/// A fresh (non-cursor) `/references` request must carry the position that
/// seeds the walk.
fn required_fresh_page_params(q: &ReferencesQuery) -> ApiResult<(&str, i32, i32, i64)> {
    let path = q
        .path
        .as_deref()
        .ok_or_else(|| ApiError::InvalidArgument("missing path".to_string()))?;
    let line = q
        .line
        .ok_or_else(|| ApiError::InvalidArgument("missing line".to_string()))?;
    let character = q
        .character
        .ok_or_else(|| ApiError::InvalidArgument("missing character".to_string()))?;
    let upload_id = q
        .upload_id
        .ok_or_else(|| ApiError::InvalidArgument("missing uploadId".to_string()))?;
    Ok((path, line, character, upload_id))
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    #[serde(rename = "repositoryId")]
    pub repository_id: i64,
    pub commit: String,
    pub path: String,
}

pub async fn exists(
    State(state): State<ApiState>,
    Query(q): Query<ExistsQuery>,
) -> ApiResult<Json<Vec<crate::store::Dump>>> {
    let dumps = state
        .resolvers
        .store
        .find_closest_dumps(q.repository_id, &q.commit, &q.path)
        .await?;
    Ok(Json(dumps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_requires_position_and_upload_id() {
        let q = ReferencesQuery {
            repository_id: 1,
            commit: "a".repeat(40),
            path: None,
            line: None,
            character: None,
            upload_id: None,
            limit: 100,
            cursor: None,
        };
        assert!(required_fresh_page_params(&q).is_err());
    }
}
