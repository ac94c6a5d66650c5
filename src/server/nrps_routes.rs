//! NRPS helper route.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{LtiTool, require_session};
use crate::Error;

/// Routes owned by this module.
pub(super) fn routes() -> Router<Arc<LtiTool>> {
    Router::new().route("/nrps/members", get(list_members))
}

#[derive(Debug, Deserialize)]
struct MembersQuery {
    #[serde(default)]
    ltik: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    offset: Option<u32>,
}

/// `GET /nrps/members?limit&offset`
async fn list_members(
    State(tool): State<Arc<LtiTool>>,
    headers: HeaderMap,
    Query(query): Query<MembersQuery>,
) -> Response {
    let context = match require_session(&tool, &headers, query.ltik.as_deref()) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match tool
        .nrps
        .list_members(&context, query.limit, query.offset)
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(Error::MembershipsUrlMissing) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "nrpsUrlMissing",
                "message": "NRPS URL not found in token."
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "nrpsMembersFailed",
                "message": e.to_string()
            })),
        )
            .into_response(),
    }
}
