//! AGS helper routes.
//!
//! Thin wrappers over [`AgsClient`](crate::services::AgsClient): resolve
//! the launch session, default missing parameters from the launch context,
//! relay platform JSON on success, and answer `{"error":"noLaunch"}` with
//! 401 — uniformly — when no validated launch backs the request.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{LtiTool, error_response, require_session};
use crate::services::{ActivityProgress, GradingProgress};

/// Routes owned by this module.
pub(super) fn routes() -> Router<Arc<LtiTool>> {
    Router::new()
        .route("/ags/lineitems", get(list_line_items).post(create_line_item))
        .route("/ags/lineitems/{id}", delete(delete_line_item))
        .route("/ags/lineitems/{id}/scores", post(submit_score))
        .route("/ags/lineitems/{id}/results", get(get_results))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    ltik: Option<String>,
    #[serde(rename = "resourceLinkId", default)]
    resource_link_id: Option<String>,
}

/// `GET /ags/lineitems[?resourceLinkId]`
async fn list_line_items(
    State(tool): State<Arc<LtiTool>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let context = match require_session(&tool, &headers, query.ltik.as_deref()) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let resource_link_id = query
        .resource_link_id
        .or_else(|| context.resource_link_id().map(str::to_string));
    match tool
        .ags
        .list_line_items(&context, resource_link_id.as_deref())
        .await
    {
        Ok(items) => Json(items).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct CreateQuery {
    #[serde(default)]
    ltik: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "scoreMaximum", default)]
    score_maximum: Option<f64>,
    #[serde(rename = "resourceLinkId", default)]
    resource_link_id: Option<String>,
}

/// `POST /ags/lineitems?label&scoreMaximum&resourceLinkId`
async fn create_line_item(
    State(tool): State<Arc<LtiTool>>,
    headers: HeaderMap,
    Query(query): Query<CreateQuery>,
) -> Response {
    let context = match require_session(&tool, &headers, query.ltik.as_deref()) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let label = query.label.unwrap_or_else(|| "Demo Item".to_string());
    let score_maximum = query.score_maximum.unwrap_or(1.0);
    let resource_link_id = query
        .resource_link_id
        .or_else(|| context.resource_link_id().map(str::to_string));

    match tool
        .ags
        .create_line_item(&context, &label, score_maximum, resource_link_id.as_deref())
        .await
    {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(default)]
    ltik: Option<String>,
}

/// `DELETE /ags/lineitems/{id}` — bare id or fully-qualified URL.
async fn delete_line_item(
    State(tool): State<Arc<LtiTool>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let context = match require_session(&tool, &headers, query.ltik.as_deref()) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match tool.ags.delete_line_item(&context, &id).await {
        Ok(()) => Json(json!({"deleted": true})).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct ScoreQuery {
    #[serde(default)]
    ltik: Option<String>,
    #[serde(rename = "scoreGiven", default)]
    score_given: Option<f64>,
    #[serde(rename = "scoreMaximum", default)]
    score_maximum: Option<f64>,
    #[serde(rename = "activityProgress", default)]
    activity_progress: Option<String>,
    #[serde(rename = "gradingProgress", default)]
    grading_progress: Option<String>,
}

/// `POST /ags/lineitems/{id}/scores?scoreGiven&scoreMaximum&activityProgress&gradingProgress`
async fn submit_score(
    State(tool): State<Arc<LtiTool>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ScoreQuery>,
) -> Response {
    let context = match require_session(&tool, &headers, query.ltik.as_deref()) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let activity_progress: ActivityProgress = match query
        .activity_progress
        .as_deref()
        .unwrap_or("Completed")
        .parse()
    {
        Ok(progress) => progress,
        Err(e) => return error_response(&e),
    };
    let grading_progress: GradingProgress = match query
        .grading_progress
        .as_deref()
        .unwrap_or("FullyGraded")
        .parse()
    {
        Ok(progress) => progress,
        Err(e) => return error_response(&e),
    };

    match tool
        .ags
        .submit_score(
            &context,
            &id,
            query.score_given.unwrap_or(1.0),
            query.score_maximum.unwrap_or(1.0),
            activity_progress,
            grading_progress,
            None,
        )
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /ags/lineitems/{id}/results`
async fn get_results(
    State(tool): State<Arc<LtiTool>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let context = match require_session(&tool, &headers, query.ltik.as_deref()) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match tool.ags.get_scores(&context, &id).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => error_response(&e),
    }
}
