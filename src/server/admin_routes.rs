//! Admin/registration API — CRUD over tool registrations and persisted
//! deep-linking selections, consumed by the launch-form UI.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::json;

use super::{LtiTool, error_response};
use crate::registry::NewToolRegistration;

/// Routes owned by this module.
pub(super) fn routes() -> Router<Arc<LtiTool>> {
    Router::new()
        .route("/api/tools", get(list_tools).post(create_tool))
        .route("/api/tools/{id}", get(get_tool).delete(delete_tool))
        .route("/api/deeplink/selections", get(list_selections))
        .route("/api/deeplink/selections/{id}", delete(delete_selection))
}

/// `GET /api/tools`
async fn list_tools(State(tool): State<Arc<LtiTool>>) -> Response {
    Json(tool.registrations.list_tools()).into_response()
}

/// `POST /api/tools`
async fn create_tool(
    State(tool): State<Arc<LtiTool>>,
    Json(new): Json<NewToolRegistration>,
) -> Response {
    match tool.registrations.create_tool(new) {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/tools/{id}`
async fn get_tool(State(tool): State<Arc<LtiTool>>, Path(id): Path<String>) -> Response {
    match tool.registrations.get_tool(&id) {
        Ok(registration) => Json(registration).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `DELETE /api/tools/{id}`
async fn delete_tool(State(tool): State<Arc<LtiTool>>, Path(id): Path<String>) -> Response {
    match tool.registrations.delete_tool(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "unknownTool", "message": "Tool not found"})),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/deeplink/selections`
async fn list_selections(State(tool): State<Arc<LtiTool>>) -> Response {
    Json(tool.selections.list()).into_response()
}

/// `DELETE /api/deeplink/selections/{id}`
async fn delete_selection(State(tool): State<Arc<LtiTool>>, Path(id): Path<String>) -> Response {
    match tool.selections.delete(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "unknownSelection", "message": "Selection not found"})),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
