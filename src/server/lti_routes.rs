//! Core LTI endpoints: key set, login initiation, launch, deep-link submit.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::{LtiTool, error_response, pages};
use crate::deep_linking::{ContentItem, auto_submit_form};
use crate::launch::{LaunchError, LoginRequest, initiate};
use crate::store::DeepLinkingSelection;
use crate::Error;

/// Routes owned by this module.
pub(super) fn routes() -> Router<Arc<LtiTool>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/.well-known/jwks.json", get(jwks))
        .route("/login", get(login_get).post(login_post))
        .route("/launch", post(launch))
        .route("/deeplink/submit", post(deeplink_submit))
}

async fn healthz() -> &'static str {
    "ok"
}

/// `GET /.well-known/jwks.json` — the tool's public verification keys.
async fn jwks(State(tool): State<Arc<LtiTool>>) -> Json<crate::keys::Jwks> {
    Json(tool.keys.public_jwks().clone())
}

/// `GET /login` — OIDC third-party initiated login.
async fn login_get(
    State(tool): State<Arc<LtiTool>>,
    Query(request): Query<LoginRequest>,
) -> Response {
    login(&tool, &request)
}

/// `POST /login` — platforms may also post the initiation parameters.
async fn login_post(
    State(tool): State<Arc<LtiTool>>,
    Form(request): Form<LoginRequest>,
) -> Response {
    login(&tool, &request)
}

fn login(tool: &LtiTool, request: &LoginRequest) -> Response {
    match initiate(
        &tool.registrations,
        &tool.launch_states,
        &tool.config.launch_url(),
        request,
    ) {
        Ok(redirect) => Redirect::to(&redirect).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Launch form post from the platform.
#[derive(Debug, Deserialize)]
struct LaunchForm {
    id_token: String,
    state: String,
}

/// `POST /launch` — validate the id_token, bind a session, render the
/// session page or the deep-linking picker.
async fn launch(State(tool): State<Arc<LtiTool>>, Form(form): Form<LaunchForm>) -> Response {
    let context = match tool.validator.validate(&form.id_token, &form.state).await {
        Ok(context) => context,
        Err(e) => {
            // Full detail stays server-side; the platform only sees a
            // generic rejection.
            warn!(error = %e, "Launch validation failed");
            return launch_rejection(&e);
        }
    };

    let deep_linking = context.is_deep_linking();
    let ltik = tool.sessions.create(context.clone());
    let html = if deep_linking {
        let default_url = format!("{}/launch", tool.config.public_base());
        pages::picker_page(&context, &ltik, &default_url)
    } else {
        pages::session_page(&context, &ltik)
    };
    Html(html).into_response()
}

fn launch_rejection(err: &LaunchError) -> Response {
    let status = match err {
        LaunchError::UnknownIssuer(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNAUTHORIZED,
    };
    (
        status,
        Json(json!({
            "error": "launchRejected",
            "message": "Launch verification failed. Re-launch the tool."
        })),
    )
        .into_response()
}

/// Picker submission.
#[derive(Debug, Deserialize)]
struct SubmitForm {
    ltik: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// `POST /deeplink/submit` — build and sign the content-items response,
/// persist the selection, and auto-post the JWT back to the platform.
async fn deeplink_submit(
    State(tool): State<Arc<LtiTool>>,
    Form(form): Form<SubmitForm>,
) -> Response {
    let Some(context) = tool.sessions.resolve(&form.ltik) else {
        return error_response(&Error::NoActiveLaunch);
    };

    let title = form
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Sample Content".to_string());
    let url = form
        .url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("{}/launch", tool.config.public_base()));
    let mut item = ContentItem::resource_link(title, url);
    item.text = form.text.filter(|t| !t.is_empty());

    let return_url = match tool.deep_linking.return_url(&context) {
        Ok(url) => url.to_string(),
        Err(e) => return error_response(&e),
    };
    let jwt = match tool
        .deep_linking
        .response_jwt(&context, std::slice::from_ref(&item))
    {
        Ok(jwt) => jwt,
        Err(e) => return error_response(&e),
    };

    let selection = DeepLinkingSelection {
        id: Uuid::new_v4().to_string(),
        tool_client_id: context.client_id.clone(),
        title: item.title.clone(),
        url: item.url.clone(),
        content_item_json: serde_json::to_value(&item).unwrap_or_default(),
        created_at: Utc::now(),
    };
    if let Err(e) = tool.selections.insert(selection) {
        // The response to the platform still goes out; the record is
        // operator-visible state, not part of the protocol.
        warn!(error = %e, "Failed to persist deep-linking selection");
    }

    Html(auto_submit_form(&return_url, &jwt)).into_response()
}
