//! End-to-end launch protocol tests.
//!
//! Drives the real router with `tower::ServiceExt::oneshot` against a stub
//! platform (JWKS, token endpoint, AGS, NRPS) served on an ephemeral port.
//! The platform key pair is a checked-in test fixture so tokens carry real
//! RS256 signatures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tower::ServiceExt;

use lti_tool::config::Config;
use lti_tool::launch::context::{
    CLAIM_AGS_ENDPOINT, CLAIM_DEPLOYMENT_ID, CLAIM_DL_CONTENT_ITEMS, CLAIM_DL_SETTINGS,
    CLAIM_MESSAGE_TYPE, CLAIM_NRPS, CLAIM_RESOURCE_LINK, CLAIM_ROLES, CLAIM_VERSION,
};
use lti_tool::registry::PlatformRegistration;
use lti_tool::server::LtiTool;

const PLATFORM_KEY_PEM: &str = include_str!("fixtures/platform_key.pem");
const PLATFORM_JWKS: &str = include_str!("fixtures/platform_jwks.json");
const ISSUER: &str = "https://platform.example";
const CLIENT_ID: &str = "c1";

// ── Stub platform ─────────────────────────────────────────────────────────

#[derive(Default)]
struct StubState {
    line_items: Mutex<Vec<Value>>,
    next_id: AtomicUsize,
    deleted_paths: Mutex<Vec<String>>,
    score_posts: AtomicUsize,
}

async fn stub_jwks() -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        PLATFORM_JWKS.to_string(),
    )
        .into_response()
}

async fn stub_token() -> Json<Value> {
    Json(json!({
        "access_token": "stub-bearer",
        "token_type": "Bearer",
        "expires_in": 3600
    }))
}

async fn stub_list_line_items(State(state): State<Arc<StubState>>) -> Json<Value> {
    Json(Value::Array(state.line_items.lock().clone()))
}

async fn stub_create_line_item(State(state): State<Arc<StubState>>, body: String) -> Response {
    let mut item: Value = serde_json::from_str(&body).unwrap();
    let n = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    item["id"] = json!(format!("https://platform.example/lineitems/{n}"));
    state.line_items.lock().push(item.clone());
    (StatusCode::CREATED, Json(item)).into_response()
}

async fn stub_delete_line_item(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.deleted_paths.lock().push(format!("/lineitems/{id}"));
    StatusCode::NO_CONTENT
}

async fn stub_post_score(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.score_posts.fetch_add(1, Ordering::SeqCst);
    Json(json!({"resultUrl": "https://platform.example/results/1"}))
}

async fn stub_results() -> Json<Value> {
    Json(json!([{"id": "r1", "resultScore": 8.0, "resultMaximum": 10.0}]))
}

async fn stub_members() -> Response {
    (
        [(
            header::LINK,
            r#"<https://platform.example/members?offset=2&limit=2>; rel="next""#,
        )],
        Json(json!({
            "id": "https://platform.example/members",
            "context": {"id": "ctx-1", "title": "Algebra"},
            "members": [
                {"user_id": "u1", "name": "Ada Lovelace", "roles": []},
                {"user_id": "u2", "name": "Alan Turing", "roles": []}
            ]
        })),
    )
        .into_response()
}

async fn start_stub_platform(state: Arc<StubState>) -> String {
    let app = Router::new()
        .route("/jwks", get(stub_jwks))
        .route("/token", post(stub_token))
        .route("/lineitems", get(stub_list_line_items).post(stub_create_line_item))
        .route("/lineitems/{id}", delete(stub_delete_line_item))
        .route("/lineitems/{id}/scores", post(stub_post_score))
        .route("/lineitems/{id}/results", get(stub_results))
        .route("/members", get(stub_members))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Harness ───────────────────────────────────────────────────────────────

struct Harness {
    tool: Arc<LtiTool>,
    app: Router,
    stub_base: String,
    stub: Arc<StubState>,
    _data_dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let stub = Arc::new(StubState::default());
    let stub_base = start_stub_platform(Arc::clone(&stub)).await;

    let data_dir = tempfile::tempdir().unwrap();
    // Seed the tool key from the fixture so the harness skips RSA keygen.
    std::fs::write(data_dir.path().join("keypair.pem"), PLATFORM_KEY_PEM).unwrap();
    let mut config = Config::default();
    config.storage.data_dir = data_dir.path().to_path_buf();
    config.server.public_url = Some("https://tool.example".to_string());
    config.platforms = vec![PlatformRegistration {
        issuer: ISSUER.to_string(),
        client_id: CLIENT_ID.to_string(),
        auth_endpoint: format!("{ISSUER}/api/oidc/auth"),
        token_endpoint: format!("{stub_base}/token"),
        jwks_url: format!("{stub_base}/jwks"),
        deployment_ids: Vec::new(),
    }];

    let tool = LtiTool::new(config).unwrap();
    let app = tool.router();
    Harness {
        tool,
        app,
        stub_base,
        stub,
        _data_dir: data_dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

async fn get_path(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_form(
    app: &Router,
    uri: &str,
    fields: &[(&str, &str)],
) -> (StatusCode, axum::http::HeaderMap, String) {
    let body = serde_urlencoded::to_string(fields).unwrap();
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

fn query_param(url: &str, name: &str) -> String {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| panic!("missing query param {name} in {url}"))
}

fn extract_between<'a>(haystack: &'a str, prefix: &str, suffix: &str) -> &'a str {
    let start = haystack.find(prefix).expect("marker prefix not found") + prefix.len();
    let rest = &haystack[start..];
    let end = rest.find(suffix).expect("marker suffix not found");
    &rest[..end]
}

fn sign_id_token(claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(PLATFORM_KEY_PEM.as_bytes()).unwrap();
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key-1".to_string());
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn resource_claims(harness: &Harness, nonce: &str) -> Value {
    let now = unix_now();
    json!({
        "iss": ISSUER,
        "sub": "user-1",
        "aud": CLIENT_ID,
        "iat": now,
        "exp": now + 300,
        "nonce": nonce,
        "name": "Ada Lovelace",
        CLAIM_MESSAGE_TYPE: "LtiResourceLinkRequest",
        CLAIM_VERSION: "1.3.0",
        CLAIM_DEPLOYMENT_ID: "dep-1",
        CLAIM_ROLES: ["http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor"],
        CLAIM_RESOURCE_LINK: {"id": "rl1", "title": "Quiz"},
        CLAIM_AGS_ENDPOINT: {
            "lineitems": format!("{}/lineitems", harness.stub_base),
            "scope": [
                "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem",
                "https://purl.imsglobal.org/spec/lti-ags/scope/result.readonly",
                "https://purl.imsglobal.org/spec/lti-ags/scope/score"
            ]
        },
        CLAIM_NRPS: {
            "context_memberships_url": format!("{}/members", harness.stub_base),
            "service_versions": ["2.0"]
        }
    })
}

/// Run the login leg and return the `(state, nonce)` pair from the redirect.
async fn login(harness: &Harness) -> (String, String) {
    let uri = format!(
        "/login?iss={}&login_hint=u1&client_id={}",
        urlencoded(ISSUER),
        CLIENT_ID
    );
    let (status, headers, _) = get_path(&harness.app, &uri).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers[header::LOCATION].to_str().unwrap().to_string();
    (
        query_param(&location, "state"),
        query_param(&location, "nonce"),
    )
}

fn urlencoded(value: &str) -> String {
    serde_urlencoded::to_string([("x", value)])
        .unwrap()
        .trim_start_matches("x=")
        .to_string()
}

/// Login + signed launch; returns the session token from the rendered page.
async fn full_launch(harness: &Harness) -> String {
    let (state, nonce) = login(harness).await;
    let id_token = sign_id_token(&resource_claims(harness, &nonce));
    let (status, _, body) = post_form(
        &harness.app,
        "/launch",
        &[("id_token", &id_token), ("state", &state)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "launch failed: {body}");
    extract_between(&body, r#"<code id="ltik">"#, "</code>").to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn jwks_endpoint_serves_tool_keys() {
    let harness = harness().await;
    let (status, _, body) = get_path(&harness.app, "/.well-known/jwks.json").await;
    assert_eq!(status, StatusCode::OK);

    let jwks: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(jwks["keys"][0]["kty"], "RSA");
    assert_eq!(jwks["keys"][0]["alg"], "RS256");
    assert!(!jwks["keys"][0]["kid"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn login_redirect_carries_oidc_params_and_records_state() {
    let harness = harness().await;
    assert!(harness.tool.launch_states.is_empty());

    let uri = format!("/login?iss={}&login_hint=u1&client_id=c1", urlencoded(ISSUER));
    let (status, headers, _) = get_path(&harness.app, &uri).await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{ISSUER}/api/oidc/auth")));
    assert_eq!(query_param(location, "response_type"), "id_token");
    assert_eq!(query_param(location, "scope"), "openid");
    assert_eq!(query_param(location, "prompt"), "none");
    assert_eq!(query_param(location, "response_mode"), "form_post");
    assert_eq!(
        query_param(location, "redirect_uri"),
        "https://tool.example/launch"
    );

    let state = query_param(location, "state");
    assert!(harness.tool.launch_states.contains(&state));
    assert_eq!(harness.tool.launch_states.len(), 1);
}

#[tokio::test]
async fn login_with_unknown_issuer_is_rejected() {
    let harness = harness().await;
    let uri = format!("/login?iss={}&login_hint=u1", urlencoded("https://rogue.example"));
    let (status, _, body) = get_path(&harness.app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "unknownPlatform");
}

#[tokio::test]
async fn full_launch_renders_session_page() {
    let harness = harness().await;
    let (state, nonce) = login(&harness).await;
    let id_token = sign_id_token(&resource_claims(&harness, &nonce));

    let (status, _, body) = post_form(
        &harness.app,
        "/launch",
        &[("id_token", &id_token), ("state", &state)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("user-1"));
    assert!(body.contains("rl1"));
    assert!(body.contains(r#"<code id="ltik">"#));
}

#[tokio::test]
async fn launch_state_is_consumable_exactly_once() {
    let harness = harness().await;
    let (state, nonce) = login(&harness).await;
    let id_token = sign_id_token(&resource_claims(&harness, &nonce));

    let (first, _, _) = post_form(
        &harness.app,
        "/launch",
        &[("id_token", &id_token), ("state", &state)],
    )
    .await;
    assert_eq!(first, StatusCode::OK);

    // Replay: same state, same perfectly valid token.
    let (second, _, body) = post_form(
        &harness.app,
        "/launch",
        &[("id_token", &id_token), ("state", &state)],
    )
    .await;
    assert_eq!(second, StatusCode::UNAUTHORIZED);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "launchRejected");
}

#[tokio::test]
async fn tampered_tokens_are_rejected_individually() {
    let harness = harness().await;

    // Tampered signature: valid claims, one signature char flipped.
    {
        let (state, nonce) = login(&harness).await;
        let id_token = sign_id_token(&resource_claims(&harness, &nonce));
        let (head, signature) = id_token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = signature.chars().collect();
        sig[5] = if sig[5] == 'A' { 'B' } else { 'A' };
        let id_token = format!("{head}.{}", sig.into_iter().collect::<String>());
        let (status, _, _) = post_form(
            &harness.app,
            "/launch",
            &[("id_token", &id_token), ("state", &state)],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "tampered signature");
    }

    // Wrong audience.
    {
        let (state, nonce) = login(&harness).await;
        let mut claims = resource_claims(&harness, &nonce);
        claims["aud"] = json!("someone-else");
        let id_token = sign_id_token(&claims);
        let (status, _, _) = post_form(
            &harness.app,
            "/launch",
            &[("id_token", &id_token), ("state", &state)],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "wrong aud");
    }

    // Wrong nonce.
    {
        let (state, _) = login(&harness).await;
        let claims = resource_claims(&harness, "not-the-nonce");
        let id_token = sign_id_token(&claims);
        let (status, _, _) = post_form(
            &harness.app,
            "/launch",
            &[("id_token", &id_token), ("state", &state)],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "wrong nonce");
    }

    // Expired token (beyond the 5-minute skew).
    {
        let (state, nonce) = login(&harness).await;
        let mut claims = resource_claims(&harness, &nonce);
        let past = unix_now() - 7200;
        claims["iat"] = json!(past);
        claims["exp"] = json!(past + 300);
        let id_token = sign_id_token(&claims);
        let (status, _, _) = post_form(
            &harness.app,
            "/launch",
            &[("id_token", &id_token), ("state", &state)],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "expired token");
    }
}

#[tokio::test]
async fn ags_routes_require_launch_uniformly() {
    let harness = harness().await;
    let routes: Vec<(&str, &str)> = vec![
        ("GET", "/ags/lineitems"),
        ("POST", "/ags/lineitems?label=x&scoreMaximum=1"),
        ("DELETE", "/ags/lineitems/42"),
        ("POST", "/ags/lineitems/42/scores?scoreGiven=1&scoreMaximum=1"),
        ("GET", "/ags/lineitems/42/results"),
    ];

    for (method, uri) in routes {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&harness.app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        let error: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error["error"], "noLaunch", "{method} {uri}");
    }
}

#[tokio::test]
async fn created_line_item_appears_in_listing() {
    let harness = harness().await;
    let ltik = full_launch(&harness).await;

    let uri = format!(
        "/ags/lineitems?ltik={ltik}&label=Demo&scoreMaximum=10&resourceLinkId=rl1"
    );
    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let created: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(created["label"], "Demo");

    let (status, _, body) =
        get_path(&harness.app, &format!("/ags/lineitems?ltik={ltik}&resourceLinkId=rl1")).await;
    assert_eq!(status, StatusCode::OK);
    let items: Value = serde_json::from_str(&body).unwrap();
    let found = items
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["label"] == "Demo" && i["scoreMaximum"] == 10.0);
    assert!(found, "created item missing from listing: {items}");
}

#[tokio::test]
async fn delete_resolves_bare_id_against_base_and_urls_verbatim() {
    let harness = harness().await;
    let ltik = full_launch(&harness).await;

    // Bare id joins the advertised line-items base.
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/ags/lineitems/42?ltik={ltik}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        harness.stub.deleted_paths.lock().as_slice(),
        ["/lineitems/42"]
    );

    // A fully-qualified URL is used unchanged.
    let absolute = format!("{}/lineitems/99", harness.stub_base);
    let request = Request::builder()
        .method("DELETE")
        .uri(format!(
            "/ags/lineitems/{}?ltik={ltik}",
            urlencoded(&absolute)
        ))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        harness.stub.deleted_paths.lock().last().unwrap(),
        "/lineitems/99"
    );
}

#[tokio::test]
async fn zero_score_maximum_is_rejected_before_upstream() {
    let harness = harness().await;
    let ltik = full_launch(&harness).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!(
            "/ags/lineitems/42/scores?ltik={ltik}&scoreGiven=0&scoreMaximum=0"
        ))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "invalidScoreMaximum");
    assert_eq!(harness.stub.score_posts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bogus_progress_enum_is_rejected_before_upstream() {
    let harness = harness().await;
    let ltik = full_launch(&harness).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!(
            "/ags/lineitems/42/scores?ltik={ltik}&scoreGiven=1&scoreMaximum=1&activityProgress=Done"
        ))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "invalidProgress");
    assert_eq!(harness.stub.score_posts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn score_submission_reaches_the_platform() {
    let harness = harness().await;
    let ltik = full_launch(&harness).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!(
            "/ags/lineitems/42/scores?ltik={ltik}&scoreGiven=8&scoreMaximum=10&activityProgress=Completed&gradingProgress=FullyGraded"
        ))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.stub.score_posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn nrps_members_paginates_and_surfaces_next() {
    let harness = harness().await;
    let ltik = full_launch(&harness).await;

    let (status, _, body) =
        get_path(&harness.app, &format!("/nrps/members?ltik={ltik}&limit=2&offset=0")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let page: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(page["members"].as_array().unwrap().len(), 2);
    assert_eq!(
        page["next"],
        "https://platform.example/members?offset=2&limit=2"
    );
}

#[tokio::test]
async fn nrps_without_claim_is_a_hard_failure() {
    let harness = harness().await;
    let (state, nonce) = login(&harness).await;
    let mut claims = resource_claims(&harness, &nonce);
    claims.as_object_mut().unwrap().remove(CLAIM_NRPS);
    let id_token = sign_id_token(&claims);
    let (status, _, body) = post_form(
        &harness.app,
        "/launch",
        &[("id_token", &id_token), ("state", &state)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ltik = extract_between(&body, r#"<code id="ltik">"#, "</code>").to_string();

    let (status, _, body) =
        get_path(&harness.app, &format!("/nrps/members?ltik={ltik}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "nrpsUrlMissing");
}

#[tokio::test]
async fn deep_linking_round_trip() {
    let harness = harness().await;
    let (state, nonce) = login(&harness).await;

    let mut claims = resource_claims(&harness, &nonce);
    claims[CLAIM_MESSAGE_TYPE] = json!("LtiDeepLinkingRequest");
    claims[CLAIM_DL_SETTINGS] = json!({
        "deep_link_return_url": format!("{ISSUER}/deeplink/return"),
        "data": "opaque-data",
        "accept_types": ["ltiResourceLink"],
        "accept_multiple": false
    });
    let id_token = sign_id_token(&claims);

    // Launch renders the picker.
    let (status, _, body) = post_form(
        &harness.app,
        "/launch",
        &[("id_token", &id_token), ("state", &state)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Select content"));
    let ltik = extract_between(&body, r#"name="ltik" value=""#, "\"").to_string();

    // Submission auto-posts the signed response to the return URL.
    let (status, _, body) = post_form(
        &harness.app,
        "/deeplink/submit",
        &[
            ("ltik", ltik.as_str()),
            ("title", "Sample Content"),
            ("url", "https://tool.example/launch"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&format!(r#"action="{ISSUER}/deeplink/return""#)));
    assert!(body.contains(r#"name="JWT""#));

    // The posted JWT carries the content items and echoes the data.
    let jwt = extract_between(&body, r#"name="JWT" value=""#, "\"").to_string();
    let payload = jwt.split('.').nth(1).unwrap();
    let decoded = base64_url_decode(payload);
    let response_claims: Value = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(
        response_claims[CLAIM_MESSAGE_TYPE],
        "LtiDeepLinkingResponse"
    );
    assert_eq!(
        response_claims["https://purl.imsglobal.org/spec/lti-dl/claim/data"],
        "opaque-data"
    );
    let items = response_claims[CLAIM_DL_CONTENT_ITEMS].as_array().unwrap();
    assert_eq!(items[0]["title"], "Sample Content");

    // The selection was persisted for the admin API.
    let (status, _, body) = get_path(&harness.app, "/api/deeplink/selections").await;
    assert_eq!(status, StatusCode::OK);
    let selections: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(selections.as_array().unwrap().len(), 1);
    assert_eq!(selections[0]["title"], "Sample Content");
}

#[tokio::test]
async fn admin_tools_crud() {
    let harness = harness().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/tools")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "demo tool",
                "clientId": "tool-client",
                "loginInitiationUrl": "https://tool.example/login",
                "targetLinkUrl": "https://tool.example/launch",
                "jwksUrl": "https://tool.example/.well-known/jwks.json"
            })
            .to_string(),
        ))
        .unwrap();
    let (status, _, body) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let created: Value = serde_json::from_str(&body).unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _, body) = get_path(&harness.app, "/api/tools").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap().as_array().unwrap().len(), 1);

    let (status, _, _) = get_path(&harness.app, &format!("/api/tools/{id}")).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/tools/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&harness.app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = get_path(&harness.app, &format!("/api/tools/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthz_is_public() {
    let harness = harness().await;
    let (status, _, body) = get_path(&harness.app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

fn base64_url_decode(value: &str) -> Vec<u8> {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(value)
        .unwrap()
}
