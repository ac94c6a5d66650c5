//! Deep linking — content selection round trips.
//!
//! On an `LtiDeepLinkingRequest` launch the tool shows a picker; on
//! submission it builds the `LtiDeepLinkingResponse` JWT (the only outbound
//! signed assertion this tool authors — everything else it only verifies),
//! and auto-submits it back to the platform's return URL as form field
//! `JWT`. Content items are emitted as structured JSON so the selection
//! store can persist them verbatim.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::keys::KeyManager;
use crate::launch::LaunchContext;
use crate::launch::context::{
    CLAIM_DEPLOYMENT_ID, CLAIM_DL_CONTENT_ITEMS, CLAIM_DL_DATA, CLAIM_MESSAGE_TYPE, CLAIM_VERSION,
};
use crate::launch::state::random_token;
use crate::{Error, Result};

/// Lifetime of a deep-linking response JWT.
const RESPONSE_TTL: Duration = Duration::from_secs(300);

/// A selectable content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Item type, e.g. `ltiResourceLink`
    #[serde(rename = "type")]
    pub item_type: String,
    /// Display title
    pub title: String,
    /// Launch URL
    pub url: String,
    /// Optional descriptive text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Optional AGS line item to create alongside the link
    #[serde(rename = "lineItem", skip_serializing_if = "Option::is_none")]
    pub line_item: Option<serde_json::Value>,
}

impl ContentItem {
    /// An `ltiResourceLink` item pointing at `url`.
    #[must_use]
    pub fn resource_link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            item_type: "ltiResourceLink".to_string(),
            title: title.into(),
            url: url.into(),
            text: None,
            line_item: None,
        }
    }
}

/// Builds and signs deep-linking responses.
pub struct DeepLinkingEngine {
    keys: Arc<KeyManager>,
}

impl DeepLinkingEngine {
    /// Create an engine signing with the tool's key.
    #[must_use]
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Build the signed `LtiDeepLinkingResponse` JWT for `items`.
    ///
    /// The platform's `data` from the launch settings is echoed back; the
    /// message is addressed tool → platform, so `iss` is the client id and
    /// `aud` the platform issuer.
    pub fn response_jwt(&self, context: &LaunchContext, items: &[ContentItem]) -> Result<String> {
        let settings = context
            .deep_linking
            .as_ref()
            .ok_or_else(|| Error::Config("launch carries no deep-linking settings".to_string()))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        let mut claims = json!({
            "iss": context.client_id,
            "aud": context.issuer,
            "azp": context.client_id,
            "iat": now,
            "exp": now + RESPONSE_TTL.as_secs(),
            "nonce": random_token(),
            CLAIM_MESSAGE_TYPE: "LtiDeepLinkingResponse",
            CLAIM_VERSION: "1.3.0",
            CLAIM_DEPLOYMENT_ID: context.deployment_id,
            CLAIM_DL_CONTENT_ITEMS: items,
        });
        if let Some(ref data) = settings.data {
            claims[CLAIM_DL_DATA] = json!(data);
        }

        info!(
            aud = %context.issuer,
            items = items.len(),
            "Signing deep-linking response"
        );
        self.keys.sign(&claims)
    }

    /// The return URL the response must be posted to.
    pub fn return_url<'a>(&self, context: &'a LaunchContext) -> Result<&'a str> {
        context
            .deep_linking
            .as_ref()
            .map(|s| s.deep_link_return_url.as_str())
            .ok_or_else(|| Error::Config("launch carries no deep-linking settings".to_string()))
    }
}

/// HTML page that posts `jwt` to `return_url` on load (form field `JWT`).
#[must_use]
pub fn auto_submit_form(return_url: &str, jwt: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><body onload="document.forms[0].submit()">
<form method="post" action="{action}">
<input type="hidden" name="JWT" value="{jwt}"/>
<noscript><button type="submit">Continue</button></noscript>
</form></body></html>"#,
        action = escape_html(return_url),
        jwt = escape_html(jwt),
    )
}

/// Minimal HTML attribute/text escaping.
pub(crate) fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    use crate::launch::MessageType;
    use crate::launch::context::DeepLinkingSettings;

    fn key_manager() -> Arc<KeyManager> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keypair.pem");
        std::fs::write(&path, include_str!("../tests/fixtures/platform_key.pem")).unwrap();
        Arc::new(
            KeyManager::load_or_generate(
                &path,
                reqwest::Client::new(),
                Duration::from_secs(3600),
                Duration::from_secs(86_400),
            )
            .unwrap(),
        )
    }

    fn deep_linking_context(data: Option<&str>) -> LaunchContext {
        LaunchContext {
            issuer: "https://platform.example".to_string(),
            client_id: "c1".to_string(),
            deployment_id: "dep-1".to_string(),
            user_id: "user-1".to_string(),
            name: None,
            roles: Vec::new(),
            message_type: MessageType::DeepLinking,
            target_link_uri: None,
            resource_link: None,
            context: None,
            endpoint: None,
            names_roles_url: None,
            deep_linking: Some(DeepLinkingSettings {
                deep_link_return_url: "https://platform.example/deeplink/return".to_string(),
                data: data.map(str::to_string),
                accept_types: vec!["ltiResourceLink".to_string()],
                accept_multiple: Some(false),
            }),
        }
    }

    fn decode_payload(jwt: &str) -> serde_json::Value {
        let payload = jwt.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
    }

    #[test]
    fn response_jwt_carries_content_items_and_echoed_data() {
        let engine = DeepLinkingEngine::new(key_manager());
        let context = deep_linking_context(Some("opaque-data"));
        let items = vec![ContentItem::resource_link(
            "Sample Content",
            "https://tool.example/launch",
        )];

        let jwt = engine.response_jwt(&context, &items).unwrap();
        let claims = decode_payload(&jwt);

        assert_eq!(claims["iss"], "c1");
        assert_eq!(claims["aud"], "https://platform.example");
        assert_eq!(claims[CLAIM_MESSAGE_TYPE], "LtiDeepLinkingResponse");
        assert_eq!(claims[CLAIM_VERSION], "1.3.0");
        assert_eq!(claims[CLAIM_DEPLOYMENT_ID], "dep-1");
        assert_eq!(claims[CLAIM_DL_DATA], "opaque-data");

        let returned = claims[CLAIM_DL_CONTENT_ITEMS].as_array().unwrap();
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0]["type"], "ltiResourceLink");
        assert_eq!(returned[0]["title"], "Sample Content");
    }

    #[test]
    fn response_jwt_omits_data_when_platform_sent_none() {
        let engine = DeepLinkingEngine::new(key_manager());
        let context = deep_linking_context(None);
        let jwt = engine
            .response_jwt(&context, &[ContentItem::resource_link("x", "https://t")])
            .unwrap();
        assert!(decode_payload(&jwt).get(CLAIM_DL_DATA).is_none());
    }

    #[test]
    fn response_jwt_requires_deep_linking_settings() {
        let engine = DeepLinkingEngine::new(key_manager());
        let mut context = deep_linking_context(None);
        context.deep_linking = None;
        assert!(engine.response_jwt(&context, &[]).is_err());
    }

    #[test]
    fn auto_submit_form_escapes_and_targets_return_url() {
        let html = auto_submit_form("https://p.example/return?a=1&b=2", "header.payload.sig");
        assert!(html.contains(r#"action="https://p.example/return?a=1&amp;b=2""#));
        assert!(html.contains(r#"name="JWT""#));
        assert!(html.contains("header.payload.sig"));
    }

    #[test]
    fn content_items_round_trip_as_json() {
        let mut item = ContentItem::resource_link("Quiz 1", "https://tool.example/launch");
        item.line_item = Some(json!({"label": "Quiz 1", "scoreMaximum": 10.0}));

        let value = serde_json::to_value(&item).unwrap();
        let back: ContentItem = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&back).unwrap(), value);
        assert_eq!(value["lineItem"]["scoreMaximum"], 10.0);
    }
}
