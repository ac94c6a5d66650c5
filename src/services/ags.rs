//! Assignment & Grade Services client.
//!
//! Line-item CRUD and score submission against the platform's AGS
//! endpoints, scoped to the line-items URL the launch advertised. All
//! operations authenticate through the shared [`AccessTokenCache`].
//!
//! Line-item identifiers are accepted either as fully-qualified URLs (used
//! verbatim) or bare ids (joined onto the launch's line-items base with a
//! single slash).

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::token::AccessTokenCache;
use crate::launch::LaunchContext;
use crate::registry::{PlatformRegistration, RegistrationStore};
use crate::{Error, Result};

/// AGS media types.
const LINE_ITEM_TYPE: &str = "application/vnd.ims.lis.v2.lineitem+json";
const LINE_ITEM_CONTAINER_TYPE: &str = "application/vnd.ims.lis.v2.lineitemcontainer+json";
const SCORE_TYPE: &str = "application/vnd.ims.lis.v1.score+json";
const RESULT_CONTAINER_TYPE: &str = "application/vnd.ims.lis.v2.resultcontainer+json";

/// Scopes requested when the launch's endpoint claim named none.
const DEFAULT_SCOPES: &[&str] = &[
    "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem",
    "https://purl.imsglobal.org/spec/lti-ags/scope/result.readonly",
    "https://purl.imsglobal.org/spec/lti-ags/scope/score",
];

/// Score activity progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityProgress {
    /// Activity has not been started
    Initialized,
    /// Activity is underway
    InProgress,
    /// Activity has been submitted
    Submitted,
    /// Activity is complete
    Completed,
}

impl FromStr for ActivityProgress {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "Initialized" => Ok(Self::Initialized),
            "InProgress" => Ok(Self::InProgress),
            "Submitted" => Ok(Self::Submitted),
            "Completed" => Ok(Self::Completed),
            other => Err(Error::InvalidProgressEnum(other.to_string())),
        }
    }
}

/// Score grading progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradingProgress {
    /// Grading has not started
    NotReady,
    /// Grade is final
    FullyGraded,
    /// Grading is pending
    Pending,
    /// Grading awaits manual intervention
    PendingManual,
    /// Grading failed
    Failed,
}

impl FromStr for GradingProgress {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "NotReady" => Ok(Self::NotReady),
            "FullyGraded" => Ok(Self::FullyGraded),
            "Pending" => Ok(Self::Pending),
            "PendingManual" => Ok(Self::PendingManual),
            "Failed" => Ok(Self::Failed),
            other => Err(Error::InvalidProgressEnum(other.to_string())),
        }
    }
}

/// A platform line item. Unknown platform fields are preserved so route
/// responses stay faithful to what the platform returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Line item URL/id as assigned by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display label
    pub label: String,
    /// Maximum score
    pub score_maximum: f64,
    /// Resource link this item is coupled to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_link_id: Option<String>,
    /// Any additional platform fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A score submission payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Points awarded
    pub score_given: f64,
    /// Points possible
    pub score_maximum: f64,
    /// Activity progress
    pub activity_progress: ActivityProgress,
    /// Grading progress
    pub grading_progress: GradingProgress,
    /// Submission timestamp (ISO-8601 UTC)
    pub timestamp: String,
    /// Platform user the score belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// AGS client bound to the shared token cache and registration store.
pub struct AgsClient {
    http: reqwest::Client,
    tokens: Arc<AccessTokenCache>,
    registrations: Arc<RegistrationStore>,
}

impl AgsClient {
    /// Create a client.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<AccessTokenCache>,
        registrations: Arc<RegistrationStore>,
    ) -> Self {
        Self {
            http,
            tokens,
            registrations,
        }
    }

    /// List line items, optionally filtered by resource link.
    pub async fn list_line_items(
        &self,
        context: &LaunchContext,
        resource_link_id: Option<&str>,
    ) -> Result<Vec<LineItem>> {
        let base = line_items_base(context)?;
        let bearer = self.bearer(context).await?;

        let mut request = self
            .http
            .get(base)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, LINE_ITEM_CONTAINER_TYPE);
        if let Some(rlid) = resource_link_id {
            request = request.query(&[("resource_link_id", rlid)]);
        }

        let response = request.send().await?;
        let body = check_success(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Create a line item. `score_maximum` must be positive.
    pub async fn create_line_item(
        &self,
        context: &LaunchContext,
        label: &str,
        score_maximum: f64,
        resource_link_id: Option<&str>,
    ) -> Result<LineItem> {
        if score_maximum <= 0.0 {
            return Err(Error::InvalidScoreMaximum(score_maximum));
        }
        let base = line_items_base(context)?;
        let bearer = self.bearer(context).await?;

        let item = LineItem {
            id: None,
            label: label.to_string(),
            score_maximum,
            resource_link_id: resource_link_id.map(str::to_string),
            extra: serde_json::Map::new(),
        };

        let response = self
            .http
            .post(base)
            .bearer_auth(bearer)
            .header(reqwest::header::CONTENT_TYPE, LINE_ITEM_TYPE)
            .body(serde_json::to_string(&item)?)
            .send()
            .await?;
        let body = check_success(response).await?;
        let created: LineItem = serde_json::from_str(&body)?;
        info!(label = %created.label, id = ?created.id, "Line item created");
        Ok(created)
    }

    /// Delete a line item by bare id or fully-qualified URL.
    pub async fn delete_line_item(&self, context: &LaunchContext, id_or_url: &str) -> Result<()> {
        let url = resolve_line_item_url(context, id_or_url)?;
        let bearer = self.bearer(context).await?;

        debug!(url = %url, "Deleting line item");
        let response = self.http.delete(&url).bearer_auth(bearer).send().await?;
        check_success(response).await?;
        Ok(())
    }

    /// Submit a score to a line item's `/scores` sub-resource.
    ///
    /// `timestamp` defaults to now; the platform requires one either way.
    pub async fn submit_score(
        &self,
        context: &LaunchContext,
        id_or_url: &str,
        score_given: f64,
        score_maximum: f64,
        activity_progress: ActivityProgress,
        grading_progress: GradingProgress,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Value> {
        if score_maximum <= 0.0 {
            return Err(Error::InvalidScoreMaximum(score_maximum));
        }
        let url = service_url(&resolve_line_item_url(context, id_or_url)?, "scores");
        let bearer = self.bearer(context).await?;

        let score = Score {
            score_given,
            score_maximum,
            activity_progress,
            grading_progress,
            timestamp: timestamp
                .unwrap_or_else(Utc::now)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            user_id: Some(context.user_id.clone()),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .header(reqwest::header::CONTENT_TYPE, SCORE_TYPE)
            .body(serde_json::to_string(&score)?)
            .send()
            .await?;
        let body = check_success(response).await?;
        info!(url = %url, score = score_given, "Score submitted");
        if body.is_empty() {
            Ok(Value::Object(serde_json::Map::new()))
        } else {
            Ok(serde_json::from_str(&body)?)
        }
    }

    /// Fetch results from a line item's `/results` sub-resource, verbatim.
    pub async fn get_scores(&self, context: &LaunchContext, id_or_url: &str) -> Result<Value> {
        let url = service_url(&resolve_line_item_url(context, id_or_url)?, "results");
        let bearer = self.bearer(context).await?;

        let response = self
            .http
            .get(&url)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, RESULT_CONTAINER_TYPE)
            .send()
            .await?;
        let body = check_success(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn bearer(&self, context: &LaunchContext) -> Result<String> {
        let registration = self.registration_for(context)?;
        let scopes = effective_scopes(context);
        self.tokens.bearer(&registration, &scopes).await
    }

    fn registration_for(&self, context: &LaunchContext) -> Result<PlatformRegistration> {
        self.registrations
            .platform_by_issuer(&context.issuer)
            .ok_or_else(|| Error::UnknownPlatform(context.issuer.clone()))
    }
}

/// Scopes for this launch: the endpoint claim's scopes, or the standard AGS
/// set when the claim named none.
fn effective_scopes(context: &LaunchContext) -> Vec<String> {
    let claimed = context.ags_scopes();
    if claimed.is_empty() {
        DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect()
    } else {
        claimed.to_vec()
    }
}

fn line_items_base(context: &LaunchContext) -> Result<&str> {
    context
        .line_items_url()
        .ok_or(Error::LineItemsUrlMissing)
}

/// Absolute URLs pass through verbatim; bare ids are joined onto the
/// launch's line-items base with a single separating slash.
fn resolve_line_item_url(context: &LaunchContext, id_or_url: &str) -> Result<String> {
    if id_or_url.starts_with("http://") || id_or_url.starts_with("https://") {
        return Ok(id_or_url.to_string());
    }
    let base = line_items_base(context)?;
    Ok(format!("{}/{id_or_url}", base.trim_end_matches('/')))
}

/// Append a sub-resource segment to a line-item URL, keeping any query
/// string after the path (platforms routinely hang pagination or type
/// params off the line item URL).
fn service_url(line_item_url: &str, suffix: &str) -> String {
    match line_item_url.split_once('?') {
        Some((path, query)) => format!("{}/{suffix}?{query}", path.trim_end_matches('/')),
        None => format!("{}/{suffix}", line_item_url.trim_end_matches('/')),
    }
}

async fn check_success(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}
