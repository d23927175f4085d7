use async_trait::async_trait;
use govcon_core::{Opportunity, RfpSummary};
use govcon_storage::{FetchError, HttpFetcher};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("no RFP text or opportunity to summarize")]
    EmptyInput,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Turns RFP text and/or an opportunity record into a structured summary.
/// `Ok(None)` means the collaborator answered with something that is not a
/// summary.
#[async_trait]
pub trait RfpSummarizer: Send + Sync {
    /// At least one of `rfp_text` (non-blank) or `opportunity` must be given.
    async fn analyze(
        &self,
        rfp_text: Option<&str>,
        opportunity: Option<&Opportunity>,
    ) -> Result<Option<RfpSummary>, SummarizeError>;

    async fn summarize(&self, rfp_text: &str) -> Result<Option<RfpSummary>, SummarizeError> {
        self.analyze(Some(rfp_text), None).await
    }

    async fn summarize_opportunity(
        &self,
        opportunity: &Opportunity,
    ) -> Result<Option<RfpSummary>, SummarizeError> {
        self.analyze(None, Some(opportunity)).await
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    rfp_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    opportunity_data: Option<&'a Opportunity>,
}

/// `POST {base}/analyze` on the GovCon backend.
#[derive(Debug, Clone)]
pub struct ApiSummarizer {
    http: HttpFetcher,
    endpoint: String,
}

impl ApiSummarizer {
    pub fn new(http: HttpFetcher, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/analyze", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl RfpSummarizer for ApiSummarizer {
    async fn analyze(
        &self,
        rfp_text: Option<&str>,
        opportunity: Option<&Opportunity>,
    ) -> Result<Option<RfpSummary>, SummarizeError> {
        let request = AnalyzeRequest {
            rfp_text: rfp_text.filter(|text| !text.trim().is_empty()),
            opportunity_data: opportunity,
        };
        if request.rfp_text.is_none() && request.opportunity_data.is_none() {
            return Err(SummarizeError::EmptyInput);
        }
        let body: JsonValue = self.http.post_json(&self.endpoint, &request).await?;
        Ok(summary_from_value(body))
    }
}

/// Interpret a summarizer response.
///
/// Accepts a summary object, or a string holding one (optionally wrapped in a
/// Markdown code fence, as chat models tend to answer). Anything else is
/// logged and dropped.
pub fn summary_from_value(value: JsonValue) -> Option<RfpSummary> {
    let value = match value {
        JsonValue::String(text) => match serde_json::from_str::<JsonValue>(strip_code_fence(&text)) {
            Ok(inner) => inner,
            Err(err) => {
                warn!(error = %err, "summary text is not JSON");
                return None;
            }
        },
        other => other,
    };

    if !value.is_object() {
        warn!("summary response is not an object");
        return None;
    }
    match serde_json::from_value::<RfpSummary>(value) {
        Ok(summary) if !summary.is_empty() => Some(summary),
        Ok(_) => {
            warn!("summary response has none of the expected fields");
            None
        }
        Err(err) => {
            warn!(error = %err, "summary response could not be decoded");
            None
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
