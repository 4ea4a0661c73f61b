use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use super::domain::VerificationDraft;
use super::wire::{multipart_fields, FormValue};
use crate::config::GatewayConfig;

pub const AUTH_REQUIRED: &str = "Authentication required. Please log in again.";
pub const SUBMISSION_FAILED: &str = "Failed to submit verification request";

/// Outcome of handing a completed draft to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Accepted,
    Rejected { error: String },
}

impl SubmissionResult {
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::Rejected {
            error: error.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResult::Accepted)
    }
}

/// Boundary to whatever durably accepts a verification claim.
///
/// Implementations must fold every failure (transport, status, body) into
/// [`SubmissionResult::Rejected`]; callers never see an error type.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, draft: &VerificationDraft) -> SubmissionResult;
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unable to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Posts the draft as multipart form data to `{base_url}/claim-property`.
#[derive(Debug, Clone)]
pub struct HttpSubmissionGateway {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClaimResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ClaimResponse {
    fn failure_text(self) -> String {
        self.error
            .or(self.message)
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| SUBMISSION_FAILED.to_string())
    }
}

impl HttpSubmissionGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/claim-property", config.base_url.trim_end_matches('/')),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn form(draft: &VerificationDraft) -> Result<Form, reqwest::Error> {
        let mut form = Form::new();
        for field in multipart_fields(draft) {
            form = match field.value {
                FormValue::Text(value) => form.text(field.name, value),
                FormValue::File {
                    file_name,
                    content_type,
                    bytes,
                } => form.part(
                    field.name,
                    Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str(content_type.as_ref())?,
                ),
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl SubmissionGateway for HttpSubmissionGateway {
    async fn submit(&self, draft: &VerificationDraft) -> SubmissionResult {
        let Some(token) = self.auth_token.as_deref() else {
            warn!("no gateway token configured; refusing to submit verification");
            return SubmissionResult::rejected(AUTH_REQUIRED);
        };

        let form = match Self::form(draft) {
            Ok(form) => form,
            Err(err) => {
                warn!(error = %err, "unable to encode verification form");
                return SubmissionResult::rejected(SUBMISSION_FAILED);
            }
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, endpoint = %self.endpoint, "verification transport failure");
                return SubmissionResult::rejected(SUBMISSION_FAILED);
            }
        };

        let status = response.status();
        match response.json::<ClaimResponse>().await {
            Ok(body) if status.is_success() && body.success != Some(false) => {
                info!(%status, "verification claim accepted");
                SubmissionResult::Accepted
            }
            Ok(body) => {
                warn!(%status, "verification claim rejected");
                SubmissionResult::Rejected {
                    error: body.failure_text(),
                }
            }
            Err(err) => {
                warn!(%status, error = %err, "unreadable claim response");
                SubmissionResult::rejected(SUBMISSION_FAILED)
            }
        }
    }
}
