use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tenant_verification::workflows::verification::wire::multipart_fields;
use tenant_verification::workflows::verification::{
    DraftStore, HttpSubmissionGateway, SubmissionGateway, SubmissionResult, VerificationDraft,
    WizardSessions,
};
use tracing::info;

/// Registry type served by the binary: the configured draft store and the live claim gateway.
pub(crate) type LiveSessions = WizardSessions<DraftStore, HttpSubmissionGateway>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) draft_store: &'static str,
    pub(crate) gateway_configured: bool,
}

/// Offline stand-in for the claim endpoint. Optionally refuses the first claim so the retry
/// path can be shown.
#[derive(Debug, Default)]
pub(crate) struct RehearsalGateway {
    fail_next: AtomicBool,
}

impl RehearsalGateway {
    pub(crate) fn failing_first() -> Self {
        Self {
            fail_next: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl SubmissionGateway for RehearsalGateway {
    async fn submit(&self, draft: &VerificationDraft) -> SubmissionResult {
        let fields: Vec<&str> = multipart_fields(draft)
            .iter()
            .map(|field| field.name)
            .collect();
        info!(fields = ?fields, "rehearsal claim received");

        if self.fail_next.swap(false, Ordering::AcqRel) {
            return SubmissionResult::rejected("Network error");
        }
        SubmissionResult::Accepted
    }
}

/// Either the rehearsal gateway or the configured HTTP endpoint.
pub(crate) enum DemoGateway {
    Rehearsal(RehearsalGateway),
    Live(HttpSubmissionGateway),
}

#[async_trait]
impl SubmissionGateway for DemoGateway {
    async fn submit(&self, draft: &VerificationDraft) -> SubmissionResult {
        match self {
            DemoGateway::Rehearsal(gateway) => gateway.submit(draft).await,
            DemoGateway::Live(gateway) => gateway.submit(draft).await,
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|err| format!("failed to parse '{raw}' as an amount ({err})"))?;
    if amount.is_sign_negative() {
        return Err(format!("'{raw}' must not be negative"));
    }
    Ok(amount)
}
