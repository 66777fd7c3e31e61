use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use placement_drive::drives::{ApplicationStatus, InMemoryCampusDirectory};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) const SAMPLE_COMPANY: &str = "contoso";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Four students with approved applications at the sample company, one still pending,
/// and two counsellors splitting the cohort.
pub(crate) fn sample_directory() -> InMemoryCampusDirectory {
    InMemoryCampusDirectory::default()
        .with_application("asha", SAMPLE_COMPANY, ApplicationStatus::Approved)
        .with_application("bilal", SAMPLE_COMPANY, ApplicationStatus::Approved)
        .with_application("chen", SAMPLE_COMPANY, ApplicationStatus::Approved)
        .with_application("dara", SAMPLE_COMPANY, ApplicationStatus::Approved)
        .with_application("emeka", SAMPLE_COMPANY, ApplicationStatus::Pending)
        .with_counsellor("counsellor-rao", &["asha", "bilal", "chen"])
        .with_counsellor("counsellor-ortiz", &["dara", "emeka"])
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
