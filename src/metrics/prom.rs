use crate::decision::Status;
use crate::monitor::SiteReport;
use lazy_static::lazy_static;
use prometheus::{labels, register_gauge, Gauge};
use std::collections::HashMap;
use tracing::warn;

lazy_static! {
    static ref CERTALERT_DAYS_LEFT: Gauge =
        register_gauge!("certalert_days_left", "days before certificate expiry").unwrap();
    static ref CERTALERT_STATUS: Gauge = register_gauge!(
        "certalert_status",
        "certificate status (0 ok, 1 expires soon, 2 expired, 3 error)"
    )
    .unwrap();
}

fn status_value(status: Status) -> f64 {
    match status {
        Status::Ok => 0.0,
        Status::ExpiresSoon => 1.0,
        Status::Expired => 2.0,
        Status::Error => 3.0,
    }
}

/// Push grouping key of a site. Status is reported by the gauge only, so a
/// site keeps a single group while its status changes.
fn grouping_labels(report: &SiteReport) -> HashMap<String, String> {
    labels! {
        "instance".to_owned() => "certalert".to_owned(),
        "site".to_owned() => report.site.to_owned(),
        "port".to_owned() => report.port.to_string(),
    }
}

/// Function to push per-site metrics to a prometheus push gateway
/// # Arguments
/// * `reports` - Site reports of the finished run
/// * `prometheus_address` - Push gateway base address
pub fn prometheus_metrics(reports: &[SiteReport], prometheus_address: &str) {
    for report in reports {
        // Sites that could not be read keep no days-left value.
        CERTALERT_DAYS_LEFT.set(report.days_left.map(|d| d as f64).unwrap_or(f64::NAN));
        CERTALERT_STATUS.set(status_value(report.status));

        let metric_families = prometheus::gather();
        let result = prometheus::push_metrics(
            "certalert",
            grouping_labels(report),
            &format!("{}/metrics/job", prometheus_address),
            metric_families,
            None,
        );

        if let Err(e) = result {
            warn!("Failed to push metrics to prometheus: {}", e);
        }
    }
}
