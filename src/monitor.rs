//! One monitoring run over the registry.
//!
//! Sites are processed one at a time in file order. Each enabled site goes
//! through retrieve, classify, alert and remind; a failure at any step is
//! recorded against that site only. The registry is written back at most once,
//! after the last site, and only when a reminder marker moved.

use crate::decision::{
    self, classify, decide_alert, decide_reminder, ReminderDecision, Status, Summary,
};
use crate::notify::{ExpiryAlert, Notifier, Reminder};
use crate::registry::{Registry, Site};
use crate::{display_time, CertificateSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

/// Which notification pathways are active for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub alerts: bool,
    pub reminders: bool,
}

impl RunOptions {
    /// `--no-mail` disables both pathways regardless of `--reminder`.
    pub fn from_flags(no_mail: bool, reminder: bool) -> Self {
        RunOptions {
            alerts: !no_mail,
            reminders: reminder && !no_mail,
        }
    }
}

/// Result of evaluating one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub site: String,
    pub port: u16,
    pub status: Status,
    pub not_after: Option<DateTime<Utc>>,
    pub days_left: Option<i64>,
    /// Why the certificate could not be read, when status is `ERROR`
    pub error: Option<String>,
    /// Notifications that failed for this site
    pub failures: Vec<String>,
}

impl SiteReport {
    fn unreachable(site: String, port: u16, error: String) -> Self {
        SiteReport {
            site,
            port,
            status: Status::Error,
            not_after: None,
            days_left: None,
            error: Some(error),
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub reports: Vec<SiteReport>,
    pub alerts_sent: usize,
    pub reminders_sent: usize,
    /// Whether the registry was written back
    pub persisted: bool,
    pub persist_error: Option<String>,
}

impl RunOutcome {
    /// Every status observed in the run: one per site, plus one `ERROR` per
    /// failed notification and one for a failed registry write.
    pub fn statuses(&self) -> Vec<Status> {
        let mut statuses = Vec::with_capacity(self.reports.len());
        for report in &self.reports {
            statuses.push(report.status);
            statuses.extend(report.failures.iter().map(|_| Status::Error));
        }
        if self.persist_error.is_some() {
            statuses.push(Status::Error);
        }
        statuses
    }

    pub fn summary(&self) -> Summary {
        decision::aggregate(self.statuses())
    }

    pub fn exit_code(&self) -> i32 {
        decision::exit_code(self.statuses())
    }
}

pub struct Monitor<S, N> {
    source: S,
    notifier: N,
    options: RunOptions,
}

impl<S: CertificateSource, N: Notifier> Monitor<S, N> {
    pub fn new(source: S, notifier: N, options: RunOptions) -> Self {
        Monitor {
            source,
            notifier,
            options,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn run(&self, registry: &mut Registry, now: DateTime<Utc>) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        let mut marker_changed = false;

        for site in registry.sites_mut() {
            if !site.is_enabled() {
                debug!(site = %site.name, "disabled, skipping");
                continue;
            }
            marker_changed |= self.evaluate(site, now, &mut outcome);
        }

        if marker_changed {
            match registry.persist() {
                Ok(()) => {
                    info!("updated reminder markers in {}", registry.path().display());
                    outcome.persisted = true;
                }
                Err(e) => {
                    error!("{}", e);
                    outcome.persist_error = Some(e.to_string());
                }
            }
        }
        outcome
    }

    /// Processes one site; returns whether its reminder marker changed.
    fn evaluate(&self, site: &mut Site, now: DateTime<Utc>, outcome: &mut RunOutcome) -> bool {
        let host = site.host();
        let port = site.port();

        let facts = match self.source.fetch(&host, port) {
            Ok(facts) => facts,
            Err(e) => {
                error!("{}:{} -> {}", host, port, e);
                outcome
                    .reports
                    .push(SiteReport::unreachable(host, port, e.to_string()));
                return false;
            }
        };

        let days_left = facts.days_left(now);
        let status = classify(days_left);
        debug!(site = %host, days_left, %status, "classified");

        let mut report = SiteReport {
            site: host.clone(),
            port,
            status,
            not_after: Some(facts.not_after),
            days_left: Some(days_left),
            error: None,
            failures: Vec::new(),
        };
        let Some(recipient) = site.contact().map(str::to_string) else {
            debug!(site = %host, "no contact, nothing to notify");
            outcome.reports.push(report);
            return false;
        };

        if decide_alert(status, Some(recipient.as_str()), self.options.alerts) {
            let alert = ExpiryAlert {
                recipient: recipient.clone(),
                site: host.clone(),
                expiry_display: display_time(facts.not_after),
                days_left,
            };
            match self.notifier.send_alert(&alert) {
                Ok(()) => {
                    info!(site = %host, "alert sent to {}", recipient);
                    outcome.alerts_sent += 1;
                }
                Err(e) => {
                    error!("Failed to send alert email to {} for {}: {}", recipient, host, e);
                    report.failures.push(format!("alert: {}", e));
                }
            }
        }

        let mut marker_changed = false;
        let decision = decide_reminder(
            now,
            facts.not_after,
            site.reminder_marker(),
            self.options.reminders,
            Some(recipient.as_str()),
        );
        match decision {
            ReminderDecision::Send { marker } => {
                let reminder = Reminder {
                    recipient: recipient.clone(),
                    site: host.clone(),
                    expiry: facts.not_after,
                    issued_at: now,
                };
                match self.notifier.send_reminder(&reminder) {
                    Ok(()) => {
                        info!(site = %host, %marker, "reminder sent to {}", recipient);
                        outcome.reminders_sent += 1;
                        marker_changed = site.record_reminder(marker);
                    }
                    Err(e) => {
                        error!("Failed to send ICS reminder to {} for {}: {}", recipient, host, e);
                        report.failures.push(format!("reminder: {}", e));
                    }
                }
            }
            ReminderDecision::Skip(reason) => {
                debug!(site = %host, "no reminder: {}", reason);
            }
        }

        outcome.reports.push(report);
        marker_changed
    }
}
