//! Classification and notification decisions.
//!
//! Everything here is pure: the caller supplies the clock, the certificate
//! bounds and the stored reminder marker, and gets back what to do.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumIter};

/// Certificates with at most this many days left are flagged `EXPIRES SOON`.
pub const EXPIRY_WARNING_DAYS: i64 = 14;

/// A reminder event is scheduled this many days before expiry.
pub const REMINDER_LEAD_DAYS: i64 = 5;

/// Length of the calendar event attached to a reminder.
pub const REMINDER_EVENT_MINUTES: i64 = 30;

/// Per-site outcome of one run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumIter,
    Serialize,
)]
pub enum Status {
    #[strum(serialize = "OK")]
    #[serde(rename = "OK")]
    Ok,
    #[strum(serialize = "EXPIRES SOON")]
    #[serde(rename = "EXPIRES SOON")]
    ExpiresSoon,
    #[strum(serialize = "EXPIRED")]
    #[serde(rename = "EXPIRED")]
    Expired,
    #[strum(serialize = "ERROR")]
    #[serde(rename = "ERROR")]
    Error,
}

impl Status {
    /// Whether an alert email is warranted for this status.
    pub fn is_urgent(self) -> bool {
        matches!(self, Status::ExpiresSoon | Status::Expired)
    }
}

pub fn classify(days_left: i64) -> Status {
    if days_left < 0 {
        Status::Expired
    } else if days_left <= EXPIRY_WARNING_DAYS {
        Status::ExpiresSoon
    } else {
        Status::Ok
    }
}

/// Alerts carry no dedup: they fire on every run while the condition holds.
pub fn decide_alert(status: Status, contact: Option<&str>, alerts_enabled: bool) -> bool {
    alerts_enabled && has_contact(contact) && status.is_urgent()
}

/// Why a reminder was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReminderSkip {
    #[strum(serialize = "reminders disabled")]
    Disabled,
    #[strum(serialize = "no contact")]
    NoContact,
    #[strum(serialize = "reminder time already passed")]
    WindowPassed,
    #[strum(serialize = "already reminded for this cycle")]
    AlreadySent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDecision {
    /// Send the reminder, then store `marker` as the new dedup marker.
    Send { marker: NaiveDate },
    Skip(ReminderSkip),
}

impl ReminderDecision {
    pub fn should_send(&self) -> bool {
        matches!(self, ReminderDecision::Send { .. })
    }
}

/// Instant at which the reminder event for a certificate starts.
pub fn reminder_time(not_after: DateTime<Utc>) -> DateTime<Utc> {
    not_after - Duration::days(REMINDER_LEAD_DAYS)
}

/// Decides whether the renewal reminder for the current certificate is due.
///
/// At most one reminder goes out per expiry cycle. The stored marker is the
/// expiry date a reminder was last sent for; until `now` moves past it no new
/// reminder is sent, and once a renewed certificate is seen the reminder for
/// the new expiry becomes eligible. A reminder whose event time is already
/// behind `now` is skipped silently.
pub fn decide_reminder(
    now: DateTime<Utc>,
    not_after: DateTime<Utc>,
    marker: Option<NaiveDate>,
    reminders_enabled: bool,
    contact: Option<&str>,
) -> ReminderDecision {
    if !reminders_enabled {
        return ReminderDecision::Skip(ReminderSkip::Disabled);
    }
    if !has_contact(contact) {
        return ReminderDecision::Skip(ReminderSkip::NoContact);
    }
    if reminder_time(not_after) <= now {
        return ReminderDecision::Skip(ReminderSkip::WindowPassed);
    }
    if let Some(marker) = marker {
        if now <= marker_instant(marker) {
            return ReminderDecision::Skip(ReminderSkip::AlreadySent);
        }
    }
    ReminderDecision::Send {
        marker: not_after.date_naive(),
    }
}

/// Start of the marker's calendar day in UTC.
fn marker_instant(marker: NaiveDate) -> DateTime<Utc> {
    marker.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn has_contact(contact: Option<&str>) -> bool {
    contact.is_some_and(|c| !c.trim().is_empty())
}

/// Status counts in fixed display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    #[serde(rename = "OK")]
    pub ok: usize,
    #[serde(rename = "EXPIRES SOON")]
    pub expires_soon: usize,
    #[serde(rename = "EXPIRED")]
    pub expired: usize,
    #[serde(rename = "ERROR")]
    pub error: usize,
}

impl Summary {
    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Ok => self.ok,
            Status::ExpiresSoon => self.expires_soon,
            Status::Expired => self.expired,
            Status::Error => self.error,
        }
    }

    fn increment(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::ExpiresSoon => self.expires_soon += 1,
            Status::Expired => self.expired += 1,
            Status::Error => self.error += 1,
        }
    }
}

pub fn aggregate<I>(statuses: I) -> Summary
where
    I: IntoIterator<Item = Status>,
{
    let mut summary = Summary::default();
    for status in statuses {
        summary.increment(status);
    }
    summary
}

/// Process exit code for a run: failures and expiries dominate warnings.
pub fn exit_code<I>(statuses: I) -> i32
where
    I: IntoIterator<Item = Status>,
{
    let mut warned = false;
    for status in statuses {
        match status {
            Status::Error | Status::Expired => return 1,
            Status::ExpiresSoon => warned = true,
            Status::Ok => {}
        }
    }
    if warned {
        2
    } else {
        0
    }
}
