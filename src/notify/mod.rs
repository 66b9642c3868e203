//! Notification channel for expiry alerts and renewal reminders.
//!
//! # Submodules
//!
//! - `email` - SMTP delivery through lettre
//! - `ics` - calendar invitation attached to reminders

pub mod email;
pub mod ics;

pub use email::{EmailNotifier, SmtpSettings};

use crate::decision::{reminder_time, REMINDER_EVENT_MINUTES};
use crate::error::NotifyError;
use chrono::{DateTime, Duration, Utc};

/// Alert for a certificate that is expired or about to expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryAlert {
    pub recipient: String,
    pub site: String,
    /// Expiry as printed in the certificate, e.g. `Nov 28 06:12:04 2025 GMT`
    pub expiry_display: String,
    pub days_left: i64,
}

impl ExpiryAlert {
    pub fn is_expired(&self) -> bool {
        self.days_left < 0
    }

    pub fn subject(&self) -> String {
        if self.is_expired() {
            format!("[ALERT] TLS certificate expired for {}", self.site)
        } else {
            format!("[ALERT] TLS certificate expiring soon for {}", self.site)
        }
    }
}

/// Renewal reminder for one certificate cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub recipient: String,
    pub site: String,
    pub expiry: DateTime<Utc>,
    /// Creation time stamped into the invitation
    pub issued_at: DateTime<Utc>,
}

impl Reminder {
    pub fn subject(&self) -> String {
        format!("[REMINDER] Renew TLS certificate: {}", self.site)
    }

    pub fn event_start(&self) -> DateTime<Utc> {
        reminder_time(self.expiry)
    }

    pub fn event_end(&self) -> DateTime<Utc> {
        self.event_start() + Duration::minutes(REMINDER_EVENT_MINUTES)
    }

    pub fn attachment_name(&self) -> String {
        format!("renew-{}.ics", self.site)
    }
}

/// Delivers alerts and reminders. Failures are returned, never panicked on;
/// the caller records them against the site and carries on.
pub trait Notifier {
    fn send_alert(&self, alert: &ExpiryAlert) -> Result<(), NotifyError>;

    fn send_reminder(&self, reminder: &Reminder) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_alert_subject() {
        let mut alert = ExpiryAlert {
            recipient: "ops@example.com".to_string(),
            site: "example.com".to_string(),
            expiry_display: "Jun 11 12:00:00 2025 GMT".to_string(),
            days_left: 10,
        };
        assert_eq!(
            alert.subject(),
            "[ALERT] TLS certificate expiring soon for example.com"
        );

        alert.days_left = -3;
        assert_eq!(alert.subject(), "[ALERT] TLS certificate expired for example.com");
    }

    #[test]
    fn test_reminder_event_window() {
        let expiry = Utc.with_ymd_and_hms(2025, 9, 8, 8, 0, 0).unwrap();
        let reminder = Reminder {
            recipient: "ops@example.com".to_string(),
            site: "example.com".to_string(),
            expiry,
            issued_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        };
        assert_eq!(
            reminder.event_start(),
            Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap()
        );
        assert_eq!(
            reminder.event_end(),
            Utc.with_ymd_and_hms(2025, 9, 3, 8, 30, 0).unwrap()
        );
        assert_eq!(reminder.attachment_name(), "renew-example.com.ics");
    }
}
