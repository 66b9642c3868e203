//! iCalendar invitation for renewal reminders.

use super::Reminder;
use chrono::{DateTime, Utc};

const PRODUCT_ID: &str = "-//certalert//EN";
const UID_DOMAIN: &str = "certalert";

fn ics_time(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Identifier of the reminder event; the same site and expiry always give
/// the same UID, so a resent invitation updates the existing calendar entry.
pub fn event_uid(site: &str, expiry: DateTime<Utc>) -> String {
    format!("{}-{}@{}", site, ics_time(expiry), UID_DOMAIN)
}

/// Builds a `METHOD:REQUEST` calendar with one 30 minute event placed
/// five days before expiry. Lines are CRLF terminated.
pub fn build_ics(reminder: &Reminder, organizer: &str) -> String {
    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        format!("PRODID:{}", PRODUCT_ID),
        "VERSION:2.0".to_string(),
        "METHOD:REQUEST".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}", event_uid(&reminder.site, reminder.expiry)),
        format!("DTSTAMP:{}", ics_time(reminder.issued_at)),
        format!("DTSTART:{}", ics_time(reminder.event_start())),
        format!("DTEND:{}", ics_time(reminder.event_end())),
        format!("SUMMARY:Renew TLS certificate: {}", reminder.site),
        format!(
            "DESCRIPTION:Certificate for {} expires on {}.",
            reminder.site,
            reminder.expiry.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        format!("ORGANIZER:MAILTO:{}", organizer),
        format!(
            "ATTENDEE;CN={}:MAILTO:{}",
            reminder.recipient, reminder.recipient
        ),
        "SEQUENCE:0".to_string(),
        "STATUS:CONFIRMED".to_string(),
        "TRANSP:OPAQUE".to_string(),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    let mut ics = String::new();
    for line in lines.iter() {
        ics.push_str(line);
        ics.push_str("\r\n");
    }
    ics
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reminder() -> Reminder {
        Reminder {
            recipient: "ops@example.com".to_string(),
            site: "example.com".to_string(),
            expiry: Utc.with_ymd_and_hms(2025, 9, 8, 8, 0, 0).unwrap(),
            issued_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 15, 0).unwrap(),
        }
    }

    #[test]
    fn test_event_fields() {
        let ics = build_ics(&reminder(), "cert-monitor@example.com");

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(ics.contains("\r\nUID:example.com-20250908T080000Z@certalert\r\n"));
        assert!(ics.contains("\r\nDTSTAMP:20250601T091500Z\r\n"));
        assert!(ics.contains("\r\nDTSTART:20250903T080000Z\r\n"));
        assert!(ics.contains("\r\nDTEND:20250903T083000Z\r\n"));
        assert!(ics.contains("\r\nORGANIZER:MAILTO:cert-monitor@example.com\r\n"));
        assert!(ics.contains("\r\nATTENDEE;CN=ops@example.com:MAILTO:ops@example.com\r\n"));
        assert!(!ics.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_uid_is_stable_per_cycle() {
        let first = reminder();
        let mut again = reminder();
        again.issued_at = Utc.with_ymd_and_hms(2025, 6, 2, 9, 15, 0).unwrap();

        let uid = |ics: &str| {
            ics.lines()
                .find(|line| line.starts_with("UID:"))
                .map(str::to_string)
        };
        assert_eq!(
            uid(&build_ics(&first, "a@example.com")),
            uid(&build_ics(&again, "a@example.com"))
        );

        let mut renewed = reminder();
        renewed.expiry = Utc.with_ymd_and_hms(2025, 12, 7, 8, 0, 0).unwrap();
        assert_ne!(
            event_uid(&first.site, first.expiry),
            event_uid(&renewed.site, renewed.expiry)
        );
    }
}
