//! Email delivery over SMTP.

use super::ics::build_ics;
use super::{ExpiryAlert, Notifier, Reminder};
use crate::error::NotifyError;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;
use tracing::debug;

const CALENDAR_CONTENT_TYPE: &str = "text/calendar; method=REQUEST; charset=utf-8";

/// SMTP endpoint and sender identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub from: String,
    pub starttls: bool,
    pub credentials: Option<(String, String)>,
    /// Upper bound on one SMTP exchange
    pub timeout: Duration,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        SmtpSettings {
            server: "localhost".to_string(),
            port: 25,
            from: "cert-monitor@localhost".to_string(),
            starttls: false,
            credentials: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Sends alerts as HTML mail and reminders as mail with an `.ics` invitation.
pub struct EmailNotifier {
    settings: SmtpSettings,
}

impl EmailNotifier {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
        address.parse().map_err(|source| NotifyError::Address {
            address: address.to_string(),
            source,
        })
    }

    /// Build alert message
    pub fn build_alert_message(&self, alert: &ExpiryAlert) -> Result<Message, NotifyError> {
        let message = Message::builder()
            .from(Self::mailbox(&self.settings.from)?)
            .to(Self::mailbox(&alert.recipient)?)
            .subject(alert.subject())
            .header(ContentType::TEXT_HTML)
            .body(format_alert_html(alert))?;
        Ok(message)
    }

    /// Build reminder message with the calendar invitation attached
    pub fn build_reminder_message(&self, reminder: &Reminder) -> Result<Message, NotifyError> {
        let calendar_type = ContentType::parse(CALENDAR_CONTENT_TYPE)
            .map_err(|_| NotifyError::ContentType(CALENDAR_CONTENT_TYPE.to_string()))?;
        let ics = build_ics(reminder, &self.settings.from);

        let message = Message::builder()
            .from(Self::mailbox(&self.settings.from)?)
            .to(Self::mailbox(&reminder.recipient)?)
            .subject(reminder.subject())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(format_reminder_text(reminder)))
                    .singlepart(
                        Attachment::new(reminder.attachment_name()).body(ics, calendar_type),
                    ),
            )?;
        Ok(message)
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let builder = if self.settings.starttls {
            SmtpTransport::starttls_relay(&self.settings.server)?
        } else {
            SmtpTransport::builder_dangerous(&self.settings.server)
        };

        let mut builder = builder
            .port(self.settings.port)
            .timeout(Some(self.settings.timeout));
        if let Some((username, password)) = &self.settings.credentials {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(builder.build())
    }

    fn deliver(&self, message: &Message) -> Result<(), NotifyError> {
        let response = self.transport()?.send(message)?;
        debug!(code = %response.code(), "message accepted by {}", self.settings.server);
        Ok(())
    }
}

impl Notifier for EmailNotifier {
    fn send_alert(&self, alert: &ExpiryAlert) -> Result<(), NotifyError> {
        let message = self.build_alert_message(alert)?;
        self.deliver(&message)
    }

    fn send_reminder(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        let message = self.build_reminder_message(reminder)?;
        self.deliver(&message)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Format alert as HTML
pub fn format_alert_html(alert: &ExpiryAlert) -> String {
    let site = escape_html(&alert.site);
    let expiry = escape_html(&alert.expiry_display);
    let (color, heading, detail) = if alert.is_expired() {
        (
            "#dc3545",
            "TLS certificate expired",
            format!(
                "The certificate for <strong>{}</strong> expired on {} ({} days ago).",
                site,
                expiry,
                -alert.days_left
            ),
        )
    } else {
        (
            "#fd7e14",
            "TLS certificate expiring soon",
            format!(
                "The certificate for <strong>{}</strong> expires on {} (<strong>{}</strong> days left).",
                site, expiry, alert.days_left
            ),
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ background: {}; color: white; padding: 20px; border-radius: 5px 5px 0 0; }}
        .content {{ background: #f9f9f9; padding: 20px; border-radius: 0 0 5px 5px; }}
        h1 {{ margin: 0; font-size: 24px; }}
        .footer {{ text-align: center; margin-top: 20px; color: #666; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>{}</h1>
        </div>
        <div class="content">
            <p>{}</p>
            <p>Please renew the certificate as soon as possible.</p>
        </div>
        <div class="footer">
            <p>Sent by certalert</p>
        </div>
    </div>
</body>
</html>"#,
        color, heading, detail
    )
}

/// Format the plain-text part of a reminder
pub fn format_reminder_text(reminder: &Reminder) -> String {
    format!(
        "A calendar reminder is attached.\n\n\
        {} certificate expires on {}.\n\
        Reminder scheduled for {} (5 days before).",
        reminder.site,
        reminder.expiry.format("%Y-%m-%d %H:%M:%S UTC"),
        reminder.event_start().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
