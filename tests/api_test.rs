//! Integration tests for the public API

use certalert::decision::{classify, exit_code, ReminderDecision, ReminderSkip, Status};
use certalert::notify::{EmailNotifier, Notifier, SmtpSettings};
use certalert::{CertificateSource, CheckError, NotifyError, RegistryError, TlsInspector};

#[test]
fn test_public_api_compiles() {
    // Network checks are not run in tests; this only proves the API is usable.
    fn check_certificate(host: &str) -> Result<i64, CheckError> {
        let facts = TlsInspector::default().fetch(host, 443)?;
        Ok(facts.days_left(chrono::Utc::now()))
    }

    fn notifier_is_object_safe(_: &dyn Notifier) {}
    fn source_is_object_safe(_: &dyn CertificateSource) {}

    let _ = check_certificate;
    notifier_is_object_safe(&EmailNotifier::new(SmtpSettings::default()));
    source_is_object_safe(&TlsInspector::default());
}

#[test]
fn test_error_types_are_public() {
    fn handle_error(err: CheckError) -> String {
        match err {
            CheckError::DnsResolution { hostname, .. } => format!("DNS failed for {}", hostname),
            CheckError::ConnectionFailed { address, .. } => {
                format!("Connection failed to {}", address)
            }
            CheckError::HandshakeFailed { details } => format!("Handshake failed: {}", details),
            CheckError::CertificateError { reason } => format!("Certificate error: {}", reason),
            CheckError::Timeout { operation } => format!("Timeout: {}", operation),
            CheckError::InvalidInput { field, reason } => format!("Invalid {}: {}", field, reason),
            CheckError::OpenSSLError { details } => format!("OpenSSL error: {}", details),
        }
    }

    let err = CheckError::InvalidInput {
        field: "test".to_string(),
        reason: "test reason".to_string(),
    };
    assert!(handle_error(err).contains("test"));

    let err = NotifyError::ContentType("text/nonsense".to_string());
    assert!(err.to_string().contains("text/nonsense"));

    let err = RegistryError::NotAList {
        path: "sites.json".into(),
    };
    assert!(err.to_string().contains("sites.json"));
}

#[test]
fn test_status_and_exit_codes() {
    assert_eq!(classify(-3), Status::Expired);
    assert_eq!(classify(10), Status::ExpiresSoon);
    assert_eq!(classify(90), Status::Ok);
    assert_eq!(exit_code([Status::Ok, Status::ExpiresSoon]), 2);
}

#[test]
fn test_reminder_decision_is_matchable() {
    let decision = ReminderDecision::Skip(ReminderSkip::WindowPassed);
    assert!(!decision.should_send());
    assert_eq!(
        ReminderSkip::AlreadySent.to_string(),
        "already reminded for this cycle"
    );
}
