//! Certificate expiry monitoring for a registry of TLS sites.
//!
//! The crate reads live certificates, classifies them by how close they are to
//! expiry, sends alert emails for the urgent ones and at most one calendar
//! reminder per certificate cycle, and reports the outcome.
//!
//! The certificate retrieval itself lives here; see [`monitor::Monitor`] for
//! how a run is sequenced.

pub mod config;
pub mod decision;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod report;

pub use error::{CheckError, NotifyError, RegistryError};

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::ssl::{Ssl, SslContext, SslMethod, SslVerifyMode};
use openssl::x509::X509Ref;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Connect/read timeout applied to certificate retrieval unless configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const SECONDS_PER_DAY: i64 = 86_400;

/// Validity bounds read from a live certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFacts {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateFacts {
    /// Whole days left until `not_after`, see [`days_left`].
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        days_left(self.not_after, now)
    }

    fn from_x509(cert: &X509Ref) -> Result<Self, CheckError> {
        Ok(CertificateFacts {
            not_before: asn1_to_utc(cert.not_before())?,
            not_after: asn1_to_utc(cert.not_after())?,
        })
    }
}

/// Floor of the remaining lifetime in days.
///
/// Rounds toward negative infinity: a certificate that expired one hour ago
/// has `-1` days left, never `0`.
pub fn days_left(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Formats an expiry instant the way certificates print it, e.g.
/// `Nov 28 06:12:04 2025 GMT`.
pub fn display_time(time: DateTime<Utc>) -> String {
    time.format("%b %d %H:%M:%S %Y GMT").to_string()
}

fn asn1_to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, CheckError> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let seconds = i64::from(diff.days) * SECONDS_PER_DAY + i64::from(diff.secs);
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| CheckError::CertificateError {
        reason: format!("validity bound out of range: {}", time),
    })
}

/// Anything that can produce the validity bounds of a site's certificate.
pub trait CertificateSource {
    fn fetch(&self, host: &str, port: u16) -> Result<CertificateFacts, CheckError>;
}

/// Reads the leaf certificate over a live TLS handshake.
///
/// The chain is deliberately not verified: an expired or self-signed
/// certificate must still be readable so it can be classified.
#[derive(Debug, Clone)]
pub struct TlsInspector {
    timeout: Duration,
}

impl TlsInspector {
    pub fn new(timeout: Duration) -> Self {
        TlsInspector { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn connect(&self, host: &str, port: u16) -> Result<TcpStream, CheckError> {
        let address = format!("{}:{}", host, port);
        let socket_addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| CheckError::DnsResolution {
                hostname: host.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| CheckError::DnsResolution {
                hostname: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
            })?;

        let tcp_stream =
            TcpStream::connect_timeout(&socket_addr, self.timeout).map_err(|source| {
                if source.kind() == io::ErrorKind::TimedOut {
                    CheckError::Timeout {
                        operation: format!("connect to {}", address),
                    }
                } else {
                    CheckError::ConnectionFailed {
                        address: address.clone(),
                        source,
                    }
                }
            })?;
        tcp_stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| tcp_stream.set_write_timeout(Some(self.timeout)))
            .map_err(|source| CheckError::ConnectionFailed { address, source })?;
        Ok(tcp_stream)
    }
}

impl Default for TlsInspector {
    fn default() -> Self {
        TlsInspector::new(DEFAULT_TIMEOUT)
    }
}

impl CertificateSource for TlsInspector {
    fn fetch(&self, host: &str, port: u16) -> Result<CertificateFacts, CheckError> {
        if host.trim().is_empty() {
            return Err(CheckError::InvalidInput {
                field: "hostname".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        let mut context = SslContext::builder(SslMethod::tls())?;
        context.set_verify(SslVerifyMode::NONE);
        let context = context.build();

        let mut connector = Ssl::new(&context)?;
        connector.set_hostname(host)?;

        let tcp_stream = self.connect(host, port)?;
        let stream = connector.connect(tcp_stream)?;

        let cert = stream
            .ssl()
            .peer_certificate()
            .ok_or_else(|| CheckError::CertificateError {
                reason: "peer presented no certificate".to_string(),
            })?;
        CertificateFacts::from_x509(&cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_days_left_whole_days() {
        let not_after = now() + ChronoDuration::days(20);
        assert_eq!(days_left(not_after, now()), 20);
    }

    #[test]
    fn test_days_left_truncates_partial_day() {
        let not_after = now() + ChronoDuration::days(3) + ChronoDuration::hours(23);
        assert_eq!(days_left(not_after, now()), 3);
    }

    #[test]
    fn test_days_left_floors_negative() {
        let not_after = now() - ChronoDuration::hours(1);
        assert_eq!(days_left(not_after, now()), -1);

        let not_after = now() - ChronoDuration::days(3);
        assert_eq!(days_left(not_after, now()), -3);
    }

    #[test]
    fn test_display_time() {
        let time = Utc.with_ymd_and_hms(2025, 11, 28, 6, 12, 4).unwrap();
        assert_eq!(display_time(time), "Nov 28 06:12:04 2025 GMT");
    }

    #[test]
    fn test_asn1_conversion() {
        let asn1 = Asn1Time::from_unix(1_764_310_324).unwrap();
        let converted = asn1_to_utc(&asn1).unwrap();
        assert_eq!(converted.timestamp(), 1_764_310_324);
    }

    #[test]
    fn test_empty_host_rejected() {
        let inspector = TlsInspector::default();
        let err = inspector.fetch("  ", 443).unwrap_err();
        assert!(matches!(err, CheckError::InvalidInput { .. }));
    }
}
