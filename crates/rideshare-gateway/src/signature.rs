//! Payment webhook signatures.
//!
//! The provider signs `"{timestamp}.{raw body}"` with HMAC-SHA256 under a
//! shared secret and sends `Signature: t=<unix seconds>,v1=<hex digest>`.
//! Several `v1` entries may be present while the secret is being rolled.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use rideshare_core::clock::Clock;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "Signature";

/// Default accepted clock skew between the provider and us.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Why a webhook signature was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// No signature header on the request.
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingHeader,

    /// The header could not be parsed.
    #[error("malformed signature header: {0}")]
    Malformed(String),

    /// The signed timestamp is outside the tolerance window.
    #[error("signature timestamp {timestamp} outside tolerance of {tolerance_secs}s")]
    Stale {
        /// Timestamp from the header.
        timestamp: i64,
        /// Allowed skew.
        tolerance_secs: u64,
    },

    /// No `v1` digest matched.
    #[error("signature does not match payload")]
    Mismatch,

    /// The configured secret is unusable.
    #[error("invalid webhook secret: {0}")]
    InvalidSecret(String),
}

/// Verifies (and, for tests and tooling, produces) webhook signatures.
#[derive(Clone)]
pub struct WebhookVerifier {
    keyed: HmacSha256,
    tolerance: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Keys a verifier with `secret`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidSecret` for an empty secret.
    pub fn new(
        secret: &str,
        tolerance: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self, SignatureError> {
        if secret.is_empty() {
            return Err(SignatureError::InvalidSecret("secret is empty".into()));
        }
        let keyed = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| SignatureError::InvalidSecret(e.to_string()))?;
        Ok(Self {
            keyed,
            tolerance,
            clock,
        })
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }

    /// The header value the provider would send for `payload` at `timestamp`.
    #[must_use]
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let digest = self.mac(timestamp, payload).finalize().into_bytes();
        format!("t={timestamp},v1={}", hex::encode(digest))
    }

    /// Checks `header` against the raw request body.
    ///
    /// # Errors
    ///
    /// Returns a `SignatureError` describing the first check that failed.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let (timestamp, digests) = parse_header(header)?;

        let skew = self.clock.unix_timestamp().abs_diff(timestamp);
        if skew > self.tolerance.as_secs() {
            return Err(SignatureError::Stale {
                timestamp,
                tolerance_secs: self.tolerance.as_secs(),
            });
        }

        let expected = self.mac(timestamp, payload);
        let matched = digests.iter().any(|candidate| {
            hex::decode(candidate)
                .is_ok_and(|bytes| expected.clone().verify_slice(&bytes).is_ok())
        });
        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
    let mut timestamp = None;
    let mut digests = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(SignatureError::Malformed(format!("expected key=value, got {part:?}")));
        };
        match key {
            "t" => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|e| SignatureError::Malformed(format!("timestamp: {e}")))?;
                timestamp = Some(parsed);
            }
            "v1" => digests.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| SignatureError::Malformed("no timestamp".into()))?;
    if digests.is_empty() {
        return Err(SignatureError::Malformed("no v1 signature".into()));
    }
    Ok((timestamp, digests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_test_support::FixedClock;

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn verifier(secret: &str) -> WebhookVerifier {
        WebhookVerifier::new(secret, DEFAULT_TOLERANCE, Arc::new(FixedClock::at_unix(NOW))).unwrap()
    }

    #[test]
    fn test_signed_payload_verifies() {
        // Arrange
        let verifier = verifier("whsec_test");
        let header = verifier.sign(BODY, NOW);

        // Act
        let result = verifier.verify(BODY, Some(&header));

        // Assert
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_tampered_body_is_mismatch() {
        let verifier = verifier("whsec_test");
        let header = verifier.sign(BODY, NOW);

        let result = verifier.verify(br#"{"id":"evt_2"}"#, Some(&header));

        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_signature_under_other_secret_is_mismatch() {
        // Arrange
        let header = verifier("whsec_other").sign(BODY, NOW);

        // Act
        let result = verifier("whsec_test").verify(BODY, Some(&header));

        // Assert
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_any_matching_v1_entry_is_accepted() {
        let verifier = verifier("whsec_test");
        let good = verifier.sign(BODY, NOW);
        let digest = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1={digest}");

        assert_eq!(verifier.verify(BODY, Some(&header)), Ok(()));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        // Arrange
        let verifier = verifier("whsec_test");
        let old = NOW - 301;
        let header = verifier.sign(BODY, old);

        // Act
        let result = verifier.verify(BODY, Some(&header));

        // Assert
        assert_eq!(
            result,
            Err(SignatureError::Stale {
                timestamp: old,
                tolerance_secs: 300,
            })
        );
    }

    #[test]
    fn test_missing_header_is_rejected() {
        assert_eq!(
            verifier("whsec_test").verify(BODY, None),
            Err(SignatureError::MissingHeader)
        );
    }

    #[test]
    fn test_header_without_digest_is_malformed() {
        let result = verifier("whsec_test").verify(BODY, Some(&format!("t={NOW}")));

        assert!(matches!(result, Err(SignatureError::Malformed(_))));
    }

    #[test]
    fn test_empty_secret_is_refused() {
        let result = WebhookVerifier::new("", DEFAULT_TOLERANCE, Arc::new(FixedClock::at_unix(NOW)));

        assert!(matches!(result, Err(SignatureError::InvalidSecret(_))));
    }
}
