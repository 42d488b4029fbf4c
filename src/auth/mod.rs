//! Request signing and verification
//!
//! Incoming requests carry two custom headers: `timestamp` (epoch
//! milliseconds as a decimal string) and `signature` (lowercase hex
//! HMAC-SHA256). The MAC covers the timestamp string concatenated with the
//! exact body bytes as received on the wire, with no separator. The client
//! must sign precisely the bytes it sends; the verifier never re-serializes
//! the body, so there is no canonicalization step to drift out of agreement.
//!
//! The timestamp is checked against a bounded replay window (default
//! ±5 minutes of server time), which rejects both stale and future-dated
//! requests. Signature comparison is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Replay window: how far a request timestamp may deviate from server time.
pub const DEFAULT_REPLAY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Signature verification failures.
///
/// The display strings are part of the HTTP contract: the signing client
/// re-derives the same signature and needs a diagnosable mismatch reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Timestamp or signature header was absent.
    #[error("Missing authentication headers")]
    MissingHeaders,
    /// Timestamp was unparseable or outside the replay window.
    #[error("Request timestamp expired")]
    TimestampExpired,
    /// Recomputed signature did not match the supplied one.
    #[error("Invalid signature")]
    InvalidSignature,
}

/// Verifies HMAC-signed requests against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    replay_window_ms: i64,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, replay_window_ms: i64) -> Self {
        Self {
            secret: secret.into(),
            replay_window_ms,
        }
    }

    /// Compute the hex-encoded signature for `(timestamp, body)`.
    ///
    /// Exposed so the `sign` CLI subcommand and tests can produce
    /// signatures the verifier will accept.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(timestamp.as_bytes());
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify the signature headers against the raw body bytes.
    ///
    /// `now_ms` is passed in rather than read from the clock so the replay
    /// window can be exercised deterministically.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now_ms: i64,
    ) -> Result<(), AuthError> {
        let (timestamp, signature) = match (timestamp, signature) {
            (Some(t), Some(s)) => (t, s),
            _ => return Err(AuthError::MissingHeaders),
        };

        let request_time: i64 = timestamp
            .parse()
            .map_err(|_| AuthError::TimestampExpired)?;
        if (now_ms - request_time).abs() > self.replay_window_ms {
            return Err(AuthError::TimestampExpired);
        }

        let expected = self.sign(timestamp, body);
        if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
            Ok(())
        } else {
            Err(AuthError::InvalidSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET, DEFAULT_REPLAY_WINDOW_MS)
    }

    #[test]
    fn test_sign_is_deterministic() {
        let v = verifier();
        let body = br#"{"prompt":"hello"}"#;
        let a = v.sign("1700000000000", body);
        let b = v.sign("1700000000000", body);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_valid_signature_accepted() {
        let v = verifier();
        let now = 1_700_000_000_000;
        let ts = now.to_string();
        let body = br#"{"prompt":"hello"}"#;
        let sig = v.sign(&ts, body);

        assert_eq!(v.verify(Some(&ts), Some(&sig), body, now), Ok(()));
    }

    #[test]
    fn test_flipped_signature_rejected() {
        let v = verifier();
        let now = 1_700_000_000_000;
        let ts = now.to_string();
        let body = br#"{"prompt":"hello"}"#;
        let mut sig = v.sign(&ts, body);

        // Flip one hex character.
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });

        assert_eq!(
            v.verify(Some(&ts), Some(&sig), body, now),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_different_body_rejected() {
        let v = verifier();
        let now = 1_700_000_000_000;
        let ts = now.to_string();
        let sig = v.sign(&ts, br#"{"prompt":"hello"}"#);

        assert_eq!(
            v.verify(Some(&ts), Some(&sig), br#"{"prompt":"other"}"#, now),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_headers() {
        let v = verifier();
        assert_eq!(
            v.verify(None, Some("abc"), b"{}", 0),
            Err(AuthError::MissingHeaders)
        );
        assert_eq!(
            v.verify(Some("123"), None, b"{}", 0),
            Err(AuthError::MissingHeaders)
        );
        assert_eq!(v.verify(None, None, b"{}", 0), Err(AuthError::MissingHeaders));
    }

    #[test]
    fn test_replay_window_boundary() {
        let v = verifier();
        let now = 1_700_000_000_000;
        let body = b"{}";

        // One millisecond past the window: rejected.
        let stale = (now - DEFAULT_REPLAY_WINDOW_MS - 1).to_string();
        let sig = v.sign(&stale, body);
        assert_eq!(
            v.verify(Some(&stale), Some(&sig), body, now),
            Err(AuthError::TimestampExpired)
        );

        // One millisecond inside the window: accepted.
        let fresh = (now - DEFAULT_REPLAY_WINDOW_MS + 1).to_string();
        let sig = v.sign(&fresh, body);
        assert_eq!(v.verify(Some(&fresh), Some(&sig), body, now), Ok(()));
    }

    #[test]
    fn test_future_dated_rejected() {
        let v = verifier();
        let now = 1_700_000_000_000;
        let body = b"{}";

        let future = (now + DEFAULT_REPLAY_WINDOW_MS + 1).to_string();
        let sig = v.sign(&future, body);
        assert_eq!(
            v.verify(Some(&future), Some(&sig), body, now),
            Err(AuthError::TimestampExpired)
        );
    }

    #[test]
    fn test_unparseable_timestamp_rejected() {
        let v = verifier();
        assert_eq!(
            v.verify(Some("not-a-number"), Some("abc"), b"{}", 0),
            Err(AuthError::TimestampExpired)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signer = SignatureVerifier::new("other-secret", DEFAULT_REPLAY_WINDOW_MS);
        let v = verifier();
        let now = 1_700_000_000_000;
        let ts = now.to_string();
        let body = br#"{"prompt":"hello"}"#;
        let sig = signer.sign(&ts, body);

        assert_eq!(
            v.verify(Some(&ts), Some(&sig), body, now),
            Err(AuthError::InvalidSignature)
        );
    }
}
