//! Signed payment QR payloads.
//!
//! A payload is the URL-safe base64 encoding of
//! `order_id:order_number:expires_unix:checksum`, where `checksum` is the
//! SHA-256 of the server secret and the three fields. The payload is what a
//! QR image encodes; scanning it at the counter yields the order without
//! trusting anything the customer's device says.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

use etuckshop_core::{OrderId, OrderNumber};

/// Decoded contents of a QR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrToken {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub expires_at: DateTime<Utc>,
}

/// Why a scanned payload was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QrTokenError {
    /// Not something this server issued.
    #[error("malformed QR payload")]
    Malformed,
    /// Well-formed but the checksum does not match.
    #[error("QR checksum mismatch")]
    BadChecksum,
}

/// Signs and verifies QR payloads with the server secret.
#[derive(Clone)]
pub struct QrSigner {
    secret: SecretString,
}

impl std::fmt::Debug for QrSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrSigner").finish_non_exhaustive()
    }
}

impl QrSigner {
    /// Create a signer from the server secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Encode `token` as an opaque payload.
    #[must_use]
    pub fn sign(&self, token: &QrToken) -> String {
        let body = format!(
            "{}:{}:{}",
            token.order_id,
            token.order_number,
            token.expires_at.timestamp()
        );
        let checksum = self.checksum(&body);
        URL_SAFE_NO_PAD.encode(format!("{body}:{checksum}"))
    }

    /// Decode and check a payload.
    ///
    /// This only proves the payload was issued by this server. Whether the
    /// QR is still active is a question for the database.
    ///
    /// # Errors
    ///
    /// Returns [`QrTokenError::Malformed`] if the payload cannot be parsed and
    /// [`QrTokenError::BadChecksum`] if it was tampered with.
    pub fn verify(&self, payload: &str) -> Result<QrToken, QrTokenError> {
        let raw = URL_SAFE_NO_PAD
            .decode(payload.trim())
            .map_err(|_| QrTokenError::Malformed)?;
        let text = String::from_utf8(raw).map_err(|_| QrTokenError::Malformed)?;

        let (body, checksum) = text.rsplit_once(':').ok_or(QrTokenError::Malformed)?;

        let mut fields = body.split(':');
        let (Some(id), Some(number), Some(expires), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(QrTokenError::Malformed);
        };

        let order_id = id
            .parse::<i32>()
            .map(OrderId::new)
            .map_err(|_| QrTokenError::Malformed)?;
        let order_number = OrderNumber::parse(number).map_err(|_| QrTokenError::Malformed)?;
        let expires_at = expires
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(QrTokenError::Malformed)?;

        if !constant_time_eq(self.checksum(body).as_bytes(), checksum.as_bytes()) {
            return Err(QrTokenError::BadChecksum);
        }

        Ok(QrToken {
            order_id,
            order_number,
            expires_at,
        })
    }

    fn checksum(&self, body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.expose_secret().as_bytes());
        hasher.update(b":");
        hasher.update(body.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn signer(secret: &str) -> QrSigner {
        QrSigner::new(SecretString::from(secret.to_string()))
    }

    fn token() -> QrToken {
        QrToken {
            order_id: OrderId::new(42),
            order_number: OrderNumber::parse("ORD-20261014-7KQ2ZX").unwrap(),
            expires_at: Utc.timestamp_opt(1_800_000_900, 0).unwrap(),
        }
    }

    #[test]
    fn test_signed_payload_verifies() {
        let signer = signer("k9#Vq2!mZ7@pL4$wX8^rT1&yB6*nC3%d");
        let payload = signer.sign(&token());

        assert!(
            payload
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        );
        assert_eq!(signer.verify(&payload).unwrap(), token());
    }

    #[test]
    fn test_other_secret_rejects() {
        let payload = signer("first-key-aB3$xY9!mK2@nL5#pQ7&r").sign(&token());
        assert_eq!(
            signer("second-key-T0*uW4^zC6aB3$xY9!mK2").verify(&payload),
            Err(QrTokenError::BadChecksum)
        );
    }

    #[test]
    fn test_tampered_fields_reject() {
        let signer = signer("k9#Vq2!mZ7@pL4$wX8^rT1&yB6*nC3%d");
        let payload = signer.sign(&token());
        let text = String::from_utf8(URL_SAFE_NO_PAD.decode(&payload).unwrap()).unwrap();

        // Point the checksum at a different order
        let forged = URL_SAFE_NO_PAD.encode(text.replacen("42:", "43:", 1));
        assert_eq!(signer.verify(&forged), Err(QrTokenError::BadChecksum));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let signer = signer("k9#Vq2!mZ7@pL4$wX8^rT1&yB6*nC3%d");
        let too_short = URL_SAFE_NO_PAD.encode("1:2");
        let bad_id = URL_SAFE_NO_PAD.encode("x:ORD-20261014-7KQ2ZX:1:c");

        for bad in ["", "not base64!", too_short.as_str(), bad_id.as_str()] {
            assert_eq!(signer.verify(bad), Err(QrTokenError::Malformed), "{bad}");
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
