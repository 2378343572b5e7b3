//! Payment QR validity windows.
//!
//! A QR is issued for a pending order and stays usable for a fixed TTL.
//! Expiry never touches the order itself: an expired QR only stops being
//! shown or accepted until a fresh one is generated.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default QR lifetime (15 minutes).
pub const DEFAULT_QR_TTL: Duration = Duration::from_secs(15 * 60);

/// The interval during which an issued QR is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrWindow {
    /// When the QR was issued.
    pub issued_at: DateTime<Utc>,
    /// When the QR stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl QrWindow {
    /// Open a window of length `ttl` starting at `now`.
    ///
    /// A TTL too large for `chrono` is clamped to one day.
    #[must_use]
    pub fn open(now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        Self {
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    /// Time left before expiry, saturating at zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whole seconds left, for countdown displays.
    #[must_use]
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> u64 {
        self.remaining(now).as_secs()
    }

    /// Returns `true` once `now` has reached `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Observed state of this window at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> QrState {
        if self.is_expired(now) {
            QrState::Expired {
                expired_at: self.expires_at,
            }
        } else {
            QrState::Active {
                expires_at: self.expires_at,
                seconds_remaining: self.seconds_remaining(now),
            }
        }
    }
}

/// What a client should show for an order's QR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrState {
    /// No QR has been generated, or the last one was consumed.
    None,
    /// Usable now.
    #[serde(rename_all = "camelCase")]
    Active {
        /// Expiry instant.
        expires_at: DateTime<Utc>,
        /// Whole seconds left.
        seconds_remaining: u64,
    },
    /// Past its expiry; a new QR must be generated.
    #[serde(rename_all = "camelCase")]
    Expired {
        /// When it expired.
        expired_at: DateTime<Utc>,
    },
}

impl QrState {
    /// Returns `true` if the QR may be shown or accepted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_countdown_ticks_down_and_saturates() {
        let window = QrWindow::open(at(0), Duration::from_secs(60));

        assert_eq!(window.seconds_remaining(at(0)), 60);
        assert_eq!(window.seconds_remaining(at(59)), 1);
        assert_eq!(window.seconds_remaining(at(60)), 0);
        assert_eq!(window.seconds_remaining(at(3600)), 0);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let window = QrWindow::open(at(0), DEFAULT_QR_TTL);
        assert!(!window.is_expired(at(899)));
        assert!(window.is_expired(at(900)));
    }

    #[test]
    fn test_state_reflects_window() {
        let window = QrWindow::open(at(0), Duration::from_secs(30));

        let active = window.state(at(10));
        assert!(active.is_active());
        assert_eq!(
            active,
            QrState::Active {
                expires_at: at(30),
                seconds_remaining: 20,
            }
        );

        assert_eq!(
            window.state(at(31)),
            QrState::Expired { expired_at: at(30) }
        );
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(QrState::Active {
            expires_at: at(30),
            seconds_remaining: 5,
        })
        .unwrap();
        assert_eq!(json["state"], "ACTIVE");
        assert_eq!(json["secondsRemaining"], 5);

        let none = serde_json::to_value(QrState::None).unwrap();
        assert_eq!(none["state"], "NONE");
    }
}
