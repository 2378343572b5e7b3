//! Order status state machine and order numbers.
//!
//! ```text
//!            pay (PAYNOW)          complete
//!   PENDING ──────────────▶ PAID ───────────▶ COMPLETED
//!      │  └──────────── complete (CASH) ────────▲
//!      │                     │
//!      └── cancel/reject ────┴── cancel/reject ─▶ CANCELLED
//! ```
//!
//! `COMPLETED` and `CANCELLED` are absorbing. Side effects (stock restore,
//! timestamps, QR retirement) are applied by the server around a successful
//! transition; this module only decides whether a transition is legal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{OrderStatus, PaymentType};

/// An event that moves an order between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderTransition {
    /// Online payment settled.
    Pay,
    /// Order handed over at the counter.
    Complete,
    /// Customer withdrew the order.
    Cancel,
    /// Admin refused the order.
    Reject,
}

impl std::fmt::Display for OrderTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pay => "pay",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Reject => "reject",
        };
        f.write_str(label)
    }
}

/// A transition that the state machine refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The event is not valid from the current status.
    #[error("cannot {event} an order that is {from}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Attempted event.
        event: OrderTransition,
    },

    /// The event only applies to the other payment type.
    #[error("cannot {event} a {payment_type} order")]
    WrongPaymentType {
        /// The order's payment type.
        payment_type: PaymentType,
        /// Attempted event.
        event: OrderTransition,
    },
}

impl OrderStatus {
    /// Returns `true` if some event can move an order from `self` to `next`.
    ///
    /// This ignores payment type; use [`apply`] for the full rule.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Completed | Self::Cancelled)
                | (Self::Paid, Self::Completed | Self::Cancelled)
        )
    }
}

/// Apply `event` to an order in `from` status paid with `payment_type`.
///
/// # Errors
///
/// Returns [`TransitionError::WrongPaymentType`] when paying a CASH order
/// online, and [`TransitionError::InvalidTransition`] when the event is not
/// allowed from `from`.
pub const fn apply(
    from: OrderStatus,
    payment_type: PaymentType,
    event: OrderTransition,
) -> Result<OrderStatus, TransitionError> {
    use OrderStatus::{Cancelled, Completed, Paid, Pending};

    let next = match (event, from) {
        (OrderTransition::Pay, Pending) => {
            if matches!(payment_type, PaymentType::Cash) {
                return Err(TransitionError::WrongPaymentType {
                    payment_type,
                    event,
                });
            }
            Paid
        }
        (OrderTransition::Complete, Paid) => Completed,
        (OrderTransition::Complete, Pending) => {
            // PayNow orders must settle before pickup
            if matches!(payment_type, PaymentType::Paynow) {
                return Err(TransitionError::InvalidTransition { from, event });
            }
            Completed
        }
        (OrderTransition::Cancel | OrderTransition::Reject, Pending | Paid) => Cancelled,
        _ => return Err(TransitionError::InvalidTransition { from, event }),
    };

    Ok(next)
}

/// Characters used in order number suffixes (no 0/O, 1/I lookalikes).
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 6;
const PREFIX: &str = "ORD-";

/// Human-facing order reference, e.g. `ORD-20261014-7KQ2ZX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

/// Error parsing an [`OrderNumber`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order number: {0}")]
pub struct InvalidOrderNumber(pub String);

impl OrderNumber {
    /// Generate a new order number for `date` using `rng` for the suffix.
    #[must_use]
    pub fn generate<R: rand::Rng>(date: NaiveDate, rng: &mut R) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| {
                let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
                char::from(SUFFIX_ALPHABET.get(idx).copied().unwrap_or(b'X'))
            })
            .collect();
        Self(format!("{PREFIX}{}-{suffix}", date.format("%Y%m%d")))
    }

    /// Parse an order number, checking its shape.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidOrderNumber`] if the prefix, date or suffix is malformed.
    pub fn parse(s: &str) -> Result<Self, InvalidOrderNumber> {
        let invalid = || InvalidOrderNumber(s.to_owned());
        let rest = s.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let (date, suffix) = rest.split_once('-').ok_or_else(invalid)?;

        NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid())?;

        let suffix_ok = date.len() == 8
            && suffix.len() == SUFFIX_LEN
            && suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b));
        if !suffix_ok {
            return Err(invalid());
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `OrderNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_paynow_happy_path() {
        let paid = apply(OrderStatus::Pending, PaymentType::Paynow, OrderTransition::Pay).unwrap();
        assert_eq!(paid, OrderStatus::Paid);

        let done = apply(paid, PaymentType::Paynow, OrderTransition::Complete).unwrap();
        assert_eq!(done, OrderStatus::Completed);
    }

    #[test]
    fn test_cash_completes_straight_from_pending() {
        assert_eq!(
            apply(OrderStatus::Pending, PaymentType::Cash, OrderTransition::Complete),
            Ok(OrderStatus::Completed)
        );
    }

    #[test]
    fn test_cash_orders_cannot_be_paid_online() {
        assert_eq!(
            apply(OrderStatus::Pending, PaymentType::Cash, OrderTransition::Pay),
            Err(TransitionError::WrongPaymentType {
                payment_type: PaymentType::Cash,
                event: OrderTransition::Pay,
            })
        );
    }

    #[test]
    fn test_unpaid_paynow_cannot_complete() {
        assert!(matches!(
            apply(OrderStatus::Pending, PaymentType::Paynow, OrderTransition::Complete),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_and_reject_from_open_states() {
        for from in [OrderStatus::Pending, OrderStatus::Paid] {
            for event in [OrderTransition::Cancel, OrderTransition::Reject] {
                assert_eq!(
                    apply(from, PaymentType::Paynow, event),
                    Ok(OrderStatus::Cancelled)
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_absorb_every_event() {
        let events = [
            OrderTransition::Pay,
            OrderTransition::Complete,
            OrderTransition::Cancel,
            OrderTransition::Reject,
        ];
        for from in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for payment_type in [PaymentType::Cash, PaymentType::Paynow] {
                for event in events {
                    assert!(apply(from, payment_type, event).is_err(), "{from} {event}");
                }
            }
        }
    }

    #[test]
    fn test_apply_agrees_with_can_transition_to() {
        let events = [
            OrderTransition::Pay,
            OrderTransition::Complete,
            OrderTransition::Cancel,
            OrderTransition::Reject,
        ];
        for from in OrderStatus::ALL {
            for payment_type in [PaymentType::Cash, PaymentType::Paynow] {
                for event in events {
                    if let Ok(next) = apply(from, payment_type, event) {
                        assert!(from.can_transition_to(next));
                    }
                }
            }
        }
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_transition_error_message() {
        let err = apply(OrderStatus::Completed, PaymentType::Cash, OrderTransition::Cancel)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot cancel an order that is COMPLETED");
    }

    #[test]
    fn test_generated_order_number_parses() {
        let mut rng = StdRng::seed_from_u64(7);
        let date = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let number = OrderNumber::generate(date, &mut rng);

        assert!(number.as_str().starts_with("ORD-20261014-"));
        assert_eq!(number.as_str().len(), "ORD-20261014-".len() + SUFFIX_LEN);
        assert_eq!(OrderNumber::parse(number.as_str()), Ok(number));
    }

    #[test]
    fn test_order_number_rejects_malformed() {
        for bad in [
            "",
            "ORD-2026101-ABCDEF",
            "ORD-20261399-ABCDEF",
            "ORD-20261014-ABC",
            "ORD-20261014-ABCDE0",
            "INV-20261014-ABCDEF",
        ] {
            assert!(OrderNumber::parse(bad).is_err(), "{bad}");
        }
    }
}
