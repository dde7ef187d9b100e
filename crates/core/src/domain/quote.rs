use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::actor::AgentId;
use crate::errors::DomainError;

/// One line of the quote's room-rate breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRate {
    pub room_type: String,
    pub quantity: u32,
    pub nights: u32,
    pub rate_per_night: Decimal,
    pub subtotal: Decimal,
}

impl RoomRate {
    pub fn new(
        room_type: impl Into<String>,
        quantity: u32,
        nights: u32,
        rate_per_night: Decimal,
    ) -> Self {
        let mut rate = Self {
            room_type: room_type.into(),
            quantity,
            nights,
            rate_per_night,
            subtotal: Decimal::ZERO,
        };
        rate.subtotal = rate.expected_subtotal();
        rate
    }

    pub fn expected_subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * Decimal::from(self.nights) * self.rate_per_night
    }
}

/// Quote as submitted by a DMC agent, before it is stamped and embedded in an offer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDraft {
    pub room_breakdown: Vec<RoomRate>,
    pub total_cost: Decimal,
    pub currency: String,
    #[serde(default)]
    pub inclusions: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    pub payment_terms: String,
    pub cancellation_policy: String,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl QuoteDraft {
    /// Checks breakdown arithmetic and that the deadline falls in `[now, start of check-in day]`.
    pub fn validate(&self, now: DateTime<Utc>, check_in: NaiveDate) -> Result<(), DomainError> {
        if self.room_breakdown.is_empty() {
            return Err(DomainError::validation("quote must contain at least one room rate"));
        }

        let mut sum = Decimal::ZERO;
        for (index, line) in self.room_breakdown.iter().enumerate() {
            if line.room_type.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "room_breakdown[{index}] is missing a room type"
                )));
            }
            if line.quantity == 0 || line.nights == 0 {
                return Err(DomainError::validation(format!(
                    "room_breakdown[{index}] must have quantity and nights of at least 1"
                )));
            }
            if line.rate_per_night.is_sign_negative() {
                return Err(DomainError::validation(format!(
                    "room_breakdown[{index}] has a negative nightly rate"
                )));
            }
            let expected = line.expected_subtotal();
            if line.subtotal != expected {
                return Err(DomainError::validation(format!(
                    "room_breakdown[{index}] subtotal {} does not equal {} x {} x {} = {expected}",
                    line.subtotal, line.quantity, line.nights, line.rate_per_night
                )));
            }
            sum += expected;
        }

        if self.total_cost != sum {
            return Err(DomainError::validation(format!(
                "total_cost {} does not equal the breakdown sum {sum}",
                self.total_cost
            )));
        }

        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!(
                "currency `{}` must be a 3-letter ISO code",
                self.currency
            )));
        }

        if self.valid_until < now {
            return Err(DomainError::validation("valid_until must not be in the past"));
        }
        let check_in_start = check_in.and_time(NaiveTime::MIN).and_utc();
        if self.valid_until > check_in_start {
            return Err(DomainError::validation(format!(
                "valid_until must not be later than the check-in date {check_in}"
            )));
        }

        Ok(())
    }

    pub fn into_quote(self, quoted_by: AgentId, quoted_at: DateTime<Utc>) -> Quote {
        Quote {
            room_breakdown: self.room_breakdown,
            total_cost: self.total_cost,
            currency: self.currency.trim().to_owned(),
            inclusions: self.inclusions,
            exclusions: self.exclusions,
            payment_terms: self.payment_terms,
            cancellation_policy: self.cancellation_policy,
            valid_until: self.valid_until,
            notes: self.notes,
            quoted_by,
            quoted_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub room_breakdown: Vec<RoomRate>,
    pub total_cost: Decimal,
    pub currency: String,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
    pub payment_terms: String,
    pub cancellation_policy: String,
    pub valid_until: DateTime<Utc>,
    pub notes: Option<String>,
    pub quoted_by: AgentId,
    pub quoted_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}
