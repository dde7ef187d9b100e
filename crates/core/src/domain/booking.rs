use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::{Actor, ActorRole, AgentId};
use crate::domain::hotel::HotelId;
use crate::domain::offer::{Offer, OfferId, OfferStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub String);

impl BookingId {
    pub fn generate() -> Self {
        Self(format!("BKG-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 3] = [Self::Confirmed, Self::Cancelled, Self::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Confirmed, BookingStatus::Cancelled)
                | (Self::Confirmed, BookingStatus::Completed)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryGuest {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalGuest {
    pub name: String,
    #[serde(default)]
    pub age: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDetails {
    pub primary_guest: PrimaryGuest,
    #[serde(default)]
    pub additional_guests: Vec<AdditionalGuest>,
}

impl GuestDetails {
    pub fn validate(&self) -> Result<(), DomainError> {
        let primary = &self.primary_guest;
        if primary.name.trim().is_empty() {
            return Err(DomainError::validation("primary guest name is required"));
        }
        let email = primary.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            return Err(DomainError::validation(format!(
                "primary guest email `{email}` is not a valid address"
            )));
        }
        if primary.phone.trim().is_empty() {
            return Err(DomainError::validation("primary guest phone is required"));
        }
        if self.additional_guests.iter().any(|guest| guest.name.trim().is_empty()) {
            return Err(DomainError::validation("additional guests need a name"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub offer_id: OfferId,
    pub travel_agent_id: AgentId,
    pub dmc_agent_id: AgentId,
    pub hotel_id: HotelId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_details: GuestDetails,
    pub status: BookingStatus,
    pub confirmation_number: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub special_requests: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Builds the booking for an offer that has just moved to `Accepted`.
    /// Price and currency come from the offer's quote.
    pub fn from_accepted_offer(
        id: BookingId,
        offer: &Offer,
        confirmation_number: String,
        guest_details: GuestDetails,
        special_requests: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if offer.status != OfferStatus::Accepted {
            return Err(DomainError::InvalidState {
                entity: "offer",
                state: offer.status.as_str().to_owned(),
                operation: "book".to_owned(),
            });
        }
        let Some(quote) = offer.quote.as_ref() else {
            return Err(DomainError::InvalidState {
                entity: "offer",
                state: "unquoted".to_owned(),
                operation: "book".to_owned(),
            });
        };
        guest_details.validate()?;

        Ok(Self {
            id,
            offer_id: offer.id.clone(),
            travel_agent_id: offer.travel_agent_id.clone(),
            dmc_agent_id: offer.dmc_agent_id.clone(),
            hotel_id: offer.hotel_id.clone(),
            check_in: offer.check_in,
            check_out: offer.check_out,
            guest_details,
            status: BookingStatus::Confirmed,
            confirmation_number,
            total_amount: quote.total_cost,
            currency: quote.currency.clone(),
            payment_status: PaymentStatus::Pending,
            special_requests: special_requests.or_else(|| offer.special_requests.clone()),
            cancelled_at: None,
            cancellation_reason: None,
            completed_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn involves(&self, actor: &Actor) -> bool {
        match actor.role {
            ActorRole::TravelAgent => self.travel_agent_id == actor.id,
            ActorRole::DmcAgent => self.dmc_agent_id == actor.id,
        }
    }

    pub fn ensure_participant(&self, actor: &Actor) -> Result<(), DomainError> {
        if self.involves(actor) {
            return Ok(());
        }
        Err(DomainError::Forbidden(format!(
            "`{}` is not a party to booking `{}`",
            actor.id, self.id
        )))
    }

    /// Full refund; only before the check-in day.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(self.invalid_state("cancel"));
        }
        if self.check_in <= now.date_naive() {
            return Err(DomainError::InvalidState {
                entity: "booking",
                state: format!("{} (check-in {} reached)", self.status.as_str(), self.check_in),
                operation: "cancel".to_owned(),
            });
        }

        self.status = BookingStatus::Cancelled;
        self.payment_status = PaymentStatus::Refunded;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason.filter(|reason| !reason.trim().is_empty());
        self.touch(now);
        Ok(())
    }

    /// Returns `false` when the booking was already completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<bool, DomainError> {
        match self.status {
            BookingStatus::Completed => return Ok(false),
            BookingStatus::Cancelled => return Err(self.invalid_state("complete")),
            BookingStatus::Confirmed => {}
        }
        if self.check_out > now.date_naive() {
            return Err(DomainError::InvalidState {
                entity: "booking",
                state: format!(
                    "{} (check-out {} not reached)",
                    self.status.as_str(),
                    self.check_out
                ),
                operation: "complete".to_owned(),
            });
        }

        self.status = BookingStatus::Completed;
        self.completed_at = Some(now);
        self.touch(now);
        Ok(true)
    }

    pub fn is_due_for_completion(&self, today: NaiveDate) -> bool {
        self.status == BookingStatus::Confirmed && self.check_out <= today
    }

    pub fn record_payment(
        &mut self,
        outcome: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !matches!(outcome, PaymentStatus::Paid | PaymentStatus::Failed) {
            return Err(DomainError::validation(format!(
                "payment outcome must be `paid` or `failed`, got `{}`",
                outcome.as_str()
            )));
        }
        if self.status != BookingStatus::Confirmed
            || !matches!(self.payment_status, PaymentStatus::Pending | PaymentStatus::Failed)
        {
            return Err(DomainError::InvalidState {
                entity: "booking",
                state: format!("{}/{}", self.status.as_str(), self.payment_status.as_str()),
                operation: "record payment for".to_owned(),
            });
        }

        self.payment_status = outcome;
        self.touch(now);
        Ok(())
    }

    fn invalid_state(&self, operation: &str) -> DomainError {
        DomainError::InvalidState {
            entity: "booking",
            state: self.status.as_str().to_owned(),
            operation: operation.to_owned(),
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        AdditionalGuest, Booking, BookingId, BookingStatus, GuestDetails, PaymentStatus,
        PrimaryGuest,
    };
    use crate::domain::actor::{Actor, AgentId};
    use crate::domain::hotel::HotelId;
    use crate::domain::offer::{GuestCounts, Offer, OfferId, OfferStatus};
    use crate::domain::quote::{QuoteDraft, RoomRate};
    use crate::errors::DomainError;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2027, 5, 1, 10, 0, 0).single().expect("instant")
    }

    fn guests() -> GuestDetails {
        GuestDetails {
            primary_guest: PrimaryGuest {
                name: "Ana Ruiz".to_owned(),
                email: "ana@example.com".to_owned(),
                phone: "+34 600 000 000".to_owned(),
            },
            additional_guests: vec![AdditionalGuest { name: "Leo Ruiz".to_owned(), age: Some(8) }],
        }
    }

    fn accepted_offer() -> Offer {
        let quote = QuoteDraft {
            room_breakdown: vec![RoomRate::new("Double", 2, 5, Decimal::new(320, 0))],
            total_cost: Decimal::new(3200, 0),
            currency: "EUR".to_owned(),
            inclusions: Vec::new(),
            exclusions: Vec::new(),
            payment_terms: "Prepaid".to_owned(),
            cancellation_policy: "Refundable".to_owned(),
            valid_until: now() + Duration::days(5),
            notes: None,
        }
        .into_quote(AgentId("dmc-1".to_owned()), now());

        Offer {
            id: OfferId("OFR-1".to_owned()),
            travel_agent_id: AgentId("ta-1".to_owned()),
            dmc_agent_id: AgentId("dmc-1".to_owned()),
            hotel_id: HotelId("HTL-1".to_owned()),
            check_in: NaiveDate::from_ymd_opt(2027, 6, 10).expect("date"),
            check_out: NaiveDate::from_ymd_opt(2027, 6, 15).expect("date"),
            nights: 5,
            guests: GuestCounts { adults: 2, children: 1, infants: 0 },
            room_requirements: Vec::new(),
            budget: None,
            special_requests: Some("Late arrival".to_owned()),
            expires_at: None,
            status: OfferStatus::Accepted,
            quote: Some(quote),
            quoted_at: Some(now()),
            responded_at: Some(now()),
            version: 3,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn booking() -> Booking {
        Booking::from_accepted_offer(
            BookingId::generate(),
            &accepted_offer(),
            "VYG-2027-ABCD2345".to_owned(),
            guests(),
            None,
            now(),
        )
        .expect("accepted offer books")
    }

    #[test]
    fn booking_copies_price_from_quote() {
        let booking = booking();

        assert_eq!(booking.total_amount, Decimal::new(3200, 0));
        assert_eq!(booking.currency, "EUR");
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.special_requests.as_deref(), Some("Late arrival"));
    }

    #[test]
    fn only_accepted_offers_can_be_booked() {
        let mut offer = accepted_offer();
        offer.status = OfferStatus::Quoted;

        let error = Booking::from_accepted_offer(
            BookingId::generate(),
            &offer,
            "VYG-2027-ABCD2345".to_owned(),
            guests(),
            None,
            now(),
        )
        .expect_err("quoted offer is not bookable");
        assert!(matches!(error, DomainError::InvalidState { .. }));
    }

    #[test]
    fn cancel_before_check_in_refunds() {
        let mut booking = booking();
        booking.cancel(Some("Client changed plans".to_owned()), now()).expect("future check-in");

        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.payment_status, PaymentStatus::Refunded);
        assert_eq!(booking.version, 2);
        assert!(booking.cancel(None, now()).is_err());
    }

    #[test]
    fn cancel_on_or_after_check_in_is_invalid_state() {
        let mut booking = booking();
        let check_in_day = Utc.with_ymd_and_hms(2027, 6, 10, 8, 0, 0).single().expect("instant");

        let error = booking.cancel(None, check_in_day).expect_err("check-in reached");
        assert!(matches!(error, DomainError::InvalidState { entity: "booking", .. }));
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn complete_waits_for_check_out_and_is_idempotent() {
        let mut booking = booking();
        assert!(booking.complete(now()).is_err());

        let after = Utc.with_ymd_and_hms(2027, 6, 15, 12, 0, 0).single().expect("instant");
        assert!(booking.is_due_for_completion(after.date_naive()));
        assert_eq!(booking.complete(after), Ok(true));
        assert_eq!(booking.complete(after), Ok(false));
        assert_eq!(booking.status, BookingStatus::Completed);
    }

    #[test]
    fn payment_can_be_retried_after_failure_but_not_after_payment() {
        let mut booking = booking();
        booking.record_payment(PaymentStatus::Failed, now()).expect("pending -> failed");
        booking.record_payment(PaymentStatus::Paid, now()).expect("failed -> paid");
        assert!(booking.record_payment(PaymentStatus::Paid, now()).is_err());
        assert!(booking.record_payment(PaymentStatus::Refunded, now()).is_err());
    }

    #[test]
    fn guest_email_is_checked() {
        let mut details = guests();
        details.primary_guest.email = "not-an-email".to_owned();
        assert!(details.validate().is_err());
    }
}
