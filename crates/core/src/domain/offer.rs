use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::{Actor, ActorRole, AgentId};
use crate::domain::hotel::{Hotel, HotelId};
use crate::domain::quote::Quote;
use crate::errors::DomainError;
use crate::flows::{OfferEvent, TransitionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferId(pub String);

impl OfferId {
    pub fn generate() -> Self {
        Self(format!("OFR-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Quoted,
    Accepted,
    Rejected,
    Expired,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 5] =
        [Self::Pending, Self::Quoted, Self::Accepted, Self::Rejected, Self::Expired];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Quoted => "quoted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "quoted" => Some(Self::Quoted),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Expired)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCounts {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

impl GuestCounts {
    /// Guests that occupy a bed. Infants share.
    pub fn occupants(&self) -> u32 {
        self.adults + self.children
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRequirement {
    pub room_type: String,
    pub quantity: u32,
    pub guests_per_room: GuestCounts,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Decimal,
    pub max: Decimal,
}

/// What a travel agent submits when asking a DMC for a quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRequest {
    pub hotel_id: HotelId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: GuestCounts,
    #[serde(default)]
    pub room_requirements: Vec<RoomRequirement>,
    #[serde(default)]
    pub budget: Option<BudgetRange>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OfferRequest {
    pub fn validate(&self, hotel: &Hotel, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !hotel.active {
            return Err(DomainError::validation(format!(
                "hotel `{}` is no longer accepting requests",
                hotel.id
            )));
        }

        let today = now.date_naive();
        if self.check_in < today || self.check_out < today {
            return Err(DomainError::validation("stay dates must not be in the past"));
        }
        if self.check_out <= self.check_in {
            return Err(DomainError::validation(format!(
                "check-out {} must be after check-in {}",
                self.check_out, self.check_in
            )));
        }

        if self.guests.adults == 0 {
            return Err(DomainError::validation("at least one adult guest is required"));
        }

        for requirement in &self.room_requirements {
            if requirement.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "room requirement `{}` must request at least one room",
                    requirement.room_type
                )));
            }
            let Some(room) = hotel.room_type(&requirement.room_type) else {
                return Err(DomainError::validation(format!(
                    "hotel `{}` has no room type `{}`",
                    hotel.id, requirement.room_type
                )));
            };
            if requirement.guests_per_room.adults == 0 {
                return Err(DomainError::validation(format!(
                    "each `{}` room needs at least one adult",
                    requirement.room_type
                )));
            }
            if requirement.guests_per_room.occupants() > room.max_occupancy {
                return Err(DomainError::validation(format!(
                    "room type `{}` sleeps at most {} guests, requested {}",
                    room.name,
                    room.max_occupancy,
                    requirement.guests_per_room.occupants()
                )));
            }
        }

        if let Some(budget) = &self.budget {
            if budget.min.is_sign_negative() || budget.max.is_sign_negative() {
                return Err(DomainError::validation("budget bounds must not be negative"));
            }
            if budget.min > budget.max {
                return Err(DomainError::validation(format!(
                    "budget minimum {} exceeds maximum {}",
                    budget.min, budget.max
                )));
            }
        }

        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return Err(DomainError::validation("expires_at must be in the future"));
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub travel_agent_id: AgentId,
    pub dmc_agent_id: AgentId,
    pub hotel_id: HotelId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub guests: GuestCounts,
    pub room_requirements: Vec<RoomRequirement>,
    pub budget: Option<BudgetRange>,
    pub special_requests: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: OfferStatus,
    pub quote: Option<Quote>,
    pub quoted_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(
        id: OfferId,
        requester: &Actor,
        hotel: &Hotel,
        request: OfferRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        requester.require_role(ActorRole::TravelAgent)?;
        if request.hotel_id != hotel.id {
            return Err(DomainError::validation(format!(
                "request names hotel `{}` but `{}` was resolved",
                request.hotel_id, hotel.id
            )));
        }
        request.validate(hotel, now)?;

        let nights = (request.check_out - request.check_in).num_days();
        let nights = u32::try_from(nights).map_err(|_| {
            DomainError::validation(format!("stay of {nights} nights is not supported"))
        })?;

        Ok(Self {
            id,
            travel_agent_id: requester.id.clone(),
            dmc_agent_id: hotel.dmc_agent_id.clone(),
            hotel_id: hotel.id.clone(),
            check_in: request.check_in,
            check_out: request.check_out,
            nights,
            guests: request.guests,
            room_requirements: request.room_requirements,
            budget: request.budget,
            special_requests: request.special_requests,
            expires_at: request.expires_at,
            status: OfferStatus::Pending,
            quote: None,
            quoted_at: None,
            responded_at: None,
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
        Err(DomainError::Forbidden(format!("`{}` is not a party to offer `{}`", actor.id, self.id)))
    }

    pub fn ensure_travel_agent(&self, actor: &Actor) -> Result<(), DomainError> {
        actor.require_role(ActorRole::TravelAgent)?;
        self.ensure_participant(actor)
    }

    pub fn ensure_dmc_agent(&self, actor: &Actor) -> Result<(), DomainError> {
        actor.require_role(ActorRole::DmcAgent)?;
        self.ensure_participant(actor)
    }

    pub fn quote_expired(&self, now: DateTime<Utc>) -> bool {
        self.quote.as_ref().is_some_and(|quote| quote.is_expired(now))
    }

    /// The sweep event this offer is due for at `now`, if any.
    pub fn lapse_event(&self, now: DateTime<Utc>) -> Option<OfferEvent> {
        match self.status {
            OfferStatus::Pending => self
                .expires_at
                .filter(|expires_at| now > *expires_at)
                .map(|_| OfferEvent::OfferLapsed),
            OfferStatus::Quoted if self.quote_expired(now) => Some(OfferEvent::QuoteLapsed),
            _ => None,
        }
    }

    pub fn attach_quote(&mut self, quote: Quote, outcome: &TransitionOutcome, now: DateTime<Utc>) {
        self.quote = Some(quote);
        self.quoted_at = Some(now);
        self.apply(outcome, now);
    }

    /// Moves the offer to the outcome's target state and bumps the version.
    pub fn apply(&mut self, outcome: &TransitionOutcome, now: DateTime<Utc>) {
        self.status = outcome.to;
        if matches!(outcome.to, OfferStatus::Accepted | OfferStatus::Rejected) {
            self.responded_at = Some(now);
        }
        self.version += 1;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        BudgetRange, GuestCounts, Offer, OfferId, OfferRequest, OfferStatus, RoomRequirement,
    };
    use crate::domain::actor::Actor;
    use crate::domain::hotel::{Hotel, HotelDraft, HotelId, Location, RoomType};
    use crate::errors::DomainError;
    use crate::flows::{FlowEngine, OfferEvent};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2027, 5, 1, 10, 0, 0).single().expect("instant")
    }

    fn hotel() -> Hotel {
        Hotel::create(
            HotelId("HTL-1".to_owned()),
            &Actor::dmc_agent("dmc-1"),
            HotelDraft {
                name: "Hotel Lisboa".to_owned(),
                location: Location {
                    city: "Lisbon".to_owned(),
                    country: "Portugal".to_owned(),
                    address: None,
                    district: Some("Baixa".to_owned()),
                },
                star_rating: 4,
                amenities: Default::default(),
                room_types: vec![RoomType {
                    name: "Double".to_owned(),
                    max_occupancy: 2,
                    base_price: Decimal::new(180, 0),
                }],
                description: None,
            },
            now(),
        )
        .expect("valid hotel")
    }

    fn request() -> OfferRequest {
        OfferRequest {
            hotel_id: HotelId("HTL-1".to_owned()),
            check_in: NaiveDate::from_ymd_opt(2027, 6, 10).expect("date"),
            check_out: NaiveDate::from_ymd_opt(2027, 6, 14).expect("date"),
            guests: GuestCounts { adults: 2, children: 0, infants: 1 },
            room_requirements: vec![RoomRequirement {
                room_type: "double".to_owned(),
                quantity: 1,
                guests_per_room: GuestCounts { adults: 2, children: 0, infants: 1 },
            }],
            budget: Some(BudgetRange { min: Decimal::new(500, 0), max: Decimal::new(900, 0) }),
            special_requests: Some("High floor".to_owned()),
            expires_at: Some(now() + Duration::days(3)),
        }
    }

    fn pending_offer() -> Offer {
        Offer::new(OfferId::generate(), &Actor::travel_agent("ta-1"), &hotel(), request(), now())
            .expect("valid request")
    }

    #[test]
    fn new_offer_is_pending_and_copies_dmc_from_hotel() {
        let offer = pending_offer();

        assert_eq!(offer.status, OfferStatus::Pending);
        assert_eq!(offer.dmc_agent_id.0, "dmc-1");
        assert_eq!(offer.nights, 4);
        assert_eq!(offer.version, 1);
    }

    #[test]
    fn rejects_bad_dates_budget_and_occupancy() {
        let hotel = hotel();
        let actor = Actor::travel_agent("ta-1");

        let mut reversed = request();
        reversed.check_out = reversed.check_in;
        assert!(matches!(
            Offer::new(OfferId::generate(), &actor, &hotel, reversed, now()),
            Err(DomainError::Validation(_))
        ));

        let mut past = request();
        past.check_in = NaiveDate::from_ymd_opt(2027, 4, 30).expect("date");
        assert!(Offer::new(OfferId::generate(), &actor, &hotel, past, now()).is_err());

        let mut budget = request();
        budget.budget = Some(BudgetRange { min: Decimal::new(10, 0), max: Decimal::new(5, 0) });
        assert!(Offer::new(OfferId::generate(), &actor, &hotel, budget, now()).is_err());

        let mut crowded = request();
        crowded.room_requirements[0].guests_per_room.children = 1;
        assert!(Offer::new(OfferId::generate(), &actor, &hotel, crowded, now()).is_err());

        let mut stale = request();
        stale.expires_at = Some(now());
        assert!(Offer::new(OfferId::generate(), &actor, &hotel, stale, now()).is_err());
    }

    #[test]
    fn request_without_room_requirements_parses_and_validates() {
        let request: OfferRequest = serde_json::from_value(serde_json::json!({
            "hotel_id": "HTL-1",
            "check_in": "2027-06-10",
            "check_out": "2027-06-12",
            "guests": { "adults": 2, "children": 0, "infants": 0 }
        }))
        .expect("room requirements and budget are optional");

        assert!(request.room_requirements.is_empty());
        assert_eq!(request.budget, None);
        let offer =
            Offer::new(OfferId::generate(), &Actor::travel_agent("ta-1"), &hotel(), request, now())
                .expect("offer without room requirements");
        assert_eq!(offer.nights, 2);

        let actor = Actor::travel_agent("ta-1");
        let mut zero_rooms = self::request();
        zero_rooms.room_requirements[0].quantity = 0;
        assert!(matches!(
            Offer::new(OfferId::generate(), &actor, &hotel(), zero_rooms, now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn inactive_hotel_and_wrong_role_are_refused() {
        let mut hotel = hotel();
        let dmc = Actor::dmc_agent("dmc-1");
        assert!(matches!(
            Offer::new(OfferId::generate(), &dmc, &hotel, request(), now()),
            Err(DomainError::Forbidden(_))
        ));

        hotel.deactivate(now());
        assert!(matches!(
            Offer::new(OfferId::generate(), &Actor::travel_agent("ta-1"), &hotel, request(), now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn participants_are_checked_by_role_and_id() {
        let offer = pending_offer();

        assert!(offer.ensure_travel_agent(&Actor::travel_agent("ta-1")).is_ok());
        assert!(offer.ensure_travel_agent(&Actor::travel_agent("ta-2")).is_err());
        assert!(offer.ensure_dmc_agent(&Actor::dmc_agent("dmc-1")).is_ok());
        assert!(offer.ensure_dmc_agent(&Actor::travel_agent("ta-1")).is_err());
    }

    #[test]
    fn pending_offer_lapses_only_after_expiry() {
        let mut offer = pending_offer();

        assert_eq!(offer.lapse_event(now() + Duration::days(1)), None);
        let due = now() + Duration::days(4);
        assert_eq!(offer.lapse_event(due), Some(OfferEvent::OfferLapsed));

        let outcome = FlowEngine::default()
            .apply(offer.status, OfferEvent::OfferLapsed)
            .expect("pending lapses");
        offer.apply(&outcome, due);

        assert_eq!(offer.status, OfferStatus::Expired);
        assert_eq!(offer.version, 2);
        assert_eq!(offer.lapse_event(due), None);
    }
}
