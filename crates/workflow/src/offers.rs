use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use voyage_core::confirmation::MAX_CONFIRMATION_ATTEMPTS;
use voyage_core::domain::actor::{ActorRole, RequestContext};
use voyage_core::domain::booking::{Booking, BookingId, GuestDetails};
use voyage_core::domain::offer::{Offer, OfferId, OfferRequest, OfferStatus};
use voyage_core::domain::quote::QuoteDraft;
use voyage_core::errors::{ApplicationError, DomainError};
use voyage_core::events::EventContext;
use voyage_core::flows::{OfferEvent, TransitionOutcome};
use voyage_core::search::{Page, PageRequest};
use voyage_db::repositories::ParticipantQuery;

use crate::service::MarketplaceService;

/// The accepted offer together with the booking committed alongside it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AcceptedOffer {
    pub offer: Offer,
    pub booking: Booking,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OfferStatistics {
    pub total: u64,
    pub by_status: BTreeMap<&'static str, u64>,
}

impl OfferStatistics {
    fn tally(offers: &[Offer]) -> Self {
        let mut by_status: BTreeMap<&'static str, u64> =
            OfferStatus::ALL.iter().map(|status| (status.as_str(), 0)).collect();
        for offer in offers {
            *by_status.entry(offer.status.as_str()).or_default() += 1;
        }
        Self { total: offers.len() as u64, by_status }
    }
}

fn event_context(ctx: &RequestContext, offer_id: &OfferId) -> EventContext {
    EventContext::new(offer_id.0.clone(), ctx.correlation_id.clone(), ctx.actor.id.0.clone())
}

fn transition_metadata(outcome: &TransitionOutcome) -> Vec<(&'static str, String)> {
    vec![("from", outcome.from.as_str().to_owned()), ("to", outcome.to.as_str().to_owned())]
}

impl MarketplaceService {
    pub async fn create_offer(
        &self,
        ctx: &RequestContext,
        request: OfferRequest,
    ) -> Result<Offer, ApplicationError> {
        ctx.actor.require_role(ActorRole::TravelAgent)?;
        let hotel = self.load_hotel(&request.hotel_id).await?;

        let offer = Offer::new(OfferId::generate(), &ctx.actor, &hotel, request, self.now())?;
        self.offers.insert(&offer).await?;

        self.publish(
            &event_context(ctx, &offer.id),
            "offer.created",
            &[
                ("hotel_id", offer.hotel_id.0.clone()),
                ("dmc_agent_id", offer.dmc_agent_id.0.clone()),
            ],
        );
        Ok(offer)
    }

    /// Attaches or replaces the quote. Allowed while the offer is pending or quoted.
    pub async fn attach_quote(
        &self,
        ctx: &RequestContext,
        offer_id: &OfferId,
        draft: QuoteDraft,
    ) -> Result<Offer, ApplicationError> {
        let now = self.now();
        let mut offer = self.load_offer(offer_id).await?;
        offer.ensure_dmc_agent(&ctx.actor)?;

        let outcome = self
            .engine
            .apply_with_events(
                offer.status,
                OfferEvent::QuoteAttached,
                self.events.as_ref(),
                &event_context(ctx, offer_id),
            )
            .map_err(DomainError::from)?;
        if offer.lapse_event(now) == Some(OfferEvent::OfferLapsed) {
            return Err(DomainError::Expired(format!("offer `{offer_id}`")).into());
        }
        draft.validate(now, offer.check_in)?;

        let read_version = offer.version;
        let quote = draft.into_quote(ctx.actor.id.clone(), now);
        let total = quote.total_cost;
        let currency = quote.currency.clone();
        offer.attach_quote(quote, &outcome, now);
        self.offers.update(&offer, read_version).await?;

        let mut metadata = transition_metadata(&outcome);
        metadata.push(("total_cost", total.to_string()));
        metadata.push(("currency", currency));
        self.publish(&event_context(ctx, offer_id), "offer.quoted", &metadata);
        Ok(offer)
    }

    /// Moves the offer to accepted and creates its booking in one commit.
    pub async fn accept_quote(
        &self,
        ctx: &RequestContext,
        offer_id: &OfferId,
        guest_details: GuestDetails,
        special_requests: Option<String>,
    ) -> Result<AcceptedOffer, ApplicationError> {
        let now = self.now();
        let mut offer = self.load_offer(offer_id).await?;
        offer.ensure_travel_agent(&ctx.actor)?;

        let outcome = self
            .engine
            .apply_with_events(
                offer.status,
                OfferEvent::QuoteAccepted,
                self.events.as_ref(),
                &event_context(ctx, offer_id),
            )
            .map_err(DomainError::from)?;
        if offer.quote_expired(now) {
            return Err(DomainError::Expired(format!("quote on offer `{offer_id}`")).into());
        }
        guest_details.validate()?;

        let read_version = offer.version;
        offer.apply(&outcome, now);
        let confirmation_number = self.allocate_confirmation_number(now).await?;
        let booking = Booking::from_accepted_offer(
            BookingId::generate(),
            &offer,
            confirmation_number,
            guest_details,
            special_requests,
            now,
        )?;
        self.offers.accept(&offer, read_version, &booking).await?;

        info!(
            offer_id = %offer.id,
            booking_id = %booking.id,
            confirmation_number = %booking.confirmation_number,
            correlation_id = %ctx.correlation_id,
            "quote accepted"
        );
        self.publish(
            &event_context(ctx, offer_id),
            "offer.accepted",
            &transition_metadata(&outcome),
        );
        let booking_event = EventContext::new(
            booking.id.0.clone(),
            ctx.correlation_id.clone(),
            ctx.actor.id.0.clone(),
        );
        self.publish(
            &booking_event,
            "booking.created",
            &[
                ("offer_id", offer.id.0.clone()),
                ("confirmation_number", booking.confirmation_number.clone()),
                ("total_amount", booking.total_amount.to_string()),
                ("currency", booking.currency.clone()),
            ],
        );
        Ok(AcceptedOffer { offer, booking })
    }

    pub async fn reject_quote(
        &self,
        ctx: &RequestContext,
        offer_id: &OfferId,
    ) -> Result<Offer, ApplicationError> {
        let now = self.now();
        let mut offer = self.load_offer(offer_id).await?;
        offer.ensure_travel_agent(&ctx.actor)?;

        let outcome = self
            .engine
            .apply_with_events(
                offer.status,
                OfferEvent::QuoteRejected,
                self.events.as_ref(),
                &event_context(ctx, offer_id),
            )
            .map_err(DomainError::from)?;

        let read_version = offer.version;
        offer.apply(&outcome, now);
        self.offers.update(&offer, read_version).await?;

        self.publish(
            &event_context(ctx, offer_id),
            "offer.rejected",
            &transition_metadata(&outcome),
        );
        Ok(offer)
    }

    pub async fn get_offer(
        &self,
        ctx: &RequestContext,
        offer_id: &OfferId,
    ) -> Result<Offer, ApplicationError> {
        let offer = self.load_offer(offer_id).await?;
        offer.ensure_participant(&ctx.actor)?;
        Ok(offer)
    }

    /// Offers on the caller's side of the marketplace, newest first.
    pub async fn list_offers(
        &self,
        ctx: &RequestContext,
        status: Option<OfferStatus>,
        page: PageRequest,
    ) -> Result<Page<Offer>, ApplicationError> {
        let offers = self.offers.list_for_participant(&participant_query(ctx, status)).await?;
        Ok(Page::from_items(offers, page.window(self.page_limits)))
    }

    pub async fn offer_statistics(
        &self,
        ctx: &RequestContext,
    ) -> Result<OfferStatistics, ApplicationError> {
        let offers = self.offers.list_for_participant(&participant_query(ctx, None)).await?;
        Ok(OfferStatistics::tally(&offers))
    }

    pub(crate) async fn load_offer(&self, offer_id: &OfferId) -> Result<Offer, ApplicationError> {
        self.offers
            .find_by_id(offer_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("offer", offer_id.0.clone()))
    }

    async fn allocate_confirmation_number(
        &self,
        now: DateTime<Utc>,
    ) -> Result<String, ApplicationError> {
        for attempt in 1..=MAX_CONFIRMATION_ATTEMPTS {
            let candidate = self.codes.next_code(now);
            if self.bookings.find_by_confirmation(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            warn!(attempt, confirmation_number = %candidate, "confirmation number collision");
        }
        Err(ApplicationError::Persistence(format!(
            "no unique confirmation number after {MAX_CONFIRMATION_ATTEMPTS} attempts"
        )))
    }
}

pub(crate) fn participant_query<S>(ctx: &RequestContext, status: Option<S>) -> ParticipantQuery<S> {
    ParticipantQuery { role: ctx.actor.role, agent_id: ctx.actor.id.clone(), status }
}
