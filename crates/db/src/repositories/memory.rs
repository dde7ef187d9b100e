use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use voyage_core::domain::actor::{ActorRole, AgentId};
use voyage_core::domain::booking::{Booking, BookingId, BookingStatus};
use voyage_core::domain::hotel::{Hotel, HotelId};
use voyage_core::domain::offer::{Offer, OfferId, OfferStatus};

use super::{
    BookingRepository, HotelRepository, OfferRepository, ParticipantQuery, RepositoryError,
};

#[derive(Default)]
struct MarketplaceState {
    hotels: HashMap<String, Hotel>,
    offers: HashMap<String, Offer>,
    bookings: HashMap<String, Booking>,
}

impl MarketplaceState {
    fn check_offer_version(&self, offer: &Offer, expected: u32) -> Result<(), RepositoryError> {
        match self.offers.get(&offer.id.0) {
            Some(stored) if stored.version == expected => Ok(()),
            _ => Err(RepositoryError::Conflict { entity: "offer", id: offer.id.0.clone() }),
        }
    }

    fn check_new_booking(&self, booking: &Booking) -> Result<(), RepositoryError> {
        if self.bookings.contains_key(&booking.id.0) {
            return Err(duplicate_booking(format!("id `{}` already exists", booking.id)));
        }
        for existing in self.bookings.values() {
            if existing.offer_id == booking.offer_id {
                return Err(duplicate_booking(format!(
                    "offer `{}` already has a booking",
                    booking.offer_id
                )));
            }
            if existing.confirmation_number == booking.confirmation_number {
                return Err(duplicate_booking(format!(
                    "confirmation number `{}` is taken",
                    booking.confirmation_number
                )));
            }
        }
        Ok(())
    }
}

fn duplicate_booking(detail: String) -> RepositoryError {
    RepositoryError::Duplicate { entity: "booking", detail }
}

fn agent_side<'a>(
    role: ActorRole,
    travel_agent: &'a AgentId,
    dmc_agent: &'a AgentId,
) -> &'a AgentId {
    match role {
        ActorRole::TravelAgent => travel_agent,
        ActorRole::DmcAgent => dmc_agent,
    }
}

/// Hotels, offers and bookings behind one lock, so `accept` is atomic the same way the
/// SQLite transaction is.
#[derive(Default)]
pub struct InMemoryMarketplaceStore {
    state: RwLock<MarketplaceState>,
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HotelRepository for InMemoryMarketplaceStore {
    async fn find_by_id(&self, id: &HotelId) -> Result<Option<Hotel>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.hotels.get(&id.0).cloned())
    }

    async fn save(&self, hotel: Hotel) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.hotels.insert(hotel.id.0.clone(), hotel);
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Hotel>, RepositoryError> {
        let state = self.state.read().await;
        let mut hotels: Vec<Hotel> = state.hotels.values().filter(|h| h.active).cloned().collect();
        hotels.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(hotels)
    }

    async fn list_by_owner(&self, dmc_agent_id: &AgentId) -> Result<Vec<Hotel>, RepositoryError> {
        let state = self.state.read().await;
        let mut hotels: Vec<Hotel> =
            state.hotels.values().filter(|h| &h.dmc_agent_id == dmc_agent_id).cloned().collect();
        hotels.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(hotels)
    }
}

#[async_trait::async_trait]
impl OfferRepository for InMemoryMarketplaceStore {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.offers.get(&id.0).cloned())
    }

    async fn insert(&self, offer: &Offer) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.offers.contains_key(&offer.id.0) {
            return Err(RepositoryError::Duplicate {
                entity: "offer",
                detail: format!("id `{}` already exists", offer.id),
            });
        }
        state.offers.insert(offer.id.0.clone(), offer.clone());
        Ok(())
    }

    async fn update(&self, offer: &Offer, expected_version: u32) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.check_offer_version(offer, expected_version)?;
        state.offers.insert(offer.id.0.clone(), offer.clone());
        Ok(())
    }

    async fn accept(
        &self,
        offer: &Offer,
        expected_version: u32,
        booking: &Booking,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.check_offer_version(offer, expected_version)?;
        state.check_new_booking(booking)?;

        state.offers.insert(offer.id.0.clone(), offer.clone());
        state.bookings.insert(booking.id.0.clone(), booking.clone());
        Ok(())
    }

    async fn list_for_participant(
        &self,
        query: &ParticipantQuery<OfferStatus>,
    ) -> Result<Vec<Offer>, RepositoryError> {
        let state = self.state.read().await;
        let mut offers: Vec<Offer> = state
            .offers
            .values()
            .filter(|o| {
                agent_side(query.role, &o.travel_agent_id, &o.dmc_agent_id) == &query.agent_id
            })
            .filter(|o| query.status.map_or(true, |status| o.status == status))
            .cloned()
            .collect();
        offers.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(offers)
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, RepositoryError> {
        let state = self.state.read().await;
        let mut offers: Vec<Offer> =
            state.offers.values().filter(|o| o.lapse_event(now).is_some()).cloned().collect();
        offers.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(offers)
    }
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryMarketplaceStore {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.bookings.get(&id.0).cloned())
    }

    async fn find_by_confirmation(
        &self,
        confirmation_number: &str,
    ) -> Result<Option<Booking>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.confirmation_number == confirmation_number)
            .cloned())
    }

    async fn find_by_offer(&self, offer_id: &OfferId) -> Result<Option<Booking>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.bookings.values().find(|b| &b.offer_id == offer_id).cloned())
    }

    async fn update(
        &self,
        booking: &Booking,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        match state.bookings.get(&booking.id.0) {
            Some(stored) if stored.version == expected_version => {}
            _ => {
                return Err(RepositoryError::Conflict {
                    entity: "booking",
                    id: booking.id.0.clone(),
                })
            }
        }
        state.bookings.insert(booking.id.0.clone(), booking.clone());
        Ok(())
    }

    async fn list_for_participant(
        &self,
        query: &ParticipantQuery<BookingStatus>,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| {
                agent_side(query.role, &b.travel_agent_id, &b.dmc_agent_id) == &query.agent_id
            })
            .filter(|b| query.status.map_or(true, |status| b.status == status))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(bookings)
    }

    async fn list_due_for_completion(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.is_due_for_completion(today))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| (a.check_out, &a.id).cmp(&(b.check_out, &b.id)));
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use voyage_core::domain::actor::{ActorRole, AgentId};
    use voyage_core::domain::offer::OfferStatus;
    use voyage_core::flows::{FlowEngine, OfferEvent};

    use super::InMemoryMarketplaceStore;
    use crate::repositories::hotel::tests::{epoch, sample_hotel};
    use crate::repositories::offer::tests::{booking_for, quote_offer, sample_offer};
    use crate::repositories::{
        BookingRepository, HotelRepository, OfferRepository, ParticipantQuery, RepositoryError,
    };

    #[tokio::test]
    async fn hotel_listings_skip_inactive_and_filter_owner() {
        let store = InMemoryMarketplaceStore::new();
        let mut retired = sample_hotel("HTL-1", "dmc-1", epoch());
        retired.deactivate(epoch());
        store.save(retired).await.expect("save");
        store.save(sample_hotel("HTL-2", "dmc-1", epoch())).await.expect("save");
        store.save(sample_hotel("HTL-3", "dmc-2", epoch())).await.expect("save");

        let active = store.list_active().await.expect("active");
        let active_ids: Vec<&str> = active.iter().map(|h| h.id.0.as_str()).collect();
        assert_eq!(active_ids, vec!["HTL-2", "HTL-3"]);
        let owned = store.list_by_owner(&AgentId("dmc-1".to_owned())).await.expect("owner");
        assert_eq!(owned.len(), 2);
    }

    #[tokio::test]
    async fn stale_offer_write_is_a_conflict() {
        let store = InMemoryMarketplaceStore::new();
        let hotel = sample_hotel("HTL-1", "dmc-1", epoch());
        let mut offer = sample_offer("OFR-1", &hotel, epoch());
        store.insert(&offer).await.expect("insert");
        assert!(matches!(store.insert(&offer).await, Err(RepositoryError::Duplicate { .. })));

        let read_version = offer.version;
        quote_offer(&mut offer, epoch());
        OfferRepository::update(&store, &offer, read_version).await.expect("first writer wins");

        let error = OfferRepository::update(&store, &offer, read_version)
            .await
            .expect_err("second writer loses");
        assert!(matches!(error, RepositoryError::Conflict { entity: "offer", .. }));
    }

    #[tokio::test]
    async fn accept_refuses_second_booking_and_taken_codes() {
        let store = InMemoryMarketplaceStore::new();
        let hotel = sample_hotel("HTL-1", "dmc-1", epoch());
        let engine = FlowEngine::default();

        let mut offers = Vec::new();
        for id in ["OFR-1", "OFR-2"] {
            let mut offer = sample_offer(id, &hotel, epoch());
            store.insert(&offer).await.expect("insert");
            let version = offer.version;
            quote_offer(&mut offer, epoch());
            OfferRepository::update(&store, &offer, version).await.expect("quote");
            offers.push(offer);
        }

        let mut first = offers[0].clone();
        let version = first.version;
        let outcome = engine.apply(first.status, OfferEvent::QuoteAccepted).expect("acceptable");
        first.apply(&outcome, epoch());
        let booking = booking_for(&first, "VG-2027-CDFG4567", epoch());
        store.accept(&first, version, &booking).await.expect("accept");

        let mut second = offers[1].clone();
        let version = second.version;
        second.apply(&outcome, epoch());
        let clash = booking_for(&second, "VG-2027-CDFG4567", epoch());
        assert!(matches!(
            store.accept(&second, version, &clash).await,
            Err(RepositoryError::Duplicate { entity: "booking", .. })
        ));

        let untouched =
            OfferRepository::find_by_id(&store, &second.id).await.expect("find").expect("exists");
        assert_eq!(untouched.status, OfferStatus::Quoted);

        let stored =
            store.find_by_confirmation("VG-2027-CDFG4567").await.expect("find").expect("exists");
        assert_eq!(stored.offer_id, first.id);
        assert_eq!(
            BookingRepository::list_for_participant(
                &store,
                &ParticipantQuery {
                    role: ActorRole::DmcAgent,
                    agent_id: AgentId("dmc-1".to_owned()),
                    status: None,
                },
            )
            .await
            .expect("list")
            .len(),
            1
        );
    }

    #[tokio::test]
    async fn lapsed_listing_matches_domain_rule() {
        let store = InMemoryMarketplaceStore::new();
        let hotel = sample_hotel("HTL-1", "dmc-1", epoch());
        store.insert(&sample_offer("OFR-1", &hotel, epoch())).await.expect("insert");

        assert!(store.list_lapsed(epoch() + Duration::days(1)).await.expect("list").is_empty());
        assert_eq!(store.list_lapsed(epoch() + Duration::days(3)).await.expect("list").len(), 1);
    }
}
