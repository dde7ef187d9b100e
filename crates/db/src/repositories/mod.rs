use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use voyage_core::domain::actor::{ActorRole, AgentId};
use voyage_core::domain::booking::{Booking, BookingId, BookingStatus};
use voyage_core::domain::hotel::{Hotel, HotelId};
use voyage_core::domain::offer::{Offer, OfferId, OfferStatus};
use voyage_core::errors::ApplicationError;

pub mod booking;
pub mod hotel;
pub mod memory;
pub mod offer;

mod codec;

pub use booking::SqlBookingRepository;
pub use hotel::SqlHotelRepository;
pub use memory::InMemoryMarketplaceStore;
pub use offer::SqlOfferRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// The stored version no longer matches the version the caller read.
    #[error("{entity} `{id}` was changed since it was read")]
    Conflict { entity: &'static str, id: String },
    #[error("duplicate {entity}: {detail}")]
    Duplicate { entity: &'static str, detail: String },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { entity, id } => {
                ApplicationError::ConcurrentModification { entity, id }
            }
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

/// Offers or bookings visible to one agent: the side they sit on plus an optional status filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantQuery<S> {
    pub role: ActorRole,
    pub agent_id: AgentId,
    pub status: Option<S>,
}

#[async_trait]
pub trait HotelRepository: Send + Sync {
    async fn find_by_id(&self, id: &HotelId) -> Result<Option<Hotel>, RepositoryError>;
    async fn save(&self, hotel: Hotel) -> Result<(), RepositoryError>;
    async fn list_active(&self) -> Result<Vec<Hotel>, RepositoryError>;
    async fn list_by_owner(&self, dmc_agent_id: &AgentId) -> Result<Vec<Hotel>, RepositoryError>;
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    async fn insert(&self, offer: &Offer) -> Result<(), RepositoryError>;

    /// Compare-and-set write: applies only if the stored version equals `expected_version`.
    async fn update(&self, offer: &Offer, expected_version: u32) -> Result<(), RepositoryError>;

    /// Guarded offer update plus booking insert, committed together or not at all.
    async fn accept(
        &self,
        offer: &Offer,
        expected_version: u32,
        booking: &Booking,
    ) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list_for_participant(
        &self,
        query: &ParticipantQuery<OfferStatus>,
    ) -> Result<Vec<Offer>, RepositoryError>;

    /// Pending offers past `expires_at` and quoted offers past the quote's `valid_until`.
    async fn list_lapsed(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;
    async fn find_by_confirmation(
        &self,
        confirmation_number: &str,
    ) -> Result<Option<Booking>, RepositoryError>;
    async fn find_by_offer(&self, offer_id: &OfferId) -> Result<Option<Booking>, RepositoryError>;
    async fn update(&self, booking: &Booking, expected_version: u32)
        -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list_for_participant(
        &self,
        query: &ParticipantQuery<BookingStatus>,
    ) -> Result<Vec<Booking>, RepositoryError>;

    /// Confirmed bookings whose check-out is on or before `today`.
    async fn list_due_for_completion(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use voyage_core::errors::ApplicationError;

    use super::RepositoryError;

    #[test]
    fn conflict_maps_to_concurrent_modification() {
        let error = ApplicationError::from(RepositoryError::Conflict {
            entity: "offer",
            id: "OFR-1".to_owned(),
        });
        assert_eq!(
            error,
            ApplicationError::ConcurrentModification { entity: "offer", id: "OFR-1".to_owned() }
        );

        let error = ApplicationError::from(RepositoryError::Decode("bad status".to_owned()));
        assert!(matches!(
            error,
            ApplicationError::Persistence(ref message) if message.contains("bad status")
        ));
    }
}
