use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use voyage_core::domain::booking::Booking;
use voyage_core::domain::offer::Offer;
use voyage_core::errors::{ApplicationError, DomainError};
use voyage_core::events::EventContext;

use crate::service::{MarketplaceService, SYSTEM_ACTOR};

/// Outcome of one sweep pass. Failed records are left untouched for the next pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub transitioned: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub correlation_id: String,
    pub offers_expired: SweepReport,
    pub bookings_completed: SweepReport,
}

impl MarketplaceService {
    /// Runs offer expiry then booking completion under one correlation id.
    pub async fn run_sweeps(&self, now: DateTime<Utc>) -> Result<SweepSummary, ApplicationError> {
        let correlation_id = format!("sweep-{}", Uuid::new_v4());
        let offers_expired = self.expire_stale_offers_with(now, &correlation_id).await?;
        let bookings_completed = self.complete_finished_bookings_with(now, &correlation_id).await?;

        info!(
            correlation_id = %correlation_id,
            offers_examined = offers_expired.examined,
            offers_expired = offers_expired.transitioned,
            bookings_examined = bookings_completed.examined,
            bookings_completed = bookings_completed.transitioned,
            failures = offers_expired.failed + bookings_completed.failed,
            "sweep finished"
        );
        Ok(SweepSummary { correlation_id, offers_expired, bookings_completed })
    }

    /// Pending offers past `expires_at` and quoted offers past `valid_until` become expired.
    /// Running it again without the clock moving changes nothing.
    pub async fn expire_stale_offers(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ApplicationError> {
        let correlation_id = format!("sweep-{}", Uuid::new_v4());
        self.expire_stale_offers_with(now, &correlation_id).await
    }

    pub async fn complete_finished_bookings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ApplicationError> {
        let correlation_id = format!("sweep-{}", Uuid::new_v4());
        self.complete_finished_bookings_with(now, &correlation_id).await
    }

    async fn expire_stale_offers_with(
        &self,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<SweepReport, ApplicationError> {
        let candidates = self.offers.list_lapsed(now).await?;
        let mut report = SweepReport { examined: candidates.len(), ..SweepReport::default() };

        for offer in candidates {
            let offer_id = offer.id.clone();
            match self.expire_offer(offer, now, correlation_id).await {
                Ok(true) => report.transitioned += 1,
                Ok(false) => {}
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        offer_id = %offer_id,
                        correlation_id = %correlation_id,
                        error = %error,
                        "offer expiry skipped"
                    );
                }
            }
        }
        Ok(report)
    }

    async fn expire_offer(
        &self,
        mut offer: Offer,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<bool, ApplicationError> {
        let Some(event) = offer.lapse_event(now) else {
            return Ok(false);
        };
        let outcome = self.engine.apply(offer.status, event).map_err(DomainError::from)?;

        let read_version = offer.version;
        offer.apply(&outcome, now);
        self.offers.update(&offer, read_version).await?;

        self.publish(
            &EventContext::new(offer.id.0.clone(), correlation_id, SYSTEM_ACTOR),
            "offer.expired",
            &[("from", outcome.from.as_str().to_owned()), ("to", outcome.to.as_str().to_owned())],
        );
        Ok(true)
    }

    async fn complete_finished_bookings_with(
        &self,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<SweepReport, ApplicationError> {
        let candidates = self.bookings.list_due_for_completion(now.date_naive()).await?;
        let mut report = SweepReport { examined: candidates.len(), ..SweepReport::default() };

        for booking in candidates {
            let booking_id = booking.id.clone();
            match self.complete_due_booking(booking, now, correlation_id).await {
                Ok(true) => report.transitioned += 1,
                Ok(false) => {}
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        booking_id = %booking_id,
                        correlation_id = %correlation_id,
                        error = %error,
                        "booking completion skipped"
                    );
                }
            }
        }
        Ok(report)
    }

    async fn complete_due_booking(
        &self,
        mut booking: Booking,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<bool, ApplicationError> {
        let read_version = booking.version;
        if !booking.complete(now)? {
            return Ok(false);
        }
        self.bookings.update(&booking, read_version).await?;

        self.publish(
            &EventContext::new(booking.id.0.clone(), correlation_id, SYSTEM_ACTOR),
            "booking.completed",
            &[("check_out", booking.check_out.to_string())],
        );
        Ok(true)
    }
}
