use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use voyage_core::domain::actor::RequestContext;
use voyage_core::domain::booking::{Booking, BookingId, BookingStatus, PaymentStatus};
use voyage_core::errors::ApplicationError;
use voyage_core::events::EventContext;
use voyage_core::search::{Page, PageRequest};

use crate::offers::participant_query;
use crate::service::{MarketplaceService, SYSTEM_ACTOR};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookingStatistics {
    pub total: u64,
    pub by_status: BTreeMap<&'static str, u64>,
}

impl BookingStatistics {
    fn tally(bookings: &[Booking]) -> Self {
        let mut by_status: BTreeMap<&'static str, u64> =
            BookingStatus::ALL.iter().map(|status| (status.as_str(), 0)).collect();
        for booking in bookings {
            *by_status.entry(booking.status.as_str()).or_default() += 1;
        }
        Self { total: bookings.len() as u64, by_status }
    }
}

impl MarketplaceService {
    /// Full refund; either party may cancel until the day before check-in.
    pub async fn cancel_booking(
        &self,
        ctx: &RequestContext,
        booking_id: &BookingId,
        reason: Option<String>,
    ) -> Result<Booking, ApplicationError> {
        let now = self.now();
        let mut booking = self.load_booking(booking_id).await?;
        booking.ensure_participant(&ctx.actor)?;

        let read_version = booking.version;
        booking.cancel(reason, now)?;
        self.bookings.update(&booking, read_version).await?;

        info!(
            booking_id = %booking.id,
            cancelled_by = %ctx.actor.id,
            correlation_id = %ctx.correlation_id,
            "booking cancelled"
        );
        let mut metadata = vec![
            ("cancelled_by", ctx.actor.role.as_str().to_owned()),
            ("refund_amount", booking.total_amount.to_string()),
            ("currency", booking.currency.clone()),
        ];
        if let Some(reason) = &booking.cancellation_reason {
            metadata.push(("reason", reason.clone()));
        }
        let event = EventContext::new(
            booking.id.0.clone(),
            ctx.correlation_id.clone(),
            ctx.actor.id.0.clone(),
        );
        self.publish(&event, "booking.cancelled", &metadata);
        Ok(booking)
    }

    /// System operation. Completing an already completed booking is a no-op.
    pub async fn complete_booking(
        &self,
        booking_id: &BookingId,
        correlation_id: &str,
    ) -> Result<Booking, ApplicationError> {
        let now = self.now();
        let mut booking = self.load_booking(booking_id).await?;

        let read_version = booking.version;
        if !booking.complete(now)? {
            return Ok(booking);
        }
        self.bookings.update(&booking, read_version).await?;

        self.publish(
            &EventContext::new(booking.id.0.clone(), correlation_id, SYSTEM_ACTOR),
            "booking.completed",
            &[("check_out", booking.check_out.to_string())],
        );
        Ok(booking)
    }

    /// System operation fed by the payment provider callback.
    pub async fn record_payment(
        &self,
        booking_id: &BookingId,
        outcome: PaymentStatus,
        correlation_id: &str,
    ) -> Result<Booking, ApplicationError> {
        let now = self.now();
        let mut booking = self.load_booking(booking_id).await?;

        let read_version = booking.version;
        booking.record_payment(outcome, now)?;
        self.bookings.update(&booking, read_version).await?;

        self.publish(
            &EventContext::new(booking.id.0.clone(), correlation_id, SYSTEM_ACTOR),
            "booking.payment_recorded",
            &[("payment_status", booking.payment_status.as_str().to_owned())],
        );
        Ok(booking)
    }

    pub async fn get_booking(
        &self,
        ctx: &RequestContext,
        booking_id: &BookingId,
    ) -> Result<Booking, ApplicationError> {
        let booking = self.load_booking(booking_id).await?;
        booking.ensure_participant(&ctx.actor)?;
        Ok(booking)
    }

    pub async fn find_booking_by_confirmation(
        &self,
        ctx: &RequestContext,
        confirmation_number: &str,
    ) -> Result<Booking, ApplicationError> {
        let code = confirmation_number.trim().to_ascii_uppercase();
        let booking = self
            .bookings
            .find_by_confirmation(&code)
            .await?
            .ok_or_else(|| ApplicationError::not_found("booking", code.clone()))?;
        booking.ensure_participant(&ctx.actor)?;
        Ok(booking)
    }

    pub async fn list_bookings(
        &self,
        ctx: &RequestContext,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Page<Booking>, ApplicationError> {
        let bookings = self.bookings.list_for_participant(&participant_query(ctx, status)).await?;
        Ok(Page::from_items(bookings, page.window(self.page_limits)))
    }

    pub async fn booking_statistics(
        &self,
        ctx: &RequestContext,
    ) -> Result<BookingStatistics, ApplicationError> {
        let bookings = self.bookings.list_for_participant(&participant_query(ctx, None)).await?;
        Ok(BookingStatistics::tally(&bookings))
    }

    pub(crate) async fn load_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Booking, ApplicationError> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("booking", booking_id.0.clone()))
    }
}
