use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;

use voyage_core::domain::actor::{ActorRole, AgentId};
use voyage_core::domain::booking::{Booking, BookingId, BookingStatus, PaymentStatus};
use voyage_core::domain::hotel::HotelId;
use voyage_core::domain::offer::OfferId;

use super::codec::{
    column, from_json, insert_error, parse_date, parse_decimal, parse_optional_timestamp,
    parse_timestamp, timestamp, to_json, version_from_db,
};
use super::{BookingRepository, ParticipantQuery, RepositoryError};
use crate::DbPool;

const BOOKING_COLUMNS: &str = "id, offer_id, travel_agent_id, dmc_agent_id, hotel_id, check_in,
     check_out, guest_details_json, status, confirmation_number, total_amount, currency,
     payment_status, special_requests, cancelled_at, cancellation_reason, completed_at, version,
     created_at, updated_at";

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        column_name: &str,
        value: &str,
    ) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM booking WHERE {column_name} = ?"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_booking(r)?)),
            None => Ok(None),
        }
    }
}

fn row_to_booking(row: &SqliteRow) -> Result<Booking, RepositoryError> {
    let status_str: String = column(row, "status")?;
    let status = BookingStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("status: unknown booking status `{status_str}`"))
    })?;
    let payment_str: String = column(row, "payment_status")?;
    let payment_status = PaymentStatus::parse(&payment_str).ok_or_else(|| {
        RepositoryError::Decode(format!("payment_status: unknown payment status `{payment_str}`"))
    })?;

    Ok(Booking {
        id: BookingId(column(row, "id")?),
        offer_id: OfferId(column(row, "offer_id")?),
        travel_agent_id: AgentId(column(row, "travel_agent_id")?),
        dmc_agent_id: AgentId(column(row, "dmc_agent_id")?),
        hotel_id: HotelId(column(row, "hotel_id")?),
        check_in: parse_date("check_in", &column::<String>(row, "check_in")?)?,
        check_out: parse_date("check_out", &column::<String>(row, "check_out")?)?,
        guest_details: from_json(
            "guest_details_json",
            &column::<String>(row, "guest_details_json")?,
        )?,
        status,
        confirmation_number: column(row, "confirmation_number")?,
        total_amount: parse_decimal("total_amount", &column::<String>(row, "total_amount")?)?,
        currency: column(row, "currency")?,
        payment_status,
        special_requests: column(row, "special_requests")?,
        cancelled_at: parse_optional_timestamp("cancelled_at", column(row, "cancelled_at")?)?,
        cancellation_reason: column(row, "cancellation_reason")?,
        completed_at: parse_optional_timestamp("completed_at", column(row, "completed_at")?)?,
        version: version_from_db(column(row, "version")?)?,
        created_at: parse_timestamp("created_at", &column::<String>(row, "created_at")?)?,
        updated_at: parse_timestamp("updated_at", &column::<String>(row, "updated_at")?)?,
    })
}

/// Inserts a new booking. Used inside the offer acceptance transaction.
pub(crate) async fn insert_booking<'e, E>(
    executor: E,
    booking: &Booking,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let guest_details = to_json("guest_details_json", &booking.guest_details)?;

    sqlx::query(
        "INSERT INTO booking (id, offer_id, travel_agent_id, dmc_agent_id, hotel_id, check_in,
                              check_out, guest_details_json, status, confirmation_number,
                              total_amount, currency, payment_status, special_requests,
                              cancelled_at, cancellation_reason, completed_at, version,
                              created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&booking.id.0)
    .bind(&booking.offer_id.0)
    .bind(&booking.travel_agent_id.0)
    .bind(&booking.dmc_agent_id.0)
    .bind(&booking.hotel_id.0)
    .bind(booking.check_in.to_string())
    .bind(booking.check_out.to_string())
    .bind(guest_details)
    .bind(booking.status.as_str())
    .bind(&booking.confirmation_number)
    .bind(booking.total_amount.to_string())
    .bind(&booking.currency)
    .bind(booking.payment_status.as_str())
    .bind(&booking.special_requests)
    .bind(booking.cancelled_at.map(timestamp))
    .bind(&booking.cancellation_reason)
    .bind(booking.completed_at.map(timestamp))
    .bind(i64::from(booking.version))
    .bind(timestamp(booking.created_at))
    .bind(timestamp(booking.updated_at))
    .execute(executor)
    .await
    .map_err(|e| insert_error("booking", e))?;

    Ok(())
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        self.fetch_one_where("id", &id.0).await
    }

    async fn find_by_confirmation(
        &self,
        confirmation_number: &str,
    ) -> Result<Option<Booking>, RepositoryError> {
        self.fetch_one_where("confirmation_number", confirmation_number).await
    }

    async fn find_by_offer(&self, offer_id: &OfferId) -> Result<Option<Booking>, RepositoryError> {
        self.fetch_one_where("offer_id", &offer_id.0).await
    }

    async fn update(
        &self,
        booking: &Booking,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let guest_details = to_json("guest_details_json", &booking.guest_details)?;

        let result = sqlx::query(
            "UPDATE booking SET
                 guest_details_json = ?,
                 status = ?,
                 payment_status = ?,
                 special_requests = ?,
                 cancelled_at = ?,
                 cancellation_reason = ?,
                 completed_at = ?,
                 version = ?,
                 updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(guest_details)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.special_requests)
        .bind(booking.cancelled_at.map(timestamp))
        .bind(&booking.cancellation_reason)
        .bind(booking.completed_at.map(timestamp))
        .bind(i64::from(booking.version))
        .bind(timestamp(booking.updated_at))
        .bind(&booking.id.0)
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict { entity: "booking", id: booking.id.0.clone() });
        }
        Ok(())
    }

    async fn list_for_participant(
        &self,
        query: &ParticipantQuery<BookingStatus>,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let agent_column = match query.role {
            ActorRole::TravelAgent => "travel_agent_id",
            ActorRole::DmcAgent => "dmc_agent_id",
        };
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM booking
             WHERE {agent_column} = ? AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC, id DESC"
        );
        let status = query.status.map(|status| status.as_str());

        let rows = sqlx::query(&sql)
            .bind(&query.agent_id.0)
            .bind(status)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }

    async fn list_due_for_completion(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM booking
             WHERE status = 'confirmed' AND check_out <= ?
             ORDER BY check_out ASC, id ASC"
        ))
        .bind(today.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }
}
