use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;

use voyage_core::domain::actor::{ActorRole, AgentId};
use voyage_core::domain::booking::Booking;
use voyage_core::domain::hotel::HotelId;
use voyage_core::domain::offer::{Offer, OfferId, OfferStatus};
use voyage_core::domain::quote::Quote;

use super::booking::insert_booking;
use super::codec::{
    column, from_json, insert_error, parse_date, parse_optional_timestamp, parse_timestamp,
    timestamp, to_json, version_from_db,
};
use super::{OfferRepository, ParticipantQuery, RepositoryError};
use crate::DbPool;

const OFFER_COLUMNS: &str = "id, travel_agent_id, dmc_agent_id, hotel_id, check_in, check_out,
     nights, guests_json, room_requirements_json, budget_json, special_requests, expires_at,
     status, quote_json, quoted_at, responded_at, version, created_at, updated_at";

pub struct SqlOfferRepository {
    pool: DbPool,
}

impl SqlOfferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_offer(row: &SqliteRow) -> Result<Offer, RepositoryError> {
    let status_str: String = column(row, "status")?;
    let status = OfferStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("status: unknown offer status `{status_str}`"))
    })?;
    let nights: i64 = column(row, "nights")?;
    let nights = u32::try_from(nights)
        .map_err(|_| RepositoryError::Decode(format!("nights: {nights} out of range")))?;
    let budget_json: Option<String> = column(row, "budget_json")?;
    let quote_json: Option<String> = column(row, "quote_json")?;

    Ok(Offer {
        id: OfferId(column(row, "id")?),
        travel_agent_id: AgentId(column(row, "travel_agent_id")?),
        dmc_agent_id: AgentId(column(row, "dmc_agent_id")?),
        hotel_id: HotelId(column(row, "hotel_id")?),
        check_in: parse_date("check_in", &column::<String>(row, "check_in")?)?,
        check_out: parse_date("check_out", &column::<String>(row, "check_out")?)?,
        nights,
        guests: from_json("guests_json", &column::<String>(row, "guests_json")?)?,
        room_requirements: from_json(
            "room_requirements_json",
            &column::<String>(row, "room_requirements_json")?,
        )?,
        budget: budget_json.map(|raw| from_json("budget_json", &raw)).transpose()?,
        special_requests: column(row, "special_requests")?,
        expires_at: parse_optional_timestamp("expires_at", column(row, "expires_at")?)?,
        status,
        quote: quote_json.map(|raw| from_json::<Quote>("quote_json", &raw)).transpose()?,
        quoted_at: parse_optional_timestamp("quoted_at", column(row, "quoted_at")?)?,
        responded_at: parse_optional_timestamp("responded_at", column(row, "responded_at")?)?,
        version: version_from_db(column(row, "version")?)?,
        created_at: parse_timestamp("created_at", &column::<String>(row, "created_at")?)?,
        updated_at: parse_timestamp("updated_at", &column::<String>(row, "updated_at")?)?,
    })
}

struct OfferColumns {
    guests: String,
    room_requirements: String,
    budget: Option<String>,
    quote: Option<String>,
    quote_valid_until: Option<String>,
}

impl OfferColumns {
    fn encode(offer: &Offer) -> Result<Self, RepositoryError> {
        Ok(Self {
            guests: to_json("guests_json", &offer.guests)?,
            room_requirements: to_json("room_requirements_json", &offer.room_requirements)?,
            budget: offer.budget.as_ref().map(|budget| to_json("budget_json", budget)).transpose()?,
            quote: offer.quote.as_ref().map(|quote| to_json("quote_json", quote)).transpose()?,
            quote_valid_until: offer.quote.as_ref().map(|quote| timestamp(quote.valid_until)),
        })
    }
}

async fn update_offer<'e, E>(
    executor: E,
    offer: &Offer,
    expected_version: u32,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let encoded = OfferColumns::encode(offer)?;

    let result = sqlx::query(
        "UPDATE offer SET
             guests_json = ?,
             room_requirements_json = ?,
             budget_json = ?,
             special_requests = ?,
             expires_at = ?,
             status = ?,
             quote_json = ?,
             quote_valid_until = ?,
             quoted_at = ?,
             responded_at = ?,
             version = ?,
             updated_at = ?
         WHERE id = ? AND version = ?",
    )
    .bind(encoded.guests)
    .bind(encoded.room_requirements)
    .bind(encoded.budget)
    .bind(&offer.special_requests)
    .bind(offer.expires_at.map(timestamp))
    .bind(offer.status.as_str())
    .bind(encoded.quote)
    .bind(encoded.quote_valid_until)
    .bind(offer.quoted_at.map(timestamp))
    .bind(offer.responded_at.map(timestamp))
    .bind(i64::from(offer.version))
    .bind(timestamp(offer.updated_at))
    .bind(&offer.id.0)
    .bind(i64::from(expected_version))
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict { entity: "offer", id: offer.id.0.clone() });
    }
    Ok(())
}

#[async_trait::async_trait]
impl OfferRepository for SqlOfferRepository {
    async fn find_by_id(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {OFFER_COLUMNS} FROM offer WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_offer(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, offer: &Offer) -> Result<(), RepositoryError> {
        let encoded = OfferColumns::encode(offer)?;

        sqlx::query(
            "INSERT INTO offer (id, travel_agent_id, dmc_agent_id, hotel_id, check_in, check_out,
                                nights, guests_json, room_requirements_json, budget_json,
                                special_requests, expires_at, status, quote_json,
                                quote_valid_until, quoted_at, responded_at, version,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&offer.id.0)
        .bind(&offer.travel_agent_id.0)
        .bind(&offer.dmc_agent_id.0)
        .bind(&offer.hotel_id.0)
        .bind(offer.check_in.to_string())
        .bind(offer.check_out.to_string())
        .bind(i64::from(offer.nights))
        .bind(encoded.guests)
        .bind(encoded.room_requirements)
        .bind(encoded.budget)
        .bind(&offer.special_requests)
        .bind(offer.expires_at.map(timestamp))
        .bind(offer.status.as_str())
        .bind(encoded.quote)
        .bind(encoded.quote_valid_until)
        .bind(offer.quoted_at.map(timestamp))
        .bind(offer.responded_at.map(timestamp))
        .bind(i64::from(offer.version))
        .bind(timestamp(offer.created_at))
        .bind(timestamp(offer.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("offer", e))?;

        Ok(())
    }

    async fn update(&self, offer: &Offer, expected_version: u32) -> Result<(), RepositoryError> {
        update_offer(&self.pool, offer, expected_version).await
    }

    async fn accept(
        &self,
        offer: &Offer,
        expected_version: u32,
        booking: &Booking,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        update_offer(&mut *tx, offer, expected_version).await?;
        insert_booking(&mut *tx, booking).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_participant(
        &self,
        query: &ParticipantQuery<OfferStatus>,
    ) -> Result<Vec<Offer>, RepositoryError> {
        let agent_column = match query.role {
            ActorRole::TravelAgent => "travel_agent_id",
            ActorRole::DmcAgent => "dmc_agent_id",
        };
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM offer
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

        rows.iter().map(row_to_offer).collect::<Result<Vec<_>, _>>()
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, RepositoryError> {
        let now = timestamp(now);
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM offer
             WHERE (status = 'pending' AND expires_at IS NOT NULL AND expires_at < ?)
                OR (status = 'quoted' AND quote_valid_until IS NOT NULL AND quote_valid_until < ?)
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(&now)
        .bind(&now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_offer).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;

    use voyage_core::domain::actor::{Actor, ActorRole, AgentId};
    use voyage_core::domain::booking::{
        Booking, BookingId, GuestDetails, PrimaryGuest,
    };
    use voyage_core::domain::hotel::Hotel;
    use voyage_core::domain::offer::{
        GuestCounts, Offer, OfferId, OfferRequest, OfferStatus, RoomRequirement,
    };
    use voyage_core::domain::quote::{QuoteDraft, RoomRate};
    use voyage_core::flows::{FlowEngine, OfferEvent};

    use super::SqlOfferRepository;
    use crate::repositories::hotel::tests::{epoch, sample_hotel, setup};
    use crate::repositories::{
        BookingRepository, HotelRepository, OfferRepository, ParticipantQuery, RepositoryError,
        SqlBookingRepository, SqlHotelRepository,
    };

    pub(crate) fn sample_offer(id: &str, hotel: &Hotel, created_at: DateTime<Utc>) -> Offer {
        Offer::new(
            OfferId(id.to_owned()),
            &Actor::travel_agent("ta-1"),
            hotel,
            OfferRequest {
                hotel_id: hotel.id.clone(),
                check_in: NaiveDate::from_ymd_opt(2027, 6, 10).expect("date"),
                check_out: NaiveDate::from_ymd_opt(2027, 6, 15).expect("date"),
                guests: GuestCounts { adults: 2, children: 0, infants: 0 },
                room_requirements: vec![RoomRequirement {
                    room_type: "Double".to_owned(),
                    quantity: 1,
                    guests_per_room: GuestCounts { adults: 2, children: 0, infants: 0 },
                }],
                budget: None,
                special_requests: None,
                expires_at: Some(created_at + Duration::days(2)),
            },
            created_at,
        )
        .expect("valid offer")
    }

    pub(crate) fn quote_offer(offer: &mut Offer, now: DateTime<Utc>) {
        let quote = QuoteDraft {
            room_breakdown: vec![RoomRate::new("Double", 1, 5, Decimal::new(200, 0))],
            total_cost: Decimal::new(1000, 0),
            currency: "EUR".to_owned(),
            inclusions: vec!["Breakfast".to_owned()],
            exclusions: Vec::new(),
            payment_terms: "Prepaid".to_owned(),
            cancellation_policy: "Refundable".to_owned(),
            valid_until: now + Duration::days(7),
            notes: Some("Sea view on request".to_owned()),
        }
        .into_quote(offer.dmc_agent_id.clone(), now);
        let outcome = FlowEngine::default()
            .apply(offer.status, OfferEvent::QuoteAttached)
            .expect("quotable");
        offer.attach_quote(quote, &outcome, now);
    }

    pub(crate) fn booking_for(offer: &Offer, code: &str, now: DateTime<Utc>) -> Booking {
        Booking::from_accepted_offer(
            BookingId(format!("BKG-{}", offer.id.0)),
            offer,
            code.to_owned(),
            GuestDetails {
                primary_guest: PrimaryGuest {
                    name: "Mia Costa".to_owned(),
                    email: "mia@example.com".to_owned(),
                    phone: "+351 900 000 000".to_owned(),
                },
                additional_guests: Vec::new(),
            },
            None,
            now,
        )
        .expect("bookable")
    }

    async fn seeded() -> (sqlx::SqlitePool, Hotel) {
        let pool = setup().await;
        let hotel = sample_hotel("HTL-1", "dmc-1", epoch());
        SqlHotelRepository::new(pool.clone()).save(hotel.clone()).await.expect("save hotel");
        (pool, hotel)
    }

    #[tokio::test]
    async fn insert_find_and_guarded_update() {
        let (pool, hotel) = seeded().await;
        let repo = SqlOfferRepository::new(pool);
        let mut offer = sample_offer("OFR-1", &hotel, epoch());
        repo.insert(&offer).await.expect("insert");

        let read_version = offer.version;
        quote_offer(&mut offer, epoch() + Duration::hours(1));
        repo.update(&offer, read_version).await.expect("guarded update");

        let loaded = repo.find_by_id(&offer.id).await.expect("find").expect("exists");
        assert_eq!(loaded, offer);
        assert_eq!(loaded.status, OfferStatus::Quoted);

        let stale = repo.update(&offer, read_version).await.expect_err("stale version");
        assert!(matches!(stale, RepositoryError::Conflict { entity: "offer", .. }));
    }

    #[tokio::test]
    async fn duplicate_insert_is_reported() {
        let (pool, hotel) = seeded().await;
        let repo = SqlOfferRepository::new(pool);
        let offer = sample_offer("OFR-1", &hotel, epoch());
        repo.insert(&offer).await.expect("insert");

        assert!(matches!(
            repo.insert(&offer).await,
            Err(RepositoryError::Duplicate { entity: "offer", .. })
        ));
    }

    #[tokio::test]
    async fn accept_commits_offer_and_booking_together() {
        let (pool, hotel) = seeded().await;
        let offers = SqlOfferRepository::new(pool.clone());
        let bookings = SqlBookingRepository::new(pool);

        let mut first = sample_offer("OFR-1", &hotel, epoch());
        offers.insert(&first).await.expect("insert first");
        let version = first.version;
        quote_offer(&mut first, epoch());
        offers.update(&first, version).await.expect("quote first");

        let mut second = sample_offer("OFR-2", &hotel, epoch());
        offers.insert(&second).await.expect("insert second");
        let version = second.version;
        quote_offer(&mut second, epoch());
        offers.update(&second, version).await.expect("quote second");

        let engine = FlowEngine::default();
        let read_version = first.version;
        let outcome = engine.apply(first.status, OfferEvent::QuoteAccepted).expect("acceptable");
        first.apply(&outcome, epoch());
        let booking = booking_for(&first, "VG-2027-AAAA2222", epoch());
        offers.accept(&first, read_version, &booking).await.expect("accept");

        // Same confirmation number: booking insert fails, offer update must roll back.
        let read_version = second.version;
        second.apply(&outcome, epoch());
        let clash = booking_for(&second, "VG-2027-AAAA2222", epoch());
        let error = offers.accept(&second, read_version, &clash).await.expect_err("unique code");
        assert!(matches!(error, RepositoryError::Duplicate { entity: "booking", .. }));

        let reloaded = offers.find_by_id(&second.id).await.expect("find").expect("exists");
        assert_eq!(reloaded.status, OfferStatus::Quoted);
        assert!(bookings.find_by_offer(&second.id).await.expect("find").is_none());
        assert!(bookings.find_by_offer(&first.id).await.expect("find").is_some());
    }

    #[tokio::test]
    async fn lapsed_and_participant_listings() {
        let (pool, hotel) = seeded().await;
        let repo = SqlOfferRepository::new(pool);

        let pending = sample_offer("OFR-1", &hotel, epoch());
        repo.insert(&pending).await.expect("insert pending");
        let mut quoted = sample_offer("OFR-2", &hotel, epoch() + Duration::minutes(1));
        repo.insert(&quoted).await.expect("insert quoted");
        let version = quoted.version;
        quote_offer(&mut quoted, epoch());
        repo.update(&quoted, version).await.expect("quote");

        let lapsed = repo.list_lapsed(epoch() + Duration::days(3)).await.expect("lapsed");
        assert_eq!(lapsed.iter().map(|o| o.id.0.as_str()).collect::<Vec<_>>(), vec!["OFR-1"]);

        let lapsed = repo.list_lapsed(epoch() + Duration::days(8)).await.expect("lapsed");
        assert_eq!(lapsed.len(), 2);

        let mine = repo
            .list_for_participant(&ParticipantQuery {
                role: ActorRole::TravelAgent,
                agent_id: AgentId("ta-1".to_owned()),
                status: None,
            })
            .await
            .expect("list");
        let mine_ids: Vec<&str> = mine.iter().map(|o| o.id.0.as_str()).collect();
        assert_eq!(mine_ids, vec!["OFR-2", "OFR-1"]);

        let quoted_only = repo
            .list_for_participant(&ParticipantQuery {
                role: ActorRole::DmcAgent,
                agent_id: AgentId("dmc-1".to_owned()),
                status: Some(OfferStatus::Quoted),
            })
            .await
            .expect("list");
        assert_eq!(quoted_only.len(), 1);

        let stranger = repo
            .list_for_participant(&ParticipantQuery {
                role: ActorRole::DmcAgent,
                agent_id: AgentId("dmc-9".to_owned()),
                status: None,
            })
            .await
            .expect("list");
        assert!(stranger.is_empty());
    }
}
