use std::collections::BTreeSet;

use sqlx::sqlite::SqliteRow;

use voyage_core::domain::actor::AgentId;
use voyage_core::domain::hotel::{Hotel, HotelId, Location, RoomType};

use super::codec::{column, from_json, parse_timestamp, timestamp, to_json};
use super::{HotelRepository, RepositoryError};
use crate::DbPool;

const HOTEL_COLUMNS: &str = "id, dmc_agent_id, name, city, country, address, district, star_rating,
     amenities_json, room_types_json, description, active, created_at, updated_at";

pub struct SqlHotelRepository {
    pool: DbPool,
}

impl SqlHotelRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_hotel(row: &SqliteRow) -> Result<Hotel, RepositoryError> {
    let star_rating: i64 = column(row, "star_rating")?;
    let star_rating = u8::try_from(star_rating)
        .map_err(|_| RepositoryError::Decode(format!("star_rating: {star_rating} out of range")))?;
    let amenities: BTreeSet<String> =
        from_json("amenities_json", &column::<String>(row, "amenities_json")?)?;
    let room_types: Vec<RoomType> =
        from_json("room_types_json", &column::<String>(row, "room_types_json")?)?;

    Ok(Hotel {
        id: HotelId(column(row, "id")?),
        dmc_agent_id: AgentId(column(row, "dmc_agent_id")?),
        name: column(row, "name")?,
        location: Location {
            city: column(row, "city")?,
            country: column(row, "country")?,
            address: column(row, "address")?,
            district: column(row, "district")?,
        },
        star_rating,
        amenities,
        room_types,
        description: column(row, "description")?,
        active: column::<i64>(row, "active")? != 0,
        created_at: parse_timestamp("created_at", &column::<String>(row, "created_at")?)?,
        updated_at: parse_timestamp("updated_at", &column::<String>(row, "updated_at")?)?,
    })
}

#[async_trait::async_trait]
impl HotelRepository for SqlHotelRepository {
    async fn find_by_id(&self, id: &HotelId) -> Result<Option<Hotel>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {HOTEL_COLUMNS} FROM hotel WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_hotel(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, hotel: Hotel) -> Result<(), RepositoryError> {
        let amenities = to_json("amenities_json", &hotel.amenities)?;
        let room_types = to_json("room_types_json", &hotel.room_types)?;

        sqlx::query(
            "INSERT INTO hotel (id, dmc_agent_id, name, city, country, address, district,
                                star_rating, amenities_json, room_types_json, description,
                                active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 city = excluded.city,
                 country = excluded.country,
                 address = excluded.address,
                 district = excluded.district,
                 star_rating = excluded.star_rating,
                 amenities_json = excluded.amenities_json,
                 room_types_json = excluded.room_types_json,
                 description = excluded.description,
                 active = excluded.active,
                 updated_at = excluded.updated_at",
        )
        .bind(&hotel.id.0)
        .bind(&hotel.dmc_agent_id.0)
        .bind(&hotel.name)
        .bind(&hotel.location.city)
        .bind(&hotel.location.country)
        .bind(&hotel.location.address)
        .bind(&hotel.location.district)
        .bind(i64::from(hotel.star_rating))
        .bind(amenities)
        .bind(room_types)
        .bind(&hotel.description)
        .bind(i64::from(hotel.active))
        .bind(timestamp(hotel.created_at))
        .bind(timestamp(hotel.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Hotel>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {HOTEL_COLUMNS} FROM hotel WHERE active = 1 ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_hotel).collect::<Result<Vec<_>, _>>()
    }

    async fn list_by_owner(&self, dmc_agent_id: &AgentId) -> Result<Vec<Hotel>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {HOTEL_COLUMNS} FROM hotel WHERE dmc_agent_id = ? \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(&dmc_agent_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_hotel).collect::<Result<Vec<_>, _>>()
    }
}
