use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use voyage_core::domain::actor::{Actor, AgentId};
use voyage_core::domain::hotel::{Hotel, HotelDraft, HotelId, Location, RoomType};

use crate::repositories::{HotelRepository, RepositoryError};

/// Deterministic demo inventory: two DMC agents and the hotels they list.
const DEMO_HOTELS: &[DemoHotelContract] = &[
    DemoHotelContract {
        hotel_id: "HTL-demo-paris-001",
        dmc_agent_id: "dmc-demo-001",
        name: "Hotel Lumiere Saint-Germain",
        city: "Paris",
        country: "France",
        district: "Saint-Germain-des-Pres",
        star_rating: 5,
        amenities: &["Wifi", "Spa", "Restaurant", "Bar", "Room Service", "Business Center"],
        rooms: &[("Double", 2, 480_00), ("Suite", 4, 910_00), ("Deluxe", 3, 690_00)],
    },
    DemoHotelContract {
        hotel_id: "HTL-demo-paris-002",
        dmc_agent_id: "dmc-demo-001",
        name: "Le Petit Marais",
        city: "Paris",
        country: "France",
        district: "Le Marais",
        star_rating: 3,
        amenities: &["Wifi", "Restaurant"],
        rooms: &[("Single", 1, 95_50), ("Double", 2, 138_00), ("Twin", 2, 131_00)],
    },
    DemoHotelContract {
        hotel_id: "HTL-demo-rome-001",
        dmc_agent_id: "dmc-demo-001",
        name: "Palazzo Navona",
        city: "Rome",
        country: "Italy",
        district: "Centro Storico",
        star_rating: 4,
        amenities: &["Wifi", "Pool", "Gym", "Bar", "Parking"],
        rooms: &[("Double", 2, 250_00), ("Family", 6, 410_00), ("Deluxe", 3, 345_00)],
    },
    DemoHotelContract {
        hotel_id: "HTL-demo-dubai-001",
        dmc_agent_id: "dmc-demo-002",
        name: "Marina Pearl Resort",
        city: "Dubai",
        country: "United Arab Emirates",
        district: "Dubai Marina",
        star_rating: 5,
        amenities: &["Wifi", "Pool", "Spa", "Gym", "Restaurant", "Bar", "Parking"],
        rooms: &[("Double", 2, 620_00), ("Suite", 4, 1_140_00), ("Family", 6, 880_00)],
    },
    DemoHotelContract {
        hotel_id: "HTL-demo-lisbon-001",
        dmc_agent_id: "dmc-demo-002",
        name: "Casa do Rio",
        city: "Lisbon",
        country: "Portugal",
        district: "Baixa",
        star_rating: 4,
        amenities: &["Wifi", "Restaurant", "Room Service", "Parking"],
        rooms: &[("Single", 1, 142_00), ("Double", 2, 199_00), ("Twin", 2, 189_00)],
    },
    DemoHotelContract {
        hotel_id: "HTL-demo-lisbon-002",
        dmc_agent_id: "dmc-demo-002",
        name: "Alfama Budget Inn",
        city: "Lisbon",
        country: "Portugal",
        district: "Alfama",
        star_rating: 2,
        amenities: &["Wifi", "Parking"],
        rooms: &[("Single", 1, 52_00), ("Double", 2, 74_00), ("Family", 6, 118_00)],
    },
];

struct DemoHotelContract {
    hotel_id: &'static str,
    dmc_agent_id: &'static str,
    name: &'static str,
    city: &'static str,
    country: &'static str,
    district: &'static str,
    star_rating: u8,
    amenities: &'static [&'static str],
    /// (room type, max occupancy, nightly base price in cents)
    rooms: &'static [(&'static str, u32, i64)],
}

impl DemoHotelContract {
    fn to_hotel(&self, now: DateTime<Utc>) -> Result<Hotel, RepositoryError> {
        let draft = HotelDraft {
            name: self.name.to_owned(),
            location: Location {
                city: self.city.to_owned(),
                country: self.country.to_owned(),
                address: None,
                district: Some(self.district.to_owned()),
            },
            star_rating: self.star_rating,
            amenities: self.amenities.iter().map(|a| (*a).to_owned()).collect::<BTreeSet<_>>(),
            room_types: self
                .rooms
                .iter()
                .map(|(name, max_occupancy, cents)| RoomType {
                    name: (*name).to_owned(),
                    max_occupancy: *max_occupancy,
                    base_price: Decimal::new(*cents, 2),
                })
                .collect(),
            description: Some(format!(
                "{}-star stay in {}, {}",
                self.star_rating, self.district, self.city
            )),
        };

        Hotel::create(
            HotelId(self.hotel_id.to_owned()),
            &Actor::dmc_agent(self.dmc_agent_id),
            draft,
            now,
        )
        .map_err(|error| {
            RepositoryError::Decode(format!("demo hotel `{}`: {error}", self.hotel_id))
        })
    }
}

/// Demo hotel catalog for local runs and smoke checks.
pub struct DemoCatalog;

impl DemoCatalog {
    /// Upserts every demo hotel. Safe to run repeatedly.
    pub async fn load(
        hotels: &dyn HotelRepository,
        now: DateTime<Utc>,
    ) -> Result<SeedResult, RepositoryError> {
        let mut seeded = Vec::with_capacity(DEMO_HOTELS.len());
        for contract in DEMO_HOTELS {
            let hotel_id = HotelId(contract.hotel_id.to_owned());
            let created_at = match hotels.find_by_id(&hotel_id).await? {
                Some(existing) => existing.created_at,
                None => now,
            };
            let mut hotel = contract.to_hotel(created_at)?;
            hotel.updated_at = now;
            hotels.save(hotel).await?;

            seeded.push(HotelSeedInfo {
                hotel_id: contract.hotel_id,
                dmc_agent_id: contract.dmc_agent_id,
                city: contract.city,
            });
        }
        Ok(SeedResult { hotels_seeded: seeded })
    }

    /// Checks that each demo hotel exists, is active and still belongs to its DMC agent.
    pub async fn verify(
        hotels: &dyn HotelRepository,
    ) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(DEMO_HOTELS.len());
        for contract in DEMO_HOTELS {
            let present = hotels
                .find_by_id(&HotelId(contract.hotel_id.to_owned()))
                .await?
                .is_some_and(|hotel| {
                    hotel.active
                        && hotel.dmc_agent_id == AgentId(contract.dmc_agent_id.to_owned())
                        && hotel.room_types.len() == contract.rooms.len()
                });
            checks.push((contract.hotel_id, present));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub fn dmc_agent_ids() -> BTreeSet<&'static str> {
        DEMO_HOTELS.iter().map(|contract| contract.dmc_agent_id).collect()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HotelSeedInfo {
    pub hotel_id: &'static str,
    pub dmc_agent_id: &'static str,
    pub city: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct SeedResult {
    pub hotels_seeded: Vec<HotelSeedInfo>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
