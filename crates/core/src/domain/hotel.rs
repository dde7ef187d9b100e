use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::{Actor, ActorRole, AgentId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HotelId(pub String);

impl HotelId {
    pub fn generate() -> Self {
        Self(format!("HTL-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub name: String,
    pub max_occupancy: u32,
    pub base_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: HotelId,
    pub dmc_agent_id: AgentId,
    pub name: String,
    pub location: Location,
    pub star_rating: u8,
    pub amenities: BTreeSet<String>,
    pub room_types: Vec<RoomType>,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hotel {
    pub fn create(
        id: HotelId,
        owner: &Actor,
        draft: HotelDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        owner.require_role(ActorRole::DmcAgent)?;
        draft.validate()?;

        Ok(Self {
            id,
            dmc_agent_id: owner.id.clone(),
            name: draft.name.trim().to_owned(),
            location: draft.location,
            star_rating: draft.star_rating,
            amenities: draft.amenities,
            room_types: draft.room_types,
            description: draft.description,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Cheapest nightly base price across room types; `None` when the hotel lists no rooms.
    pub fn min_base_price(&self) -> Option<Decimal> {
        self.room_types.iter().map(|room| room.base_price).min()
    }

    pub fn room_type(&self, name: &str) -> Option<&RoomType> {
        let wanted = name.trim();
        self.room_types.iter().find(|room| room.name.eq_ignore_ascii_case(wanted))
    }

    pub fn has_amenity(&self, amenity: &str) -> bool {
        let wanted = amenity.trim();
        self.amenities.iter().any(|candidate| candidate.eq_ignore_ascii_case(wanted))
    }

    pub fn ensure_owner(&self, actor: &Actor) -> Result<(), DomainError> {
        actor.require_role(ActorRole::DmcAgent)?;
        if self.dmc_agent_id != actor.id {
            return Err(DomainError::Forbidden(format!(
                "hotel `{}` is owned by another dmc agent",
                self.id
            )));
        }
        Ok(())
    }

    pub fn apply_patch(
        &mut self,
        patch: HotelPatch,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut next = HotelDraft {
            name: self.name.clone(),
            location: self.location.clone(),
            star_rating: self.star_rating,
            amenities: self.amenities.clone(),
            room_types: self.room_types.clone(),
            description: self.description.clone(),
        };

        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(location) = patch.location {
            next.location = location;
        }
        if let Some(star_rating) = patch.star_rating {
            next.star_rating = star_rating;
        }
        if let Some(amenities) = patch.amenities {
            next.amenities = amenities;
        }
        if let Some(room_types) = patch.room_types {
            next.room_types = room_types;
        }
        if let Some(description) = patch.description {
            next.description = Some(description);
        }

        next.validate()?;

        self.name = next.name.trim().to_owned();
        self.location = next.location;
        self.star_rating = next.star_rating;
        self.amenities = next.amenities;
        self.room_types = next.room_types;
        self.description = next.description;
        self.updated_at = now;
        Ok(())
    }

    /// Soft delete: history that references the hotel stays intact.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.updated_at = now;
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelDraft {
    pub name: String,
    pub location: Location,
    pub star_rating: u8,
    #[serde(default)]
    pub amenities: BTreeSet<String>,
    #[serde(default)]
    pub room_types: Vec<RoomType>,
    #[serde(default)]
    pub description: Option<String>,
}

impl HotelDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("hotel name must not be empty"));
        }
        if self.location.city.trim().is_empty() || self.location.country.trim().is_empty() {
            return Err(DomainError::validation("hotel location requires a city and a country"));
        }
        if !(1..=5).contains(&self.star_rating) {
            return Err(DomainError::validation(format!(
                "star rating must be between 1 and 5, got {}",
                self.star_rating
            )));
        }
        for room in &self.room_types {
            if room.name.trim().is_empty() {
                return Err(DomainError::validation("room type name must not be empty"));
            }
            if room.max_occupancy == 0 {
                return Err(DomainError::validation(format!(
                    "room type `{}` must allow at least one guest",
                    room.name
                )));
            }
            if room.base_price.is_sign_negative() {
                return Err(DomainError::validation(format!(
                    "room type `{}` has a negative base price",
                    room.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelPatch {
    pub name: Option<String>,
    pub location: Option<Location>,
    pub star_rating: Option<u8>,
    pub amenities: Option<BTreeSet<String>>,
    pub room_types: Option<Vec<RoomType>>,
    pub description: Option<String>,
}
