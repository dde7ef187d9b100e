use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::actor::AgentId;
use crate::domain::hotel::Hotel;
use crate::errors::DomainError;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Catalog query. Empty collections mean "no constraint".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotelSearchFilters {
    /// Case-insensitive substring against name, city, and country.
    pub destination: Option<String>,
    pub star_rating: BTreeSet<u8>,
    /// Any-of, case-insensitive.
    pub amenities: Vec<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub dmc_agent_id: Option<AgentId>,
    /// Any-of, case-insensitive.
    pub room_types: Vec<String>,
}

impl HotelSearchFilters {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(rating) = self.star_rating.iter().find(|rating| !(1..=5).contains(*rating)) {
            return Err(DomainError::validation(format!(
                "star rating filter must be between 1 and 5, got {rating}"
            )));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(DomainError::validation(format!(
                    "min_price {min} exceeds max_price {max}"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, hotel: &Hotel) -> bool {
        if !hotel.active {
            return false;
        }

        if let Some(destination) = self.destination.as_deref().map(str::trim) {
            let needle = destination.to_lowercase();
            let hit = [&hotel.name, &hotel.location.city, &hotel.location.country]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !needle.is_empty() && !hit {
                return false;
            }
        }

        if !self.star_rating.is_empty() && !self.star_rating.contains(&hotel.star_rating) {
            return false;
        }

        if !self.amenities.is_empty()
            && !self.amenities.iter().any(|amenity| hotel.has_amenity(amenity))
        {
            return false;
        }

        if self.min_price.is_some() || self.max_price.is_some() {
            let Some(price) = hotel.min_base_price() else {
                return false;
            };
            if self.min_price.is_some_and(|min| price < min)
                || self.max_price.is_some_and(|max| price > max)
            {
                return false;
            }
        }

        if self.dmc_agent_id.as_ref().is_some_and(|owner| *owner != hotel.dmc_agent_id) {
            return false;
        }

        if !self.room_types.is_empty()
            && !self.room_types.iter().any(|name| hotel.room_type(name).is_some())
        {
            return false;
        }

        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { default_limit: DEFAULT_PAGE_LIMIT, max_limit: MAX_PAGE_LIMIT }
    }
}

/// Caller-supplied paging; `page` is 1-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page: Some(page), limit: Some(limit) }
    }

    pub fn window(&self, limits: PageLimits) -> PageWindow {
        let max_limit = limits.max_limit.max(1);
        let limit = self.limit.unwrap_or(limits.default_limit).clamp(1, max_limit);
        PageWindow { page: self.page.unwrap_or(1).max(1), limit }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, window: PageWindow) -> Self {
        let total_pages = total.div_ceil(u64::from(window.limit));
        Self {
            items,
            total,
            page: window.page,
            limit: window.limit,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    /// Slices an already filtered and ordered result set.
    pub fn from_items(all: Vec<T>, window: PageWindow) -> Self {
        let total = all.len() as u64;
        let skip = usize::try_from(window.offset()).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(skip).take(window.limit as usize).collect();
        Self::new(items, total, window)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// Filters `hotels` and returns the requested page ordered by `(created_at, id)`.
pub fn search_hotels(
    hotels: impl IntoIterator<Item = Hotel>,
    filters: &HotelSearchFilters,
    window: PageWindow,
) -> Result<Page<Hotel>, DomainError> {
    filters.validate()?;

    let mut matched: Vec<Hotel> =
        hotels.into_iter().filter(|hotel| filters.matches(hotel)).collect();
    matched.sort_by(|left, right| {
        left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
    });

    Ok(Page::from_items(matched, window))
}
