use tracing::info;

use voyage_core::domain::actor::{AgentId, RequestContext};
use voyage_core::domain::hotel::{Hotel, HotelDraft, HotelId, HotelPatch};
use voyage_core::errors::ApplicationError;
use voyage_core::search::{self, HotelSearchFilters, Page, PageRequest};

use crate::service::MarketplaceService;

impl MarketplaceService {
    pub async fn create_hotel(
        &self,
        ctx: &RequestContext,
        draft: HotelDraft,
    ) -> Result<Hotel, ApplicationError> {
        let hotel = Hotel::create(HotelId::generate(), &ctx.actor, draft, self.now())?;
        self.hotels.save(hotel.clone()).await?;

        info!(
            hotel_id = %hotel.id,
            dmc_agent_id = %hotel.dmc_agent_id,
            correlation_id = %ctx.correlation_id,
            "hotel listed"
        );
        Ok(hotel)
    }

    pub async fn update_hotel(
        &self,
        ctx: &RequestContext,
        hotel_id: &HotelId,
        patch: HotelPatch,
    ) -> Result<Hotel, ApplicationError> {
        let mut hotel = self.load_hotel(hotel_id).await?;
        hotel.ensure_owner(&ctx.actor)?;
        hotel.apply_patch(patch, self.now())?;
        self.hotels.save(hotel.clone()).await?;
        Ok(hotel)
    }

    /// Soft delete. Deactivating an inactive hotel is a no-op.
    pub async fn deactivate_hotel(
        &self,
        ctx: &RequestContext,
        hotel_id: &HotelId,
    ) -> Result<Hotel, ApplicationError> {
        let mut hotel = self.load_hotel(hotel_id).await?;
        hotel.ensure_owner(&ctx.actor)?;
        if hotel.deactivate(self.now()) {
            self.hotels.save(hotel.clone()).await?;
            info!(hotel_id = %hotel.id, correlation_id = %ctx.correlation_id, "hotel deactivated");
        }
        Ok(hotel)
    }

    pub async fn get_hotel(&self, hotel_id: &HotelId) -> Result<Hotel, ApplicationError> {
        self.load_hotel(hotel_id).await
    }

    /// All hotels owned by `dmc_agent_id`, inactive ones included.
    pub async fn list_hotels_for_dmc(
        &self,
        dmc_agent_id: &AgentId,
        page: PageRequest,
    ) -> Result<Page<Hotel>, ApplicationError> {
        let mut hotels = self.hotels.list_by_owner(dmc_agent_id).await?;
        hotels.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(Page::from_items(hotels, page.window(self.page_limits)))
    }

    pub async fn search_hotels(
        &self,
        filters: &HotelSearchFilters,
        page: PageRequest,
    ) -> Result<Page<Hotel>, ApplicationError> {
        filters.validate()?;
        let active = self.hotels.list_active().await?;
        Ok(search::search_hotels(active, filters, page.window(self.page_limits))?)
    }

    pub(crate) async fn load_hotel(&self, hotel_id: &HotelId) -> Result<Hotel, ApplicationError> {
        self.hotels
            .find_by_id(hotel_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("hotel", hotel_id.0.clone()))
    }
}
