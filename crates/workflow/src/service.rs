use std::sync::Arc;

use chrono::{DateTime, Utc};

use voyage_core::clock::{Clock, SystemClock};
use voyage_core::config::WorkflowConfig;
use voyage_core::confirmation::{ConfirmationCodeGenerator, RandomConfirmationCodes};
use voyage_core::events::{EventContext, EventSink, NoopEventSink, WorkflowEvent};
use voyage_core::flows::{FlowEngine, OfferFlow};
use voyage_core::search::PageLimits;
use voyage_db::repositories::{
    BookingRepository, HotelRepository, InMemoryMarketplaceStore, OfferRepository,
    SqlBookingRepository, SqlHotelRepository, SqlOfferRepository,
};
use voyage_db::DbPool;

/// Actor recorded on events raised by scheduled sweeps.
pub const SYSTEM_ACTOR: &str = "system";

/// Entry point for every marketplace operation. Holds no per-request state;
/// share it behind an `Arc`.
pub struct MarketplaceService {
    pub(crate) hotels: Arc<dyn HotelRepository>,
    pub(crate) offers: Arc<dyn OfferRepository>,
    pub(crate) bookings: Arc<dyn BookingRepository>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) codes: Arc<dyn ConfirmationCodeGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) engine: FlowEngine<OfferFlow>,
    pub(crate) page_limits: PageLimits,
}

impl MarketplaceService {
    pub fn new(
        hotels: Arc<dyn HotelRepository>,
        offers: Arc<dyn OfferRepository>,
        bookings: Arc<dyn BookingRepository>,
    ) -> Self {
        Self {
            hotels,
            offers,
            bookings,
            events: Arc::new(NoopEventSink),
            codes: Arc::new(RandomConfirmationCodes::default()),
            clock: Arc::new(SystemClock),
            engine: FlowEngine::default(),
            page_limits: PageLimits::default(),
        }
    }

    pub fn in_memory(store: Arc<InMemoryMarketplaceStore>) -> Self {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self::new(
            Arc::new(SqlHotelRepository::new(pool.clone())),
            Arc::new(SqlOfferRepository::new(pool.clone())),
            Arc::new(SqlBookingRepository::new(pool)),
        )
    }

    /// Applies the confirmation prefix and paging limits from config.
    pub fn configured(self, config: &WorkflowConfig) -> Self {
        self.with_confirmation_codes(Arc::new(RandomConfirmationCodes::new(
            config.confirmation_prefix.clone(),
        )))
        .with_page_limits(config.page_limits())
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_confirmation_codes(mut self, codes: Arc<dyn ConfirmationCodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_page_limits(mut self, page_limits: PageLimits) -> Self {
        self.page_limits = page_limits;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn page_limits(&self) -> PageLimits {
        self.page_limits
    }

    /// Called only after the change it describes has been persisted.
    pub(crate) fn publish(&self, context: &EventContext, name: &str, metadata: &[(&str, String)]) {
        let mut event = WorkflowEvent::new(
            name,
            context.entity_id.clone(),
            context.correlation_id.clone(),
            context.actor.clone(),
            self.clock.now(),
        );
        for (key, value) in metadata {
            event = event.with_metadata(*key, value.clone());
        }
        self.events.emit(event);
    }
}
