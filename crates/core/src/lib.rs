pub mod clock;
pub mod config;
pub mod confirmation;
pub mod domain;
pub mod errors;
pub mod events;
pub mod flows;
pub mod search;

pub use chrono;
pub use rust_decimal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use confirmation::{
    ConfirmationCodeGenerator, RandomConfirmationCodes, ScriptedConfirmationCodes,
    MAX_CONFIRMATION_ATTEMPTS,
};
pub use domain::actor::{Actor, ActorRole, AgentId, RequestContext};
pub use domain::booking::{
    AdditionalGuest, Booking, BookingId, BookingStatus, GuestDetails, PaymentStatus, PrimaryGuest,
};
pub use domain::hotel::{Hotel, HotelDraft, HotelId, HotelPatch, Location, RoomType};
pub use domain::offer::{
    BudgetRange, GuestCounts, Offer, OfferId, OfferRequest, OfferStatus, RoomRequirement,
};
pub use domain::quote::{Quote, QuoteDraft, RoomRate};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use events::{
    EventContext, EventOutcome, EventSink, InMemoryEventSink, NoopEventSink, WorkflowEvent,
};
pub use flows::{
    FlowAction, FlowEngine, FlowTransitionError, OfferEvent, OfferFlow, TransitionOutcome,
};
pub use search::{search_hotels, HotelSearchFilters, Page, PageLimits, PageRequest, PageWindow};
