//! Marketplace workflow: the operations travel agents, DMC agents and the
//! scheduler invoke, each a guarded read-check-write over the repositories.

pub mod bookings;
pub mod catalog;
pub mod events;
pub mod offers;
pub mod service;
pub mod sweeper;
pub mod sweeps;

pub use bookings::BookingStatistics;
pub use events::TracingEventSink;
pub use offers::{AcceptedOffer, OfferStatistics};
pub use service::MarketplaceService;
pub use sweeper::SweepScheduler;
pub use sweeps::{SweepReport, SweepSummary};
