pub mod actor;
pub mod booking;
pub mod hotel;
pub mod offer;
pub mod quote;
