use serde::{Deserialize, Serialize};

use crate::domain::offer::OfferStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferEvent {
    QuoteAttached,
    QuoteAccepted,
    QuoteRejected,
    /// Offer `expires_at` passed while still pending.
    OfferLapsed,
    /// Quote `valid_until` passed while still quoted.
    QuoteLapsed,
}

impl OfferEvent {
    /// Verb phrase used in "cannot {operation} offer in state ..." messages.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::QuoteAttached => "attach a quote to",
            Self::QuoteAccepted => "accept the quote on",
            Self::QuoteRejected => "reject the quote on",
            Self::OfferLapsed | Self::QuoteLapsed => "expire",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    NotifyTravelAgent,
    NotifyDmcAgent,
    CreateBooking,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: OfferStatus,
    pub to: OfferStatus,
    pub event: OfferEvent,
    pub actions: Vec<FlowAction>,
}
