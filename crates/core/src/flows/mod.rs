pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, OfferFlow};
pub use states::{FlowAction, OfferEvent, TransitionOutcome};
