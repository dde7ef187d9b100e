use chrono::Utc;
use thiserror::Error;

use crate::domain::offer::OfferStatus;
use crate::events::{EventContext, EventSink, WorkflowEvent};
use crate::flows::states::{FlowAction, OfferEvent, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> OfferStatus;
    fn transition(
        &self,
        current: OfferStatus,
        event: OfferEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Offer negotiation lifecycle. `Accepted`, `Rejected` and `Expired` are terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfferFlow;

impl FlowDefinition for OfferFlow {
    fn initial_state(&self) -> OfferStatus {
        OfferStatus::Pending
    }

    fn transition(
        &self,
        current: OfferStatus,
        event: OfferEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_offer(current, event)
    }
}

#[derive(Clone, Debug)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> OfferStatus {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: OfferStatus,
        event: OfferEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }

    /// Like [`FlowEngine::apply`] but reports rejected transitions to `sink`.
    /// Successful transitions are announced by the caller once they are persisted.
    pub fn apply_with_events<S>(
        &self,
        current: OfferStatus,
        event: OfferEvent,
        sink: &S,
        context: &EventContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: EventSink + ?Sized,
    {
        let result = self.apply(current, event);
        if let Err(error) = &result {
            sink.emit(
                WorkflowEvent::new(
                    "offer.transition_rejected",
                    context.entity_id.clone(),
                    context.correlation_id.clone(),
                    context.actor.clone(),
                    Utc::now(),
                )
                .rejected()
                .with_metadata("state", current.as_str())
                .with_metadata("error", error.to_string()),
            );
        }
        result
    }
}

impl Default for FlowEngine<OfferFlow> {
    fn default() -> Self {
        Self::new(OfferFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: OfferStatus, event: OfferEvent },
}

fn transition_offer(
    current: OfferStatus,
    event: OfferEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{CreateBooking, NotifyDmcAgent, NotifyTravelAgent};
    use OfferEvent::{OfferLapsed, QuoteAccepted, QuoteAttached, QuoteLapsed, QuoteRejected};
    use OfferStatus::{Accepted, Expired, Pending, Quoted, Rejected};

    let (to, actions) = match (current, event) {
        (Pending, QuoteAttached) | (Quoted, QuoteAttached) => (Quoted, vec![NotifyTravelAgent]),
        (Quoted, QuoteAccepted) => (Accepted, vec![CreateBooking, NotifyDmcAgent]),
        (Quoted, QuoteRejected) => (Rejected, vec![NotifyDmcAgent]),
        (Pending, OfferLapsed) | (Quoted, QuoteLapsed) => (Expired, Vec::new()),
        _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::offer::OfferStatus;
    use crate::events::{EventContext, EventOutcome, InMemoryEventSink};
    use crate::flows::engine::{FlowEngine, FlowTransitionError, OfferFlow};
    use crate::flows::states::{FlowAction, OfferEvent};

    const EVENTS: [OfferEvent; 5] = [
        OfferEvent::QuoteAttached,
        OfferEvent::QuoteAccepted,
        OfferEvent::QuoteRejected,
        OfferEvent::OfferLapsed,
        OfferEvent::QuoteLapsed,
    ];

    #[test]
    fn happy_path_through_acceptance() {
        let engine = FlowEngine::new(OfferFlow);
        let mut state = engine.initial_state();

        state = engine.apply(state, OfferEvent::QuoteAttached).expect("pending -> quoted").to;
        state = engine.apply(state, OfferEvent::QuoteAttached).expect("re-quote").to;
        let accepted = engine.apply(state, OfferEvent::QuoteAccepted).expect("quoted -> accepted");

        assert_eq!(accepted.from, OfferStatus::Quoted);
        assert_eq!(accepted.to, OfferStatus::Accepted);
        assert!(accepted.actions.contains(&FlowAction::CreateBooking));
    }

    #[test]
    fn terminal_states_accept_no_events() {
        let engine = FlowEngine::default();
        for state in [OfferStatus::Accepted, OfferStatus::Rejected, OfferStatus::Expired] {
            assert!(state.is_terminal());
            for event in EVENTS {
                assert_eq!(
                    engine.apply(state, event),
                    Err(FlowTransitionError::InvalidTransition { state, event })
                );
            }
        }
    }

    #[test]
    fn only_listed_edges_are_reachable() {
        let engine = FlowEngine::default();
        let mut edges = Vec::new();
        for state in OfferStatus::ALL {
            for event in EVENTS {
                if let Ok(outcome) = engine.apply(state, event) {
                    edges.push((state, outcome.to));
                }
            }
        }

        assert_eq!(
            edges,
            vec![
                (OfferStatus::Pending, OfferStatus::Quoted),
                (OfferStatus::Pending, OfferStatus::Expired),
                (OfferStatus::Quoted, OfferStatus::Quoted),
                (OfferStatus::Quoted, OfferStatus::Accepted),
                (OfferStatus::Quoted, OfferStatus::Rejected),
                (OfferStatus::Quoted, OfferStatus::Expired),
            ]
        );
    }

    #[test]
    fn lapse_events_only_match_their_state() {
        let engine = FlowEngine::default();
        assert!(engine.apply(OfferStatus::Pending, OfferEvent::QuoteLapsed).is_err());
        assert!(engine.apply(OfferStatus::Quoted, OfferEvent::OfferLapsed).is_err());
        assert!(engine.apply(OfferStatus::Pending, OfferEvent::QuoteAccepted).is_err());
    }

    #[test]
    fn rejected_transition_emits_event() {
        let engine = FlowEngine::default();
        let sink = InMemoryEventSink::default();

        let result = engine.apply_with_events(
            OfferStatus::Rejected,
            OfferEvent::QuoteAttached,
            &sink,
            &EventContext::new("OFR-9", "req-42", "dmc-1"),
        );

        assert!(result.is_err());
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "offer.transition_rejected");
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].outcome, EventOutcome::Rejected);
    }
}
