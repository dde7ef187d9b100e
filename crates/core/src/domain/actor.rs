use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    TravelAgent,
    DmcAgent,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TravelAgent => "travel_agent",
            Self::DmcAgent => "dmc_agent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "travel_agent" => Some(Self::TravelAgent),
            "dmc_agent" => Some(Self::DmcAgent),
            _ => None,
        }
    }
}

/// Caller identity as supplied by the authentication layer. Trusted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: AgentId,
    pub role: ActorRole,
}

impl Actor {
    pub fn travel_agent(id: impl Into<String>) -> Self {
        Self { id: AgentId(id.into()), role: ActorRole::TravelAgent }
    }

    pub fn dmc_agent(id: impl Into<String>) -> Self {
        Self { id: AgentId(id.into()), role: ActorRole::DmcAgent }
    }

    pub fn require_role(&self, role: ActorRole) -> Result<(), DomainError> {
        if self.role == role {
            return Ok(());
        }

        Err(DomainError::Forbidden(format!(
            "operation requires role `{}` but caller `{}` is `{}`",
            role.as_str(),
            self.id,
            self.role.as_str()
        )))
    }
}

/// Per-request envelope threaded through every workflow operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: Actor,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(actor: Actor, correlation_id: impl Into<String>) -> Self {
        Self { actor, correlation_id: correlation_id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, ActorRole};
    use crate::errors::DomainError;

    #[test]
    fn role_round_trips_from_header_encoding() {
        for role in [ActorRole::TravelAgent, ActorRole::DmcAgent] {
            assert_eq!(ActorRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ActorRole::parse(" DMC_AGENT "), Some(ActorRole::DmcAgent));
        assert_eq!(ActorRole::parse("admin"), None);
    }

    #[test]
    fn require_role_rejects_wrong_role() {
        let actor = Actor::dmc_agent("dmc-1");

        assert!(actor.require_role(ActorRole::DmcAgent).is_ok());
        let error = actor.require_role(ActorRole::TravelAgent).expect_err("dmc cannot act as ta");
        assert!(matches!(error, DomainError::Forbidden(ref message) if message.contains("dmc-1")));
    }
}
