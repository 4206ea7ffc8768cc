//! Declarative flow graphs.
//!
//! A flow is an ordered list of step descriptors; the first one is the entry
//! step. Each descriptor maps step outcomes to a [`Continuation`], a tagged
//! value the controller interprets after the step reports. Steps referenced
//! only from continuations (proceed, remediation) need no descriptor.
//!
//! ```json
//! {
//!   "steps": [
//!     {
//!       "id": "1",
//!       "on": {
//!         "success": {
//!           "action": "session_limit_gate",
//!           "attributes": { "sessionLimit": "2" },
//!           "proceed": "2",
//!           "remediation": "3"
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
};

use crate::policy::SessionLimitPolicy;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowDefinitionError {
    #[error("Flow must declare at least one step")]
    NoSteps,
    #[error("Step {0} is declared more than once")]
    DuplicateStep(StepId),
    #[error("Only one session limit gate is allowed per flow, found {0}")]
    MultipleSessionLimitGates(usize),
    #[error("Invalid flow definition: {0}")]
    Parse(String),
}

/// Opaque step identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a step reported when it finished.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Success,
    Failure,
    /// Flow-specific outcome name.
    Other(String),
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => Self::Success,
            "failure" => Self::Failure,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Outcome {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Outcome> for String {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follow-up registered for one outcome of a step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Continuation {
    /// Run the listed steps in order.
    Execute { steps: Vec<StepId> },
    /// Evaluate the session limit and run `proceed`, preceded by `remediation`
    /// when the principal is over the limit.
    SessionLimitGate(SessionLimitGate),
    /// End the attempt with a framework-level failure.
    Fail {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimitGate {
    /// Policy attributes written into the context before evaluating.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub proceed: StepId,
    pub remediation: StepId,
}

impl SessionLimitGate {
    #[must_use]
    pub fn new(policy: SessionLimitPolicy, proceed: StepId, remediation: StepId) -> Self {
        Self {
            attributes: policy.to_attributes(),
            proceed,
            remediation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub on: HashMap<Outcome, Continuation>,
}

impl StepDescriptor {
    #[must_use]
    pub fn new(id: impl Into<StepId>) -> Self {
        Self {
            id: id.into(),
            on: HashMap::new(),
        }
    }

    #[must_use]
    pub fn on(mut self, outcome: Outcome, continuation: Continuation) -> Self {
        self.on.insert(outcome, continuation);
        self
    }

    #[must_use]
    pub fn continuation(&self, outcome: &Outcome) -> Option<&Continuation> {
        self.on.get(outcome)
    }
}

#[derive(Deserialize)]
struct RawFlowDefinition {
    steps: Vec<StepDescriptor>,
}

impl TryFrom<RawFlowDefinition> for FlowDefinition {
    type Error = FlowDefinitionError;

    fn try_from(raw: RawFlowDefinition) -> Result<Self, Self::Error> {
        Self::new(raw.steps)
    }
}

/// Validated flow graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFlowDefinition")]
pub struct FlowDefinition {
    steps: Vec<StepDescriptor>,
}

impl FlowDefinition {
    /// # Errors
    /// Returns an error if there are no steps, a step id repeats, or more than
    /// one session limit gate is registered.
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self, FlowDefinitionError> {
        if steps.is_empty() {
            return Err(FlowDefinitionError::NoSteps);
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(&step.id) {
                return Err(FlowDefinitionError::DuplicateStep(step.id.clone()));
            }
        }

        let gates = steps
            .iter()
            .flat_map(|step| step.on.values())
            .filter(|continuation| matches!(continuation, Continuation::SessionLimitGate(_)))
            .count();
        if gates > 1 {
            return Err(FlowDefinitionError::MultipleSessionLimitGates(gates));
        }

        Ok(Self { steps })
    }

    /// Entry step gated by the session limit: on success run `proceed`, with
    /// `remediation` first when the principal is over the limit.
    ///
    /// # Errors
    /// Never fails for this shape; kept fallible like [`Self::new`].
    pub fn session_limited(
        policy: SessionLimitPolicy,
        entry: StepId,
        proceed: StepId,
        remediation: StepId,
    ) -> Result<Self, FlowDefinitionError> {
        Self::new(vec![StepDescriptor::new(entry).on(
            Outcome::Success,
            Continuation::SessionLimitGate(SessionLimitGate::new(policy, proceed, remediation)),
        )])
    }

    /// # Errors
    /// Returns `FlowDefinitionError::Parse` for malformed JSON or any
    /// validation error raised by [`Self::new`].
    pub fn from_json(json: &str) -> Result<Self, FlowDefinitionError> {
        serde_json::from_str(json).map_err(|err| FlowDefinitionError::Parse(err.to_string()))
    }

    #[must_use]
    pub fn entry(&self) -> &StepId {
        // `new` rejects empty flows.
        &self.steps[0].id
    }

    #[must_use]
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    #[must_use]
    pub fn descriptor(&self, id: &StepId) -> Option<&StepDescriptor> {
        self.steps.iter().find(|step| &step.id == id)
    }

    /// Declared step following `id`, if `id` is declared and not last.
    #[must_use]
    pub fn next_declared(&self, id: &StepId) -> Option<&StepId> {
        let index = self.steps.iter().position(|step| &step.id == id)?;
        self.steps.get(index + 1).map(|step| &step.id)
    }
}
