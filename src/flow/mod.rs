//! Step flow controller.
//!
//! A flow is a graph of opaque steps. The controller asks a
//! [`StepExecutor`] to run each step, then interprets the continuation the
//! [`FlowDefinition`] registers for the reported outcome. The session limit
//! gate is one such continuation: after the entry step succeeds it evaluates
//! the policy once and schedules either `[proceed]` or
//! `[remediation, proceed]`.
//!
//! Steps scheduled by a continuation run ahead of anything already pending.
//! When an outcome has no continuation the controller moves to the next
//! pending step. Failing that, a step reached in declaration order moves on
//! to the next declared step; a step placed by a continuation completes the
//! attempt. An attempt stops after [`MAX_STEPS_PER_ATTEMPT`] steps.

mod controller;
mod definition;
mod diagnostics;

pub use controller::{
    FlowController, FlowError, FlowProgress, FlowReport, StepError, StepExecutor, StepStatus,
    MAX_STEPS_PER_ATTEMPT,
};
pub use definition::{
    Continuation, FlowDefinition, FlowDefinitionError, Outcome, SessionLimitGate, StepDescriptor,
    StepId,
};
pub use diagnostics::{DiagnosticSink, TracingSink};

pub(crate) use controller::Execution;

/// Where an attempt currently stands.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    NotStarted,
    /// Waiting on external input for `step`.
    Suspended { step: StepId },
    Complete { last_outcome: Outcome },
    /// A framework-level error ended the attempt.
    Failed,
}
