use async_trait::async_trait;
use std::{collections::VecDeque, fmt, sync::Arc};
use tracing::{debug, error, instrument};

use super::{
    definition::{Continuation, FlowDefinition, Outcome, SessionLimitGate, StepId},
    diagnostics::{DiagnosticSink, TracingSink},
    FlowState,
};
use crate::{
    context::AuthenticationContext,
    policy::{PolicyError, SessionLimitEvaluator},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("Step execution failed: {0}")]
    Execution(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Session limit evaluation failed after step {step}: {source}")]
    Policy {
        step: StepId,
        #[source]
        source: PolicyError,
    },
    #[error("Step {step} could not be executed: {source}")]
    Step {
        step: StepId,
        #[source]
        source: StepError,
    },
    #[error("Step {step} routed the attempt to failure: {reason}")]
    Routed { step: StepId, reason: String },
    #[error("Session limit was already evaluated in this attempt (step {step})")]
    PolicyAlreadyEvaluated { step: StepId },
    #[error("Attempt has already started")]
    AlreadyStarted,
    #[error("Attempt is not waiting on a step")]
    NotSuspended,
    #[error("Attempt exceeded {limit} executed steps at step {step}")]
    StepLimitExceeded { step: StepId, limit: usize },
}

/// Upper bound on steps executed in one attempt; looping flows stop here.
pub const MAX_STEPS_PER_ATTEMPT: usize = 64;

/// Result of asking the framework to run one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Completed(Outcome),
    /// The step waits on external input; the framework resumes the flow later.
    Suspended,
}

/// The framework's step execution API.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &StepId,
        context: &mut AuthenticationContext,
    ) -> Result<StepStatus, StepError>;
}

/// Summary of a concluded attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowReport {
    pub executed: Vec<StepId>,
    pub last_outcome: Outcome,
}

impl FlowReport {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.last_outcome.is_success()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowProgress {
    Suspended { step: StepId },
    Complete(FlowReport),
}

/// How a step got onto the pending queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Entry step or declaration-order progression.
    Declared,
    /// Placed by an `execute` or gate continuation.
    Scheduled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Pending {
    pub(crate) step: StepId,
    pub(crate) origin: Origin,
}

/// Per-attempt execution state, stored in the authentication context.
#[derive(Debug, Default)]
pub(crate) struct Execution {
    pub(crate) executed: Vec<StepId>,
    pub(crate) pending: VecDeque<Pending>,
    /// Origin of the step currently suspended, if any.
    pub(crate) suspended_origin: Option<Origin>,
    pub(crate) last_outcome: Option<Outcome>,
    pub(crate) policy_evaluated: bool,
    pub(crate) state: FlowState,
}

/// Drives one flow definition for any number of attempts.
///
/// The controller is immutable; everything an attempt accumulates lives in
/// its [`AuthenticationContext`], so one controller can be shared by
/// concurrent attempts.
#[derive(Clone)]
pub struct FlowController {
    definition: Arc<FlowDefinition>,
    executor: Arc<dyn StepExecutor>,
    evaluator: SessionLimitEvaluator,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for FlowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowController")
            .field("definition", &self.definition)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

impl FlowController {
    #[must_use]
    pub fn new(
        definition: FlowDefinition,
        executor: Arc<dyn StepExecutor>,
        evaluator: SessionLimitEvaluator,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            definition: Arc::new(definition),
            executor,
            evaluator,
            diagnostics,
        }
    }

    /// Controller reporting diagnostics through [`TracingSink`].
    #[must_use]
    pub fn with_tracing_diagnostics(
        definition: FlowDefinition,
        executor: Arc<dyn StepExecutor>,
        evaluator: SessionLimitEvaluator,
    ) -> Self {
        Self::new(definition, executor, evaluator, Arc::new(TracingSink))
    }

    #[must_use]
    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    /// Start an attempt at the entry step.
    ///
    /// # Errors
    /// Returns `FlowError` when the attempt fails at framework level; the
    /// context is then left in [`FlowState::Failed`].
    #[instrument(skip_all, fields(attempt = %context.attempt_id(), principal = %context.principal()))]
    pub async fn start(
        &self,
        context: &mut AuthenticationContext,
    ) -> Result<FlowProgress, FlowError> {
        if context.execution.state != FlowState::NotStarted {
            return Err(FlowError::AlreadyStarted);
        }

        context.execution.pending.push_back(Pending {
            step: self.definition.entry().clone(),
            origin: Origin::Declared,
        });

        let result = self.run(context).await;
        Self::settle(context, result)
    }

    /// Resume a suspended attempt with the outcome of the step it waited on.
    ///
    /// # Errors
    /// Returns `FlowError::NotSuspended` if the attempt is not waiting, or any
    /// framework-level failure raised while continuing.
    #[instrument(skip_all, fields(attempt = %context.attempt_id(), principal = %context.principal(), %outcome))]
    pub async fn resume(
        &self,
        context: &mut AuthenticationContext,
        outcome: Outcome,
    ) -> Result<FlowProgress, FlowError> {
        let FlowState::Suspended { step } = &context.execution.state else {
            return Err(FlowError::NotSuspended);
        };
        let step = step.clone();
        let origin = context
            .execution
            .suspended_origin
            .take()
            .unwrap_or(Origin::Declared);

        let result = match self.on_outcome(context, &step, origin, outcome).await {
            Ok(()) => self.run(context).await,
            Err(err) => Err(err),
        };
        Self::settle(context, result)
    }

    fn settle(
        context: &mut AuthenticationContext,
        result: Result<FlowProgress, FlowError>,
    ) -> Result<FlowProgress, FlowError> {
        if let Err(err) = &result {
            error!("Authentication flow failed: {}", err);
            context.execution.pending.clear();
            context.execution.state = FlowState::Failed;
        }
        result
    }

    async fn run(&self, context: &mut AuthenticationContext) -> Result<FlowProgress, FlowError> {
        while let Some(Pending { step, origin }) = context.execution.pending.pop_front() {
            if context.execution.executed.len() >= MAX_STEPS_PER_ATTEMPT {
                return Err(FlowError::StepLimitExceeded {
                    step,
                    limit: MAX_STEPS_PER_ATTEMPT,
                });
            }
            debug!("Executing step {}", step);
            context.execution.executed.push(step.clone());

            let status = self
                .executor
                .execute(&step, context)
                .await
                .map_err(|source| FlowError::Step {
                    step: step.clone(),
                    source,
                })?;

            match status {
                StepStatus::Suspended => {
                    debug!("Step {} suspended", step);
                    context.execution.state = FlowState::Suspended { step: step.clone() };
                    context.execution.suspended_origin = Some(origin);
                    return Ok(FlowProgress::Suspended { step });
                }
                StepStatus::Completed(outcome) => {
                    self.on_outcome(context, &step, origin, outcome).await?;
                }
            }
        }

        // Every path into the loop completes at least the entry step.
        let last_outcome = context
            .execution
            .last_outcome
            .clone()
            .unwrap_or(Outcome::Failure);

        context.execution.state = FlowState::Complete {
            last_outcome: last_outcome.clone(),
        };

        Ok(FlowProgress::Complete(FlowReport {
            executed: context.execution.executed.clone(),
            last_outcome,
        }))
    }

    async fn on_outcome(
        &self,
        context: &mut AuthenticationContext,
        step: &StepId,
        origin: Origin,
        outcome: Outcome,
    ) -> Result<(), FlowError> {
        debug!("Step {} reported {}", step, outcome);
        context.execution.last_outcome = Some(outcome.clone());

        let continuation = self
            .definition
            .descriptor(step)
            .and_then(|descriptor| descriptor.continuation(&outcome));

        match continuation {
            None => {
                // Only declared steps progress in declaration order; a
                // scheduled step hands back to whatever is pending.
                if origin == Origin::Declared && context.execution.pending.is_empty() {
                    if let Some(next) = self.definition.next_declared(step) {
                        context.execution.pending.push_back(Pending {
                            step: next.clone(),
                            origin: Origin::Declared,
                        });
                    }
                }
                Ok(())
            }
            Some(Continuation::Execute { steps }) => {
                Self::schedule(context, steps);
                Ok(())
            }
            Some(Continuation::SessionLimitGate(gate)) => {
                let steps = self.gate(context, step, gate).await?;
                Self::schedule(context, &steps);
                Ok(())
            }
            Some(Continuation::Fail { reason }) => Err(FlowError::Routed {
                step: step.clone(),
                reason: reason
                    .clone()
                    .unwrap_or_else(|| format!("outcome {outcome}")),
            }),
        }
    }

    /// Evaluate the session limit and pick the follow-up steps.
    async fn gate(
        &self,
        context: &mut AuthenticationContext,
        step: &StepId,
        gate: &SessionLimitGate,
    ) -> Result<Vec<StepId>, FlowError> {
        if context.execution.policy_evaluated {
            return Err(FlowError::PolicyAlreadyEvaluated { step: step.clone() });
        }
        context.execution.policy_evaluated = true;

        for (key, value) in &gate.attributes {
            context.set_attribute(key.as_str(), value.as_str());
        }

        let verdict = self
            .evaluator
            .evaluate(context)
            .await
            .map_err(|source| FlowError::Policy {
                step: step.clone(),
                source,
            })?;

        let within_limit = verdict.is_within_limit();
        self.diagnostics
            .info(&format!("Within session limit: {within_limit}"));

        if within_limit {
            Ok(vec![gate.proceed.clone()])
        } else {
            Ok(vec![gate.remediation.clone(), gate.proceed.clone()])
        }
    }

    /// Queue `steps` ahead of anything already pending, keeping their order.
    fn schedule(context: &mut AuthenticationContext, steps: &[StepId]) {
        for step in steps.iter().rev() {
            context.execution.pending.push_front(Pending {
                step: step.clone(),
                origin: Origin::Scheduled,
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        context::PrincipalId,
        flow::definition::StepDescriptor,
        policy::{SessionLimit, SessionLimitPolicy, SESSION_LIMIT_ATTRIBUTE},
        registry::test_support::FixedCountRegistry,
    };
    use anyhow::Result;
    use std::{
        collections::{BTreeMap, HashMap},
        sync::Mutex,
    };

    /// Executor answering from a script; unscripted steps succeed.
    #[derive(Default)]
    struct ScriptedExecutor {
        script: Mutex<HashMap<StepId, VecDeque<Result<StepStatus, StepError>>>>,
    }

    impl ScriptedExecutor {
        fn with(self, step: &str, status: Result<StepStatus, StepError>) -> Self {
            self.script
                .lock()
                .unwrap()
                .entry(StepId::from(step))
                .or_default()
                .push_back(status);
            self
        }
    }

    #[async_trait]
    impl StepExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            step: &StepId,
            _context: &mut AuthenticationContext,
        ) -> Result<StepStatus, StepError> {
            let scripted = self
                .script
                .lock()
                .unwrap()
                .get_mut(step)
                .and_then(VecDeque::pop_front);
            scripted.unwrap_or(Ok(StepStatus::Completed(Outcome::Success)))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn info(&self, message: &str) {
            if let Ok(mut messages) = self.messages.lock() {
                messages.push(message.to_string());
            }
        }
    }

    struct Harness {
        controller: FlowController,
        registry: Arc<FixedCountRegistry>,
        sink: Arc<RecordingSink>,
    }

    fn observed_flow() -> FlowDefinition {
        FlowDefinition::session_limited(
            SessionLimitPolicy::new(SessionLimit::new(2).unwrap()),
            StepId::from("1"),
            StepId::from("2"),
            StepId::from("3"),
        )
        .unwrap()
    }

    fn harness(
        definition: FlowDefinition,
        executor: ScriptedExecutor,
        registry: FixedCountRegistry,
    ) -> Harness {
        let registry = Arc::new(registry);
        let sink = Arc::new(RecordingSink::default());
        let controller = FlowController::new(
            definition,
            Arc::new(executor),
            SessionLimitEvaluator::new(registry.clone()),
            sink.clone(),
        );
        Harness {
            controller,
            registry,
            sink,
        }
    }

    fn context() -> AuthenticationContext {
        AuthenticationContext::new(PrincipalId::new("alice").unwrap())
    }

    fn ids(steps: &[&str]) -> Vec<StepId> {
        steps.iter().map(|s| StepId::from(*s)).collect()
    }

    #[tokio::test]
    async fn within_limit_runs_only_proceed() -> Result<()> {
        let h = harness(
            observed_flow(),
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(1),
        );
        let mut ctx = context();

        let progress = h.controller.start(&mut ctx).await?;

        let FlowProgress::Complete(report) = progress else {
            anyhow::bail!("expected completion, got {progress:?}");
        };
        assert_eq!(report.executed, ids(&["1", "2"]));
        assert!(report.is_authenticated());
        assert_eq!(h.registry.calls(), 1);
        assert_eq!(ctx.attribute(SESSION_LIMIT_ATTRIBUTE), Some("2"));
        assert_eq!(
            *h.sink.messages.lock().unwrap(),
            vec!["Within session limit: true".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn over_limit_runs_remediation_then_proceed() -> Result<()> {
        let h = harness(
            observed_flow(),
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(2),
        );
        let mut ctx = context();

        h.controller.start(&mut ctx).await?;

        assert_eq!(ctx.executed_steps(), ids(&["1", "3", "2"]).as_slice());
        assert_eq!(
            ctx.flow_state(),
            &FlowState::Complete {
                last_outcome: Outcome::Success
            }
        );
        assert_eq!(
            *h.sink.messages.lock().unwrap(),
            vec!["Within session limit: false".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn entry_failure_skips_policy() -> Result<()> {
        let executor = ScriptedExecutor::default()
            .with("1", Ok(StepStatus::Completed(Outcome::Failure)));
        let h = harness(observed_flow(), executor, FixedCountRegistry::with_count(0));
        let mut ctx = context();

        let progress = h.controller.start(&mut ctx).await?;

        let FlowProgress::Complete(report) = progress else {
            anyhow::bail!("expected completion, got {progress:?}");
        };
        assert_eq!(report.executed, ids(&["1"]));
        assert!(!report.is_authenticated());
        assert_eq!(h.registry.calls(), 0);
        assert!(h.sink.messages.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_limit_fails_the_attempt() -> Result<()> {
        let gate = SessionLimitGate {
            attributes: BTreeMap::new(),
            proceed: StepId::from("2"),
            remediation: StepId::from("3"),
        };
        let definition = FlowDefinition::new(vec![StepDescriptor::new("1")
            .on(Outcome::Success, Continuation::SessionLimitGate(gate))])?;
        let h = harness(
            definition,
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(0),
        );
        let mut ctx = context();

        let result = h.controller.start(&mut ctx).await;

        assert!(matches!(
            result,
            Err(FlowError::Policy {
                source: PolicyError::InvalidConfiguration(_),
                ..
            })
        ));
        assert_eq!(ctx.executed_steps(), ids(&["1"]).as_slice());
        assert_eq!(ctx.flow_state(), &FlowState::Failed);
        assert_eq!(h.registry.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn registry_outage_fails_the_attempt() -> Result<()> {
        let h = harness(
            observed_flow(),
            ScriptedExecutor::default(),
            FixedCountRegistry::unavailable(),
        );
        let mut ctx = context();

        let result = h.controller.start(&mut ctx).await;

        assert!(matches!(
            result,
            Err(FlowError::Policy {
                source: PolicyError::RegistryUnavailable(_),
                ..
            })
        ));
        assert_eq!(ctx.executed_steps(), ids(&["1"]).as_slice());
        assert_eq!(ctx.flow_state(), &FlowState::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn suspended_step_resumes_into_gate() -> Result<()> {
        let executor = ScriptedExecutor::default().with("1", Ok(StepStatus::Suspended));
        let h = harness(observed_flow(), executor, FixedCountRegistry::with_count(3));
        let mut ctx = context();

        let progress = h.controller.start(&mut ctx).await?;
        assert_eq!(
            progress,
            FlowProgress::Suspended {
                step: StepId::from("1")
            }
        );
        assert_eq!(h.registry.calls(), 0);

        let progress = h.controller.resume(&mut ctx, Outcome::Success).await?;
        let FlowProgress::Complete(report) = progress else {
            anyhow::bail!("expected completion, got {progress:?}");
        };
        assert_eq!(report.executed, ids(&["1", "3", "2"]));
        assert_eq!(h.registry.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn remediation_suspension_keeps_proceed_pending() -> Result<()> {
        let executor = ScriptedExecutor::default().with("3", Ok(StepStatus::Suspended));
        let h = harness(observed_flow(), executor, FixedCountRegistry::with_count(2));
        let mut ctx = context();

        let progress = h.controller.start(&mut ctx).await?;
        assert_eq!(
            progress,
            FlowProgress::Suspended {
                step: StepId::from("3")
            }
        );

        h.controller.resume(&mut ctx, Outcome::Success).await?;
        assert_eq!(ctx.executed_steps(), ids(&["1", "3", "2"]).as_slice());
        // No re-check after remediation.
        assert_eq!(h.registry.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn resume_requires_suspension() -> Result<()> {
        let h = harness(
            observed_flow(),
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(0),
        );
        let mut ctx = context();

        let result = h.controller.resume(&mut ctx, Outcome::Success).await;
        assert_eq!(result, Err(FlowError::NotSuspended));

        h.controller.start(&mut ctx).await?;
        let result = h.controller.start(&mut ctx).await;
        assert_eq!(result, Err(FlowError::AlreadyStarted));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_outcome_falls_through_to_next_declared() -> Result<()> {
        let definition = FlowDefinition::new(vec![
            StepDescriptor::new("1").on(
                Outcome::Success,
                Continuation::Execute {
                    steps: ids(&["9"]),
                },
            ),
            StepDescriptor::new("4"),
        ])?;
        let executor = ScriptedExecutor::default()
            .with("1", Ok(StepStatus::Completed(Outcome::from("fallback"))));
        let h = harness(definition, executor, FixedCountRegistry::with_count(0));
        let mut ctx = context();

        h.controller.start(&mut ctx).await?;
        assert_eq!(ctx.executed_steps(), ids(&["1", "4"]).as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn continuation_steps_run_before_pending_steps() -> Result<()> {
        let definition = FlowDefinition::new(vec![
            StepDescriptor::new("1").on(
                Outcome::Success,
                Continuation::Execute {
                    steps: ids(&["5", "6"]),
                },
            ),
            StepDescriptor::new("5").on(
                Outcome::Success,
                Continuation::Execute {
                    steps: ids(&["7"]),
                },
            ),
        ])?;
        let h = harness(
            definition,
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(0),
        );
        let mut ctx = context();

        h.controller.start(&mut ctx).await?;
        assert_eq!(ctx.executed_steps(), ids(&["1", "5", "7", "6"]).as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn fail_continuation_is_surfaced() -> Result<()> {
        let definition = FlowDefinition::new(vec![StepDescriptor::new("1").on(
            Outcome::Failure,
            Continuation::Fail {
                reason: Some("too many attempts".to_string()),
            },
        )])?;
        let executor = ScriptedExecutor::default()
            .with("1", Ok(StepStatus::Completed(Outcome::Failure)));
        let h = harness(definition, executor, FixedCountRegistry::with_count(0));
        let mut ctx = context();

        let result = h.controller.start(&mut ctx).await;
        assert_eq!(
            result,
            Err(FlowError::Routed {
                step: StepId::from("1"),
                reason: "too many attempts".to_string()
            })
        );
        assert_eq!(ctx.flow_state(), &FlowState::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn executor_error_is_surfaced() -> Result<()> {
        let executor = ScriptedExecutor::default().with(
            "2",
            Err(StepError::Execution("authenticator offline".to_string())),
        );
        let h = harness(observed_flow(), executor, FixedCountRegistry::with_count(0));
        let mut ctx = context();

        let result = h.controller.start(&mut ctx).await;
        assert!(matches!(result, Err(FlowError::Step { step, .. }) if step == StepId::from("2")));
        assert_eq!(ctx.flow_state(), &FlowState::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn gate_runs_once_per_attempt() -> Result<()> {
        let definition = FlowDefinition::new(vec![
            StepDescriptor::new("1").on(
                Outcome::Success,
                Continuation::SessionLimitGate(SessionLimitGate::new(
                    SessionLimitPolicy::new(SessionLimit::new(2)?),
                    StepId::from("4"),
                    StepId::from("3"),
                )),
            ),
            StepDescriptor::new("4").on(
                Outcome::Success,
                Continuation::Execute {
                    steps: ids(&["1"]),
                },
            ),
        ])?;
        let h = harness(
            definition,
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(0),
        );
        let mut ctx = context();

        let result = h.controller.start(&mut ctx).await;
        assert_eq!(
            result,
            Err(FlowError::PolicyAlreadyEvaluated {
                step: StepId::from("1")
            })
        );
        assert_eq!(h.registry.calls(), 1);
        Ok(())
    }

    fn declared_flow() -> FlowDefinition {
        FlowDefinition::from_json(
            r#"{
                "steps": [
                    {
                        "id": "1",
                        "on": {
                            "success": {
                                "action": "session_limit_gate",
                                "attributes": { "sessionLimit": "2" },
                                "proceed": "2",
                                "remediation": "3"
                            }
                        }
                    },
                    { "id": "2" },
                    { "id": "3" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn declared_remediation_runs_once_when_over_limit() -> Result<()> {
        let h = harness(
            declared_flow(),
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(2),
        );
        let mut ctx = context();

        let progress = h.controller.start(&mut ctx).await?;

        let FlowProgress::Complete(report) = progress else {
            anyhow::bail!("expected completion, got {progress:?}");
        };
        assert_eq!(report.executed, ids(&["1", "3", "2"]));
        assert!(report.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn declared_remediation_is_skipped_within_limit() -> Result<()> {
        let h = harness(
            declared_flow(),
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(1),
        );
        let mut ctx = context();

        h.controller.start(&mut ctx).await?;
        assert_eq!(ctx.executed_steps(), ids(&["1", "2"]).as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn resumed_proceed_step_does_not_fall_through() -> Result<()> {
        let executor = ScriptedExecutor::default().with("2", Ok(StepStatus::Suspended));
        let h = harness(declared_flow(), executor, FixedCountRegistry::with_count(0));
        let mut ctx = context();

        let progress = h.controller.start(&mut ctx).await?;
        assert_eq!(
            progress,
            FlowProgress::Suspended {
                step: StepId::from("2")
            }
        );

        h.controller.resume(&mut ctx, Outcome::Success).await?;
        assert_eq!(ctx.executed_steps(), ids(&["1", "2"]).as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn looping_flow_stops_at_step_limit() -> Result<()> {
        let definition = FlowDefinition::from_json(
            r#"{ "steps": [ { "id": "1", "on": { "success": { "action": "execute", "steps": ["1"] } } } ] }"#,
        )?;
        let h = harness(
            definition,
            ScriptedExecutor::default(),
            FixedCountRegistry::with_count(0),
        );
        let mut ctx = context();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            h.controller.start(&mut ctx),
        )
        .await?;

        assert_eq!(
            result,
            Err(FlowError::StepLimitExceeded {
                step: StepId::from("1"),
                limit: MAX_STEPS_PER_ATTEMPT
            })
        );
        assert_eq!(ctx.executed_steps().len(), MAX_STEPS_PER_ATTEMPT);
        assert_eq!(ctx.flow_state(), &FlowState::Failed);
        Ok(())
    }
}
