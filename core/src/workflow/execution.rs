// orderflow/src/workflow/execution.rs

//! `Workflow::run()`.

use crate::error::EngineError;
use crate::workflow::context_data::ContextData;
use crate::workflow::control::{StepControl, WorkflowOutcome};
use crate::workflow::definition::{Handler, Workflow};
use tracing::{event, instrument, Instrument, Level};

enum PhaseResult<Err> {
  Continue,
  Halted,
  Failed(Err),
}

impl<TData, Err> Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<EngineError> + Send + Sync + 'static,
{
  async fn run_phase(
    &self,
    phase: &'static str,
    handlers: Option<&Vec<Handler<TData, Err>>>,
    ctx_data: &ContextData<TData>,
  ) -> PhaseResult<Err> {
    let Some(handlers) = handlers else {
      return PhaseResult::Continue;
    };
    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      let span = tracing::debug_span!("handler", phase, handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(span).await {
        Ok(StepControl::Continue) => {}
        Ok(StepControl::Halt) => {
          event!(Level::DEBUG, phase, "Run halted by handler.");
          return PhaseResult::Halted;
        }
        Err(e) => {
          event!(Level::DEBUG, phase, error = %e, "Handler failed.");
          return PhaseResult::Failed(e);
        }
      }
    }
    PhaseResult::Continue
  }

  /// Executes every step in order against `ctx_data`.
  ///
  /// Handler errors are returned as-is; the first one ends the run. Engine
  /// failures (a required step with no handlers) are converted into `Err`.
  #[instrument(
    name = "Workflow::run",
    skip_all,
    fields(workflow = %self.name, num_steps = self.steps.len())
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<WorkflowOutcome, Err> {
    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = tracing::debug_span!("step", step = step_name, step_index = step_idx);

      let outcome = async {
        let before = self.before.get(step_name).filter(|v| !v.is_empty());
        let on = self.on.get(step_name).filter(|v| !v.is_empty());
        let after = self.after.get(step_name).filter(|v| !v.is_empty());

        if before.is_none() && on.is_none() && after.is_none() {
          if step_def.optional {
            event!(Level::TRACE, "Optional step has no handlers, skipping.");
            return PhaseResult::Continue;
          }
          return PhaseResult::Failed(Err::from(EngineError::HandlerMissing {
            workflow: self.name.clone(),
            step_name: step_def.name.clone(),
          }));
        }

        for (phase, handlers) in [("before", before), ("on", on), ("after", after)] {
          match self.run_phase(phase, handlers, &ctx_data).await {
            PhaseResult::Continue => {}
            other => return other,
          }
        }
        PhaseResult::Continue
      }
      .instrument(step_span)
      .await;

      match outcome {
        PhaseResult::Continue => {}
        PhaseResult::Halted => return Ok(WorkflowOutcome::Halted),
        PhaseResult::Failed(e) => return Err(e),
      }
    }

    event!(Level::TRACE, "Workflow completed.");
    Ok(WorkflowOutcome::Completed)
  }
}
