// orderflow/src/workflow/control.rs

//! Signals a step handler returns, and the outcome of a whole run.

/// Returned by a handler to say whether the run goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Keep going: remaining handlers of this step, then the next step.
  Continue,
  /// Stop here. Nothing after this handler runs; the run reports `Halted`.
  Halt,
}

/// How a run ended when no handler returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
  Completed,
  Halted,
}
