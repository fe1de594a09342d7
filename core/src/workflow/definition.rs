// orderflow/src/workflow/definition.rs

//! The `Workflow<TData, Err>` struct and its structural editing methods.

use crate::error::EngineError;
use crate::workflow::context_data::ContextData;
use crate::workflow::control::StepControl;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed async step handler. Receives its own clone of the run's context.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>> + Send + Sync,
>;

/// One named step. An optional step without handlers is skipped; a required
/// one fails the run with `EngineError::HandlerMissing`.
#[derive(Debug, Clone)]
pub struct StepDef {
  pub name: String,
  pub optional: bool,
}

/// An ordered list of named steps, each with `before`, `on` and `after`
/// handler lists, executed against a shared `ContextData<TData>`.
///
/// `Err` is what handlers return; it must absorb engine-level failures.
pub struct Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<EngineError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef>,
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<EngineError> + Send + Sync + 'static,
{
  /// Creates a workflow from `(step_name, optional)` pairs, in run order.
  pub fn new(name: impl Into<String>, step_defs: &[(&str, bool)]) -> Self {
    Self {
      name: name.into(),
      steps: step_defs
        .iter()
        .map(|(name, optional)| StepDef {
          name: (*name).to_string(),
          optional: *optional,
        })
        .collect(),
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  fn position(&self, step_name: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == step_name)
  }

  /// Panics on an unknown step. A typo in a step name is a wiring bug, not a
  /// runtime condition.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) -> usize {
    match self.position(step_name) {
      Some(idx) => idx,
      None => panic!(
        "workflow '{}' setup error: step '{}' is not defined",
        self.name, step_name
      ),
    }
  }

  fn ensure_step_not_exists(&self, step_name: &str) {
    if self.position(step_name).is_some() {
      panic!(
        "workflow '{}' setup error: step '{}' is already defined",
        self.name, step_name
      );
    }
  }

  pub fn insert_before(&mut self, existing_step: &str, new_step: impl Into<String>, optional: bool) {
    let idx = self.ensure_step_exists(existing_step);
    let name = new_step.into();
    self.ensure_step_not_exists(&name);
    self.steps.insert(idx, StepDef { name, optional });
  }

  pub fn insert_after(&mut self, existing_step: &str, new_step: impl Into<String>, optional: bool) {
    let idx = self.ensure_step_exists(existing_step);
    let name = new_step.into();
    self.ensure_step_not_exists(&name);
    self.steps.insert(idx + 1, StepDef { name, optional });
  }

  /// Removes a step and all its handlers. Unknown names are ignored.
  pub fn remove_step(&mut self, step_name: &str) {
    if let Some(idx) = self.position(step_name) {
      self.steps.remove(idx);
      self.before.remove(step_name);
      self.on.remove(step_name);
      self.after.remove(step_name);
    }
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) {
    let idx = self.ensure_step_exists(step_name);
    self.steps[idx].optional = optional;
  }
}
