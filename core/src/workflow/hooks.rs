// orderflow/src/workflow/hooks.rs

//! Handler registration for the three phases of a step.

use crate::error::EngineError;
use crate::workflow::context_data::ContextData;
use crate::workflow::control::StepControl;
use crate::workflow::definition::{Handler, Workflow};
use std::future::Future;

impl<TData, Err> Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<EngineError> + Send + Sync + 'static,
{
  fn wrap<F, UserErr>(handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static) -> Handler<TData, Err>
  where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    Box::new(move |ctx_data| {
      let user_fut = handler_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    })
  }

  /// Registers a handler that runs before the step's `on` handlers.
  /// The handler's error type only needs to convert into the workflow's.
  pub fn before<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    self
      .before
      .entry(step_name.to_string())
      .or_default()
      .push(Self::wrap(handler_fn));
  }

  pub fn on<F, UserErr>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    self.on.entry(step_name.to_string()).or_default().push(Self::wrap(handler_fn));
  }

  pub fn after<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    self
      .after
      .entry(step_name.to_string())
      .or_default()
      .push(Self::wrap(handler_fn));
  }

  /// Registers an already boxed handler for the `on` phase.
  pub fn on_boxed(&mut self, step_name: &str, handler: Handler<TData, Err>) {
    self.ensure_step_exists(step_name);
    self.on.entry(step_name.to_string()).or_default().push(handler);
  }
}
