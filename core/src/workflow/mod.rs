// orderflow/src/workflow/mod.rs

//! A small async step engine. Order mutations and dispute filing each run as
//! a `Workflow` whose named steps (load, authorize, commit, publish...) the
//! embedding application can extend with extra handlers.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod execution;
pub mod hooks;

pub use context_data::ContextData;
pub use control::{StepControl, WorkflowOutcome};
pub use definition::{Handler, StepDef, Workflow};
