// tests/workflow_tests.rs
mod common;

use common::*;
use orderflow::{ContextData, StepControl, Workflow, WorkflowOutcome};
use serial_test::serial;

fn three_steps() -> Workflow<TestContext, TestError> {
  Workflow::new("test", &[("step1", false), ("step2", false), ("step3", false)])
}

#[tokio::test]
#[serial]
async fn test_workflow_runs_steps_in_order() {
  setup_tracing();
  let mut flow = three_steps();
  flow.on_boxed("step1", create_simple_handler("step1", " S1"));
  flow.on_boxed("step2", create_simple_handler("step2", " S2"));
  flow.on_boxed("step3", create_simple_handler("step3", " S3"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), WorkflowOutcome::Completed);
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.message, " S1 S2 S3");
  assert_eq!(guard.steps_executed, vec!["step1", "step2", "step3"]);
}

#[tokio::test]
#[serial]
async fn test_workflow_halts_on_step_control_halt() {
  setup_tracing();
  let mut flow = three_steps();
  flow.on_boxed("step1", create_simple_handler("step1", "A"));
  flow.on_boxed("step2", create_simple_handler("step2", "B"));
  flow.on_boxed("step3", create_simple_handler("step3", "C"));

  let ctx = ContextData::new(TestContext {
    halt_at: Some("step2".to_string()),
    ..Default::default()
  });
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), WorkflowOutcome::Halted);
  let guard = ctx.read();
  assert_eq!(guard.message, "AB");
  assert_eq!(guard.steps_executed, vec!["step1", "step2"]);
}

#[tokio::test]
#[serial]
async fn test_workflow_propagates_handler_error() {
  setup_tracing();
  let mut flow = three_steps();
  flow.on_boxed("step1", create_simple_handler("step1", "Good"));
  flow.on_boxed("step2", create_failing_handler("step2", "I am a bad step!"));
  flow.on_boxed("step3", create_simple_handler("step3", "NeverRun"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("I am a bad step!".to_string()));
  let guard = ctx.read();
  assert_eq!(guard.counter, 1);
  assert_eq!(guard.steps_executed, vec!["step1", "step2"]);
}

#[tokio::test]
#[serial]
async fn test_workflow_reports_missing_required_handler() {
  setup_tracing();
  let flow = Workflow::<TestContext, TestError>::new("test", &[("missing", false)]);
  let result = flow.run(ContextData::new(TestContext::default())).await;
  match result.unwrap_err() {
    TestError::Engine(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("Expected TestError::Engine(HandlerMissing), got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_workflow_skips_optional_step_without_handlers() {
  setup_tracing();
  let mut flow = Workflow::<TestContext, TestError>::new("test", &[("step1", false), ("extra", false)]);
  flow.set_optional("extra", true);
  flow.on_boxed("step1", create_simple_handler("step1", "X"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), WorkflowOutcome::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["step1"]);
}

#[tokio::test]
#[serial]
async fn test_before_on_after_phases_run_in_order() {
  setup_tracing();
  let mut flow = Workflow::<TestContext, TestError>::new("test", &[("only", false)]);
  flow.after("only", |ctx: ContextData<TestContext>| async move {
    ctx.write().message.push_str("after ");
    Ok::<_, TestError>(StepControl::Continue)
  });
  flow.on("only", |ctx: ContextData<TestContext>| async move {
    ctx.write().message.push_str("on ");
    Ok::<_, TestError>(StepControl::Continue)
  });
  flow.before("only", |ctx: ContextData<TestContext>| async move {
    ctx.write().message.push_str("before ");
    Ok::<_, TestError>(StepControl::Continue)
  });

  let ctx = ContextData::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().message, "before on after ");
}

#[tokio::test]
#[serial]
async fn test_step_editing_changes_run_order() {
  setup_tracing();
  let mut flow = three_steps();
  flow.insert_before("step1", "step0", false);
  flow.insert_after("step3", "step4", true);
  flow.remove_step("step2");
  assert_eq!(flow.step_names(), vec!["step0", "step1", "step3", "step4"]);

  flow.on_boxed("step0", create_simple_handler("step0", "0"));
  flow.on_boxed("step1", create_simple_handler("step1", "1"));
  flow.on_boxed("step3", create_simple_handler("step3", "3"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), WorkflowOutcome::Completed);
  assert_eq!(ctx.read().message, "013");
}

#[test]
#[should_panic(expected = "is not defined")]
fn test_registering_on_unknown_step_panics() {
  let mut flow = three_steps();
  flow.on_boxed("nope", create_simple_handler("nope", ""));
}
