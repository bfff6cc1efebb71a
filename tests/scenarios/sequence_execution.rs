//! Test: Sequence execution - composition, failures and close

use crate::helpers::*;
use serving_pipeline::core::SequencePipeline;
use serving_pipeline::{Data, ErrorKind, ExecutorState, Pipeline, PipelineError};
use std::sync::Arc;

/// `count = 5` through the count step yields `count == 6` and nothing else changes
#[test]
fn test_count_step_increments() {
    let stats = Arc::new(CountStats::default());
    let ctx = test_context(stats.clone());
    let pipeline: Pipeline = SequencePipeline::new(vec![count_step()]).unwrap().into();
    let executor = pipeline.executor(&ctx).unwrap();

    let mut input = Data::single("count", 5i64);
    input.put("label", "cat").unwrap();
    let out = executor.exec(&input).unwrap();

    assert_eq!(out.get_i64("count").unwrap(), 6);
    assert_eq!(out.get_string("label").unwrap(), "cat");
    assert_eq!(out.len(), 2);
    // The input is not modified
    assert_eq!(input.get_i64("count").unwrap(), 5);
    assert_eq!(stats.executed(), 1);
}

/// Steps run in declaration order, each seeing the previous output
#[test]
fn test_steps_compose_in_order() {
    let ctx = test_context(Arc::new(CountStats::default()));
    let yaml = r#"
"@type": sequence
steps:
  - "@type": count
  - "@type": set
    values:
      stage: counted
  - "@type": count
  - "@type": logging
    level: debug
    log: keys_and_values
"#;
    let pipeline = Pipeline::from_yaml(yaml).unwrap();
    let executor = pipeline.executor(&ctx).unwrap();

    let out = executor.exec(&Data::new()).unwrap();
    assert_eq!(out.get_i64("count").unwrap(), 2);
    assert_eq!(out.get_string("stage").unwrap(), "counted");
}

/// A failing step aborts the run; later steps never run and the error is unchanged
#[test]
fn test_failure_aborts_without_partial_output() {
    let stats = Arc::new(CountStats::default());
    let ctx = test_context(stats.clone());
    let pipeline: Pipeline = SequencePipeline::builder()
        .add(count_step())
        .add(serving_pipeline::StepConfig::new("fail"))
        .add(count_step())
        .build()
        .unwrap()
        .into();
    let executor = pipeline.executor(&ctx).unwrap();

    let err = executor.exec(&Data::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    match err {
        PipelineError::Execution { step, message } => {
            assert_eq!(step, "fail");
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(stats.executed(), 1);

    // The pipeline stays usable
    assert!(executor.exec(&Data::new()).is_err());
    assert_eq!(executor.state(), ExecutorState::Ready);
}

/// Close reaches every runner exactly once even when some fail to close
#[test]
fn test_close_is_exhaustive() {
    let stats = Arc::new(CountStats::default());
    let ctx = test_context(stats.clone());
    let pipeline: Pipeline = SequencePipeline::builder()
        .add(count_step().with("fail_close", true))
        .add(count_step())
        .add(count_step().with("fail_close", true))
        .build()
        .unwrap()
        .into();

    let mut executor = pipeline.executor(&ctx).unwrap();
    assert_eq!(stats.created(), 3);
    executor.close();
    executor.close();
    assert_eq!(stats.closed(), 3);
    assert_eq!(executor.state(), ExecutorState::Closed);

    let err = executor.exec(&Data::new()).unwrap_err();
    assert!(matches!(err, PipelineError::ExecutorClosed));

    drop(executor);
    assert_eq!(stats.closed(), 3);
}

/// Dropping an executor that was never closed still closes its runners
#[test]
fn test_drop_closes_runners() {
    let stats = Arc::new(CountStats::default());
    let ctx = test_context(stats.clone());
    let pipeline: Pipeline = SequencePipeline::new(vec![count_step(), count_step()]).unwrap().into();
    drop(pipeline.executor(&ctx).unwrap());
    assert_eq!(stats.closed(), 2);
}

/// One executor serves concurrent callers
#[test]
fn test_concurrent_exec() {
    let stats = Arc::new(CountStats::default());
    let ctx = test_context(stats.clone());
    let pipeline: Pipeline = SequencePipeline::new(vec![count_step(), count_step()]).unwrap().into();
    let executor = pipeline.executor(&ctx).unwrap();

    std::thread::scope(|scope| {
        for i in 0..4i64 {
            let executor = &executor;
            scope.spawn(move || {
                for _ in 0..10 {
                    let out = executor.exec(&Data::single("count", i)).unwrap();
                    assert_eq!(out.get_i64("count").unwrap(), i + 2);
                }
            });
        }
    });

    assert_eq!(stats.executed(), 80);
}
