//! Test: Build-time failures are configuration errors raised before any step runs

use crate::helpers::*;
use serving_pipeline::core::GraphBuilder;
use serving_pipeline::{ErrorKind, Pipeline, PipelineError, StepConfig};
use std::sync::Arc;

/// A cyclic graph is rejected when the document is parsed
#[test]
fn test_cyclic_graph_rejected() {
    let yaml = r#"
"@type": graph
output: b
steps:
  in:
    "@type": input
  a:
    "@type": any
    inputs: [in, b]
  b:
    "@type": step
    input: a
    step:
      "@type": count
"#;
    let err = Pipeline::from_yaml(yaml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("Cycle"), "{err}");

    let built = GraphBuilder::new()
        .input("in")
        .any("a", ["in", "b"])
        .step("b", "a", count_step())
        .build("b");
    match built {
        Err(PipelineError::Cycle { nodes }) => assert_eq!(nodes, vec!["a", "b"]),
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

/// Unregistered step types fail with UnsupportedStep before anything runs
#[test]
fn test_unsupported_step() {
    let stats = Arc::new(CountStats::default());
    let ctx = test_context(stats.clone());
    let yaml = r#"
"@type": sequence
steps:
  - "@type": count
  - "@type": tensorflow
"#;
    let pipeline = Pipeline::from_yaml(yaml).unwrap();
    let err = pipeline.executor(&ctx).err().unwrap();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err, PipelineError::UnsupportedStep { ref step_type } if step_type == "tensorflow"));
    assert_eq!(stats.executed(), 0);
    // The runner that was already created is released
    assert_eq!(stats.created(), 1);
    assert_eq!(stats.closed(), 1);
}

/// Structural problems in graph documents
#[test]
fn test_invalid_graph_documents() {
    let dangling = r#"
"@type": graph
output: a
steps:
  in:
    "@type": input
  a:
    "@type": step
    input: missing
    step:
      "@type": count
"#;
    let err = Pipeline::from_yaml(dangling).unwrap_err();
    assert!(err.to_string().contains("missing"), "{err}");

    let bad_branch = r#"
"@type": graph
output: third
steps:
  in:
    "@type": input
  route:
    "@type": switch
    input: in
    switch_fn:
      "@type": int
      field_name: branch
      num_outputs: 2
  third:
    "@type": switch_output
    switch: route
    output: 2
"#;
    assert!(Pipeline::from_yaml(bad_branch).is_err());

    let no_input = r#"
"@type": graph
output: a
steps:
  a:
    "@type": merge
    inputs: []
"#;
    assert!(Pipeline::from_yaml(no_input).is_err());
}

/// Invalid step parameters surface when runners are created
#[test]
fn test_invalid_step_config() {
    let ctx = test_context(Arc::new(CountStats::default()));
    let pipeline: Pipeline = serving_pipeline::SequencePipeline::new(vec![
        StepConfig::new("logging").with("level", "shout"),
    ])
    .unwrap()
    .into();
    let err = pipeline.executor(&ctx).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

/// Re-registering a step type replaces the earlier factory
#[test]
fn test_registration_last_wins() {
    use serving_pipeline::steps::FnStepFactory;
    use serving_pipeline::Data;

    let stats = Arc::new(CountStats::default());
    let ctx = test_context_builder(stats.clone())
        .register(FnStepFactory::new("count", |_, _, _input: &Data| {
            Ok(Data::single("replaced", true))
        }))
        .build();
    let pipeline: Pipeline = serving_pipeline::SequencePipeline::new(vec![count_step()])
        .unwrap()
        .into();
    let out = pipeline.executor(&ctx).unwrap().exec(&Data::new()).unwrap();
    assert!(out.get_bool("replaced").unwrap());
    assert_eq!(stats.created(), 0);
}
