//! Test: Graph switch routing through merge nodes

use crate::helpers::*;
use serving_pipeline::core::{switch_output_name, GraphBuilder};
use serving_pipeline::{Data, ErrorKind, Pipeline, PipelineError, SwitchFnConfig};
use std::sync::Arc;

fn two_way_graph() -> Pipeline {
    GraphBuilder::new()
        .input("in")
        .switch("route", "in", SwitchFnConfig::int("branch", 2))
        .step("a", switch_output_name("route", 0), tag_step("a"))
        .step("b", switch_output_name("route", 1), tag_step("b"))
        .any("out", ["a", "b"])
        .build("out")
        .unwrap()
        .into()
}

/// Branch 0 runs only A, branch 1 runs only B
#[test]
fn test_int_switch_feeding_any() {
    let ctx = test_context(Arc::new(CountStats::default()));
    let executor = two_way_graph().executor(&ctx).unwrap();

    let out = executor.exec(&Data::single("branch", 0i64)).unwrap();
    assert!(out.get_bool("a").unwrap());
    assert!(!out.has("b"));

    let out = executor.exec(&Data::single("branch", 1i64)).unwrap();
    assert!(out.get_bool("b").unwrap());
    assert!(!out.has("a"));
}

/// The switch never defaults: missing, mistyped and out-of-range fields fail
#[test]
fn test_switch_field_errors() {
    let ctx = test_context(Arc::new(CountStats::default()));
    let executor = two_way_graph().executor(&ctx).unwrap();

    for input in [
        Data::new(),
        Data::single("branch", "0"),
        Data::single("branch", 2i64),
        Data::single("branch", -1i64),
    ] {
        let err = executor.exec(&input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "input {input:?}");
    }
}

/// Skipped branches never run their steps
#[test]
fn test_skipped_branch_does_not_execute() {
    let stats = Arc::new(CountStats::default());
    let ctx = test_context(stats.clone());
    let pipeline: Pipeline = GraphBuilder::new()
        .input("in")
        .switch("route", "in", SwitchFnConfig::int("branch", 2))
        .step("counted", switch_output_name("route", 0), count_step())
        .step("tagged", switch_output_name("route", 1), tag_step("tagged"))
        .any("out", ["counted", "tagged"])
        .build("out")
        .unwrap()
        .into();
    let executor = pipeline.executor(&ctx).unwrap();

    executor.exec(&Data::single("branch", 1i64)).unwrap();
    assert_eq!(stats.executed(), 0);
    executor.exec(&Data::single("branch", 0i64)).unwrap();
    assert_eq!(stats.executed(), 1);
}

/// String switch from a YAML document, with a merge of all branches afterwards
#[test]
fn test_string_switch_document() {
    let yaml = r#"
"@type": graph
output: result
steps:
  in:
    "@type": input
  route:
    "@type": switch
    input: in
    switch_fn:
      "@type": string
      field_name: animal
      map:
        cat: 0
        dog: 1
  cats:
    "@type": switch_output
    switch: route
    output: 0
  dogs:
    "@type": switch_output
    switch: route
    output: 1
  meow:
    "@type": step
    input: cats
    step:
      "@type": tag
      tag: meow
  woof:
    "@type": step
    input: dogs
    step:
      "@type": tag
      tag: woof
  sound:
    "@type": any
    inputs: [meow, woof]
  counted:
    "@type": step
    input: in
    step:
      "@type": count
  result:
    "@type": merge
    inputs: [sound, counted]
"#;
    let ctx = test_context(Arc::new(CountStats::default()));
    let pipeline = Pipeline::from_yaml(yaml).unwrap();
    let executor = pipeline.executor(&ctx).unwrap();

    let out = executor.exec(&Data::single("animal", "dog")).unwrap();
    assert!(out.get_bool("woof").unwrap());
    assert!(!out.has("meow"));
    assert_eq!(out.get_i64("count").unwrap(), 1);
    assert_eq!(out.get_string("animal").unwrap(), "dog");

    let err = executor.exec(&Data::single("animal", "fish")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

/// An output that sits on the branch not taken produces no output
#[test]
fn test_output_on_skipped_branch() {
    let ctx = test_context(Arc::new(CountStats::default()));
    let pipeline: Pipeline = GraphBuilder::new()
        .input("in")
        .switch("route", "in", SwitchFnConfig::int("branch", 2))
        .step("a", switch_output_name("route", 0), tag_step("a"))
        .build("a")
        .unwrap()
        .into();
    let executor = pipeline.executor(&ctx).unwrap();

    let err = executor.exec(&Data::single("branch", 1i64)).unwrap_err();
    assert!(matches!(err, PipelineError::NoOutputProduced { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

/// A step cannot read a switch directly; only its switch_output nodes carry data
#[test]
fn test_step_reading_switch_directly_is_rejected() {
    let yaml = r#"
"@type": graph
output: a
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
  a:
    "@type": step
    input: route
    step:
      "@type": tag
      tag: a
"#;
    let err = Pipeline::from_yaml(yaml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("route"), "{err}");

    let built = GraphBuilder::new()
        .input("in")
        .switch("route", "in", SwitchFnConfig::int("branch", 2))
        .step("a", "route", tag_step("a"))
        .build("a");
    assert!(matches!(built, Err(PipelineError::Configuration(_))));
}
