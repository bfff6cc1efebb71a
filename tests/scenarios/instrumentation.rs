//! Test: Profiler traces and metrics recorded while pipelines run

use crate::helpers::*;
use serving_pipeline::core::{switch_output_name, EngineConfig, GraphBuilder, SequencePipeline};
use serving_pipeline::metrics::{MetricsBackend, NoopMetrics};
use serving_pipeline::profiler::{read_events, Phase, TraceEvent};
use serving_pipeline::{Data, Pipeline, PipelineContext, Profiler, ProfilerConfig, SwitchFnConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn names(events: &[TraceEvent], phase: Phase) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.ph == phase)
        .map(|e| e.name.clone())
        .collect()
}

/// An event left open is closed by close_all
#[test]
fn test_profiler_close_all() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.json");
    let profiler = Profiler::new(&ProfilerConfig::new(&path)).unwrap();

    profiler.event_start("x");
    profiler.close_all();
    profiler.shutdown();

    let events = read_events(&path).unwrap();
    assert_eq!(names(&events, Phase::Begin), vec!["x"]);
    assert_eq!(names(&events, Phase::End), vec!["x"]);
}

/// A second profiler on the same file keeps one readable trace
#[test]
fn test_profiler_appends_across_sessions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.json");

    for name in ["first", "second"] {
        let profiler = Profiler::new(&ProfilerConfig::new(&path)).unwrap();
        profiler.event_start(name);
        profiler.event_end(name);
        profiler.shutdown();
    }

    let events = read_events(&path).unwrap();
    assert_eq!(names(&events, Phase::Begin), vec!["first", "second"]);
    assert_eq!(names(&events, Phase::End), vec!["first", "second"]);
}

/// Every sequence step is wrapped in begin/end events named after it
#[test]
fn test_sequence_steps_are_traced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.json");
    let profiler = Arc::new(Profiler::new(&ProfilerConfig::new(&path)).unwrap());
    let ctx = test_context_builder(Arc::new(CountStats::default()))
        .profiler(profiler.clone())
        .build();

    let pipeline: Pipeline = SequencePipeline::builder()
        .add(count_step())
        .add(tag_step("done"))
        .build()
        .unwrap()
        .into();
    let executor = pipeline.executor(&ctx).unwrap();
    executor.exec(&Data::new()).unwrap();
    profiler.flush_blocking();

    let events = read_events(&path).unwrap();
    assert_eq!(names(&events, Phase::Begin), vec!["0:count", "1:tag"]);
    assert_eq!(names(&events, Phase::End), vec!["0:count", "1:tag"]);
}

/// Graph steps are traced under their node names; skipped nodes leave no events
#[test]
fn test_graph_steps_are_traced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.json");
    let profiler = Arc::new(Profiler::new(&ProfilerConfig::new(&path)).unwrap());
    let ctx = test_context_builder(Arc::new(CountStats::default()))
        .profiler(profiler.clone())
        .build();

    let pipeline: Pipeline = GraphBuilder::new()
        .input("in")
        .switch("route", "in", SwitchFnConfig::int("branch", 2))
        .step("left", switch_output_name("route", 0), tag_step("left"))
        .step("right", switch_output_name("route", 1), tag_step("right"))
        .any("out", ["left", "right"])
        .build("out")
        .unwrap()
        .into();
    let executor = pipeline.executor(&ctx).unwrap();
    executor.exec(&Data::single("branch", 1i64)).unwrap();
    ctx.shutdown();

    let events = read_events(&path).unwrap();
    assert_eq!(names(&events, Phase::Begin), vec!["right"]);
    assert_eq!(names(&events, Phase::End), vec!["right"]);
}

/// Step counters and executor metrics land in the context's backend under the pipeline id
#[test]
fn test_metrics_recorded_per_pipeline() {
    let ctx = test_context(Arc::new(CountStats::default()));
    let pipeline: Pipeline = SequencePipeline::builder()
        .id("p1")
        .add(count_step())
        .add(count_step())
        .build()
        .unwrap()
        .into();
    let executor = pipeline.executor(&ctx).unwrap();
    executor.exec(&Data::new()).unwrap();
    executor.exec(&Data::new()).unwrap();

    let snapshot = ctx.metrics_backend().snapshot();
    assert_eq!(snapshot.counters["count.calls{pipeline=\"p1\"}"], 4.0);
    assert_eq!(snapshot.counters["pipeline.exec.count{pipeline=\"p1\"}"], 2.0);
    assert_eq!(snapshot.timers["pipeline.exec.time{pipeline=\"p1\"}"].count, 2);
    assert!(snapshot.render_text().contains("counter count.calls{pipeline=\"p1\"} 4"));
}

/// Failed executions are counted separately
#[test]
fn test_failures_counted() {
    let ctx = test_context(Arc::new(CountStats::default()));
    let pipeline: Pipeline = SequencePipeline::builder()
        .id("failing")
        .add(serving_pipeline::StepConfig::new("fail"))
        .build()
        .unwrap()
        .into();
    let executor = pipeline.executor(&ctx).unwrap();
    assert!(executor.exec(&Data::new()).is_err());

    let snapshot = ctx.metrics_backend().snapshot();
    assert_eq!(snapshot.counters["pipeline.exec.failures{pipeline=\"failing\"}"], 1.0);
    assert_eq!(snapshot.counters["pipeline.exec.count{pipeline=\"failing\"}"], 1.0);
}

/// With the noop backend nothing is recorded and steps still run
#[test]
fn test_noop_backend_records_nothing() {
    let stats = Arc::new(CountStats::default());
    let backend: Arc<dyn MetricsBackend> = Arc::new(NoopMetrics);
    let ctx = test_context_builder(stats.clone())
        .metrics_backend(backend)
        .build();
    let pipeline: Pipeline = SequencePipeline::new(vec![count_step()]).unwrap().into();
    pipeline.executor(&ctx).unwrap().exec(&Data::new()).unwrap();

    assert_eq!(stats.executed(), 1);
    assert!(ctx.metrics_backend().snapshot().counters.is_empty());
}

/// An engine config enables the profiler and picks the metrics backend
#[test]
fn test_context_from_engine_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("traces").join("engine.json");
    let yaml = format!(
        "profiler:\n  output_file: {}\nmetrics:\n  backend: noop\n",
        path.display()
    );
    let config = EngineConfig::from_yaml(&yaml).unwrap();
    let ctx = PipelineContext::from_config(&config).unwrap();

    assert_eq!(ctx.metrics_backend().name(), "noop");
    let profiler = ctx.profiler().unwrap();
    profiler.event_start("engine");
    ctx.shutdown();

    let events = read_events(&path).unwrap();
    assert_eq!(names(&events, Phase::Begin), vec!["engine"]);
    assert_eq!(names(&events, Phase::End), vec!["engine"]);
}
