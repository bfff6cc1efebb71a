//! CLI output formatting

use crate::core::{GraphStep, Pipeline};
use crate::data::{Data, Value};
use crate::profiler::{Phase, TraceEvent};
use console::Emoji;
use std::collections::HashMap;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// One line per key: name, type and a short preview
pub fn format_data(data: &Data) -> String {
    let mut lines = Vec::new();
    for (key, value) in data.iter() {
        lines.push(format!(
            "  {} {} {}",
            style(key).bold(),
            style(value.value_type()).cyan(),
            style(preview(value)).dim()
        ));
    }
    if let Some(metadata) = data.metadata() {
        lines.push(format!("  {} ({} keys)", style("metadata").yellow(), metadata.len()));
    }
    if lines.is_empty() {
        lines.push(format!("  {}", style("(empty)").dim()));
    }
    lines.join("\n")
}

fn preview(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > 40 => {
            format!("{:?}...", s.chars().take(40).collect::<String>())
        }
        Value::String(s) => format!("{:?}", s),
        Value::Int64(i) => i.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Bytes(b) => format!("{} bytes", b.len()),
        Value::NDArray(a) => format!("{} {:?}", a.element_type(), a.shape()),
        Value::Image(i) => format!("{:?} {}x{}", i.format, i.width, i.height),
        Value::Point(p) => format!("({}, {})", p.x, p.y),
        Value::BoundingBox(b) => format!("({}, {}) - ({}, {})", b.x1, b.y1, b.x2, b.y2),
        Value::List(l) => format!("{} items of {}", l.len(), l.element_type()),
        Value::Data(d) => format!("{} keys", d.len()),
    }
}

/// Outline of a pipeline's steps or nodes
pub fn format_pipeline(pipeline: &Pipeline) -> String {
    let mut lines = Vec::new();
    match pipeline {
        Pipeline::Sequence(seq) => {
            lines.push(format!(
                "  Type: {}  Id: {}",
                style("sequence").cyan(),
                style(seq.id()).dim()
            ));
            for (i, step) in seq.steps().iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, style(&step.step_type).bold()));
            }
        }
        Pipeline::Graph(graph) => {
            lines.push(format!(
                "  Type: {}  Id: {}  Output: {}",
                style("graph").cyan(),
                style(graph.id()).dim(),
                style(graph.output()).bold()
            ));
            for (name, node) in graph.steps() {
                let detail = match node {
                    GraphStep::Step { step, .. } => format!(" [{}]", step.step_type),
                    GraphStep::SwitchOutput { output, .. } => format!(" [#{}]", output),
                    _ => String::new(),
                };
                let inputs = node.inputs();
                let from = if inputs.is_empty() {
                    String::new()
                } else {
                    format!(" <- {}", inputs.join(", "))
                };
                lines.push(format!(
                    "  {} {}{}{}",
                    style(name).bold(),
                    style(node.kind()).cyan(),
                    detail,
                    style(from).dim()
                ));
            }
        }
    }
    lines.join("\n")
}

/// Aggregated begin/end pairs for one event name
#[derive(Debug, Clone, PartialEq)]
pub struct SpanSummary {
    pub name: String,
    pub count: usize,
    pub total: Duration,
    /// Begin events without a matching end
    pub unclosed: usize,
}

/// Pair begin and end events per thread and aggregate by name, longest
/// total first
pub fn summarize_trace(events: &[TraceEvent]) -> Vec<SpanSummary> {
    let mut open: HashMap<(u64, &str), Vec<i64>> = HashMap::new();
    let mut spans: HashMap<&str, SpanSummary> = HashMap::new();

    for event in events {
        let key = (event.tid, event.name.as_str());
        match event.ph {
            Phase::Begin => open.entry(key).or_default().push(event.ts),
            Phase::End => {
                if let Some(start) = open.get_mut(&key).and_then(Vec::pop) {
                    let span = spans.entry(event.name.as_str()).or_insert_with(|| SpanSummary {
                        name: event.name.clone(),
                        count: 0,
                        total: Duration::ZERO,
                        unclosed: 0,
                    });
                    span.count += 1;
                    span.total += Duration::from_micros((event.ts - start).max(0) as u64);
                }
            }
        }
    }

    for ((_, name), starts) in open {
        if !starts.is_empty() {
            let span = spans.entry(name).or_insert_with(|| SpanSummary {
                name: name.to_string(),
                count: 0,
                total: Duration::ZERO,
                unclosed: 0,
            });
            span.unclosed += starts.len();
        }
    }

    let mut result: Vec<SpanSummary> = spans.into_values().collect();
    result.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    result
}

pub fn format_span(span: &SpanSummary) -> String {
    let mut line = format!(
        "  {} {} x{} (avg {})",
        style(&span.name).bold(),
        style(format_duration(span.total)).cyan(),
        span.count,
        format_duration(if span.count > 0 {
            span.total / span.count as u32
        } else {
            Duration::ZERO
        })
    );
    if span.unclosed > 0 {
        line.push_str(&format!(" {}", style(format!("{} unclosed", span.unclosed)).yellow()));
    }
    line
}

pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1_000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.2}ms", micros as f64 / 1_000.0)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
