//! Scenario-based tests for serving-pipeline

#[path = "../helpers.rs"]
mod helpers;

mod build_failures;
mod data_files;
mod instrumentation;
mod sequence_execution;
mod switch_routing;
