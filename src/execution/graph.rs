//! Graph executor

use super::{close_runner, ExecMetrics, ExecutorState};
use crate::core::context::{PipelineContext, StepContext};
use crate::core::graph::{GraphPipeline, GraphStep};
use crate::core::runner::StepRunner;
use crate::core::state::{Lifecycle, NodeState};
use crate::core::switch::SwitchFn;
use crate::data::{Data, MergeMode};
use crate::error::{PipelineError, PipelineResult};
use tracing::{debug, info};

/// A graph node bound to its runtime resources; inputs are positions in the
/// evaluation order
enum Node {
    Input,
    Step {
        input: usize,
        runner: Box<dyn StepRunner>,
    },
    Switch {
        input: usize,
        switch_fn: Box<dyn SwitchFn>,
    },
    SwitchOutput {
        switch: usize,
        output: usize,
    },
    Any {
        inputs: Vec<usize>,
    },
    Merge {
        inputs: Vec<usize>,
    },
}

/// Evaluates a graph pipeline in dependency order
///
/// Only the nodes the output depends on are evaluated. Every node ends up
/// produced or skipped; a skipped output node is an error.
pub struct GraphExecutor {
    pipeline_id: String,
    /// (node name, node), in evaluation order; the output node is last
    nodes: Vec<(String, Node)>,
    ctx: StepContext,
    metrics: ExecMetrics,
    lifecycle: Lifecycle,
}

impl GraphExecutor {
    pub fn new(pipeline: &GraphPipeline, ctx: &PipelineContext) -> PipelineResult<Self> {
        let pipeline_id = pipeline.id().to_string();
        let order = pipeline.evaluation_order()?;

        // step map position -> evaluation position
        let mut position = vec![usize::MAX; pipeline.steps().len()];
        for (pos, &idx) in order.iter().enumerate() {
            position[idx] = pos;
        }
        let resolve = |name: &str| -> usize {
            pipeline
                .steps()
                .get_index_of(name)
                .map_or(usize::MAX, |idx| position[idx])
        };

        let mut nodes: Vec<(String, Node)> = Vec::with_capacity(order.len());
        for &idx in &order {
            let Some((name, step)) = pipeline.steps().get_index(idx) else {
                continue;
            };
            let node = match step {
                GraphStep::Input => Ok(Node::Input),
                GraphStep::Step { input, step } => {
                    ctx.registry().create_runner(step).map(|runner| Node::Step {
                        input: resolve(input.as_str()),
                        runner,
                    })
                }
                GraphStep::Switch { input, switch_fn } => {
                    switch_fn.build().map(|switch_fn| Node::Switch {
                        input: resolve(input.as_str()),
                        switch_fn,
                    })
                }
                GraphStep::SwitchOutput { switch, output } => Ok(Node::SwitchOutput {
                    switch: resolve(switch.as_str()),
                    output: *output,
                }),
                GraphStep::Any { inputs } => Ok(Node::Any {
                    inputs: inputs.iter().map(|i| resolve(i.as_str())).collect(),
                }),
                GraphStep::Merge { inputs } => Ok(Node::Merge {
                    inputs: inputs.iter().map(|i| resolve(i.as_str())).collect(),
                }),
            };
            match node {
                Ok(node) => nodes.push((name.clone(), node)),
                Err(e) => {
                    close_nodes(&pipeline_id, &mut nodes);
                    return Err(e);
                }
            }
        }

        info!(
            "Built graph pipeline {} ({} of {} nodes needed for output '{}')",
            pipeline_id,
            nodes.len(),
            pipeline.steps().len(),
            pipeline.output()
        );
        let step_ctx = ctx.step_context(&pipeline_id);
        Ok(Self {
            metrics: ExecMetrics::new(&step_ctx),
            ctx: step_ctx,
            pipeline_id,
            nodes,
            lifecycle: Lifecycle::default(),
        })
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn state(&self) -> ExecutorState {
        self.lifecycle.state()
    }

    pub fn exec(&self, input: &Data) -> PipelineResult<Data> {
        let _running = self.lifecycle.begin()?;
        self.metrics.observe(|| self.evaluate(input))
    }

    fn evaluate(&self, input: &Data) -> PipelineResult<Data> {
        let mut states: Vec<NodeState> = vec![NodeState::Pending; self.nodes.len()];

        for (pos, (name, node)) in self.nodes.iter().enumerate() {
            let state = match node {
                Node::Input => NodeState::Produced(input.clone()),
                Node::Step { input, runner } => match states[*input].data() {
                    Some(data) => NodeState::Produced(
                        self.ctx.profile(name, || runner.exec(&self.ctx, data))?,
                    ),
                    None => NodeState::Skipped,
                },
                Node::Switch { input, switch_fn } => match states[*input].data() {
                    Some(data) => {
                        let branch = switch_fn.select_output(data)?;
                        if branch >= switch_fn.num_outputs() {
                            return Err(PipelineError::Validation(format!(
                                "switch '{}' selected output {} of {}",
                                name,
                                branch,
                                switch_fn.num_outputs()
                            )));
                        }
                        debug!("Switch {} selected output {}", name, branch);
                        NodeState::Switched {
                            branch,
                            data: data.clone(),
                        }
                    }
                    None => NodeState::Skipped,
                },
                Node::SwitchOutput { switch, output } => match &states[*switch] {
                    NodeState::Switched { branch, data } if branch == output => {
                        NodeState::Produced(data.clone())
                    }
                    _ => NodeState::Skipped,
                },
                Node::Any { inputs } => inputs
                    .iter()
                    .find_map(|&i| states[i].data())
                    .map_or(NodeState::Skipped, |data| NodeState::Produced(data.clone())),
                Node::Merge { inputs } => merge_all(inputs, &states)?,
            };
            states[pos] = state;
        }

        let (output, _) = self.nodes.last().ok_or_else(|| {
            PipelineError::Configuration("graph pipeline has no nodes to evaluate".to_string())
        })?;
        states
            .pop()
            .and_then(NodeState::into_data)
            .ok_or_else(|| PipelineError::NoOutputProduced {
                output: output.clone(),
            })
    }

    /// Close every step runner exactly once, logging failures
    pub fn close(&mut self) {
        if !self.lifecycle.close() {
            return;
        }
        close_nodes(&self.pipeline_id, &mut self.nodes);
        debug!("Closed graph pipeline {}", self.pipeline_id);
    }
}

impl Drop for GraphExecutor {
    fn drop(&mut self) {
        self.close();
    }
}

/// All inputs merged in declaration order, later inputs winning; skipped
/// when any input is skipped
fn merge_all(inputs: &[usize], states: &[NodeState]) -> PipelineResult<NodeState> {
    let mut merged: Option<Data> = None;
    for &i in inputs {
        let Some(data) = states[i].data() else {
            return Ok(NodeState::Skipped);
        };
        match merged.as_mut() {
            None => merged = Some(data.clone()),
            Some(acc) => acc.merge(data, MergeMode::Overwrite)?,
        }
    }
    Ok(merged.map_or(NodeState::Skipped, NodeState::Produced))
}

fn close_nodes(pipeline_id: &str, nodes: &mut [(String, Node)]) {
    for (name, node) in nodes.iter_mut() {
        if let Node::Step { runner, .. } = node {
            close_runner(pipeline_id, name, runner.as_mut());
        }
    }
}
