//! Graph pipeline model and builder

use crate::core::pipeline::generate_id;
use crate::core::step::StepConfig;
use crate::core::switch::SwitchFnConfig;
use crate::core::topology::Topology;
use crate::error::{PipelineError, PipelineResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One node of a graph pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "snake_case")]
pub enum GraphStep {
    /// Receives the external input
    Input,

    /// Runs a step on the output of `input`
    Step { input: String, step: StepConfig },

    /// Routes the output of `input` to exactly one of its branches
    Switch {
        input: String,
        switch_fn: SwitchFnConfig,
    },

    /// Branch `output` of the switch node `switch`
    SwitchOutput { switch: String, output: usize },

    /// Forwards the first produced input, in declaration order
    Any { inputs: Vec<String> },

    /// Combines every input, later inputs overwriting earlier keys
    Merge { inputs: Vec<String> },
}

impl GraphStep {
    /// Names of the nodes this node consumes
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            GraphStep::Input => Vec::new(),
            GraphStep::Step { input, .. } | GraphStep::Switch { input, .. } => vec![input.as_str()],
            GraphStep::SwitchOutput { switch, .. } => vec![switch.as_str()],
            GraphStep::Any { inputs } | GraphStep::Merge { inputs } => {
                inputs.iter().map(String::as_str).collect()
            }
        }
    }

    /// Short label for listings
    pub fn kind(&self) -> &'static str {
        match self {
            GraphStep::Input => "input",
            GraphStep::Step { .. } => "step",
            GraphStep::Switch { .. } => "switch",
            GraphStep::SwitchOutput { .. } => "switch_output",
            GraphStep::Any { .. } => "any",
            GraphStep::Merge { .. } => "merge",
        }
    }
}

/// A DAG of named nodes with one output node
///
/// Construction validates the topology, so every `GraphPipeline` is acyclic,
/// has no dangling references and has an output reachable from an input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawGraphPipeline")]
pub struct GraphPipeline {
    steps: IndexMap<String, GraphStep>,
    output: String,
    id: String,
}

#[derive(Deserialize)]
struct RawGraphPipeline {
    steps: IndexMap<String, GraphStep>,
    output: String,
    #[serde(default)]
    id: Option<String>,
}

impl TryFrom<RawGraphPipeline> for GraphPipeline {
    type Error = PipelineError;

    fn try_from(raw: RawGraphPipeline) -> Result<Self, Self::Error> {
        GraphPipeline::with_id(raw.steps, raw.output, raw.id.unwrap_or_else(generate_id))
    }
}

impl PartialEq for GraphPipeline {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps && self.output == other.output
    }
}

impl GraphPipeline {
    pub fn new(steps: IndexMap<String, GraphStep>, output: impl Into<String>) -> PipelineResult<Self> {
        Self::with_id(steps, output, generate_id())
    }

    pub fn with_id(
        steps: IndexMap<String, GraphStep>,
        output: impl Into<String>,
        id: impl Into<String>,
    ) -> PipelineResult<Self> {
        let pipeline = Self {
            steps,
            output: output.into(),
            id: id.into(),
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn steps(&self) -> &IndexMap<String, GraphStep> {
        &self.steps
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Positions (in `steps()`) of the nodes needed to produce the output,
    /// in an order where every node comes after its inputs
    pub(crate) fn evaluation_order(&self) -> PipelineResult<Vec<usize>> {
        let topology = Topology::new(&self.steps)?;
        let order = topology
            .order()
            .map_err(|cycle| self.cycle_error(&cycle))?;
        let output = self.output_index()?;
        let needed = topology.ancestors(output);
        Ok(order.into_iter().filter(|&i| needed[i]).collect())
    }

    fn output_index(&self) -> PipelineResult<usize> {
        self.steps.get_index_of(&self.output).ok_or_else(|| {
            PipelineError::Configuration(format!("output node '{}' is not defined", self.output))
        })
    }

    fn cycle_error(&self, nodes: &[usize]) -> PipelineError {
        PipelineError::Cycle {
            nodes: nodes
                .iter()
                .filter_map(|&i| self.steps.get_index(i).map(|(name, _)| name.clone()))
                .collect(),
        }
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.steps.is_empty() {
            return Err(PipelineError::Configuration(
                "graph pipeline has no steps".to_string(),
            ));
        }

        // Resolves every reference
        let topology = Topology::new(&self.steps)?;
        let output = self.output_index()?;

        if let Some((name, GraphStep::Switch { .. })) = self.steps.get_index(output) {
            return Err(PipelineError::Configuration(format!(
                "output node '{}' is a switch; use one of its switch_output nodes",
                name
            )));
        }

        for (name, step) in &self.steps {
            // Only switch_output nodes may consume a switch
            if !matches!(step, GraphStep::SwitchOutput { .. }) {
                let switch = step
                    .inputs()
                    .into_iter()
                    .find(|input| matches!(self.steps.get(*input), Some(GraphStep::Switch { .. })));
                if let Some(switch) = switch {
                    return Err(PipelineError::Configuration(format!(
                        "node '{}' reads switch '{}' directly; use one of its switch_output nodes",
                        name, switch
                    )));
                }
            }

            match step {
                GraphStep::Switch { switch_fn, .. } => switch_fn.validate().map_err(|e| {
                    PipelineError::Configuration(format!("switch '{}': {}", name, e))
                })?,
                GraphStep::SwitchOutput { switch, output } => match self.steps.get(switch) {
                    Some(GraphStep::Switch { switch_fn, .. }) => {
                        if *output >= switch_fn.num_outputs() {
                            return Err(PipelineError::Configuration(format!(
                                "node '{}' selects output {} of switch '{}', which has {} outputs",
                                name,
                                output,
                                switch,
                                switch_fn.num_outputs()
                            )));
                        }
                    }
                    _ => {
                        return Err(PipelineError::Configuration(format!(
                            "node '{}' references '{}', which is not a switch",
                            name, switch
                        )))
                    }
                },
                GraphStep::Any { inputs } | GraphStep::Merge { inputs } if inputs.is_empty() => {
                    return Err(PipelineError::Configuration(format!(
                        "{} node '{}' has no inputs",
                        step.kind(),
                        name
                    )));
                }
                _ => {}
            }
        }

        if !self.steps.values().any(|s| matches!(s, GraphStep::Input)) {
            return Err(PipelineError::Configuration(
                "graph pipeline has no input node".to_string(),
            ));
        }

        topology.order().map_err(|cycle| self.cycle_error(&cycle))?;

        let needed = topology.ancestors(output);
        let reachable = self
            .steps
            .values()
            .enumerate()
            .any(|(i, s)| needed[i] && matches!(s, GraphStep::Input));
        if !reachable {
            return Err(PipelineError::Configuration(format!(
                "output node '{}' is not reachable from any input node",
                self.output
            )));
        }

        Ok(())
    }
}

/// Name given to branch `index` of switch `switch` by `GraphBuilder::switch`
pub fn switch_output_name(switch: &str, index: usize) -> String {
    format!("{}_{}", switch, index)
}

/// Fluent construction of graph pipelines
#[derive(Debug, Default)]
pub struct GraphBuilder {
    steps: IndexMap<String, GraphStep>,
    id: Option<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn input(self, name: impl Into<String>) -> Self {
        self.node(name, GraphStep::Input)
    }

    pub fn step(self, name: impl Into<String>, input: impl Into<String>, step: StepConfig) -> Self {
        self.node(
            name,
            GraphStep::Step {
                input: input.into(),
                step,
            },
        )
    }

    /// Add a switch plus one `switch_output` node per branch, named by
    /// `switch_output_name`
    pub fn switch(self, name: impl Into<String>, input: impl Into<String>, switch_fn: SwitchFnConfig) -> Self {
        let name = name.into();
        // An invalid switch gets no outputs here; `build` reports it
        let outputs = if switch_fn.validate().is_ok() {
            switch_fn.num_outputs()
        } else {
            0
        };
        let mut builder = self.node(
            name.clone(),
            GraphStep::Switch {
                input: input.into(),
                switch_fn,
            },
        );
        for index in 0..outputs {
            builder = builder.node(
                switch_output_name(&name, index),
                GraphStep::SwitchOutput {
                    switch: name.clone(),
                    output: index,
                },
            );
        }
        builder
    }

    pub fn any<I, S>(self, name: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node(
            name,
            GraphStep::Any {
                inputs: inputs.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn merge<I, S>(self, name: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node(
            name,
            GraphStep::Merge {
                inputs: inputs.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Add any node; a node with an existing name replaces it
    pub fn node(mut self, name: impl Into<String>, step: GraphStep) -> Self {
        self.steps.insert(name.into(), step);
        self
    }

    /// Validate and finish with `output` as the output node
    pub fn build(self, output: impl Into<String>) -> PipelineResult<GraphPipeline> {
        GraphPipeline::with_id(self.steps, output, self.id.unwrap_or_else(generate_id))
    }
}
