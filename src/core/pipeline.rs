//! Pipeline documents

use crate::core::context::PipelineContext;
use crate::core::graph::GraphPipeline;
use crate::core::step::StepConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::execution::{GraphExecutor, PipelineExecutor, SequenceExecutor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Random 8-character pipeline id
pub(crate) fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// A pipeline definition, either a linear sequence or a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "lowercase")]
pub enum Pipeline {
    Sequence(SequencePipeline),
    Graph(GraphPipeline),
}

impl Pipeline {
    /// Load from a file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> PipelineResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::Configuration(format!("invalid pipeline document: {}", e)))
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::Configuration(format!("invalid pipeline document: {}", e)))
    }

    pub fn to_yaml(&self) -> PipelineResult<String> {
        serde_yaml::to_string(self).map_err(|e| PipelineError::Configuration(e.to_string()))
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Configuration(e.to_string()))
    }

    pub fn id(&self) -> &str {
        match self {
            Pipeline::Sequence(p) => p.id(),
            Pipeline::Graph(p) => p.id(),
        }
    }

    /// Every step config in the pipeline
    pub fn step_configs(&self) -> Vec<&StepConfig> {
        match self {
            Pipeline::Sequence(p) => p.steps().iter().collect(),
            Pipeline::Graph(p) => p
                .steps()
                .values()
                .filter_map(|node| match node {
                    crate::core::graph::GraphStep::Step { step, .. } => Some(step),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Resolve every step through the context's registry and build an executor
    pub fn executor(&self, ctx: &PipelineContext) -> PipelineResult<PipelineExecutor> {
        Ok(match self {
            Pipeline::Sequence(p) => PipelineExecutor::Sequence(SequenceExecutor::new(p, ctx)?),
            Pipeline::Graph(p) => PipelineExecutor::Graph(GraphExecutor::new(p, ctx)?),
        })
    }
}

impl From<SequencePipeline> for Pipeline {
    fn from(p: SequencePipeline) -> Self {
        Pipeline::Sequence(p)
    }
}

impl From<GraphPipeline> for Pipeline {
    fn from(p: GraphPipeline) -> Self {
        Pipeline::Graph(p)
    }
}

/// Steps run one after another, each consuming the previous step's output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSequencePipeline")]
pub struct SequencePipeline {
    steps: Vec<StepConfig>,
    id: String,
}

#[derive(Deserialize)]
struct RawSequencePipeline {
    steps: Vec<StepConfig>,
    #[serde(default)]
    id: Option<String>,
}

impl TryFrom<RawSequencePipeline> for SequencePipeline {
    type Error = PipelineError;

    fn try_from(raw: RawSequencePipeline) -> Result<Self, Self::Error> {
        SequencePipeline::with_id(raw.steps, raw.id.unwrap_or_else(generate_id))
    }
}

impl PartialEq for SequencePipeline {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl SequencePipeline {
    pub fn new(steps: Vec<StepConfig>) -> PipelineResult<Self> {
        Self::with_id(steps, generate_id())
    }

    pub fn with_id(steps: Vec<StepConfig>, id: impl Into<String>) -> PipelineResult<Self> {
        if steps.is_empty() {
            return Err(PipelineError::Configuration(
                "sequence pipeline has no steps".to_string(),
            ));
        }
        Ok(Self {
            steps,
            id: id.into(),
        })
    }

    pub fn builder() -> SequenceBuilder {
        SequenceBuilder::default()
    }

    pub fn steps(&self) -> &[StepConfig] {
        &self.steps
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Builder for `SequencePipeline`
#[derive(Debug, Default)]
pub struct SequenceBuilder {
    steps: Vec<StepConfig>,
    id: Option<String>,
}

impl SequenceBuilder {
    pub fn add(mut self, step: StepConfig) -> Self {
        self.steps.push(step);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn build(self) -> PipelineResult<SequencePipeline> {
        SequencePipeline::with_id(self.steps, self.id.unwrap_or_else(generate_id))
    }
}
