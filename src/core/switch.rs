//! Switch functions: pick one output branch for a Data

use crate::data::Data;
use crate::error::{PipelineError, PipelineResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Routing decision of a graph switch node
///
/// `select_output` must be deterministic and return an index in
/// `[0, num_outputs())`.
pub trait SwitchFn: Send + Sync {
    fn num_outputs(&self) -> usize;

    fn select_output(&self, data: &Data) -> PipelineResult<usize>;
}

/// Serializable switch function description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "snake_case")]
pub enum SwitchFnConfig {
    /// Branch index read from an INT64 field
    Int {
        field_name: String,
        num_outputs: usize,
    },
    /// Branch index looked up from the value of a STRING field
    String {
        field_name: String,
        map: IndexMap<String, usize>,
        /// Defaults to one more than the largest mapped index
        #[serde(default, skip_serializing_if = "Option::is_none")]
        num_outputs: Option<usize>,
    },
}

impl SwitchFnConfig {
    pub fn int(field_name: impl Into<String>, num_outputs: usize) -> Self {
        SwitchFnConfig::Int {
            field_name: field_name.into(),
            num_outputs,
        }
    }

    pub fn string<K: Into<String>>(
        field_name: impl Into<String>,
        map: impl IntoIterator<Item = (K, usize)>,
    ) -> Self {
        SwitchFnConfig::String {
            field_name: field_name.into(),
            map: map.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            num_outputs: None,
        }
    }

    /// Number of branches; saturates when a mapped index has no successor,
    /// which `validate` rejects
    pub fn num_outputs(&self) -> usize {
        self.checked_num_outputs().unwrap_or(usize::MAX)
    }

    fn checked_num_outputs(&self) -> Option<usize> {
        match self {
            SwitchFnConfig::Int { num_outputs, .. } => Some(*num_outputs),
            SwitchFnConfig::String {
                map, num_outputs, ..
            } => match num_outputs {
                Some(n) => Some(*n),
                None => map.values().max().map_or(Some(0), |max| max.checked_add(1)),
            },
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let n = self.checked_num_outputs().ok_or_else(|| {
            PipelineError::Configuration("switch output index is too large".to_string())
        })?;
        if n == 0 {
            return Err(PipelineError::Configuration(
                "switch function must have at least one output".to_string(),
            ));
        }
        if let SwitchFnConfig::String { map, .. } = self {
            if let Some((key, idx)) = map.iter().find(|(_, idx)| **idx >= n) {
                return Err(PipelineError::Configuration(format!(
                    "switch value '{}' maps to output {} but there are only {} outputs",
                    key, idx, n
                )));
            }
        }
        Ok(())
    }

    /// Validate and instantiate
    pub fn build(&self) -> PipelineResult<Box<dyn SwitchFn>> {
        self.validate()?;
        Ok(match self {
            SwitchFnConfig::Int {
                field_name,
                num_outputs,
            } => Box::new(IntFieldSwitch {
                field_name: field_name.clone(),
                num_outputs: *num_outputs,
            }),
            SwitchFnConfig::String { field_name, map, .. } => Box::new(StringFieldSwitch {
                field_name: field_name.clone(),
                map: map.clone(),
                num_outputs: self.num_outputs(),
            }),
        })
    }
}

/// Reads the branch index from an INT64 field
///
/// The field must exist and hold an in-range INT64; there is no default
/// branch.
#[derive(Debug, Clone)]
pub struct IntFieldSwitch {
    field_name: String,
    num_outputs: usize,
}

impl IntFieldSwitch {
    pub fn new(field_name: impl Into<String>, num_outputs: usize) -> Self {
        Self {
            field_name: field_name.into(),
            num_outputs,
        }
    }
}

impl SwitchFn for IntFieldSwitch {
    fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn select_output(&self, data: &Data) -> PipelineResult<usize> {
        let value = data.get_i64(&self.field_name)?;
        usize::try_from(value)
            .ok()
            .filter(|idx| *idx < self.num_outputs)
            .ok_or_else(|| {
                PipelineError::Validation(format!(
                    "switch field '{}' has value {}, expected 0..{}",
                    self.field_name, value, self.num_outputs
                ))
            })
    }
}

/// Maps the value of a STRING field to a branch index
#[derive(Debug, Clone)]
pub struct StringFieldSwitch {
    field_name: String,
    map: IndexMap<String, usize>,
    num_outputs: usize,
}

impl SwitchFn for StringFieldSwitch {
    fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn select_output(&self, data: &Data) -> PipelineResult<usize> {
        let value = data.get_string(&self.field_name)?;
        self.map.get(value).copied().ok_or_else(|| {
            PipelineError::Validation(format!(
                "switch field '{}' has unmapped value '{}'",
                self.field_name, value
            ))
        })
    }
}
