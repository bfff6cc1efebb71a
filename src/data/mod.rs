//! The self-describing data container that flows through pipelines
//!
//! A `Data` instance is an ordered map from string keys to typed values.
//! Once a key has been written its type is fixed: writing a value of a
//! different type, or reading it through the wrong accessor, fails.

pub mod codec;
pub mod error;
pub mod types;
pub mod value;

pub use error::{DataError, DataResult};
pub use types::{BoundingBox, Image, ImageFormat, NDArray, NDArrayType, NDBuffer, Point};
pub use value::{List, Value, ValueType};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// How `Data::merge` treats keys present in both instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Values from the other instance replace existing ones
    Overwrite,
    /// Existing values win; only new keys are copied
    KeepExisting,
}

/// Typed key/value container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Data {
    #[serde(default)]
    values: IndexMap<String, Value>,

    /// Out-of-band metadata, e.g. provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Box<Data>>,

    /// Transient identifier, not serialized and ignored by equality
    #[serde(skip)]
    id: Option<String>,
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.metadata == other.metadata
    }
}

impl Data {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container holding a single entry
    pub fn single(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut data = Self::new();
        data.values.insert(key.into(), value.into());
        data
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Write a value
    ///
    /// Fails with `TypeChange` if the key already holds a value of another type.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> DataResult<()> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.values.get(&key) {
            if existing.value_type() != value.value_type() {
                return Err(DataError::TypeChange {
                    key,
                    existing: existing.value_type(),
                    attempted: value.value_type(),
                });
            }
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Remove a key, returning its value. Removing is the only way to re-type a key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Like `get`, but a missing key is an error
    pub fn value(&self, key: &str) -> DataResult<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| DataError::KeyNotFound(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Declared type of a key
    pub fn value_type(&self, key: &str) -> Option<ValueType> {
        self.values.get(key).map(Value::value_type)
    }

    /// Element type of a list-valued key
    pub fn list_type(&self, key: &str) -> Option<ValueType> {
        match self.values.get(key) {
            Some(Value::List(list)) => Some(list.element_type()),
            _ => None,
        }
    }

    fn typed<'a, T>(
        &'a self,
        key: &str,
        expected: ValueType,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> DataResult<T> {
        let value = self.value(key)?;
        extract(value).ok_or_else(|| DataError::TypeMismatch {
            key: key.to_string(),
            expected,
            actual: value.value_type(),
        })
    }

    pub fn get_bytes(&self, key: &str) -> DataResult<&[u8]> {
        self.typed(key, ValueType::Bytes, |v| match v {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        })
    }

    pub fn get_string(&self, key: &str) -> DataResult<&str> {
        self.typed(key, ValueType::String, |v| match v {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn get_i64(&self, key: &str) -> DataResult<i64> {
        self.typed(key, ValueType::Int64, |v| match v {
            Value::Int64(x) => Some(*x),
            _ => None,
        })
    }

    pub fn get_f64(&self, key: &str) -> DataResult<f64> {
        self.typed(key, ValueType::Double, |v| match v {
            Value::Double(x) => Some(*x),
            _ => None,
        })
    }

    pub fn get_bool(&self, key: &str) -> DataResult<bool> {
        self.typed(key, ValueType::Boolean, |v| match v {
            Value::Boolean(b) => Some(*b),
            _ => None,
        })
    }

    pub fn get_ndarray(&self, key: &str) -> DataResult<&NDArray> {
        self.typed(key, ValueType::NDArray, |v| match v {
            Value::NDArray(a) => Some(a),
            _ => None,
        })
    }

    pub fn get_image(&self, key: &str) -> DataResult<&Image> {
        self.typed(key, ValueType::Image, |v| match v {
            Value::Image(i) => Some(i),
            _ => None,
        })
    }

    pub fn get_point(&self, key: &str) -> DataResult<&Point> {
        self.typed(key, ValueType::Point, |v| match v {
            Value::Point(p) => Some(p),
            _ => None,
        })
    }

    pub fn get_bounding_box(&self, key: &str) -> DataResult<&BoundingBox> {
        self.typed(key, ValueType::BoundingBox, |v| match v {
            Value::BoundingBox(b) => Some(b),
            _ => None,
        })
    }

    pub fn get_list(&self, key: &str) -> DataResult<&List> {
        self.typed(key, ValueType::List, |v| match v {
            Value::List(l) => Some(l),
            _ => None,
        })
    }

    pub fn get_data(&self, key: &str) -> DataResult<&Data> {
        self.typed(key, ValueType::Data, |v| match v {
            Value::Data(d) => Some(d),
            _ => None,
        })
    }

    /// Copy the entries of `other` into this instance
    ///
    /// In `Overwrite` mode a key present in both must keep its type; the merge
    /// is checked up front so a failed merge leaves `self` untouched.
    pub fn merge(&mut self, other: &Data, mode: MergeMode) -> DataResult<()> {
        if mode == MergeMode::Overwrite {
            for (key, value) in &other.values {
                if let Some(existing) = self.values.get(key) {
                    if existing.value_type() != value.value_type() {
                        return Err(DataError::TypeChange {
                            key: key.clone(),
                            existing: existing.value_type(),
                            attempted: value.value_type(),
                        });
                    }
                }
            }
        }

        for (key, value) in &other.values {
            match mode {
                MergeMode::Overwrite => {
                    self.values.insert(key.clone(), value.clone());
                }
                MergeMode::KeepExisting => {
                    if !self.values.contains_key(key) {
                        self.values.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        if let Some(meta) = &other.metadata {
            if mode == MergeMode::Overwrite || self.metadata.is_none() {
                self.metadata = Some(meta.clone());
            }
        }

        Ok(())
    }

    pub fn metadata(&self) -> Option<&Data> {
        self.metadata.as_deref()
    }

    pub fn metadata_mut(&mut self) -> Option<&mut Data> {
        self.metadata.as_deref_mut()
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn set_metadata(&mut self, metadata: Data) {
        self.metadata = Some(Box::new(metadata));
    }

    pub fn take_metadata(&mut self) -> Option<Data> {
        self.metadata.take().map(|m| *m)
    }

    pub fn to_json(&self) -> DataResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> DataResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_yaml(&self) -> DataResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> DataResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Encode to the compact binary form
    pub fn to_bytes(&self) -> DataResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decode from the compact binary form
    pub fn from_bytes(bytes: &[u8]) -> DataResult<Self> {
        codec::decode(bytes)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> DataResult<()> {
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_reader<R: Read>(mut reader: R) -> DataResult<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_bytes(&buf)
    }

    /// Save in binary form
    pub fn save<P: AsRef<Path>>(&self, path: P) -> DataResult<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file))
    }

    /// Load from a file; `.json`, `.yaml` and `.yml` are read as structured
    /// text, anything else as the binary form
    pub fn from_file<P: AsRef<Path>>(path: P) -> DataResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&std::fs::read_to_string(path)?),
            Some("yaml") | Some("yml") => Self::from_yaml(&std::fs::read_to_string(path)?),
            _ => Self::from_bytes(&std::fs::read(path)?),
        }
    }
}
