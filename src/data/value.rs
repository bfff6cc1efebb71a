//! Typed values stored in a `Data` container

use crate::data::{
    types::{same_f64, BoundingBox, Image, NDArray, Point},
    Data, DataError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of value kinds a `Data` key can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    #[serde(rename = "BYTES")]
    Bytes,
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "INT64")]
    Int64,
    #[serde(rename = "DOUBLE")]
    Double,
    #[serde(rename = "BOOLEAN")]
    Boolean,
    #[serde(rename = "NDARRAY")]
    NDArray,
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "POINT")]
    Point,
    #[serde(rename = "BOUNDING_BOX")]
    BoundingBox,
    #[serde(rename = "LIST")]
    List,
    #[serde(rename = "DATA")]
    Data,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Bytes => "BYTES",
            ValueType::String => "STRING",
            ValueType::Int64 => "INT64",
            ValueType::Double => "DOUBLE",
            ValueType::Boolean => "BOOLEAN",
            ValueType::NDArray => "NDARRAY",
            ValueType::Image => "IMAGE",
            ValueType::Point => "POINT",
            ValueType::BoundingBox => "BOUNDING_BOX",
            ValueType::List => "LIST",
            ValueType::Data => "DATA",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value
///
/// Serialized adjacently tagged, e.g. `{"type": "INT64", "value": 5}`, so the
/// structured-text form keeps the type of every entry. Doubles compare by bit
/// pattern, so a NaN read back from the binary form equals the one written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    #[serde(rename = "BYTES")]
    Bytes(Vec<u8>),
    #[serde(rename = "STRING")]
    String(String),
    #[serde(rename = "INT64")]
    Int64(i64),
    #[serde(rename = "DOUBLE")]
    Double(f64),
    #[serde(rename = "BOOLEAN")]
    Boolean(bool),
    #[serde(rename = "NDARRAY")]
    NDArray(NDArray),
    #[serde(rename = "IMAGE")]
    Image(Image),
    #[serde(rename = "POINT")]
    Point(Point),
    #[serde(rename = "BOUNDING_BOX")]
    BoundingBox(BoundingBox),
    #[serde(rename = "LIST")]
    List(List),
    #[serde(rename = "DATA")]
    Data(Data),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => same_f64(*a, *b),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::NDArray(a), Value::NDArray(b)) => a == b,
            (Value::Image(a), Value::Image(b)) => a == b,
            (Value::Point(a), Value::Point(b)) => a == b,
            (Value::BoundingBox(a), Value::BoundingBox(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Data(a), Value::Data(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bytes(_) => ValueType::Bytes,
            Value::String(_) => ValueType::String,
            Value::Int64(_) => ValueType::Int64,
            Value::Double(_) => ValueType::Double,
            Value::Boolean(_) => ValueType::Boolean,
            Value::NDArray(_) => ValueType::NDArray,
            Value::Image(_) => ValueType::Image,
            Value::Point(_) => ValueType::Point,
            Value::BoundingBox(_) => ValueType::BoundingBox,
            Value::List(_) => ValueType::List,
            Value::Data(_) => ValueType::Data,
        }
    }
}

/// A homogeneous list: every item has `element_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawList")]
pub struct List {
    element_type: ValueType,
    items: Vec<Value>,
}

#[derive(Deserialize)]
struct RawList {
    element_type: ValueType,
    items: Vec<Value>,
}

impl TryFrom<RawList> for List {
    type Error = DataError;

    fn try_from(raw: RawList) -> Result<Self, Self::Error> {
        List::new(raw.element_type, raw.items)
    }
}

impl List {
    /// Create a list, rejecting items whose type differs from `element_type`
    pub fn new(element_type: ValueType, items: Vec<Value>) -> Result<Self, DataError> {
        if let Some((idx, bad)) = items
            .iter()
            .enumerate()
            .find(|(_, item)| item.value_type() != element_type)
        {
            return Err(DataError::InvalidValue(format!(
                "list of {} has item {} of type {}",
                element_type,
                idx,
                bad.value_type()
            )));
        }
        Ok(Self {
            element_type,
            items,
        })
    }

    /// Create a list whose element type is taken from the first item
    pub fn infer(items: Vec<Value>) -> Result<Self, DataError> {
        let element_type = items
            .first()
            .map(Value::value_type)
            .ok_or_else(|| DataError::InvalidValue("cannot infer the type of an empty list".to_string()))?;
        Self::new(element_type, items)
    }

    pub fn empty(element_type: ValueType) -> Self {
        Self {
            element_type,
            items: Vec::new(),
        }
    }

    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            element_type: ValueType::String,
            items: items.into_iter().map(|s| Value::String(s.into())).collect(),
        }
    }

    pub fn int64s(items: impl IntoIterator<Item = i64>) -> Self {
        Self {
            element_type: ValueType::Int64,
            items: items.into_iter().map(Value::Int64).collect(),
        }
    }

    pub fn doubles(items: impl IntoIterator<Item = f64>) -> Self {
        Self {
            element_type: ValueType::Double,
            items: items.into_iter().map(Value::Double).collect(),
        }
    }

    pub fn element_type(&self) -> ValueType {
        self.element_type
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<NDArray> for Value {
    fn from(v: NDArray) -> Self {
        Value::NDArray(v)
    }
}

impl From<Image> for Value {
    fn from(v: Image) -> Self {
        Value::Image(v)
    }
}

impl From<Point> for Value {
    fn from(v: Point) -> Self {
        Value::Point(v)
    }
}

impl From<BoundingBox> for Value {
    fn from(v: BoundingBox) -> Self {
        Value::BoundingBox(v)
    }
}

impl From<List> for Value {
    fn from(v: List) -> Self {
        Value::List(v)
    }
}

impl From<Data> for Value {
    fn from(v: Data) -> Self {
        Value::Data(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_rejects_mixed_types() {
        let err = List::new(
            ValueType::Int64,
            vec![Value::Int64(1), Value::String("two".to_string())],
        )
        .unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test]
    fn test_list_infer() {
        let list = List::infer(vec![Value::Double(1.0), Value::Double(2.0)]).unwrap();
        assert_eq!(list.element_type(), ValueType::Double);
        assert!(List::infer(vec![]).is_err());
    }

    #[test]
    fn test_value_json_is_tagged() {
        let json = serde_json::to_string(&Value::Int64(5)).unwrap();
        assert_eq!(json, r#"{"type":"INT64","value":5}"#);

        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Int64(5));
    }

    #[test]
    fn test_list_json_validates_items() {
        let json = r#"{"element_type":"STRING","items":[{"type":"INT64","value":1}]}"#;
        assert!(serde_json::from_str::<List>(json).is_err());
    }
}
