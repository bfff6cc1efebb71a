//! Structured value kinds carried by `Data`: arrays, images, points, boxes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Float equality used throughout `Data`: identical bit patterns are equal,
/// so NaN equals itself and `0.0` differs from `-0.0`
pub(crate) fn same_f64(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}

fn same_opt_f64(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_f64(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Element type of an n-dimensional array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NDArrayType {
    F32,
    F64,
    I32,
    I64,
    U8,
}

impl fmt::Display for NDArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NDArrayType::F32 => "f32",
            NDArrayType::F64 => "f64",
            NDArrayType::I32 => "i32",
            NDArrayType::I64 => "i64",
            NDArrayType::U8 => "u8",
        };
        f.write_str(name)
    }
}

/// Flat element storage for an `NDArray`, row-major
///
/// Float elements compare by bit pattern, like every float in `Data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum NDBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
}

impl PartialEq for NDBuffer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NDBuffer::F32(a), NDBuffer::F32(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (NDBuffer::F64(a), NDBuffer::F64(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_f64(*x, *y))
            }
            (NDBuffer::I32(a), NDBuffer::I32(b)) => a == b,
            (NDBuffer::I64(a), NDBuffer::I64(b)) => a == b,
            (NDBuffer::U8(a), NDBuffer::U8(b)) => a == b,
            _ => false,
        }
    }
}

impl NDBuffer {
    pub fn element_type(&self) -> NDArrayType {
        match self {
            NDBuffer::F32(_) => NDArrayType::F32,
            NDBuffer::F64(_) => NDArrayType::F64,
            NDBuffer::I32(_) => NDArrayType::I32,
            NDBuffer::I64(_) => NDArrayType::I64,
            NDBuffer::U8(_) => NDArrayType::U8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            NDBuffer::F32(v) => v.len(),
            NDBuffer::F64(v) => v.len(),
            NDBuffer::I32(v) => v.len(),
            NDBuffer::I64(v) => v.len(),
            NDBuffer::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An n-dimensional numeric array
///
/// The shape is validated against the buffer length on construction and on
/// deserialization. An empty shape is a scalar holding exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNDArray")]
pub struct NDArray {
    shape: Vec<usize>,
    data: NDBuffer,
}

#[derive(Deserialize)]
struct RawNDArray {
    shape: Vec<usize>,
    data: NDBuffer,
}

impl TryFrom<RawNDArray> for NDArray {
    type Error = String;

    fn try_from(raw: RawNDArray) -> Result<Self, Self::Error> {
        NDArray::new(raw.shape, raw.data)
    }
}

impl NDArray {
    /// Create an array, checking that the shape matches the number of elements
    pub fn new(shape: Vec<usize>, data: NDBuffer) -> Result<Self, String> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| format!("shape {:?} has too many elements", shape))?;
        if expected != data.len() {
            return Err(format!(
                "shape {:?} requires {} elements, buffer holds {}",
                shape,
                expected,
                data.len()
            ));
        }
        Ok(Self { shape, data })
    }

    /// A one-dimensional f32 array
    pub fn from_f32(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len()],
            data: NDBuffer::F32(values),
        }
    }

    /// A one-dimensional f64 array
    pub fn from_f64(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: NDBuffer::F64(values),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn element_type(&self) -> NDArrayType {
        self.data.element_type()
    }

    pub fn buffer(&self) -> &NDBuffer {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Same elements, different shape
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, String> {
        Self::new(shape, self.data)
    }
}

/// Encoding of an image payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Bmp,
    /// Uncompressed pixel bytes
    Raw,
}

/// An image carried as its encoded bytes; the core never decodes pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(format: ImageFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            format,
            width,
            height,
            data,
        }
    }
}

/// A 2D point, optionally labelled with a class and confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        same_f64(self.x, other.x)
            && same_f64(self.y, other.y)
            && self.label == other.label
            && same_opt_f64(self.probability, other.probability)
    }
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            label: None,
            probability: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>, probability: Option<f64>) -> Self {
        self.label = Some(label.into());
        self.probability = probability;
        self
    }
}

/// An axis-aligned bounding box in corner form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        same_f64(self.x1, other.x1)
            && same_f64(self.y1, other.y1)
            && same_f64(self.x2, other.x2)
            && same_f64(self.y2, other.y2)
            && self.label == other.label
            && same_opt_f64(self.probability, other.probability)
    }
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            label: None,
            probability: None,
        }
    }

    /// Build from center coordinates plus width and height
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    pub fn with_label(mut self, label: impl Into<String>, probability: Option<f64>) -> Self {
        self.label = Some(label.into());
        self.probability = probability;
        self
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }

    pub fn center_x(&self) -> f64 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.y1 + self.y2) / 2.0
    }
}
