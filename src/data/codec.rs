//! Compact binary encoding of `Data`
//!
//! Layout (all integers little endian):
//!
//! ```text
//! file   := "KSDT" version:u8 map
//! map    := count:u32 entry* has_meta:u8 [map]
//! entry  := key:str value
//! value  := tag:u8 len:u32 payload[len]
//! str    := len:u32 utf8[len]
//! ```
//!
//! Every value is length-delimited, and decoding checks that a payload is
//! consumed exactly. Nested maps (`DATA` values, lists and metadata) are
//! limited to `MAX_DEPTH` levels on both sides.

use crate::data::{
    BoundingBox, Data, DataError, DataResult, Image, ImageFormat, List, NDArray, NDArrayType,
    NDBuffer, Point, Value, ValueType,
};

const MAGIC: &[u8; 4] = b"KSDT";
const VERSION: u8 = 1;

/// Deepest nesting of maps, lists and metadata the codec accepts
pub const MAX_DEPTH: usize = 64;

fn type_tag(t: ValueType) -> u8 {
    match t {
        ValueType::Bytes => 1,
        ValueType::String => 2,
        ValueType::Int64 => 3,
        ValueType::Double => 4,
        ValueType::Boolean => 5,
        ValueType::NDArray => 6,
        ValueType::Image => 7,
        ValueType::Point => 8,
        ValueType::BoundingBox => 9,
        ValueType::List => 10,
        ValueType::Data => 11,
    }
}

fn tag_type(tag: u8) -> DataResult<ValueType> {
    Ok(match tag {
        1 => ValueType::Bytes,
        2 => ValueType::String,
        3 => ValueType::Int64,
        4 => ValueType::Double,
        5 => ValueType::Boolean,
        6 => ValueType::NDArray,
        7 => ValueType::Image,
        8 => ValueType::Point,
        9 => ValueType::BoundingBox,
        10 => ValueType::List,
        11 => ValueType::Data,
        other => return Err(DataError::Decode(format!("unknown value tag {}", other))),
    })
}

fn ndarray_tag(t: NDArrayType) -> u8 {
    match t {
        NDArrayType::F32 => 1,
        NDArrayType::F64 => 2,
        NDArrayType::I32 => 3,
        NDArrayType::I64 => 4,
        NDArrayType::U8 => 5,
    }
}

fn image_tag(f: ImageFormat) -> u8 {
    match f {
        ImageFormat::Png => 1,
        ImageFormat::Jpeg => 2,
        ImageFormat::Bmp => 3,
        ImageFormat::Raw => 4,
    }
}

/// Encode a `Data` instance, including nested metadata
pub fn encode(data: &Data) -> DataResult<Vec<u8>> {
    let mut enc = Encoder {
        buf: Vec::new(),
        depth: 0,
    };
    enc.buf.extend_from_slice(MAGIC);
    enc.u8(VERSION);
    enc.map(data)?;
    Ok(enc.buf)
}

/// Decode a `Data` instance produced by `encode`
pub fn decode(bytes: &[u8]) -> DataResult<Data> {
    let mut dec = Decoder {
        buf: bytes,
        pos: 0,
        depth: 0,
    };
    if dec.take(MAGIC.len())? != MAGIC {
        return Err(DataError::Decode("missing KSDT header".to_string()));
    }
    let version = dec.u8()?;
    if version != VERSION {
        return Err(DataError::Decode(format!("unsupported version {}", version)));
    }
    let data = dec.map()?;
    dec.finish()?;
    Ok(data)
}

fn len_u32(len: usize, what: &str) -> DataResult<u32> {
    u32::try_from(len).map_err(|_| DataError::InvalidValue(format!("{} too large to encode ({})", what, len)))
}

fn too_deep() -> String {
    format!("nesting deeper than {} levels", MAX_DEPTH)
}

struct Encoder {
    buf: Vec<u8>,
    depth: usize,
}

impl Encoder {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn str(&mut self, s: &str) -> DataResult<()> {
        self.u32(len_u32(s.len(), "string")?);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn opt_str(&mut self, s: Option<&str>) -> DataResult<()> {
        match s {
            Some(s) => {
                self.u8(1);
                self.str(s)
            }
            None => {
                self.u8(0);
                Ok(())
            }
        }
    }

    fn opt_f64(&mut self, v: Option<f64>) {
        match v {
            Some(v) => {
                self.u8(1);
                self.f64(v);
            }
            None => self.u8(0),
        }
    }

    fn map(&mut self, data: &Data) -> DataResult<()> {
        self.u32(len_u32(data.len(), "map")?);
        for (key, value) in data.iter() {
            self.str(key)?;
            self.value(value)?;
        }
        match data.metadata() {
            Some(meta) => {
                self.u8(1);
                self.nested(|enc| enc.map(meta))
            }
            None => {
                self.u8(0);
                Ok(())
            }
        }
    }

    fn value(&mut self, value: &Value) -> DataResult<()> {
        self.u8(type_tag(value.value_type()));
        let len_at = self.buf.len();
        self.u32(0);
        let start = self.buf.len();
        self.nested(|enc| enc.payload(value))?;
        let len = len_u32(self.buf.len() - start, "value")?;
        self.buf[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> DataResult<()>) -> DataResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(DataError::InvalidValue(too_deep()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn payload(&mut self, value: &Value) -> DataResult<()> {
        match value {
            Value::Bytes(b) => self.buf.extend_from_slice(b),
            Value::String(s) => self.buf.extend_from_slice(s.as_bytes()),
            Value::Int64(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            Value::Double(v) => self.f64(*v),
            Value::Boolean(v) => self.u8(u8::from(*v)),
            Value::NDArray(arr) => {
                self.u8(ndarray_tag(arr.element_type()));
                self.u32(len_u32(arr.rank(), "ndarray rank")?);
                for dim in arr.shape() {
                    self.u64(*dim as u64);
                }
                match arr.buffer() {
                    NDBuffer::F32(v) => v.iter().for_each(|x| self.buf.extend_from_slice(&x.to_le_bytes())),
                    NDBuffer::F64(v) => v.iter().for_each(|x| self.buf.extend_from_slice(&x.to_le_bytes())),
                    NDBuffer::I32(v) => v.iter().for_each(|x| self.buf.extend_from_slice(&x.to_le_bytes())),
                    NDBuffer::I64(v) => v.iter().for_each(|x| self.buf.extend_from_slice(&x.to_le_bytes())),
                    NDBuffer::U8(v) => self.buf.extend_from_slice(v),
                }
            }
            Value::Image(img) => {
                self.u8(image_tag(img.format));
                self.u32(img.width);
                self.u32(img.height);
                self.buf.extend_from_slice(&img.data);
            }
            Value::Point(p) => {
                self.f64(p.x);
                self.f64(p.y);
                self.opt_str(p.label.as_deref())?;
                self.opt_f64(p.probability);
            }
            Value::BoundingBox(bb) => {
                self.f64(bb.x1);
                self.f64(bb.y1);
                self.f64(bb.x2);
                self.f64(bb.y2);
                self.opt_str(bb.label.as_deref())?;
                self.opt_f64(bb.probability);
            }
            Value::List(list) => {
                self.u8(type_tag(list.element_type()));
                self.u32(len_u32(list.len(), "list")?);
                for item in list.items() {
                    self.value(item)?;
                }
            }
            Value::Data(nested) => self.map(nested)?,
        }
        Ok(())
    }
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn child_depth(&self) -> DataResult<usize> {
        if self.depth >= MAX_DEPTH {
            return Err(DataError::Decode(too_deep()));
        }
        Ok(self.depth + 1)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> DataResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(DataError::Decode(format!(
                "unexpected end of input: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> DataResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn finish(&self) -> DataResult<()> {
        if self.remaining() != 0 {
            return Err(DataError::Decode(format!(
                "{} trailing bytes after offset {}",
                self.remaining(),
                self.pos
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> DataResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> DataResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> DataResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> DataResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn flag(&mut self) -> DataResult<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DataError::Decode(format!("invalid flag byte {}", other))),
        }
    }

    fn utf8(bytes: &[u8]) -> DataResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| DataError::Decode(format!("invalid UTF-8: {}", e)))
    }

    fn str(&mut self) -> DataResult<String> {
        let len = self.u32()? as usize;
        Self::utf8(self.take(len)?)
    }

    fn opt_str(&mut self) -> DataResult<Option<String>> {
        if self.flag()? {
            Ok(Some(self.str()?))
        } else {
            Ok(None)
        }
    }

    fn opt_f64(&mut self) -> DataResult<Option<f64>> {
        if self.flag()? {
            Ok(Some(self.f64()?))
        } else {
            Ok(None)
        }
    }

    fn map(&mut self) -> DataResult<Data> {
        let count = self.u32()?;
        let mut data = Data::new();
        for _ in 0..count {
            let key = self.str()?;
            if data.has(&key) {
                return Err(DataError::Decode(format!("duplicate key \"{}\"", key)));
            }
            let value = self.value()?;
            data.put(key, value)?;
        }
        if self.flag()? {
            self.depth = self.child_depth()?;
            let meta = self.map();
            self.depth -= 1;
            data.set_metadata(meta?);
        }
        Ok(data)
    }

    fn value(&mut self) -> DataResult<Value> {
        let value_type = tag_type(self.u8()?)?;
        let len = self.u32()? as usize;
        let depth = self.child_depth()?;
        let mut payload = Decoder {
            buf: self.take(len)?,
            pos: 0,
            depth,
        };
        let value = payload.payload(value_type)?;
        payload.finish()?;
        Ok(value)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    fn payload(&mut self, value_type: ValueType) -> DataResult<Value> {
        Ok(match value_type {
            ValueType::Bytes => Value::Bytes(self.rest().to_vec()),
            ValueType::String => Value::String(Self::utf8(self.rest())?),
            ValueType::Int64 => Value::Int64(i64::from_le_bytes(self.array()?)),
            ValueType::Double => Value::Double(self.f64()?),
            ValueType::Boolean => Value::Boolean(self.flag()?),
            ValueType::NDArray => Value::NDArray(self.ndarray()?),
            ValueType::Image => {
                let format = match self.u8()? {
                    1 => ImageFormat::Png,
                    2 => ImageFormat::Jpeg,
                    3 => ImageFormat::Bmp,
                    4 => ImageFormat::Raw,
                    other => return Err(DataError::Decode(format!("unknown image format {}", other))),
                };
                let width = self.u32()?;
                let height = self.u32()?;
                Value::Image(Image::new(format, width, height, self.rest().to_vec()))
            }
            ValueType::Point => Value::Point(Point {
                x: self.f64()?,
                y: self.f64()?,
                label: self.opt_str()?,
                probability: self.opt_f64()?,
            }),
            ValueType::BoundingBox => Value::BoundingBox(BoundingBox {
                x1: self.f64()?,
                y1: self.f64()?,
                x2: self.f64()?,
                y2: self.f64()?,
                label: self.opt_str()?,
                probability: self.opt_f64()?,
            }),
            ValueType::List => {
                let element_type = tag_type(self.u8()?)?;
                let count = self.u32()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(self.value()?);
                }
                Value::List(List::new(element_type, items)?)
            }
            ValueType::Data => Value::Data(self.map()?),
        })
    }

    fn ndarray(&mut self) -> DataResult<NDArray> {
        let dtype = self.u8()?;
        let rank = self.u32()?;
        let mut shape = Vec::new();
        for _ in 0..rank {
            let dim = usize::try_from(self.u64()?)
                .map_err(|_| DataError::Decode("ndarray dimension out of range".to_string()))?;
            shape.push(dim);
        }
        let count = shape
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .ok_or_else(|| DataError::Decode("ndarray element count overflows".to_string()))?;

        let width = match dtype {
            1 | 3 => 4,
            2 | 4 => 8,
            5 => 1,
            other => return Err(DataError::Decode(format!("unknown ndarray dtype {}", other))),
        };
        let byte_len = count
            .checked_mul(width)
            .filter(|n| *n <= self.remaining())
            .ok_or_else(|| DataError::Decode(format!("ndarray of {} elements exceeds payload", count)))?;
        let bytes = self.take(byte_len)?;

        let buffer = match dtype {
            1 => NDBuffer::F32(bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()),
            2 => NDBuffer::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            3 => NDBuffer::I32(bytes.chunks_exact(4).map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()),
            4 => NDBuffer::I64(
                bytes
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            _ => NDBuffer::U8(bytes.to_vec()),
        };
        NDArray::new(shape, buffer).map_err(DataError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn everything() -> Data {
        let mut d = Data::new();
        d.put("bytes", vec![0u8, 1, 2, 255]).unwrap();
        d.put("text", "héllo").unwrap();
        d.put("int", -42i64).unwrap();
        d.put("double", 3.5).unwrap();
        d.put("bool", false).unwrap();
        d.put(
            "tensor",
            NDArray::new(vec![2, 2], NDBuffer::I32(vec![1, 2, 3, 4])).unwrap(),
        )
        .unwrap();
        d.put("image", Image::new(ImageFormat::Png, 2, 1, vec![9, 8, 7])).unwrap();
        d.put("point", Point::new(1.0, 2.0).with_label("nose", Some(0.9))).unwrap();
        d.put("box", BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        d.put(
            "nested_list",
            List::infer(vec![Value::List(List::int64s([1, 2])), Value::List(List::int64s(Vec::new()))]).unwrap(),
        )
        .unwrap();
        d.put("child", Data::single("inner", 1i64)).unwrap();
        d.set_metadata(Data::single("source", "unit-test"));
        d
    }

    #[test]
    fn test_round_trip_all_types() {
        let d = everything();
        let bytes = encode(&d).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(decode(&bytes).unwrap(), d);
    }

    #[test]
    fn test_empty_round_trip() {
        let d = Data::new();
        assert_eq!(decode(&encode(&d).unwrap()).unwrap(), d);
    }

    #[test]
    fn test_truncated_input_fails() {
        let bytes = encode(&everything()).unwrap();
        for cut in [0, 3, 5, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode(&bytes[..cut]).is_err(), "cut at {} should fail", cut);
        }
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let mut bytes = encode(&Data::single("a", 1i64)).unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(DataError::Decode(_))));
    }

    #[test]
    fn test_bad_header_fails() {
        assert!(decode(b"NOPE\x01\x00\x00\x00\x00\x00").is_err());
    }

    #[test]
    fn test_nan_doubles_round_trip() {
        let mut d = Data::single("nan", f64::NAN);
        d.put("neg_inf", f64::NEG_INFINITY).unwrap();
        d.put("tensor", NDArray::from_f32(vec![f32::NAN, 1.0])).unwrap();
        d.put("point", Point::new(f64::NAN, 0.0).with_label("nose", Some(f64::NAN))).unwrap();
        assert_eq!(d, d.clone());
        assert_eq!(decode(&encode(&d).unwrap()).unwrap(), d);
        assert_ne!(Data::single("z", 0.0), Data::single("z", -0.0));
    }

    fn header() -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.push(VERSION);
        bytes
    }

    /// A map holding a single `DATA` value under key "d", `levels` deep
    fn nested_values(levels: usize) -> Vec<u8> {
        let mut map = vec![0, 0, 0, 0, 0];
        for _ in 0..levels {
            let mut outer = 1u32.to_le_bytes().to_vec();
            outer.extend_from_slice(&1u32.to_le_bytes());
            outer.push(b'd');
            outer.push(type_tag(ValueType::Data));
            outer.extend_from_slice(&(map.len() as u32).to_le_bytes());
            outer.extend_from_slice(&map);
            outer.push(0);
            map = outer;
        }
        let mut bytes = header();
        bytes.extend_from_slice(&map);
        bytes
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        assert!(decode(&nested_values(MAX_DEPTH)).is_ok());
        assert!(matches!(decode(&nested_values(MAX_DEPTH + 1)), Err(DataError::Decode(_))));
        assert!(matches!(decode(&nested_values(1_000)), Err(DataError::Decode(_))));

        // Metadata of metadata, each level an empty map
        let mut bytes = header();
        for _ in 0..100_000 {
            bytes.extend_from_slice(&[0, 0, 0, 0, 1]);
        }
        bytes.extend_from_slice(&[0, 0, 0, 0, 0]);
        assert!(matches!(decode(&bytes), Err(DataError::Decode(_))));
    }

    #[test]
    fn test_encode_refuses_what_decode_would_reject() {
        // The leaf value sits one level below the innermost map
        let mut d = Data::single("leaf", 1i64);
        for _ in 0..MAX_DEPTH - 1 {
            d = Data::single("d", d);
        }
        assert!(decode(&encode(&d).unwrap()).is_ok());

        let d = Data::single("d", d);
        assert!(matches!(encode(&d), Err(DataError::InvalidValue(_))));
    }
}
