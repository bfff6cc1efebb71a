//! Test: Data files on disk and container rules seen from outside the crate

use serving_pipeline::data::{BoundingBox, DataError, Image, ImageFormat, List, NDArray, Point};
use serving_pipeline::{Data, MergeMode, ValueType};
use tempfile::TempDir;

fn sample() -> Data {
    let mut data = Data::new();
    data.put("label", "cat").unwrap();
    data.put("score", 0.87).unwrap();
    data.put("count", 3i64).unwrap();
    data.put("ok", true).unwrap();
    data.put("raw", vec![0u8, 1, 254, 255]).unwrap();
    data.put("tensor", NDArray::from_f32(vec![0.5, 1.5, -2.0])).unwrap();
    data.put("image", Image::new(ImageFormat::Png, 2, 1, vec![137, 80, 78, 71]))
        .unwrap();
    data.put(
        "box",
        BoundingBox::new(1.0, 2.0, 5.0, 8.0).with_label("cat", Some(0.9)),
    )
    .unwrap();
    data.put("points", List::infer(vec![Point::new(1.0, 2.0).into(), Point::new(3.0, 4.0).into()]).unwrap())
        .unwrap();
    data.put("tags", List::strings(["a", "b"])).unwrap();
    data.put("nested", Data::single("inner", 1i64)).unwrap();
    data.set_metadata(Data::single("source", "camera-1"));
    data
}

/// Every file form reads back to an equal container
#[test]
fn test_file_forms_round_trip() {
    let dir = TempDir::new().unwrap();
    let data = sample();

    let binary = dir.path().join("data.bin");
    data.save(&binary).unwrap();
    assert_eq!(Data::from_file(&binary).unwrap(), data);

    let json = dir.path().join("data.json");
    std::fs::write(&json, data.to_json().unwrap()).unwrap();
    assert_eq!(Data::from_file(&json).unwrap(), data);

    let yaml = dir.path().join("data.yaml");
    std::fs::write(&yaml, data.to_yaml().unwrap()).unwrap();
    assert_eq!(Data::from_file(&yaml).unwrap(), data);
}

/// Key order survives encoding
#[test]
fn test_key_order_preserved() {
    let data = sample();
    let decoded = Data::from_bytes(&data.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded.keys().collect::<Vec<_>>(), data.keys().collect::<Vec<_>>());
    assert_eq!(decoded.list_type("points"), Some(ValueType::Point));
    assert_eq!(decoded.metadata().unwrap().get_string("source").unwrap(), "camera-1");
}

/// A truncated or corrupt file is a decode error, not a panic
#[test]
fn test_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.bin");
    let bytes = sample().to_bytes().unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(Data::from_file(&path).is_err());
    assert!(matches!(Data::from_file(dir.path().join("absent.bin")), Err(DataError::Io(_))));
}

/// Keys are type-fixed until removed
#[test]
fn test_type_fixed_keys() {
    let mut data = Data::single("count", 1i64);
    let err = data.put("count", "one").unwrap_err();
    assert!(matches!(err, DataError::TypeChange { .. }));
    assert_eq!(data.get_i64("count").unwrap(), 1);

    assert!(matches!(data.get_string("count"), Err(DataError::TypeMismatch { .. })));
    assert!(matches!(data.get_i64("missing"), Err(DataError::KeyNotFound(_))));

    data.remove("count");
    data.put("count", "one").unwrap();
    assert_eq!(data.value_type("count"), Some(ValueType::String));
}

/// Merge modes decide who wins; a type conflict leaves the target untouched
#[test]
fn test_merge_modes() {
    let mut base = Data::single("a", 1i64);
    base.put("b", "old").unwrap();
    let mut other = Data::single("b", "new");
    other.put("c", true).unwrap();

    let mut keep = base.clone();
    keep.merge(&other, MergeMode::KeepExisting).unwrap();
    assert_eq!(keep.get_string("b").unwrap(), "old");
    assert!(keep.get_bool("c").unwrap());

    let mut overwrite = base.clone();
    overwrite.merge(&other, MergeMode::Overwrite).unwrap();
    assert_eq!(overwrite.get_string("b").unwrap(), "new");
    assert_eq!(overwrite.len(), 3);

    let conflict = Data::single("a", "not a number");
    let before = base.clone();
    assert!(base.merge(&conflict, MergeMode::Overwrite).is_err());
    assert_eq!(base, before);
}
