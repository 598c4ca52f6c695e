use super::*;
use tempfile::TempDir;

#[test]
fn empty_index_search() {
    let index = VectorIndex::new(4);
    let results = index
        .search(&[1.0, 0.0, 0.0, 0.0], 3)
        .expect("search should succeed");
    assert!(results.is_empty());
}

#[test]
fn insert_and_search_ordering() {
    let mut index = VectorIndex::new(4);
    index.insert(0, &[1.0, 0.0, 0.0, 0.0]).expect("insert 0");
    index.insert(1, &[0.0, 1.0, 0.0, 0.0]).expect("insert 1");
    index
        .insert(2, &[0.9, 0.1, 0.0, 0.0])
        .expect("insert 2");

    let results = index
        .search(&[1.0, 0.0, 0.0, 0.0], 3)
        .expect("search should succeed");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, 0);
    assert_eq!(results[1].0, 2);
    assert_eq!(results[2].0, 1);

    // distances are ascending
    assert!(results[0].1 <= results[1].1);
    assert!(results[1].1 <= results[2].1);
    // exact match has distance ~0
    assert!(results[0].1.abs() < 1e-6);
}

#[test]
fn search_respects_k() {
    let mut index = VectorIndex::new(2);
    for key in 0..5 {
        index
            .insert(key, &[1.0, key as f32])
            .expect("insert should succeed");
    }

    let results = index.search(&[1.0, 0.0], 2).expect("search should succeed");
    assert_eq!(results.len(), 2);
}

#[test]
fn duplicate_key_rejected() {
    let mut index = VectorIndex::new(2);
    index.insert(7, &[1.0, 0.0]).expect("first insert");
    assert!(index.insert(7, &[0.0, 1.0]).is_err());
    assert_eq!(index.len(), 1);
}

#[test]
fn dimension_mismatch_rejected() {
    let mut index = VectorIndex::new(4);
    assert!(index.insert(0, &[1.0, 0.0]).is_err());
    assert!(index.search(&[1.0, 0.0], 3).is_err());
    assert!(index.is_empty());
}

#[test]
fn zero_norm_vector_is_maximally_distant() {
    let mut index = VectorIndex::new(2);
    index.insert(0, &[0.0, 0.0]).expect("insert zero vector");
    index.insert(1, &[1.0, 0.0]).expect("insert unit vector");

    let results = index.search(&[1.0, 0.0], 2).expect("search should succeed");
    assert_eq!(results[0].0, 1);
    assert_eq!(results[1].0, 0);
    assert!((results[1].1 - 1.0).abs() < 1e-6);
}

#[test]
fn retain_keys_drops_entries() {
    let mut index = VectorIndex::new(2);
    index.insert(0, &[1.0, 0.0]).expect("insert 0");
    index.insert(1, &[0.0, 1.0]).expect("insert 1");
    index.insert(2, &[1.0, 1.0]).expect("insert 2");

    let removed = index.retain_keys(|key| key != 1);
    assert_eq!(removed, 1);
    assert_eq!(index.len(), 2);
    assert!(!index.contains_key(1));

    let results = index.search(&[0.0, 1.0], 3).expect("search should succeed");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, 2);
}

#[test]
fn save_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("test.index");

    let mut index = VectorIndex::new(3);
    index.insert(0, &[0.5, -0.25, 1.0]).expect("insert 0");
    index.insert(3, &[0.0, 0.125, -1.5]).expect("insert 3");
    index.save(&path).expect("save should succeed");

    let loaded = VectorIndex::load(&path).expect("load should succeed");
    assert_eq!(loaded.dimension(), 3);
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.keys(), &[0, 3]);
    assert_eq!(loaded.vectors, index.vectors);

    // no stray temp file left behind
    assert!(!temp_dir.path().join("test.index.tmp").exists());
}

#[test]
fn load_rejects_garbage() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("bogus.index");
    std::fs::write(&path, b"not an index file").expect("should write file");

    assert!(VectorIndex::load(&path).is_err());
}

#[test]
fn load_rejects_truncated_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("test.index");

    let mut index = VectorIndex::new(3);
    index.insert(0, &[1.0, 2.0, 3.0]).expect("insert");
    index.save(&path).expect("save should succeed");

    let bytes = std::fs::read(&path).expect("should read file");
    std::fs::write(&path, &bytes[..bytes.len() - 4]).expect("should truncate file");

    assert!(VectorIndex::load(&path).is_err());
}
