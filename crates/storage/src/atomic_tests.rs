// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Doc {
    name: String,
    count: u32,
}

#[test]
fn write_then_read_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/doc.json");
    let doc = Doc {
        name: "a".into(),
        count: 3,
    };
    write_json_atomic(&path, &doc).unwrap();
    assert_eq!(read_json::<Doc>(&path), Some(doc));
    // No tmp file left behind
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn overwrite_replaces_whole_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    write_json_atomic(&path, &Doc { name: "a".into(), count: 1 }).unwrap();
    write_json_atomic(&path, &Doc { name: "b".into(), count: 2 }).unwrap();
    assert_eq!(
        read_json::<Doc>(&path),
        Some(Doc { name: "b".into(), count: 2 })
    );
}

#[test]
fn missing_and_corrupt_read_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    assert_eq!(read_json::<Doc>(&path), None);

    std::fs::write(&path, "{not json").unwrap();
    assert_eq!(read_json::<Doc>(&path), None);
}

#[test]
fn jsonl_append_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    for i in 0..3 {
        append_jsonl(&path, &Doc { name: "x".into(), count: i }).unwrap();
    }
    let rows: Vec<Doc> = read_jsonl(&path);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].count, 2);
}

#[test]
fn jsonl_tolerates_partial_trailing_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    append_jsonl(&path, &Doc { name: "ok".into(), count: 1 }).unwrap();
    // Simulate a crash mid-append
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"{\"name\":\"trunc").unwrap();

    let rows: Vec<Doc> = read_jsonl(&path);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "ok");
}

#[test]
fn jsonl_skips_corrupt_interior_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    std::fs::write(&path, "{\"name\":\"a\",\"count\":1}\ngarbage\n{\"name\":\"b\",\"count\":2}\n")
        .unwrap();
    let rows: Vec<Doc> = read_jsonl(&path);
    assert_eq!(rows.len(), 2);
}

#[test]
fn arbitrary_json_values_work() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.json");
    let mut map = HashMap::new();
    map.insert("k".to_string(), 1u32);
    write_json_atomic(&path, &map).unwrap();
    assert_eq!(read_json::<HashMap<String, u32>>(&path), Some(map));
}
