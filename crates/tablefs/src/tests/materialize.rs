// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Table-bound reads: registration, re-materialization and stale content

use super::{empty_fs, users_fs};
use crate::testing::{StaticSource, rows};
use crate::{Error, InodeKind, Owner, TABLE_FILE_MODE, TableFs};
use arrow::ipc::reader::FileReader;
use arrow_array::cast::AsArray;
use arrow_array::types::UInt64Type;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

fn read_all(fs: &TableFs, path: &str) -> Vec<u8> {
    fs.read(path, usize::MAX, 0).unwrap()
}

#[test]
fn test_registered_tables_have_both_files() {
    let source = StaticSource::new()
        .with_table("users", rows(json!([{"name": "root", "uid": 0}])))
        .with_table("groups", rows(json!([])));
    let fs = TableFs::with_tables(source, Owner::default(), ["users", "groups"]).unwrap();

    for path in ["/users.json", "/users.arrow", "/groups.json", "/groups.arrow"] {
        let attrs = fs.attributes(path).unwrap();
        assert_eq!(attrs.kind(), InodeKind::File, "{path}");
        assert_eq!(attrs.mode, TABLE_FILE_MODE);
        assert_eq!(attrs.nlink, 1);

        let content = read_all(&fs, path);
        assert_eq!(fs.attributes(path).unwrap().size, content.len() as u64, "{path}");
    }
}

#[test]
fn test_size_matches_content_before_first_read() {
    let (_source, fs) = users_fs();
    let expected = br#"[{"name":"root","uid":0}]"#;
    assert_eq!(fs.attributes("/users.json").unwrap().size, expected.len() as u64);
    assert!(fs.attributes("/users.arrow").unwrap().size > 0);
}

#[test]
fn test_registration_queries_once() {
    let (source, _fs) = users_fs();
    assert_eq!(source.calls(), 1);
}

#[test]
fn test_users_json_scenario() {
    let (_source, fs) = users_fs();
    assert_eq!(read_all(&fs, "/users.json"), br#"[{"name":"root","uid":0}]"#);
}

#[test]
fn test_users_arrow_scenario() {
    let (_source, fs) = users_fs();
    let bytes = read_all(&fs, "/users.arrow");
    assert!(bytes.starts_with(b"ARROW1"));

    let reader = FileReader::try_new(Cursor::new(bytes), None).unwrap();
    let schema = reader.schema();
    assert_eq!(schema.field(0).name(), "name");
    assert_eq!(schema.field(1).name(), "uid");

    let batches: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].num_rows(), 1);
    assert_eq!(batches[0].column(0).as_string::<i64>().value(0), "root");
    assert_eq!(batches[0].column(1).as_primitive::<UInt64Type>().value(0), 0);
}

#[test]
fn test_every_read_queries_again() {
    let (source, fs) = users_fs();
    let _ = read_all(&fs, "/users.json");
    let _ = read_all(&fs, "/users.arrow");
    assert_eq!(source.calls(), 3);

    source
        .set_table("users", rows(json!([{"name": "root", "uid": 0}, {"name": "bin", "uid": 2}])))
        .unwrap();
    let content = read_all(&fs, "/users.json");
    assert_eq!(
        content,
        br#"[{"name":"root","uid":0},{"name":"bin","uid":2}]"#
    );
    assert_eq!(fs.attributes("/users.json").unwrap().size, content.len() as u64);
}

#[test]
fn test_failing_source_serves_previous_slice() {
    let (source, fs) = users_fs();
    let before = fs.read("/users.json", 10, 2).unwrap();
    let size_before = fs.attributes("/users.json").unwrap().size;

    source.set_failing(true);
    let after = fs.read("/users.json", 10, 2).unwrap();
    assert_eq!(after, before);
    assert_eq!(fs.attributes("/users.json").unwrap().size, size_before);
}

#[test]
fn test_failing_source_at_registration_leaves_empty_files() {
    let source = Arc::new(StaticSource::new());
    source.set_failing(true);
    let fs = TableFs::with_tables(source.clone(), Owner::default(), ["users"]).unwrap();

    assert_eq!(fs.attributes("/users.json").unwrap().size, 0);
    assert!(read_all(&fs, "/users.json").is_empty());

    source.set_failing(false);
    source
        .set_table("users", rows(json!([{"name": "root", "uid": 0}])))
        .unwrap();
    assert_eq!(read_all(&fs, "/users.json"), br#"[{"name":"root","uid":0}]"#);
}

#[test]
fn test_materialization_discards_writes() {
    let (_source, fs) = users_fs();
    let written = fs.write("/users.json", b"garbage", 0).unwrap();
    assert_eq!(written, 7);
    assert_eq!(read_all(&fs, "/users.json"), br#"[{"name":"root","uid":0}]"#);
}

#[test]
fn test_written_bytes_survive_while_source_fails() {
    let (source, fs) = users_fs();
    fs.truncate("/users.json", 0).unwrap();
    fs.write("/users.json", b"local", 0).unwrap();

    source.set_failing(true);
    assert_eq!(read_all(&fs, "/users.json"), b"local");
}

#[test]
fn test_empty_table_reads_as_empty_array() {
    let source = StaticSource::new().with_table("empty", Vec::new());
    let fs = TableFs::with_tables(source, Owner::default(), ["empty"]).unwrap();
    assert_eq!(read_all(&fs, "/empty.json"), b"[]");

    let bytes = read_all(&fs, "/empty.arrow");
    let reader = FileReader::try_new(Cursor::new(bytes), None).unwrap();
    assert!(reader.schema().fields().is_empty());
}

#[test]
fn test_created_table_path_is_bound() {
    let source = Arc::new(
        StaticSource::new().with_table("late", rows(json!([{"x": true}]))),
    );
    let fs = TableFs::new(source.clone());
    fs.create("/late.json", 0o644).unwrap();
    assert_eq!(read_all(&fs, "/late.json"), br#"[{"x":true}]"#);
    assert_eq!(source.calls(), 1);
}

#[test]
fn test_unbound_path_is_served_from_buffer() {
    let source = Arc::new(StaticSource::new());
    let fs = TableFs::new(source.clone());
    fs.create("/notes.txt", 0o644).unwrap();
    fs.write("/notes.txt", b"kept", 0).unwrap();

    assert_eq!(read_all(&fs, "/notes.txt"), b"kept");
    assert_eq!(source.calls(), 0);
}

#[test]
fn test_register_rejects_bad_names() {
    let fs = empty_fs();
    assert!(matches!(fs.register_table(""), Err(Error::InvalidPath(_))));
    assert!(matches!(fs.register_table("a/b"), Err(Error::InvalidPath(_))));
    assert_eq!(fs.readdir("/").unwrap().len(), 2);
}

#[test]
fn test_read_unknown_path_is_not_found() {
    let fs = empty_fs();
    assert!(matches!(
        fs.read("/missing.json", 10, 0),
        Err(Error::NotFound(p)) if p == "/missing.json"
    ));
}
