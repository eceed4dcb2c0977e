mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildrelay::diagnostics::{
    source_map_path, Remapper, SourceLocation, SourceMap, SourceMapError,
};
use buildrelay::fs::MockFileSystem;
use buildrelay_test_utils::builders::SourceMapBuilder;
use common::{init_tracing, TestResult};

const GENERATED: &str = "/project/build/generated/Main.kt";
const MAP: &str = "/project/build/generated/.Main.sourcemap";

fn remapper_with(map_json: &str) -> (MockFileSystem, Remapper) {
    let fs = MockFileSystem::new();
    fs.add_file(MAP, map_json);
    let remapper = Remapper::new(Arc::new(fs.clone()));
    (fs, remapper)
}

fn at_line(line: u32) -> SourceLocation {
    SourceLocation::new(GENERATED, line, 1)
}

#[test]
fn map_sits_beside_the_generated_file() {
    assert_eq!(
        source_map_path(Path::new(GENERATED), ".sourcemap"),
        PathBuf::from(MAP)
    );
    assert_eq!(
        source_map_path(Path::new("Foo.kt"), ".map.json"),
        PathBuf::from(".Foo.map.json")
    );
}

#[test]
fn wire_format_is_camel_case() -> TestResult {
    let json = r#"{
        "entries": [
            {
                "sourceFile": { "path": "/src/main.swift" },
                "sourceRange": { "start": { "line": 3, "column": 5 }, "end": { "line": 3, "column": 20 } },
                "range": { "start": { "line": 10, "column": 1 }, "end": { "line": 15, "column": 1 } }
            },
            {
                "sourceFile": { "path": "/src/main.swift" },
                "range": { "start": { "line": 16, "column": 1 }, "end": { "line": 16, "column": 9 } }
            }
        ]
    }"#;
    let map = SourceMap::parse(Path::new(MAP), json)?;
    assert_eq!(map.entries.len(), 2);
    assert!(map.entries[1].source_range.is_none());

    let resolved = map.resolve(12, None).expect("line 12 is covered");
    assert_eq!(resolved, SourceLocation::new("/src/main.swift", 3, 5));
    Ok(())
}

#[test]
fn covered_line_resolves_and_uncovered_does_not() {
    init_tracing();
    let json = SourceMapBuilder::new()
        .entry("/src/main.swift", 10, 15, 3, 1)
        .to_json();
    let (_fs, remapper) = remapper_with(&json);

    let resolved = remapper.remap(&at_line(12)).expect("line 12 maps");
    assert_eq!(resolved.line, 3);
    assert_eq!(resolved.path, PathBuf::from("/src/main.swift"));

    assert!(remapper.remap(&at_line(20)).is_none());
}

#[test]
fn range_ends_are_inclusive() {
    let map = SourceMapBuilder::new().entry("/s.swift", 10, 15, 3, 1).build();
    assert!(map.lookup(10).is_some());
    assert!(map.lookup(15).is_some());
    assert!(map.lookup(9).is_none());
    assert!(map.lookup(16).is_none());
}

#[test]
fn narrowest_range_wins() {
    let map = SourceMapBuilder::new()
        .entry("/s.swift", 1, 100, 1, 1)
        .entry("/s.swift", 12, 13, 9, 1)
        .entry("/s.swift", 10, 20, 5, 1)
        .build();
    assert_eq!(map.resolve(12, None).map(|l| l.line), Some(9));
    assert_eq!(map.resolve(18, None).map(|l| l.line), Some(5));
    assert_eq!(map.resolve(50, None).map(|l| l.line), Some(1));
}

#[test]
fn identical_ranges_keep_the_first_entry() {
    let map = SourceMapBuilder::new()
        .entry("/first.swift", 5, 8, 2, 1)
        .entry("/second.swift", 5, 8, 7, 1)
        .build();
    let resolved = map.resolve(6, None).unwrap();
    assert_eq!(resolved.path, PathBuf::from("/first.swift"));
    assert_eq!(resolved.line, 2);
}

#[test]
fn entries_without_source_range_are_skipped() {
    let map = SourceMapBuilder::new()
        .entry("/s.swift", 1, 50, 4, 1)
        .unmapped("/s.swift", 10, 10)
        .build();
    assert_eq!(map.resolve(10, None).map(|l| l.line), Some(4));

    let only_unmapped = SourceMapBuilder::new().unmapped("/s.swift", 1, 50).build();
    assert!(only_unmapped.resolve(10, None).is_none());
}

#[test]
fn missing_map_is_not_an_error() -> TestResult {
    let fs = MockFileSystem::new();
    let remapper = Remapper::new(Arc::new(fs));
    assert!(remapper.try_remap(&at_line(1))?.is_none());
    Ok(())
}

#[test]
fn malformed_map_is_reported_then_ignored() {
    init_tracing();
    let (_fs, remapper) = remapper_with("{ not json");
    assert!(matches!(
        remapper.try_remap(&at_line(1)),
        Err(SourceMapError::Json { .. })
    ));
    assert!(remapper.remap(&at_line(1)).is_none());
}

#[test]
fn relative_source_paths_resolve_against_the_map_directory() {
    let json = SourceMapBuilder::new()
        .entry("../../src/App.swift", 1, 5, 2, 3)
        .to_json();
    let (_fs, remapper) = remapper_with(&json);
    let resolved = remapper.remap(&at_line(4)).unwrap();
    assert_eq!(
        resolved.path,
        PathBuf::from("/project/build/generated/../../src/App.swift")
    );
    assert_eq!((resolved.line, resolved.column), (2, 3));
}

#[test]
fn map_is_reloaded_on_every_lookup() {
    let first = SourceMapBuilder::new().entry("/s.swift", 1, 10, 1, 1).to_json();
    let (fs, remapper) = remapper_with(&first);
    assert_eq!(remapper.remap(&at_line(5)).map(|l| l.line), Some(1));

    let second = SourceMapBuilder::new().entry("/s.swift", 1, 10, 42, 1).to_json();
    fs.add_file(MAP, second);
    assert_eq!(remapper.remap(&at_line(5)).map(|l| l.line), Some(42));
}

#[test]
fn custom_suffix_changes_the_map_name() {
    let fs = MockFileSystem::new();
    let json = SourceMapBuilder::new().entry("/s.swift", 1, 10, 7, 1).to_json();
    fs.add_file("/project/build/generated/.Main.map", json);

    let default = Remapper::new(Arc::new(fs.clone()));
    assert!(default.remap(&at_line(5)).is_none());

    let custom = Remapper::new(Arc::new(fs)).with_suffix(".map");
    assert_eq!(custom.suffix(), ".map");
    assert_eq!(custom.remap(&at_line(5)).map(|l| l.line), Some(7));
}
