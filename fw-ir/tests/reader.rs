use std::fs;
use std::path::Path;

use fw_ir::{ArtifactLayout, IrReader};
use tempfile::tempdir;

fn write_input(root: &Path, index: usize, text: &str) {
    let path = ArtifactLayout::default().input_path(root, index);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, text).expect("write input");
}

#[test]
fn reads_contiguous_inputs_in_order() {
    let dir = tempdir().expect("tempdir");
    write_input(dir.path(), 0, "BIND:eth0;10.0.0.0/24\n");
    write_input(dir.path(), 1, "OPTION:logging;no\n");

    let reader = IrReader::new(dir.path(), ArtifactLayout::default());
    let outcome = reader.read_all();

    assert_eq!(outcome.count(), 2);
    assert_eq!(
        outcome.texts(),
        vec!["BIND:eth0;10.0.0.0/24\n", "OPTION:logging;no\n"]
    );
    assert_eq!(outcome.configurations[1].index, 1);
}

#[test]
fn stops_at_first_missing_index() {
    let dir = tempdir().expect("tempdir");
    write_input(dir.path(), 0, "a:b");
    write_input(dir.path(), 2, "c:d");

    let outcome = IrReader::new(dir.path(), ArtifactLayout::default()).read_all();
    assert_eq!(outcome.count(), 1);
    assert_eq!(outcome.texts(), vec!["a:b"]);
}

#[test]
fn directory_in_place_of_input_ends_enumeration() {
    let dir = tempdir().expect("tempdir");
    let layout = ArtifactLayout::default();
    write_input(dir.path(), 0, "a:b");
    fs::create_dir_all(layout.input_path(dir.path(), 1)).expect("mkdir");
    write_input(dir.path(), 2, "c:d");

    let outcome = IrReader::new(dir.path(), layout).read_all();
    assert_eq!(outcome.texts(), vec!["a:b"]);
}

#[test]
fn missing_input_directory_yields_nothing() {
    let dir = tempdir().expect("tempdir");
    let outcome = IrReader::new(dir.path(), ArtifactLayout::default()).read_all();
    assert_eq!(outcome.count(), 0);
}

#[test]
fn unreadable_input_is_skipped_without_breaking_numbering() {
    let dir = tempdir().expect("tempdir");
    write_input(dir.path(), 0, "a:0");
    let unreadable = ArtifactLayout::default().input_path(dir.path(), 1);
    fs::write(&unreadable, [0xff, 0xfe, 0x00, 0xc3]).expect("write invalid utf-8");
    write_input(dir.path(), 2, "a:2");

    let outcome = IrReader::new(dir.path(), ArtifactLayout::default()).read_all();
    let indices: Vec<usize> = outcome.configurations.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 2]);
}

#[test]
fn iteration_is_restartable() {
    let dir = tempdir().expect("tempdir");
    write_input(dir.path(), 0, "x:y");

    let reader = IrReader::new(dir.path(), ArtifactLayout::default());
    assert_eq!(reader.iter().count(), 1);
    assert_eq!(reader.iter().count(), 1);
}
