//! tests/api/helpers.rs
use std::fs;
use std::path::{Path, PathBuf};

use wclite::{Context, ContextConfig};

pub fn test_data_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("data");
    path
}

pub fn local_context() -> Context {
    Context::acquire(ContextConfig::local(2)).expect("Failed to acquire execution context")
}

pub fn write_input(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(&path, text).expect("Failed to write input file");
    path
}

/// Names of the visible files plus the marker, in name order.
pub fn output_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to list output directory")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn as_str(path: &Path) -> &str {
    path.to_str().expect("Non UTF-8 temp path")
}
