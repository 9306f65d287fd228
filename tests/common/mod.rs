//! Common test utilities for rust-csdl tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rust_csdl::{BatchOptions, ConvertOptions, CsdlDocument};
use serde_json::Value;
use tempfile::TempDir;

/// Test context with temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub work_dir: PathBuf,
}

impl TestContext {
    /// Create an empty test context
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let work_dir = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            work_dir,
        }
    }

    /// Create a new test context by copying a fixture to a temp directory
    pub fn with_fixture(fixture_name: &str) -> Self {
        let ctx = Self::new();
        copy_dir_recursive(&fixture_path(fixture_name), &ctx.work_dir).expect("Failed to copy fixture");
        ctx
    }

    /// Path of the fixture's metadata document
    pub fn metadata_path(&self) -> PathBuf {
        self.work_dir.join("metadata.xml")
    }

    /// Write a metadata document into the work directory
    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.work_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Convert the fixture's metadata document with default options
    pub fn convert(&self) -> CsdlDocument {
        self.convert_with(&ConvertOptions::default())
    }

    pub fn convert_with(&self, options: &ConvertOptions) -> CsdlDocument {
        rust_csdl::convert_file(&self.metadata_path(), options)
            .unwrap_or_else(|e| panic!("Conversion failed: {:#}", e))
    }

    /// Batch options over the given inputs, relative to the work directory
    pub fn batch(&self, inputs: &[&str]) -> BatchOptions {
        BatchOptions {
            inputs: inputs
                .iter()
                .map(|i| self.work_dir.join(i).to_string_lossy().into_owned())
                .collect(),
            output_dir: None,
            pretty: true,
            verbose: false,
        }
    }
}

/// Get the path to a test fixture
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Read a written JSON document
pub fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("Failed to read output");
    serde_json::from_str(&text).expect("Output is not valid JSON")
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)?;
    }

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}
