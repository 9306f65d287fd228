//! rust-csdl: OData CSDL XML to CSDL JSON conversion
//!
//! This library reads metadata documents in any of the three CSDL XML generations
//! (V2 and V3 EDMX, CSDL 4.0/4.01) and produces one normalized, versionless CSDL JSON
//! document per input.

pub mod edm;
pub mod error;
pub mod input;
pub mod model;
pub mod parser;
pub mod util;

use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

pub use error::{ConversionError, CsdlError, ErrorCategory, ErrorKind, SourceSpan};
pub use model::{CsdlDocument, LINE_KEY};

/// Options for converting a single document
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Add `@parser.line` to every constructed node
    pub include_line_numbers: bool,
    /// Keep attributes in unrecognized namespaces as `@<alias>.<name>` annotations
    pub include_foreign_markup_as_annotations: bool,
    /// Reject unexpected attributes, missing mandatory children and invalid names
    pub strict: bool,
}

/// Options for converting many files
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Files, directories or glob patterns
    pub inputs: Vec<String>,
    /// Directory for the `.json` outputs (defaults to next to each input)
    pub output_dir: Option<PathBuf>,
    /// Pretty-print the JSON output
    pub pretty: bool,
    /// Enable verbose output
    pub verbose: bool,
}

/// Minimum number of files to benefit from parallel conversion.
const PARALLEL_THRESHOLD: usize = 4;

/// Convert CSDL XML text.
pub fn convert_str(xml: &str, options: &ConvertOptions) -> Result<CsdlDocument, ConversionError> {
    let events = parser::read_events(xml)?;
    convert_events(&events, options)
}

/// Convert an already tokenized event stream.
pub fn convert_events(
    events: &[parser::XmlEvent],
    options: &ConvertOptions,
) -> Result<CsdlDocument, ConversionError> {
    // Pass 1: aliases and legacy associations
    let index = edm::associations::prescan(events)?;
    debug!(
        version = %index.version,
        navigation_properties = index.navigation_count(),
        "prescan complete"
    );

    // Pass 2: validate and build
    let document = model::build_document(events, &index, options)?;
    debug!(schemas = document.schemas().count(), "document built");
    Ok(document)
}

/// Read and convert one file.
pub fn convert_file(path: &Path, options: &ConvertOptions) -> Result<CsdlDocument> {
    let xml = input::read_input(path)?;
    let document = convert_str(&xml, options).map_err(|source| CsdlError::ConversionFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(document)
}

/// Convert every input to a `.json` file and return the written paths.
pub fn convert_paths(options: &BatchOptions, convert: &ConvertOptions) -> Result<Vec<PathBuf>> {
    let files = input::collect_inputs(&options.inputs)?;

    if options.verbose {
        println!("Found {} metadata files", files.len());
    }

    if let Some(dir) = &options.output_dir {
        std::fs::create_dir_all(dir).map_err(|e| CsdlError::OutputWriteError {
            path: dir.clone(),
            source: e,
        })?;
    }

    let results: Vec<Result<PathBuf>> = if files.len() >= PARALLEL_THRESHOLD {
        files
            .par_iter()
            .map(|file| convert_to_json_file(file, options, convert))
            .collect()
    } else {
        files
            .iter()
            .map(|file| convert_to_json_file(file, options, convert))
            .collect()
    };

    // Propagate the first error, if any
    let mut written = Vec::with_capacity(results.len());
    for result in results {
        written.push(result?);
    }

    if options.verbose {
        println!("Converted {} files", written.len());
    }

    Ok(written)
}

fn convert_to_json_file(
    file: &Path,
    options: &BatchOptions,
    convert: &ConvertOptions,
) -> Result<PathBuf> {
    let document = convert_file(file, convert)?;
    let output_path = input::output_path(file, options.output_dir.as_deref());
    let json = document.to_json_string(options.pretty)?;
    std::fs::write(&output_path, json).map_err(|e| CsdlError::OutputWriteError {
        path: output_path.clone(),
        source: e,
    })?;

    if options.verbose {
        println!("{} -> {}", file.display(), output_path.display());
    }

    Ok(output_path)
}
