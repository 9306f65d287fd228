//! Input discovery and decoding

use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;
use tracing::debug;

use crate::error::CsdlError;

/// File extensions picked up when an input is a directory.
const METADATA_EXTENSIONS: &[&str] = &["xml", "edmx"];

/// Expand input arguments into metadata files.
///
/// Each input is a file, a directory (searched recursively for `.xml` and `.edmx`
/// files) or a glob pattern. The result is sorted and free of duplicates.
pub fn collect_inputs(inputs: &[String]) -> Result<Vec<PathBuf>, CsdlError> {
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && is_metadata_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if input.contains(['*', '?', '[']) {
            let paths = glob::glob(input).map_err(|e| CsdlError::InputPatternError {
                pattern: input.clone(),
                message: e.to_string(),
            })?;
            files.extend(paths.filter_map(|p| p.ok()).filter(|p| p.is_file()));
        } else {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    debug!(count = files.len(), "collected input files");
    Ok(files)
}

fn is_metadata_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            METADATA_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Read a metadata file as text, trying UTF-8 first, then Windows-1252 as fallback
pub fn read_input(path: &Path) -> Result<String, CsdlError> {
    let bytes = std::fs::read(path).map_err(|e| CsdlError::InputReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    decode(&bytes).ok_or_else(|| CsdlError::InputDecodeError {
        path: path.to_path_buf(),
    })
}

/// Decode document bytes; a UTF-8 byte order mark is dropped.
pub fn decode(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(_) => {
            let (decoded, _, had_errors) = WINDOWS_1252.decode(bytes);
            if had_errors {
                None
            } else {
                Some(decoded.into_owned())
            }
        }
    }
}

/// Output file for `input`: same stem with a `.json` extension, in `output_dir` if set.
pub fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let json = input.with_extension("json");
    match (output_dir, json.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => json,
    }
}
