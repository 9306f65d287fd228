//! Integration tests for inputs that hold no complete document
//!
//! Conversion is all-or-nothing: an input without an `edmx:Edmx` root or one that
//! ends inside an element fails instead of producing an empty document.

use pretty_assertions::assert_eq;
use rust_csdl::{convert_paths, convert_str, ConversionError, ConvertOptions, ErrorCategory, ErrorKind};

use crate::common::TestContext;

const TRUNCATED: &str = r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="NS" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EntityType Name="T">
        <Key><PropertyRef Name="ID"/></Key>
        <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
      </EntityType>
      <EntityType Name="U">"#;

fn fails(xml: &str, options: &ConvertOptions) -> ConversionError {
    match convert_str(xml, options) {
        Ok(doc) => panic!("Expected conversion to fail, got {}", doc.into_json()),
        Err(e) => e,
    }
}

fn strict() -> ConvertOptions {
    ConvertOptions {
        strict: true,
        ..ConvertOptions::default()
    }
}

// ============================================================================
// Missing root
// ============================================================================

#[test]
fn test_empty_input_fails() {
    let err = fails("", &ConvertOptions::default());
    assert_eq!(
        err.kind,
        ErrorKind::NotEdmxRoot {
            element: String::new()
        }
    );
    assert_eq!(err.category(), ErrorCategory::Structural);
    assert_eq!((err.span.line, err.span.column), (1, 1));
    assert_eq!(
        err.to_string(),
        "Root element must be edmx:Edmx, found no element at line 1, column 1: ``"
    );
}

#[test]
fn test_text_only_input_fails() {
    let err = fails("hello world", &ConvertOptions::default());
    assert!(matches!(err.kind, ErrorKind::NotEdmxRoot { .. }));
    assert_eq!(err.span.text, "hello world");
}

#[test]
fn test_whitespace_only_input_fails_in_strict_mode() {
    let err = fails("\n   \n", &strict());
    assert!(matches!(err.kind, ErrorKind::NotEdmxRoot { .. }));
}

// ============================================================================
// Truncated documents
// ============================================================================

#[test]
fn test_truncated_document_fails() {
    let err = fails(TRUNCATED, &strict());
    assert!(matches!(err.kind, ErrorKind::MalformedXml { .. }));
    assert_eq!(err.category(), ErrorCategory::Syntax);
    // innermost unclosed element
    assert_eq!(err.span.line, 8);
    assert_eq!(err.span.text, r#"<EntityType Name="U">"#);
}

#[test]
fn test_truncated_document_fails_without_strict_mode() {
    let err = fails(TRUNCATED, &ConvertOptions::default());
    assert!(matches!(err.kind, ErrorKind::MalformedXml { .. }));
}

#[test]
fn test_truncated_file_writes_no_output() {
    let ctx = TestContext::new();
    ctx.write_file("cut.xml", TRUNCATED);

    let result = convert_paths(&ctx.batch(&["cut.xml"]), &ConvertOptions::default());
    assert!(result.is_err());
    assert!(!ctx.work_dir.join("cut.json").exists());
}
