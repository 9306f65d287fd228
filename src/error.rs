//! Error types for rust-csdl

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Location of the construct an error refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSpan {
    /// 1-based line of the first byte of the construct
    pub line: usize,
    /// 1-based column (in characters) of the first byte of the construct
    pub column: usize,
    /// Literal source text of the construct (the start tag for elements)
    pub text: String,
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Broad classes of conversion failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The input is not well-formed XML
    Syntax,
    /// Illegal nesting, wrong namespace, cardinality or unexpected attribute
    Structural,
    /// A mandatory attribute or child is absent
    RequiredData,
    /// The input is well-formed but meaningless (unresolvable names, stray text, ...)
    Semantic,
    /// A construct of one dialect generation used inside another
    DialectMismatch,
}

/// What went wrong, without the position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Malformed XML: {message}")]
    MalformedXml { message: String },

    /// `element` is empty when the input holds no element at all
    #[error("Root element must be edmx:Edmx, found {}", found_root(.element))]
    NotEdmxRoot { element: String },

    #[error("Element <{child}> is not allowed in <{parent}>")]
    IllegalChild { parent: String, child: String },

    #[error("Element <{element}> is in namespace '{namespace}', expected '{expected}'")]
    WrongNamespace {
        element: String,
        namespace: String,
        expected: String,
    },

    #[error("Element <{parent}> allows at most {max} <{child}> child element(s)")]
    TooManyChildren {
        parent: String,
        child: String,
        max: u32,
    },

    #[error("Element <{parent}> requires at least {min} <{child}> child element(s), found {found}")]
    MissingChildren {
        parent: String,
        child: String,
        min: u32,
        found: u32,
    },

    #[error("Unexpected attribute '{attribute}' on <{element}>")]
    UnexpectedAttribute { element: String, attribute: String },

    #[error("Element <{element}> is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("Element <{element}> must not contain text, found '{text}'")]
    UnexpectedText { element: String, text: String },

    #[error("Element <{element}> is not supported in {generation} metadata")]
    DialectMismatch { element: String, generation: String },

    #[error("Navigation property '{element}' references unknown association '{association}'")]
    UnknownAssociation {
        element: String,
        association: String,
    },

    #[error("Association '{association}' has no end with role '{role}'")]
    UnknownRole { association: String, role: String },

    #[error(
        "Referential constraint of association '{association}' pairs {principal} principal \
         with {dependent} dependent properties"
    )]
    ReferentialConstraintMismatch {
        association: String,
        principal: usize,
        dependent: usize,
    },

    #[error("<{element} Name=\"{name}\"> of type Collection(Edm.EntityType) must not specify Nullable")]
    NullableOnEntityCollection { element: String, name: String },

    #[error("Collection-valued <{element} Name=\"{name}\"> must specify Nullable in version 4.01")]
    MissingCollectionNullable { element: String, name: String },

    #[error("Entity type '{type_name}' declares a key although it has base type '{base_type}'")]
    KeyOnDerivedType {
        type_name: String,
        base_type: String,
    },

    #[error("Schema '{namespace}' declares '{name}' more than once")]
    DuplicateMember { namespace: String, name: String },

    #[error("Invalid value '{value}' for attribute '{attribute}' on <{element}>: {reason}")]
    InvalidValue {
        element: String,
        attribute: String,
        value: String,
        reason: String,
    },
}

fn found_root(element: &str) -> String {
    if element.is_empty() {
        "no element".to_string()
    } else {
        format!("<{element}>")
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::MalformedXml { .. } => ErrorCategory::Syntax,
            ErrorKind::NotEdmxRoot { .. }
            | ErrorKind::IllegalChild { .. }
            | ErrorKind::WrongNamespace { .. }
            | ErrorKind::TooManyChildren { .. }
            | ErrorKind::UnexpectedAttribute { .. } => ErrorCategory::Structural,
            ErrorKind::MissingChildren { .. }
            | ErrorKind::MissingAttribute { .. }
            | ErrorKind::MissingCollectionNullable { .. } => ErrorCategory::RequiredData,
            ErrorKind::DialectMismatch { .. } => ErrorCategory::DialectMismatch,
            ErrorKind::UnexpectedText { .. }
            | ErrorKind::UnknownAssociation { .. }
            | ErrorKind::UnknownRole { .. }
            | ErrorKind::ReferentialConstraintMismatch { .. }
            | ErrorKind::NullableOnEntityCollection { .. }
            | ErrorKind::KeyOnDerivedType { .. }
            | ErrorKind::DuplicateMember { .. }
            | ErrorKind::InvalidValue { .. } => ErrorCategory::Semantic,
        }
    }

    /// Attach the position of the offending construct.
    pub fn at(self, span: &SourceSpan) -> ConversionError {
        ConversionError {
            kind: self,
            span: span.clone(),
        }
    }
}

/// The single error a failed conversion produces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at {span}: `{}`", .span.text)]
pub struct ConversionError {
    pub kind: ErrorKind,
    pub span: SourceSpan,
}

impl ConversionError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

/// Errors of the file-level API
#[derive(Error, Debug)]
pub enum CsdlError {
    #[error("Failed to read input file: {path}")]
    InputReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file {path} is neither UTF-8 nor Windows-1252 text")]
    InputDecodeError { path: PathBuf },

    #[error("Invalid input pattern '{pattern}': {message}")]
    InputPatternError { pattern: String, message: String },

    #[error("Failed to convert {path}")]
    ConversionFailed {
        path: PathBuf,
        #[source]
        source: ConversionError,
    },

    #[error("Failed to write output file: {path}")]
    OutputWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
