//! Normalized document building

mod builder;
mod document;
mod expressions;

pub use builder::{build_document, TreeBuilder, LINE_KEY};
pub use document::CsdlDocument;
