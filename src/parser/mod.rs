//! CSDL XML event parsing

mod events;
mod xml_reader;

pub use events::{EndElement, StartElement, TextContent, XmlAttribute, XmlEvent};
pub use xml_reader::read_events;
