//! Turn CSDL XML text into the structural event stream
//!
//! Namespace prefixes are resolved here so that the later passes only ever compare
//! namespace URIs. Every event carries the line/column of its first byte and the
//! literal source text of the tag, which is what conversion errors point at.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::{ConversionError, ErrorKind, SourceSpan};
use crate::util::LineIndex;

use super::events::{EndElement, StartElement, TextContent, XmlAttribute, XmlEvent};

/// Longest text excerpt kept in a span for character data.
const MAX_TEXT_EXCERPT: usize = 80;

/// Read a complete document into events.
pub fn read_events(xml: &str) -> Result<Vec<XmlEvent>, ConversionError> {
    let index = LineIndex::new(xml);
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut events = Vec::new();
    // innermost last; quick-xml itself only checks end names, not missing ends
    let mut open: Vec<(String, SourceSpan)> = Vec::new();
    loop {
        let start = reader.buffer_position() as usize;
        let (namespace, event) = match reader.read_resolved_event() {
            Ok((resolved, event)) => (owned_namespace(resolved), event),
            Err(e) => {
                let offset = reader.error_position() as usize;
                return Err(malformed(e.to_string()).at(&span(xml, &index, offset, offset)));
            }
        };
        let end = reader.buffer_position() as usize;
        let span = span(xml, &index, start, end);

        match event {
            Event::Start(e) => {
                let element = start_element(&reader, namespace, &e, span)?;
                open.push((element.name.clone(), element.span.clone()));
                events.push(XmlEvent::Start(element));
            }
            Event::Empty(e) => {
                let element = start_element(&reader, namespace, &e, span.clone())?;
                let name = element.name.clone();
                events.push(XmlEvent::Start(element));
                events.push(XmlEvent::End(EndElement { name, span }));
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                open.pop();
                events.push(XmlEvent::End(EndElement { name, span }));
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| malformed(e.to_string()).at(&span))?;
                push_text(&mut events, text.into_owned(), span);
            }
            Event::CData(c) => {
                let text = String::from_utf8(c.into_inner().into_owned())
                    .map_err(|e| malformed(e.to_string()).at(&span))?;
                push_text(&mut events, text, span);
            }
            Event::Eof => {
                if let Some((name, span)) = open.pop() {
                    return Err(malformed(format!(
                        "unexpected end of input: <{name}> is never closed"
                    ))
                    .at(&span));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(events)
}

fn malformed(message: String) -> ErrorKind {
    ErrorKind::MalformedXml { message }
}

fn span(xml: &str, index: &LineIndex, start: usize, end: usize) -> SourceSpan {
    let (line, column) = index.position(xml, start);
    let text = xml.get(start..end).unwrap_or("").trim();
    let text = if text.chars().count() > MAX_TEXT_EXCERPT {
        text.chars().take(MAX_TEXT_EXCERPT).collect()
    } else {
        text.to_string()
    };
    SourceSpan { line, column, text }
}

/// Adjacent character data (text split by CDATA sections) is merged into one event.
fn push_text(events: &mut Vec<XmlEvent>, text: String, span: SourceSpan) {
    if let Some(XmlEvent::Text(previous)) = events.last_mut() {
        previous.text.push_str(&text);
        return;
    }
    events.push(XmlEvent::Text(TextContent { text, span }));
}

/// Namespace URI of a resolved name, or the undeclared prefix.
type OwnedNamespace = Result<Option<String>, Vec<u8>>;

fn owned_namespace(resolved: ResolveResult<'_>) -> OwnedNamespace {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(prefix),
    }
}

fn check_namespace(
    namespace: OwnedNamespace,
    qname: &[u8],
    span: &SourceSpan,
) -> Result<Option<String>, ConversionError> {
    namespace.map_err(|prefix| {
        malformed(format!(
            "undeclared namespace prefix '{}' in '{}'",
            String::from_utf8_lossy(&prefix),
            String::from_utf8_lossy(qname)
        ))
        .at(span)
    })
}

fn start_element(
    reader: &NsReader<&[u8]>,
    namespace: OwnedNamespace,
    e: &BytesStart<'_>,
    span: SourceSpan,
) -> Result<StartElement, ConversionError> {
    let namespace = check_namespace(namespace, e.name().as_ref(), &span)?;
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let prefix = e
        .name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(err.to_string()).at(&span))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (attr_resolved, local) = reader.resolve_attribute(attr.key);
        let attr_namespace = check_namespace(owned_namespace(attr_resolved), attr.key.as_ref(), &span)?;
        let value: Cow<'_, str> = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| malformed(err.to_string()).at(&span))?;
        attributes.push(XmlAttribute {
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            namespace: attr_namespace,
            prefix: attr
                .key
                .prefix()
                .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
            value: value.into_owned(),
        });
    }

    Ok(StartElement {
        name,
        namespace,
        prefix,
        attributes,
        span,
    })
}
