//! Structural XML events consumed by both conversion passes

use crate::error::SourceSpan;

/// An attribute with its namespace resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Local name
    pub name: String,
    /// Namespace URI, `None` for unprefixed attributes
    pub namespace: Option<String>,
    /// Prefix as written in the source
    pub prefix: Option<String>,
    pub value: String,
}

/// An element start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    /// Local name
    pub name: String,
    /// Namespace URI of the element, `None` if it has none
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    /// Attributes in document order, namespace declarations excluded
    pub attributes: Vec<XmlAttribute>,
    pub span: SourceSpan,
}

impl StartElement {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            prefix: None,
            attributes: Vec::new(),
            span: SourceSpan::default(),
        }
    }

    /// Add an unprefixed attribute.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(XmlAttribute {
            name: name.to_string(),
            namespace: None,
            prefix: None,
            value: value.to_string(),
        });
        self
    }

    /// Add an attribute bound to `namespace`.
    pub fn with_ns_attribute(mut self, prefix: &str, namespace: &str, name: &str, value: &str) -> Self {
        self.attributes.push(XmlAttribute {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            prefix: Some(prefix.to_string()),
            value: value.to_string(),
        });
        self
    }

    /// Value of the unprefixed attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Value of attribute `name` in `namespace`.
    pub fn attribute_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

/// An element end tag (also synthesized for empty elements).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndElement {
    pub name: String,
    pub span: SourceSpan,
}

/// Character data, entity references already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    pub text: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    Start(StartElement),
    End(EndElement),
    Text(TextContent),
}

impl XmlEvent {
    pub fn span(&self) -> &SourceSpan {
        match self {
            XmlEvent::Start(e) => &e.span,
            XmlEvent::End(e) => &e.span,
            XmlEvent::Text(t) => &t.span,
        }
    }
}
