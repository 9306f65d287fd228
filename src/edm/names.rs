//! Name, path and target normalization
//!
//! CSDL XML lets documents refer to a namespace either by its full name or by an alias
//! declared on a `Schema` or `edmx:Include`. The normalized document uses one spelling
//! per kind of reference: type and target references use the full namespace, annotation
//! terms use the document's alias for the vocabulary when it has one.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

/// Name of the primitive type assumed when `Type` is absent.
pub const DEFAULT_PRIMITIVE: &str = "Edm.String";
/// Underlying type assumed for enumerations.
pub const DEFAULT_ENUM_UNDERLYING: &str = "Edm.Int32";

/// Vocabulary hosting locations that publish `.json` siblings of their `.xml` files.
const JSON_HOSTED_VOCABULARIES: &[&str] = &[
    "https://oasis-tcs.github.io/odata-vocabularies/vocabularies/",
    "https://sap.github.io/odata-vocabularies/vocabularies/",
];

/// Alias ↔ namespace bindings of one document.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
    preferred: HashMap<String, String>,
    namespaces: HashSet<String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a namespace declared or included by the document.
    pub fn declare(&mut self, namespace: &str, alias: Option<&str>) {
        self.namespaces.insert(namespace.to_string());
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            self.aliases
                .entry(alias.to_string())
                .or_insert_with(|| namespace.to_string());
            self.preferred
                .entry(namespace.to_string())
                .or_insert_with(|| alias.to_string());
        }
    }

    /// Namespace an alias stands for; anything else is returned unchanged.
    pub fn resolve_namespace<'a>(&'a self, prefix: &'a str) -> &'a str {
        self.aliases.get(prefix).map(String::as_str).unwrap_or(prefix)
    }

    /// First alias the document declared for `namespace`.
    pub fn alias_of(&self, namespace: &str) -> Option<&str> {
        self.preferred.get(namespace).map(String::as_str)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// True if the document declares or includes `namespace`.
    pub fn knows_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// `Alias.Name` → `Namespace.Name`, also inside `Collection(...)`.
    pub fn qualified_name(&self, name: &str) -> String {
        let (collection, inner) = strip_collection(name);
        let normalized = match split_qualified(inner) {
            Some((prefix, simple)) if self.is_alias(prefix) => {
                format!("{}.{}", self.resolve_namespace(prefix), simple)
            }
            _ => inner.to_string(),
        };
        if collection {
            format!("Collection({})", normalized)
        } else {
            normalized
        }
    }

    /// Term name in annotation-key form, qualifier preserved: `Core.Description#Q`.
    pub fn term_name(&self, term: &str) -> String {
        let (name, qualifier) = match term.split_once('#') {
            Some((name, qualifier)) => (name, Some(qualifier)),
            None => (term, None),
        };
        let normalized = match split_qualified(name) {
            Some((prefix, simple)) => {
                let namespace = self.resolve_namespace(prefix);
                match self.alias_of(namespace) {
                    Some(alias) => format!("{}.{}", alias, simple),
                    None => format!("{}.{}", namespace, simple),
                }
            }
            None => name.to_string(),
        };
        match qualifier {
            Some(q) => format!("{}#{}", normalized, q),
            None => normalized,
        }
    }

    /// Full namespace form of a term, used to recognize well-known terms.
    pub fn term_namespace_form(&self, term: &str) -> String {
        let name = term.split('#').next().unwrap_or(term);
        self.qualified_name(name)
    }

    /// Normalize an annotation target or model path segment by segment.
    pub fn target(&self, target: &str) -> String {
        split_top_level(target, '/')
            .into_iter()
            .map(|segment| self.segment(segment))
            .collect::<Vec<_>>()
            .join("/")
    }

    fn segment(&self, segment: &str) -> String {
        if let Some(term) = segment.strip_prefix('@') {
            return format!("@{}", self.term_name(term));
        }
        if let (Some(open), true) = (segment.find('('), segment.ends_with(')')) {
            let name = &segment[..open];
            // Collection(...) is a type, not an overload signature
            if name != "Collection" {
                let params = &segment[open + 1..segment.len() - 1];
                let params: Vec<String> = split_top_level(params, ',')
                    .into_iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| self.qualified_name(p.trim()))
                    .collect();
                return format!("{}({})", self.qualified_name(name), params.join(","));
            }
        }
        self.qualified_name(segment)
    }
}

static SIMPLE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{Nl}_][\p{L}\p{Nl}\p{Nd}\p{Mn}\p{Mc}\p{Pc}\p{Cf}]{0,127}$")
        .expect("Invalid identifier regex")
});

/// True if `name` is a CSDL SimpleIdentifier (at most 128 characters).
pub fn is_simple_identifier(name: &str) -> bool {
    SIMPLE_IDENTIFIER.is_match(name)
}

/// Split `Namespace.Name` at its last dot.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.rsplit_once('.')
        .filter(|(prefix, simple)| !prefix.is_empty() && !simple.is_empty())
}

/// `Collection(T)` → `(true, T)`; anything else → `(false, name)`.
pub fn strip_collection(name: &str) -> (bool, &str) {
    match name
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, name),
    }
}

/// Primitive types renamed in CSDL 4.0.
pub fn upgrade_legacy_primitive(name: &str) -> &str {
    match name {
        "Edm.DateTime" => "Edm.DateTimeOffset",
        "Edm.Time" => "Edm.TimeOfDay",
        "Edm.Float" => "Edm.Single",
        other => other,
    }
}

/// Point well-known hosted vocabularies at their JSON rendition.
pub fn normalize_reference_uri(uri: &str) -> String {
    let hosted = JSON_HOSTED_VOCABULARIES
        .iter()
        .any(|prefix| uri.starts_with(prefix));
    match uri.strip_suffix(".xml") {
        Some(stem) if hosted => format!("{}.json", stem),
        _ => uri.to_string(),
    }
}

/// `NS.Color/Red NS.Color/Blue` → `Red,Blue`
pub fn enum_member_value(text: &str) -> String {
    text.split_whitespace()
        .map(|member| member.rsplit('/').next().unwrap_or(member))
        .collect::<Vec<_>>()
        .join(",")
}

/// Split at `separator` where it is not nested inside parentheses.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
