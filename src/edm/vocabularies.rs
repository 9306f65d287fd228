//! Legacy vocabulary upgrade
//!
//! SAP V2 services express capabilities and UI hints as `sap:` attributes. These are
//! rewritten into annotations of the standard vocabularies. Restrictions declared on
//! properties target the entity set, which is only known once the container has been
//! read, so they are queued per structured type and flushed after the pass.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::parser::StartElement;

use super::names::{normalize_reference_uri, AliasTable};
use super::{ElementKind, SAP_NS};

/// A vocabulary the upgrader can reference.
#[derive(Debug, PartialEq, Eq)]
pub struct Vocabulary {
    pub namespace: &'static str,
    pub alias: &'static str,
    pub uri: &'static str,
}

pub static CORE: Vocabulary = Vocabulary {
    namespace: "Org.OData.Core.V1",
    alias: "Core",
    uri: "https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Core.V1.json",
};
pub static CAPABILITIES: Vocabulary = Vocabulary {
    namespace: "Org.OData.Capabilities.V1",
    alias: "Capabilities",
    uri: "https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Capabilities.V1.json",
};
pub static VALIDATION: Vocabulary = Vocabulary {
    namespace: "Org.OData.Validation.V1",
    alias: "Validation",
    uri: "https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Validation.V1.json",
};
pub static MEASURES: Vocabulary = Vocabulary {
    namespace: "Org.OData.Measures.V1",
    alias: "Measures",
    uri: "https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Measures.V1.json",
};
pub static COMMON: Vocabulary = Vocabulary {
    namespace: "com.sap.vocabularies.Common.v1",
    alias: "Common",
    uri: "https://sap.github.io/odata-vocabularies/vocabularies/Common.json",
};

/// Elements a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeScope {
    EntitySet,
    Property,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fires only for this literal
    Equals(&'static str),
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl Literal {
    fn value(self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::from(i),
            Literal::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// Restriction lists collected from properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredList {
    NonFilterable,
    RequiredInFilter,
    NonSortable,
    FilterExpression,
}

#[derive(Debug, Clone, Copy)]
pub enum UpgradeAction {
    /// Set `property` of a restriction record on the entity set
    Restriction {
        term: &'static str,
        property: &'static str,
        value: bool,
    },
    /// Write constant annotations
    Constant(&'static [(&'static Vocabulary, &'static str, Literal)]),
    /// Annotation with the attribute text as value
    Text(&'static Vocabulary, &'static str),
    /// Annotation with a path to the named property as value
    Path(&'static Vocabulary, &'static str),
    Defer(DeferredList),
    /// Facet written on the property itself
    Facet(&'static str, Literal),
    DisplayFormat,
}

#[derive(Debug, Clone, Copy)]
pub struct UpgradeRule {
    pub attribute: &'static str,
    pub scope: UpgradeScope,
    pub trigger: Trigger,
    pub action: UpgradeAction,
}

const fn upgrade(
    attribute: &'static str,
    scope: UpgradeScope,
    trigger: Trigger,
    action: UpgradeAction,
) -> UpgradeRule {
    UpgradeRule {
        attribute,
        scope,
        trigger,
        action,
    }
}

const fn restriction(term: &'static str, property: &'static str, value: bool) -> UpgradeAction {
    UpgradeAction::Restriction {
        term,
        property,
        value,
    }
}

use Trigger::Equals;
use UpgradeScope::{EntitySet, Property};

static NOT_PAGEABLE: [(&Vocabulary, &str, Literal); 2] = [
    (&CAPABILITIES, "TopSupported", Literal::Bool(false)),
    (&CAPABILITIES, "SkipSupported", Literal::Bool(false)),
];

pub static RULES: &[UpgradeRule] = &[
    upgrade("creatable", EntitySet, Equals("false"), restriction("InsertRestrictions", "Insertable", false)),
    upgrade("updatable", EntitySet, Equals("false"), restriction("UpdateRestrictions", "Updatable", false)),
    upgrade("deletable", EntitySet, Equals("false"), restriction("DeleteRestrictions", "Deletable", false)),
    upgrade("searchable", EntitySet, Equals("true"), restriction("SearchRestrictions", "Searchable", true)),
    upgrade("countable", EntitySet, Equals("false"), restriction("CountRestrictions", "Countable", false)),
    upgrade("requires-filter", EntitySet, Equals("true"), restriction("FilterRestrictions", "RequiresFilter", true)),
    upgrade(
        "pageable",
        EntitySet,
        Equals("false"),
        UpgradeAction::Constant(&NOT_PAGEABLE),
    ),
    upgrade("filterable", Property, Equals("false"), UpgradeAction::Defer(DeferredList::NonFilterable)),
    upgrade("required-in-filter", Property, Equals("true"), UpgradeAction::Defer(DeferredList::RequiredInFilter)),
    upgrade("sortable", Property, Equals("false"), UpgradeAction::Defer(DeferredList::NonSortable)),
    upgrade("filter-restriction", Property, Trigger::Any, UpgradeAction::Defer(DeferredList::FilterExpression)),
    upgrade("display-format", Property, Trigger::Any, UpgradeAction::DisplayFormat),
    upgrade("validation-regexp", Property, Trigger::Any, UpgradeAction::Text(&VALIDATION, "Pattern")),
    upgrade("variable-scale", Property, Equals("true"), UpgradeAction::Facet("$Scale", Literal::Str("variable"))),
    upgrade("text", Property, Trigger::Any, UpgradeAction::Path(&COMMON, "Text")),
    upgrade("unit", Property, Trigger::Any, UpgradeAction::Path(&MEASURES, "Unit")),
    upgrade("field-control", Property, Trigger::Any, UpgradeAction::Path(&COMMON, "FieldControl")),
    upgrade("label", UpgradeScope::Any, Trigger::Any, UpgradeAction::Text(&COMMON, "Label")),
    upgrade("heading", UpgradeScope::Any, Trigger::Any, UpgradeAction::Text(&COMMON, "Heading")),
    upgrade("quickinfo", UpgradeScope::Any, Trigger::Any, UpgradeAction::Text(&COMMON, "QuickInfo")),
];

/// True for `sap:` attributes the upgrader consumes.
pub fn is_upgraded_attribute(name: &str) -> bool {
    RULES.iter().any(|r| r.attribute == name)
}

/// Member named by a restriction; navigation properties use a different path kind.
#[derive(Debug, Clone)]
struct RestrictedMember {
    name: String,
    navigation: bool,
}

impl RestrictedMember {
    fn path(&self) -> Value {
        let kind = if self.navigation {
            "$NavigationPropertyPath"
        } else {
            "$PropertyPath"
        };
        let mut path = Map::new();
        path.insert(kind.to_string(), Value::String(self.name.clone()));
        Value::Object(path)
    }
}

#[derive(Debug, Default, Clone)]
struct DeferredRestrictions {
    non_filterable: Vec<RestrictedMember>,
    required: Vec<RestrictedMember>,
    non_sortable: Vec<RestrictedMember>,
    expressions: Vec<(RestrictedMember, &'static str)>,
}

/// A `$Reference` entry for an auto-registered vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyReference {
    pub uri: String,
    pub namespace: String,
    pub alias: String,
}

/// Per-conversion upgrade state.
#[derive(Debug, Default)]
pub struct VocabularyUpgrader {
    used: Vec<&'static Vocabulary>,
    deferred: BTreeMap<String, DeferredRestrictions>,
}

impl VocabularyUpgrader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotation key for `term` of `vocabulary`, registering the vocabulary when the
    /// document does not include it.
    pub fn term_key(
        &mut self,
        vocabulary: &'static Vocabulary,
        term: &str,
        aliases: &AliasTable,
    ) -> String {
        let prefix = if aliases.knows_namespace(vocabulary.namespace) {
            aliases
                .alias_of(vocabulary.namespace)
                .unwrap_or(vocabulary.namespace)
        } else {
            if !self.used.iter().any(|v| std::ptr::eq(*v, vocabulary)) {
                self.used.push(vocabulary);
            }
            vocabulary.alias
        };
        format!("@{}.{}", prefix, term)
    }

    /// Rewrite the `sap:` attributes of `start` into annotations on `target`.
    ///
    /// `declaring_type` is the qualified name of the structured type for properties.
    pub fn upgrade(
        &mut self,
        kind: ElementKind,
        start: &StartElement,
        declaring_type: Option<&str>,
        target: &mut Map<String, Value>,
        aliases: &AliasTable,
    ) {
        let scope = match kind {
            ElementKind::EntitySet => EntitySet,
            ElementKind::Property | ElementKind::NavigationProperty => Property,
            _ => UpgradeScope::Any,
        };
        if scope == Property {
            self.upgrade_mutability(start, target, aliases);
        }

        for rule in RULES {
            if rule.scope != scope && rule.scope != UpgradeScope::Any {
                continue;
            }
            let Some(value) = start.attribute_ns(SAP_NS, rule.attribute) else {
                continue;
            };
            if let Equals(expected) = rule.trigger {
                if value != expected {
                    continue;
                }
            }
            self.apply(rule.action, start, value, declaring_type, target, aliases);
        }
    }

    fn apply(
        &mut self,
        action: UpgradeAction,
        start: &StartElement,
        value: &str,
        declaring_type: Option<&str>,
        target: &mut Map<String, Value>,
        aliases: &AliasTable,
    ) {
        match action {
            UpgradeAction::Restriction {
                term,
                property,
                value: flag,
            } => {
                let key = self.term_key(&CAPABILITIES, term, aliases);
                if let Some(record) = record_mut(target, key) {
                    record.insert(property.to_string(), Value::Bool(flag));
                }
            }
            UpgradeAction::Constant(terms) => {
                for (vocabulary, term, literal) in terms {
                    let key = self.term_key(*vocabulary, term, aliases);
                    target.insert(key, literal.value());
                }
            }
            UpgradeAction::Text(vocabulary, term) => {
                let key = self.term_key(vocabulary, term, aliases);
                target.insert(key, Value::String(value.to_string()));
            }
            UpgradeAction::Path(vocabulary, term) => {
                let key = self.term_key(vocabulary, term, aliases);
                target.insert(key, json!({ "$Path": value }));
            }
            UpgradeAction::Facet(key, literal) => {
                target.insert(key.to_string(), literal.value());
            }
            UpgradeAction::DisplayFormat => {
                let (vocabulary, term, literal) = match value {
                    "Date" => (&COMMON, "IsCalendarDate", Literal::Bool(true)),
                    "NonNegative" => (&VALIDATION, "Minimum", Literal::Int(0)),
                    "UpperCase" => (&COMMON, "IsUpperCase", Literal::Bool(true)),
                    _ => return,
                };
                let key = self.term_key(vocabulary, term, aliases);
                target.insert(key, literal.value());
            }
            UpgradeAction::Defer(list) => {
                let (Some(type_name), Some(property)) = (declaring_type, start.attribute("Name")) else {
                    return;
                };
                let entry = self.deferred.entry(type_name.to_string()).or_default();
                let property = RestrictedMember {
                    name: property.to_string(),
                    navigation: start.name == "NavigationProperty",
                };
                match list {
                    DeferredList::NonFilterable => entry.non_filterable.push(property),
                    DeferredList::RequiredInFilter => entry.required.push(property),
                    DeferredList::NonSortable => entry.non_sortable.push(property),
                    DeferredList::FilterExpression => {
                        let allowed = match value {
                            "single-value" => "SingleValue",
                            "multi-value" => "MultiValue",
                            "interval" => "SingleRange",
                            _ => return,
                        };
                        entry.expressions.push((property, allowed));
                    }
                }
            }
        }
    }

    /// `sap:creatable` / `sap:updatable` on a property.
    fn upgrade_mutability(&mut self, start: &StartElement, target: &mut Map<String, Value>, aliases: &AliasTable) {
        let creatable = start.attribute_ns(SAP_NS, "creatable") != Some("false");
        let updatable = start.attribute_ns(SAP_NS, "updatable") != Some("false");
        let term = match (creatable, updatable) {
            (false, false) => "Computed",
            (true, false) => "Immutable",
            _ => return,
        };
        let key = self.term_key(&CORE, term, aliases);
        target.insert(key, Value::Bool(true));
    }

    /// True if property restrictions are waiting for their entity sets.
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Write the queued restrictions into every entity set of `container`.
    pub fn flush_deferred(&mut self, container: &mut Map<String, Value>, aliases: &AliasTable) {
        if self.deferred.is_empty() {
            return;
        }
        let deferred = std::mem::take(&mut self.deferred);
        // resolved on first write so an unused vocabulary is never referenced
        let mut filter_key: Option<String> = None;
        let mut sort_key: Option<String> = None;
        let mut applied = 0;

        for (_, member) in container.iter_mut() {
            let Value::Object(set) = member else {
                continue;
            };
            if set.get("$Collection") != Some(&Value::Bool(true)) {
                continue;
            }
            let Some(restrictions) = set
                .get("$Type")
                .and_then(Value::as_str)
                .and_then(|t| deferred.get(t))
            else {
                continue;
            };

            let path = RestrictedMember::path;
            if !restrictions.non_filterable.is_empty()
                || !restrictions.required.is_empty()
                || !restrictions.expressions.is_empty()
            {
                let key = filter_key
                    .get_or_insert_with(|| self.term_key(&CAPABILITIES, "FilterRestrictions", aliases))
                    .clone();
                if let Some(record) = record_mut(set, key) {
                    append(record, "RequiredProperties", restrictions.required.iter().map(path));
                    append(
                        record,
                        "NonFilterableProperties",
                        restrictions.non_filterable.iter().map(path),
                    );
                    append(
                        record,
                        "FilterExpressionRestrictions",
                        restrictions.expressions.iter().map(|(p, allowed)| {
                            json!({ "Property": p.path(), "AllowedExpressions": allowed })
                        }),
                    );
                }
            }
            if !restrictions.non_sortable.is_empty() {
                let key = sort_key
                    .get_or_insert_with(|| self.term_key(&CAPABILITIES, "SortRestrictions", aliases))
                    .clone();
                if let Some(record) = record_mut(set, key) {
                    append(
                        record,
                        "NonSortableProperties",
                        restrictions.non_sortable.iter().map(path),
                    );
                }
            }
            applied += 1;
        }
        debug!(entity_sets = applied, "applied deferred restrictions");
        // Types without an entity set in this container may still have one in another
        self.deferred = deferred;
    }

    /// Drop the queue once every container has been flushed.
    pub fn clear_deferred(&mut self) {
        self.deferred.clear();
    }

    /// Vocabularies that need a `$Reference` entry, in first-use order.
    pub fn references(&self, aliases: &AliasTable) -> Vec<VocabularyReference> {
        self.used
            .iter()
            .filter(|v| !aliases.knows_namespace(v.namespace))
            .map(|v| VocabularyReference {
                uri: normalize_reference_uri(v.uri),
                namespace: v.namespace.to_string(),
                alias: v.alias.to_string(),
            })
            .collect()
    }
}

fn record_mut(target: &mut Map<String, Value>, key: String) -> Option<&mut Map<String, Value>> {
    let entry = target
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

fn append(record: &mut Map<String, Value>, property: &str, items: impl Iterator<Item = Value>) {
    let mut items = items.peekable();
    if items.peek().is_none() {
        return;
    }
    let entry = record
        .entry(property.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(list) = entry {
        list.extend(items);
    }
}
