//! Attribute mapping engine
//!
//! Each element kind has an [`AttributeSpec`]: the attributes it requires, the ones it
//! converts (in output key order) and the ones that are recognized but consumed
//! elsewhere. Conversions are per-attribute [`AttrRule`]s; the defaulting and dropping
//! decisions that depend on more than one attribute are named policy functions.

use serde_json::{Map, Number, Value};
use tracing::{trace, warn};

use crate::error::ErrorKind;
use crate::parser::{StartElement, XmlAttribute};

use super::names::{is_simple_identifier, strip_collection, upgrade_legacy_primitive, AliasTable, DEFAULT_ENUM_UNDERLYING, DEFAULT_PRIMITIVE};
use super::vocabularies::is_upgraded_attribute;
use super::{ElementKind, Era, ExprKind, Generation, CURRENT_VERSION_MARKER, METADATA_NS, SAP_NS};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Conversion applied to one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrRule {
    /// Boolean, written only when it differs from `default`
    Flag { default: bool },
    /// Integer facet, raw string when not an integer
    Number,
    /// Qualified name, alias resolved
    QualifiedName,
    /// Type reference with `Collection(...)` unwrapping
    TypeRef,
    /// Qualified name, dropped when it is `Edm.Int32`
    UnderlyingType,
    DefaultValue,
    Nullable,
    Text,
    /// Whitespace-separated list
    List,
    /// Model path or annotation target
    Target,
}

#[derive(Debug, Clone, Copy)]
pub struct AttrField {
    pub attribute: &'static str,
    pub key: &'static str,
    pub rule: AttrRule,
}

const fn field(attribute: &'static str, key: &'static str, rule: AttrRule) -> AttrField {
    AttrField {
        attribute,
        key,
        rule,
    }
}

#[derive(Debug)]
pub struct AttributeSpec {
    pub required: &'static [&'static str],
    /// Converted attributes, in output key order
    pub extract: &'static [AttrField],
    /// Recognized but consumed by the tree builder
    pub ignore: &'static [&'static str],
    /// Legacy attributes without a counterpart in the normalized document
    pub legacy_ignore: &'static [&'static str],
    /// Element accepts inline expression attributes (`String="..."`, `Path="..."`)
    pub inline_expressions: bool,
}

const fn spec(
    required: &'static [&'static str],
    extract: &'static [AttrField],
    ignore: &'static [&'static str],
) -> AttributeSpec {
    AttributeSpec {
        required,
        extract,
        ignore,
        legacy_ignore: &[],
        inline_expressions: false,
    }
}

const fn legacy(mut s: AttributeSpec, legacy_ignore: &'static [&'static str]) -> AttributeSpec {
    s.legacy_ignore = legacy_ignore;
    s
}

const fn inline(mut s: AttributeSpec) -> AttributeSpec {
    s.inline_expressions = true;
    s
}

use AttrRule::{DefaultValue, Flag, List, Nullable, Number as Num, QualifiedName, Target, Text, TypeRef, UnderlyingType};

const MAX_LENGTH: AttrField = field("MaxLength", "$MaxLength", Num);
const PRECISION: AttrField = field("Precision", "$Precision", Num);
const SCALE: AttrField = field("Scale", "$Scale", Num);
const SRID: AttrField = field("SRID", "$SRID", Num);
const UNICODE: AttrField = field("Unicode", "$Unicode", Flag { default: true });
const TYPE: AttrField = field("Type", "$Type", TypeRef);
const NULLABLE: AttrField = field("Nullable", "$Nullable", Nullable);

static NONE: AttributeSpec = spec(&[], &[], &[]);
static EDMX: AttributeSpec = spec(&["Version"], &[], &["Version"]);
static REFERENCE: AttributeSpec = spec(&["Uri"], &[], &["Uri"]);
static INCLUDE: AttributeSpec = spec(
    &["Namespace"],
    &[field("Namespace", "$Namespace", Text), field("Alias", "$Alias", Text)],
    &[],
);
static INCLUDE_ANNOTATIONS: AttributeSpec = spec(
    &["TermNamespace"],
    &[
        field("TermNamespace", "$TermNamespace", Text),
        field("Qualifier", "$Qualifier", Text),
        field("TargetNamespace", "$TargetNamespace", Text),
    ],
    &[],
);
static SCHEMA: AttributeSpec = spec(&["Namespace"], &[field("Alias", "$Alias", Text)], &["Namespace"]);
static USING: AttributeSpec = spec(&["Namespace", "Alias"], &[], &["Namespace", "Alias"]);
static ENTITY_TYPE: AttributeSpec = spec(
    &["Name"],
    &[
        field("BaseType", "$BaseType", QualifiedName),
        field("Abstract", "$Abstract", Flag { default: false }),
        field("OpenType", "$OpenType", Flag { default: false }),
        field("HasStream", "$HasStream", Flag { default: false }),
    ],
    &["Name"],
);
static COMPLEX_TYPE: AttributeSpec = spec(
    &["Name"],
    &[
        field("BaseType", "$BaseType", QualifiedName),
        field("Abstract", "$Abstract", Flag { default: false }),
        field("OpenType", "$OpenType", Flag { default: false }),
    ],
    &["Name"],
);
static ENUM_TYPE: AttributeSpec = spec(
    &["Name"],
    &[
        field("UnderlyingType", "$UnderlyingType", UnderlyingType),
        field("IsFlags", "$IsFlags", Flag { default: false }),
    ],
    &["Name"],
);
static MEMBER: AttributeSpec = spec(&["Name"], &[], &["Name", "Value"]);
static TYPE_DEFINITION: AttributeSpec = spec(
    &["Name", "UnderlyingType"],
    &[
        field("UnderlyingType", "$UnderlyingType", QualifiedName),
        MAX_LENGTH,
        PRECISION,
        SCALE,
        SRID,
        UNICODE,
    ],
    &["Name"],
);
static PROPERTY_REF: AttributeSpec = spec(&["Name"], &[], &["Name", "Alias"]);
static PROPERTY: AttributeSpec = legacy(
    spec(
        &["Name", "Type"],
        &[
            TYPE,
            NULLABLE,
            MAX_LENGTH,
            PRECISION,
            SCALE,
            SRID,
            UNICODE,
            field("DefaultValue", "$DefaultValue", DefaultValue),
        ],
        &["Name"],
    ),
    &["FixedLength", "ConcurrencyMode", "Collation", "SetterAccess", "GetterAccess"],
);
static NAVIGATION_PROPERTY: AttributeSpec = spec(
    &["Name", "Type"],
    &[
        TYPE,
        NULLABLE,
        field("Partner", "$Partner", Text),
        field("ContainsTarget", "$ContainsTarget", Flag { default: false }),
    ],
    &["Name"],
);
static LEGACY_NAVIGATION_PROPERTY: AttributeSpec = legacy(
    spec(
        &["Name", "Relationship", "FromRole", "ToRole"],
        &[],
        &["Name", "Relationship", "FromRole", "ToRole"],
    ),
    &["ContainsTarget", "GetterAccess", "SetterAccess"],
);
static REFERENTIAL_CONSTRAINT: AttributeSpec = spec(
    &["Property", "ReferencedProperty"],
    &[],
    &["Property", "ReferencedProperty"],
);
static ON_DELETE: AttributeSpec = spec(&["Action"], &[], &["Action"]);
static ROLE: AttributeSpec = spec(&["Role"], &[], &["Role"]);
static NAMED: AttributeSpec = spec(&["Name"], &[], &["Name"]);
static END: AttributeSpec = spec(&[], &[], &["Role", "Type", "Multiplicity", "EntitySet"]);
static ACTION: AttributeSpec = spec(
    &["Name"],
    &[
        field("IsBound", "$IsBound", Flag { default: false }),
        field("EntitySetPath", "$EntitySetPath", Target),
    ],
    &["Name"],
);
static FUNCTION: AttributeSpec = spec(
    &["Name"],
    &[
        field("IsBound", "$IsBound", Flag { default: false }),
        field("IsComposable", "$IsComposable", Flag { default: false }),
        field("EntitySetPath", "$EntitySetPath", Target),
    ],
    &["Name"],
);
static PARAMETER: AttributeSpec = legacy(
    spec(
        &["Name", "Type"],
        &[TYPE, NULLABLE, MAX_LENGTH, PRECISION, SCALE, SRID, UNICODE],
        &["Name"],
    ),
    &["Mode", "FixedLength"],
);
static RETURN_TYPE: AttributeSpec = legacy(
    spec(
        &["Type"],
        &[TYPE, NULLABLE, MAX_LENGTH, PRECISION, SCALE, SRID, UNICODE],
        &[],
    ),
    &["EntitySet", "EntitySetPath"],
);
static TERM: AttributeSpec = spec(
    &["Name", "Type"],
    &[
        TYPE,
        NULLABLE,
        MAX_LENGTH,
        PRECISION,
        SCALE,
        SRID,
        UNICODE,
        field("DefaultValue", "$DefaultValue", DefaultValue),
        field("BaseTerm", "$BaseTerm", QualifiedName),
        field("AppliesTo", "$AppliesTo", List),
    ],
    &["Name"],
);
static VALUE_TERM: AttributeSpec = spec(
    &["Name", "Type"],
    &[
        TYPE,
        NULLABLE,
        MAX_LENGTH,
        PRECISION,
        SCALE,
        SRID,
        UNICODE,
        field("DefaultValue", "$DefaultValue", DefaultValue),
    ],
    &["Name"],
);
static ENTITY_CONTAINER: AttributeSpec = spec(
    &["Name"],
    &[field("Extends", "$Extends", QualifiedName)],
    &["Name"],
);
static ENTITY_SET: AttributeSpec = spec(
    &["Name", "EntityType"],
    &[
        field("EntityType", "$Type", QualifiedName),
        field(
            "IncludeInServiceDocument",
            "$IncludeInServiceDocument",
            Flag { default: true },
        ),
    ],
    &["Name"],
);
static SINGLETON: AttributeSpec = spec(
    &["Name", "Type"],
    &[field("Type", "$Type", QualifiedName), NULLABLE],
    &["Name"],
);
static NAVIGATION_PROPERTY_BINDING: AttributeSpec =
    spec(&["Path", "Target"], &[], &["Path", "Target"]);
static ACTION_IMPORT: AttributeSpec = spec(
    &["Name", "Action"],
    &[
        field("Action", "$Action", QualifiedName),
        field("EntitySet", "$EntitySet", Target),
    ],
    &["Name"],
);
static FUNCTION_IMPORT: AttributeSpec = spec(
    &["Name", "Function"],
    &[
        field("Function", "$Function", QualifiedName),
        field("EntitySet", "$EntitySet", Target),
        field(
            "IncludeInServiceDocument",
            "$IncludeInServiceDocument",
            Flag { default: false },
        ),
    ],
    &["Name"],
);
static LEGACY_FUNCTION_IMPORT: AttributeSpec = legacy(
    spec(
        &["Name"],
        &[],
        &[
            "Name",
            "ReturnType",
            "EntitySet",
            "EntitySetPath",
            "IsSideEffecting",
            "IsBindable",
            "IsComposable",
        ],
    ),
    &["Action"],
);
static ASSOCIATION_SET: AttributeSpec =
    spec(&["Name", "Association"], &[], &["Name", "Association"]);
static ANNOTATIONS: AttributeSpec = spec(&["Target"], &[], &["Target", "Qualifier"]);
static ANNOTATION: AttributeSpec = inline(spec(&["Term"], &[], &["Term", "Qualifier"]));
static PROPERTY_VALUE: AttributeSpec = inline(spec(&["Property"], &[], &["Property"]));
static RECORD: AttributeSpec = spec(&[], &[], &["Type"]);
static TYPE_TEST: AttributeSpec = spec(
    &["Type"],
    &[TYPE, MAX_LENGTH, PRECISION, SCALE, SRID],
    &[],
);
static APPLY: AttributeSpec = spec(&["Function"], &[], &["Function"]);
static LABELED_ELEMENT: AttributeSpec = inline(spec(&["Name"], &[], &["Name"]));
static URL_REF: AttributeSpec = inline(spec(&[], &[], &[]));

/// Attribute specification of `kind` in a document of `era`.
pub fn spec_for(kind: ElementKind, era: Era) -> &'static AttributeSpec {
    let legacy = era == Era::Legacy;
    match kind {
        ElementKind::Edmx => &EDMX,
        ElementKind::Reference => &REFERENCE,
        ElementKind::Include => &INCLUDE,
        ElementKind::IncludeAnnotations => &INCLUDE_ANNOTATIONS,
        ElementKind::DataServices | ElementKind::Key => &NONE,
        ElementKind::Schema => &SCHEMA,
        ElementKind::Using => &USING,
        ElementKind::EntityType => &ENTITY_TYPE,
        ElementKind::ComplexType => &COMPLEX_TYPE,
        ElementKind::EnumType => &ENUM_TYPE,
        ElementKind::Member => &MEMBER,
        ElementKind::TypeDefinition => &TYPE_DEFINITION,
        ElementKind::PropertyRef => &PROPERTY_REF,
        ElementKind::Property => &PROPERTY,
        ElementKind::NavigationProperty if legacy => &LEGACY_NAVIGATION_PROPERTY,
        ElementKind::NavigationProperty => &NAVIGATION_PROPERTY,
        ElementKind::ReferentialConstraint if legacy => &NONE,
        ElementKind::ReferentialConstraint => &REFERENTIAL_CONSTRAINT,
        ElementKind::OnDelete => &ON_DELETE,
        ElementKind::Principal | ElementKind::Dependent => &ROLE,
        ElementKind::Association => &NAMED,
        ElementKind::End => &END,
        ElementKind::Action => &ACTION,
        ElementKind::Function => &FUNCTION,
        ElementKind::Parameter => &PARAMETER,
        ElementKind::ReturnType => &RETURN_TYPE,
        ElementKind::Term => &TERM,
        ElementKind::ValueTerm => &VALUE_TERM,
        ElementKind::EntityContainer => &ENTITY_CONTAINER,
        ElementKind::EntitySet => &ENTITY_SET,
        ElementKind::Singleton => &SINGLETON,
        ElementKind::NavigationPropertyBinding => &NAVIGATION_PROPERTY_BINDING,
        ElementKind::ActionImport => &ACTION_IMPORT,
        ElementKind::FunctionImport if legacy => &LEGACY_FUNCTION_IMPORT,
        ElementKind::FunctionImport => &FUNCTION_IMPORT,
        ElementKind::AssociationSet => &ASSOCIATION_SET,
        ElementKind::Annotations => &ANNOTATIONS,
        ElementKind::Annotation | ElementKind::ValueAnnotation => &ANNOTATION,
        ElementKind::PropertyValue => &PROPERTY_VALUE,
        ElementKind::Documentation | ElementKind::Summary | ElementKind::LongDescription => &NONE,
        ElementKind::Expression(expr) => match expr {
            ExprKind::Record => &RECORD,
            ExprKind::Cast | ExprKind::IsOf => &TYPE_TEST,
            ExprKind::Apply => &APPLY,
            ExprKind::LabeledElement => &LABELED_ELEMENT,
            ExprKind::UrlRef => &URL_REF,
            _ => &NONE,
        },
    }
}

/// Everything the engine needs to know about the element being converted.
#[derive(Debug, Clone, Copy)]
pub struct AttributeContext<'a> {
    pub kind: ElementKind,
    pub era: Era,
    /// Root `Version` of the document
    pub version: &'a str,
    pub aliases: &'a AliasTable,
    pub strict: bool,
    pub include_foreign: bool,
}

/// Foreign attribute namespaces seen so far, with the alias synthesized for each.
#[derive(Debug, Default, Clone)]
pub struct ForeignNamespaces {
    entries: Vec<(String, String)>,
}

impl ForeignNamespaces {
    /// Alias for `uri`, registering it on first sight.
    pub fn register(&mut self, uri: &str, prefix: Option<&str>) -> String {
        if let Some((_, alias)) = self.entries.iter().find(|(u, _)| u == uri) {
            return alias.clone();
        }
        let base = prefix.unwrap_or("ns").to_string();
        let mut alias = base.clone();
        let mut n = 1;
        while self.entries.iter().any(|(_, a)| *a == alias) {
            alias = format!("{}{}", base, n);
            n += 1;
        }
        self.entries.push((uri.to_string(), alias.clone()));
        alias
    }

    /// `(namespace URI, alias)` pairs in first-seen order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Convert the attributes of `start` onto `target`.
pub fn map_attributes(
    ctx: &AttributeContext<'_>,
    start: &StartElement,
    target: &mut Map<String, Value>,
    foreign: &mut ForeignNamespaces,
) -> Result<(), ErrorKind> {
    let spec = spec_for(ctx.kind, ctx.era);
    check_required(spec, start)?;
    if ctx.strict {
        check_identifier(ctx.kind, start)?;
    }

    for f in spec.extract {
        let raw = start.attribute(f.attribute);
        match f.rule {
            Nullable => {
                if let Some(value) = nullable_policy(ctx, start, raw)? {
                    target.insert(f.key.to_string(), value);
                }
            }
            _ => {
                if let Some(raw) = raw {
                    convert(ctx, start, f, raw, target)?;
                }
            }
        }
    }

    for attr in &start.attributes {
        match attr.namespace.as_deref() {
            None => {
                if !is_recognized(spec, ctx.era, &attr.name) {
                    unexpected_attribute_policy(ctx.strict, start, attr)?;
                }
            }
            Some(ns) if is_known_namespace(ns, &attr.name) => {}
            Some(_) => {
                if let Some((key, value)) = foreign_attribute_policy(ctx.include_foreign, attr, foreign) {
                    target.insert(key, value);
                }
            }
        }
    }
    Ok(())
}

/// Required attributes are checked before anything is converted.
pub fn check_required(spec: &AttributeSpec, start: &StartElement) -> Result<(), ErrorKind> {
    match spec.required.iter().find(|name| start.attribute(name).is_none()) {
        Some(missing) => Err(ErrorKind::MissingAttribute {
            element: start.name.clone(),
            attribute: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Declared names must be SimpleIdentifiers; `PropertyRef` names are paths.
pub fn check_identifier(kind: ElementKind, start: &StartElement) -> Result<(), ErrorKind> {
    if kind == ElementKind::PropertyRef {
        return Ok(());
    }
    match start.attribute("Name") {
        Some(name) if !is_simple_identifier(name) => Err(ErrorKind::InvalidValue {
            element: start.name.clone(),
            attribute: "Name".to_string(),
            value: name.to_string(),
            reason: "not a simple identifier".to_string(),
        }),
        _ => Ok(()),
    }
}

fn convert(
    ctx: &AttributeContext<'_>,
    start: &StartElement,
    f: &AttrField,
    raw: &str,
    target: &mut Map<String, Value>,
) -> Result<(), ErrorKind> {
    let key = f.key.to_string();
    match f.rule {
        Flag { default } => {
            let value = raw == "true";
            if value != default {
                target.insert(key, Value::Bool(value));
            }
        }
        Num => {
            target.insert(key, number_value(raw));
        }
        QualifiedName => {
            target.insert(key, Value::String(ctx.aliases.qualified_name(raw)));
        }
        UnderlyingType => {
            let name = ctx.aliases.qualified_name(raw);
            if name != DEFAULT_ENUM_UNDERLYING {
                target.insert(key, Value::String(name));
            }
        }
        TypeRef => {
            let (name, collection) = type_reference(ctx, raw);
            if name != DEFAULT_PRIMITIVE {
                target.insert(key, Value::String(name));
            }
            if collection {
                target.insert("$Collection".to_string(), Value::Bool(true));
            }
        }
        DefaultValue => {
            target.insert(key, default_value_policy(raw, start.attribute("Type")));
        }
        Text => {
            target.insert(key, Value::String(raw.to_string()));
        }
        List => {
            let items = raw
                .split_whitespace()
                .map(|s| Value::String(s.to_string()))
                .collect();
            target.insert(key, Value::Array(items));
        }
        Target => {
            target.insert(key, Value::String(ctx.aliases.target(raw)));
        }
        Nullable => {}
    }
    Ok(())
}

/// Normalized type name and collection flag of a `Type` attribute.
pub fn type_reference(ctx: &AttributeContext<'_>, raw: &str) -> (String, bool) {
    let (collection, inner) = strip_collection(raw);
    let name = ctx.aliases.qualified_name(inner);
    let name = match ctx.era {
        Era::Legacy => upgrade_legacy_primitive(&name).to_string(),
        Era::Current => name,
    };
    (name, collection)
}

/// `MaxLength="10"` → `10`; `Max` → `"max"`; anything else stays a string.
pub fn number_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if raw.eq_ignore_ascii_case("max") {
        return Value::String("max".to_string());
    }
    Value::String(raw.to_string())
}

/// Decide `$Nullable` from the attribute, the element kind and its type.
///
/// Absent means nullable in XML and non-nullable in JSON, so the default is written out
/// and an explicit `false` is dropped. Singletons and legacy parameters are the
/// exceptions; collection navigation properties never carry it.
pub fn nullable_policy(
    ctx: &AttributeContext<'_>,
    start: &StartElement,
    value: Option<&str>,
) -> Result<Option<Value>, ErrorKind> {
    let type_name = start.attribute("Type").unwrap_or_default();
    let (collection, inner) = strip_collection(type_name);
    let name = || start.attribute("Name").unwrap_or_default().to_string();

    if collection && inner == "Edm.EntityType" && value.is_some() {
        return Err(ErrorKind::NullableOnEntityCollection {
            element: start.name.clone(),
            name: name(),
        });
    }

    let explicit = value.map(|v| nullable_literal(start, v)).transpose()?;
    match ctx.kind {
        ElementKind::Singleton => return Ok(explicit.filter(|n| *n).map(Value::Bool)),
        ElementKind::NavigationProperty if collection => {
            if explicit.is_some() {
                warn!(
                    navigation_property = %name(),
                    "dropping Nullable on collection-valued navigation property"
                );
            }
            return Ok(None);
        }
        ElementKind::Property | ElementKind::Term
            if collection && explicit.is_none() && ctx.version > CURRENT_VERSION_MARKER =>
        {
            return Err(ErrorKind::MissingCollectionNullable {
                element: start.name.clone(),
                name: name(),
            });
        }
        ElementKind::Parameter if ctx.era == Era::Legacy && explicit.is_none() => return Ok(None),
        _ => {}
    }

    Ok(explicit.unwrap_or(true).then_some(Value::Bool(true)))
}

fn nullable_literal(start: &StartElement, value: &str) -> Result<bool, ErrorKind> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ErrorKind::InvalidValue {
            element: start.name.clone(),
            attribute: "Nullable".to_string(),
            value: other.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Type a `DefaultValue` literal by its shape, unless the declared type is a string.
pub fn default_value_policy(raw: &str, type_name: Option<&str>) -> Value {
    let declared = type_name.map(|t| strip_collection(t).1);
    if matches!(declared, None | Some(DEFAULT_PRIMITIVE)) {
        return Value::String(raw.to_string());
    }
    match raw {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => numeric_literal(raw).unwrap_or_else(|| Value::String(raw.to_string())),
    }
}

/// JSON number for an integer or finite decimal literal.
pub fn numeric_literal(raw: &str) -> Option<Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    let looks_numeric = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
    if !looks_numeric {
        return None;
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Unprefixed attributes the element does not define are fatal only in strict mode.
pub fn unexpected_attribute_policy(
    strict: bool,
    start: &StartElement,
    attr: &XmlAttribute,
) -> Result<(), ErrorKind> {
    if strict {
        return Err(ErrorKind::UnexpectedAttribute {
            element: start.name.clone(),
            attribute: attr.name.clone(),
        });
    }
    trace!(element = %start.name, attribute = %attr.name, "dropping unexpected attribute");
    Ok(())
}

/// Attribute in an unrecognized namespace → `@<alias>.<name>` when enabled.
pub fn foreign_attribute_policy(
    enabled: bool,
    attr: &XmlAttribute,
    foreign: &mut ForeignNamespaces,
) -> Option<(String, Value)> {
    let uri = attr.namespace.as_deref()?;
    if !enabled {
        trace!(namespace = %uri, attribute = %attr.name, "dropping foreign attribute");
        return None;
    }
    let alias = foreign.register(uri, attr.prefix.as_deref());
    Some((
        format!("@{}.{}", alias, attr.name),
        Value::String(attr.value.clone()),
    ))
}

fn is_recognized(spec: &AttributeSpec, era: Era, name: &str) -> bool {
    spec.required.contains(&name)
        || spec.ignore.contains(&name)
        || spec.extract.iter().any(|f| f.attribute == name)
        || (era == Era::Legacy && spec.legacy_ignore.contains(&name))
        || (spec.inline_expressions && ExprKind::from_attribute(name).is_some())
}

/// Namespaced attributes consumed by the converter itself.
fn is_known_namespace(ns: &str, name: &str) -> bool {
    match ns {
        METADATA_NS | XML_NS => true,
        SAP_NS => is_upgraded_attribute(name),
        other => Generation::of_namespace(other).is_some(),
    }
}
