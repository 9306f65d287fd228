//! Entity Data Model vocabulary shared by both conversion passes
//!
//! Namespaces of the three CSDL XML generations, the element and expression kinds the
//! converter understands, and the components that operate on them.

pub mod associations;
pub mod attributes;
pub mod grammar;
pub mod names;
pub mod vocabularies;

use std::fmt;

/// EDMX namespace of CSDL 4.0 and 4.01
pub const EDMX_V4: &str = "http://docs.oasis-open.org/odata/ns/edmx";
/// EDM namespace of CSDL 4.0 and 4.01
pub const EDM_V4: &str = "http://docs.oasis-open.org/odata/ns/edm";
/// EDMX namespace shared by the V2 and V3 generations
pub const EDMX_LEGACY: &str = "http://schemas.microsoft.com/ado/2007/06/edmx";
/// EDM namespace of the V3 generation
pub const EDM_V3: &str = "http://schemas.microsoft.com/ado/2009/11/edm";
/// EDM namespaces of the V2 generation
pub const EDM_V2: &[&str] = &[
    "http://schemas.microsoft.com/ado/2006/04/edm",
    "http://schemas.microsoft.com/ado/2007/05/edm",
    "http://schemas.microsoft.com/ado/2008/09/edm",
];
/// Data services metadata namespace (`m:` attributes of legacy documents)
pub const METADATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
/// SAP annotation attributes of legacy documents
pub const SAP_NS: &str = "http://www.sap.com/Protocols/SAPData";

/// Version marker separating legacy from current documents (compared as strings).
pub const CURRENT_VERSION_MARKER: &str = "4.0";

/// Document-level dialect family, decided by the root `Version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    /// V2 and V3 EDMX
    Legacy,
    /// CSDL 4.0 / 4.01
    Current,
}

impl Era {
    pub fn from_version(version: &str) -> Self {
        if version < CURRENT_VERSION_MARKER {
            Era::Legacy
        } else {
            Era::Current
        }
    }
}

/// Dialect generation of a single element, decided by its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Generation {
    V2,
    V3,
    V4,
}

impl Generation {
    /// Generation of an element in `namespace`, `None` for foreign namespaces.
    pub fn of_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            EDMX_V4 | EDM_V4 => Some(Generation::V4),
            EDM_V3 => Some(Generation::V3),
            EDMX_LEGACY => Some(Generation::V2),
            ns if EDM_V2.contains(&ns) => Some(Generation::V2),
            _ => None,
        }
    }

    pub fn era(self) -> Era {
        match self {
            Generation::V2 | Generation::V3 => Era::Legacy,
            Generation::V4 => Era::Current,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::V2 => write!(f, "V2"),
            Generation::V3 => write!(f, "V3"),
            Generation::V4 => write!(f, "V4"),
        }
    }
}

/// True if `namespace` belongs to any of the three generations.
pub fn is_edm_namespace(namespace: &str) -> bool {
    Generation::of_namespace(namespace).is_some()
}

/// True for the EDMX (as opposed to EDM) namespaces.
pub fn is_edmx_namespace(namespace: &str) -> bool {
    namespace == EDMX_V4 || namespace == EDMX_LEGACY
}

/// Constant expression kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantKind {
    Binary,
    Bool,
    Date,
    DateTimeOffset,
    Decimal,
    Duration,
    EnumMember,
    Float,
    Guid,
    Int,
    String,
    TimeOfDay,
}

/// Path expression kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    AnnotationPath,
    ModelElementPath,
    NavigationPropertyPath,
    Path,
    PropertyPath,
}

impl PathKind {
    /// Key of the JSON object representing the path.
    pub fn json_key(self) -> &'static str {
        match self {
            PathKind::AnnotationPath => "$AnnotationPath",
            PathKind::ModelElementPath => "$ModelElementPath",
            PathKind::NavigationPropertyPath => "$NavigationPropertyPath",
            PathKind::Path => "$Path",
            PathKind::PropertyPath => "$PropertyPath",
        }
    }
}

/// Expression element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Constant(ConstantKind),
    Path(PathKind),
    /// Two-operand logical, comparison and arithmetic operators
    Binary(&'static str),
    Not,
    Neg,
    If,
    Apply,
    Cast,
    IsOf,
    Collection,
    Record,
    LabeledElement,
    LabeledElementReference,
    Null,
    UrlRef,
}

const BINARY_OPERATORS: &[&str] = &[
    "And", "Or", "Eq", "Ne", "Gt", "Ge", "Lt", "Le", "Has", "In", "Add", "Sub", "Mul", "Div",
    "DivBy", "Mod",
];

impl ExprKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "Binary" => ExprKind::Constant(ConstantKind::Binary),
            "Bool" => ExprKind::Constant(ConstantKind::Bool),
            "Date" => ExprKind::Constant(ConstantKind::Date),
            "DateTimeOffset" => ExprKind::Constant(ConstantKind::DateTimeOffset),
            "Decimal" => ExprKind::Constant(ConstantKind::Decimal),
            "Duration" => ExprKind::Constant(ConstantKind::Duration),
            "EnumMember" => ExprKind::Constant(ConstantKind::EnumMember),
            "Float" => ExprKind::Constant(ConstantKind::Float),
            "Guid" => ExprKind::Constant(ConstantKind::Guid),
            "Int" => ExprKind::Constant(ConstantKind::Int),
            "String" => ExprKind::Constant(ConstantKind::String),
            "TimeOfDay" => ExprKind::Constant(ConstantKind::TimeOfDay),
            "AnnotationPath" => ExprKind::Path(PathKind::AnnotationPath),
            "ModelElementPath" => ExprKind::Path(PathKind::ModelElementPath),
            "NavigationPropertyPath" => ExprKind::Path(PathKind::NavigationPropertyPath),
            "Path" => ExprKind::Path(PathKind::Path),
            "PropertyPath" => ExprKind::Path(PathKind::PropertyPath),
            "Not" => ExprKind::Not,
            "Neg" => ExprKind::Neg,
            "If" => ExprKind::If,
            "Apply" => ExprKind::Apply,
            "Cast" => ExprKind::Cast,
            "IsOf" => ExprKind::IsOf,
            "Collection" => ExprKind::Collection,
            "Record" => ExprKind::Record,
            "LabeledElement" => ExprKind::LabeledElement,
            "LabeledElementReference" => ExprKind::LabeledElementReference,
            "Null" => ExprKind::Null,
            "UrlRef" => ExprKind::UrlRef,
            other => ExprKind::Binary(BINARY_OPERATORS.iter().copied().find(|op| *op == other)?),
        };
        Some(kind)
    }

    /// Inline-attribute form of the expression, e.g. `<Annotation String="..."/>`.
    pub fn from_attribute(name: &str) -> Option<Self> {
        match Self::from_name(name)? {
            kind @ (ExprKind::Constant(_) | ExprKind::Path(_) | ExprKind::UrlRef) => Some(kind),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExprKind::Constant(c) => match c {
                ConstantKind::Binary => "Binary",
                ConstantKind::Bool => "Bool",
                ConstantKind::Date => "Date",
                ConstantKind::DateTimeOffset => "DateTimeOffset",
                ConstantKind::Decimal => "Decimal",
                ConstantKind::Duration => "Duration",
                ConstantKind::EnumMember => "EnumMember",
                ConstantKind::Float => "Float",
                ConstantKind::Guid => "Guid",
                ConstantKind::Int => "Int",
                ConstantKind::String => "String",
                ConstantKind::TimeOfDay => "TimeOfDay",
            },
            ExprKind::Path(p) => &p.json_key()[1..],
            ExprKind::Binary(op) => op,
            ExprKind::Not => "Not",
            ExprKind::Neg => "Neg",
            ExprKind::If => "If",
            ExprKind::Apply => "Apply",
            ExprKind::Cast => "Cast",
            ExprKind::IsOf => "IsOf",
            ExprKind::Collection => "Collection",
            ExprKind::Record => "Record",
            ExprKind::LabeledElement => "LabeledElement",
            ExprKind::LabeledElementReference => "LabeledElementReference",
            ExprKind::Null => "Null",
            ExprKind::UrlRef => "UrlRef",
        }
    }

    /// True for expressions whose value is written as element text.
    pub fn takes_text(self) -> bool {
        matches!(
            self,
            ExprKind::Constant(_) | ExprKind::Path(_) | ExprKind::LabeledElementReference
        )
    }
}

/// Every element the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Edmx,
    Reference,
    Include,
    IncludeAnnotations,
    DataServices,
    Schema,
    Using,
    EntityType,
    ComplexType,
    EnumType,
    Member,
    TypeDefinition,
    Key,
    PropertyRef,
    Property,
    NavigationProperty,
    ReferentialConstraint,
    OnDelete,
    Principal,
    Dependent,
    Association,
    End,
    Action,
    Function,
    Parameter,
    ReturnType,
    Term,
    ValueTerm,
    EntityContainer,
    EntitySet,
    Singleton,
    NavigationPropertyBinding,
    ActionImport,
    FunctionImport,
    AssociationSet,
    Annotations,
    Annotation,
    ValueAnnotation,
    PropertyValue,
    Documentation,
    Summary,
    LongDescription,
    Expression(ExprKind),
}

impl ElementKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "Edmx" => ElementKind::Edmx,
            "Reference" => ElementKind::Reference,
            "Include" => ElementKind::Include,
            "IncludeAnnotations" => ElementKind::IncludeAnnotations,
            "DataServices" => ElementKind::DataServices,
            "Schema" => ElementKind::Schema,
            "Using" => ElementKind::Using,
            "EntityType" => ElementKind::EntityType,
            "ComplexType" => ElementKind::ComplexType,
            "EnumType" => ElementKind::EnumType,
            "Member" => ElementKind::Member,
            "TypeDefinition" => ElementKind::TypeDefinition,
            "Key" => ElementKind::Key,
            "PropertyRef" => ElementKind::PropertyRef,
            "Property" => ElementKind::Property,
            "NavigationProperty" => ElementKind::NavigationProperty,
            "ReferentialConstraint" => ElementKind::ReferentialConstraint,
            "OnDelete" => ElementKind::OnDelete,
            "Principal" => ElementKind::Principal,
            "Dependent" => ElementKind::Dependent,
            "Association" => ElementKind::Association,
            "End" => ElementKind::End,
            "Action" => ElementKind::Action,
            "Function" => ElementKind::Function,
            "Parameter" => ElementKind::Parameter,
            "ReturnType" => ElementKind::ReturnType,
            "Term" => ElementKind::Term,
            "ValueTerm" => ElementKind::ValueTerm,
            "EntityContainer" => ElementKind::EntityContainer,
            "EntitySet" => ElementKind::EntitySet,
            "Singleton" => ElementKind::Singleton,
            "NavigationPropertyBinding" => ElementKind::NavigationPropertyBinding,
            "ActionImport" => ElementKind::ActionImport,
            "FunctionImport" => ElementKind::FunctionImport,
            "AssociationSet" => ElementKind::AssociationSet,
            "Annotations" => ElementKind::Annotations,
            "Annotation" => ElementKind::Annotation,
            "ValueAnnotation" => ElementKind::ValueAnnotation,
            "PropertyValue" => ElementKind::PropertyValue,
            "Documentation" => ElementKind::Documentation,
            "Summary" => ElementKind::Summary,
            "LongDescription" => ElementKind::LongDescription,
            other => ElementKind::Expression(ExprKind::from_name(other)?),
        };
        Some(kind)
    }

    /// Local element name.
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Edmx => "Edmx",
            ElementKind::Reference => "Reference",
            ElementKind::Include => "Include",
            ElementKind::IncludeAnnotations => "IncludeAnnotations",
            ElementKind::DataServices => "DataServices",
            ElementKind::Schema => "Schema",
            ElementKind::Using => "Using",
            ElementKind::EntityType => "EntityType",
            ElementKind::ComplexType => "ComplexType",
            ElementKind::EnumType => "EnumType",
            ElementKind::Member => "Member",
            ElementKind::TypeDefinition => "TypeDefinition",
            ElementKind::Key => "Key",
            ElementKind::PropertyRef => "PropertyRef",
            ElementKind::Property => "Property",
            ElementKind::NavigationProperty => "NavigationProperty",
            ElementKind::ReferentialConstraint => "ReferentialConstraint",
            ElementKind::OnDelete => "OnDelete",
            ElementKind::Principal => "Principal",
            ElementKind::Dependent => "Dependent",
            ElementKind::Association => "Association",
            ElementKind::End => "End",
            ElementKind::Action => "Action",
            ElementKind::Function => "Function",
            ElementKind::Parameter => "Parameter",
            ElementKind::ReturnType => "ReturnType",
            ElementKind::Term => "Term",
            ElementKind::ValueTerm => "ValueTerm",
            ElementKind::EntityContainer => "EntityContainer",
            ElementKind::EntitySet => "EntitySet",
            ElementKind::Singleton => "Singleton",
            ElementKind::NavigationPropertyBinding => "NavigationPropertyBinding",
            ElementKind::ActionImport => "ActionImport",
            ElementKind::FunctionImport => "FunctionImport",
            ElementKind::AssociationSet => "AssociationSet",
            ElementKind::Annotations => "Annotations",
            ElementKind::Annotation => "Annotation",
            ElementKind::ValueAnnotation => "ValueAnnotation",
            ElementKind::PropertyValue => "PropertyValue",
            ElementKind::Documentation => "Documentation",
            ElementKind::Summary => "Summary",
            ElementKind::LongDescription => "LongDescription",
            ElementKind::Expression(expr) => expr.name(),
        }
    }

    pub fn is_expression(self) -> bool {
        matches!(self, ElementKind::Expression(_))
    }
}
