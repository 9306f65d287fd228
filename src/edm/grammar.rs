//! Grammar table and structural validator
//!
//! Every element the converter understands has one [`ElementRule`]: the era it belongs
//! to, whether it lives in the EDMX or EDM namespace, whether it may carry text, and the
//! children it admits together with their occurrence bounds. [`GrammarValidator`] walks
//! the event stream against that table with one occurrence counter per open parent.

use tracing::trace;

use crate::error::ErrorKind;
use crate::parser::StartElement;

use super::{is_edmx_namespace, ElementKind, Era, ExprKind, Generation, EDMX_LEGACY, EDMX_V4, EDM_V3, EDM_V4};

/// Era an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEra {
    Any,
    Legacy,
    Current,
}

/// Which of the two namespace families an element lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsKind {
    Edmx,
    Edm,
}

/// What a child slot matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildMatch {
    Element(ElementKind),
    /// Any expression element
    Expression,
}

impl ChildMatch {
    fn matches(self, kind: ElementKind) -> bool {
        match self {
            ChildMatch::Element(k) => k == kind,
            ChildMatch::Expression => kind.is_expression(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            ChildMatch::Element(k) => k.name(),
            ChildMatch::Expression => "expression",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChildRule {
    pub child: ChildMatch,
    pub min: u32,
    /// `None` is unbounded
    pub max: Option<u32>,
}

#[derive(Debug)]
pub struct ElementRule {
    pub era: RuleEra,
    pub ns: NsKind,
    /// Also accepted in the V4 namespace inside legacy documents
    pub either_ns: bool,
    /// Legacy element that does not exist in V2 namespaces
    pub since_v3: bool,
    /// Element content is character data
    pub text: bool,
    pub children: &'static [ChildRule],
}

const fn many(kind: ElementKind) -> ChildRule {
    ChildRule {
        child: ChildMatch::Element(kind),
        min: 0,
        max: None,
    }
}

const fn optional(kind: ElementKind) -> ChildRule {
    ChildRule {
        child: ChildMatch::Element(kind),
        min: 0,
        max: Some(1),
    }
}

const fn bounded(kind: ElementKind, min: u32, max: Option<u32>) -> ChildRule {
    ChildRule {
        child: ChildMatch::Element(kind),
        min,
        max,
    }
}

const fn expressions(min: u32, max: Option<u32>) -> ChildRule {
    ChildRule {
        child: ChildMatch::Expression,
        min,
        max,
    }
}

const fn rule(era: RuleEra, ns: NsKind, children: &'static [ChildRule]) -> ElementRule {
    ElementRule {
        era,
        ns,
        either_ns: false,
        since_v3: false,
        text: false,
        children,
    }
}

const fn either(mut r: ElementRule) -> ElementRule {
    r.either_ns = true;
    r
}

const fn since_v3(mut r: ElementRule) -> ElementRule {
    r.since_v3 = true;
    r
}

const fn with_text(mut r: ElementRule) -> ElementRule {
    r.text = true;
    r
}

use ElementKind as K;
use NsKind::{Edm, Edmx};
use RuleEra::{Any, Current, Legacy};

static EDMX: ElementRule = rule(
    Any,
    Edmx,
    &[many(K::Reference), bounded(K::DataServices, 1, Some(1))],
);
static REFERENCE: ElementRule = either(rule(
    Current,
    Edmx,
    &[many(K::Include), many(K::IncludeAnnotations), many(K::Annotation)],
));
static INCLUDE: ElementRule = either(rule(Current, Edmx, &[many(K::Annotation)]));
static INCLUDE_ANNOTATIONS: ElementRule = either(rule(Current, Edmx, &[]));
static DATA_SERVICES: ElementRule = rule(
    Any,
    Edmx,
    &[bounded(K::Schema, 1, None)],
);
static SCHEMA: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::Using),
        many(K::EntityType),
        many(K::ComplexType),
        many(K::EnumType),
        many(K::TypeDefinition),
        many(K::Association),
        many(K::Action),
        many(K::Function),
        many(K::Term),
        many(K::ValueTerm),
        many(K::EntityContainer),
        many(K::Annotations),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static USING: ElementRule = since_v3(rule(Legacy, Edm, &[optional(K::Documentation)]));
static ENTITY_TYPE: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        optional(K::Key),
        many(K::Property),
        many(K::NavigationProperty),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static COMPLEX_TYPE: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::Property),
        many(K::NavigationProperty),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static ENUM_TYPE: ElementRule = since_v3(rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::Member),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
));
static MEMBER: ElementRule = since_v3(rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
));
static TYPE_DEFINITION: ElementRule =
    rule(Current, Edm, &[many(K::Annotation)]);
static KEY: ElementRule = rule(Any, Edm, &[bounded(K::PropertyRef, 1, None)]);
static PROPERTY_REF: ElementRule = rule(Any, Edm, &[]);
static PROPERTY: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static NAVIGATION_PROPERTY: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::ReferentialConstraint),
        optional(K::OnDelete),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static REFERENTIAL_CONSTRAINT: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        bounded(K::Principal, 1, Some(1)),
        bounded(K::Dependent, 1, Some(1)),
        many(K::Annotation),
    ],
);
static ON_DELETE: ElementRule = rule(
    Any,
    Edm,
    &[optional(K::Documentation), many(K::Annotation)],
);
static PRINCIPAL: ElementRule = rule(
    Legacy,
    Edm,
    &[bounded(K::PropertyRef, 1, None)],
);
static DEPENDENT: ElementRule = rule(
    Legacy,
    Edm,
    &[bounded(K::PropertyRef, 1, None)],
);
static ASSOCIATION: ElementRule = rule(
    Legacy,
    Edm,
    &[
        optional(K::Documentation),
        bounded(K::End, 2, Some(2)),
        optional(K::ReferentialConstraint),
        many(K::ValueAnnotation),
    ],
);
static END: ElementRule = rule(
    Legacy,
    Edm,
    &[optional(K::Documentation), optional(K::OnDelete)],
);
static ACTION: ElementRule = rule(
    Current,
    Edm,
    &[
        many(K::Parameter),
        optional(K::ReturnType),
        many(K::Annotation),
    ],
);
static FUNCTION: ElementRule = rule(
    Current,
    Edm,
    &[
        many(K::Parameter),
        optional(K::ReturnType),
        many(K::Annotation),
    ],
);
static PARAMETER: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static RETURN_TYPE: ElementRule = rule(Any, Edm, &[many(K::Annotation)]);
static TERM: ElementRule = rule(Current, Edm, &[many(K::Annotation)]);
static VALUE_TERM: ElementRule = since_v3(rule(
    Legacy,
    Edm,
    &[optional(K::Documentation), many(K::ValueAnnotation)],
));
static ENTITY_CONTAINER: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::EntitySet),
        many(K::Singleton),
        many(K::ActionImport),
        many(K::FunctionImport),
        many(K::AssociationSet),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static ENTITY_SET: ElementRule = rule(
    Any,
    Edm,
    &[
        optional(K::Documentation),
        many(K::NavigationPropertyBinding),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static SINGLETON: ElementRule = rule(
    Current,
    Edm,
    &[many(K::NavigationPropertyBinding), many(K::Annotation)],
);
static NAVIGATION_PROPERTY_BINDING: ElementRule =
    rule(Current, Edm, &[]);
static ACTION_IMPORT: ElementRule = rule(Current, Edm, &[many(K::Annotation)]);
static FUNCTION_IMPORT: ElementRule = rule(Current, Edm, &[many(K::Annotation)]);
/// Legacy imports declare their own signature.
static LEGACY_FUNCTION_IMPORT: ElementRule = rule(
    Legacy,
    Edm,
    &[
        optional(K::Documentation),
        many(K::Parameter),
        many(K::ReturnType),
        many(K::Annotation),
        many(K::ValueAnnotation),
    ],
);
static ASSOCIATION_SET: ElementRule = rule(
    Legacy,
    Edm,
    &[
        optional(K::Documentation),
        bounded(K::End, 2, Some(2)),
        many(K::ValueAnnotation),
    ],
);
static ANNOTATIONS: ElementRule = either(since_v3(rule(
    Any,
    Edm,
    &[many(K::Annotation), many(K::ValueAnnotation)],
)));
static ANNOTATION: ElementRule = either(rule(
    Current,
    Edm,
    &[expressions(0, Some(1)), many(K::Annotation)],
));
static VALUE_ANNOTATION: ElementRule = since_v3(rule(
    Legacy,
    Edm,
    &[expressions(0, Some(1)), many(K::ValueAnnotation)],
));
static PROPERTY_VALUE: ElementRule = either(rule(
    Any,
    Edm,
    &[expressions(0, Some(1)), many(K::Annotation)],
));
static DOCUMENTATION: ElementRule = rule(
    Legacy,
    Edm,
    &[optional(K::Summary), optional(K::LongDescription)],
);
static SUMMARY: ElementRule = with_text(rule(Legacy, Edm, &[]));
static LONG_DESCRIPTION: ElementRule = with_text(rule(Legacy, Edm, &[]));

// Expressions are valid in either namespace: legacy V2 documents carry V4 annotations.
static TEXT_EXPRESSION: ElementRule =
    either(with_text(rule(Any, Edm, &[])));
static BINARY_EXPRESSION: ElementRule = either(rule(
    Any,
    Edm,
    &[expressions(2, Some(2)), many(K::Annotation)],
));
static UNARY_EXPRESSION: ElementRule = either(rule(
    Any,
    Edm,
    &[expressions(1, Some(1)), many(K::Annotation)],
));
static IF_EXPRESSION: ElementRule = either(rule(
    Any,
    Edm,
    &[expressions(2, Some(3)), many(K::Annotation)],
));
static LIST_EXPRESSION: ElementRule = either(rule(
    Any,
    Edm,
    &[expressions(0, None), many(K::Annotation)],
));
static RECORD_EXPRESSION: ElementRule = either(rule(
    Any,
    Edm,
    &[many(K::PropertyValue), many(K::Annotation)],
));
static NULL_EXPRESSION: ElementRule = either(rule(
    Any,
    Edm,
    &[many(K::Annotation)],
));

/// The rule for `kind` in documents of `era`.
pub fn rule_for(kind: ElementKind, era: Era) -> &'static ElementRule {
    match kind {
        K::Edmx => &EDMX,
        K::Reference => &REFERENCE,
        K::Include => &INCLUDE,
        K::IncludeAnnotations => &INCLUDE_ANNOTATIONS,
        K::DataServices => &DATA_SERVICES,
        K::Schema => &SCHEMA,
        K::Using => &USING,
        K::EntityType => &ENTITY_TYPE,
        K::ComplexType => &COMPLEX_TYPE,
        K::EnumType => &ENUM_TYPE,
        K::Member => &MEMBER,
        K::TypeDefinition => &TYPE_DEFINITION,
        K::Key => &KEY,
        K::PropertyRef => &PROPERTY_REF,
        K::Property => &PROPERTY,
        K::NavigationProperty => &NAVIGATION_PROPERTY,
        K::ReferentialConstraint => &REFERENTIAL_CONSTRAINT,
        K::OnDelete => &ON_DELETE,
        K::Principal => &PRINCIPAL,
        K::Dependent => &DEPENDENT,
        K::Association => &ASSOCIATION,
        K::End => &END,
        K::Action => &ACTION,
        K::Function => &FUNCTION,
        K::Parameter => &PARAMETER,
        K::ReturnType => &RETURN_TYPE,
        K::Term => &TERM,
        K::ValueTerm => &VALUE_TERM,
        K::EntityContainer => &ENTITY_CONTAINER,
        K::EntitySet => &ENTITY_SET,
        K::Singleton => &SINGLETON,
        K::NavigationPropertyBinding => &NAVIGATION_PROPERTY_BINDING,
        K::ActionImport => &ACTION_IMPORT,
        K::FunctionImport if era == Era::Legacy => &LEGACY_FUNCTION_IMPORT,
        K::FunctionImport => &FUNCTION_IMPORT,
        K::AssociationSet => &ASSOCIATION_SET,
        K::Annotations => &ANNOTATIONS,
        K::Annotation => &ANNOTATION,
        K::ValueAnnotation => &VALUE_ANNOTATION,
        K::PropertyValue => &PROPERTY_VALUE,
        K::Documentation => &DOCUMENTATION,
        K::Summary => &SUMMARY,
        K::LongDescription => &LONG_DESCRIPTION,
        K::Expression(expr) => match expr {
            ExprKind::Constant(_) | ExprKind::Path(_) | ExprKind::LabeledElementReference => {
                &TEXT_EXPRESSION
            }
            ExprKind::Binary(_) => &BINARY_EXPRESSION,
            ExprKind::Not
            | ExprKind::Neg
            | ExprKind::Cast
            | ExprKind::IsOf
            | ExprKind::LabeledElement
            | ExprKind::UrlRef => &UNARY_EXPRESSION,
            ExprKind::If => &IF_EXPRESSION,
            ExprKind::Apply | ExprKind::Collection => &LIST_EXPRESSION,
            ExprKind::Record => &RECORD_EXPRESSION,
            ExprKind::Null => &NULL_EXPRESSION,
        },
    }
}

impl ElementRule {
    /// Can this element occur at all in a document of `era`?
    fn admissible_in(&self, era: Era) -> bool {
        match self.era {
            RuleEra::Any => true,
            RuleEra::Legacy => era == Era::Legacy,
            RuleEra::Current => era == Era::Current || self.either_ns,
        }
    }
}

/// Outcome of admitting an element start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept(ElementKind, Generation),
    /// Foreign markup; the whole subtree is ignored
    Skip,
}

/// Outcome of an element end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Element(ElementKind),
    Skipped,
}

#[derive(Debug)]
struct OpenElement {
    kind: ElementKind,
    name: String,
    rule: &'static ElementRule,
    counts: Vec<u32>,
}

/// Push/pop validator over the element stack of one document.
#[derive(Debug)]
pub struct GrammarValidator {
    era: Era,
    strict: bool,
    stack: Vec<OpenElement>,
    skip_depth: usize,
    legacy_edm: String,
}

impl GrammarValidator {
    pub fn new(era: Era, strict: bool) -> Self {
        Self {
            era,
            strict,
            stack: Vec::new(),
            skip_depth: 0,
            legacy_edm: EDM_V3.to_string(),
        }
    }

    pub fn era(&self) -> Era {
        self.era
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// True while inside a skipped foreign subtree.
    pub fn skipping(&self) -> bool {
        self.skip_depth > 0
    }

    pub fn open(&mut self, start: &StartElement) -> Result<Admission, ErrorKind> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(Admission::Skip);
        }

        let namespace = start.namespace();
        let is_root = self.stack.is_empty();
        if is_root && (start.name != "Edmx" || !is_edmx_namespace(namespace)) {
            return Err(ErrorKind::NotEdmxRoot {
                element: start.name.clone(),
            });
        }

        let Some(generation) = Generation::of_namespace(namespace) else {
            return self.foreign(start);
        };

        let kind = match ElementKind::from_name(&start.name) {
            Some(kind) => kind,
            None => {
                return Err(ErrorKind::IllegalChild {
                    parent: self.parent_name(),
                    child: start.name.clone(),
                })
            }
        };
        let rule = rule_for(kind, self.era);

        if is_edmx_namespace(namespace) != (rule.ns == NsKind::Edmx) {
            return Err(self.wrong_namespace(start, rule));
        }
        self.check_era(start, rule, generation)?;

        if let Some(parent) = self.stack.last_mut() {
            let Some(slot) = parent.rule.children.iter().position(|c| c.child.matches(kind)) else {
                return Err(ErrorKind::IllegalChild {
                    parent: parent.name.clone(),
                    child: start.name.clone(),
                });
            };
            let child_rule = parent.rule.children[slot];
            parent.counts[slot] += 1;
            if let Some(max) = child_rule.max {
                if parent.counts[slot] > max {
                    return Err(ErrorKind::TooManyChildren {
                        parent: parent.name.clone(),
                        child: child_rule.child.label().to_string(),
                        max,
                    });
                }
            }
        }

        if kind == ElementKind::Schema && generation != Generation::V4 {
            self.legacy_edm = namespace.to_string();
        }
        self.stack.push(OpenElement {
            kind,
            name: start.name.clone(),
            rule,
            counts: vec![0; rule.children.len()],
        });
        Ok(Admission::Accept(kind, generation))
    }

    pub fn close(&mut self) -> Result<Closed, ErrorKind> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(Closed::Skipped);
        }
        let Some(element) = self.stack.pop() else {
            return Ok(Closed::Skipped);
        };
        if self.strict {
            for (child, found) in element.rule.children.iter().zip(&element.counts) {
                if *found < child.min && self.child_admissible(child.child) {
                    return Err(ErrorKind::MissingChildren {
                        parent: element.name,
                        child: child.child.label().to_string(),
                        min: child.min,
                        found: *found,
                    });
                }
            }
        }
        Ok(Closed::Element(element.kind))
    }

    /// Check character data; returns whether the text belongs to the open element.
    pub fn text(&self, text: &str) -> Result<bool, ErrorKind> {
        if self.skip_depth > 0 {
            return Ok(false);
        }
        let Some(element) = self.stack.last() else {
            return Ok(false);
        };
        if element.rule.text {
            return Ok(true);
        }
        if text.trim().is_empty() {
            return Ok(false);
        }
        Err(ErrorKind::UnexpectedText {
            element: element.name.clone(),
            text: text.trim().to_string(),
        })
    }

    fn foreign(&mut self, start: &StartElement) -> Result<Admission, ErrorKind> {
        match self.era {
            Era::Legacy => {
                trace!(element = %start.name, namespace = %start.namespace(), "skipping foreign markup");
                self.skip_depth = 1;
                Ok(Admission::Skip)
            }
            Era::Current => Err(ErrorKind::WrongNamespace {
                element: start.name.clone(),
                namespace: start.namespace().to_string(),
                expected: EDM_V4.to_string(),
            }),
        }
    }

    fn check_era(
        &self,
        start: &StartElement,
        rule: &ElementRule,
        generation: Generation,
    ) -> Result<(), ErrorKind> {
        let mismatch = |generation: Generation| ErrorKind::DialectMismatch {
            element: start.name.clone(),
            generation: generation.to_string(),
        };
        match self.era {
            Era::Current => {
                if generation != Generation::V4 {
                    return Err(self.wrong_namespace(start, rule));
                }
                if rule.era == RuleEra::Legacy {
                    return Err(mismatch(Generation::V4));
                }
            }
            Era::Legacy if generation == Generation::V4 => {
                if !rule.either_ns {
                    return Err(self.wrong_namespace(start, rule));
                }
            }
            Era::Legacy => {
                if rule.era == RuleEra::Current {
                    return Err(mismatch(generation));
                }
                if rule.since_v3 && generation == Generation::V2 {
                    return Err(mismatch(generation));
                }
            }
        }
        Ok(())
    }

    fn wrong_namespace(&self, start: &StartElement, rule: &ElementRule) -> ErrorKind {
        let expected = match (rule.ns, self.era) {
            (NsKind::Edmx, Era::Current) => EDMX_V4.to_string(),
            (NsKind::Edmx, Era::Legacy) => EDMX_LEGACY.to_string(),
            (NsKind::Edm, Era::Current) => EDM_V4.to_string(),
            (NsKind::Edm, Era::Legacy) => self.legacy_edm.clone(),
        };
        ErrorKind::WrongNamespace {
            element: start.name.clone(),
            namespace: start.namespace().to_string(),
            expected,
        }
    }

    fn child_admissible(&self, child: ChildMatch) -> bool {
        match child {
            ChildMatch::Element(kind) => rule_for(kind, self.era).admissible_in(self.era),
            ChildMatch::Expression => true,
        }
    }

    fn parent_name(&self) -> String {
        self.stack
            .last()
            .map(|e| e.name.clone())
            .unwrap_or_default()
    }

    /// Kind of the innermost open element.
    pub fn current(&self) -> Option<ElementKind> {
        self.stack.last().map(|e| e.kind)
    }
}
