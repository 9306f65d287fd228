//! Legacy association pre-resolution (first pass)
//!
//! V2/V3 documents describe relationships with `Association` and `AssociationSet`
//! elements that may appear anywhere in the document, after or before the
//! `NavigationProperty` elements that use them. This pass reads the whole event stream
//! once and resolves every legacy navigation property and entity-set binding into the
//! shape the main pass writes directly. It also collects the alias table of the
//! document, for both eras, so the main pass can normalize names declared later.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConversionError, ErrorKind, SourceSpan};
use crate::parser::{StartElement, XmlEvent};

use super::names::AliasTable;
use super::{ElementKind, Era, Generation, CURRENT_VERSION_MARKER};

/// A legacy navigation property resolved against its association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNavigation {
    /// Qualified name of the target entity type
    pub type_name: String,
    pub collection: bool,
    pub nullable: bool,
    pub partner: Option<String>,
    pub on_delete: Option<String>,
    /// `(dependent property, principal property)` pairs
    pub constraint: Vec<(String, String)>,
}

/// Navigation binding inferred from an association set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationBinding {
    /// Navigation path, type-cast prefixed when declared on a derived type
    pub path: String,
    /// Entity set the path binds to
    pub target: String,
}

/// Output of the first pass; read-only during the main pass.
#[derive(Debug, Clone)]
pub struct PrepassIndex {
    pub version: String,
    pub era: Era,
    pub aliases: AliasTable,
    navigation: HashMap<(String, String), ResolvedNavigation>,
    bindings: HashMap<(String, String), Vec<NavigationBinding>>,
}

impl PrepassIndex {
    /// Resolved shape of navigation property `name` declared on `type_name`.
    pub fn navigation(&self, type_name: &str, name: &str) -> Option<&ResolvedNavigation> {
        self.navigation
            .get(&(type_name.to_string(), name.to_string()))
    }

    /// Bindings of entity set `set` in container `container` (qualified).
    pub fn bindings(&self, container: &str, set: &str) -> &[NavigationBinding] {
        self.bindings
            .get(&(container.to_string(), set.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn navigation_count(&self) -> usize {
        self.navigation.len()
    }
}

#[derive(Debug, Default)]
struct AssociationEnd {
    role: String,
    type_name: String,
    multiplicity: String,
    on_delete: Option<String>,
}

#[derive(Debug, Default)]
struct Constraint {
    principal_role: String,
    principal: Vec<String>,
    dependent_role: String,
    dependent: Vec<String>,
    span: SourceSpan,
}

#[derive(Debug, Default)]
struct Association {
    ends: Vec<AssociationEnd>,
    constraint: Option<Constraint>,
}

#[derive(Debug)]
struct PendingNavigation {
    declaring_type: String,
    name: String,
    relationship: String,
    from_role: String,
    to_role: String,
    span: SourceSpan,
}

#[derive(Debug, Default)]
struct AssociationSet {
    container: String,
    name: String,
    association: String,
    ends: Vec<(Option<String>, String)>,
    span: SourceSpan,
}

/// Mutable state of the first pass.
#[derive(Debug)]
pub struct AssociationScanner {
    version: String,
    aliases: AliasTable,
    stack: Vec<Option<ElementKind>>,
    foreign_depth: usize,
    schema: String,
    current_type: String,
    container: String,
    association: Option<(String, Association)>,
    association_set: Option<AssociationSet>,
    associations: HashMap<String, Association>,
    association_sets: Vec<AssociationSet>,
    pending: Vec<PendingNavigation>,
    /// `(container, set)` → entity type as written
    set_types: HashMap<(String, String), String>,
    /// qualified entity type → base type as written
    base_types: HashMap<String, String>,
}

impl Default for AssociationScanner {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION_MARKER.to_string(),
            aliases: AliasTable::new(),
            stack: Vec::new(),
            foreign_depth: 0,
            schema: String::new(),
            current_type: String::new(),
            container: String::new(),
            association: None,
            association_set: None,
            associations: HashMap::new(),
            association_sets: Vec::new(),
            pending: Vec::new(),
            set_types: HashMap::new(),
            base_types: HashMap::new(),
        }
    }
}

/// Run the first pass over a complete event stream.
pub fn prescan(events: &[XmlEvent]) -> Result<PrepassIndex, ConversionError> {
    let mut scanner = AssociationScanner::default();
    for event in events {
        match event {
            XmlEvent::Start(start) => scanner.start(start),
            XmlEvent::End(_) => scanner.end(),
            XmlEvent::Text(_) => {}
        }
    }
    scanner.finish()
}

impl AssociationScanner {
    fn era(&self) -> Era {
        Era::from_version(&self.version)
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }

    pub fn start(&mut self, start: &StartElement) {
        if self.foreign_depth > 0 || Generation::of_namespace(start.namespace()).is_none() {
            self.foreign_depth += 1;
            return;
        }
        let kind = ElementKind::from_name(&start.name);
        let parent = self.stack.last().copied().flatten();
        self.stack.push(kind);
        let Some(kind) = kind else {
            return;
        };
        let attr = |name: &str| start.attribute(name).unwrap_or_default().to_string();

        match kind {
            ElementKind::Edmx => {
                if let Some(version) = start.attribute("Version") {
                    self.version = version.to_string();
                }
            }
            ElementKind::Schema => {
                self.schema = attr("Namespace");
                self.aliases.declare(&self.schema, start.attribute("Alias"));
            }
            ElementKind::Include | ElementKind::Using => {
                if let Some(namespace) = start.attribute("Namespace") {
                    self.aliases.declare(namespace, start.attribute("Alias"));
                }
            }
            ElementKind::EntityType | ElementKind::ComplexType => {
                self.current_type = self.qualify(&attr("Name"));
                if let Some(base) = start.attribute("BaseType") {
                    self.base_types.insert(self.current_type.clone(), base.to_string());
                }
            }
            ElementKind::EntityContainer => {
                self.container = self.qualify(&attr("Name"));
            }
            _ if self.era() == Era::Current => {}
            ElementKind::NavigationProperty => {
                if let Some(relationship) = start.attribute("Relationship") {
                    self.pending.push(PendingNavigation {
                        declaring_type: self.current_type.clone(),
                        name: attr("Name"),
                        relationship: relationship.to_string(),
                        from_role: attr("FromRole"),
                        to_role: attr("ToRole"),
                        span: start.span.clone(),
                    });
                }
            }
            ElementKind::Association => {
                self.association = Some((self.qualify(&attr("Name")), Association::default()));
            }
            ElementKind::AssociationSet => {
                self.association_set = Some(AssociationSet {
                    container: self.container.clone(),
                    name: attr("Name"),
                    association: attr("Association"),
                    ends: Vec::new(),
                    span: start.span.clone(),
                });
            }
            ElementKind::End => match parent {
                Some(ElementKind::Association) => {
                    if let Some((_, association)) = self.association.as_mut() {
                        association.ends.push(AssociationEnd {
                            role: attr("Role"),
                            type_name: attr("Type"),
                            multiplicity: attr("Multiplicity"),
                            on_delete: None,
                        });
                    }
                }
                Some(ElementKind::AssociationSet) => {
                    if let Some(set) = self.association_set.as_mut() {
                        set.ends
                            .push((start.attribute("Role").map(str::to_string), attr("EntitySet")));
                    }
                }
                _ => {}
            },
            ElementKind::OnDelete => {
                if let Some(end) = self
                    .association
                    .as_mut()
                    .and_then(|(_, a)| a.ends.last_mut())
                {
                    end.on_delete = start.attribute("Action").map(str::to_string);
                }
            }
            ElementKind::ReferentialConstraint => {
                if let Some((_, association)) = self.association.as_mut() {
                    association.constraint = Some(Constraint {
                        span: start.span.clone(),
                        ..Constraint::default()
                    });
                }
            }
            ElementKind::Principal | ElementKind::Dependent => {
                if let Some(constraint) = self.constraint_mut() {
                    if kind == ElementKind::Principal {
                        constraint.principal_role = attr("Role");
                    } else {
                        constraint.dependent_role = attr("Role");
                    }
                }
            }
            ElementKind::PropertyRef => {
                let name = attr("Name");
                match parent {
                    Some(ElementKind::Principal) => {
                        if let Some(c) = self.constraint_mut() {
                            c.principal.push(name);
                        }
                    }
                    Some(ElementKind::Dependent) => {
                        if let Some(c) = self.constraint_mut() {
                            c.dependent.push(name);
                        }
                    }
                    _ => {}
                }
            }
            ElementKind::EntitySet => {
                self.set_types.insert(
                    (self.container.clone(), attr("Name")),
                    attr("EntityType"),
                );
            }
            _ => {}
        }
    }

    pub fn end(&mut self) {
        if self.foreign_depth > 0 {
            self.foreign_depth -= 1;
            return;
        }
        match self.stack.pop().flatten() {
            Some(ElementKind::Association) => {
                if let Some((name, association)) = self.association.take() {
                    self.associations.insert(name, association);
                }
            }
            Some(ElementKind::AssociationSet) => {
                if let Some(set) = self.association_set.take() {
                    self.association_sets.push(set);
                }
            }
            _ => {}
        }
    }

    fn constraint_mut(&mut self) -> Option<&mut Constraint> {
        self.association
            .as_mut()
            .and_then(|(_, a)| a.constraint.as_mut())
    }

    /// Resolve everything collected; errors point at the offending construct.
    pub fn finish(self) -> Result<PrepassIndex, ConversionError> {
        let era = self.era();
        let mut index = PrepassIndex {
            version: self.version.clone(),
            era,
            aliases: self.aliases,
            navigation: HashMap::new(),
            bindings: HashMap::new(),
        };
        if era == Era::Current {
            return Ok(index);
        }

        for (name, association) in &self.associations {
            if let Some(c) = &association.constraint {
                if c.principal.len() != c.dependent.len() {
                    return Err(ErrorKind::ReferentialConstraintMismatch {
                        association: name.clone(),
                        principal: c.principal.len(),
                        dependent: c.dependent.len(),
                    }
                    .at(&c.span));
                }
            }
        }

        let aliases = &index.aliases;
        // (association, from role) → navigation name, for partner lookup
        let mut by_role: HashMap<(String, &str), &str> = HashMap::new();
        for nav in &self.pending {
            by_role.insert(
                (aliases.qualified_name(&nav.relationship), nav.from_role.as_str()),
                nav.name.as_str(),
            );
        }

        let mut resolved = HashMap::new();
        for nav in &self.pending {
            let association_name = aliases.qualified_name(&nav.relationship);
            let association = self.associations.get(&association_name).ok_or_else(|| {
                ErrorKind::UnknownAssociation {
                    element: nav.name.clone(),
                    association: nav.relationship.clone(),
                }
                .at(&nav.span)
            })?;
            let end = |role: &str| {
                association
                    .ends
                    .iter()
                    .find(|e| e.role == role)
                    .ok_or_else(|| {
                        ErrorKind::UnknownRole {
                            association: association_name.clone(),
                            role: role.to_string(),
                        }
                        .at(&nav.span)
                    })
            };
            let from = end(&nav.from_role)?;
            let to = end(&nav.to_role)?;

            let constraint = match &association.constraint {
                Some(c) if c.dependent_role == nav.from_role && c.principal_role == nav.to_role => c
                    .dependent
                    .iter()
                    .cloned()
                    .zip(c.principal.iter().cloned())
                    .collect(),
                _ => Vec::new(),
            };

            resolved.insert(
                (nav.declaring_type.clone(), nav.name.clone()),
                ResolvedNavigation {
                    type_name: aliases.qualified_name(&to.type_name),
                    collection: to.multiplicity == "*",
                    nullable: to.multiplicity == "0..1",
                    partner: by_role
                        .get(&(association_name.clone(), nav.to_role.as_str()))
                        .map(|s| s.to_string()),
                    on_delete: from.on_delete.clone(),
                    constraint,
                },
            );
        }

        let mut bindings: HashMap<(String, String), Vec<NavigationBinding>> = HashMap::new();
        for set in &self.association_sets {
            let association_name = aliases.qualified_name(&set.association);
            let association = self.associations.get(&association_name).ok_or_else(|| {
                ErrorKind::UnknownAssociation {
                    element: set.name.clone(),
                    association: set.association.clone(),
                }
                .at(&set.span)
            })?;

            let mut ends = Vec::new();
            for (position, (role, entity_set)) in set.ends.iter().enumerate() {
                let role = match role {
                    Some(role) if association.ends.iter().any(|e| &e.role == role) => role.clone(),
                    Some(role) => {
                        return Err(ErrorKind::UnknownRole {
                            association: association_name.clone(),
                            role: role.clone(),
                        }
                        .at(&set.span))
                    }
                    None => association
                        .ends
                        .get(position)
                        .map(|e| e.role.clone())
                        .unwrap_or_default(),
                };
                ends.push((role, entity_set.clone()));
            }

            for (role, entity_set) in &ends {
                let Some((other_role, other_set)) = ends.iter().find(|(r, _)| r != role) else {
                    continue;
                };
                let set_type = self
                    .set_types
                    .get(&(set.container.clone(), entity_set.clone()))
                    .map(|t| aliases.qualified_name(t))
                    .unwrap_or_default();
                for nav in self.pending.iter().filter(|n| {
                    &n.from_role == role
                        && &n.to_role == other_role
                        && aliases.qualified_name(&n.relationship) == association_name
                }) {
                    // members inherited by the set's type need no cast
                    let derived = derives_from(&self.base_types, aliases, &nav.declaring_type, &set_type);
                    let path = if derived {
                        format!("{}/{}", nav.declaring_type, nav.name)
                    } else {
                        nav.name.clone()
                    };
                    bindings
                        .entry((set.container.clone(), entity_set.clone()))
                        .or_default()
                        .push(NavigationBinding {
                            path,
                            target: other_set.clone(),
                        });
                }
            }
        }

        debug!(
            navigation_properties = resolved.len(),
            association_sets = self.association_sets.len(),
            "resolved legacy associations"
        );
        index.navigation = resolved;
        index.bindings = bindings;
        Ok(index)
    }
}

/// True if `derived` is a proper subtype of `ancestor`.
fn derives_from(
    base_types: &HashMap<String, String>,
    aliases: &AliasTable,
    derived: &str,
    ancestor: &str,
) -> bool {
    let mut current = derived.to_string();
    // bounded so that a cyclic hierarchy cannot loop
    for _ in 0..=base_types.len() {
        let Some(base) = base_types.get(&current) else {
            return false;
        };
        current = aliases.qualified_name(base);
        if current == ancestor {
            return true;
        }
    }
    false
}
