//! Semantic tree builder (main pass)
//!
//! Every element the grammar admits pushes a [`Frame`]. Attributes are converted when
//! the element opens; when it closes, the frame is folded into its parent. Annotations
//! and expression values travel upwards the same way, so the whole document is built
//! in a single walk over the event stream.

use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::edm::associations::PrepassIndex;
use crate::edm::attributes::{map_attributes, type_reference, AttributeContext, ForeignNamespaces};
use crate::edm::grammar::{Admission, Closed, GrammarValidator};
use crate::edm::names::{normalize_reference_uri, split_qualified, DEFAULT_PRIMITIVE};
use crate::edm::vocabularies::{VocabularyUpgrader, CORE};
use crate::edm::{ElementKind, Era, ExprKind, CURRENT_VERSION_MARKER, METADATA_NS, SAP_NS};
use crate::error::{ConversionError, ErrorKind, SourceSpan};
use crate::parser::{StartElement, TextContent, XmlEvent};
use crate::util::is_blank;
use crate::ConvertOptions;

use super::document::CsdlDocument;
use super::expressions;

/// Source line of a node, written when line numbers are requested.
pub const LINE_KEY: &str = "@parser.line";

const JSON_SCHEMA_TERM: &str = "Org.OData.JSON.V1.Schema";
const MEDIA_TYPE_TERM: &str = "Org.OData.Core.V1.MediaType";

/// Where annotations nested in an element are written.
#[derive(Debug, Clone)]
enum AnnotationSink {
    /// The element's own object, keys prefixed with the given member name
    Own(String),
    /// The object of an enclosing frame, keys prefixed with the given member name
    Frame(usize, String),
    Discard,
}

/// Shape of a legacy `FunctionImport`, decided when it opens.
#[derive(Debug)]
struct LegacyImport {
    kind: &'static str,
    bound: bool,
    composable: bool,
    entity_set: Option<String>,
    return_type: Option<Value>,
}

#[derive(Debug)]
struct Frame {
    kind: ElementKind,
    name: String,
    object: Map<String, Value>,
    /// Value of annotation-like elements and operands of expressions
    operand: Option<Value>,
    text: String,
    sink: AnnotationSink,
    /// Object and key an annotation-like element writes its value to
    dest: Option<(usize, String)>,
    qualifier: Option<String>,
    members: i64,
    parse_json: bool,
    parameters: Vec<Value>,
    return_type: Option<Value>,
    legacy_import: Option<LegacyImport>,
    span: SourceSpan,
}

impl Frame {
    fn new(kind: ElementKind, start: &StartElement) -> Self {
        Self {
            kind,
            name: start.attribute("Name").unwrap_or_default().to_string(),
            object: Map::new(),
            operand: None,
            text: String::new(),
            sink: AnnotationSink::Own(String::new()),
            dest: None,
            qualifier: None,
            members: 0,
            parse_json: false,
            parameters: Vec::new(),
            return_type: None,
            legacy_import: None,
            span: start.span.clone(),
        }
    }
}

/// Build the normalized document from the event stream and the first-pass index.
pub fn build_document(
    events: &[XmlEvent],
    index: &PrepassIndex,
    options: &ConvertOptions,
) -> Result<CsdlDocument, ConversionError> {
    let mut builder = TreeBuilder::new(index, options);
    for event in events {
        match event {
            XmlEvent::Start(start) => builder.start(start).map_err(|kind| kind.at(&start.span))?,
            XmlEvent::End(end) => builder.end(&end.span)?,
            XmlEvent::Text(text) => builder.text(text).map_err(|kind| kind.at(&text.span))?,
        }
    }
    if !builder.root_seen {
        let span = events.first().map(XmlEvent::span).cloned().unwrap_or(SourceSpan {
            line: 1,
            column: 1,
            text: String::new(),
        });
        return Err(ErrorKind::NotEdmxRoot {
            element: String::new(),
        }
        .at(&span));
    }
    Ok(builder.finish())
}

/// Mutable state of the main pass.
pub struct TreeBuilder<'a> {
    index: &'a PrepassIndex,
    options: &'a ConvertOptions,
    validator: GrammarValidator,
    upgrader: VocabularyUpgrader,
    foreign: ForeignNamespaces,
    frames: Vec<Frame>,
    references: Map<String, Value>,
    schemas: Map<String, Value>,
    entity_container: Option<String>,
    default_container: bool,
    schema_namespace: String,
    container: String,
    root_seen: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(index: &'a PrepassIndex, options: &'a ConvertOptions) -> Self {
        Self {
            index,
            options,
            validator: GrammarValidator::new(index.era, options.strict),
            upgrader: VocabularyUpgrader::new(),
            foreign: ForeignNamespaces::default(),
            frames: Vec::new(),
            references: Map::new(),
            schemas: Map::new(),
            entity_container: None,
            default_container: false,
            schema_namespace: String::new(),
            container: String::new(),
            root_seen: false,
        }
    }

    fn legacy(&self) -> bool {
        self.index.era == Era::Legacy
    }

    // ------------------------------------------------------------------
    // Element start
    // ------------------------------------------------------------------

    pub fn start(&mut self, start: &StartElement) -> Result<(), ErrorKind> {
        let kind = match self.validator.open(start)? {
            Admission::Accept(kind, _) => kind,
            Admission::Skip => return Ok(()),
        };
        self.root_seen = true;
        let index = self.index;
        let ctx = AttributeContext {
            kind,
            era: index.era,
            version: &index.version,
            aliases: &index.aliases,
            strict: self.options.strict,
            include_foreign: self.options.include_foreign_markup_as_annotations,
        };

        let mut frame = Frame::new(kind, start);
        match kind {
            ElementKind::EntityType
            | ElementKind::ComplexType
            | ElementKind::EnumType
            | ElementKind::TypeDefinition
            | ElementKind::Action
            | ElementKind::Function
            | ElementKind::Term
            | ElementKind::EntityContainer
            | ElementKind::NavigationProperty => {
                frame.object.insert("$Kind".to_string(), json!(kind.name()));
            }
            ElementKind::ValueTerm => {
                frame.object.insert("$Kind".to_string(), json!("Term"));
            }
            ElementKind::EntitySet => {
                frame.object.insert("$Collection".to_string(), Value::Bool(true));
            }
            ElementKind::Parameter => {
                frame.object.insert("$Name".to_string(), json!(frame.name));
            }
            _ => {}
        }

        map_attributes(&ctx, start, &mut frame.object, &mut self.foreign)?;

        if !kind.is_expression() && start.attributes.iter().any(|a| a.namespace.as_deref() == Some(SAP_NS)) {
            let declaring_type = self.declaring_type();
            self.upgrader.upgrade(
                kind,
                start,
                declaring_type.as_deref(),
                &mut frame.object,
                &index.aliases,
            );
        }

        self.open_frame(&ctx, start, &mut frame)?;
        self.frames.push(frame);
        Ok(())
    }

    fn open_frame(
        &mut self,
        ctx: &AttributeContext<'_>,
        start: &StartElement,
        frame: &mut Frame,
    ) -> Result<(), ErrorKind> {
        let index = self.index;
        let aliases = &index.aliases;
        let parent = self.frames.len().saturating_sub(1);
        match frame.kind {
            ElementKind::Reference => {
                frame.name = normalize_reference_uri(start.attribute("Uri").unwrap_or_default());
            }
            ElementKind::Schema => {
                self.schema_namespace = start.attribute("Namespace").unwrap_or_default().to_string();
                trace!(namespace = %self.schema_namespace, "schema");
            }
            ElementKind::EntityType => {
                if start.attribute_ns(METADATA_NS, "HasStream") == Some("true") {
                    frame.object.insert("$HasStream".to_string(), Value::Bool(true));
                }
            }
            ElementKind::Member => {
                let Some(enum_type) = self.frames.get_mut(parent) else {
                    return Ok(());
                };
                let position = enum_type.members;
                enum_type.members += 1;
                let value = match start.attribute("Value") {
                    Some(raw) => raw.trim().parse::<i64>().map_err(|_| ErrorKind::InvalidValue {
                        element: start.name.clone(),
                        attribute: "Value".to_string(),
                        value: raw.to_string(),
                        reason: "expected an integer".to_string(),
                    })?,
                    None => position,
                };
                enum_type.object.insert(frame.name.clone(), Value::from(value));
                frame.sink = AnnotationSink::Frame(parent, frame.name.clone());
            }
            ElementKind::Key => {
                frame.operand = Some(Value::Array(Vec::new()));
                frame.sink = AnnotationSink::Discard;
            }
            ElementKind::PropertyRef => {
                let name = start.attribute("Name").unwrap_or_default();
                let entry = match start.attribute("Alias") {
                    Some(alias) => json!({ alias: name }),
                    None => json!(name),
                };
                if let Some(Frame { operand: Some(Value::Array(keys)), .. }) = self.frames.last_mut() {
                    keys.push(entry);
                }
                frame.sink = AnnotationSink::Discard;
            }
            ElementKind::NavigationProperty if self.legacy() => {
                self.resolve_legacy_navigation(start, frame)?;
            }
            ElementKind::ReferentialConstraint if !self.legacy() => {
                let property = start.attribute("Property").unwrap_or_default();
                let referenced = start.attribute("ReferencedProperty").unwrap_or_default();
                if let Some(map) = self.frames.last_mut().and_then(|p| constraint_map(&mut p.object)) {
                    map.insert(property.to_string(), json!(referenced));
                }
                frame.sink = AnnotationSink::Own(property.to_string());
            }
            ElementKind::OnDelete if !self.legacy() => {
                let action = start.attribute("Action").unwrap_or_default();
                if let Some(navigation) = self.frames.get_mut(parent) {
                    navigation.object.insert("$OnDelete".to_string(), json!(action));
                }
                frame.sink = AnnotationSink::Frame(parent, "$OnDelete".to_string());
            }
            ElementKind::EntityContainer => {
                let qualified = format!("{}.{}", self.schema_namespace, frame.name);
                self.container = qualified.clone();
                let is_default = !self.legacy()
                    || start.attribute_ns(METADATA_NS, "IsDefaultEntityContainer") == Some("true");
                if is_default && !self.default_container {
                    self.default_container = true;
                    self.entity_container = Some(qualified);
                } else if self.entity_container.is_none() {
                    self.entity_container = Some(qualified);
                }
            }
            ElementKind::EntitySet if self.legacy() => {
                let bindings = index.bindings(&self.container, &frame.name);
                if let (false, Some(map)) = (bindings.is_empty(), binding_map(&mut frame.object)) {
                    for binding in bindings {
                        map.insert(binding.path.clone(), json!(binding.target));
                    }
                }
            }
            ElementKind::NavigationPropertyBinding => {
                let path = aliases.target(start.attribute("Path").unwrap_or_default());
                let target = aliases.target(start.attribute("Target").unwrap_or_default());
                if let Some(map) = self.frames.last_mut().and_then(|p| binding_map(&mut p.object)) {
                    map.insert(path, Value::String(target));
                }
                frame.sink = AnnotationSink::Discard;
            }
            ElementKind::FunctionImport if self.legacy() => {
                frame.legacy_import = Some(legacy_import(ctx, start));
            }
            ElementKind::Annotations => {
                frame.name = aliases.target(start.attribute("Target").unwrap_or_default());
                frame.qualifier = start.attribute("Qualifier").map(str::to_string);
            }
            ElementKind::Annotation | ElementKind::ValueAnnotation => {
                let term = start.attribute("Term").unwrap_or_default();
                let qualifier = match (start.attribute("Qualifier"), self.frames.get(parent)) {
                    (Some(q), _) => Some(q.to_string()),
                    (None, Some(p)) if p.kind == ElementKind::Annotations => p.qualifier.clone(),
                    (None, _) => None,
                };
                let mut key = format!("@{}", aliases.term_name(term));
                if let Some(q) = qualifier {
                    key = format!("{}#{}", key, q);
                }
                frame.name = aliases.term_namespace_form(term);
                frame.dest = self.resolve_sink(parent).map(|(i, prefix)| (i, prefix + &key));
                frame.sink = match &frame.dest {
                    Some((i, key)) => AnnotationSink::Frame(*i, key.clone()),
                    None => AnnotationSink::Discard,
                };
                frame.operand = inline_operand(start, ctx);
            }
            ElementKind::PropertyValue => {
                let property = start.attribute("Property").unwrap_or_default().to_string();
                frame.dest = Some((parent, property.clone()));
                frame.sink = AnnotationSink::Frame(parent, property);
                frame.operand = inline_operand(start, ctx);
            }
            ElementKind::Documentation => {
                frame.sink = match self.resolve_sink(parent) {
                    Some((i, prefix)) => AnnotationSink::Frame(i, prefix),
                    None => AnnotationSink::Discard,
                };
            }
            ElementKind::Summary | ElementKind::LongDescription => {
                frame.dest = self.resolve_sink(parent);
            }
            ElementKind::Expression(expr) => {
                frame.operand = expressions::initial_operand(expr).or_else(|| inline_operand(start, ctx));
                match expr {
                    ExprKind::Record => {
                        if let Some(type_name) = start.attribute("Type") {
                            let type_name = aliases.qualified_name(type_name);
                            frame.object.insert("@type".to_string(), json!(self.type_uri(&type_name)));
                        }
                    }
                    ExprKind::Apply => {
                        let function = aliases.qualified_name(start.attribute("Function").unwrap_or_default());
                        frame.object.insert("$Function".to_string(), json!(function));
                    }
                    ExprKind::LabeledElement => {
                        frame.object.insert("$Name".to_string(), json!(frame.name));
                    }
                    ExprKind::Collection => frame.sink = AnnotationSink::Discard,
                    _ => {}
                }
            }
            ElementKind::Edmx
            | ElementKind::DataServices
            | ElementKind::Using
            | ElementKind::Association
            | ElementKind::End
            | ElementKind::Principal
            | ElementKind::Dependent
            | ElementKind::AssociationSet
            | ElementKind::ReferentialConstraint
            | ElementKind::OnDelete => {
                frame.sink = AnnotationSink::Discard;
            }
            _ => {}
        }
        Ok(())
    }

    /// Fill a legacy navigation property from the first-pass index.
    fn resolve_legacy_navigation(&self, start: &StartElement, frame: &mut Frame) -> Result<(), ErrorKind> {
        let declaring_type = self.declaring_type().unwrap_or_default();
        let Some(resolved) = self.index.navigation(&declaring_type, &frame.name) else {
            return Err(ErrorKind::UnknownAssociation {
                element: start.name.clone(),
                association: start.attribute("Relationship").unwrap_or_default().to_string(),
            });
        };
        let object = &mut frame.object;
        object.insert("$Type".to_string(), json!(resolved.type_name));
        if resolved.collection {
            object.insert("$Collection".to_string(), Value::Bool(true));
        } else if resolved.nullable {
            object.insert("$Nullable".to_string(), Value::Bool(true));
        }
        if let Some(partner) = &resolved.partner {
            object.insert("$Partner".to_string(), json!(partner));
        }
        if let (false, Some(map)) = (resolved.constraint.is_empty(), constraint_map(object)) {
            for (dependent, principal) in &resolved.constraint {
                map.insert(dependent.clone(), json!(principal));
            }
        }
        if let Some(action) = &resolved.on_delete {
            object.insert("$OnDelete".to_string(), json!(action));
        }
        Ok(())
    }

    /// Object and key prefix for annotations nested in frame `index`.
    fn resolve_sink(&self, index: usize) -> Option<(usize, String)> {
        match &self.frames.get(index)?.sink {
            AnnotationSink::Own(prefix) => Some((index, prefix.clone())),
            AnnotationSink::Frame(target, prefix) => Some((*target, prefix.clone())),
            AnnotationSink::Discard => None,
        }
    }

    /// Qualified name of the innermost structured type being built.
    fn declaring_type(&self) -> Option<String> {
        self.frames
            .iter()
            .rev()
            .find(|f| matches!(f.kind, ElementKind::EntityType | ElementKind::ComplexType))
            .map(|f| format!("{}.{}", self.schema_namespace, f.name))
    }

    /// `@type` value of a record: the referenced document for included namespaces.
    fn type_uri(&self, type_name: &str) -> String {
        let namespace = split_qualified(type_name)
            .map(|(ns, _)| ns)
            .unwrap_or_default();
        let uri = self
            .references
            .iter()
            .find(|(_, reference)| {
                reference
                    .get("$Include")
                    .and_then(Value::as_array)
                    .is_some_and(|includes| {
                        includes
                            .iter()
                            .any(|i| i.get("$Namespace").and_then(Value::as_str) == Some(namespace))
                    })
            })
            .map(|(uri, _)| uri.as_str())
            .unwrap_or_default();
        format!("{}#{}", uri, type_name)
    }

    // ------------------------------------------------------------------
    // Element end
    // ------------------------------------------------------------------

    pub fn end(&mut self, span: &SourceSpan) -> Result<(), ConversionError> {
        match self.validator.close().map_err(|kind| kind.at(span))? {
            Closed::Skipped => return Ok(()),
            Closed::Element(_) => {}
        }
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        let span = frame.span.clone();
        self.close_frame(frame).map_err(|kind| kind.at(&span))
    }

    fn close_frame(&mut self, mut frame: Frame) -> Result<(), ErrorKind> {
        if self.options.include_line_numbers && carries_line(frame.kind) {
            frame.object.insert(LINE_KEY.to_string(), Value::from(frame.span.line));
        }
        let index = self.index;
        let aliases = &index.aliases;
        match frame.kind {
            ElementKind::Reference => merge_reference(&mut self.references, frame.name, frame.object),
            ElementKind::Include => self.push_to_parent("$Include", Value::Object(frame.object)),
            ElementKind::IncludeAnnotations => {
                self.push_to_parent("$IncludeAnnotations", Value::Object(frame.object))
            }
            ElementKind::Schema => {
                let namespace = std::mem::take(&mut self.schema_namespace);
                match self.schemas.get_mut(&namespace) {
                    Some(Value::Object(existing)) => existing.extend(frame.object),
                    _ => {
                        self.schemas.insert(namespace, Value::Object(frame.object));
                    }
                }
            }
            ElementKind::EntityType
            | ElementKind::ComplexType
            | ElementKind::EnumType
            | ElementKind::TypeDefinition
            | ElementKind::Term
            | ElementKind::ValueTerm
            | ElementKind::EntityContainer => {
                if frame.object.contains_key("$Key") {
                    if let Some(base_type) = frame.object.get("$BaseType").and_then(Value::as_str) {
                        return Err(ErrorKind::KeyOnDerivedType {
                            type_name: format!("{}.{}", self.schema_namespace, frame.name),
                            base_type: base_type.to_string(),
                        });
                    }
                }
                self.add_schema_member(&frame.name, frame.object, false)?;
            }
            ElementKind::Action | ElementKind::Function => {
                self.add_schema_member(&frame.name, frame.object, true)?;
            }
            ElementKind::Key => {
                if let (Some(parent), Some(keys)) = (self.frames.last_mut(), frame.operand) {
                    parent.object.insert("$Key".to_string(), keys);
                }
            }
            ElementKind::Property
            | ElementKind::NavigationProperty
            | ElementKind::EntitySet
            | ElementKind::Singleton
            | ElementKind::ActionImport => {
                if let Some(parent) = self.frames.last_mut() {
                    parent.object.insert(frame.name, Value::Object(frame.object));
                }
            }
            ElementKind::FunctionImport if frame.legacy_import.is_some() => {
                self.close_legacy_import(frame)?;
            }
            ElementKind::FunctionImport => {
                if let Some(parent) = self.frames.last_mut() {
                    parent.object.insert(frame.name, Value::Object(frame.object));
                }
            }
            ElementKind::ReferentialConstraint => {
                if !frame.object.is_empty() {
                    if let Some(map) = self.frames.last_mut().and_then(|p| constraint_map(&mut p.object)) {
                        map.extend(frame.object);
                    }
                }
            }
            ElementKind::Parameter => {
                if let Some(parent) = self.frames.last_mut() {
                    if parent.legacy_import.is_some() {
                        parent.parameters.push(Value::Object(frame.object));
                    } else {
                        let entry = parent
                            .object
                            .entry("$Parameter")
                            .or_insert_with(|| Value::Array(Vec::new()));
                        if let Value::Array(parameters) = entry {
                            parameters.push(Value::Object(frame.object));
                        }
                    }
                }
            }
            ElementKind::ReturnType => {
                if let Some(parent) = self.frames.last_mut() {
                    if parent.legacy_import.is_some() {
                        parent.return_type = Some(Value::Object(frame.object));
                    } else {
                        parent.object.insert("$ReturnType".to_string(), Value::Object(frame.object));
                    }
                }
            }
            ElementKind::Annotations => {
                let Some(schema) = self.schema_frame_mut() else {
                    return Ok(());
                };
                let targets = schema
                    .object
                    .entry("$Annotations")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(targets) = targets {
                    match targets.get_mut(&frame.name) {
                        Some(Value::Object(existing)) => existing.extend(frame.object),
                        _ => {
                            targets.insert(frame.name, Value::Object(frame.object));
                        }
                    }
                }
            }
            ElementKind::Annotation | ElementKind::ValueAnnotation => {
                let mut value = frame.operand.unwrap_or(Value::Bool(true));
                if frame.parse_json || frame.name == JSON_SCHEMA_TERM {
                    value = expressions::parse_embedded_json(value);
                }
                let marks_json = frame.name == MEDIA_TYPE_TERM
                    && value.as_str().is_some_and(|media_type| media_type.contains("json"));
                if let Some((target, key)) = frame.dest {
                    self.frames[target].object.insert(key, value);
                }
                if marks_json {
                    if let Some(parent) = self.frames.last_mut() {
                        parent.parse_json = true;
                    }
                }
            }
            ElementKind::PropertyValue => {
                let mut value = frame.operand.unwrap_or(Value::Bool(true));
                if frame.parse_json {
                    value = expressions::parse_embedded_json(value);
                }
                if let Some((target, key)) = frame.dest {
                    self.frames[target].object.insert(key, value);
                }
            }
            ElementKind::Summary | ElementKind::LongDescription => {
                if let (false, Some((target, prefix))) = (is_blank(&frame.text), frame.dest) {
                    let term = match frame.kind {
                        ElementKind::Summary => "Description",
                        _ => "LongDescription",
                    };
                    let key = prefix + &self.upgrader.term_key(&CORE, term, aliases);
                    self.frames[target]
                        .object
                        .insert(key, Value::String(frame.text.trim().to_string()));
                }
            }
            ElementKind::Expression(expr) => {
                let value = expressions::reduce(expr, frame.object, frame.operand, &frame.text, aliases);
                self.update_value(value);
            }
            ElementKind::Edmx
            | ElementKind::DataServices
            | ElementKind::Using
            | ElementKind::Member
            | ElementKind::PropertyRef
            | ElementKind::OnDelete
            | ElementKind::Principal
            | ElementKind::Dependent
            | ElementKind::Association
            | ElementKind::End
            | ElementKind::NavigationPropertyBinding
            | ElementKind::AssociationSet
            | ElementKind::Documentation => {}
        }
        Ok(())
    }

    /// Hand a reduced expression value to the enclosing frame: list-valued parents
    /// collect it, every other parent takes it as its value.
    fn update_value(&mut self, value: Value) {
        let Some(parent) = self.frames.last_mut() else {
            return;
        };
        let collects = parent.kind.is_expression();
        match &mut parent.operand {
            Some(Value::Array(items)) if collects => items.push(value),
            slot => *slot = Some(value),
        }
    }

    /// A legacy function import becomes an operation overload in the container's
    /// schema plus an import in the container, unless it is bindable.
    fn close_legacy_import(&mut self, frame: Frame) -> Result<(), ErrorKind> {
        let Some(import) = frame.legacy_import else {
            return Ok(());
        };
        let mut overload = Map::new();
        overload.insert("$Kind".to_string(), json!(import.kind));
        if import.bound {
            overload.insert("$IsBound".to_string(), Value::Bool(true));
        }
        if import.composable && import.kind == "Function" {
            overload.insert("$IsComposable".to_string(), Value::Bool(true));
        }
        if !frame.parameters.is_empty() {
            overload.insert("$Parameter".to_string(), Value::Array(frame.parameters));
        }
        if let Some(return_type) = frame.return_type.or(import.return_type) {
            overload.insert("$ReturnType".to_string(), return_type);
        }
        if self.options.include_line_numbers {
            overload.insert(LINE_KEY.to_string(), Value::from(frame.span.line));
        }
        self.add_schema_member(&frame.name, overload, true)?;

        if import.bound {
            debug!(operation = %frame.name, "bindable function import has no import");
            return Ok(());
        }
        let mut entry = Map::new();
        entry.insert(
            format!("${}", import.kind),
            json!(format!("{}.{}", self.schema_namespace, frame.name)),
        );
        if let Some(set) = import.entity_set {
            entry.insert("$EntitySet".to_string(), json!(set));
        }
        entry.extend(frame.object);
        if let Some(container) = self.frames.last_mut() {
            container.object.insert(frame.name, Value::Object(entry));
        }
        Ok(())
    }

    fn schema_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames
            .iter_mut()
            .rev()
            .find(|f| f.kind == ElementKind::Schema)
    }

    /// Add a named member to the current schema; overloads share one array.
    fn add_schema_member(
        &mut self,
        name: &str,
        member: Map<String, Value>,
        overload: bool,
    ) -> Result<(), ErrorKind> {
        let namespace = self.schema_namespace.clone();
        let Some(schema) = self.schema_frame_mut() else {
            return Ok(());
        };
        match schema.object.get_mut(name) {
            None => {
                let value = if overload {
                    Value::Array(vec![Value::Object(member)])
                } else {
                    Value::Object(member)
                };
                schema.object.insert(name.to_string(), value);
            }
            Some(Value::Array(overloads)) if overload => overloads.push(Value::Object(member)),
            Some(_) => {
                return Err(ErrorKind::DuplicateMember {
                    namespace,
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    fn push_to_parent(&mut self, key: &str, value: Value) {
        let Some(parent) = self.frames.last_mut() else {
            return;
        };
        let entry = parent
            .object
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(value);
        }
    }

    // ------------------------------------------------------------------
    // Text and completion
    // ------------------------------------------------------------------

    pub fn text(&mut self, text: &TextContent) -> Result<(), ErrorKind> {
        if self.validator.text(&text.text)? {
            if let Some(frame) = self.frames.last_mut() {
                frame.text.push_str(&text.text);
            }
        }
        Ok(())
    }

    /// Apply deferred restrictions, add the references the conversion introduced and
    /// assemble the document.
    pub fn finish(mut self) -> CsdlDocument {
        let index = self.index;
        let aliases = &index.aliases;
        if self.upgrader.has_deferred() {
            for schema in self.schemas.values_mut() {
                let Value::Object(schema) = schema else {
                    continue;
                };
                for member in schema.values_mut() {
                    if let Value::Object(member) = member {
                        if member.get("$Kind").and_then(Value::as_str) == Some("EntityContainer") {
                            self.upgrader.flush_deferred(member, aliases);
                        }
                    }
                }
            }
            self.upgrader.clear_deferred();
        }

        for vocabulary in self.upgrader.references(aliases) {
            add_include(
                &mut self.references,
                &vocabulary.uri,
                &vocabulary.namespace,
                &vocabulary.alias,
            );
        }
        for (uri, alias) in self.foreign.entries() {
            add_include(&mut self.references, uri, uri, alias);
        }

        let version = match index.era {
            Era::Legacy => CURRENT_VERSION_MARKER.to_string(),
            Era::Current => index.version.clone(),
        };
        let mut root = Map::new();
        root.insert("$Version".to_string(), Value::String(version));
        if let Some(container) = self.entity_container {
            root.insert("$EntityContainer".to_string(), Value::String(container));
        }
        if !self.references.is_empty() {
            root.insert("$Reference".to_string(), Value::Object(self.references));
        }
        root.extend(self.schemas);
        CsdlDocument::from_map(root)
    }
}

/// Nodes that receive the source line when line numbers are requested.
fn carries_line(kind: ElementKind) -> bool {
    matches!(
        kind,
        ElementKind::Schema
            | ElementKind::EntityType
            | ElementKind::ComplexType
            | ElementKind::EnumType
            | ElementKind::TypeDefinition
            | ElementKind::Property
            | ElementKind::NavigationProperty
            | ElementKind::Action
            | ElementKind::Function
            | ElementKind::Parameter
            | ElementKind::ReturnType
            | ElementKind::Term
            | ElementKind::ValueTerm
            | ElementKind::EntityContainer
            | ElementKind::EntitySet
            | ElementKind::Singleton
            | ElementKind::ActionImport
            | ElementKind::FunctionImport
    )
}

/// Value given by an inline expression attribute such as `String="..."`.
fn inline_operand(start: &StartElement, ctx: &AttributeContext<'_>) -> Option<Value> {
    start
        .attributes
        .iter()
        .filter(|a| a.namespace.is_none())
        .find_map(|a| {
            ExprKind::from_attribute(&a.name)
                .map(|kind| expressions::inline_value(kind, &a.value, ctx.aliases))
        })
}

/// Operation kind of a legacy function import: `m:HttpMethod` wins, then
/// `IsSideEffecting` (which defaults to true, so V3 imports are actions).
fn legacy_import(ctx: &AttributeContext<'_>, start: &StartElement) -> LegacyImport {
    let is_function = match start.attribute_ns(METADATA_NS, "HttpMethod") {
        Some(method) => method.eq_ignore_ascii_case("GET"),
        None => start.attribute("IsSideEffecting") == Some("false"),
    };
    let return_type = start.attribute("ReturnType").map(|raw| {
        let (name, collection) = type_reference(ctx, raw);
        let mut object = Map::new();
        if name != DEFAULT_PRIMITIVE {
            object.insert("$Type".to_string(), Value::String(name));
        }
        if collection {
            object.insert("$Collection".to_string(), Value::Bool(true));
        }
        Value::Object(object)
    });
    LegacyImport {
        kind: if is_function { "Function" } else { "Action" },
        bound: start.attribute("IsBindable") == Some("true"),
        composable: start.attribute("IsComposable") == Some("true"),
        entity_set: start.attribute("EntitySet").map(|set| ctx.aliases.target(set)),
        return_type,
    }
}

fn constraint_map(object: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    nested_object(object, "$ReferentialConstraint")
}

fn binding_map(object: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    nested_object(object, "$NavigationPropertyBinding")
}

/// Object-valued member `key`, created on first use.
fn nested_object<'m>(object: &'m mut Map<String, Value>, key: &str) -> Option<&'m mut Map<String, Value>> {
    object
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

fn merge_reference(references: &mut Map<String, Value>, uri: String, reference: Map<String, Value>) {
    match references.get_mut(&uri) {
        Some(Value::Object(existing)) => {
            for (key, value) in reference {
                match (existing.get_mut(&key), value) {
                    (Some(Value::Array(items)), Value::Array(more)) => items.extend(more),
                    (_, value) => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        _ => {
            references.insert(uri, Value::Object(reference));
        }
    }
}

fn add_include(references: &mut Map<String, Value>, uri: &str, namespace: &str, alias: &str) {
    let include = json!({ "$Namespace": namespace, "$Alias": alias });
    let mut reference = Map::new();
    reference.insert("$Include".to_string(), Value::Array(vec![include]));
    merge_reference(references, uri.to_string(), reference);
}
