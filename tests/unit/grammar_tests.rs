//! Unit tests for document validation
//!
//! Every malformed document produces exactly one error carrying a category, the line
//! and column of the offending construct and its source text.

use pretty_assertions::assert_eq;
use rust_csdl::{convert_str, ConversionError, ConvertOptions, ErrorCategory, ErrorKind};
use serde_json::json;

const V2_EDM: &str = "http://schemas.microsoft.com/ado/2008/09/edm";
const V3_EDM: &str = "http://schemas.microsoft.com/ado/2009/11/edm";

fn v4_doc(schema: &str) -> String {
    format!(
        r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="NS" xmlns="http://docs.oasis-open.org/odata/ns/edm">
{}
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#,
        schema
    )
}

fn legacy_doc(version: &str, edm: &str, schema: &str) -> String {
    format!(
        r#"<edmx:Edmx Version="{}" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema Namespace="NS" xmlns="{}">
{}
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#,
        version, edm, schema
    )
}

fn strict() -> ConvertOptions {
    ConvertOptions {
        strict: true,
        ..Default::default()
    }
}

fn fails(xml: &str, options: &ConvertOptions) -> ConversionError {
    convert_str(xml, options).expect_err("Conversion should fail")
}

// ============================================================================
// Syntax and root
// ============================================================================

#[test]
fn test_malformed_xml() {
    let err = fails(
        r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
</edmx:Edmx>"#,
        &ConvertOptions::default(),
    );
    assert!(matches!(err.kind, ErrorKind::MalformedXml { .. }));
    assert_eq!(err.category(), ErrorCategory::Syntax);
}

#[test]
fn test_root_must_be_edmx() {
    let err = fails(
        r#"<Schema Namespace="NS" xmlns="http://docs.oasis-open.org/odata/ns/edm"/>"#,
        &ConvertOptions::default(),
    );
    assert_eq!(
        err.kind,
        ErrorKind::NotEdmxRoot {
            element: "Schema".to_string()
        }
    );
    assert_eq!(err.category(), ErrorCategory::Structural);
    assert_eq!((err.span.line, err.span.column), (1, 1));
}

#[test]
fn test_error_message_names_position_and_source() {
    let err = fails(&v4_doc(r#"      <Bogus Name="x"/>"#), &ConvertOptions::default());
    assert_eq!(
        err.to_string(),
        r#"Element <Bogus> is not allowed in <Schema> at line 4, column 7: `<Bogus Name="x"/>`"#
    );
}

// ============================================================================
// Nesting and cardinality
// ============================================================================

#[test]
fn test_illegal_child() {
    let err = fails(
        &v4_doc(r#"<EntityContainer Name="C"><Property Name="P" Type="Edm.String"/></EntityContainer>"#),
        &ConvertOptions::default(),
    );
    assert_eq!(
        err.kind,
        ErrorKind::IllegalChild {
            parent: "EntityContainer".to_string(),
            child: "Property".to_string(),
        }
    );
    assert_eq!(err.category(), ErrorCategory::Structural);
}

#[test]
fn test_at_most_one_data_services() {
    let xml = r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices><Schema Namespace="A" xmlns="http://docs.oasis-open.org/odata/ns/edm"/></edmx:DataServices>
  <edmx:DataServices><Schema Namespace="B" xmlns="http://docs.oasis-open.org/odata/ns/edm"/></edmx:DataServices>
</edmx:Edmx>"#;
    let err = fails(xml, &ConvertOptions::default());
    assert_eq!(
        err.kind,
        ErrorKind::TooManyChildren {
            parent: "Edmx".to_string(),
            child: "DataServices".to_string(),
            max: 1,
        }
    );
    assert_eq!(err.span.line, 3);
}

#[test]
fn test_optional_children_occur_at_most_once() {
    let cases = [
        (
            r#"<EntityType Name="A"><Key><PropertyRef Name="ID"/></Key><Key><PropertyRef Name="ID"/></Key></EntityType>"#,
            "EntityType",
            "Key",
        ),
        (
            r#"<Function Name="F"><ReturnType Type="Edm.Int32"/><ReturnType Type="Edm.Int32"/></Function>"#,
            "Function",
            "ReturnType",
        ),
        (
            r#"<Term Name="T" Type="Edm.String"><Annotation Term="NS.X"><String>a</String><String>b</String></Annotation></Term>"#,
            "Annotation",
            "expression",
        ),
    ];
    for (schema, parent, child) in cases {
        let err = fails(&v4_doc(schema), &ConvertOptions::default());
        assert_eq!(
            err.kind,
            ErrorKind::TooManyChildren {
                parent: parent.to_string(),
                child: child.to_string(),
                max: 1,
            },
            "{}",
            schema
        );
    }
}

#[test]
fn test_binary_operator_takes_two_operands() {
    let err = fails(
        &v4_doc(
            r#"<Term Name="T" Type="Edm.Boolean">
                 <Annotation Term="NS.X"><And><Bool>true</Bool><Bool>true</Bool><Bool>false</Bool></And></Annotation>
               </Term>"#,
        ),
        &ConvertOptions::default(),
    );
    assert!(matches!(err.kind, ErrorKind::TooManyChildren { max: 2, .. }));
}

#[test]
fn test_minimum_children_only_in_strict_mode() {
    let schema = r#"<EntityType Name="A"><Key></Key></EntityType>"#;

    let doc = convert_str(&v4_doc(schema), &ConvertOptions::default()).unwrap();
    assert_eq!(doc.lookup("NS.A").unwrap()["$Key"], json!([]));

    let err = fails(&v4_doc(schema), &strict());
    assert_eq!(
        err.kind,
        ErrorKind::MissingChildren {
            parent: "Key".to_string(),
            child: "PropertyRef".to_string(),
            min: 1,
            found: 0,
        }
    );
    assert_eq!(err.category(), ErrorCategory::RequiredData);
}

#[test]
fn test_stray_text() {
    let err = fails(
        &v4_doc(r#"<EntityType Name="A">hello</EntityType>"#),
        &ConvertOptions::default(),
    );
    assert_eq!(
        err.kind,
        ErrorKind::UnexpectedText {
            element: "EntityType".to_string(),
            text: "hello".to_string(),
        }
    );
    assert_eq!(err.category(), ErrorCategory::Semantic);
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn test_unexpected_attribute_only_in_strict_mode() {
    let schema = r#"<ComplexType Name="A" Color="red"/>"#;

    let doc = convert_str(&v4_doc(schema), &ConvertOptions::default()).unwrap();
    assert_eq!(doc.lookup("NS.A"), Some(&json!({ "$Kind": "ComplexType" })));

    let err = fails(&v4_doc(schema), &strict());
    assert_eq!(
        err.kind,
        ErrorKind::UnexpectedAttribute {
            element: "ComplexType".to_string(),
            attribute: "Color".to_string(),
        }
    );
    assert_eq!(err.category(), ErrorCategory::Structural);
}

#[test]
fn test_names_must_be_identifiers_in_strict_mode() {
    let schema = r#"<ComplexType Name="2nd"/>"#;
    assert!(convert_str(&v4_doc(schema), &ConvertOptions::default()).is_ok());

    let err = fails(&v4_doc(schema), &strict());
    assert!(matches!(err.kind, ErrorKind::InvalidValue { ref value, .. } if value == "2nd"));
}

#[test]
fn test_invalid_nullable() {
    let err = fails(
        &v4_doc(r#"<ComplexType Name="A"><Property Name="P" Type="Edm.String" Nullable="maybe"/></ComplexType>"#),
        &ConvertOptions::default(),
    );
    assert!(matches!(err.kind, ErrorKind::InvalidValue { ref attribute, .. } if attribute == "Nullable"));
}

// ============================================================================
// Namespaces and dialects
// ============================================================================

#[test]
fn test_foreign_elements_are_rejected_in_current_documents() {
    let err = fails(
        &v4_doc(r#"<x:Extra xmlns:x="urn:example"/>"#),
        &ConvertOptions::default(),
    );
    assert!(matches!(err.kind, ErrorKind::WrongNamespace { .. }));
    assert_eq!(err.category(), ErrorCategory::Structural);
}

#[test]
fn test_foreign_elements_are_skipped_in_legacy_documents() {
    let doc = convert_str(
        &legacy_doc(
            "1.0",
            V2_EDM,
            r#"<x:Extra xmlns:x="urn:example"><x:Nested><EntityType Name="Hidden"/></x:Nested></x:Extra>
               <ComplexType Name="Seen"/>"#,
        ),
        &ConvertOptions::default(),
    )
    .unwrap();
    assert!(doc.lookup("NS.Hidden").is_none());
    assert!(doc.lookup("NS.Seen").is_some());
}

#[test]
fn test_legacy_elements_in_current_documents() {
    for schema in [
        r#"<Association Name="A"/>"#,
        r#"<EntityType Name="A"><Documentation><Summary>s</Summary></Documentation></EntityType>"#,
    ] {
        let err = fails(&v4_doc(schema), &ConvertOptions::default());
        assert_eq!(err.category(), ErrorCategory::DialectMismatch, "{}", schema);
    }
}

#[test]
fn test_current_elements_in_legacy_documents() {
    let err = fails(
        &legacy_doc("1.0", V2_EDM, r#"<Action Name="A"/>"#),
        &ConvertOptions::default(),
    );
    assert_eq!(
        err.kind,
        ErrorKind::DialectMismatch {
            element: "Action".to_string(),
            generation: "V2".to_string(),
        }
    );
}

#[test]
fn test_enum_types_need_v3() {
    let schema = r#"<EnumType Name="Size"><Member Name="S"/></EnumType>"#;

    let err = fails(&legacy_doc("1.0", V2_EDM, schema), &ConvertOptions::default());
    assert_eq!(err.category(), ErrorCategory::DialectMismatch);

    let doc = convert_str(&legacy_doc("3.0", V3_EDM, schema), &ConvertOptions::default()).unwrap();
    assert_eq!(doc.lookup("NS.Size"), Some(&json!({ "$Kind": "EnumType", "S": 0 })));
}

#[test]
fn test_v3_value_terms_and_annotations() {
    let doc = convert_str(
        &legacy_doc(
            "3.0",
            V3_EDM,
            r#"<ValueTerm Name="Rating" Type="Edm.Int32"/>
               <EntityType Name="T">
                 <Key><PropertyRef Name="ID"/></Key>
                 <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
                 <ValueAnnotation Term="NS.Rating" Int="5"/>
               </EntityType>
               <Annotations Target="NS.T/ID">
                 <ValueAnnotation Term="NS.Rating"><Int>2</Int></ValueAnnotation>
               </Annotations>"#,
        ),
        &ConvertOptions::default(),
    )
    .unwrap();

    assert_eq!(doc.version(), Some("4.0"));
    assert_eq!(
        doc.lookup("NS.Rating"),
        Some(&json!({ "$Kind": "Term", "$Type": "Edm.Int32", "$Nullable": true }))
    );
    assert_eq!(doc.lookup("NS.T").unwrap()["@NS.Rating"], json!(5));
    assert_eq!(
        doc.schema("NS").unwrap()["$Annotations"],
        json!({ "NS.T/ID": { "@NS.Rating": 2 } })
    );
}

// ============================================================================
// Legacy associations
// ============================================================================

fn association(constraint: &str) -> String {
    legacy_doc(
        "1.0",
        V2_EDM,
        &format!(
            r#"<EntityType Name="A"><Key><PropertyRef Name="ID"/></Key><Property Name="ID" Type="Edm.Int32" Nullable="false"/></EntityType>
               <EntityType Name="B"><Key><PropertyRef Name="ID"/></Key><Property Name="ID" Type="Edm.Int32" Nullable="false"/></EntityType>
               <Association Name="AB">
                 <End Role="A" Type="NS.A" Multiplicity="0..1"/>
                 <End Role="B" Type="NS.B" Multiplicity="*"/>
                 {}
               </Association>"#,
            constraint
        ),
    )
}

#[test]
fn test_referential_constraint_lengths_must_match() {
    let err = fails(
        &association(
            r#"<ReferentialConstraint>
                 <Principal Role="A"><PropertyRef Name="ID"/></Principal>
                 <Dependent Role="B"><PropertyRef Name="ID"/><PropertyRef Name="Other"/></Dependent>
               </ReferentialConstraint>"#,
        ),
        &ConvertOptions::default(),
    );
    assert_eq!(
        err.kind,
        ErrorKind::ReferentialConstraintMismatch {
            association: "NS.AB".to_string(),
            principal: 1,
            dependent: 2,
        }
    );
    assert_eq!(err.category(), ErrorCategory::Semantic);
}

#[test]
fn test_association_needs_two_ends_in_strict_mode() {
    let xml = legacy_doc(
        "1.0",
        V2_EDM,
        r#"<Association Name="AB"><End Role="A" Type="NS.A" Multiplicity="1"/></Association>"#,
    );
    assert!(convert_str(&xml, &ConvertOptions::default()).is_ok());
    let err = fails(&xml, &strict());
    assert!(matches!(err.kind, ErrorKind::MissingChildren { min: 2, found: 1, .. }));
}
