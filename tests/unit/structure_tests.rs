//! Unit tests for the structural elements of CSDL 4.0 documents

use pretty_assertions::assert_eq;
use rust_csdl::{convert_str, ConvertOptions, CsdlDocument, ErrorCategory, ErrorKind, LINE_KEY};
use serde_json::json;

/// Wrap schema content in a CSDL 4.0 document with namespace `NS`, alias `self`
fn v4_doc(version: &str, schema: &str) -> String {
    format!(
        r#"<edmx:Edmx Version="{}" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="NS" Alias="self" xmlns="http://docs.oasis-open.org/odata/ns/edm">
{}
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#,
        version, schema
    )
}

fn convert(schema: &str) -> CsdlDocument {
    convert_str(&v4_doc("4.0", schema), &ConvertOptions::default())
        .unwrap_or_else(|e| panic!("Conversion failed: {}", e))
}

fn convert_err(schema: &str) -> rust_csdl::ConversionError {
    convert_str(&v4_doc("4.0", schema), &ConvertOptions::default())
        .expect_err("Conversion should fail")
}

// ============================================================================
// Entity and complex types
// ============================================================================

#[test]
fn test_entity_type_with_key() {
    let doc = convert(
        r#"<EntityType Name="Person">
             <Key><PropertyRef Name="ID"/></Key>
             <Property Name="ID" Type="Edm.Int32"/>
           </EntityType>"#,
    );
    assert_eq!(
        doc.lookup("NS.Person"),
        Some(&json!({
            "$Kind": "EntityType",
            "$Key": ["ID"],
            "ID": { "$Type": "Edm.Int32", "$Nullable": true }
        }))
    );
}

#[test]
fn test_key_with_alias() {
    let doc = convert(
        r#"<EntityType Name="Item">
             <Key>
               <PropertyRef Name="Info/ID" Alias="InfoID"/>
               <PropertyRef Name="Code"/>
             </Key>
             <Property Name="Info" Type="self.Info" Nullable="false"/>
             <Property Name="Code" Type="Edm.String" Nullable="false"/>
           </EntityType>
           <ComplexType Name="Info">
             <Property Name="ID" Type="Edm.Guid" Nullable="false"/>
           </ComplexType>"#,
    );
    assert_eq!(
        doc.member("NS.Item", "$Key"),
        None,
        "member() does not return keywords"
    );
    assert_eq!(
        doc.lookup("NS.Item").unwrap()["$Key"],
        json!([{ "InfoID": "Info/ID" }, "Code"])
    );
    assert_eq!(doc.member("NS.Item", "Info"), Some(&json!({ "$Type": "NS.Info" })));
    assert_eq!(doc.member("NS.Item", "Code"), Some(&json!({})));
}

#[test]
fn test_type_flags_and_base_type() {
    let doc = convert(
        r#"<ComplexType Name="Shape" Abstract="true" OpenType="false"/>
           <ComplexType Name="Circle" BaseType="self.Shape" OpenType="true">
             <Property Name="Radius" Type="Edm.Double" Nullable="false"/>
           </ComplexType>"#,
    );
    assert_eq!(
        doc.lookup("NS.Shape"),
        Some(&json!({ "$Kind": "ComplexType", "$Abstract": true }))
    );
    assert_eq!(
        doc.lookup("NS.Circle"),
        Some(&json!({
            "$Kind": "ComplexType",
            "$BaseType": "NS.Shape",
            "$OpenType": true,
            "Radius": { "$Type": "Edm.Double" }
        }))
    );
}

#[test]
fn test_property_facets() {
    let doc = convert(
        r#"<ComplexType Name="Facets">
             <Property Name="Code" Type="Edm.String" MaxLength="max" Unicode="false"/>
             <Property Name="Price" Type="Edm.Decimal" Precision="10" Scale="variable"/>
             <Property Name="Where" Type="Edm.GeographyPoint" SRID="4326"/>
           </ComplexType>"#,
    );
    assert_eq!(
        doc.member("NS.Facets", "Code"),
        Some(&json!({ "$Nullable": true, "$MaxLength": "max", "$Unicode": false }))
    );
    assert_eq!(
        doc.member("NS.Facets", "Price"),
        Some(&json!({ "$Type": "Edm.Decimal", "$Nullable": true, "$Precision": 10, "$Scale": "variable" }))
    );
    assert_eq!(
        doc.member("NS.Facets", "Where"),
        Some(&json!({ "$Type": "Edm.GeographyPoint", "$Nullable": true, "$SRID": 4326 }))
    );
}

#[test]
fn test_default_values_are_typed_by_declared_type() {
    let doc = convert(
        r#"<ComplexType Name="Defaults">
             <Property Name="Count" Type="Edm.Int32" DefaultValue="42"/>
             <Property Name="Label" Type="Edm.String" DefaultValue="42"/>
             <Property Name="Flag" Type="Edm.Boolean" DefaultValue="true"/>
             <Property Name="Ratio" Type="Edm.Double" DefaultValue="0.5"/>
           </ComplexType>"#,
    );
    let value = |name: &str| doc.member("NS.Defaults", name).unwrap()["$DefaultValue"].clone();
    assert_eq!(value("Count"), json!(42));
    assert_eq!(value("Label"), json!("42"));
    assert_eq!(value("Flag"), json!(true));
    assert_eq!(value("Ratio"), json!(0.5));
}

#[test]
fn test_collection_property() {
    let doc = convert(
        r#"<ComplexType Name="Tags">
             <Property Name="Values" Type="Collection(Edm.String)" Nullable="false"/>
           </ComplexType>"#,
    );
    assert_eq!(
        doc.member("NS.Tags", "Values"),
        Some(&json!({ "$Collection": true }))
    );
}

// ============================================================================
// Enumerations and type definitions
// ============================================================================

#[test]
fn test_enum_members_take_declared_or_positional_values() {
    let doc = convert(
        r#"<EnumType Name="Size">
             <Member Name="Small"/>
             <Member Name="Large"/>
           </EnumType>
           <EnumType Name="Access" UnderlyingType="Edm.Byte" IsFlags="true">
             <Member Name="Read" Value="1"/>
             <Member Name="Write" Value="2"/>
           </EnumType>"#,
    );
    assert_eq!(
        doc.lookup("NS.Size"),
        Some(&json!({ "$Kind": "EnumType", "Small": 0, "Large": 1 }))
    );
    assert_eq!(
        doc.lookup("NS.Access"),
        Some(&json!({
            "$Kind": "EnumType",
            "$UnderlyingType": "Edm.Byte",
            "$IsFlags": true,
            "Read": 1,
            "Write": 2
        }))
    );
}

#[test]
fn test_enum_member_value_must_be_an_integer() {
    let err = convert_err(
        r#"<EnumType Name="Size">
             <Member Name="Small" Value="tiny"/>
           </EnumType>"#,
    );
    assert!(matches!(err.kind, ErrorKind::InvalidValue { ref attribute, .. } if attribute == "Value"));
}

#[test]
fn test_type_definition() {
    let doc = convert(
        r#"<TypeDefinition Name="Money" UnderlyingType="Edm.Decimal" Precision="18" Scale="2"/>"#,
    );
    assert_eq!(
        doc.lookup("NS.Money"),
        Some(&json!({
            "$Kind": "TypeDefinition",
            "$UnderlyingType": "Edm.Decimal",
            "$Precision": 18,
            "$Scale": 2
        }))
    );
}

// ============================================================================
// Operations
// ============================================================================

#[test]
fn test_operation_overloads_share_one_array() {
    let doc = convert(
        r#"<Function Name="Top" IsComposable="true">
             <Parameter Name="count" Type="Edm.Int32" Nullable="false"/>
             <ReturnType Type="Collection(self.Person)" Nullable="false"/>
           </Function>
           <Function Name="Top">
             <ReturnType Type="Collection(self.Person)" Nullable="false"/>
           </Function>
           <EntityType Name="Person"/>"#,
    );
    assert_eq!(
        doc.lookup("NS.Top"),
        Some(&json!([
            {
                "$Kind": "Function",
                "$IsComposable": true,
                "$Parameter": [{ "$Name": "count", "$Type": "Edm.Int32" }],
                "$ReturnType": { "$Type": "NS.Person", "$Collection": true }
            },
            {
                "$Kind": "Function",
                "$ReturnType": { "$Type": "NS.Person", "$Collection": true }
            }
        ]))
    );
}

#[test]
fn test_bound_action() {
    let doc = convert(
        r#"<Action Name="Approve" IsBound="true" EntitySetPath="order/self.Items">
             <Parameter Name="order" Type="self.Order" Nullable="false"/>
           </Action>"#,
    );
    assert_eq!(
        doc.lookup("NS.Approve"),
        Some(&json!([{
            "$Kind": "Action",
            "$IsBound": true,
            "$EntitySetPath": "order/NS.Items",
            "$Parameter": [{ "$Name": "order", "$Type": "NS.Order" }]
        }]))
    );
}

#[test]
fn test_action_without_name_is_rejected() {
    let xml = v4_doc("4.0", r#"      <Action IsBound="true"/>"#);
    let err = convert_str(&xml, &ConvertOptions::default()).unwrap_err();

    assert_eq!(
        err.kind,
        ErrorKind::MissingAttribute {
            element: "Action".to_string(),
            attribute: "Name".to_string(),
        }
    );
    assert_eq!(err.category(), ErrorCategory::RequiredData);
    assert_eq!(err.span.line, 4);
    assert_eq!(err.span.text, r#"<Action IsBound="true"/>"#);
}

// ============================================================================
// Terms
// ============================================================================

#[test]
fn test_term() {
    let doc = convert(
        r#"<Term Name="Rating" Type="Edm.Int32" Nullable="false" DefaultValue="3" AppliesTo="EntityType Property"/>"#,
    );
    assert_eq!(
        doc.lookup("NS.Rating"),
        Some(&json!({
            "$Kind": "Term",
            "$Type": "Edm.Int32",
            "$DefaultValue": 3,
            "$AppliesTo": ["EntityType", "Property"]
        }))
    );
}

// ============================================================================
// Entity container
// ============================================================================

#[test]
fn test_entity_container_members() {
    let doc = convert(
        r#"<EntityType Name="Person"><Key><PropertyRef Name="ID"/></Key><Property Name="ID" Type="Edm.Int32" Nullable="false"/></EntityType>
           <Action Name="Reset"/>
           <Function Name="Count"><ReturnType Type="Edm.Int32"/></Function>
           <EntityContainer Name="Container">
             <EntitySet Name="People" EntityType="self.Person" IncludeInServiceDocument="false">
               <NavigationPropertyBinding Path="Friends" Target="People"/>
             </EntitySet>
             <Singleton Name="Me" Type="self.Person"/>
             <ActionImport Name="Reset" Action="self.Reset"/>
             <FunctionImport Name="Count" Function="self.Count" IncludeInServiceDocument="true"/>
           </EntityContainer>"#,
    );
    assert_eq!(doc.entity_container(), Some("NS.Container"));
    assert_eq!(
        doc.lookup("NS.Container"),
        Some(&json!({
            "$Kind": "EntityContainer",
            "People": {
                "$Collection": true,
                "$Type": "NS.Person",
                "$IncludeInServiceDocument": false,
                "$NavigationPropertyBinding": { "Friends": "People" }
            },
            "Me": { "$Type": "NS.Person" },
            "Reset": { "$Action": "NS.Reset" },
            "Count": { "$Function": "NS.Count", "$IncludeInServiceDocument": true }
        }))
    );
}

#[test]
fn test_nullable_singleton() {
    let doc = convert(
        r#"<EntityContainer Name="C"><Singleton Name="Me" Type="self.Person" Nullable="true"/></EntityContainer>"#,
    );
    assert_eq!(
        doc.member("NS.C", "Me"),
        Some(&json!({ "$Type": "NS.Person", "$Nullable": true }))
    );
}

#[test]
fn test_invalid_nullable_on_singleton_and_property() {
    let singleton = convert_err(
        r#"<EntityContainer Name="C"><Singleton Name="Me" Type="self.Person" Nullable="maybe"/></EntityContainer>"#,
    );
    let property = convert_err(
        r#"<ComplexType Name="P"><Property Name="X" Type="Edm.Int32" Nullable="maybe"/></ComplexType>"#,
    );
    for (err, element) in [(singleton, "Singleton"), (property, "Property")] {
        assert_eq!(
            err.kind,
            ErrorKind::InvalidValue {
                element: element.to_string(),
                attribute: "Nullable".to_string(),
                value: "maybe".to_string(),
                reason: "expected true or false".to_string(),
            }
        );
        assert_eq!(err.category(), ErrorCategory::Semantic);
    }
}

// ============================================================================
// Navigation properties
// ============================================================================

#[test]
fn test_navigation_property_with_constraint_and_on_delete() {
    let doc = convert(
        r#"<EntityType Name="Order">
             <Property Name="CustomerID" Type="Edm.Int32"/>
             <NavigationProperty Name="Customer" Type="self.Customer" Nullable="false" Partner="Orders" ContainsTarget="true">
               <ReferentialConstraint Property="CustomerID" ReferencedProperty="ID"/>
               <OnDelete Action="SetNull"/>
             </NavigationProperty>
           </EntityType>"#,
    );
    assert_eq!(
        doc.member("NS.Order", "Customer"),
        Some(&json!({
            "$Kind": "NavigationProperty",
            "$Type": "NS.Customer",
            "$Partner": "Orders",
            "$ContainsTarget": true,
            "$ReferentialConstraint": { "CustomerID": "ID" },
            "$OnDelete": "SetNull"
        }))
    );
}

#[test]
fn test_nullable_is_dropped_on_collection_navigation() {
    let doc = convert(
        r#"<EntityType Name="Customer">
             <NavigationProperty Name="Orders" Type="Collection(self.Order)" Nullable="false"/>
           </EntityType>"#,
    );
    assert_eq!(
        doc.member("NS.Customer", "Orders"),
        Some(&json!({
            "$Kind": "NavigationProperty",
            "$Type": "NS.Order",
            "$Collection": true
        }))
    );
}

// ============================================================================
// Semantic checks
// ============================================================================

#[test]
fn test_key_on_derived_type_is_rejected() {
    let err = convert_err(
        r#"<EntityType Name="Base"><Key><PropertyRef Name="ID"/></Key><Property Name="ID" Type="Edm.Int32" Nullable="false"/></EntityType>
      <EntityType Name="Derived" BaseType="self.Base">
        <Key><PropertyRef Name="ID"/></Key>
      </EntityType>"#,
    );
    assert_eq!(
        err.kind,
        ErrorKind::KeyOnDerivedType {
            type_name: "NS.Derived".to_string(),
            base_type: "NS.Base".to_string(),
        }
    );
    assert_eq!(err.category(), ErrorCategory::Semantic);
    assert_eq!(err.span.line, 5);
}

#[test]
fn test_duplicate_schema_member_is_rejected() {
    let err = convert_err(
        r#"<ComplexType Name="A"/>
           <EntityType Name="A"/>"#,
    );
    assert_eq!(
        err.kind,
        ErrorKind::DuplicateMember {
            namespace: "NS".to_string(),
            name: "A".to_string(),
        }
    );
}

#[test]
fn test_collection_of_entity_type_must_not_specify_nullable() {
    let err = convert_err(
        r#"<Term Name="Targets" Type="Collection(Edm.EntityType)" Nullable="true"/>"#,
    );
    assert!(matches!(err.kind, ErrorKind::NullableOnEntityCollection { .. }));
    assert_eq!(err.category(), ErrorCategory::Semantic);
}

#[test]
fn test_collection_nullable_required_in_4_01() {
    let schema = r#"<ComplexType Name="Tags">
             <Property Name="Values" Type="Collection(Edm.String)"/>
           </ComplexType>"#;

    assert!(convert_str(&v4_doc("4.0", schema), &ConvertOptions::default()).is_ok());

    let err = convert_str(&v4_doc("4.01", schema), &ConvertOptions::default()).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::MissingCollectionNullable {
            element: "Property".to_string(),
            name: "Values".to_string(),
        }
    );
    assert_eq!(err.category(), ErrorCategory::RequiredData);
}

// ============================================================================
// Document level
// ============================================================================

#[test]
fn test_version_and_references() {
    let xml = r#"<edmx:Edmx Version="4.01" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Core.V1.xml">
    <edmx:Include Namespace="Org.OData.Core.V1" Alias="Core"/>
  </edmx:Reference>
  <edmx:Reference Uri="http://example.com/other.xml">
    <edmx:IncludeAnnotations TermNamespace="org.other" Qualifier="Q" TargetNamespace="org.target"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema Namespace="NS" xmlns="http://docs.oasis-open.org/odata/ns/edm"/>
  </edmx:DataServices>
</edmx:Edmx>"#;
    let doc = convert_str(xml, &ConvertOptions::default()).unwrap();

    assert_eq!(doc.version(), Some("4.01"));
    assert_eq!(doc.entity_container(), None);
    assert_eq!(
        doc.references(),
        json!({
            "https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Core.V1.json": {
                "$Include": [{ "$Namespace": "Org.OData.Core.V1", "$Alias": "Core" }]
            },
            "http://example.com/other.xml": {
                "$IncludeAnnotations": [{
                    "$TermNamespace": "org.other",
                    "$Qualifier": "Q",
                    "$TargetNamespace": "org.target"
                }]
            }
        })
        .as_object()
    );
    assert_eq!(doc.schema("NS"), Some(&serde_json::Map::new()));
}

#[test]
fn test_line_numbers() {
    let xml = v4_doc(
        "4.0",
        r#"      <EntityType Name="Person">
        <Property Name="Name" Type="Edm.String"/>
      </EntityType>"#,
    );
    let doc = convert_str(
        &xml,
        &ConvertOptions {
            include_line_numbers: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(doc.schema("NS").unwrap()[LINE_KEY], json!(3));
    assert_eq!(doc.lookup("NS.Person").unwrap()[LINE_KEY], json!(4));
    assert_eq!(
        doc.member("NS.Person", "Name"),
        Some(&json!({ "$Nullable": true, LINE_KEY: 5 }))
    );
}

#[test]
fn test_output_is_deterministic() {
    let schema = r#"<EntityType Name="A"><Property Name="P" Type="Edm.String"/></EntityType>
           <EnumType Name="E"><Member Name="X"/></EnumType>"#;
    let first = convert(schema).to_json_string(true).unwrap();
    let second = convert(schema).to_json_string(true).unwrap();
    assert_eq!(first, second);
}
