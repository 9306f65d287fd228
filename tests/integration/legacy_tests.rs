//! Integration tests for V2/V3 metadata
//!
//! Legacy documents are converted to the same normalized shape as their CSDL 4.0
//! counterparts: associations become navigation properties with partners, constraints
//! and bindings, and legacy primitive types are renamed.

use pretty_assertions::assert_eq;
use rust_csdl::{ConvertOptions, CsdlDocument, LINE_KEY};
use serde_json::json;

use crate::common::TestContext;

fn northwind_v2() -> CsdlDocument {
    TestContext::with_fixture("northwind_v2").convert()
}

fn northwind_v4() -> CsdlDocument {
    TestContext::with_fixture("northwind_v4").convert()
}

// ============================================================================
// Legacy / current equivalence
// ============================================================================

#[test]
fn test_legacy_and_current_documents_are_equivalent() {
    assert_eq!(northwind_v2().into_json(), northwind_v4().into_json());
}

#[test]
fn test_legacy_document_version_is_normalized() {
    let doc = northwind_v2();
    assert_eq!(doc.version(), Some("4.0"));
    assert_eq!(doc.entity_container(), Some("org.example.Container"));
    assert!(doc.references().is_none(), "No vocabulary was introduced");
}

// ============================================================================
// Association resolution
// ============================================================================

#[test]
fn test_collection_navigation_property() {
    let doc = northwind_v2();
    assert_eq!(
        doc.member("org.example.Customer", "Orders"),
        Some(&json!({
            "$Kind": "NavigationProperty",
            "$Type": "org.example.Order",
            "$Collection": true,
            "$Partner": "Customer",
            "$OnDelete": "Cascade"
        }))
    );
}

#[test]
fn test_single_navigation_property_with_constraint() {
    let doc = northwind_v2();
    assert_eq!(
        doc.member("org.example.Order", "Customer"),
        Some(&json!({
            "$Kind": "NavigationProperty",
            "$Type": "org.example.Customer",
            "$Partner": "Orders",
            "$ReferentialConstraint": { "CustomerID": "ID" }
        }))
    );
}

#[test]
fn test_association_sets_become_bindings() {
    let doc = northwind_v2();
    let customers = doc.member("org.example.Container", "Customers").unwrap();
    let orders = doc.member("org.example.Container", "Orders").unwrap();

    assert_eq!(customers["$NavigationPropertyBinding"], json!({ "Orders": "Orders" }));
    assert_eq!(orders["$NavigationPropertyBinding"], json!({ "Customer": "Customers" }));
}

#[test]
fn test_associations_are_not_schema_members() {
    let doc = northwind_v2();
    assert!(doc.lookup("org.example.CustomerOrders").is_none());
    let container = doc.members("org.example.Container");
    let names: Vec<&str> = container.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["Customers", "Orders"]);
}

#[test]
fn test_legacy_primitive_types_are_renamed() {
    let doc = northwind_v2();
    assert_eq!(
        doc.member("org.example.Order", "Placed"),
        Some(&json!({ "$Type": "Edm.DateTimeOffset", "$Nullable": true }))
    );
}

#[test]
fn test_alias_lookup() {
    let doc = northwind_v2();
    assert_eq!(doc.lookup("ex.Customer"), doc.lookup("org.example.Customer"));
    assert_eq!(doc.schema("ex").and_then(|s| s.get("$Alias")), Some(&json!("ex")));
}

// ============================================================================
// Line numbers
// ============================================================================

#[test]
fn test_line_numbers_point_at_start_tags() {
    let ctx = TestContext::with_fixture("northwind_v2");
    let doc = ctx.convert_with(&ConvertOptions {
        include_line_numbers: true,
        ..Default::default()
    });

    let customer = doc.lookup("org.example.Customer").unwrap();
    assert_eq!(customer[LINE_KEY], json!(6));
    assert_eq!(customer["Orders"][LINE_KEY], json!(12));
    let container = doc.lookup("org.example.Container").unwrap();
    assert_eq!(container[LINE_KEY], json!(36));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_association_fails_with_path_and_position() {
    let ctx = TestContext::new();
    let path = ctx.write_file(
        "broken.xml",
        r#"<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema Namespace="NS" xmlns="http://schemas.microsoft.com/ado/2008/09/edm">
      <EntityType Name="A">
        <NavigationProperty Name="B" Relationship="NS.Missing" FromRole="A" ToRole="B" />
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#,
    );

    let err = rust_csdl::convert_file(&path, &ConvertOptions::default()).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("broken.xml"), "{}", message);
    assert!(message.contains("NS.Missing"), "{}", message);
    assert!(message.contains("line 5"), "{}", message);
}
