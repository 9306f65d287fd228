//! Unit tests for alias and qualified name normalization

use pretty_assertions::assert_eq;
use rust_csdl::edm::names::{is_simple_identifier, AliasTable};
use rust_csdl::{convert_str, ConvertOptions};
use serde_json::json;

fn document(alias_form: bool) -> String {
    let (own, core) = if alias_form {
        ("self", "Core")
    } else {
        ("org.example", "Org.OData.Core.V1")
    };
    format!(
        r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Core.V1.xml">
    <edmx:Include Namespace="Org.OData.Core.V1" Alias="Core"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema Namespace="org.example" Alias="self" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <ComplexType Name="Base"/>
      <ComplexType Name="Address" BaseType="{own}.Base">
        <Property Name="Lines" Type="Collection({own}.Line)"/>
        <Annotation Term="{core}.Description" String="A postal address"/>
      </ComplexType>
      <ComplexType Name="Line"/>
      <Function Name="Near">
        <Parameter Name="at" Type="{own}.Address"/>
        <ReturnType Type="{own}.Line"/>
      </Function>
      <Annotations Target="{own}.Address/Lines">
        <Annotation Term="{core}.Description" String="Address lines"/>
      </Annotations>
      <Annotations Target="{own}.Near({own}.Address)/at">
        <Annotation Term="{core}.Description">
          <AnnotationPath>Lines/@{core}.Description</AnnotationPath>
        </Annotation>
      </Annotations>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#,
        own = own,
        core = core
    )
}

#[test]
fn test_alias_and_namespace_forms_convert_identically() {
    let by_alias = convert_str(&document(true), &ConvertOptions::default()).unwrap();
    let by_namespace = convert_str(&document(false), &ConvertOptions::default()).unwrap();
    assert_eq!(by_alias, by_namespace);
}

#[test]
fn test_type_names_use_the_namespace() {
    let doc = convert_str(&document(true), &ConvertOptions::default()).unwrap();
    let address = doc.lookup("org.example.Address").unwrap();

    assert_eq!(address["$BaseType"], json!("org.example.Base"));
    assert_eq!(
        address["Lines"],
        json!({ "$Type": "org.example.Line", "$Collection": true, "$Nullable": true })
    );
    assert_eq!(
        doc.lookup("org.example.Near").unwrap()[0]["$Parameter"][0]["$Type"],
        json!("org.example.Address")
    );
}

#[test]
fn test_terms_use_the_alias() {
    let doc = convert_str(&document(false), &ConvertOptions::default()).unwrap();
    let address = doc.lookup("org.example.Address").unwrap();
    assert_eq!(address["@Core.Description"], json!("A postal address"));
}

#[test]
fn test_annotation_targets_are_normalized() {
    let doc = convert_str(&document(true), &ConvertOptions::default()).unwrap();
    let targets = doc.schema("org.example").unwrap()["$Annotations"]
        .as_object()
        .unwrap();

    assert_eq!(
        targets["org.example.Address/Lines"],
        json!({ "@Core.Description": "Address lines" })
    );
    assert_eq!(
        targets["org.example.Near(org.example.Address)/at"],
        json!({ "@Core.Description": { "$AnnotationPath": "Lines/@Core.Description" } })
    );
}

#[test]
fn test_alias_table_round_trip() {
    let mut aliases = AliasTable::new();
    aliases.declare("org.example", Some("self"));
    aliases.declare("Org.OData.Core.V1", Some("Core"));
    aliases.declare("org.plain", None);

    for (input, expected) in [
        ("self.Person", "org.example.Person"),
        ("org.example.Person", "org.example.Person"),
        ("Collection(self.Person)", "Collection(org.example.Person)"),
        ("org.plain.Thing", "org.plain.Thing"),
        ("Edm.String", "Edm.String"),
    ] {
        assert_eq!(aliases.qualified_name(input), expected, "{}", input);
        assert_eq!(
            aliases.qualified_name(&aliases.qualified_name(input)),
            expected,
            "normalizing twice changes {}",
            input
        );
    }

    assert_eq!(aliases.term_name("Org.OData.Core.V1.Description"), "Core.Description");
    assert_eq!(aliases.term_name("Core.Description#Short"), "Core.Description#Short");
    assert_eq!(aliases.term_name("org.plain.Tag"), "org.plain.Tag");
}

#[test]
fn test_simple_identifiers() {
    assert!(is_simple_identifier("Customer"));
    assert!(is_simple_identifier("_internal"));
    assert!(is_simple_identifier("Straße"));
    assert!(!is_simple_identifier("1st"));
    assert!(!is_simple_identifier("has space"));
    assert!(!is_simple_identifier("dotted.name"));
    assert!(!is_simple_identifier(&"x".repeat(129)));
    assert!(is_simple_identifier(&"x".repeat(128)));
}
