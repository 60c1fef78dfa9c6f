use super::*;
use crate::models::RawEntityDef;

fn raw(json: &str) -> RawEntityDef {
    serde_json::from_str(json).unwrap()
}

fn registry_with(defs: &[(&str, &str)]) -> SchemaResult<TypeRegistry> {
    let mut reg = TypeRegistry::new();
    for (name, json) in defs {
        reg.register_raw(name, raw(json))?;
    }
    Ok(reg)
}

#[test]
fn test_register_rejects_duplicate_type() {
    let mut reg = TypeRegistry::new();
    reg.register_raw("Bank", raw(r#"{"fields": []}"#)).unwrap();
    let err = reg.register_raw("Bank", raw(r#"{"fields": []}"#)).unwrap_err();

    assert!(matches!(err, SchemaError::DuplicateType { name } if name == "Bank"));
}

#[test]
fn test_resolve_unknown_type() {
    let reg = TypeRegistry::new();
    let err = reg.resolve("Ghost", "test").unwrap_err();

    assert!(matches!(err, SchemaError::UnknownType { name, .. } if name == "Ghost"));
}

#[test]
fn test_fields_of_layers_own_fields_before_inherited() {
    let reg = registry_with(&[
        (
            "Base",
            r#"{"fields": [{"name": "Id", "type": "int"}]}"#,
        ),
        (
            "Account",
            r#"{"extends": "Base", "fields": [{"name": "Name", "type": "string"}]}"#,
        ),
    ])
    .unwrap();
    reg.validate().unwrap();

    let names: Vec<&str> = reg
        .fields_of("Account")
        .unwrap()
        .iter()
        .map(|(_, f)| f.name.as_str())
        .collect();
    assert_eq!(names, ["Name", "Id"]);

    let (declaring, _) = reg.field("Account", "Id").unwrap();
    assert_eq!(declaring.name, "Base");
}

#[test]
fn test_field_name_collision_with_ancestor() {
    let reg = registry_with(&[
        ("Base", r#"{"fields": [{"name": "Id", "type": "int"}]}"#),
        (
            "Account",
            r#"{"extends": "Base", "fields": [{"name": "Id", "type": "int"}]}"#,
        ),
    ])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(
        err,
        SchemaError::FieldNameCollision { type_name, field, ancestor }
            if type_name == "Account" && field == "Id" && ancestor == "Base"
    ));
}

#[test]
fn test_unknown_parent_type_fails_validation() {
    let reg = registry_with(&[("Account", r#"{"extends": "Ghost", "fields": []}"#)]).unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::UnknownType { name, .. } if name == "Ghost"));
}

#[test]
fn test_inheritance_cycle_detected() {
    let reg = registry_with(&[
        ("A", r#"{"extends": "B", "fields": []}"#),
        ("B", r#"{"extends": "A", "fields": []}"#),
    ])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::InheritanceCycle { .. }));
}

#[test]
fn test_derived_field_must_not_be_nullable_or_editable() {
    let reg = registry_with(&[(
        "Account",
        r#"{"fields": [{
            "name": "Kind", "type": "string", "canBeNull": true,
            "dataCore": {"static": {"value": "cash"}}
        }]}"#,
    )])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::InvalidDataCore { .. }));
}

#[test]
fn test_database_source_must_be_entity_reference() {
    let reg = registry_with(&[(
        "Account",
        r#"{"fields": [{"name": "Owner", "type": "string", "database_source": true}]}"#,
    )])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::InvalidField { .. }));
}

#[test]
fn test_marker_field_must_be_stored_boolean() {
    let reg = registry_with(&[(
        "Currency",
        r#"{"fields": [{"name": "IsDefault", "type": "string", "isDefault": true}]}"#,
    )])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::InvalidField { .. }));
}

#[test]
fn test_single_string_source_per_type_including_inherited() {
    let reg = registry_with(&[
        (
            "Base",
            r#"{"fields": [{"name": "Code", "type": "string", "string_source": true}]}"#,
        ),
        (
            "Currency",
            r#"{"extends": "Base",
                "fields": [{"name": "Name", "type": "string", "string_source": true}]}"#,
        ),
    ])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::InvalidField { .. }));
}

#[test]
fn test_ambiguous_default_when_both_fallbacks_configured() {
    let err = registry_with(&[
        (
            "Bank",
            r#"{"fields": [
                {"name": "Label", "type": "string", "editable": true, "canBeNull": true},
                {"name": "Display", "type": "string", "dataCore": {"directDerived": {
                    "sources": "Bank_Label",
                    "default": "unnamed",
                    "defaultGetter": "labelGetter"
                }}}
            ]}"#,
        ),
    ])
    .unwrap_err();

    assert!(matches!(err, SchemaError::AmbiguousDefault { .. }));
}

#[test]
fn test_ambiguous_default_when_no_fallback_configured() {
    let err = registry_with(&[(
        "Bank",
        r#"{"fields": [
            {"name": "Display", "type": "string", "dataCore": {"directDerived": {
                "sources": "Bank_Display"
            }}}
        ]}"#,
    )])
    .unwrap_err();

    assert!(matches!(err, SchemaError::AmbiguousDefault { .. }));
}

#[test]
fn test_data_core_with_two_variants_rejected() {
    let err = registry_with(&[(
        "Bank",
        r#"{"fields": [{"name": "Kind", "type": "string", "dataCore": {
            "static": {"value": "x"},
            "instanceStatic": {}
        }}]}"#,
    )])
    .unwrap_err();

    assert!(matches!(err, SchemaError::InvalidDataCore { .. }));
}

#[test]
fn test_static_literal_must_match_field_type() {
    let reg = registry_with(&[(
        "Bank",
        r#"{"fields": [{"name": "Count", "type": "int",
            "dataCore": {"static": {"value": "ten"}}}]}"#,
    )])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::InvalidDataCore { .. }));
}

#[test]
fn test_self_parent_requires_list_of_matching_type() {
    let reg = registry_with(&[
        ("Line", r#"{"fields": []}"#),
        (
            "Statement",
            r#"{"fields": [{"name": "Lines", "type": "Line",
                "dataCore": {"selfParent": {"classType": "Line"}}}]}"#,
        ),
    ])
    .unwrap();
    let err = reg.validate().unwrap_err();

    // is_list is false, so the list requirement trips
    assert!(matches!(err, SchemaError::InvalidDataCore { .. }));
}

#[test]
fn test_multi_parent_list_parents_must_exist() {
    let reg = registry_with(&[
        ("Bank", r#"{"fields": []}"#),
        (
            "Transfer",
            r#"{"fields": [{"name": "Banks", "type": "Bank", "is_list": true,
                "dataCore": {"multiParentList": {"parents": "SourceBank"}}}]}"#,
        ),
    ])
    .unwrap();
    let err = reg.validate().unwrap_err();

    assert!(matches!(err, SchemaError::InvalidDataCore { .. }));
}

#[test]
fn test_valid_finance_shaped_schema_passes() {
    let reg = registry_with(&[
        (
            "Currency",
            r#"{"fields": [
                {"name": "Code", "type": "string", "string_source": true},
                {"name": "IsDefault", "type": "bool", "isDefault": true}
            ]}"#,
        ),
        (
            "Bank",
            r#"{"fields": [
                {"name": "Name", "type": "string"},
                {"name": "Currency", "type": "Currency", "editable": true}
            ]}"#,
        ),
        (
            "StatementTransaction",
            r#"{"fields": [
                {"name": "Bank", "type": "Bank", "database_source": true},
                {"name": "Currency", "type": "Currency", "dataCore": {"directDerived": {
                    "sources": "StatementTransaction_Bank, Bank_Currency",
                    "defaultGetter": "defaultCurrency"
                }}}
            ]}"#,
        ),
    ])
    .unwrap();

    reg.validate().unwrap();
    assert_eq!(reg.len(), 3);
}

#[test]
fn test_abstract_flag_and_capabilities_carried() {
    let reg = registry_with(&[(
        "DataObject",
        r#"{"abstract": true, "implements": "Displayable, Orderable", "fields": []}"#,
    )])
    .unwrap();

    let ty = reg.get("DataObject").unwrap();
    assert!(ty.is_abstract);
    assert_eq!(ty.implements, ["Displayable", "Orderable"]);
}
