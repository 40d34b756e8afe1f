//! Contract Behavior Tests
//!
//! Runs decoded instances through the synthesized validate / unmarshal /
//! marshal contracts and checks every marshalled document against the source
//! schema with an independent JSON Schema validator.

use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::{json, Value};

use schema_typegen::codegen::{BranchPolicy, NameHint, NameResolver, NamingConfig};
use schema_typegen::{
    compile, normalize, CodegenConfig, GeneratedOutput, Runtime, RuntimeValidationError, Schema,
};

fn fixture(name: &str) -> Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn compile_value(value: &Value) -> GeneratedOutput {
    compile(&Schema::from_value(value.clone()).unwrap(), &CodegenConfig::default()).unwrap()
}

/// Marshalled output must satisfy the schema it was generated from
fn assert_conforms(schema: &Value, instance: &Value) {
    let validator = JSONSchema::compile(schema).unwrap();
    assert!(validator.is_valid(instance), "{} does not conform to its schema", instance);
}

// =============================================================================
// Required fields
// =============================================================================

#[test]
fn test_required_field_scenario() {
    let schema = json!({"title": "Record", "required": ["id"], "properties": {"id": {"type": "string"}}});
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    match runtime.unmarshal("Record", &json!({})).unwrap_err() {
        RuntimeValidationError::RequiredFieldMissing { field, message, .. } => {
            assert_eq!(field, "ID");
            assert!(message.contains("'id'"));
        }
        other => panic!("Expected RequiredFieldMissing, got {:?}", other),
    }

    let encoded = runtime.round_trip("Record", &json!({"id": "x"})).unwrap();
    assert_eq!(serde_json::to_string(&encoded).unwrap(), r#"{"id":"x"}"#);
    assert_conforms(&schema, &encoded);
}

#[test]
fn test_validate_callable_standalone() {
    let schema = json!({"title": "Record", "required": ["id"], "properties": {"id": {"type": "string"}}});
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    let mut record = runtime.unmarshal("Record", &json!({"id": "x"})).unwrap();
    assert!(runtime.validate(&record).is_ok());
    record.remove_field("ID");
    assert!(matches!(
        runtime.validate(&record),
        Err(RuntimeValidationError::RequiredFieldMissing { .. })
    ));
}

// =============================================================================
// Enums and defaults
// =============================================================================

#[test]
fn test_enum_default_round_trip() {
    let schema = json!({
        "title": "Prefs",
        "properties": {"theme": {"title": "Theme", "enum": ["light", "dark"], "default": "light"}}
    });
    let output = compile_value(&schema);
    assert!(output.get("Theme").unwrap().enum_value("ThemeLight").is_some());

    let runtime = Runtime::new(&output);
    let prefs = runtime.unmarshal("Prefs", &json!({})).unwrap();
    assert_eq!(prefs.field("Theme").unwrap().constant(), Some("ThemeLight"));

    let encoded = runtime.marshal(&prefs).unwrap();
    assert_eq!(encoded, json!({"theme": "light"}));
    assert_conforms(&schema, &encoded);

    // an explicit value wins over the default
    let dark = runtime.round_trip("Prefs", &json!({"theme": "dark"})).unwrap();
    assert_eq!(dark, json!({"theme": "dark"}));
}

#[test]
fn test_enum_membership_violation() {
    let output = compile_value(&fixture("order.json"));
    let runtime = Runtime::new(&output);

    let lost = json!({
        "orderId": "o-1",
        "customer": {"email": "a@b.c"},
        "items": [],
        "status": "lost"
    });
    let err = runtime.unmarshal("Order", &lost).unwrap_err();
    assert_eq!(err.path(), vec!["Order.Status"]);
    assert!(matches!(err.root_cause(), RuntimeValidationError::EnumMembership { .. }));
}

// =============================================================================
// Unions
// =============================================================================

#[test]
fn test_one_of_exclusivity() {
    let schema = json!({"title": "Token", "oneOf": [{"type": "string"}, {"type": "integer"}]});
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    let text = runtime.unmarshal("Token", &json!("5")).unwrap();
    assert_eq!(text.populated(), vec!["StringValue"]);

    let number = runtime.unmarshal("Token", &json!(5)).unwrap();
    assert_eq!(number.populated(), vec!["IntegerValue"]);
    assert_conforms(&schema, &runtime.marshal(&number).unwrap());

    match runtime.unmarshal("Token", &json!({"a": 1})).unwrap_err() {
        RuntimeValidationError::BranchMatch { policy, matched, failures, .. } => {
            assert_eq!(policy, BranchPolicy::ExactlyOne);
            assert!(matched.is_empty());
            assert_eq!(failures.len(), 2);
        }
        other => panic!("Expected BranchMatch, got {:?}", other),
    }
}

#[test]
fn test_any_of_inclusivity() {
    let schema = json!({
        "title": "Flexible",
        "anyOf": [{"type": "string"}, {"type": "number"}, {"type": "boolean"}]
    });
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    let flag = runtime.unmarshal("Flexible", &json!(true)).unwrap();
    assert_eq!(flag.populated(), vec!["BooleanValue"]);
    let encoded = runtime.marshal(&flag).unwrap();
    assert_eq!(encoded, json!(true));
    assert_conforms(&schema, &encoded);

    assert!(matches!(
        runtime.unmarshal("Flexible", &json!(null)),
        Err(RuntimeValidationError::BranchMatch { .. })
    ));
}

#[test]
fn test_one_of_references_and_enum_branch() {
    let schema = fixture("payment.json");
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    let card = json!({"amount": 12.5, "method": {"cardNumber": "4242"}, "reference": "inv-7"});
    let payment = runtime.unmarshal("Payment", &card).unwrap();
    assert_eq!(payment.field("Method").unwrap().populated(), vec!["Card_OneOf"]);
    let encoded = runtime.marshal(&payment).unwrap();
    assert_eq!(encoded, card);
    assert_conforms(&schema, &encoded);

    let cash = json!({"amount": 3, "method": "cash"});
    let payment = runtime.unmarshal("Payment", &cash).unwrap();
    assert_eq!(payment.field("Method").unwrap().populated(), vec!["StringValue_Enum"]);
    assert_conforms(&schema, &runtime.marshal(&payment).unwrap());

    // outside the enum, and not an object either
    let err = runtime.unmarshal("Payment", &json!({"amount": 3, "method": "cheque"})).unwrap_err();
    assert_eq!(err.path(), vec!["Payment.Method"]);
    assert!(matches!(err.root_cause(), RuntimeValidationError::BranchMatch { .. }));

    // matches both object branches
    let err = runtime
        .unmarshal("Payment", &json!({"amount": 3, "method": {"cardNumber": "1", "iban": "DE00"}}))
        .unwrap_err();
    match err.root_cause() {
        RuntimeValidationError::BranchMatch { matched, .. } => {
            assert_eq!(matched, &vec!["Card_OneOf".to_string(), "BankTransfer_OneOf".to_string()]);
        }
        other => panic!("Expected BranchMatch, got {:?}", other),
    }
}

// =============================================================================
// allOf
// =============================================================================

#[test]
fn test_all_of_completeness() {
    let schema = json!({
        "title": "Merged",
        "allOf": [
            {"required": ["a", "shared"], "properties": {"a": {"type": "string"}, "shared": {"type": "string"}}},
            {"required": ["shared"], "properties": {"b": {"type": "integer"}, "shared": {"type": "string"}}}
        ]
    });
    let output = compile_value(&schema);
    let merged = output.get("Merged").unwrap();

    let mut json_names: Vec<&str> = merged
        .fields
        .iter()
        .filter_map(|f| f.json_name.as_deref())
        .collect();
    json_names.sort();
    assert_eq!(json_names, vec!["a", "b", "shared"]);
    assert!(merged.field_by_json("shared").unwrap().required);
    assert!(!merged.field_by_json("a").unwrap().required);
    assert!(!merged.field_by_json("b").unwrap().required);
}

#[test]
fn test_all_of_round_trip() {
    let schema = fixture("employee.json");
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    let input = json!({"name": "Ada", "age": 36, "employeeId": "E-1", "department": "R&D"});
    let employee = runtime.unmarshal("Employee", &input).unwrap();
    assert_eq!(
        employee.field("Person_AllOf").unwrap().field("Name"),
        Some(&schema_typegen::Instance::String("Ada".into()))
    );

    let encoded = runtime.marshal(&employee).unwrap();
    assert_eq!(encoded, input);
    assert_conforms(&schema, &encoded);

    let err = runtime.unmarshal("Employee", &json!({"name": "Ada"})).unwrap_err();
    match err {
        RuntimeValidationError::RequiredFieldMissing { field, .. } => {
            assert_eq!(field, "EmployeeID_AllOf")
        }
        other => panic!("Expected RequiredFieldMissing, got {:?}", other),
    }
}

// =============================================================================
// Nested structures and recursion
// =============================================================================

#[test]
fn test_order_round_trip() {
    let schema = fixture("order.json");
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    let input = json!({
        "orderId": "o-1",
        "customer": {"email": "ada@example.com"},
        "items": [{"sku": "A-1", "quantity": 2, "unitPrice": 9.5}],
        "shipping": {"street": "1 Main St", "city": "Springfield"},
        "tags": ["gift"],
        "metadata": {"source": "web"}
    });
    let encoded = runtime.round_trip("Order", &input).unwrap();

    // defaults are filled in
    assert_eq!(encoded["status"], json!("pending"));
    assert_eq!(encoded["priority"], json!(0));
    assert_eq!(encoded["metadata"], json!({"source": "web"}));
    assert_conforms(&schema, &encoded);
}

#[test]
fn test_nested_validation_failure_path() {
    let output = compile_value(&fixture("order.json"));
    let runtime = Runtime::new(&output);

    let err = runtime
        .unmarshal(
            "Order",
            &json!({"orderId": "o-1", "customer": {"email": "a@b.c"}, "items": [{"sku": "A-1"}]}),
        )
        .unwrap_err();
    assert_eq!(err.path(), vec!["Order.Items", "[0]"]);
    match err.root_cause() {
        RuntimeValidationError::RequiredFieldMissing { type_name, field, .. } => {
            assert_eq!(type_name, "LineItem");
            assert_eq!(field, "Quantity");
        }
        other => panic!("Expected RequiredFieldMissing, got {:?}", other),
    }

    let err = runtime
        .unmarshal("Order", &json!({"orderId": 7, "customer": {"email": "a@b.c"}, "items": []}))
        .unwrap_err();
    assert!(matches!(err.root_cause(), RuntimeValidationError::Decode { .. }));
}

#[test]
fn test_recursive_round_trip() {
    let schema = fixture("tree.json");
    let output = compile_value(&schema);
    let runtime = Runtime::new(&output);

    let input = json!({
        "label": "root",
        "children": [
            {"label": "a", "children": [{"label": "a1"}]},
            {"label": "b", "parent": {"label": "root"}}
        ]
    });
    let encoded = runtime.round_trip("TreeNode", &input).unwrap();
    assert_eq!(encoded, input);
    assert_conforms(&schema, &encoded);

    let err = runtime
        .unmarshal("TreeNode", &json!({"label": "root", "children": [{"children": []}]}))
        .unwrap_err();
    assert_eq!(err.path(), vec!["TreeNode.Children", "[0]"]);
}

// =============================================================================
// Naming and determinism
// =============================================================================

#[test]
fn test_naming_idempotence() {
    let graph = normalize(&Schema::from_value(fixture("order.json")).unwrap()).unwrap();
    let mut resolver = NameResolver::new(NamingConfig::default());

    for node in graph.nodes() {
        let hint = format!("Hinted{}", node.id.index());
        let first = resolver.name_of(&graph, node.id, NameHint::derived(hint)).unwrap();
        let second = resolver.name_of(&graph, node.id, NameHint::derived("Other")).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_id_suffix_and_nested_naming() {
    let output = compile_value(&json!({
        "title": "Parent",
        "properties": {
            "employeeId": {"type": "string"},
            "child": {"type": "object", "properties": {"x": {"type": "string"}}}
        }
    }));

    let parent = output.get("Parent").unwrap();
    assert!(parent.field("EmployeeID").is_some());
    assert!(parent.field("EmployeeId").is_none());
    assert!(output.get("ParentChild").is_some());
    assert!(output.get("Object").is_none());
    assert!(output.get("Child").is_none());
}

#[test]
fn test_determinism() {
    for name in ["order.json", "employee.json", "payment.json", "tree.json"] {
        let schema = fixture(name);
        let first = compile_value(&schema).to_json_pretty().unwrap();
        let second = compile_value(&schema).to_json_pretty().unwrap();
        assert_eq!(first, second, "{} compiled differently twice", name);
    }
}

#[test]
fn test_concurrent_compilations_are_isolated() {
    let names = ["order.json", "employee.json", "payment.json", "tree.json"];
    let expected: Vec<String> = names
        .iter()
        .map(|n| compile_value(&fixture(n)).to_json_pretty().unwrap())
        .collect();

    let results: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = names
            .iter()
            .map(|n| scope.spawn(move || compile_value(&fixture(n)).to_json_pretty().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results, expected);
}
