use crate::parser::parse;
use crate::{ResourceLimits, TsdError};
use serde_json::Value;

fn statements(input: &str) -> Vec<Value> {
    let raw = parse(input, "test.tsd", &ResourceLimits::default()).unwrap();
    raw["statements"].as_array().unwrap().clone()
}

#[test]
fn test_parse_empty_source() {
    let raw = parse("", "empty.tsd", &ResourceLimits::default()).unwrap();
    assert_eq!(raw["type"], "program");
    assert_eq!(raw["file"], "empty.tsd");
    assert!(raw["statements"].as_array().unwrap().is_empty());
}

#[test]
fn test_parse_whitespace_and_comments_only() {
    let input = "  \n\t// a line comment\n/* a block\n comment */\n\n";
    assert!(statements(input).is_empty());
}

#[test]
fn test_parse_type_definition() {
    let result = statements("type Person(#id: string, name: string, age: number)");
    assert_eq!(result.len(), 1);
    let def = &result[0];
    assert_eq!(def["type"], "typeDefinition");
    assert_eq!(def["name"], "Person");
    let fields = def["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0]["name"], "id");
    assert_eq!(fields[0]["isPrimaryKey"], true);
    assert_eq!(fields[1]["isPrimaryKey"], false);
    assert_eq!(fields[2]["type"], "number");
}

#[test]
fn test_parse_empty_type() {
    let result = statements("type Marker()");
    assert_eq!(result[0]["fields"].as_array().unwrap().len(), 0);
}

#[test]
fn test_parse_action_definition_with_defaults() {
    let result = statements(r#"action notify(to: string, body: string = "hi", prio?: number)"#);
    let params = result[0]["parameters"].as_array().unwrap();
    assert_eq!(result[0]["type"], "actionDefinition");
    assert_eq!(params.len(), 3);
    assert_eq!(params[0]["optional"], false);
    assert_eq!(params[1]["defaultValue"]["type"], "stringLiteral");
    assert_eq!(params[1]["defaultValue"]["value"], "hi");
    assert_eq!(params[2]["optional"], true);
    assert!(params[2].get("defaultValue").is_none());
}

#[test]
fn test_parse_fact_values() {
    let result = statements(r#"Person(id: "P1", age: 30, score: 1.5, active: true, owner: alice)"#);
    let fact = &result[0];
    assert_eq!(fact["type"], "fact");
    assert_eq!(fact["typeName"], "Person");
    let fields = fact["fields"].as_array().unwrap();
    assert_eq!(fields[0]["value"]["type"], "string");
    assert_eq!(fields[1]["value"]["type"], "number");
    assert_eq!(fields[1]["value"]["value"], 30);
    assert_eq!(fields[2]["value"]["value"], 1.5);
    assert_eq!(fields[3]["value"]["type"], "bool");
    assert_eq!(fields[4]["value"]["type"], "identifier");
    assert_eq!(fields[4]["value"]["value"], "alice");
}

#[test]
fn test_parse_fact_assignment() {
    let result = statements(r#"alice = User(name: "Alice")"#);
    assert_eq!(result[0]["type"], "factAssignment");
    assert_eq!(result[0]["variable"], "alice");
    assert_eq!(result[0]["fact"]["typeName"], "User");
}

#[test]
fn test_parse_removals() {
    let result = statements("remove fact Person P1\nremove fact Order \"Order~a b\"\nremove rule r1");
    assert_eq!(result.len(), 3);
    assert_eq!(result[0]["type"], "factRetraction");
    assert_eq!(result[0]["typeName"], "Person");
    assert_eq!(result[0]["factId"], "P1");
    assert_eq!(result[1]["factId"], "Order~a b");
    assert_eq!(result[2]["type"], "ruleRemoval");
    assert_eq!(result[2]["ruleId"], "r1");
}

#[test]
fn test_parse_reset_directive() {
    let result = statements("type A(#k: string)\nreset\ntype B(#k: string)");
    let tags: Vec<&str> = result.iter().map(|s| s["type"].as_str().unwrap()).collect();
    assert_eq!(tags, vec!["typeDefinition", "reset", "typeDefinition"]);
}

#[test]
fn test_parse_reset_with_crlf_and_trailing_comment() {
    let result = statements("reset // start over\r\ntype B(#k: string)\r\n");
    assert_eq!(result[0]["type"], "reset");
    assert_eq!(result[1]["name"], "B");
}

#[test]
fn test_parse_xuple_space() {
    let input = "xuple-space orders {\n  selection: lifo\n  consumption: limited(3)\n  retention: duration(10m)\n}";
    let result = statements(input);
    let space = &result[0];
    assert_eq!(space["type"], "xupleSpace");
    assert_eq!(space["name"], "orders");
    assert_eq!(space["selectionPolicy"], "lifo");
    assert_eq!(space["consumptionPolicy"]["limit"], 3);
    assert_eq!(space["retentionPolicy"]["seconds"], 600);
}

#[test]
fn test_parse_xuple_space_defaults_left_out() {
    let result = statements("xuple-space q { consumption: per-agent }");
    assert!(result[0].get("selectionPolicy").is_none());
    assert_eq!(result[0]["consumptionPolicy"]["type"], "per-agent");
}

#[test]
fn test_statements_carry_spans() {
    let result = statements("type A(#k: string)\n\nA(k: \"1\")");
    assert_eq!(result[0]["span"]["line"], 1);
    assert_eq!(result[1]["span"]["line"], 3);
    assert_eq!(result[1]["span"]["col"], 1);
}

#[test]
fn test_unicode_identifiers_and_strings() {
    let result = statements("type Café(#nom: string)\nCafé(nom: \"crème brûlée ☕\")");
    assert_eq!(result[0]["name"], "Café");
    assert_eq!(result[1]["fields"][0]["value"]["value"], "crème brûlée ☕");
}

#[test]
fn test_string_escapes() {
    let result = statements(r#"T(s: "a\"b\n", t: 'it\'s')"#);
    assert_eq!(result[0]["fields"][0]["value"]["value"], "a\"b\n");
    assert_eq!(result[0]["fields"][1]["value"]["value"], "it's");
}

#[test]
fn test_hash_is_not_a_comment() {
    let result = parse("# not a comment\ntype A()", "bad.tsd", &ResourceLimits::default());
    match result {
        Err(TsdError::Parse(details)) => {
            assert_eq!(details.source_id, "bad.tsd");
            assert_eq!(details.span.line, 1);
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_identifier_cannot_start_with_digit() {
    assert!(parse("type 1A()", "t.tsd", &ResourceLimits::default()).is_err());
}

#[test]
fn test_parse_error_is_never_partial() {
    let result = parse(
        "type A(#k: string)\nA(k: \"1\")\nthis is not tsd",
        "t.tsd",
        &ResourceLimits::default(),
    );
    match result {
        Err(TsdError::Parse(details)) => assert_eq!(details.span.line, 3),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_source_size_limit() {
    let limits = ResourceLimits {
        max_file_size_bytes: 10,
        ..ResourceLimits::default()
    };
    let result = parse("type Person(#id: string)", "big.tsd", &limits);
    match result {
        Err(TsdError::Parse(details)) => assert!(details.suggestion.is_some()),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_parsing_is_deterministic() {
    let input = r#"
        type P(#id: string, age: number)
        P(id: "x", age: 3)
        rule r : {p: P} / p.age > 1 AND p.id != "y" ==> log(p.id)
    "#;
    let first = parse(input, "t.tsd", &ResourceLimits::default()).unwrap();
    let second = parse(input, "t.tsd", &ResourceLimits::default()).unwrap();
    assert_eq!(first, second);
}
