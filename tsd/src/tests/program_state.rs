use crate::semantic::*;
use crate::{ErrorKind, ProgramState, TsdError, ValidationError};

fn merged(sources: &[(&str, &str)]) -> ProgramState {
    let mut state = ProgramState::new();
    for (name, content) in sources {
        state.parse_and_merge_content(content, name).unwrap();
    }
    state
}

#[test]
fn test_empty_arguments_are_rejected() {
    let mut state = ProgramState::new();
    assert!(matches!(
        state.parse_and_merge_content("", "a.tsd"),
        Err(TsdError::Argument(_))
    ));
    assert!(matches!(
        state.parse_and_merge_content("type A()", ""),
        Err(TsdError::Argument(_))
    ));
    assert!(state.get_files_parsed().is_empty());
    assert!(!state.has_errors());
}

#[test]
fn test_parse_failure_is_one_recorded_error() {
    let state = merged(&[("broken.tsd", "type A(#k: string)\ntype B(")]);
    assert_eq!(state.get_files_parsed(), vec!["broken.tsd"]);
    assert_eq!(state.get_error_count(), 1);
    let error = &state.get_errors()[0];
    assert_eq!(error.kind, ErrorKind::Parse);
    assert_eq!(error.file, "broken.tsd");
    assert!(state.get_types().is_empty());
}

#[test]
fn test_declarations_accumulate_across_files() {
    let state = merged(&[
        ("types.tsd", "type Person(#id: string, age: number)"),
        ("facts.tsd", "Person(id: \"P1\", age: 30)\nPerson(id: \"P2\", age: 12)"),
        ("rules.tsd", "rule adults : {p: Person} / p.age >= 18 ==> log(p.id)"),
    ]);
    assert!(!state.has_errors(), "{:?}", state.get_errors());
    assert_eq!(state.get_types().len(), 1);
    assert_eq!(state.get_fact_ids(), vec!["Person~P1", "Person~P2"]);
    assert_eq!(state.get_rules()[0].rule_id, "adults");
    assert_eq!(state.get_files_parsed().len(), 3);
}

#[test]
fn test_declaration_order_within_a_file_does_not_matter() {
    let state = merged(&[(
        "mixed.tsd",
        r#"
        rule r : {p: Person} ==> greet(p.id)
        Person(id: "P1")
        action greet(id: string)
        type Person(#id: string)
        "#,
    )]);
    assert!(!state.has_errors(), "{:?}", state.get_errors());
    assert_eq!(state.get_rules().len(), 1);
    assert_eq!(state.get_facts().len(), 1);
}

#[test]
fn test_compatible_type_extension_replaces_definition() {
    let state = merged(&[
        ("a.tsd", "type T(#k: string)"),
        ("b.tsd", "type T(#k: string, extra: number)"),
        ("c.tsd", "type T(#k: string, extra: number)"),
    ]);
    assert!(!state.has_errors(), "{:?}", state.get_errors());
    let types = state.get_types();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].fields.len(), 2);
}

#[test]
fn test_narrowing_redefinition_is_rejected() {
    let state = merged(&[
        ("a.tsd", "type T(#k: string, extra: number)"),
        ("b.tsd", "type T(#k: string)"),
    ]);
    assert_eq!(state.get_error_count(), 1);
    assert!(state.get_errors()[0].message.contains("drops field 'extra'"));
    assert_eq!(state.get_types()[0].fields.len(), 2);
}

#[test]
fn test_incompatible_redefinition_keeps_first() {
    let state = merged(&[
        ("a.tsd", "type T(#k: string, n: number)"),
        ("b.tsd", "type T(#k: string, n: string)"),
    ]);
    assert_eq!(state.get_error_count(), 1);
    assert_eq!(state.get_errors()[0].kind, ErrorKind::Type);
    assert_eq!(state.get_errors()[0].file, "b.tsd");
    assert_eq!(state.get_types()[0].fields[1].field_type, "number");
}

#[test]
fn test_rejected_declarations_are_not_merged() {
    let state = merged(&[(
        "mixed.tsd",
        r#"
        type P(#id: string, age: number)
        P(id: "ok", age: 1)
        P(id: "bad", age: "x")
        rule good : {p: P} ==> log(p.id)
        rule bad : {p: P} / p.ghost == 1 ==> log(p.id)
        "#,
    )]);
    let kinds: Vec<ErrorKind> = state.get_errors().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::Fact, ErrorKind::Rule]);
    assert_eq!(state.get_facts().len(), 1);
    assert_eq!(state.get_rules().len(), 1);
    assert_eq!(state.get_errors()[0].line, Some(4));
}

#[test]
fn test_duplicate_rule_id_across_files() {
    let mut state = merged(&[
        ("a.tsd", "type P(#id: string)\nrule r1 : {p: P} ==> log(p.id)"),
        ("b.tsd", "rule r1 : {p: P} ==> log(p.id)"),
    ]);
    assert_eq!(state.get_error_count(), 1);
    assert!(state.get_errors()[0].message.contains("duplicate rule ID"));

    state.set_rule_id_uniqueness(false);
    state
        .parse_and_merge_content("rule r1 : {p: P} ==> log(p.id)", "c.tsd")
        .unwrap();
    assert_eq!(state.get_error_count(), 1);
    assert_eq!(state.get_rules().len(), 2);
}

#[test]
fn test_reset_clears_content_but_keeps_history() {
    let state = merged(&[
        ("a.tsd", "type A(#k: string)\nA(k: \"1\")\ntype Broken(#k: Ghost)"),
        ("b.tsd", "reset\ntype B(#k: string)"),
    ]);
    let names: Vec<String> = state.get_types().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["B"]);
    assert!(state.get_facts().is_empty());
    assert_eq!(state.get_files_parsed(), vec!["a.tsd", "b.tsd"]);
    assert_eq!(state.get_error_count(), 1);
}

#[test]
fn test_reset_mid_file_discards_earlier_statements() {
    let state = merged(&[(
        "r.tsd",
        "type A(#k: string)\nrule ra : {a: A} ==> log(a.k)\nreset\ntype B(#k: string)\nB(k: \"x\")",
    )]);
    assert!(!state.has_errors(), "{:?}", state.get_errors());
    assert_eq!(state.get_types().len(), 1);
    assert_eq!(state.get_types()[0].name, "B");
    assert!(state.get_rules().is_empty());
    assert_eq!(state.get_fact_ids(), vec!["B~x"]);
}

#[test]
fn test_explicit_reset_and_clear_errors() {
    let mut state = merged(&[("a.tsd", "type A(#k: Ghost)\ntype B(#k: string)")]);
    assert!(state.has_errors());
    state.reset();
    assert!(state.get_types().is_empty());
    assert!(state.has_errors());
    state.clear_errors();
    assert!(!state.has_errors());
    assert_eq!(state.get_files_parsed().len(), 1);
}

#[test]
fn test_fact_assignment_feeds_references() {
    let state = merged(&[(
        "refs.tsd",
        r#"
        type User(#name: string)
        type Order(#user: User, #num: number)
        alice = User(name: "Alice")
        Order(user: alice, num: 1001)
        "#,
    )]);
    assert!(!state.has_errors(), "{:?}", state.get_errors());
    assert_eq!(state.get_fact_ids(), vec!["User~Alice", "Order~User%7EAlice_1001"]);
    assert_eq!(state.get_fact_assignments()[0].variable, "alice");
    let order = &state.get_facts()[1];
    assert_eq!(
        order.value("user"),
        Some(&FactValue::VariableReference("alice".to_string()))
    );
}

#[test]
fn test_hash_ids_for_keyless_types() {
    let state = merged(&[(
        "log.tsd",
        "type Event(msg: string, level: number)\nEvent(msg: \"a\", level: 1)\nEvent(level: 1, msg: \"a\")",
    )]);
    assert!(!state.has_errors(), "{:?}", state.get_errors());
    let ids = state.get_fact_ids();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], ids[1]);
    assert!(ids[0].starts_with("Event~"));
    assert_eq!(ids[0].len(), "Event~".len() + 16);
}

#[test]
fn test_integer_key_outside_i64_fails_the_file() {
    let state = merged(&[(
        "big.tsd",
        "type P(#n: number)\nP(n: 99999999999999999999)\nP(n: 100000000000000000001)",
    )]);
    assert!(state.get_facts().is_empty());
    let errors = state.get_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Parse);
    assert!(errors[0].message.contains("Integer out of range"));

    let state = merged(&[("max.tsd", "type P(#n: number)\nP(n: 9223372036854775807)")]);
    assert_eq!(state.get_fact_ids(), vec!["P~9223372036854775807"]);
}

#[test]
fn test_removals_are_recorded_in_order() {
    let state = merged(&[(
        "rm.tsd",
        "remove fact Person P1\nremove rule r1",
    )]);
    let removals = state.get_removals();
    assert_eq!(removals.len(), 2);
    assert!(matches!(removals[0], Removal::FactRetraction { .. }));
    let program = state.to_program();
    assert_eq!(program.rule_removals.len(), 1);
    assert_eq!(program.fact_retractions.len(), 1);
}

#[test]
fn test_xuple_spaces_merge_once() {
    let state = merged(&[
        ("a.tsd", "xuple-space q { selection: lifo }"),
        ("b.tsd", "xuple-space q { selection: fifo }"),
    ]);
    assert_eq!(state.get_xuple_spaces().len(), 1);
    assert_eq!(state.get_errors()[0].kind, ErrorKind::Action);
}

#[test]
fn test_statistics() {
    let state = merged(&[
        ("a.tsd", "type P(#id: string)\naction log(m: string)\nP(id: \"1\")\np2 = P(id: \"2\")"),
        ("b.tsd", "rule r : {p: P} ==> log(p.id)\nremove rule old\nxuple-space q { }"),
        ("c.tsd", "type ("),
    ]);
    let stats = state.get_parsing_statistics();
    assert_eq!(stats.types, 1);
    assert_eq!(stats.actions, 1);
    assert_eq!(stats.facts, 2);
    assert_eq!(stats.fact_assignments, 1);
    assert_eq!(stats.rules, 1);
    assert_eq!(stats.removals, 1);
    assert_eq!(stats.xuple_spaces, 1);
    assert_eq!(stats.files_parsed, 3);
    assert_eq!(stats.errors, 1);
}

#[test]
fn test_add_error_is_recorded() {
    let mut state = ProgramState::new();
    state.add_error(ValidationError::new("x.tsd", ErrorKind::Rule, "external"));
    assert_eq!(state.get_error_count(), 1);
    assert_eq!(state.get_errors()[0].to_string(), "x.tsd: [rule] external");
}

#[test]
fn test_normalized_export_shape() {
    let state = merged(&[(
        "e.tsd",
        "type P(#id: string)\nP(id: \"1\")\nrule r : {p: P} ==> log(p.id)",
    )]);
    let json = state.to_normalized_program().to_json().unwrap();
    let fact = &json["facts"][0];
    assert_eq!(fact["_id_"], "P~1");
    assert_eq!(fact["reteType"], "P");
    assert_eq!(fact["typeName"], "P");
    assert_eq!(json["expressions"][0]["ruleId"], "r");
    assert!(json["expressions"][0]["set"].is_object());
    assert!(json["factAssignments"].as_array().unwrap().is_empty());
    assert!(json["xupleSpaces"].as_array().unwrap().is_empty());
}

#[test]
fn test_getters_return_copies() {
    let state = merged(&[("a.tsd", "type P(#id: string)")]);
    let mut types = state.get_types();
    types.clear();
    assert_eq!(state.get_types().len(), 1);
}
