use tsd::*;

fn load(code: &str, file: &str) -> ProgramState {
    let mut state = ProgramState::new();
    state.parse_and_merge_content(code, file).unwrap();
    state
}

#[test]
fn test_end_to_end_primary_key_fact() {
    let state = load(
        r#"
type Person(#id: string, name: string, age: number)
Person(id: "P1", name: "Alice", age: 30)
"#,
        "people.tsd",
    );

    let stats = state.get_parsing_statistics();
    assert_eq!(stats.types, 1);
    assert_eq!(stats.facts, 1);
    assert_eq!(stats.rules, 0);
    assert_eq!(stats.errors, 0);
    assert_eq!(state.get_fact_ids(), vec!["Person~P1"]);
}

#[test]
fn test_end_to_end_hash_id() {
    let code = r#"
type Event(timestamp: number, message: string)
Event(timestamp: 1234567890, message: "test")
"#;
    let first = load(code, "events.tsd");
    let second = load(code, "events.tsd");

    let id = &first.get_fact_ids()[0];
    assert!(!first.get_types()[0].has_primary_key());
    let tail = id.strip_prefix("Event~").unwrap();
    assert_eq!(tail.len(), 16);
    assert!(tail.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    assert_eq!(first.get_fact_ids(), second.get_fact_ids());

    let parsed = parse_fact_id(id).unwrap();
    assert!(parsed.is_hash);
}

#[test]
fn test_end_to_end_duplicate_rule_id() {
    let state = load(
        r#"
type P(#id: string, age: number)
rule r1: {p: P} / p.age > 18 ==> a(p.id)
rule r1: {p: P} / p.age == 18 ==> b(p.id)
"#,
        "dup.tsd",
    );

    let rules = state.get_rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].action.jobs[0].name, "a");

    let errors = state.get_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Rule);
    assert_eq!(errors[0].line, Some(4));
}

#[test]
fn test_end_to_end_multi_source_aggregation() {
    let state = load(
        r#"
type Dept(#id: string)
type Emp(#id: string, deptId: string, salary: number)
rule ds: {d: Dept, avg_sal: AVG(e.salary)} / {e: Emp} / e.deptId == d.id ==> print("x")
"#,
        "agg.tsd",
    );
    assert!(!state.has_errors(), "{:?}", state.get_errors());

    let json = state.to_normalized_program().to_json().unwrap();
    let rule = &json["expressions"][0];
    let patterns = rule["patterns"].as_array().unwrap();
    assert_eq!(patterns.len(), 2);

    let first = patterns[0]["variables"].as_array().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[1]["type"], "aggregationVariable");
    assert_eq!(first[1]["function"], "AVG");
    assert_eq!(first[1]["field"]["type"], "fieldAccess");
    assert_eq!(first[1]["field"]["object"], "e");
    assert_eq!(first[1]["field"]["field"], "salary");

    let second = patterns[1]["variables"].as_array().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0]["name"], "e");
    assert_eq!(second[0]["dataType"], "Emp");

    assert_eq!(rule["constraints"]["type"], "comparison");
}

#[test]
fn test_end_to_end_reset_mid_stream() {
    let mut state = ProgramState::new();
    state
        .parse_and_merge_content("type A(#k: string)\nA(k: \"1\")\n", "first.tsd")
        .unwrap();
    state
        .parse_and_merge_content("reset\ntype B(#k: string)\nB(k: \"2\")\n", "second.tsd")
        .unwrap();

    let types = state.get_types();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].name, "B");
    assert_eq!(state.get_fact_ids(), vec!["B~2"]);
    assert_eq!(state.get_files_parsed(), vec!["first.tsd", "second.tsd"]);
    assert!(!state.has_errors());
}

#[test]
fn test_end_to_end_fact_reference_composite_key() {
    let state = load(
        r#"
type User(#name: string)
type Order(#user: User, #n: number, total: number)
alice = User(name: "Alice")
Order(user: alice, n: 1001, total: 150.5)
"#,
        "orders.tsd",
    );
    assert!(!state.has_errors(), "{:?}", state.get_errors());
    assert_eq!(
        state.get_fact_ids(),
        vec!["User~Alice", "Order~User%7EAlice_1001"]
    );

    let parsed = parse_fact_id("Order~User%7EAlice_1001").unwrap();
    assert_eq!(parsed.type_name, "Order");
    assert_eq!(parsed.values, vec!["User~Alice", "1001"]);
}

#[test]
fn test_end_to_end_files_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    let types = dir.join("types.tsd");
    let facts = dir.join("facts.tsd");
    let empty = dir.join("empty.tsd");
    std::fs::write(&types, "type Person(#id: string, age: number)\n").unwrap();
    std::fs::write(&facts, "Person(id: \"P1\", age: 40)\n").unwrap();
    std::fs::write(&empty, "").unwrap();

    let mut state = ProgramState::new();
    state.parse_and_merge(&types).unwrap();
    state.parse_and_merge(&facts).unwrap();
    state.parse_and_merge(&empty).unwrap();

    assert_eq!(state.get_files_parsed().len(), 3);
    assert_eq!(state.get_fact_ids(), vec!["Person~P1"]);

    let missing = state.parse_and_merge(dir.join("missing.tsd"));
    match missing {
        Err(TsdError::Io(message)) => assert!(message.contains("failed to read file")),
        other => panic!("expected I/O error, got {:?}", other),
    }
    assert_eq!(state.get_files_parsed().len(), 3);
}

#[test]
fn test_end_to_end_export_round_trips_through_normalizer() {
    let state = load(
        r#"
type User(#name: string)
action notify(to: string)
alice = User(name: "Alice")
User(name: "Bob")
rule hello : {u: User} / u.name != "Carol" ==> notify(u.name)
remove rule stale
"#,
        "app.tsd",
    );
    assert!(!state.has_errors(), "{:?}", state.get_errors());

    let exported = state.to_normalized_program().to_json_string(false).unwrap();
    let (unit, errors) = normalize_json(&exported, "exported.json", &ResourceLimits::default()).unwrap();
    assert!(errors.is_empty(), "{:?}", errors);

    let mut reloaded = ProgramState::new();
    reloaded.merge_unit(&unit);
    assert!(!reloaded.has_errors(), "{:?}", reloaded.get_errors());
    assert_eq!(reloaded.get_fact_ids(), state.get_fact_ids());
    assert_eq!(reloaded.get_rules(), {
        let mut rules = state.get_rules();
        for rule in &mut rules {
            rule.span = None;
        }
        rules
    });
    assert_eq!(reloaded.get_removals(), state.get_removals());
}
