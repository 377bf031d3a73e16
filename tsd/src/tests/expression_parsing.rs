use crate::parser::parse;
use crate::ResourceLimits;
use serde_json::Value;

fn rule(input: &str) -> Value {
    let raw = parse(input, "rules.tsd", &ResourceLimits::default()).unwrap();
    raw["statements"][0].clone()
}

fn condition(constraint: &str) -> Value {
    let input = format!("rule r : {{p: P}} / {} ==> act()", constraint);
    rule(&input)["constraints"].clone()
}

#[test]
fn test_simple_rule_shape() {
    let r = rule("rule adults : {p: Person} / p.age >= 18 ==> greet(p.name)");
    assert_eq!(r["type"], "expression");
    assert_eq!(r["ruleId"], "adults");
    let patterns = r["patterns"].as_array().unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0]["type"], "set");
    assert_eq!(patterns[0]["variables"][0]["type"], "typedVariable");
    assert_eq!(patterns[0]["variables"][0]["dataType"], "Person");

    let constraint = &r["constraints"];
    assert_eq!(constraint["type"], "comparison");
    assert_eq!(constraint["operator"], ">=");
    assert_eq!(constraint["left"]["type"], "fieldAccess");
    assert_eq!(constraint["left"]["object"], "p");
    assert_eq!(constraint["right"]["type"], "numberLiteral");

    let jobs = r["action"]["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["type"], "jobCall");
    assert_eq!(jobs[0]["name"], "greet");
}

#[test]
fn test_rule_without_condition() {
    let r = rule("rule r : {p: T} / ==> act()");
    assert!(r["constraints"].is_null());
    assert_eq!(r["action"]["jobs"].as_array().unwrap().len(), 1);

    let r = rule("rule r : {p: T} ==> act()");
    assert!(r["constraints"].is_null());
}

#[test]
fn test_multi_pattern_aggregation_rule() {
    let r = rule(
        "rule ds: {d: Dept, avg_sal: AVG(e.salary)} / {e: Emp} / e.deptId == d.id ==> print(\"x\")",
    );
    let patterns = r["patterns"].as_array().unwrap();
    assert_eq!(patterns.len(), 2);
    let first = patterns[0]["variables"].as_array().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[1]["type"], "aggregationVariable");
    assert_eq!(first[1]["function"], "AVG");
    assert_eq!(first[1]["field"]["type"], "fieldAccess");
    assert_eq!(first[1]["field"]["object"], "e");
    assert_eq!(first[1]["field"]["field"], "salary");
    assert_eq!(patterns[1]["variables"][0]["name"], "e");
    assert_eq!(r["constraints"]["type"], "comparison");
}

#[test]
fn test_count_over_variable() {
    let r = rule("rule c : {n: COUNT(e)} / {e: Emp} ==> log(n)");
    let agg = &r["patterns"][0]["variables"][0];
    assert_eq!(agg["function"], "COUNT");
    assert_eq!(agg["field"]["type"], "variable");
    assert_eq!(agg["field"]["name"], "e");
}

#[test]
fn test_logical_chain_keeps_spellings() {
    let c = condition("p.a == 1 AND p.b == 2 || p.c == 3 and p.d == 4");
    assert_eq!(c["type"], "logicalExpr");
    let ops = c["operations"].as_array().unwrap();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0]["op"], "AND");
    assert_eq!(ops[1]["op"], "||");
    assert_eq!(ops[2]["op"], "and");
    assert_eq!(ops[2]["right"]["type"], "comparison");
}

#[test]
fn test_keyword_case_forms() {
    for op in ["AND", "and", "And", "&&", "&", "OR", "or", "Or", "||", "|"] {
        let c = condition(&format!("p.a == 1 {} p.b == 2", op));
        assert_eq!(c["type"], "logicalExpr", "operator {}", op);
    }
    let result = parse(
        "rule r : {p: P} / p.a == 1 aNd p.b == 2 ==> act()",
        "r.tsd",
        &ResourceLimits::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_arithmetic_is_left_associative() {
    let c = condition("p.a - 1 - 2 > p.b * 3 + 4");
    let left = &c["left"];
    assert_eq!(left["type"], "binaryOp");
    assert_eq!(left["operator"], "-");
    assert_eq!(left["left"]["type"], "binaryOp");
    assert_eq!(left["right"]["value"], 2);
    let right = &c["right"];
    assert_eq!(right["operator"], "+");
    assert_eq!(right["left"]["operator"], "*");
}

#[test]
fn test_not_and_parentheses() {
    let c = condition("NOT (p.a == 1 OR p.b == 2)");
    assert_eq!(c["type"], "notConstraint");
    assert_eq!(c["expression"]["type"], "logicalExpr");

    let c = condition("not p.active == true");
    assert_eq!(c["type"], "notConstraint");
    assert_eq!(c["expression"]["type"], "comparison");
}

#[test]
fn test_exists_constraint() {
    let c = condition("EXISTS(o: Order / o.pid == p.id)");
    assert_eq!(c["type"], "existsConstraint");
    assert_eq!(c["variable"]["name"], "o");
    assert_eq!(c["variable"]["dataType"], "Order");
    assert_eq!(c["condition"]["type"], "comparison");
}

#[test]
fn test_accumulate_constraint() {
    let c = condition("SUM(o: Order / o.pid == p.id, o.total) > 100");
    assert_eq!(c["type"], "comparison");
    let acc = &c["left"];
    assert_eq!(acc["type"], "accumulateConstraint");
    assert_eq!(acc["function"], "SUM");
    assert_eq!(acc["field"]["field"], "total");

    let c = condition("COUNT(o: Order / o.pid == p.id) >= 2");
    assert!(c["left"]["field"].is_null());
}

#[test]
fn test_string_operators() {
    let c = condition(r#"p.name CONTAINS "li""#);
    assert_eq!(c["type"], "stringOp");
    assert_eq!(c["operator"], "CONTAINS");

    let c = condition(r#"p.status in ["a", "b"]"#);
    assert_eq!(c["type"], "stringOp");
    assert_eq!(c["operator"], "in");
    assert_eq!(c["right"]["type"], "arrayLiteral");
    assert_eq!(c["right"]["elements"].as_array().unwrap().len(), 2);
}

#[test]
fn test_function_calls() {
    let c = condition("LENGTH(UPPER(p.name)) > 3");
    assert_eq!(c["left"]["type"], "functionCall");
    assert_eq!(c["left"]["name"], "LENGTH");
    assert_eq!(c["left"]["args"][0]["type"], "functionCall");
}

#[test]
fn test_job_arguments() {
    let r = rule(r#"rule r : {p: P} / ==> notify(p.id, "x", 1 + 2, p.age > 3), log(p)"#);
    let jobs = r["action"]["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    let args = jobs[0]["args"].as_array().unwrap();
    assert_eq!(args.len(), 4);
    assert_eq!(args[0]["type"], "fieldAccess");
    assert_eq!(args[1]["type"], "stringLiteral");
    assert_eq!(args[2]["type"], "binaryOp");
    assert_eq!(args[3]["type"], "binaryOp");
    assert_eq!(args[3]["operator"], ">");
    assert_eq!(jobs[1]["args"][0]["type"], "variable");
}

#[test]
fn test_nesting_limit_is_a_parse_error() {
    let limits = ResourceLimits {
        max_expression_depth: 8,
        ..ResourceLimits::default()
    };
    let nested = format!("{}p.a == 1{}", "(".repeat(20), ")".repeat(20));
    let input = format!("rule r : {{p: P}} / {} ==> act()", nested);
    assert!(parse(&input, "deep.tsd", &limits).is_err());
}
