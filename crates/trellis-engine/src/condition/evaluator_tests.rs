use serde_json::json;
use trellis_protocols::error::EvaluationError;
use trellis_protocols::types::RunContext;

use super::{evaluate, step_succeeded, variable_contains, variable_equals};

fn context() -> RunContext {
    let mut ctx = RunContext::new();
    ctx.record_step(
        "fetch",
        json!({
            "success": true,
            "name": "Fetch",
            "result": {"count": 5, "status": "done", "log": "2 errors, 1 warning"}
        }),
    );
    ctx.record_step("parse", json!({"success": false, "error": "bad payload"}));
    ctx
}

#[test]
fn test_literal_expressions_follow_operator_semantics() {
    let ctx = RunContext::new();
    assert!(evaluate("5 > 3 && true", &ctx).unwrap());
    assert!(!evaluate("5 < 3 || false", &ctx).unwrap());
    assert!(evaluate("(1 <= 1) && (2 >= 2)", &ctx).unwrap());
    assert!(evaluate("\"a\" !== \"b\"", &ctx).unwrap());
}

#[test]
fn test_context_interpolation() {
    let ctx = context();
    assert!(evaluate("{{steps.fetch.result.count}} > 3", &ctx).unwrap());
    assert!(evaluate("{{steps.fetch.result.status}} === \"done\"", &ctx).unwrap());
    assert!(!evaluate("{{steps.parse.success}} === true", &ctx).unwrap());
}

#[test]
fn test_missing_paths_resolve_to_null() {
    let ctx = context();
    assert!(evaluate("{{steps.unknown.success}} === null", &ctx).unwrap());
    assert!(!evaluate("{{steps.unknown.result.count}} > 0", &ctx).unwrap());
}

#[test]
fn test_disallowed_payloads_never_execute() {
    let ctx = RunContext::new();
    for expression in [
        "require('fs')",
        "a()",
        "x = 1",
        "process.exit",
        "(() => 1)",
        "new Date()",
        "globalThis",
        "a[0] == 1",
        "i++",
    ] {
        let err = evaluate(expression, &ctx).unwrap_err();
        assert_eq!(err.expression(), expression, "for {expression}");
    }
}

#[test]
fn test_bare_identifiers_rejected_after_interpolation() {
    let ctx = RunContext::new();
    assert!(matches!(
        evaluate("status === 1", &ctx),
        Err(EvaluationError::InvalidToken { .. })
    ));
}

#[test]
fn test_interpolated_string_stays_a_literal() {
    // A context value that looks like code must land as an inert string
    // literal, not as expression text.
    let mut ctx = RunContext::new();
    ctx.record_step("fetch", json!({"result": {"status": "1 || true"}}));
    assert!(!evaluate("{{steps.fetch.result.status}} === \"done\"", &ctx).unwrap());
    assert!(evaluate(
        "{{steps.fetch.result.status}} === \"1 || true\"",
        &ctx
    )
    .unwrap());
}

#[test]
fn test_builder_expressions_evaluate() {
    let ctx = context();
    assert!(evaluate(&step_succeeded("fetch"), &ctx).unwrap());
    assert!(!evaluate(&step_succeeded("parse"), &ctx).unwrap());
    assert!(evaluate(
        &variable_equals("steps.fetch.result.status", &json!("done")),
        &ctx
    )
    .unwrap());
    assert!(evaluate(
        &variable_contains("steps.fetch.result.log", "error"),
        &ctx
    )
    .unwrap());
}

#[test]
fn test_truthiness_of_bare_values() {
    let ctx = context();
    assert!(evaluate("{{steps.fetch.success}}", &ctx).unwrap());
    assert!(!evaluate("{{steps.unknown.success}}", &ctx).unwrap());
    assert!(!evaluate("\"\"", &ctx).unwrap());
    assert!(!evaluate("0", &ctx).unwrap());
    assert!(evaluate("\"non-empty\"", &ctx).unwrap());
}

#[test]
fn test_error_reports_offending_expression() {
    let ctx = RunContext::new();
    let expression = "1 > ";
    match evaluate(expression, &ctx) {
        Err(err) => assert_eq!(err.expression(), expression),
        Ok(_) => panic!("expected syntax error"),
    }
}
