//! `{{dotted.path}}` placeholder resolution.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use trellis_protocols::types::RunContext;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_$.\-]+)\s*\}\}").unwrap_or_else(|e| panic!("bad placeholder pattern: {e}"))
});

/// Replace every `{{path}}` placeholder with a literal rendering of the
/// context value at that path.
///
/// Missing paths and nulls render as `null`. Strings render quoted and
/// escaped, so a value can only ever enter the expression as a single
/// string literal. Objects and arrays render as their JSON text inside a
/// string literal, which keeps them comparable and searchable with
/// `contains`.
pub fn render(expression: &str, context: &RunContext) -> String {
    PLACEHOLDER
        .replace_all(expression, |caps: &regex::Captures<'_>| {
            render_value(context.resolve(&caps[1]))
        })
        .into_owned()
}

/// Render a context value as an expression literal.
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => quote(s),
        Some(other) => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RunContext {
        let mut ctx = RunContext::new();
        ctx.record_step(
            "fetch",
            json!({"success": true, "result": {"count": 5, "label": "ok\"done\""}}),
        );
        ctx
    }

    #[test]
    fn test_renders_literals_by_type() {
        let ctx = context();
        assert_eq!(render("{{steps.fetch.success}}", &ctx), "true");
        assert_eq!(render("{{steps.fetch.result.count}}", &ctx), "5");
        assert_eq!(
            render("{{steps.fetch.result.label}}", &ctx),
            "\"ok\\\"done\\\"\""
        );
    }

    #[test]
    fn test_missing_path_renders_null() {
        let ctx = context();
        assert_eq!(render("{{steps.other.success}}", &ctx), "null");
        assert_eq!(render("{{nothing.at.all}} === null", &ctx), "null === null");
    }

    #[test]
    fn test_multiple_placeholders() {
        let ctx = context();
        assert_eq!(
            render(
                "{{steps.fetch.result.count}} > 3 && {{steps.fetch.success}}",
                &ctx
            ),
            "5 > 3 && true"
        );
    }

    #[test]
    fn test_object_renders_as_quoted_json() {
        let ctx = context();
        let rendered = render("{{steps.fetch.result}}", &ctx);
        assert!(rendered.starts_with('"'));
        assert!(rendered.contains("count"));
    }
}
