//! Convenience builders for common guard expressions.
//!
//! Each produces a string in the evaluator's grammar. The builders emit
//! strict equality so the taught comparison behavior is the strict one.

use serde_json::Value;

use super::interpolate::render_value;

/// `steps.<id>.success === true`
pub fn step_succeeded(step_id: &str) -> String {
    format!("{{{{steps.{step_id}.success}}}} === true")
}

/// `steps.<id>.success === false`
pub fn step_failed(step_id: &str) -> String {
    format!("{{{{steps.{step_id}.success}}}} === false")
}

/// `<path> === <value>` with the value rendered as a literal.
pub fn variable_equals(path: &str, value: &Value) -> String {
    format!("{{{{{path}}}}} === {}", render_value(Some(value)))
}

/// `<path> > <value>`
pub fn variable_greater_than(path: &str, value: f64) -> String {
    format!("{{{{{path}}}}} > {value}")
}

/// `<path> contains "<substring>"`
pub fn variable_contains(path: &str, substring: &str) -> String {
    format!(
        "{{{{{path}}}}} contains {}",
        render_value(Some(&Value::String(substring.to_string())))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_builders() {
        assert_eq!(step_succeeded("s1"), "{{steps.s1.success}} === true");
        assert_eq!(step_failed("s1"), "{{steps.s1.success}} === false");
    }

    #[test]
    fn test_variable_builders() {
        assert_eq!(
            variable_equals("steps.a.result.status", &json!("done")),
            "{{steps.a.result.status}} === \"done\""
        );
        assert_eq!(
            variable_greater_than("steps.a.result.count", 3.0),
            "{{steps.a.result.count}} > 3"
        );
        assert_eq!(
            variable_contains("steps.a.result.log", "error"),
            "{{steps.a.result.log}} contains \"error\""
        );
    }
}
