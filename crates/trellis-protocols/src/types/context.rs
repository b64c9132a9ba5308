//! Execution context: accumulated step results addressed by dotted paths.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The accumulated mapping of prior steps' results.
///
/// Step results merge in under `steps.<stepId>`; condition expressions and
/// later step instructions read them back through dotted paths like
/// `steps.fetch.result.count`. Entries are written once by the step that
/// produced them and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    root: Map<String, Value>,
}

impl RunContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the context with trigger output under `trigger`.
    pub fn with_trigger_output(mut self, output: Value) -> Self {
        self.root.insert("trigger".to_string(), output);
        self
    }

    /// Merge a completed step's entry under `steps.<stepId>`.
    pub fn record_step(&mut self, step_id: &str, entry: Value) {
        let steps = self
            .root
            .entry("steps".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = steps {
            map.insert(step_id.to_string(), entry);
        }
    }

    /// Resolve a dotted path through the context.
    ///
    /// Missing or non-object intermediate keys resolve to `None`, which the
    /// evaluator renders as the literal `null`.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut current: Option<&Value> = None;
        for (i, key) in path.split('.').enumerate() {
            current = match (i, current) {
                (0, _) => self.root.get(key),
                (_, Some(Value::Object(map))) => map.get(key),
                _ => return None,
            };
        }
        current
    }

    /// The whole context as a JSON value (for invoker payloads).
    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_resolve() {
        let mut ctx = RunContext::new();
        ctx.record_step("fetch", json!({"success": true, "result": {"count": 5}}));

        assert_eq!(
            ctx.resolve("steps.fetch.success"),
            Some(&Value::Bool(true))
        );
        assert_eq!(ctx.resolve("steps.fetch.result.count"), Some(&json!(5)));
    }

    #[test]
    fn test_resolve_missing_path_is_none() {
        let mut ctx = RunContext::new();
        ctx.record_step("fetch", json!({"success": true}));

        assert!(ctx.resolve("steps.other.success").is_none());
        assert!(ctx.resolve("steps.fetch.success.deeper").is_none());
        assert!(ctx.resolve("nothing").is_none());
    }

    #[test]
    fn test_trigger_output_seed() {
        let ctx = RunContext::new().with_trigger_output(json!({"issue": 42}));
        assert_eq!(ctx.resolve("trigger.issue"), Some(&json!(42)));
    }
}
