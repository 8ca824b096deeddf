//! Parameter interpolation for `${context.*}` and `${steps.*}` templates.
//!
//! Resolution is fail-soft: a reference that does not resolve leaves its
//! template text untouched, so one bad path never aborts interpolation of
//! sibling fields.
//!
//! - A string that is exactly one template becomes the referenced value with
//!   its JSON type preserved (`"${context.x}"` with `x = 5` yields `5`).
//! - Templates embedded in longer text are replaced by the value's string
//!   rendering (objects and arrays as compact JSON).
//! - Path segments walk object keys; numeric segments index into arrays.

use std::collections::BTreeMap;

use serde_json::Value;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Resolve every template in `value` against the execution context and the
/// results recorded so far.
pub fn resolve(value: &Value, context: &Value, step_results: &BTreeMap<String, Value>) -> Value {
    match value {
        Value::String(s) => resolve_str(s, context, step_results),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve(v, context, step_results))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, context, step_results)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Whether a value still contains template syntax anywhere.
pub fn has_templates(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains(OPEN),
        Value::Array(items) => items.iter().any(has_templates),
        Value::Object(map) => map.values().any(has_templates),
        _ => false,
    }
}

fn resolve_str(s: &str, context: &Value, step_results: &BTreeMap<String, Value>) -> Value {
    if let Some(expr) = whole_template(s) {
        return match lookup(expr, context, step_results) {
            Some(found) => found.clone(),
            None => Value::String(s.to_string()),
        };
    }

    if !s.contains(OPEN) {
        return Value::String(s.to_string());
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        match after.find(CLOSE) {
            Some(end) => {
                let expr = &after[..end];
                match lookup(expr, context, step_results) {
                    Some(found) => out.push_str(&value_to_string(found)),
                    None => {
                        out.push_str(OPEN);
                        out.push_str(expr);
                        out.push(CLOSE);
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated template, keep the remainder verbatim
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

/// The inner expression if `s` is exactly `${expr}` and nothing else.
fn whole_template(s: &str) -> Option<&str> {
    let inner = s.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(CLOSE) || inner.contains(OPEN) {
        return None;
    }
    Some(inner)
}

fn lookup<'a>(
    expr: &str,
    context: &'a Value,
    step_results: &'a BTreeMap<String, Value>,
) -> Option<&'a Value> {
    let mut segments = expr.trim().split('.');
    match segments.next()? {
        "context" => walk(context, segments),
        "steps" => {
            let step_id = segments.next()?;
            walk(step_results.get(step_id)?, segments)
        }
        _ => None,
    }
}

fn walk<'a, 'p>(root: &'a Value, path: impl Iterator<Item = &'p str>) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn results(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_context_reference_keeps_type() {
        let out = resolve(&json!("${context.x}"), &json!({ "x": 5 }), &BTreeMap::new());
        assert_eq!(out, json!(5));
    }

    #[test]
    fn test_step_reference_walks_path() {
        let out = resolve(
            &json!("${steps.a.y}"),
            &json!({}),
            &results(&[("a", json!({ "y": "z" }))]),
        );
        assert_eq!(out, json!("z"));
    }

    #[test]
    fn test_unresolvable_reference_left_unchanged() {
        let out = resolve(&json!("${context.missing}"), &json!({}), &BTreeMap::new());
        assert_eq!(out, json!("${context.missing}"));

        let out = resolve(&json!("${steps.nope.x}"), &json!({}), &BTreeMap::new());
        assert_eq!(out, json!("${steps.nope.x}"));
    }

    #[test]
    fn test_embedded_templates_are_stringified() {
        let ctx = json!({ "user": { "name": "ada", "tags": ["a", "b"] }, "n": 3 });
        let out = resolve(
            &json!("hi ${context.user.name}, n=${context.n}, tags=${context.user.tags}"),
            &ctx,
            &BTreeMap::new(),
        );
        assert_eq!(out, json!(r#"hi ada, n=3, tags=["a","b"]"#));
    }

    #[test]
    fn test_bad_reference_does_not_affect_siblings() {
        let out = resolve(
            &json!({
                "ok": "${context.a}",
                "bad": "${context.b.c}",
                "mixed": "x-${context.a}-${context.zzz}"
            }),
            &json!({ "a": "A" }),
            &BTreeMap::new(),
        );
        assert_eq!(
            out,
            json!({ "ok": "A", "bad": "${context.b.c}", "mixed": "x-A-${context.zzz}" })
        );
    }

    #[test]
    fn test_recurses_through_arrays_and_indexes() {
        let step_results = results(&[("list", json!({ "items": [10, 20, 30] }))]);
        let out = resolve(
            &json!([{ "second": "${steps.list.items.1}" }, 7, true, null]),
            &json!({}),
            &step_results,
        );
        assert_eq!(out, json!([{ "second": 20 }, 7, true, null]));
    }

    #[test]
    fn test_unknown_root_and_unterminated_template() {
        let out = resolve(&json!("${env.HOME}"), &json!({}), &BTreeMap::new());
        assert_eq!(out, json!("${env.HOME}"));

        let out = resolve(&json!("a ${context.x"), &json!({ "x": 1 }), &BTreeMap::new());
        assert_eq!(out, json!("a ${context.x"));
    }

    #[test]
    fn test_resolution_is_idempotent_once_resolved() {
        let ctx = json!({ "x": { "k": [1, 2] } });
        let once = resolve(&json!({ "v": "${context.x}", "s": "k=${context.x.k}" }), &ctx, &BTreeMap::new());
        assert!(!has_templates(&once));
        let twice = resolve(&once, &ctx, &BTreeMap::new());
        assert_eq!(once, twice);
    }
}
