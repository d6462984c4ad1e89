//! Schema Resolver: dereferences `$ref` pointers inside a JSON document.
//!
//! Pure function; resolution happens against the document's own root. Cycle
//! detection uses an explicit ref stack of pointer strings, not object
//! identity, because cycles occur through named pointers.

use serde_json::{json, Map, Value};

/// Recursively resolve every local (`#/`) `$ref` in `node` against `root`.
///
/// - A ref already on the stack (cycle) becomes a stand-in object
///   `{"type": "object", "description": "[Circular: <lastSegment>]"}`.
/// - A pointer that fails to resolve leaves the node untouched.
/// - Sibling fields next to a resolved `$ref` are merged over the resolved
///   content (siblings win on conflict).
pub fn resolve_refs(node: &Value, root: &Value) -> Value {
    resolve_with_stack(node, root, &mut Vec::new())
}

fn resolve_with_stack(node: &Value, root: &Value, stack: &mut Vec<String>) -> Value {
    match node {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_with_stack(item, root, stack))
                .collect(),
        ),
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if stack.iter().any(|seen| seen == reference) {
                    return circular_placeholder(reference);
                }
                if reference.starts_with("#/") {
                    if let Some(target) = lookup_pointer(root, reference) {
                        stack.push(reference.clone());
                        let resolved = resolve_with_stack(target, root, stack);
                        stack.pop();
                        return merge_siblings(resolved, map);
                    }
                }
                // External or dangling ref: leave the node as-is (fields
                // still resolved individually below, the ref string stays).
            }
            Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), resolve_with_stack(value, root, stack)))
                    .collect(),
            )
        }
        _ => node.clone(),
    }
}

/// Walk a `#/a/b/c` pointer segment by segment. Returns `None` as soon as a
/// segment fails to index into the current value.
fn lookup_pointer<'v>(root: &'v Value, reference: &str) -> Option<&'v Value> {
    let mut current = root;
    for segment in reference.trim_start_matches("#/").split('/') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn merge_siblings(resolved: Value, original: &Map<String, Value>) -> Value {
    let Value::Object(mut merged) = resolved else {
        // Primitive target: nothing to merge siblings into.
        return resolved;
    };
    for (key, value) in original {
        if key != "$ref" {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

fn circular_placeholder(reference: &str) -> Value {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    json!({"type": "object", "description": format!("[Circular: {last}]")})
}
