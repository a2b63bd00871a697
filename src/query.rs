//! Canonical query-string representation.
//!
//! Router replaces must be idempotent: re-selecting the same filter value
//! must not push a new history entry or re-trigger downstream fetches. That
//! needs a canonical (non-empty, stably-ordered, stringified) form that can
//! be compared for equality.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::RawParams;

/// Sanitized query: string keys/values, lexicographic key order.
pub type Query = BTreeMap<String, String>;

/// True for null, blank string, empty array, or object with no keys.
pub fn is_empty_val(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Stringify a JSON value the way a query string would carry it.
/// Arrays join their elements with commas (CSV fields like `suburb`).
pub fn stringify(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => v.to_string(),
    }
}

/// Drop empty-valued keys, stringify the rest, order keys lexicographically.
pub fn sanitize_query_params(input: &RawParams) -> Query {
    input
        .iter()
        .filter(|(_, v)| !is_empty_val(v))
        .map(|(k, v)| (k.clone(), stringify(v)))
        .collect()
}

/// True iff both queries have identical key sets and string-equal values.
/// Order-independent by construction (`Query` keeps keys sorted).
pub fn is_same_query(a: &Query, b: &Query) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawParams {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn sanitize_drops_empty_keys() {
        let input = raw(json!({"a": "", "b": null, "c": "x", "d": []}));
        let q = sanitize_query_params(&input);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get("c").map(String::as_str), Some("x"));
    }

    #[test]
    fn sanitize_drops_blank_and_empty_objects() {
        let input = raw(json!({"a": "   ", "b": {}, "c": 0}));
        let q = sanitize_query_params(&input);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get("c").map(String::as_str), Some("0"));
    }

    #[test]
    fn sanitize_stringifies_and_sorts() {
        let input = raw(json!({"z": 20, "bedrooms": 2, "furnished": true, "suburb": ["Ultimo", "Glebe"]}));
        let q = sanitize_query_params(&input);
        let keys: Vec<_> = q.keys().cloned().collect();
        assert_eq!(keys, vec!["bedrooms", "furnished", "suburb", "z"]);
        assert_eq!(q["bedrooms"], "2");
        assert_eq!(q["furnished"], "true");
        assert_eq!(q["suburb"], "Ultimo,Glebe");
    }

    #[test]
    fn same_query_is_order_independent() {
        let a = sanitize_query_params(&raw(json!({"b": 2, "a": "1"})));
        let b = sanitize_query_params(&raw(json!({"a": 1, "b": "2"})));
        assert!(is_same_query(&a, &b));

        let c = sanitize_query_params(&raw(json!({"a": 1, "b": 3})));
        assert!(!is_same_query(&a, &c));
    }
}
