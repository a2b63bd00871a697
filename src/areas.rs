//! Area canonicalization.
//!
//! The same suburb can arrive from three pipelines (backend directory, URL
//! deep-link, fallback derivation from loaded listings) with different field
//! names and value types. Chip/tag UIs desync from the list filter after a
//! reload unless every record is first normalized to one identity:
//! `suburb_<name>` / `postcode_<code>`.

use serde_json::{Map, Value};

use crate::models::{Area, AreaKind};

/// Keys canonicalization owns; everything else is carried through untouched.
const OWNED_KEYS: [&str; 5] = ["id", "type", "name", "postcode", "fullName"];

fn non_blank_str(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Postcodes arrive as strings or as (sometimes fractional) numbers;
/// numeric values are truncated before stringification.
fn extract_postcode(raw: &Map<String, Value>) -> Option<String> {
    for key in ["postcode", "code", "postcode_str"] {
        match raw.get(key) {
            Some(Value::Number(n)) => {
                let truncated = n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.trunc() as i64))?;
                return Some(truncated.to_string());
            }
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some(s.trim().to_string());
            }
            _ => {}
        }
    }
    None
}

fn is_four_digits(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_digit())
}

/// Normalize a raw area record into a canonical [`Area`].
///
/// Returns `None` for anything that is not a JSON object. Explicit
/// `type: "postcode"` wins; otherwise a record with a 4-digit postcode and no
/// stronger suburb clue (blank name, or the name is itself 4 digits) is
/// classified as a postcode.
pub fn canonicalize_area(raw: &Value) -> Option<Area> {
    let obj = raw.as_object()?;

    let name = non_blank_str(obj, "name")
        .or_else(|| non_blank_str(obj, "suburb"))
        .or_else(|| non_blank_str(obj, "label"))
        .unwrap_or_default();

    let postcode = extract_postcode(obj).unwrap_or_default();

    let declared_postcode = matches!(
        obj.get("type"),
        Some(Value::String(t)) if t.eq_ignore_ascii_case("postcode")
    );
    let inferred_postcode =
        is_four_digits(&postcode) && (name.is_empty() || is_four_digits(&name));
    let kind = if declared_postcode || inferred_postcode {
        AreaKind::Postcode
    } else {
        AreaKind::Suburb
    };

    let canonical_name = match kind {
        AreaKind::Postcode if !postcode.is_empty() => postcode.clone(),
        _ => name.clone(),
    };

    let id = match kind {
        AreaKind::Postcode => format!("postcode_{postcode}"),
        AreaKind::Suburb => format!("suburb_{canonical_name}"),
    };

    let full_name = match kind {
        AreaKind::Postcode => postcode.clone(),
        AreaKind::Suburb if !postcode.is_empty() => {
            format!("{canonical_name} NSW {postcode}")
        }
        AreaKind::Suburb => canonical_name.clone(),
    };

    let extra: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| !OWNED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Some(Area {
        id,
        kind,
        name: canonical_name,
        postcode,
        full_name,
        extra,
    })
}

/// Build a minimal area from a bare name or code (URL restore path).
pub fn area_entry(value: &str, kind: AreaKind) -> Option<Area> {
    let name = value.trim();
    if name.is_empty() {
        return None;
    }
    let area = match kind {
        AreaKind::Postcode => Area {
            id: format!("postcode_{name}"),
            kind,
            name: name.to_string(),
            postcode: name.to_string(),
            full_name: name.to_string(),
            extra: Map::new(),
        },
        AreaKind::Suburb => Area {
            id: format!("suburb_{name}"),
            kind,
            name: name.to_string(),
            postcode: String::new(),
            full_name: name.to_string(),
            extra: Map::new(),
        },
    };
    Some(area)
}

fn has_canonical_id(s: &str) -> bool {
    s.starts_with("suburb_") || s.starts_with("postcode_")
}

/// Canonical id of any raw record. If the record already carries a canonical
/// id it is returned verbatim (no re-derivation); empty string for non-objects.
pub fn canonical_id_of(raw: &Value) -> String {
    if let Some(Value::String(id)) = raw.as_object().and_then(|o| o.get("id")) {
        if has_canonical_id(id) {
            return id.clone();
        }
    }
    canonicalize_area(raw).map(|a| a.id).unwrap_or_default()
}

/// Same geographic entity, regardless of source field naming.
pub fn is_same_area(a: &Value, b: &Value) -> bool {
    let id_a = canonical_id_of(a);
    !id_a.is_empty() && id_a == canonical_id_of(b)
}
