//! Filter parameter mapping.
//!
//! The backend's query contract evolved from a flat, loosely-typed parameter
//! set (v1) to a whitelisted schema (v2). Each wire format is a separate
//! [`ParamMapper`] implementation selected at construction time, so call
//! sites never branch on the migration and each format's invariants are
//! testable on their own.

use chrono::{DateTime, NaiveDate};
use serde_json::{json, Value};

use crate::models::{Area, AreaKind, RawParams, PRICE_CEILING};
use crate::query::is_empty_val;

/// Paging/sort overrides merged into the mapped parameter set.
#[derive(Debug, Clone, Default)]
pub struct Paging {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort: Option<String>,
}

/// Converts the wizard's raw filter fields plus the selected areas into the
/// outbound query-parameter set for one wire format.
pub trait ParamMapper: Send + Sync {
    fn map(&self, raw: &RawParams, selected: &[Area], paging: Option<&Paging>) -> RawParams;
}

/// Pick the mapper for the active wire format.
pub fn mapper_for(filter_v2: bool) -> Box<dyn ParamMapper> {
    if filter_v2 {
        Box::new(WhitelistParamMapper)
    } else {
        Box::new(LegacyParamMapper)
    }
}

/// Truthy-ish values the legacy backend accepted for `isFurnished`.
fn is_truthy_furnished(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(s.as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

/// Reformat a date-ish value to `YYYY-MM-DD`. Accepts already-formatted
/// dates and full RFC 3339 timestamps (the "Date object" serialization).
fn format_date_value(v: &Value) -> Option<String> {
    let s = v.as_str()?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    None
}

/// First token of a CSV/array value as an integer; a trailing `+` on the
/// token ("4+") is accepted. The literal `any` yields `None`.
fn first_token_int(v: &Value) -> Option<i64> {
    let token = match v {
        Value::Number(n) => return n.as_i64(),
        Value::String(s) => s.split(',').next().map(str::trim)?.to_string(),
        Value::Array(items) => match items.first()? {
            Value::Number(n) => return n.as_i64(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        },
        _ => return None,
    };
    if token.is_empty() || token.eq_ignore_ascii_case("any") {
        return None;
    }
    token.strip_suffix('+').unwrap_or(&token).trim().parse().ok()
}

/// Unique names of the selected areas of one kind, insertion order preserved.
fn area_csv(selected: &[Area], kind: AreaKind) -> Option<String> {
    let mut seen = Vec::new();
    for area in selected.iter().filter(|a| a.kind == kind) {
        let name = area.name.trim();
        if !name.is_empty() && !seen.iter().any(|s: &String| s == name) {
            seen.push(name.to_string());
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(","))
    }
}

fn strip_empty(params: &mut RawParams) {
    params.retain(|_, v| !is_empty_val(v));
}

/// Legacy (v1) flat parameter set: raw fields pass through with minimal
/// normalization.
pub struct LegacyParamMapper;

impl ParamMapper for LegacyParamMapper {
    fn map(&self, raw: &RawParams, selected: &[Area], paging: Option<&Paging>) -> RawParams {
        let mut params = raw.clone();

        // isFurnished: normalize the accepted truthy spellings, drop the rest
        match params.get("isFurnished") {
            Some(v) if is_truthy_furnished(v) => {
                params.insert("isFurnished".into(), Value::Bool(true));
            }
            Some(_) => {
                params.remove("isFurnished");
            }
            None => {}
        }

        // Fill suburb CSV from the selection only if the caller didn't set it
        let suburb_missing = params.get("suburb").map_or(true, is_empty_val);
        if suburb_missing {
            if let Some(csv) = area_csv(selected, AreaKind::Suburb) {
                params.insert("suburb".into(), Value::String(csv));
            }
        }

        for key in ["date_from", "date_to"] {
            if let Some(v) = params.get(key) {
                if let Some(formatted) = format_date_value(v) {
                    params.insert(key.into(), Value::String(formatted));
                }
            }
        }

        if let Some(paging) = paging {
            if let Some(page) = paging.page {
                params.insert("page".into(), json!(page));
            }
            if let Some(size) = paging.page_size {
                params.insert("page_size".into(), json!(size));
            }
            if let Some(sort) = &paging.sort {
                params.insert("sort".into(), Value::String(sort.clone()));
            }
        }

        strip_empty(&mut params);
        params
    }
}

/// V2 whitelisted schema: builds a fresh object, copies only known keys, and
/// enforces the numeric/range invariants the UI does not guarantee.
pub struct WhitelistParamMapper;

/// Keys copied verbatim from the raw fields when present and non-empty.
const V2_PASSTHROUGH: [&str; 12] = [
    "suburbs",
    "postcodes",
    "date_from",
    "date_to",
    "price_min",
    "price_max",
    "bedrooms",
    "furnished",
    "bathrooms_min",
    "parking_min",
    "sort",
    "include_nearby",
];

impl WhitelistParamMapper {
    fn price_bounds(raw: &RawParams) -> Option<(i64, i64)> {
        if let Some(Value::Array(range)) = raw.get("priceRange") {
            if range.len() == 2 {
                let min = range[0].as_f64().unwrap_or(0.0) as i64;
                let max = range[1].as_f64().unwrap_or(PRICE_CEILING as f64) as i64;
                return Some((min, max));
            }
        }
        let min = raw.get("minPrice").and_then(Value::as_f64).map(|f| f as i64);
        let max = raw.get("maxPrice").and_then(Value::as_f64).map(|f| f as i64);
        if min.is_some() || max.is_some() {
            return Some((min.unwrap_or(0), max.unwrap_or(PRICE_CEILING)));
        }
        None
    }
}

impl ParamMapper for WhitelistParamMapper {
    fn map(&self, raw: &RawParams, selected: &[Area], paging: Option<&Paging>) -> RawParams {
        let mut params = RawParams::new();

        for key in V2_PASSTHROUGH {
            if let Some(v) = raw.get(key) {
                if !is_empty_val(v) {
                    params.insert(key.into(), v.clone());
                }
            }
        }

        // Areas: the live selection wins over whatever was passed through;
        // the legacy `suburb` CSV is the last resort.
        if let Some(csv) = area_csv(selected, AreaKind::Suburb) {
            params.insert("suburbs".into(), Value::String(csv));
        } else if !params.contains_key("suburbs") {
            if let Some(v) = raw.get("suburb") {
                if !is_empty_val(v) {
                    params.insert("suburbs".into(), Value::String(crate::query::stringify(v)));
                }
            }
        }
        if let Some(csv) = area_csv(selected, AreaKind::Postcode) {
            params.insert("postcodes".into(), Value::String(csv));
        }

        // Dates: Date-typed fields win over pre-formatted strings
        for (date_key, out_key) in [("startDate", "date_from"), ("endDate", "date_to")] {
            if let Some(formatted) = raw.get(date_key).and_then(format_date_value) {
                params.insert(out_key.into(), Value::String(formatted));
            } else if let Some(formatted) = raw.get(out_key).and_then(format_date_value) {
                params.insert(out_key.into(), Value::String(formatted));
            }
        }

        if let Some((min, max)) = Self::price_bounds(raw) {
            let (min, max) = if min > max { (max, min) } else { (min, max) };
            params.remove("price_min");
            params.remove("price_max");
            if min > 0 {
                params.insert("price_min".into(), json!(min));
            }
            if max < PRICE_CEILING {
                params.insert("price_max".into(), json!(max));
            }
        }

        if let Some(n) = raw.get("bedrooms").and_then(first_token_int) {
            params.insert("bedrooms".into(), json!(n));
        }

        if raw.get("furnished").map_or(false, is_truthy_furnished)
            || raw.get("isFurnished").map_or(false, is_truthy_furnished)
        {
            params.insert("furnished".into(), Value::Bool(true));
        }

        if let Some(n) = raw.get("bathrooms").and_then(first_token_int) {
            params.insert("bathrooms_min".into(), json!(n));
        }
        if let Some(n) = raw.get("parking").and_then(first_token_int) {
            params.insert("parking_min".into(), json!(n));
        }

        // Paging is always forced in v2
        let page = paging.and_then(|p| p.page).unwrap_or(1).max(1);
        let page_size = paging
            .and_then(|p| p.page_size)
            .unwrap_or(20)
            .clamp(1, 50);
        params.insert("page".into(), json!(page));
        params.insert("page_size".into(), json!(page_size));
        if let Some(sort) = paging.and_then(|p| p.sort.clone()) {
            params.insert("sort".into(), Value::String(sort));
        }

        strip_empty(&mut params);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::area_entry;
    use serde_json::json;

    fn raw(value: Value) -> RawParams {
        value.as_object().cloned().unwrap_or_default()
    }

    fn suburb(name: &str) -> Area {
        area_entry(name, AreaKind::Suburb).unwrap()
    }

    fn postcode(code: &str) -> Area {
        area_entry(code, AreaKind::Postcode).unwrap()
    }

    #[test]
    fn legacy_normalizes_furnished_spellings() {
        for truthy in [json!(true), json!("1"), json!(1), json!("true"), json!("yes")] {
            let params = LegacyParamMapper.map(&raw(json!({"isFurnished": truthy})), &[], None);
            assert_eq!(params.get("isFurnished"), Some(&json!(true)));
        }
        let params = LegacyParamMapper.map(&raw(json!({"isFurnished": "no"})), &[], None);
        assert!(!params.contains_key("isFurnished"));
    }

    #[test]
    fn legacy_fills_suburb_from_selection_only_when_absent() {
        let selected = [suburb("Ultimo"), suburb("Glebe"), suburb("Ultimo")];
        let params = LegacyParamMapper.map(&RawParams::new(), &selected, None);
        assert_eq!(params.get("suburb"), Some(&json!("Ultimo,Glebe")));

        let params =
            LegacyParamMapper.map(&raw(json!({"suburb": "Newtown"})), &selected, None);
        assert_eq!(params.get("suburb"), Some(&json!("Newtown")));
    }

    #[test]
    fn legacy_formats_dates_and_injects_paging() {
        let input = raw(json!({"date_from": "2025-03-01T10:30:00+11:00", "date_to": "2025-03-15"}));
        let paging = Paging {
            page: Some(2),
            page_size: Some(10),
            sort: Some("price_asc".into()),
        };
        let params = LegacyParamMapper.map(&input, &[], Some(&paging));
        assert_eq!(params.get("date_from"), Some(&json!("2025-03-01")));
        assert_eq!(params.get("date_to"), Some(&json!("2025-03-15")));
        assert_eq!(params.get("page"), Some(&json!(2)));
        assert_eq!(params.get("page_size"), Some(&json!(10)));
        assert_eq!(params.get("sort"), Some(&json!("price_asc")));
    }

    #[test]
    fn legacy_strips_empty_values() {
        let params = LegacyParamMapper.map(&raw(json!({"a": "", "b": null, "c": "x"})), &[], None);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("c"), Some(&json!("x")));
    }

    #[test]
    fn v2_swaps_inverted_price_bounds() {
        let params =
            WhitelistParamMapper.map(&raw(json!({"priceRange": [3000, 100]})), &[], None);
        assert_eq!(params.get("price_min"), Some(&json!(100)));
        assert_eq!(params.get("price_max"), Some(&json!(3000)));
    }

    #[test]
    fn v2_omits_unbounded_prices() {
        let params =
            WhitelistParamMapper.map(&raw(json!({"priceRange": [0, 5000]})), &[], None);
        assert!(!params.contains_key("price_min"));
        assert!(!params.contains_key("price_max"));

        let params = WhitelistParamMapper
            .map(&raw(json!({"minPrice": 250, "maxPrice": 6000})), &[], None);
        assert_eq!(params.get("price_min"), Some(&json!(250)));
        assert!(!params.contains_key("price_max"));
    }

    #[test]
    fn v2_clamps_page_size() {
        let big = Paging {
            page_size: Some(500),
            ..Default::default()
        };
        let params = WhitelistParamMapper.map(&RawParams::new(), &[], Some(&big));
        assert_eq!(params.get("page_size"), Some(&json!(50)));
        assert_eq!(params.get("page"), Some(&json!(1)));

        let zero = Paging {
            page_size: Some(0),
            ..Default::default()
        };
        let params = WhitelistParamMapper.map(&RawParams::new(), &[], Some(&zero));
        assert_eq!(params.get("page_size"), Some(&json!(1)));

        let params = WhitelistParamMapper.map(&RawParams::new(), &[], None);
        assert_eq!(params.get("page_size"), Some(&json!(20)));
    }

    #[test]
    fn v2_parses_bedrooms_and_min_counts() {
        let input = raw(json!({"bedrooms": "4+", "bathrooms": "2,3", "parking": "any"}));
        let params = WhitelistParamMapper.map(&input, &[], None);
        assert_eq!(params.get("bedrooms"), Some(&json!(4)));
        assert_eq!(params.get("bathrooms_min"), Some(&json!(2)));
        assert!(!params.contains_key("parking_min"));
    }

    #[test]
    fn v2_derives_area_csvs_from_selection() {
        let selected = [suburb("Ultimo"), postcode("2000"), suburb("Glebe")];
        let params = WhitelistParamMapper.map(&RawParams::new(), &selected, None);
        assert_eq!(params.get("suburbs"), Some(&json!("Ultimo,Glebe")));
        assert_eq!(params.get("postcodes"), Some(&json!("2000")));
    }

    #[test]
    fn v2_falls_back_to_legacy_suburb_field() {
        let params = WhitelistParamMapper.map(&raw(json!({"suburb": "Newtown"})), &[], None);
        assert_eq!(params.get("suburbs"), Some(&json!("Newtown")));
    }

    #[test]
    fn v2_drops_unknown_keys() {
        let input = raw(json!({"listing_id": 7, "debug": true, "bedrooms": "2"}));
        let params = WhitelistParamMapper.map(&input, &[], None);
        assert!(!params.contains_key("listing_id"));
        assert!(!params.contains_key("debug"));
        assert_eq!(params.get("bedrooms"), Some(&json!(2)));
    }
}
