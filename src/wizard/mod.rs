//! Four-step filter wizard: area -> bedrooms -> extra conditions -> confirm.
//!
//! Owns the draft filter state, validates step advancement, keeps the live
//! preview count in sync while the two required steps are edited, and on
//! apply commits the draft to the store and the URL. Restoring the same
//! state back out of the URL (reload, back/forward) goes through
//! [`FilterWizard::restore_from_query`].

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::areas::{area_entry, canonicalize_area};
use crate::models::{Area, AreaKind, FilterDraft, RawParams, SavedSearch, PRICE_CEILING};
use crate::query::{is_empty_val, is_same_query, sanitize_query_params, Query};
use crate::router::QueryRouter;
use crate::storage::KvStorage;
use crate::store::SharedStore;

/// Storage key holding the saved-search list.
pub const SAVED_SEARCHES_KEY: &str = "savedSearches";

const FIRST_STEP: u8 = 1;
const LAST_STEP: u8 = 4;

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Clamp a price pair into [0, PRICE_CEILING] with min <= max.
fn normalize_price_range(min: i64, max: i64) -> (i64, i64) {
    let min = min.max(0);
    (min, max.max(min))
}

fn area_display_name(area: &Area) -> String {
    match area.kind {
        AreaKind::Postcode => format!("邮编 {}", area.name),
        AreaKind::Suburb => area.name.clone(),
    }
}

fn bedroom_label(bedrooms: &str) -> String {
    match bedrooms {
        "0" => "Studio".to_string(),
        "4+" => "4房及以上".to_string(),
        other => format!("{other}房"),
    }
}

pub struct FilterWizard {
    store: SharedStore,
    router: Arc<dyn QueryRouter>,
    storage: Arc<dyn KvStorage>,

    current_step: u8,
    draft: FilterDraft,

    pub preview_count: u64,
    pub is_counting: bool,
    pub count_error: Option<String>,
}

impl FilterWizard {
    /// Build a wizard and restore state from the router's current query
    /// (deep-link / reload path).
    pub async fn new(
        store: SharedStore,
        router: Arc<dyn QueryRouter>,
        storage: Arc<dyn KvStorage>,
    ) -> Self {
        let mut wizard = Self {
            store,
            router,
            storage,
            current_step: FIRST_STEP,
            draft: FilterDraft::default(),
            preview_count: 0,
            is_counting: false,
            count_error: None,
        };
        let query = wizard.router.current_query();
        if !query.is_empty() {
            wizard.restore_from_query(&query).await;
        }
        wizard
    }

    pub fn draft(&self) -> &FilterDraft {
        &self.draft
    }

    // ---- steps -----------------------------------------------------------

    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    pub fn step_title(&self) -> &'static str {
        match self.current_step {
            1 => "选择区域",
            2 => "选择房型",
            3 => "设置条件",
            _ => "确认搜索",
        }
    }

    pub fn is_step1_valid(&self) -> bool {
        !self.draft.areas.is_empty()
    }

    pub fn is_step2_valid(&self) -> bool {
        self.draft.bedrooms.is_some()
    }

    pub fn can_proceed_to_next(&self) -> bool {
        match self.current_step {
            1 => self.is_step1_valid(),
            2 => self.is_step2_valid(),
            3 | 4 => true,
            _ => false,
        }
    }

    /// Direct jump, bounds-checked but deliberately not validated: backward
    /// and lateral navigation stays free once the UI exposes it.
    pub fn go_to_step(&mut self, step: u8) {
        if (FIRST_STEP..=LAST_STEP).contains(&step) {
            self.current_step = step;
        }
    }

    pub fn next_step(&mut self) {
        if self.can_proceed_to_next() && self.current_step < LAST_STEP {
            self.current_step += 1;
        }
    }

    pub fn prev_step(&mut self) {
        if self.current_step > FIRST_STEP {
            self.current_step -= 1;
        }
    }

    // ---- draft edits -----------------------------------------------------
    // Area and bedroom edits recount immediately (the two required steps);
    // step 3/4 refinements are counted on demand by their sections instead.

    pub async fn set_areas(&mut self, areas: Vec<Area>) {
        self.draft.areas = areas;
        self.update_preview_count().await;
    }

    /// Canonicalize and add a raw area record; same-identity duplicates are
    /// ignored.
    pub async fn add_area(&mut self, raw: &Value) {
        if let Some(area) = canonicalize_area(raw) {
            if !self.draft.areas.iter().any(|a| a.id == area.id) {
                self.draft.areas.push(area);
                self.update_preview_count().await;
            }
        }
    }

    pub async fn remove_area(&mut self, area_id: &str) {
        let before = self.draft.areas.len();
        self.draft.areas.retain(|a| a.id != area_id);
        if self.draft.areas.len() != before {
            self.update_preview_count().await;
        }
    }

    pub async fn set_bedrooms(&mut self, bedrooms: Option<String>) {
        self.draft.bedrooms = bedrooms;
        self.update_preview_count().await;
    }

    pub fn set_price_range(&mut self, min: i64, max: i64) {
        self.draft.price_range = normalize_price_range(min, max);
    }

    pub fn set_bathrooms(&mut self, bathrooms: Option<String>) {
        self.draft.bathrooms = bathrooms;
    }

    pub fn set_parking(&mut self, parking: Option<String>) {
        self.draft.parking = parking;
    }

    pub fn set_furnished(&mut self, furnished: bool) {
        self.draft.furnished = furnished;
    }

    pub fn set_dates(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.draft.date_from = from;
        self.draft.date_to = to;
    }

    // ---- params ----------------------------------------------------------

    /// Raw (pre-mapping) parameter set for the current draft. The store's
    /// mapper turns this into whichever wire format is active.
    pub fn build_filter_params(&self) -> RawParams {
        let mut params = RawParams::new();

        let mut suburbs: Vec<String> = Vec::new();
        let mut postcodes: Vec<String> = Vec::new();
        for area in &self.draft.areas {
            let name = area.name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            let bucket = match area.kind {
                AreaKind::Postcode => &mut postcodes,
                AreaKind::Suburb => &mut suburbs,
            };
            if !bucket.contains(&name) {
                bucket.push(name);
            }
        }
        if !suburbs.is_empty() {
            params.insert("suburb".into(), Value::String(suburbs.join(",")));
        }
        if !postcodes.is_empty() {
            params.insert("postcodes".into(), Value::String(postcodes.join(",")));
        }

        if let Some(bedrooms) = &self.draft.bedrooms {
            params.insert("bedrooms".into(), Value::String(bedrooms.clone()));
        }

        let (min_price, max_price) = self.draft.price_range;
        if min_price > 0 {
            params.insert("minPrice".into(), json!(min_price));
        }
        if max_price < PRICE_CEILING {
            params.insert("maxPrice".into(), json!(max_price));
        }

        if let Some(bathrooms) = &self.draft.bathrooms {
            params.insert("bathrooms".into(), Value::String(bathrooms.clone()));
        }
        if let Some(parking) = &self.draft.parking {
            params.insert("parking".into(), Value::String(parking.clone()));
        }
        if self.draft.furnished {
            params.insert("isFurnished".into(), Value::Bool(true));
        }

        if let Some(from) = self.draft.date_from {
            params.insert("date_from".into(), Value::String(format_date(from)));
        }
        if let Some(to) = self.draft.date_to {
            params.insert("date_to".into(), Value::String(format_date(to)));
        }

        params
    }

    // ---- preview count ---------------------------------------------------

    /// Recompute the live count. Only meaningful while the two required
    /// steps are being edited; past step 2 the sections count on demand.
    pub async fn update_preview_count(&mut self) {
        if self.current_step > 2 {
            self.is_counting = false;
            return;
        }

        let valid = match self.current_step {
            1 => self.is_step1_valid(),
            _ => self.is_step1_valid() && self.is_step2_valid(),
        };
        if !valid {
            self.preview_count = 0;
            self.count_error = None;
            self.is_counting = false;
            return;
        }

        self.is_counting = true;
        self.count_error = None;

        let params = self.build_filter_params();
        // `&mut self` serializes recounts per wizard, so no stale response
        // can land here; the racy (debounced, shared-store) path is owned by
        // SectionPreview and its sequence guard.
        let result = {
            let store = self.store.read().await;
            store.get_filtered_count(&params).await
        };

        match result {
            Ok(count) => {
                self.preview_count = count;
            }
            Err(err) => {
                error!("preview count failed: {err:#}");
                self.count_error = Some("计数失败".to_string());
                self.preview_count = 0;
            }
        }
        self.is_counting = false;
    }

    // ---- apply / reset ---------------------------------------------------

    /// Commit the draft: push areas into the store, run the committed list
    /// fetch, then sync the URL. Coarse success signal only; details are in
    /// the store's error state and the log.
    pub async fn apply_filters(&mut self) -> bool {
        let params = self.build_filter_params();
        let applied = {
            let mut store = self.store.write().await;
            store.set_selected_locations(self.draft.areas.clone());
            store.apply_filters(&params).await
        };
        if let Err(err) = applied {
            error!("apply filters failed: {err:#}");
            return false;
        }
        self.sync_router_query(&params);
        true
    }

    pub fn reset_filters(&mut self) {
        self.draft = FilterDraft::default();
        self.current_step = FIRST_STEP;
        self.preview_count = 0;
        self.count_error = None;
    }

    // ---- URL sync --------------------------------------------------------

    /// Write the committed params to the router. An existing `sort` key is
    /// preserved unless overridden; identical sanitized queries are never
    /// re-written (no redundant history entries, no replace loops).
    pub fn sync_router_query(&self, params: &RawParams) {
        let current = self.router.current_query();

        let mut merged = RawParams::new();
        if let Some(sort) = current.get("sort") {
            if !sort.is_empty() {
                merged.insert("sort".into(), Value::String(sort.clone()));
            }
        }
        for (k, v) in params {
            merged.insert(k.clone(), v.clone());
        }

        let next = sanitize_query_params(&merged);
        let current_raw: RawParams = current
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let current_sanitized = sanitize_query_params(&current_raw);

        if !is_same_query(&current_sanitized, &next) {
            self.router.replace(next);
        }
    }

    /// External navigation (back/forward) handler: re-derive the draft from
    /// the new query.
    pub async fn on_route_changed(&mut self, query: &Query) {
        self.restore_from_query(query).await;
    }

    /// Rebuild the draft from URL query params, falling back field-by-field
    /// to the store's last applied params; never fails, only warns.
    pub async fn restore_from_query(&mut self, query: &Query) {
        let (applied, selected) = {
            let store = self.store.read().await;
            (store.applied_params().clone(), store.selected_locations.clone())
        };
        let applied_str = |key: &str| -> Option<String> {
            applied
                .get(key)
                .filter(|v| !is_empty_val(v))
                .map(crate::query::stringify)
        };

        let mut next = FilterDraft::default();

        // Areas: URL CSVs first, de-duplicated by canonical id
        let push_area = |area: Option<Area>, areas: &mut Vec<Area>| {
            if let Some(area) = area {
                if !areas.iter().any(|a| a.id == area.id) {
                    areas.push(area);
                }
            }
        };
        if let Some(csv) = query.get("suburb").or_else(|| query.get("suburbs")) {
            for name in csv.split(',') {
                push_area(area_entry(name, AreaKind::Suburb), &mut next.areas);
            }
        }
        if let Some(csv) = query.get("postcodes") {
            for code in csv.split(',') {
                push_area(area_entry(code, AreaKind::Postcode), &mut next.areas);
            }
        }
        if next.areas.is_empty() {
            // Last resort: whatever selection the store still holds
            next.areas = selected;
        }

        next.bedrooms = query
            .get("bedrooms")
            .cloned()
            .or_else(|| applied_str("bedrooms"));

        let min_price = query
            .get("minPrice")
            .or_else(|| query.get("price_min"))
            .cloned()
            .or_else(|| applied_str("minPrice").or_else(|| applied_str("price_min")));
        let max_price = query
            .get("maxPrice")
            .or_else(|| query.get("price_max"))
            .cloned()
            .or_else(|| applied_str("maxPrice").or_else(|| applied_str("price_max")));
        if min_price.is_some() || max_price.is_some() {
            let parse = |s: Option<String>, default: i64| {
                s.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(default)
            };
            next.price_range = normalize_price_range(
                parse(min_price, 0),
                parse(max_price, PRICE_CEILING),
            );
        }

        next.bathrooms = query
            .get("bathrooms")
            .cloned()
            .or_else(|| applied_str("bathrooms"));
        next.parking = query
            .get("parking")
            .cloned()
            .or_else(|| applied_str("parking"));

        let furnished_flag = |s: &str| matches!(s, "1" | "true");
        next.furnished = query.get("isFurnished").map(String::as_str).map_or(false, furnished_flag)
            || query.get("furnished").map(String::as_str).map_or(false, furnished_flag)
            || applied_str("isFurnished").as_deref().map_or(false, furnished_flag)
            || applied_str("furnished").as_deref().map_or(false, furnished_flag);

        next.date_from = query
            .get("date_from")
            .cloned()
            .or_else(|| applied_str("date_from"))
            .as_deref()
            .and_then(parse_date);
        next.date_to = query
            .get("date_to")
            .cloned()
            .or_else(|| applied_str("date_to"))
            .as_deref()
            .and_then(parse_date);

        self.draft = next;
        self.store
            .write()
            .await
            .set_selected_locations(self.draft.areas.clone());
    }

    // ---- saved searches --------------------------------------------------

    fn read_saved_list(&self) -> Vec<SavedSearch> {
        let Some(raw) = self.storage.get(SAVED_SEARCHES_KEY) else {
            return Vec::new();
        };
        match serde_json::from_value(raw) {
            Ok(list) => list,
            Err(err) => {
                warn!("discarding malformed saved searches: {err}");
                Vec::new()
            }
        }
    }

    fn write_saved_list(&self, list: &[SavedSearch]) -> Result<()> {
        let value = serde_json::to_value(list).context("Failed to serialize saved searches")?;
        self.storage.set(SAVED_SEARCHES_KEY, &value)
    }

    /// Snapshot the current draft under a name.
    pub fn save_search(&self, name: &str, email_frequency: &str) -> Result<SavedSearch> {
        let saved = SavedSearch {
            id: Utc::now().timestamp_millis().to_string(),
            name: name.trim().to_string(),
            email_frequency: email_frequency.to_string(),
            conditions: self.draft.clone(),
            filter_params: self.build_filter_params(),
            created_at: Utc::now(),
            last_notified: None,
        };

        let mut list = self.read_saved_list();
        list.push(saved.clone());
        self.write_saved_list(&list)?;
        Ok(saved)
    }

    pub fn saved_searches(&self) -> Vec<SavedSearch> {
        self.read_saved_list()
    }

    pub fn delete_saved_search(&self, search_id: &str) -> bool {
        let mut list = self.read_saved_list();
        let before = list.len();
        list.retain(|s| s.id != search_id);
        if list.len() == before {
            return false;
        }
        self.write_saved_list(&list).is_ok()
    }

    /// Restore a saved snapshot and re-apply it through the normal
    /// apply -> URL-sync path. Returns the sanitized synced query, or None
    /// on failure.
    pub async fn apply_saved_search(&mut self, saved: &SavedSearch) -> Option<Query> {
        let mut conditions = saved.conditions.clone();
        let (min, max) = conditions.price_range;
        conditions.price_range = normalize_price_range(min, max);
        self.draft = conditions;

        let params = if saved.filter_params.is_empty() {
            self.build_filter_params()
        } else {
            saved.filter_params.clone()
        };

        let applied = {
            let mut store = self.store.write().await;
            store.set_selected_locations(self.draft.areas.clone());
            store.apply_filters(&params).await
        };
        if let Err(err) = applied {
            error!("apply saved search failed: {err:#}");
            return None;
        }

        // The URL carries the pre-mapping filter fields, never the paging
        // keys the store injects when it commits (same as apply_filters)
        let query = sanitize_query_params(&params);
        self.sync_router_query(&params);
        Some(query)
    }

    // ---- display helpers -------------------------------------------------

    /// Human-readable summary for a count + selection, e.g.
    /// "在 Ultimo、Glebe 找到 12 套 2房 房源".
    pub fn generate_result_description(count: u64, draft: &FilterDraft) -> String {
        let Some(bedrooms) = draft.bedrooms.as_deref() else {
            return format!("{count} 套房源");
        };
        if draft.areas.is_empty() {
            return format!("{count} 套房源");
        }

        let names: Vec<String> = draft
            .areas
            .iter()
            .map(area_display_name)
            .filter(|n| !n.is_empty())
            .collect();
        let area_text = if names.len() > 3 {
            format!("{} 等 {} 个区域", names[..2].join("、"), names.len())
        } else {
            names.join("、")
        };

        format!("在 {} 找到 {} 套 {} 房源", area_text, count, bedroom_label(bedrooms))
    }

    /// Suggested name for saving the current draft.
    pub fn generate_search_name_suggestion(&self) -> String {
        let mut name = String::new();

        let names: Vec<String> = self
            .draft
            .areas
            .iter()
            .map(area_display_name)
            .filter(|n| !n.is_empty())
            .collect();
        match names.len() {
            0 => {}
            1 => name.push_str(&names[0]),
            n => name.push_str(&format!("{} 等 {} 个区域", names[0], n)),
        }

        if let Some(bedrooms) = self.draft.bedrooms.as_deref() {
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(&bedroom_label(bedrooms));
        }

        let (min, max) = self.draft.price_range;
        if min > 0 || max < PRICE_CEILING {
            let price_text = if min > 0 && max < PRICE_CEILING {
                format!("${min}-{max}")
            } else if min > 0 {
                format!("≥${min}")
            } else {
                format!("≤${max}")
            };
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(&price_text);
        }

        if self.draft.furnished {
            if name.is_empty() {
                name.push_str("有家具房源");
            } else {
                name.push_str(" 有家具");
            }
        }

        if name.is_empty() {
            "我的搜索".to_string()
        } else {
            name
        }
    }
}
