//! Listing store: applied filter params, pagination state, selected areas,
//! per-section preview drafts, and the preview-count aggregation they feed.
//!
//! One store instance backs one search surface. Wrap it in [`SharedStore`]
//! when the debounced preview counter needs concurrent read access.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::PropertiesApi;
use crate::areas::canonicalize_area;
use crate::models::{Area, Listing, RawParams};
use crate::params::{mapper_for, Paging, ParamMapper};
use crate::query::is_empty_val;

/// Soft performance budget for one count round trip; exceeding it only warns.
const COUNT_BUDGET: Duration = Duration::from_millis(800);

/// How long the area directory is served from cache.
const AREA_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Store handle shared with the preview counter. Counts take read access so
/// overlapping preview requests can race (and be resolved by the sequence
/// guard); mutations take write access.
pub type SharedStore = Arc<RwLock<PropertiesStore>>;

pub struct PropertiesStore {
    api: Arc<dyn PropertiesApi>,
    mapper: Box<dyn ParamMapper>,

    // Listing state
    pub properties: Vec<Listing>,
    pub all_properties: Vec<Listing>,
    pub loading: bool,
    pub error: Option<String>,

    // Server-side pagination
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,

    // Search state
    pub selected_locations: Vec<Area>,
    /// Require an area selection before counting anything (launch-market guard)
    pub require_region_first: bool,

    /// Last successfully committed, backend-shaped parameter set
    applied_params: RawParams,
    /// Per-section not-yet-applied parameter patches, in registration order
    preview_sections: Vec<(String, RawParams)>,

    areas_cache: Option<(Instant, Vec<Area>)>,
}

impl PropertiesStore {
    pub fn new(api: Arc<dyn PropertiesApi>, filter_v2: bool) -> Self {
        Self {
            api,
            mapper: mapper_for(filter_v2),
            properties: Vec::new(),
            all_properties: Vec::new(),
            loading: false,
            error: None,
            current_page: 1,
            page_size: 20,
            total_count: 0,
            total_pages: 0,
            has_next: false,
            has_prev: false,
            selected_locations: Vec::new(),
            require_region_first: false,
            applied_params: RawParams::new(),
            preview_sections: Vec::new(),
            areas_cache: None,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    /// The last committed, backend-shaped parameter set.
    pub fn applied_params(&self) -> &RawParams {
        &self.applied_params
    }

    pub fn map_params(&self, raw: &RawParams, paging: Option<&Paging>) -> RawParams {
        self.mapper.map(raw, &self.selected_locations, paging)
    }

    // ---- selection -------------------------------------------------------

    pub fn set_selected_locations(&mut self, areas: Vec<Area>) {
        self.selected_locations = areas;
    }

    pub fn add_selected_location(&mut self, area: Area) {
        if !self.selected_locations.iter().any(|a| a.id == area.id) {
            self.selected_locations.push(area);
        }
    }

    pub fn remove_selected_location(&mut self, area_id: &str) {
        self.selected_locations.retain(|a| a.id != area_id);
    }

    // ---- fetching --------------------------------------------------------

    /// Issue one list request and update listing + pagination state.
    /// The loading flag is cleared on every exit path.
    async fn request_page(&mut self, params: &RawParams) -> Result<()> {
        self.loading = true;
        self.error = None;

        let api = Arc::clone(&self.api);
        let result = api.list(params).await;
        self.loading = false;

        match result {
            Ok(page) => {
                self.properties = page.data;
                if let Some(p) = page.pagination {
                    self.total_count = p.total;
                    self.total_pages = p.pages;
                    self.has_next = p.has_next;
                    self.has_prev = p.has_prev;
                }
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Commit a filter set: fetch page 1 with it and remember the mapped
    /// params so pagination keeps the filters.
    pub async fn apply_filters(&mut self, filters: &RawParams) -> Result<()> {
        let paging = Paging {
            page: Some(1),
            page_size: Some(self.page_size),
            sort: None,
        };
        let mapped = self.map_params(filters, Some(&paging));
        self.request_page(&mapped).await?;
        self.applied_params = mapped;
        self.current_page = 1;
        Ok(())
    }

    /// Fetch a page, merging `extra` over the applied params (extra wins).
    pub async fn fetch_properties(&mut self, extra: &RawParams) -> Result<()> {
        let mut merged = self.applied_params.clone();
        for (k, v) in extra {
            merged.insert(k.clone(), v.clone());
        }

        let page = extra
            .get("page")
            .and_then(Value::as_u64)
            .map(|p| p as u32)
            .unwrap_or(self.current_page);
        let page_size = extra
            .get("page_size")
            .and_then(Value::as_u64)
            .map(|p| p as u32)
            .unwrap_or(self.page_size);
        let paging = Paging {
            page: Some(page),
            page_size: Some(page_size),
            sort: None,
        };

        let mapped = self.mapper.map(&merged, &self.selected_locations, Some(&paging));
        self.request_page(&mapped).await?;
        self.current_page = page;
        Ok(())
    }

    pub async fn set_page(&mut self, page: u32) -> Result<()> {
        if page < 1 || (self.total_pages > 0 && page > self.total_pages) {
            return Ok(());
        }
        let mut extra = RawParams::new();
        extra.insert("page".into(), json!(page));
        self.fetch_properties(&extra).await
    }

    pub async fn next_page(&mut self) -> Result<()> {
        if self.has_next {
            self.set_page(self.current_page + 1).await
        } else {
            Ok(())
        }
    }

    pub async fn prev_page(&mut self) -> Result<()> {
        if self.has_prev {
            self.set_page(self.current_page - 1).await
        } else {
            Ok(())
        }
    }

    pub async fn set_page_size(&mut self, size: u32) -> Result<()> {
        self.page_size = size;
        self.current_page = 1;
        let mut extra = RawParams::new();
        extra.insert("page".into(), json!(1));
        extra.insert("page_size".into(), json!(size));
        self.fetch_properties(&extra).await
    }

    /// Drop all committed filters and reload the unfiltered first page.
    pub async fn reset_filters(&mut self) -> Result<()> {
        self.selected_locations.clear();
        self.applied_params.clear();
        self.preview_sections.clear();
        self.current_page = 1;
        let mapped = self.map_params(
            &RawParams::new(),
            Some(&Paging {
                page: Some(1),
                page_size: Some(self.page_size),
                sort: None,
            }),
        );
        self.request_page(&mapped).await
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ---- counting --------------------------------------------------------

    fn has_region(&self, params: &RawParams) -> bool {
        if !self.selected_locations.is_empty() {
            return true;
        }
        ["suburb", "suburbs", "postcodes"]
            .iter()
            .any(|key| params.get(*key).map_or(false, |v| !is_empty_val(v)))
    }

    /// Result count a parameter set would produce (`page_size=1`, count only).
    /// A missing pagination envelope counts as zero; transport errors
    /// propagate so callers can distinguish "zero results" from "failed".
    pub async fn get_filtered_count(&self, params: &RawParams) -> Result<u64> {
        if self.require_region_first && !self.has_region(params) {
            return Ok(0);
        }

        let paging = Paging {
            page: Some(1),
            page_size: Some(1),
            sort: None,
        };
        let mapped = self.map_params(params, Some(&paging));

        let started = Instant::now();
        let api = Arc::clone(&self.api);
        let page = api.list(&mapped).await?;
        let elapsed = started.elapsed();
        if elapsed > COUNT_BUDGET {
            warn!(elapsed_ms = elapsed.as_millis() as u64, "slow count round trip");
        }

        Ok(page.pagination.map(|p| p.total).unwrap_or(0))
    }

    /// Applied params + every section draft (registration order, later
    /// sections win key conflicts) + `extra` on top.
    pub fn merged_preview_params(&self, extra: &RawParams) -> RawParams {
        let mut merged = self.applied_params.clone();
        for (_, patch) in &self.preview_sections {
            for (k, v) in patch {
                merged.insert(k.clone(), v.clone());
            }
        }
        for (k, v) in extra {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Count for the merged applied + draft state. Errors are logged and
    /// propagated; the UI layer decides how to render a failed count.
    pub async fn get_preview_count(&self, extra: &RawParams) -> Result<u64> {
        let merged = self.merged_preview_params(extra);
        match self.get_filtered_count(&merged).await {
            Ok(n) => Ok(n),
            Err(err) => {
                warn!("preview count failed: {err:#}");
                Err(err)
            }
        }
    }

    /// Merge a patch into one section's draft. Empty-valued keys in the
    /// patch unset that key rather than storing a placeholder.
    pub fn update_preview_draft(&mut self, section: &str, patch: RawParams) {
        let idx = match self.preview_sections.iter().position(|(s, _)| s == section) {
            Some(i) => i,
            None => {
                self.preview_sections
                    .push((section.to_string(), RawParams::new()));
                self.preview_sections.len() - 1
            }
        };
        let entry = &mut self.preview_sections[idx].1;
        for (k, v) in patch {
            if is_empty_val(&v) {
                entry.remove(&k);
            } else {
                entry.insert(k, v);
            }
        }
    }

    /// Drop a section's draft entirely (section closed or applied).
    pub fn clear_preview_draft(&mut self, section: &str) {
        self.preview_sections.retain(|(s, _)| s != section);
    }

    /// Registered sections and their patches, in registration order.
    pub fn preview_sections(&self) -> &[(String, RawParams)] {
        &self.preview_sections
    }

    // ---- area directory --------------------------------------------------

    /// Derive a ranked area list from already-loaded listings; backs the
    /// directory fallback and search suggestions.
    pub fn location_suggestions(&self) -> Vec<Area> {
        let source = if self.all_properties.is_empty() {
            &self.properties
        } else {
            &self.all_properties
        };

        let mut ranked: Vec<(Area, u64)> = Vec::new();
        let bump = |raw: Value, ranked: &mut Vec<(Area, u64)>| {
            if let Some(area) = canonicalize_area(&raw) {
                match ranked.iter_mut().find(|(a, _)| a.id == area.id) {
                    Some((_, count)) => *count += 1,
                    None => ranked.push((area, 1)),
                }
            }
        };

        for listing in source {
            let suburb = listing.suburb.trim();
            if !suburb.is_empty() {
                bump(
                    json!({"suburb": suburb, "postcode": listing.postcode}),
                    &mut ranked,
                );
            }
            if let Some(code) = listing.postcode {
                bump(
                    json!({"type": "postcode", "postcode": code, "suburb": suburb}),
                    &mut ranked,
                );
            }
        }

        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .map(|(mut area, count)| {
                area.extra.insert("count".into(), json!(count));
                area
            })
            .collect()
    }

    /// Area directory with a 15-minute cache; falls back to deriving areas
    /// from loaded listings when the directory endpoint fails.
    pub async fn area_directory(&mut self) -> Vec<Area> {
        if let Some((at, cached)) = &self.areas_cache {
            if at.elapsed() < AREA_CACHE_TTL {
                return cached.clone();
            }
        }

        let api = Arc::clone(&self.api);
        let areas = match api.areas().await {
            Ok(records) => {
                let canonical: Vec<Area> = records
                    .iter()
                    .filter_map(canonicalize_area)
                    .collect();
                debug!("area directory loaded ({} entries)", canonical.len());
                canonical
            }
            Err(err) => {
                warn!("area directory unavailable, deriving from listings: {err:#}");
                self.location_suggestions()
            }
        };

        self.areas_cache = Some((Instant::now(), areas.clone()));
        areas
    }
}
