use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loosely-typed parameter map exchanged with the listings backend.
/// Values keep their JSON shape until the sanitizer stringifies them.
pub type RawParams = Map<String, Value>;

/// Upper bound of the weekly-rent slider; prices at or above it are "no max".
pub const PRICE_CEILING: i64 = 5000;

/// Kind of geographic filter unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaKind {
    Suburb,
    Postcode,
}

/// Canonical geographic filter unit.
///
/// `id` is always re-derivable from `(kind, name, postcode)`; two areas with
/// the same id are the same entity no matter which pipeline produced them
/// (directory API, URL deep-link, fallback derivation from loaded listings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AreaKind,
    pub name: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    /// Source-record fields canonicalization does not own (carried through).
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl PartialEq for Area {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// The wizard's working (uncommitted) filter state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDraft {
    pub areas: Vec<Area>,
    /// "0".."4+"; None until the user picks one
    pub bedrooms: Option<String>,
    /// Weekly rent bounds, clamped to [0, PRICE_CEILING], min <= max
    pub price_range: (i64, i64),
    pub bathrooms: Option<String>,
    pub parking: Option<String>,
    pub furnished: bool,
    // Date ordering (from <= to) is a presentation concern, not checked here
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Default for FilterDraft {
    fn default() -> Self {
        Self {
            areas: Vec::new(),
            bedrooms: None,
            price_range: (0, PRICE_CEILING),
            bathrooms: None,
            parking: None,
            furnished: false,
            date_from: None,
            date_to: None,
        }
    }
}

/// Named snapshot of a draft plus its mapped params, persisted client-side
/// (same document shape the web client stores under `savedSearches`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: String,
    pub name: String,
    pub email_frequency: String,
    pub conditions: FilterDraft,
    pub filter_params: RawParams,
    pub created_at: DateTime<Utc>,
    pub last_notified: Option<DateTime<Utc>>,
}

/// Rental listing as returned by the Properties API.
/// Only the fields this subsystem reads are typed; the rest ride in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub listing_id: i64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub suburb: String,
    /// The backend serializes postcodes as floats (e.g. 2000.0)
    #[serde(default)]
    pub postcode: Option<f64>,
    #[serde(default)]
    pub rent_pw: Option<i64>,
    #[serde(default)]
    pub bedrooms: Option<i64>,
    #[serde(default)]
    pub bathrooms: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server-side pagination envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

/// One page of listings plus pagination metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingPage {
    #[serde(default)]
    pub data: Vec<Listing>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}
