//! Client-side filter state core for a rental-listing search UI.
//!
//! The pieces, leaf to root: a query sanitizer ([`query`]), an area
//! canonicalizer ([`areas`]), the v1/v2 parameter mappers ([`params`]), the
//! listing store with preview-count aggregation ([`store`]), the debounced
//! per-section counter ([`preview`]), and the four-step filter wizard with
//! URL synchronization ([`wizard`]).

pub mod api;
pub mod areas;
pub mod models;
pub mod params;
pub mod preview;
pub mod query;
pub mod router;
pub mod storage;
pub mod store;
pub mod wizard;

pub use api::{HttpPropertiesApi, PropertiesApi};
pub use areas::{area_entry, canonical_id_of, canonicalize_area, is_same_area};
pub use models::{
    Area, AreaKind, FilterDraft, Listing, ListingPage, Pagination, RawParams, SavedSearch,
    PRICE_CEILING,
};
pub use params::{mapper_for, LegacyParamMapper, Paging, ParamMapper, WhitelistParamMapper};
pub use preview::{PreviewState, SectionPreview, DEFAULT_DEBOUNCE};
pub use query::{is_empty_val, is_same_query, sanitize_query_params, Query};
pub use router::{MemoryRouter, QueryRouter};
pub use storage::{JsonFileStorage, KvStorage, MemoryStorage};
pub use store::{PropertiesStore, SharedStore};
pub use wizard::{FilterWizard, SAVED_SEARCHES_KEY};
