mod common;

use std::sync::atomic::Ordering;

use common::MockApi;
use rentseek::{Listing, PropertiesStore, RawParams};
use serde_json::json;

fn raw(value: serde_json::Value) -> RawParams {
    value.as_object().cloned().unwrap_or_default()
}

fn listing(id: i64, suburb: &str, postcode: f64) -> Listing {
    serde_json::from_value(json!({
        "listing_id": id,
        "address": format!("{id} Example St"),
        "suburb": suburb,
        "postcode": postcode,
    }))
    .unwrap()
}

#[tokio::test]
async fn preview_draft_merge_precedence() {
    let api = MockApi::new(5);
    let mut store = PropertiesStore::new(api, false);

    store.apply_filters(&raw(json!({"bedrooms": "2", "suburb": "Ultimo"}))).await.unwrap();
    store.update_preview_draft("price", raw(json!({"minPrice": 300})));
    store.update_preview_draft("bedrooms", raw(json!({"bedrooms": "3"})));

    let merged = store.merged_preview_params(&raw(json!({"minPrice": 450})));
    // applied < sections (registration order) < extra
    assert_eq!(merged.get("suburb"), Some(&json!("Ultimo")));
    assert_eq!(merged.get("bedrooms"), Some(&json!("3")));
    assert_eq!(merged.get("minPrice"), Some(&json!(450)));
}

#[tokio::test]
async fn later_sections_win_key_conflicts_in_registration_order() {
    let api = MockApi::new(0);
    let mut store = PropertiesStore::new(api, false);

    store.update_preview_draft("a", raw(json!({"bedrooms": "1"})));
    store.update_preview_draft("b", raw(json!({"bedrooms": "2"})));
    // Re-patching section "a" must not move it past "b"
    store.update_preview_draft("a", raw(json!({"minPrice": 100})));

    let merged = store.merged_preview_params(&RawParams::new());
    assert_eq!(merged.get("bedrooms"), Some(&json!("2")));

    let order: Vec<&str> = store.preview_sections().iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(order, vec!["a", "b"]);
}

#[tokio::test]
async fn empty_patch_values_unset_keys() {
    let api = MockApi::new(0);
    let mut store = PropertiesStore::new(api, false);

    store.update_preview_draft("price", raw(json!({"minPrice": 300, "maxPrice": 900})));
    store.update_preview_draft("price", raw(json!({"maxPrice": ""})));

    let merged = store.merged_preview_params(&RawParams::new());
    assert_eq!(merged.get("minPrice"), Some(&json!(300)));
    assert!(!merged.contains_key("maxPrice"));

    store.clear_preview_draft("price");
    assert!(store.merged_preview_params(&RawParams::new()).is_empty());
}

#[tokio::test]
async fn region_guard_short_circuits_without_a_call() {
    let api = MockApi::new(42);
    let mut store = PropertiesStore::new(api.clone(), false);
    store.require_region_first = true;

    let count = store.get_filtered_count(&RawParams::new()).await.unwrap();
    assert_eq!(count, 0);
    assert_eq!(api.call_count(), 0);

    let count = store
        .get_filtered_count(&raw(json!({"suburb": "Ultimo"})))
        .await
        .unwrap();
    assert_eq!(count, 42);
    assert_eq!(api.call_count(), 1);
}

#[tokio::test]
async fn count_requests_force_page_size_one() {
    let api = MockApi::new(7);
    let store = PropertiesStore::new(api.clone(), true);

    let count = store
        .get_filtered_count(&raw(json!({"bedrooms": "2"})))
        .await
        .unwrap();
    assert_eq!(count, 7);

    let call = api.last_call().unwrap();
    assert_eq!(call.get("page_size"), Some(&json!(1)));
    assert_eq!(call.get("page"), Some(&json!(1)));
}

#[tokio::test]
async fn count_errors_propagate_instead_of_masquerading_as_zero() {
    let api = MockApi::new(9);
    let store = PropertiesStore::new(api.clone(), false);
    api.fail_lists.store(true, Ordering::SeqCst);

    assert!(store.get_preview_count(&RawParams::new()).await.is_err());
}

#[tokio::test]
async fn pagination_keeps_applied_filters() {
    let api = MockApi::new(100);
    let mut store = PropertiesStore::new(api.clone(), false);

    store
        .apply_filters(&raw(json!({"suburb": "Glebe", "bedrooms": "2"})))
        .await
        .unwrap();
    // force a known pagination window
    store.has_next = true;
    store.total_pages = 5;

    store.next_page().await.unwrap();

    let call = api.last_call().unwrap();
    assert_eq!(call.get("suburb"), Some(&json!("Glebe")));
    assert_eq!(call.get("bedrooms"), Some(&json!("2")));
    assert_eq!(call.get("page"), Some(&json!(2)));
    assert_eq!(store.current_page, 2);
}

#[tokio::test]
async fn page_size_change_resets_to_first_page() {
    let api = MockApi::new(100);
    let mut store = PropertiesStore::new(api.clone(), false);
    store.apply_filters(&raw(json!({"suburb": "Glebe"}))).await.unwrap();
    store.current_page = 3;

    store.set_page_size(50).await.unwrap();

    assert_eq!(store.current_page, 1);
    assert_eq!(store.page_size, 50);
    let call = api.last_call().unwrap();
    assert_eq!(call.get("page_size"), Some(&json!(50)));
    assert_eq!(call.get("page"), Some(&json!(1)));
}

#[tokio::test]
async fn location_suggestions_rank_by_listing_count() {
    let api = MockApi::new(0);
    let mut store = PropertiesStore::new(api, false);
    store.all_properties = vec![
        listing(1, "Ultimo", 2007.0),
        listing(2, "Ultimo", 2007.0),
        listing(3, "Glebe", 2037.0),
    ];

    let suggestions = store.location_suggestions();
    assert_eq!(suggestions[0].id, "suburb_Ultimo");
    assert_eq!(suggestions[0].extra.get("count"), Some(&json!(2)));
    assert!(suggestions.iter().any(|a| a.id == "suburb_Glebe"));
    assert!(suggestions.iter().any(|a| a.id == "postcode_2007"));
}

#[tokio::test]
async fn area_directory_falls_back_to_listings_and_caches() {
    let api = MockApi::new(0);
    let mut store = PropertiesStore::new(api.clone(), false);
    store.all_properties = vec![listing(1, "Newtown", 2042.0)];

    // Directory down: derive from listings
    let areas = store.area_directory().await;
    assert!(areas.iter().any(|a| a.id == "suburb_Newtown"));

    // Directory comes back, but the fallback result is cached
    *api.area_records.lock().unwrap() = Some(vec![json!({"name": "Erskineville", "postcode": "2043"})]);
    let cached = store.area_directory().await;
    assert!(cached.iter().any(|a| a.id == "suburb_Newtown"));
    assert!(!cached.iter().any(|a| a.id == "suburb_Erskineville"));
}

#[tokio::test]
async fn missing_pagination_counts_as_zero() {
    struct BareApi;

    #[async_trait::async_trait]
    impl rentseek::PropertiesApi for BareApi {
        async fn list(&self, _params: &RawParams) -> anyhow::Result<rentseek::ListingPage> {
            Ok(rentseek::ListingPage {
                data: Vec::new(),
                pagination: None,
            })
        }

        async fn areas(&self) -> anyhow::Result<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }
    }

    let store = PropertiesStore::new(std::sync::Arc::new(BareApi), false);
    let count = store.get_filtered_count(&RawParams::new()).await.unwrap();
    assert_eq!(count, 0);
}
