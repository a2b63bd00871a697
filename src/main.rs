use std::sync::Arc;

use rentseek::{
    FilterWizard, HttpPropertiesApi, JsonFileStorage, MemoryRouter, PropertiesStore, QueryRouter,
};
use serde_json::json;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🏠 Rentseek - filter wizard demo");
    info!("=================================");

    let base_url =
        std::env::var("RENTSEEK_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let filter_v2 = std::env::var("RENTSEEK_FILTER_V2").map_or(false, |v| v == "1");

    let api = Arc::new(HttpPropertiesApi::new(&base_url)?);
    let store = PropertiesStore::new(api, filter_v2).into_shared();
    let router = Arc::new(MemoryRouter::new());
    let storage = Arc::new(JsonFileStorage::new(".rentseek")?);

    let mut wizard = FilterWizard::new(store.clone(), router.clone(), storage).await;

    // Walk the wizard: area -> bedrooms -> apply
    let suburbs: Vec<String> = std::env::args().skip(1).collect();
    let suburbs = if suburbs.is_empty() {
        vec!["Ultimo".to_string()]
    } else {
        suburbs
    };
    for suburb in &suburbs {
        wizard.add_area(&json!({ "name": suburb })).await;
    }
    wizard.next_step();
    wizard.set_bedrooms(Some("2".to_string())).await;

    info!(
        "Preview: {} listings for {}",
        wizard.preview_count,
        suburbs.join(", ")
    );

    if !wizard.apply_filters().await {
        anyhow::bail!("apply failed against {base_url}");
    }

    let store = store.read().await;
    info!("✅ {} listings match (page 1)", store.total_count);
    for (i, listing) in store.properties.iter().enumerate() {
        println!(
            "{}. {} ({} pw)",
            i + 1,
            listing.address,
            listing
                .rent_pw
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
        println!("   {} {}", listing.suburb, listing.listing_id);
    }

    println!("\nURL query: {:?}", router.current_query());

    Ok(())
}
