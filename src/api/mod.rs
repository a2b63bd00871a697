//! Properties API client boundary.
//!
//! Owns the base URL, the 30 second request timeout, and response-envelope
//! unwrapping. Everything above this layer talks to [`PropertiesApi`] so
//! tests can substitute a programmable fake.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::models::{ListingPage, RawParams};
use crate::query::stringify;

/// Listings backend: paginated list/count queries plus the area directory.
#[async_trait]
pub trait PropertiesApi: Send + Sync {
    /// Paginated listing query; `params` is the mapped v1 or v2 shape.
    async fn list(&self, params: &RawParams) -> Result<ListingPage>;

    /// Raw area directory records (canonicalized by the caller).
    async fn areas(&self) -> Result<Vec<Value>>;
}

/// HTTP implementation over the rental listings service.
pub struct HttpPropertiesApi {
    client: Client,
    base_url: String,
}

impl HttpPropertiesApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// `error` in the envelope signals a domain error even on HTTP 200.
    fn check_envelope(body: &Value) -> Result<()> {
        if let Some(err) = body.get("error") {
            if !err.is_null() {
                anyhow::bail!("backend error: {}", stringify(err));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PropertiesApi for HttpPropertiesApi {
    async fn list(&self, params: &RawParams) -> Result<ListingPage> {
        let url = format!("{}/api/properties", self.base_url);
        let query: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.clone(), stringify(v)))
            .collect();

        debug!("GET {} with {} params", url, query.len());

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("Failed to fetch listings")?;

        if !response.status().is_success() {
            anyhow::bail!("listings request failed: {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to read listings response body")?;
        Self::check_envelope(&body)?;

        serde_json::from_value(body).context("Unexpected listings response shape")
    }

    async fn areas(&self) -> Result<Vec<Value>> {
        let url = format!("{}/api/areas", self.base_url);

        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch area directory")?;

        if !response.status().is_success() {
            anyhow::bail!("area directory request failed: {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to read area directory body")?;
        Self::check_envelope(&body)?;

        match body {
            Value::Array(items) => Ok(items),
            Value::Object(mut obj) => match obj.remove("data") {
                Some(Value::Array(items)) => Ok(items),
                _ => anyhow::bail!("unexpected area directory shape"),
            },
            _ => anyhow::bail!("unexpected area directory shape"),
        }
    }
}
