use std::time::Duration;

use async_trait::async_trait;
use pricebot_core::config::CatalogConfig;
use pricebot_core::domain::PriceRecord;
use pricebot_core::filter::{validate, FilterSyntaxError};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid filter: {0}")]
    BadFilter(#[from] FilterSyntaxError),
    #[error("catalog page fetch failed: {0}")]
    Fetch(String),
    #[error("catalog returned status {status}")]
    Status { status: u16 },
    #[error("catalog page fetch timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// One page of the catalog response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PricePage {
    #[serde(rename = "Items", default)]
    pub items: Vec<PriceRecord>,
    #[serde(rename = "NextPageLink", default)]
    pub next_page_link: Option<String>,
}

/// Seam between pagination logic and the HTTP transport. Tests substitute an
/// in-memory fetcher.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<PricePage, CatalogError>;
}

/// Production fetcher over a shared `reqwest` client with an independent
/// bounded timeout per page.
pub struct HttpPageFetcher {
    http: reqwest::Client,
    timeout_secs: u64,
}

impl HttpPageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| CatalogError::Fetch(error.to_string()))?;
        Ok(Self { http, timeout_secs })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<PricePage, CatalogError> {
        let response = self.http.get(url).send().await.map_err(|error| {
            if error.is_timeout() {
                CatalogError::Timeout { timeout_secs: self.timeout_secs }
            } else {
                CatalogError::Fetch(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status { status: status.as_u16() });
        }

        response.json::<PricePage>().await.map_err(|error| {
            if error.is_timeout() {
                CatalogError::Timeout { timeout_secs: self.timeout_secs }
            } else {
                CatalogError::Fetch(error.to_string())
            }
        })
    }
}

/// Executes one validated filter query against the catalog, paginating to
/// completion. Purely functional given the filter; holds no mutable state.
pub struct CatalogClient<F = HttpPageFetcher> {
    fetcher: F,
    base_url: String,
    api_version: String,
}

impl<F> CatalogClient<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F, config: &CatalogConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        }
    }

    /// Fetch every record matching `filter`, in page-link order.
    ///
    /// A syntactically invalid filter fails before any network call. Pages
    /// are fetched sequentially: each next-page link comes from the prior
    /// response.
    pub async fn fetch_prices(&self, filter: &str) -> Result<Vec<PriceRecord>, CatalogError> {
        validate(filter)?;

        let mut records = Vec::new();
        let mut next_url = Some(self.first_page_url(filter));
        let mut pages = 0u32;

        while let Some(url) = next_url {
            let page = self.fetcher.fetch_page(&url).await?;
            pages += 1;
            records.extend(page.items);
            next_url = page.next_page_link.filter(|link| !link.is_empty());
        }

        debug!(
            event_name = "catalog.fetch.complete",
            pages,
            records = records.len(),
            filter,
            "catalog query finished"
        );
        Ok(records)
    }

    fn first_page_url(&self, filter: &str) -> String {
        format!(
            "{}?api-version={}&$filter={}",
            self.base_url,
            self.api_version,
            urlencoding::encode(filter)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pricebot_core::config::CatalogConfig;
    use pricebot_core::domain::PriceRecord;

    use super::{CatalogClient, CatalogError, PageFetcher, PricePage};

    fn test_config() -> CatalogConfig {
        CatalogConfig {
            base_url: "https://catalog.test/api/retail/prices".to_string(),
            api_version: "2023-01-01-preview".to_string(),
            page_timeout_secs: 30,
            max_attempts: 3,
        }
    }

    fn record(meter_name: &str) -> PriceRecord {
        PriceRecord {
            arm_sku_name: String::new(),
            retail_price: 0.1,
            unit_of_measure: "1 Hour".to_string(),
            arm_region_name: "eastus".to_string(),
            meter_id: meter_name.to_string(),
            meter_name: meter_name.to_string(),
            product_name: "Virtual Machines".to_string(),
            price_type: "Consumption".to_string(),
            location: None,
            reservation_term: None,
            savings_plan: None,
        }
    }

    /// Scripted fetcher: serves pages in order and records every URL fetched.
    /// Clones share state so tests can inspect calls after handing the
    /// fetcher to a client.
    #[derive(Clone)]
    struct ScriptedFetcher {
        pages: std::sync::Arc<Mutex<Vec<PricePage>>>,
        fetched_urls: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<PricePage>) -> Self {
            let mut reversed = pages;
            reversed.reverse();
            Self {
                pages: std::sync::Arc::new(Mutex::new(reversed)),
                fetched_urls: std::sync::Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.fetched_urls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, url: &str) -> Result<PricePage, CatalogError> {
            self.fetched_urls.lock().expect("lock").push(url.to_string());
            self.pages
                .lock()
                .expect("lock")
                .pop()
                .ok_or_else(|| CatalogError::Fetch("no more scripted pages".to_string()))
        }
    }

    #[tokio::test]
    async fn accumulates_pages_in_link_order_without_refetching() {
        let fetcher = ScriptedFetcher::new(vec![
            PricePage {
                items: vec![record("D8s v4")],
                next_page_link: Some("https://catalog.test/page2".to_string()),
            },
            PricePage {
                items: vec![record("D8s v5")],
                next_page_link: Some("https://catalog.test/page3".to_string()),
            },
            PricePage { items: vec![record("D8as v4")], next_page_link: None },
        ]);
        let client = CatalogClient::new(fetcher.clone(), &test_config());

        let records = client
            .fetch_prices("contains(tolower(meterName), 'd8s')")
            .await
            .expect("fetch should succeed");

        let meters: Vec<&str> = records.iter().map(|r| r.meter_name.as_str()).collect();
        assert_eq!(meters, vec!["D8s v4", "D8s v5", "D8as v4"]);

        let urls = fetcher.urls();
        assert_eq!(urls.len(), 3, "each page fetched exactly once");
        assert_eq!(urls[1], "https://catalog.test/page2");
        assert_eq!(urls[2], "https://catalog.test/page3");
        let unique: std::collections::HashSet<&String> = urls.iter().collect();
        assert_eq!(unique.len(), urls.len(), "no page fetched twice");
    }

    #[tokio::test]
    async fn first_page_url_carries_api_version_and_encoded_filter() {
        let fetcher = ScriptedFetcher::new(vec![PricePage::default()]);
        let client = CatalogClient::new(fetcher.clone(), &test_config());

        client
            .fetch_prices("armRegionName eq 'eastus' and contains(tolower(meterName), 'd8s')")
            .await
            .expect("fetch should succeed");

        let urls = fetcher.urls();
        assert!(urls[0].starts_with(
            "https://catalog.test/api/retail/prices?api-version=2023-01-01-preview&$filter="
        ));
        assert!(urls[0].contains("%20eq%20%27eastus%27"), "filter is URL-encoded: {}", urls[0]);
    }

    #[tokio::test]
    async fn invalid_filter_is_rejected_before_any_network_call() {
        let fetcher = ScriptedFetcher::new(vec![PricePage::default()]);
        let client = CatalogClient::new(fetcher.clone(), &test_config());

        let result = client.fetch_prices("contains(tolower(meterName), 'd8s").await;

        assert!(matches!(result, Err(CatalogError::BadFilter(_))));
        assert!(fetcher.urls().is_empty(), "no HTTP call for a syntactically invalid filter");
    }

    #[tokio::test]
    async fn empty_next_page_link_ends_pagination() {
        let fetcher = ScriptedFetcher::new(vec![PricePage {
            items: vec![record("D8s v4")],
            next_page_link: Some(String::new()),
        }]);
        let client = CatalogClient::new(fetcher.clone(), &test_config());

        let records = client
            .fetch_prices("contains(tolower(meterName), 'd8s')")
            .await
            .expect("fetch should succeed");

        assert_eq!(records.len(), 1);
        assert_eq!(fetcher.urls().len(), 1);
    }

    #[tokio::test]
    async fn mid_pagination_failure_propagates() {
        let fetcher = ScriptedFetcher::new(vec![PricePage {
            items: vec![record("D8s v4")],
            next_page_link: Some("https://catalog.test/page2".to_string()),
        }]);
        let client = CatalogClient::new(fetcher.clone(), &test_config());

        let result = client.fetch_prices("contains(tolower(meterName), 'd8s')").await;
        assert!(matches!(result, Err(CatalogError::Fetch(_))));
    }

    #[test]
    fn price_page_parses_catalog_body() {
        let body = r#"{
            "BillingCurrency": "USD",
            "Items": [{"meterName": "D8s v4", "retailPrice": 0.384}],
            "NextPageLink": "https://catalog.test/page2",
            "Count": 1
        }"#;
        let page: PricePage = serde_json::from_str(body).expect("page should parse");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_page_link.as_deref(), Some("https://catalog.test/page2"));
    }
}
