//! WooCommerce orders connector.
//!
//! Fetches raw orders over the `wc/v3` REST API for the reporting window
//! and yields them as records for the normalizer. Pagination follows the
//! `X-WP-TotalPages` response header, with a hard page cap so a
//! misbehaving upstream cannot loop forever.

use serde_json::Value;
use tracing::{debug, info, warn};

use reportcast_shared::{ReportingWindow, Result, SourceConfig, SourceResult};

use super::{http_client, optional_env};

/// Orders fetched per page. The API caps this at 100.
const PER_PAGE: usize = 100;

/// Pagination guard: never fetch more than this many pages in one run.
const MAX_PAGES: u32 = 200;

/// Only settled orders contribute to the report.
const STATUS_FILTER: &str = "processing,completed";

/// Connector for a WooCommerce store's orders endpoint.
#[derive(Debug)]
pub struct WooConnector {
    name: String,
    lag_days: u32,
    endpoint: Option<String>,
    key_env: Option<String>,
    secret_env: Option<String>,
    client: reqwest::Client,
}

impl WooConnector {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            lag_days: config.lag_days,
            endpoint: config.endpoint.clone(),
            key_env: config.key_env.clone(),
            secret_env: config.secret_env.clone(),
            client: http_client()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lag_days(&self) -> u32 {
        self.lag_days
    }

    /// Fetch all orders in the window. Fails closed: any configuration or
    /// upstream problem comes back as a tagged text section.
    pub async fn fetch(&self, window: &ReportingWindow) -> SourceResult {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return SourceResult::warning(&self.name, "store URL is not configured.");
        };
        let (Some(key), Some(secret)) = (
            optional_env(&self.key_env),
            optional_env(&self.secret_env),
        ) else {
            return SourceResult::warning(
                &self.name,
                "API credentials are not configured (consumer key/secret env vars).",
            );
        };

        let base = match store_base_url(endpoint) {
            Ok(base) => base,
            Err(detail) => return SourceResult::error(&self.name, detail),
        };
        let orders_url = format!("{base}/wp-json/wc/v3/orders");

        // `after` is inclusive, `before` is exclusive: push it to the start
        // of the day after the window end so the whole end date is covered.
        let after = format!("{}T00:00:00", window.start);
        let before = format!(
            "{}T00:00:00",
            window.end.succ_opt().unwrap_or(window.end)
        );

        let mut all_orders: Vec<Value> = Vec::new();
        let mut page: u32 = 1;

        loop {
            debug!(page, "fetching orders page");
            let per_page = PER_PAGE.to_string();
            let page_param = page.to_string();
            let response = match self
                .client
                .get(&orders_url)
                .basic_auth(&key, Some(&secret))
                .query(&[
                    ("after", after.as_str()),
                    ("before", before.as_str()),
                    ("per_page", per_page.as_str()),
                    ("page", page_param.as_str()),
                    ("status", STATUS_FILTER),
                    ("orderby", "date"),
                    ("order", "asc"),
                ])
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    return SourceResult::error(
                        &self.name,
                        format!("order request failed (page {page}): {e}"),
                    );
                }
            };

            let total_pages: u32 = response
                .headers()
                .get("X-WP-TotalPages")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);

            let status = response.status();
            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    return SourceResult::error(
                        &self.name,
                        format!("unparseable orders response (page {page}): {e}"),
                    );
                }
            };

            // The API reports its own errors as an object with a `code`
            // field, sometimes under a 200.
            if let Some(code) = body.get("code").and_then(Value::as_str) {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown API error");
                return SourceResult::error(
                    &self.name,
                    format!("API error (page {page}): {message} (code: {code})"),
                );
            }
            if !status.is_success() {
                return SourceResult::error(
                    &self.name,
                    format!("orders request returned HTTP {status} (page {page})"),
                );
            }

            let page_orders = match body {
                Value::Array(orders) => orders,
                other => {
                    return SourceResult::error(
                        &self.name,
                        format!("unexpected orders payload shape (page {page}): {other}"),
                    );
                }
            };

            if page_orders.is_empty() {
                break;
            }
            let page_len = page_orders.len();
            all_orders.extend(page_orders);
            debug!(page, page_len, total = all_orders.len(), "orders page fetched");

            if total_pages > 0 {
                if page >= total_pages {
                    break;
                }
            } else if page_len < PER_PAGE {
                // No total header; a short page is the last page.
                break;
            }

            page += 1;
            if page > MAX_PAGES {
                warn!(max_pages = MAX_PAGES, "pagination cap reached, stopping");
                break;
            }
        }

        info!(orders = all_orders.len(), "fetched order records");
        SourceResult::Records(all_orders)
    }
}

/// Normalize a configured store URL to the site base.
///
/// Accepts URLs that already point inside `/wp-json/` and trims them back
/// to the site root; rejects anything without an http(s) scheme.
fn store_base_url(endpoint: &str) -> std::result::Result<String, String> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| format!("invalid store URL {endpoint:?}: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!(
            "store URL {endpoint:?} must start with http:// or https://"
        ));
    }
    let base = match endpoint.find("/wp-json/") {
        Some(idx) => &endpoint[..idx],
        None => endpoint,
    };
    Ok(base.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn set_creds(key_var: &str, secret_var: &str) {
        // SAFETY: test-only, unique var names per test.
        unsafe {
            std::env::set_var(key_var, "ck_test");
            std::env::set_var(secret_var, "cs_test");
        }
    }

    fn connector(endpoint: Option<String>, key_var: &str, secret_var: &str) -> WooConnector {
        WooConnector::new(&SourceConfig {
            name: "WooCommerce Data".into(),
            kind: "woocommerce".into(),
            lag_days: 0,
            endpoint,
            key_env: Some(key_var.into()),
            secret_env: Some(secret_var.into()),
            path: None,
        })
        .expect("build connector")
    }

    fn window() -> ReportingWindow {
        ReportingWindow::trailing("2026-08-29".parse().unwrap(), 7)
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(
            store_base_url("https://shop.example.com/").unwrap(),
            "https://shop.example.com"
        );
        assert_eq!(
            store_base_url("https://shop.example.com/wp-json/wc/v3").unwrap(),
            "https://shop.example.com"
        );
        assert!(store_base_url("shop.example.com").is_err());
    }

    #[tokio::test]
    async fn missing_credentials_yield_warning_section() {
        let connector = connector(
            Some("https://shop.example.com".into()),
            "RC_TEST_WOO_KEY_UNSET_1",
            "RC_TEST_WOO_SECRET_UNSET_1",
        );
        let result = connector.fetch(&window()).await;
        let SourceResult::Text(section) = result else {
            panic!("expected text section");
        };
        assert!(section.status.is_degraded());
        assert!(section.body.contains("credentials"));
    }

    #[tokio::test]
    async fn missing_endpoint_yields_warning_section() {
        set_creds("RC_TEST_WOO_KEY_2", "RC_TEST_WOO_SECRET_2");
        let connector = connector(None, "RC_TEST_WOO_KEY_2", "RC_TEST_WOO_SECRET_2");
        let SourceResult::Text(section) = connector.fetch(&window()).await else {
            panic!("expected text section");
        };
        assert!(section.body.contains("store URL"));
    }

    #[tokio::test]
    async fn fetches_and_paginates_orders() {
        set_creds("RC_TEST_WOO_KEY_3", "RC_TEST_WOO_SECRET_3");
        let server = MockServer::start().await;

        let page1: Vec<_> = (1..=3).map(|i| json!({"id": i, "total": "1.00"})).collect();
        let page2 = vec![json!({"id": 4, "total": "2.00"})];

        Mock::given(method("GET"))
            .and(path("/wp-json/wc/v3/orders"))
            .and(query_param("page", "1"))
            .and(query_param("status", "processing,completed"))
            .and(query_param("after", "2026-08-22T00:00:00"))
            .and(query_param("before", "2026-08-30T00:00:00"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-WP-TotalPages", "2")
                    .set_body_json(&page1),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wc/v3/orders"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-WP-TotalPages", "2")
                    .set_body_json(&page2),
            )
            .mount(&server)
            .await;

        let connector = connector(
            Some(server.uri()),
            "RC_TEST_WOO_KEY_3",
            "RC_TEST_WOO_SECRET_3",
        );
        let SourceResult::Records(records) = connector.fetch(&window()).await else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 4);
        assert_eq!(records[3]["id"], 4);
    }

    #[tokio::test]
    async fn api_error_object_yields_error_section() {
        set_creds("RC_TEST_WOO_KEY_4", "RC_TEST_WOO_SECRET_4");
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "rest_no_route",
                "message": "No route was found"
            })))
            .mount(&server)
            .await;

        let connector = connector(
            Some(server.uri()),
            "RC_TEST_WOO_KEY_4",
            "RC_TEST_WOO_SECRET_4",
        );
        let SourceResult::Text(section) = connector.fetch(&window()).await else {
            panic!("expected text section");
        };
        assert!(section.body.contains("rest_no_route"));
        assert!(section.body.contains("No route was found"));
    }

    #[tokio::test]
    async fn empty_store_yields_empty_records() {
        set_creds("RC_TEST_WOO_KEY_5", "RC_TEST_WOO_SECRET_5");
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-WP-TotalPages", "0")
                    .set_body_json(json!([])),
            )
            .mount(&server)
            .await;

        let connector = connector(
            Some(server.uri()),
            "RC_TEST_WOO_KEY_5",
            "RC_TEST_WOO_SECRET_5",
        );
        let SourceResult::Records(records) = connector.fetch(&window()).await else {
            panic!("expected records");
        };
        assert!(records.is_empty());
    }
}
