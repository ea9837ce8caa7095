//! Mailchimp campaign summary connector.
//!
//! Lists the most recent sent campaigns and renders their report summaries
//! (opens, clicks, rates) as a preformatted text section. The reporting
//! window does not constrain the query; "most recent sent" is the contract.

use serde_json::Value;
use tracing::debug;

use reportcast_shared::{
    ReportingWindow, Result, SourceConfig, SourceResult, SourceStatus, TextSection,
};

use super::{http_client, optional_env};

/// How many recent campaigns to summarize.
const CAMPAIGN_COUNT: usize = 5;

/// Connector for a Mailchimp marketing account.
#[derive(Debug)]
pub struct MailchimpConnector {
    name: String,
    lag_days: u32,
    endpoint: Option<String>,
    key_env: Option<String>,
    client: reqwest::Client,
}

impl MailchimpConnector {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            lag_days: config.lag_days,
            endpoint: config.endpoint.clone(),
            key_env: config.key_env.clone(),
            client: http_client()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lag_days(&self) -> u32 {
        self.lag_days
    }

    /// Fetch recent campaign summaries as a text section.
    pub async fn fetch(&self, _window: &ReportingWindow) -> SourceResult {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return SourceResult::warning(&self.name, "API endpoint is not configured.");
        };
        let Some(api_key) = optional_env(&self.key_env) else {
            return SourceResult::warning(&self.name, "API key is not configured.");
        };

        let url = format!("{}/3.0/campaigns", endpoint.trim_end_matches('/'));
        let count = CAMPAIGN_COUNT.to_string();
        let response = match self
            .client
            .get(&url)
            .basic_auth("reportcast", Some(&api_key))
            .query(&[
                ("count", count.as_str()),
                ("status", "sent"),
                ("sort_field", "send_time"),
                ("sort_dir", "DESC"),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return SourceResult::error(&self.name, format!("campaigns request failed: {e}"));
            }
        };

        if !response.status().is_success() {
            return SourceResult::error(
                &self.name,
                format!("campaigns request returned HTTP {}", response.status()),
            );
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return SourceResult::error(
                    &self.name,
                    format!("unparseable campaigns response: {e}"),
                );
            }
        };

        let summaries = campaign_summaries(&body);
        debug!(campaigns = summaries.len(), "summarized campaigns");

        if summaries.is_empty() {
            return SourceResult::warning(&self.name, "No recent campaign reports found.");
        }

        SourceResult::Text(TextSection {
            heading: self.name.clone(),
            status: SourceStatus::Ok,
            body: summaries.join("\n"),
        })
    }
}

/// Render one bullet block per campaign that carries a report summary.
fn campaign_summaries(body: &Value) -> Vec<String> {
    let Some(campaigns) = body.get("campaigns").and_then(Value::as_array) else {
        return Vec::new();
    };

    campaigns
        .iter()
        .filter_map(|campaign| {
            let report = campaign.get("report_summary")?;
            if !report.is_object() {
                return None;
            }
            let title = campaign
                .pointer("/settings/title")
                .and_then(Value::as_str)
                .unwrap_or("untitled");
            let send_time = campaign
                .get("send_time")
                .and_then(Value::as_str)
                .unwrap_or("N/A");

            let opens = report.get("opens").and_then(Value::as_u64).unwrap_or(0);
            let unique_opens = report
                .get("unique_opens")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let open_rate = report.get("open_rate").and_then(Value::as_f64).unwrap_or(0.0) * 100.0;
            let clicks = report.get("clicks").and_then(Value::as_u64).unwrap_or(0);
            let subscriber_clicks = report
                .get("subscriber_clicks")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let click_rate =
                report.get("click_rate").and_then(Value::as_f64).unwrap_or(0.0) * 100.0;

            Some(format!(
                "- Campaign: '{title}' (sent {send_time})\n  \
                 - Opens: {opens} total / {unique_opens} unique (open rate: {open_rate:.2}%)\n  \
                 - Clicks: {clicks} total / {subscriber_clicks} subscribers (click rate: {click_rate:.2}%)"
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector(endpoint: Option<String>, key_var: &str) -> MailchimpConnector {
        MailchimpConnector::new(&SourceConfig {
            name: "Mailchimp Data".into(),
            kind: "mailchimp".into(),
            lag_days: 0,
            endpoint,
            key_env: Some(key_var.into()),
            secret_env: None,
            path: None,
        })
        .expect("build connector")
    }

    fn window() -> ReportingWindow {
        ReportingWindow::trailing("2026-08-29".parse().unwrap(), 7)
    }

    fn campaigns_body() -> Value {
        json!({
            "campaigns": [
                {
                    "settings": {"title": "August Newsletter"},
                    "send_time": "2026-08-20T09:00:00+00:00",
                    "report_summary": {
                        "opens": 120, "unique_opens": 90, "open_rate": 0.45,
                        "clicks": 30, "subscriber_clicks": 22, "click_rate": 0.11
                    }
                },
                {
                    "settings": {"title": "Draft without report"},
                    "send_time": "2026-08-25T09:00:00+00:00"
                }
            ]
        })
    }

    #[tokio::test]
    async fn summarizes_recent_campaigns() {
        let server = MockServer::start().await;
        // SAFETY: test-only, unique var name.
        unsafe { std::env::set_var("RC_TEST_MC_KEY_1", "mc-key") };

        Mock::given(method("GET"))
            .and(path("/3.0/campaigns"))
            .and(query_param("status", "sent"))
            .and(query_param("count", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(campaigns_body()))
            .mount(&server)
            .await;

        let connector = connector(Some(server.uri()), "RC_TEST_MC_KEY_1");
        let SourceResult::Text(section) = connector.fetch(&window()).await else {
            panic!("expected text section");
        };
        assert_eq!(section.status, SourceStatus::Ok);
        assert!(section.body.contains("'August Newsletter'"));
        assert!(section.body.contains("open rate: 45.00%"));
        // Campaign without a report summary is skipped.
        assert!(!section.body.contains("Draft without report"));
    }

    #[tokio::test]
    async fn no_reports_yields_warning() {
        let server = MockServer::start().await;
        unsafe { std::env::set_var("RC_TEST_MC_KEY_2", "mc-key") };

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"campaigns": []})))
            .mount(&server)
            .await;

        let connector = connector(Some(server.uri()), "RC_TEST_MC_KEY_2");
        let SourceResult::Text(section) = connector.fetch(&window()).await else {
            panic!("expected text section");
        };
        assert_eq!(section.status, SourceStatus::Warning);
        assert!(section.body.contains("No recent campaign reports"));
    }

    #[tokio::test]
    async fn upstream_failure_yields_error_section() {
        let server = MockServer::start().await;
        unsafe { std::env::set_var("RC_TEST_MC_KEY_3", "mc-key") };

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let connector = connector(Some(server.uri()), "RC_TEST_MC_KEY_3");
        let SourceResult::Text(section) = connector.fetch(&window()).await else {
            panic!("expected text section");
        };
        assert_eq!(section.status, SourceStatus::Error);
        assert!(section.body.contains("503"));
    }

    #[tokio::test]
    async fn missing_key_yields_warning() {
        let connector = connector(
            Some("https://us1.api.mailchimp.com".into()),
            "RC_TEST_MC_KEY_UNSET",
        );
        let SourceResult::Text(section) = connector.fetch(&window()).await else {
            panic!("expected text section");
        };
        assert_eq!(section.status, SourceStatus::Warning);
    }
}
