//! Upstream data source connectors.
//!
//! This crate provides:
//! - [`sources`] — Concrete connectors (WooCommerce orders, Mailchimp
//!   campaigns, Clarity insights file)
//! - [`SourceConnector`] — Dispatch over the configured connector kinds
//!
//! Connectors fail closed: a fetch always yields a [`SourceResult`], never
//! an error. Missing credentials become warning-tagged sections, upstream
//! failures become error-tagged sections, and the pipeline keeps going.

pub mod sources;

use tracing::info;

use reportcast_shared::{ReportcastError, ReportingWindow, Result, SourceConfig, SourceResult};

pub use sources::{ClarityConnector, MailchimpConnector, WooConnector};

/// User-Agent string for upstream API requests.
pub(crate) const USER_AGENT: &str = concat!("reportcast/", env!("CARGO_PKG_VERSION"));

/// One configured upstream source, ready to fetch.
///
/// Dispatch is a plain enum: the set of source kinds is closed and the
/// fetch methods are async.
#[derive(Debug)]
pub enum SourceConnector {
    Woo(WooConnector),
    Mailchimp(MailchimpConnector),
    Clarity(ClarityConnector),
}

impl SourceConnector {
    /// Build a connector from one config entry.
    ///
    /// An unknown `kind` is a config error: the run should not start with
    /// a source it cannot fetch.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        match config.kind.as_str() {
            "woocommerce" => Ok(Self::Woo(WooConnector::new(config)?)),
            "mailchimp" => Ok(Self::Mailchimp(MailchimpConnector::new(config)?)),
            "clarity" => Ok(Self::Clarity(ClarityConnector::new(config))),
            other => Err(ReportcastError::config(format!(
                "unknown source kind {other:?} for source {:?}",
                config.name
            ))),
        }
    }

    /// Display name, used as the report section title.
    pub fn name(&self) -> &str {
        match self {
            Self::Woo(c) => c.name(),
            Self::Mailchimp(c) => c.name(),
            Self::Clarity(c) => c.name(),
        }
    }

    /// Days this source's data lags behind real time.
    pub fn lag_days(&self) -> u32 {
        match self {
            Self::Woo(c) => c.lag_days(),
            Self::Mailchimp(c) => c.lag_days(),
            Self::Clarity(c) => c.lag_days(),
        }
    }

    /// Fetch this source for the given (already lag-adjusted) window.
    pub async fn fetch(&self, window: &ReportingWindow) -> SourceResult {
        info!(source = self.name(), %window.start, %window.end, "fetching source");
        match self {
            Self::Woo(c) => c.fetch(window).await,
            Self::Mailchimp(c) => c.fetch(window).await,
            Self::Clarity(c) => c.fetch().await,
        }
    }
}

/// Build connectors for every configured source, preserving config order.
pub fn build_connectors(configs: &[SourceConfig]) -> Result<Vec<SourceConnector>> {
    configs.iter().map(SourceConnector::from_config).collect()
}
