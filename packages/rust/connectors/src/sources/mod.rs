//! Concrete source connectors.

pub mod clarity;
pub mod mailchimp;
pub mod woo;

pub use clarity::ClarityConnector;
pub use mailchimp::MailchimpConnector;
pub use woo::WooConnector;

use reportcast_shared::{ReportcastError, Result};

/// Read the credential named by an optional `*_env` config field.
///
/// `None` means the source is unconfigured (a warning, not an error):
/// either no env var is named, or the named var is unset/empty.
pub(crate) fn optional_env(var_name: &Option<String>) -> Option<String> {
    let name = var_name.as_deref()?;
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Build the HTTP client used by API-backed connectors.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|e| ReportcastError::Network(format!("failed to build HTTP client: {e}")))
}
