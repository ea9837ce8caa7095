//! Attribution (UTM) parameter extraction from order metadata.
//!
//! WooCommerce attribution plugins disagree on how they store UTM values:
//! plain keys, underscore-prefixed keys, `wc_last_`/`initial_` prefixes, or
//! a single `utm_parameters` entry holding a JSON-encoded object. Extraction
//! merges all of them into one map keyed by the canonical parameter name,
//! last write wins per canonical key in metadata order.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::MetaEntry;

/// Raw metadata keys recognized as attribution parameters (lower-case).
const KNOWN_KEYS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "_utm_source",
    "_utm_medium",
    "_utm_campaign",
    "_utm_term",
    "_utm_content",
    "wc_last_utm_source",
    "wc_last_utm_medium",
    "wc_last_utm_campaign",
    "initial_utm_source",
    "initial_utm_medium",
    "initial_utm_campaign",
    "http_referer",
];

/// Metadata key that some plugins use to hold every UTM value at once.
const AGGREGATE_KEY: &str = "utm_parameters";

/// Merged attribution parameters, keyed by canonical parameter name.
pub type AttributionParams = BTreeMap<String, String>;

/// Extract attribution parameters from an order's metadata array.
///
/// Entries are scanned in order; for each canonical key the last value
/// encountered wins, regardless of whether the raw key was prefixed.
/// Malformed aggregate JSON is logged and skipped, never fatal.
pub fn extract_attribution(meta_data: &[MetaEntry]) -> AttributionParams {
    let mut params = AttributionParams::new();

    for entry in meta_data {
        let key = entry.key.to_lowercase();

        if key == AGGREGATE_KEY {
            expand_aggregate(&entry.value, &mut params);
        } else if is_attribution_key(&key) {
            params.insert(canonical_key(&key), value_to_string(&entry.value));
        }
    }

    params
}

/// Expand a `utm_parameters` aggregate value (JSON string or nested object)
/// into the working map.
fn expand_aggregate(value: &Value, params: &mut AttributionParams) {
    let object = match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "could not decode utm_parameters JSON, skipping entry");
                None
            }
        },
        Value::Object(map) => Some(map.clone()),
        _ => None,
    };

    let Some(object) = object else { return };

    for (k, v) in object {
        let k = k.to_lowercase();
        if k.starts_with("utm_") {
            params.insert(canonical_key(&k), value_to_string(&v));
        }
    }
}

/// Whether a lower-cased metadata key carries an attribution value.
///
/// Accepts the known key set plus any bare `utm_`-prefixed key, so that
/// keys admitted by aggregate expansion (which takes every `utm_*` entry)
/// are also accepted on a direct scan. Without this, re-extracting a
/// merged map would drop aggregate-only keys instead of reaching a
/// fixpoint.
fn is_attribution_key(key: &str) -> bool {
    KNOWN_KEYS.contains(&key) || key.starts_with("utm_")
}

/// Strip the known prefixes down to the canonical parameter name.
fn canonical_key(key: &str) -> String {
    let stripped = key.trim_start_matches('_');
    let stripped = stripped
        .strip_prefix("wc_last_")
        .or_else(|| stripped.strip_prefix("initial_"))
        .unwrap_or(stripped);
    stripped.to_string()
}

/// Render a metadata value as a plain string (most are strings already).
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
