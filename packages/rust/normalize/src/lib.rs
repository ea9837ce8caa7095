//! Order record normalization.
//!
//! Upstream e-commerce payloads are loosely shaped JSON. This crate defines
//! an explicit record schema with defaulted optional fields, flattens the
//! nested billing/line-item/metadata structure into an immutable [`Order`],
//! and extracts attribution parameters (see [`attribution`]). Normalization
//! is best-effort: a malformed record still yields an `Order` with missing
//! fields at their defaults, never an error.

mod attribution;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub use attribution::{AttributionParams, extract_attribution};

// ---------------------------------------------------------------------------
// Raw upstream schema (serde defaults, unknown fields ignored)
// ---------------------------------------------------------------------------

/// One entry of an order's free-form metadata array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaEntry {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Billing block of a raw order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBilling {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Line item of a raw order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub total: String,
}

/// Raw order record as returned by the store API. Every field is optional
/// upstream; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrder {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub date_created_gmt: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub billing: RawBilling,
    #[serde(default)]
    pub payment_method_title: String,
    #[serde(default)]
    pub line_items: Vec<RawLineItem>,
    #[serde(default)]
    pub meta_data: Vec<MetaEntry>,
}

// ---------------------------------------------------------------------------
// Normalized model
// ---------------------------------------------------------------------------

/// Metadata key carrying free-form order notes.
const ORDER_COMMENTS_KEY: &str = "_order_comments";

/// A normalized line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    /// Line total as reported upstream (kept verbatim for rendering).
    pub total: String,
}

/// A normalized, flattened order. Created once during normalization and
/// immutable thereafter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Order {
    pub id: i64,
    pub created_at: String,
    pub status: String,
    /// Order total as reported upstream (see [`Order::total_amount`]).
    pub total: String,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_country: String,
    pub payment_method: String,
    pub line_items: Vec<LineItem>,
    pub attribution: AttributionParams,
    /// Free-form notes pulled from `_order_comments` metadata.
    pub notes: Vec<String>,
}

impl Order {
    /// Parse the upstream total into a number, defaulting to zero when the
    /// field is missing or not numeric.
    pub fn total_amount(&self) -> f64 {
        self.total.trim().parse().unwrap_or(0.0)
    }

    /// SHA-256 of the normalized content, used to detect whether a
    /// previously published order detail chunk has changed.
    pub fn content_hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Normalize one raw order record into an [`Order`].
///
/// A record that fails to decode still yields a defaulted `Order` so that
/// the batch is never truncated by a single malformed payload.
pub fn normalize_order(record: &serde_json::Value) -> Order {
    let raw: RawOrder = match serde_json::from_value(record.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "malformed order record, emitting defaulted order");
            RawOrder::default()
        }
    };

    let attribution = extract_attribution(&raw.meta_data);

    let notes: Vec<String> = raw
        .meta_data
        .iter()
        .filter(|m| m.key == ORDER_COMMENTS_KEY)
        .filter_map(|m| m.value.as_str().map(str::to_string))
        .filter(|s| !s.is_empty())
        .collect();

    let customer_name = format!("{} {}", raw.billing.first_name, raw.billing.last_name)
        .trim()
        .to_string();

    let order = Order {
        id: raw.id,
        created_at: raw.date_created_gmt,
        status: raw.status,
        total: raw.total,
        currency: raw.currency,
        customer_email: raw.billing.email,
        customer_name,
        customer_country: raw.billing.country,
        payment_method: raw.payment_method_title,
        line_items: raw
            .line_items
            .into_iter()
            .map(|li| LineItem {
                name: li.name,
                sku: li.sku,
                quantity: li.quantity,
                total: li.total,
            })
            .collect(),
        attribution,
        notes,
    };

    debug!(
        order_id = order.id,
        items = order.line_items.len(),
        utm_keys = order.attribution.len(),
        "order normalized"
    );

    order
}

/// Normalize a whole batch, preserving upstream order.
pub fn normalize_orders(records: &[serde_json::Value]) -> Vec<Order> {
    records.iter().map(normalize_order).collect()
}
