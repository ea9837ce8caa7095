//! Report assembly: composite document sections and the order detail document.
//!
//! The composite report gets one section per connector in invocation order.
//! Text sources pass through as-is; record sources contribute a synthesized
//! summary section here, with the record-level output going to a separate
//! detail document.

use chrono::NaiveDate;
use tracing::debug;

use reportcast_normalize::Order;
use reportcast_shared::{ReportingWindow, Section, SourceStatus, TextSection};

/// Title line content for the composite report.
pub fn composite_title(end: NaiveDate) -> String {
    format!("Combined Data Report - {end}")
}

/// Turn a connector's preformatted text section into a report section.
pub fn text_section(ts: TextSection) -> Section {
    Section {
        title: ts.heading,
        status: ts.status,
        body: ts.body,
    }
}

/// Synthesize the composite-report summary section for a record source.
///
/// Detail-level data is deliberately not inlined here; it is published as
/// its own per-record chunks.
pub fn orders_summary_section(title: &str, orders: &[Order]) -> Section {
    if orders.is_empty() {
        return Section {
            title: title.to_string(),
            status: SourceStatus::Warning,
            body: "- No order data received.".into(),
        };
    }

    let usd_total: f64 = orders
        .iter()
        .filter(|o| o.currency == "USD")
        .map(Order::total_amount)
        .sum();

    let mut counts_by_currency: Vec<(String, usize)> = Vec::new();
    for order in orders {
        match counts_by_currency.iter_mut().find(|(c, _)| *c == order.currency) {
            Some((_, n)) => *n += 1,
            None => counts_by_currency.push((order.currency.clone(), 1)),
        }
    }
    let currency_breakdown = counts_by_currency
        .iter()
        .map(|(c, n)| format!("{n} {}", if c.is_empty() { "unknown" } else { c }))
        .collect::<Vec<_>>()
        .join(", ");

    debug!(orders = orders.len(), usd_total, "summarized order records");

    Section {
        title: title.to_string(),
        status: SourceStatus::Ok,
        body: format!(
            "- Total orders: {}\n- Orders by currency: {currency_breakdown}\n- Total sales (USD): {usd_total:.2} USD\n- Detailed order data is published separately.",
            orders.len()
        ),
    }
}

// ---------------------------------------------------------------------------
// Detail document
// ---------------------------------------------------------------------------

/// Render the full order detail document for the report file.
///
/// One block per order under the section heading, separated by rules.
pub fn detail_document(title: &str, window: &ReportingWindow, orders: &[Order]) -> String {
    let mut parts = vec![format!(
        "### {title} ({} to {})\n",
        window.start, window.end
    )];

    if orders.is_empty() {
        parts.push("- No order details to report for this period.".into());
    } else {
        for order in orders {
            parts.push(format!("\n---\n{}", detail_block(order)));
        }
    }

    parts.join("\n")
}

/// The per-order body used inside the detail document.
fn detail_block(order: &Order) -> String {
    let mut lines = vec![
        format!("**Order ID**: {}", order.id),
        format!("- **Date**: {}", order.created_at),
        format!("- **Status**: {}", order.status),
        format!("- **Total**: {} {}", order.total, order.currency),
        format!("- **Customer Email**: {}", order.customer_email),
        format!("- **Customer Country**: {}", order.customer_country),
        format!("- **Payment Method**: {}", order.payment_method),
        "  **Line Items:**".to_string(),
    ];

    if order.line_items.is_empty() {
        lines.push("    - No line items.".into());
    } else {
        for item in &order.line_items {
            lines.push(format!(
                "    - {} (SKU: {}) - qty: {}, total: {}",
                item.name, item.sku, item.quantity, item.total
            ));
        }
    }

    lines.push("  **Attribution:**".into());
    if order.attribution.is_empty() {
        lines.push("    - No attribution parameters found.".into());
    } else {
        for (key, value) in &order.attribution {
            lines.push(format!("    - {key}: {value}"));
        }
    }

    lines.join("\n")
}

/// Render one order as a standalone publishable block (one order = one
/// chunk in the detail publish path).
pub fn order_block(heading: &str, order: &Order) -> String {
    let items = if order.line_items.is_empty() {
        "N/A".to_string()
    } else {
        order
            .line_items
            .iter()
            .map(|li| format!("{} (SKU: {})", li.name, li.sku))
            .collect::<Vec<_>>()
            .join("<br>")
    };

    let quantity: i64 = order.line_items.iter().map(|li| li.quantity).sum();

    let customer = match (
        order.customer_name.is_empty(),
        order.customer_email.is_empty(),
    ) {
        (true, true) => "N/A".to_string(),
        (false, true) => order.customer_name.clone(),
        (true, false) => order.customer_email.clone(),
        (false, false) => format!("{}<br>{}", order.customer_name, order.customer_email),
    };

    let notes = if order.notes.is_empty() {
        "N/A".to_string()
    } else {
        order.notes.join("<br>")
    };

    let attribution = if order.attribution.is_empty() {
        "N/A".to_string()
    } else {
        order
            .attribution
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "### {heading}\n\
         - Order ID: {}\n\
         - Date: {}\n\
         - Status: {}\n\
         - Customer: {customer}\n\
         - Items: {items}\n\
         - Quantity: {quantity}\n\
         - Total: {}\n\
         - Currency: {}\n\
         - Payment Method: {}\n\
         - Attribution: {attribution}\n\
         - Notes: {notes}\n",
        order.id, order.created_at, order.status, order.total, order.currency, order.payment_method
    )
}
