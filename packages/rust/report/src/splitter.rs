//! Heading-boundary chunk splitting and chunk labeling.
//!
//! A document is partitioned at markdown heading lines of the configured
//! depth or shallower; each chunk runs from its heading to just before the
//! next boundary. Concatenating the chunks in order reproduces the input
//! byte-for-byte, so any text before the first boundary becomes a leading
//! chunk of its own.
//!
//! Two label schemes with deliberately opposite stability:
//! - composite chunks embed the run stamp, so reruns never overwrite;
//! - detail chunks are labeled by record id, so reruns overwrite.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use reportcast_normalize::Order;
use reportcast_shared::{Chunk, SECTION_HEADING_DEPTH};

/// Split `doc` at heading lines of depth `max_depth` or shallower.
///
/// A document without any boundary heading comes back as a single chunk
/// equal to the whole document.
pub fn split_at_depth(doc: &str, max_depth: usize) -> Vec<String> {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s").expect("valid regex"));

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for segment in doc.split_inclusive('\n') {
        let line = segment.trim_end_matches(['\r', '\n']);
        if let Some(caps) = HEADING_RE.captures(line) {
            if caps[1].len() <= max_depth && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
        }
        current.push_str(segment);
    }

    if chunks.is_empty() || !current.is_empty() {
        chunks.push(current);
    }

    debug!(chunks = chunks.len(), max_depth, "document split");
    chunks
}

/// Split one composite-report section into labeled chunks.
///
/// Labels are `main_part{source}_section{section}_{run_stamp}.md`, unique
/// within a run and distinct across runs over identical input.
pub fn composite_chunks(section_text: &str, source_index: usize, run_stamp: &str) -> Vec<Chunk> {
    split_at_depth(section_text, SECTION_HEADING_DEPTH)
        .into_iter()
        .enumerate()
        .map(|(i, content)| Chunk {
            label: composite_label(source_index, i, run_stamp),
            content,
        })
        .collect()
}

/// Label for one composite chunk (1-based indexes).
pub fn composite_label(source_index: usize, section_index: usize, run_stamp: &str) -> String {
    format!(
        "main_part{}_section{}_{run_stamp}.md",
        source_index + 1,
        section_index + 1
    )
}

/// Build the per-record detail chunk for one order.
///
/// The label depends only on the order id, so re-publishing the same order
/// later overwrites the existing KB entry instead of duplicating it.
pub fn order_chunk(heading: &str, order: &Order) -> Chunk {
    Chunk {
        label: order_label(order.id),
        content: crate::assembler::order_block(heading, order),
    }
}

/// Stable label for an order detail chunk.
pub fn order_label(order_id: i64) -> String {
    format!("woo_order_{order_id}.md")
}
