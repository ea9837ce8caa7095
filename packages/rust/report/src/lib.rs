//! Report assembly and chunk splitting.
//!
//! This crate turns connector results into the composite report document,
//! renders the order detail document, and partitions rendered markdown into
//! independently publishable chunks with deterministic labels.

pub mod assembler;
pub mod splitter;

pub use assembler::{
    composite_title, detail_document, order_block, orders_summary_section, text_section,
};
pub use splitter::{
    composite_chunks, composite_label, order_chunk, order_label, split_at_depth,
};
