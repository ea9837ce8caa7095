//! Pipeline orchestration for reportcast.
//!
//! This crate wires the connectors, normalizer, assembler, splitter,
//! publisher, and run-history storage into the single `run` pipeline.

pub mod pipeline;

pub use pipeline::{
    ProgressReporter, RunConfig, RunSummary, SilentProgress, run_report, run_stamp,
};
