//! Output module for generated text and run statistics
//!
//! This module handles:
//! - Writing snippets to the output sink with a byte target
//! - Recording per-run statistics
//! - Reporting the run summary

pub mod stats;
mod writer;

pub use stats::{log_summary, RunSummary, StopReason};
pub use writer::{SnippetWriter, SEPARATOR};
