//! Highlighting Strategies
//!
//! - Single document: [`Highlighter`](crate::passage::Highlighter) on the
//!   calling thread
//! - Batch: documents highlighted in parallel on the Rayon pool

pub mod parallel;

pub use parallel::{filter_parallel, highlight_batch, highlight_document, Document, DocumentSource};
