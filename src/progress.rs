//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to receive events as
//! the batch works through its uploads.
//!
//! `completed` counts every document that has finished, whatever the outcome,
//! so `completed / total` is always a valid progress fraction.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocrpdf::{BatchProgressCallback, OcrConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Percent {
//!     last: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for Percent {
//!     fn on_document_complete(&self, completed: usize, total: usize, _name: &str, _pages: usize) {
//!         self.last.store(completed * 100 / total, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(Arc::new(Percent { last: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for one batch are delivered from a single
/// task, in upload order.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first document.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a document enters the pipeline.
    ///
    /// # Arguments
    /// * `index` — 1-indexed upload position
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document produced its searchable PDF.
    fn on_document_complete(&self, completed: usize, total: usize, name: &str, pages: usize) {
        let _ = (completed, total, name, pages);
    }

    /// Called when a document was already OCR'd and left alone.
    fn on_document_skipped(&self, completed: usize, total: usize, name: &str) {
        let _ = (completed, total, name);
    }

    /// Called when a document failed and was excluded from the result.
    fn on_document_error(&self, completed: usize, total: usize, name: &str, error: &str) {
        let _ = (completed, total, name, error);
    }

    /// Called once after every document has been attempted and the combined
    /// artifact (if any) has been built.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
