//! Progress-callback trait for per-file extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the batch processes each uploaded file. The CLI renders them as
//! an `indicatif` bar; a GUI shell can forward them to its own widget.
//!
//! # Example
//!
//! ```rust
//! use appropriation_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, completed: usize, total: usize, file: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{file}: {completed}/{total}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch as it processes each uploaded file.
///
/// Files are processed one at a time in upload order, so events arrive in
/// order. All methods have default no-op implementations so callers only
/// override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first file is read.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is decoded and sent to the model.
    ///
    /// `index` is 1-based.
    fn on_file_start(&self, index: usize, total_files: usize, file: &str) {
        let _ = (index, total_files, file);
    }

    /// Called when a document within a file yields a record.
    ///
    /// A file produces several documents only with
    /// [`crate::config::PdfPageMode::EachPage`].
    fn on_document_complete(&self, label: &str) {
        let _ = label;
    }

    /// Called when a document within a file fails.
    fn on_document_error(&self, label: &str, error: &str) {
        let _ = (label, error);
    }

    /// Called after every file, successful or not.
    ///
    /// `completed / total_files` is the batch's progress fraction; see
    /// [`progress_fraction`].
    fn on_file_complete(&self, completed: usize, total_files: usize, file: &str) {
        let _ = (completed, total_files, file);
    }

    /// Called once after all files have been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

/// Files completed divided by total files, in `0.0..=1.0`.
///
/// An empty batch counts as complete.
pub fn progress_fraction(completed: usize, total: usize) -> f32 {
    if total == 0 {
        return 1.0;
    }
    (completed.min(total) as f32) / (total as f32)
}
