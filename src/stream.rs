//! Streaming batch API: emit each document's outcome as it completes.
//!
//! [`crate::batch::BatchPipeline::run`] returns only after every document is
//! done and the combined PDF is built. [`run_stream`] yields a
//! [`DocumentOutcome`] per upload as soon as it is ready, so a caller can
//! offer each download while the rest of the batch is still running.
//!
//! Completed results get the same distinct file names as in the eager API.
//!
//! Outcomes always arrive in upload order. With `concurrency > 1` later
//! documents may already be finished while an earlier one is still running;
//! they are held back until it completes.
//!
//! No combined PDF is built here. Collect the completed results and hand them
//! to [`crate::batch::spawn_combine`] if you need one.

use crate::batch::{claim_output_name, report_outcome, BatchPipeline};
use crate::output::DocumentOutcome;
use crate::pipeline::input::InputDocument;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Process `documents`, yielding one outcome per upload in upload order.
///
/// Progress callbacks configured on the pipeline fire for every document,
/// exactly as in the eager API; batch start/complete events do not.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ocrpdf::{run_stream, BatchPipeline, DocumentOutcome, InputDocument, OcrConfig};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Arc::new(BatchPipeline::new(OcrConfig::default()));
/// let docs = vec![InputDocument::new("scan.pdf", std::fs::read("scan.pdf")?)];
/// let mut outcomes = run_stream(pipeline, docs);
/// while let Some(outcome) = outcomes.next().await {
///     match outcome {
///         DocumentOutcome::Completed(r) => println!("{}: {} pages", r.file_name, r.page_count),
///         DocumentOutcome::Skipped { name, .. } => println!("{name}: already searchable"),
///         DocumentOutcome::Failed { error, .. } => eprintln!("{error}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn run_stream(pipeline: Arc<BatchPipeline>, documents: Vec<InputDocument>) -> OutcomeStream {
    let total = documents.len();
    let concurrency = pipeline.config().concurrency.max(1);
    let callback = pipeline.config().progress_callback.clone();
    info!("Starting streaming batch: {} documents", total);

    let start_cb = callback.clone();
    let mut taken = HashSet::new();
    let s = stream::iter(documents.into_iter().enumerate())
        .map(move |(i, doc)| {
            let index = i + 1;
            if let Some(ref cb) = start_cb {
                cb.on_document_start(index, total, doc.name());
            }
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.process(&doc, index).await }
        })
        .buffered(concurrency)
        .enumerate()
        .map(move |(i, mut outcome)| {
            claim_output_name(&mut taken, &mut outcome);
            report_outcome(callback.as_ref(), i + 1, total, &outcome);
            outcome
        });

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrConfig;

    #[test]
    fn stream_yields_one_outcome_per_upload_in_order() {
        let work = tempfile::tempdir().unwrap();
        let config = OcrConfig::builder().work_dir(work.path()).build().unwrap();
        let pipeline = Arc::new(BatchPipeline::new(config));

        // Neither document reaches an external tool.
        let docs = vec![
            InputDocument::new("a-ocr.pdf", b"%PDF".to_vec()),
            InputDocument::new("b.docx", b"PK".to_vec()),
            InputDocument::new("c-ocr.png", b"png".to_vec()),
        ];

        let outcomes: Vec<DocumentOutcome> =
            tokio_test::block_on(run_stream(pipeline, docs).collect());

        let names: Vec<&str> = outcomes.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["a-ocr.pdf", "b.docx", "c-ocr.png"]);
        assert!(matches!(outcomes[0], DocumentOutcome::Skipped { index: 1, .. }));
        assert!(matches!(outcomes[1], DocumentOutcome::Failed { index: 2, .. }));
        assert!(matches!(outcomes[2], DocumentOutcome::Skipped { index: 3, .. }));
    }

    #[test]
    fn empty_batch_yields_nothing() {
        let pipeline = Arc::new(BatchPipeline::new(OcrConfig::default()));
        let outcomes: Vec<DocumentOutcome> =
            tokio_test::block_on(run_stream(pipeline, Vec::new()).collect());
        assert!(outcomes.is_empty());
    }
}
