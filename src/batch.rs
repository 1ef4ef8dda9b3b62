//! Batch entry points: many uploads in, searchable PDFs + combined PDF out.
//!
//! [`BatchPipeline::run`] waits for every document and returns a
//! [`BatchResult`]. Use [`crate::stream::run_stream`] instead to receive each
//! document's outcome as soon as it is ready.
//!
//! A failing document never stops the batch: it is logged, reported to the
//! progress callback and recorded as [`DocumentOutcome::Failed`].

use crate::config::{OcrConfig, RasterBackend};
use crate::error::{MergeError, OcrPdfError};
use crate::output::{BatchResult, BatchStats, CombinedResult, DocumentOutcome, OcrResult, COMBINED_FILE_NAME};
use crate::pipeline::assemble::PageAssembler;
use crate::pipeline::command::probe;
use crate::pipeline::input::{self, InputDocument};
use crate::pipeline::merge::merge_pdfs;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::{bind_pdfium, Rasterizer};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Runs the page assembler over a batch of uploads.
pub struct BatchPipeline {
    assembler: PageAssembler,
}

impl BatchPipeline {
    /// Pipeline using the rasteriser and OCR engine selected in `config`.
    pub fn new(config: OcrConfig) -> Self {
        Self {
            assembler: PageAssembler::new(config),
        }
    }

    /// Pipeline with caller-supplied adapters (tests, alternative engines).
    pub fn with_adapters(
        config: OcrConfig,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            assembler: PageAssembler::with_adapters(config, rasterizer, ocr),
        }
    }

    pub fn config(&self) -> &OcrConfig {
        self.assembler.config()
    }

    /// Process one upload. Never fails: errors become [`DocumentOutcome::Failed`].
    ///
    /// `index` is the 1-indexed upload position.
    pub async fn process(&self, doc: &InputDocument, index: usize) -> DocumentOutcome {
        match self.assembler.assemble(doc, index).await {
            Ok(Some(result)) => DocumentOutcome::Completed(result),
            Ok(None) => DocumentOutcome::Skipped {
                index,
                name: doc.name().to_string(),
            },
            Err(error) => {
                warn!("Document '{}' failed [{}]: {}", doc.name(), error.kind(), error);
                DocumentOutcome::Failed {
                    index,
                    name: doc.name().to_string(),
                    error,
                }
            }
        }
    }

    /// Process every document, then build the combined PDF.
    ///
    /// Outcomes are reported in upload order whatever `concurrency` is.
    pub async fn run(&self, documents: Vec<InputDocument>) -> BatchResult {
        let start = Instant::now();
        let total = documents.len();
        let callback = self.config().progress_callback.clone();
        info!(
            "Starting batch: {} documents, concurrency {}",
            total,
            self.config().concurrency
        );
        if let Some(ref cb) = callback {
            cb.on_batch_start(total);
        }

        let mut outcomes: Vec<DocumentOutcome> = stream::iter(documents.into_iter().enumerate())
            .map(|(i, doc)| {
                let index = i + 1;
                if let Some(ref cb) = callback {
                    cb.on_document_start(index, total, doc.name());
                }
                async move { self.process(&doc, index).await }
            })
            .buffered(self.config().concurrency.max(1))
            .enumerate()
            .map(|(i, outcome)| {
                report_outcome(callback.as_ref(), i + 1, total, &outcome);
                outcome
            })
            .collect()
            .await;
        dedupe_output_names(&mut outcomes);

        let results = completed_results(&outcomes);
        let (results, combined, combined_error) = if self.config().combine && results.len() >= 2 {
            match tokio::task::spawn_blocking(move || {
                let combined = combine(&results);
                (results, combined)
            })
            .await
            {
                Ok((results, Ok(c))) => (results, Some(c), None),
                Ok((results, Err(e))) => {
                    warn!("Combining outputs failed: {}", e);
                    (results, None, Some(e))
                }
                Err(e) => {
                    warn!("Combine task failed: {}", e);
                    (
                        completed_results(&outcomes),
                        None,
                        Some(MergeError::Write(e.to_string())),
                    )
                }
            }
        } else {
            (results, None, None)
        };

        let stats = BatchStats {
            total_documents: total,
            succeeded: results.len(),
            skipped: outcomes
                .iter()
                .filter(|o| matches!(o, DocumentOutcome::Skipped { .. }))
                .count(),
            failed: outcomes
                .iter()
                .filter(|o| matches!(o, DocumentOutcome::Failed { .. }))
                .count(),
            total_pages: results.iter().map(|r| r.page_count).sum(),
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Batch complete: {}/{} succeeded, {} skipped, {} failed, {}ms",
            stats.succeeded, total, stats.skipped, stats.failed, stats.total_duration_ms
        );
        if let Some(ref cb) = callback {
            cb.on_batch_complete(total, stats.succeeded);
        }

        BatchResult {
            results,
            combined,
            combined_error,
            outcomes,
            stats,
        }
    }
}

fn completed_results(outcomes: &[DocumentOutcome]) -> Vec<OcrResult> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            DocumentOutcome::Completed(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

/// Give every completed document a distinct output file name, in upload order.
fn dedupe_output_names(outcomes: &mut [DocumentOutcome]) {
    let mut taken = HashSet::new();
    for outcome in outcomes.iter_mut() {
        claim_output_name(&mut taken, outcome);
    }
}

/// Rename a completed result whose file name is already in `taken`.
pub(crate) fn claim_output_name(taken: &mut HashSet<String>, outcome: &mut DocumentOutcome) {
    if let DocumentOutcome::Completed(r) = outcome {
        let unique = unique_file_name(taken, &r.file_name);
        if unique != r.file_name {
            warn!(
                "'{}' would overwrite {}; writing {} instead",
                r.source_name, r.file_name, unique
            );
            r.file_name = unique;
        }
    }
}

/// Reserve `name` in `taken`, suffixing `-2`, `-3`, … before the extension
/// when it is already used.
fn unique_file_name(taken: &mut HashSet<String>, name: &str) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|s| s.to_str());
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Forward one finished document to the progress callback.
pub(crate) fn report_outcome(
    callback: Option<&ProgressCallback>,
    completed: usize,
    total: usize,
    outcome: &DocumentOutcome,
) {
    let Some(cb) = callback else {
        return;
    };
    match outcome {
        DocumentOutcome::Completed(r) => {
            cb.on_document_complete(completed, total, &r.source_name, r.page_count)
        }
        DocumentOutcome::Skipped { name, .. } => cb.on_document_skipped(completed, total, name),
        DocumentOutcome::Failed { name, error, .. } => {
            cb.on_document_error(completed, total, name, &error.to_string())
        }
    }
}

/// Merge per-document outputs, in the given order, into `All_OCR_PDFs.pdf`.
pub fn combine(results: &[OcrResult]) -> Result<CombinedResult, MergeError> {
    let streams: Vec<&[u8]> = results.iter().map(|r| r.bytes.as_slice()).collect();
    let bytes = merge_pdfs(&streams)?;
    Ok(CombinedResult {
        file_name: COMBINED_FILE_NAME.to_string(),
        sources: results.iter().map(|r| r.file_name.clone()).collect(),
        page_count: results.iter().map(|r| r.page_count).sum(),
        bytes,
    })
}

/// Build the combined PDF on the blocking pool.
///
/// The caller may await the handle or abort it; nothing else holds a
/// reference to the task.
pub fn spawn_combine(results: Vec<OcrResult>) -> JoinHandle<Result<CombinedResult, MergeError>> {
    tokio::task::spawn_blocking(move || combine(&results))
}

/// Resolve paths/URLs and run them as one batch.
///
/// # Errors
/// Only fatal input errors (missing file, failed download). Per-document
/// processing failures are reported inside the [`BatchResult`].
pub async fn run_batch<S: AsRef<str>>(
    inputs: &[S],
    config: &OcrConfig,
) -> Result<BatchResult, OcrPdfError> {
    let mut documents = Vec::with_capacity(inputs.len());
    for input in inputs {
        documents.push(input::resolve_input(input.as_ref(), config.download_timeout_secs).await?);
    }
    Ok(BatchPipeline::new(config.clone()).run(documents).await)
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync<S: AsRef<str>>(
    inputs: &[S],
    config: &OcrConfig,
) -> Result<BatchResult, OcrPdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrPdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(inputs, config))
}

/// Write every result (and the combined PDF, if any) into `dir`.
///
/// Uses atomic writes (temp file + rename) so a reader never sees a partial
/// PDF. Results sharing a file name get `-2`, `-3`, … suffixes instead of
/// overwriting each other. Returns the written paths in upload order,
/// combined file last.
pub async fn write_outputs(batch: &BatchResult, dir: &Path) -> Result<Vec<PathBuf>, OcrPdfError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| OcrPdfError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let files = batch
        .results
        .iter()
        .map(|r| (r.file_name.as_str(), r.bytes.as_slice()))
        .chain(
            batch
                .combined
                .iter()
                .map(|c| (c.file_name.as_str(), c.bytes.as_slice())),
        );

    let mut taken = HashSet::new();
    let mut written = Vec::new();
    for (name, bytes) in files {
        let path = dir.join(unique_file_name(&mut taken, name));
        write_atomic(&path, bytes).await?;
        written.push(path);
    }
    Ok(written)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), OcrPdfError> {
    let wrap = |e: std::io::Error| OcrPdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(wrap)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(wrap)
}

/// Availability of one external dependency.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCheck {
    pub tool: String,
    pub available: bool,
    /// Version line on success, error message otherwise.
    pub detail: String,
}

/// Probe the OCR engine and the configured rasteriser.
pub async fn check_tools(config: &OcrConfig) -> Vec<ToolCheck> {
    let timeout = Duration::from_secs(config.tool_timeout_secs.min(30));
    let mut checks = Vec::new();

    let tesseract = probe(&config.tesseract_path, "--version", timeout).await;
    checks.push(tool_check("tesseract", tesseract.map_err(|e| e.to_string())));

    match config.raster_backend {
        RasterBackend::Pdfium => {
            let lib = config.pdfium_lib_path.clone();
            let bound = tokio::task::spawn_blocking(move || {
                bind_pdfium(lib.as_deref())
                    .map(|_| "library bound".to_string())
                    .map_err(|e| e.to_string())
            })
            .await
            .unwrap_or_else(|e| Err(e.to_string()));
            checks.push(tool_check("pdfium", bound));
        }
        RasterBackend::Pdftoppm => {
            let pdftoppm = probe(&config.pdftoppm_path, "-v", timeout).await;
            checks.push(tool_check("pdftoppm", pdftoppm.map_err(|e| e.to_string())));
        }
    }
    checks
}

fn tool_check(tool: &str, result: Result<String, String>) -> ToolCheck {
    match result {
        Ok(version) => ToolCheck {
            tool: tool.to_string(),
            available: true,
            detail: if version.is_empty() {
                "available".to_string()
            } else {
                version
            },
        },
        Err(detail) => ToolCheck {
            tool: tool.to_string(),
            available: false,
            detail,
        },
    }
}
