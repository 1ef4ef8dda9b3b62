//! Result types handed back to callers.
//!
//! PDF bytes live in memory so nothing returned here points into a workspace
//! that has already been deleted.

use crate::error::{DocumentError, MergeError};
use serde::{Deserialize, Serialize};

/// File name of the merged "download all" artifact.
pub const COMBINED_FILE_NAME: &str = "All_OCR_PDFs.pdf";

/// Searchable PDF produced for one uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Output file name, `<base>-ocr.pdf`.
    pub file_name: String,
    /// Display name of the upload this came from.
    pub source_name: String,
    /// 1-indexed upload position.
    pub source_index: usize,
    /// Pages in the output (= pages the rasteriser produced).
    pub page_count: usize,
    /// Wall-clock processing time.
    pub duration_ms: u64,
    /// The PDF itself.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// The merged artifact across all successful documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedResult {
    /// Always [`COMBINED_FILE_NAME`].
    pub file_name: String,
    /// Output file names in merge order.
    pub sources: Vec<String>,
    pub page_count: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// What happened to one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Completed(OcrResult),
    /// The upload already carried the `-ocr` marker.
    Skipped { index: usize, name: String },
    Failed {
        index: usize,
        name: String,
        error: DocumentError,
    },
}

impl DocumentOutcome {
    /// Display name of the upload.
    pub fn name(&self) -> &str {
        match self {
            DocumentOutcome::Completed(r) => &r.source_name,
            DocumentOutcome::Skipped { name, .. } | DocumentOutcome::Failed { name, .. } => name,
        }
    }

    /// 1-indexed upload position.
    pub fn index(&self) -> usize {
        match self {
            DocumentOutcome::Completed(r) => r.source_index,
            DocumentOutcome::Skipped { index, .. } | DocumentOutcome::Failed { index, .. } => {
                *index
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, DocumentOutcome::Completed(_))
    }
}

/// Aggregate counters for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_pages: usize,
    pub total_duration_ms: u64,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// Successful documents, in upload order. Failures are omitted.
    pub results: Vec<OcrResult>,
    /// Present iff at least two documents succeeded and combining is enabled.
    pub combined: Option<CombinedResult>,
    /// Set when the combine step itself failed.
    pub combined_error: Option<MergeError>,
    /// One entry per upload, in upload order.
    pub outcomes: Vec<DocumentOutcome>,
    pub stats: BatchStats,
}

impl BatchResult {
    /// Failed outcomes only.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &DocumentError)> {
        self.outcomes.iter().filter_map(|o| match o {
            DocumentOutcome::Failed { name, error, .. } => Some((name.as_str(), error)),
            _ => None,
        })
    }
}
