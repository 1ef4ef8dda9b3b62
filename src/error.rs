//! Error types for the edgequake-ocrpdf library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`OcrPdfError`] — **Fatal**: the batch cannot start at all (bad config,
//!   missing input file, pdfium library not loadable). Returned as
//!   `Err(OcrPdfError)` from the top-level entry points.
//!
//! * [`DocumentError`] — **Per-document**: one upload could not be turned
//!   into a searchable PDF (corrupt file, OCR engine crash, tool timeout).
//!   Stored inside [`crate::output::DocumentOutcome::Failed`]; the rest of the
//!   batch carries on.
//!
//! * [`MergeError`] — returned by [`crate::pipeline::merge::merge_pdfs`] to
//!   whoever asked for the merge. Inside a document it becomes
//!   [`DocumentError::Merge`]; for the combined artifact it is recorded on the
//!   [`crate::output::BatchResult`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocrpdf library.
#[derive(Debug, Error)]
pub enum OcrPdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Tooling errors ────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the binary,\n\
or switch to the poppler backend with --backend pdftoppm.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single uploaded document.
///
/// The document is excluded from the batch result; every other document is
/// processed as usual.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The file extension is not one of pdf, png, jpg, jpeg.
    #[error("'{name}': unsupported file type (expected .pdf, .png, .jpg or .jpeg)")]
    UnsupportedFormat { name: String },

    /// The upload exceeds `max_input_bytes`.
    #[error("'{name}': {size} bytes exceeds the {limit}-byte input limit")]
    InputTooLarge { name: String, size: u64, limit: u64 },

    /// The rasteriser produced more pages than `max_pages`.
    #[error("'{name}': {pages} pages exceeds the {limit}-page limit")]
    TooManyPages {
        name: String,
        pages: usize,
        limit: usize,
    },

    /// The document could not be turned into page images.
    #[error("'{name}': rasterisation failed: {detail}")]
    RasterizationFailed { name: String, detail: String },

    /// The OCR engine failed on one page.
    #[error("'{name}': OCR failed on page {page}: {detail}")]
    RecognitionFailed {
        name: String,
        page: usize,
        detail: String,
    },

    /// An external tool did not finish within `tool_timeout_secs`.
    #[error("'{name}': {tool} timed out after {secs}s")]
    ToolTimeout {
        name: String,
        tool: String,
        secs: u64,
    },

    /// Page PDFs could not be merged into the document output.
    #[error("'{name}': {source}")]
    Merge {
        name: String,
        #[source]
        source: MergeError,
    },

    /// The per-document working directory could not be created or written.
    #[error("'{name}': workspace I/O failed: {detail}")]
    Workspace { name: String, detail: String },
}

impl DocumentError {
    /// Short machine-friendly label for logs and JSON summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::UnsupportedFormat { .. } => "unsupported_format",
            DocumentError::InputTooLarge { .. } => "input_too_large",
            DocumentError::TooManyPages { .. } => "too_many_pages",
            DocumentError::RasterizationFailed { .. } => "rasterization_failed",
            DocumentError::RecognitionFailed { .. } => "recognition_failed",
            DocumentError::ToolTimeout { .. } => "tool_timeout",
            DocumentError::Merge { .. } => "merge_failed",
            DocumentError::Workspace { .. } => "workspace_io",
        }
    }
}

/// Failure to concatenate PDF streams.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum MergeError {
    /// Merge called with zero inputs.
    #[error("merge failed: nothing to merge")]
    Empty,

    /// One input could not be parsed as a PDF.
    #[error("merge failed: input #{index} is not a readable PDF: {detail}")]
    Unreadable { index: usize, detail: String },

    /// An input parsed, but its page tree is missing or broken.
    #[error("merge failed: input #{index} has no usable page tree")]
    NoPageTree { index: usize },

    /// Serialising the merged document failed.
    #[error("merge failed: could not write merged PDF: {0}")]
    Write(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_failed_display() {
        let e = DocumentError::RecognitionFailed {
            name: "scan.pdf".into(),
            page: 3,
            detail: "exit status 1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.pdf"), "got: {msg}");
        assert!(msg.contains("page 3"), "got: {msg}");
        assert_eq!(e.kind(), "recognition_failed");
    }

    #[test]
    fn tool_timeout_display() {
        let e = DocumentError::ToolTimeout {
            name: "big.pdf".into(),
            tool: "tesseract".into(),
            secs: 300,
        };
        assert!(e.to_string().contains("300s"));
        assert!(e.to_string().contains("tesseract"));
    }

    #[test]
    fn merge_error_wraps_into_document_error() {
        let e = DocumentError::Merge {
            name: "a.pdf".into(),
            source: MergeError::Empty,
        };
        assert!(e.to_string().contains("nothing to merge"));
        assert_eq!(e.kind(), "merge_failed");
    }

    #[test]
    fn document_error_serialises() {
        let e = DocumentError::InputTooLarge {
            name: "huge.pdf".into(),
            size: 10,
            limit: 5,
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("InputTooLarge"));
    }
}
