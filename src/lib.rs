//! # edgequake-ocrpdf
//!
//! Turn scanned PDFs and photos into text-searchable PDFs.
//!
//! Each page is rasterised, run through Tesseract, and written back as a PDF
//! page that shows the original image with an invisible, selectable text
//! layer on top. A batch of uploads additionally yields one combined PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (pdf / png / jpg)
//!  │
//!  ├─ 1. Input      classify by extension, derive `<base>-ocr.pdf`
//!  ├─ 2. Workspace  unique temp dir per document, always removed
//!  ├─ 3. Render     pdfium or pdftoppm → page-0001.png …  (images: RGB PNG)
//!  ├─ 4. OCR        tesseract <png> … pdf  → one searchable PDF per page
//!  ├─ 5. Merge      page PDFs → document PDF (lopdf, order preserved)
//!  └─ 6. Combine    ≥2 documents → All_OCR_PDFs.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocrpdf::{run_batch, write_outputs, OcrConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OcrConfig::builder().language("eng").build()?;
//!     let batch = run_batch(&["invoice.pdf", "photo.jpg"], &config).await?;
//!     for (name, err) in batch.failures() {
//!         eprintln!("{name}: {err}");
//!     }
//!     write_outputs(&batch, Path::new("out")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrpdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocrpdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Needed for |
//! |------|------------|
//! | `tesseract` (with language data) | every document |
//! | pdfium shared library | PDFs, default backend |
//! | `pdftoppm` (poppler) | PDFs with `RasterBackend::Pdftoppm` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    check_tools, combine, run_batch, run_batch_sync, spawn_combine, write_outputs, BatchPipeline,
    ToolCheck,
};
pub use config::{OcrConfig, OcrConfigBuilder, RasterBackend};
pub use error::{DocumentError, MergeError, OcrPdfError};
pub use output::{
    BatchResult, BatchStats, CombinedResult, DocumentOutcome, OcrResult, COMBINED_FILE_NAME,
};
pub use pipeline::assemble::PageAssembler;
pub use pipeline::command::{run_blocking, CancelFlag, ToolFailure};
pub use pipeline::input::{resolve_input, DocumentKind, InputDocument};
pub use pipeline::merge::{merge_pdfs, page_count};
pub use pipeline::ocr::{OcrEngine, PageOcrPdf, TesseractEngine};
pub use pipeline::render::{PageImage, PdfiumRasterizer, PdftoppmRasterizer, Rasterizer};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{run_stream, OutcomeStream};
