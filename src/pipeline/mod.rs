//! Pipeline stages for turning one upload into a searchable PDF.
//!
//! Each submodule implements exactly one step, so each is testable on its own
//! and the external tools can be swapped without touching the orchestration.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ workspace ──▶ render ──▶ ocr ──▶ merge
//! (bytes)   (temp dir)   (PNGs)    (1-page PDFs) (one PDF)
//! ```
//!
//! 1. [`input`]     — classify the upload and derive its output name
//! 2. [`workspace`] — uniquely named temp dir, removed on every exit path
//! 3. [`render`]    — PDF pages or a single image → RGB PNG files
//! 4. [`ocr`]       — each PNG → single-page PDF with an invisible text layer
//! 5. [`merge`]     — concatenate page PDFs, preserving order
//!
//! [`assemble`] drives 2–5 for one document; [`command`] runs external tools
//! under a timeout.

pub mod assemble;
pub mod command;
pub mod input;
pub mod merge;
pub mod ocr;
pub mod render;
pub mod workspace;
