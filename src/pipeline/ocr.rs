//! OCR: page image → single-page PDF with an invisible text layer.
//!
//! The default engine shells out to Tesseract's `pdf` renderer, which embeds
//! the original bitmap unchanged and lays recognised words over it in text
//! render mode 3 (invisible), so the page looks exactly like the scan but is
//! searchable and selectable.

use crate::config::OcrConfig;
use crate::pipeline::command::{probe, run_tool, ToolFailure};
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Single-page searchable PDF produced from one [`PageImage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOcrPdf {
    /// Same 1-indexed number as the source image.
    pub index: usize,
    pub path: PathBuf,
}

/// Recognises text on one page image and writes a searchable PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Tool name used in logs and timeout errors.
    fn name(&self) -> &'static str;

    /// OCR `page`, writing the PDF into `out_dir`.
    async fn recognize(&self, page: &PageImage, out_dir: &Path) -> Result<PageOcrPdf, ToolFailure>;
}

/// Tesseract command-line engine.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    pub program: PathBuf,
    pub language: String,
    /// Resolution the page was rendered at; keeps the PDF page at the right
    /// physical size.
    pub dpi: u32,
    pub timeout: Duration,
}

impl TesseractEngine {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            program: config.tesseract_path.clone(),
            language: config.language.clone(),
            dpi: config.dpi,
            timeout: Duration::from_secs(config.tool_timeout_secs),
        }
    }

    /// `tesseract --version`, first line.
    pub async fn version(&self) -> Result<String, ToolFailure> {
        probe(&self.program, "--version", self.timeout).await
    }
}

/// `page-0003.png` → `page-0003-ocr` (Tesseract appends `.pdf`).
fn output_base(page: &PageImage, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("page-{:04}-ocr", page.index))
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, page: &PageImage, out_dir: &Path) -> Result<PageOcrPdf, ToolFailure> {
        let base = output_base(page, out_dir);
        let dpi = self.dpi.to_string();

        run_tool(
            &self.program,
            &[
                page.path.as_os_str(),
                base.as_os_str(),
                OsStr::new("-l"),
                OsStr::new(&self.language),
                OsStr::new("--dpi"),
                OsStr::new(&dpi),
                OsStr::new("pdf"),
            ],
            self.timeout,
        )
        .await?;

        let path = base.with_extension("pdf");
        if !path.is_file() {
            return Err(ToolFailure::Backend(format!(
                "tesseract reported success but wrote no {}",
                path.display()
            )));
        }

        debug!("OCR page {} → {}", page.index, path.display());
        Ok(PageOcrPdf {
            index: page.index,
            path,
        })
    }
}
