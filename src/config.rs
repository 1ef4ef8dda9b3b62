//! Configuration types for the OCR batch pipeline.
//!
//! All behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. One struct keeps every knob shareable across tasks
//! and printable in debug logs.

use crate::error::OcrPdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for an OCR batch.
///
/// Built via [`OcrConfig::builder()`] or using [`OcrConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ocrpdf::{OcrConfig, RasterBackend};
///
/// let config = OcrConfig::builder()
///     .dpi(200)
///     .language("eng+deu")
///     .raster_backend(RasterBackend::Pdftoppm)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Rasterisation DPI. Range: 72–600. Default: 150.
    ///
    /// Also passed to Tesseract so the text layer lines up with the page
    /// image at its physical size.
    pub dpi: u32,

    /// Tesseract language pack(s), e.g. "eng" or "eng+fra". Default: "eng".
    pub language: String,

    /// Which tool turns PDF pages into images. Default: [`RasterBackend::Pdfium`].
    pub raster_backend: RasterBackend,

    /// Tesseract executable. Default: "tesseract" (resolved via `PATH`).
    pub tesseract_path: PathBuf,

    /// Poppler `pdftoppm` executable. Default: "pdftoppm".
    pub pdftoppm_path: PathBuf,

    /// Explicit pdfium shared library. If None, `PDFIUM_LIB_PATH` is consulted,
    /// then the working directory, then the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Upper bound on any single external invocation, in seconds. Default: 300.
    ///
    /// Expiry kills the child process and fails only the current document.
    pub tool_timeout_secs: u64,

    /// Documents processed at once. Default: 1 (strictly sequential).
    ///
    /// Results are always reported in upload order regardless of this value.
    pub concurrency: usize,

    /// Parent directory for per-document workspaces. Default: system temp dir.
    pub work_dir: Option<PathBuf>,

    /// Build `All_OCR_PDFs.pdf` when at least two documents succeed. Default: true.
    pub combine: bool,

    /// Largest accepted upload in bytes. Default: 256 MiB.
    pub max_input_bytes: u64,

    /// Largest accepted page count per document. Default: 2000.
    pub max_pages: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            language: "eng".to_string(),
            raster_backend: RasterBackend::default(),
            tesseract_path: PathBuf::from("tesseract"),
            pdftoppm_path: PathBuf::from("pdftoppm"),
            pdfium_lib_path: None,
            tool_timeout_secs: 300,
            concurrency: 1,
            work_dir: None,
            combine: true,
            max_input_bytes: 256 * 1024 * 1024,
            max_pages: 2000,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("dpi", &self.dpi)
            .field("language", &self.language)
            .field("raster_backend", &self.raster_backend)
            .field("tesseract_path", &self.tesseract_path)
            .field("pdftoppm_path", &self.pdftoppm_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("work_dir", &self.work_dir)
            .field("combine", &self.combine)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("max_pages", &self.max_pages)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory under which workspaces are created.
    pub fn work_root(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn raster_backend(mut self, backend: RasterBackend) -> Self {
        self.config.raster_backend = backend;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn pdftoppm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm_path = path.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn combine(mut self, v: bool) -> Self {
        self.config.combine = v;
        self
    }

    pub fn max_input_bytes(mut self, n: u64) -> Self {
        self.config.max_input_bytes = n;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrPdfError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(OcrPdfError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.language.trim().is_empty() {
            return Err(OcrPdfError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.max_input_bytes == 0 || c.max_pages == 0 {
            return Err(OcrPdfError::InvalidConfig(
                "Input limits must be ≥ 1".into(),
            ));
        }
        if let Some(ref dir) = c.work_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(OcrPdfError::InvalidConfig(format!(
                    "Work dir {} is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Tool used to rasterise PDF pages.
///
/// Image uploads never touch either backend; they are normalised in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RasterBackend {
    /// pdfium via `pdfium-render`; no external process. (default)
    #[default]
    Pdfium,
    /// Poppler's `pdftoppm` command-line tool.
    Pdftoppm,
}

impl std::str::FromStr for RasterBackend {
    type Err = OcrPdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdfium" => Ok(RasterBackend::Pdfium),
            "pdftoppm" | "poppler" => Ok(RasterBackend::Pdftoppm),
            other => Err(OcrPdfError::InvalidConfig(format!(
                "Unknown raster backend '{other}' (expected pdfium or pdftoppm)"
            ))),
        }
    }
}
