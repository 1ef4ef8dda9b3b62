//! Rasterisation: turn an upload into numbered RGB page images on disk.
//!
//! PDFs go through a [`Rasterizer`] backend; single images are decoded and
//! normalised in-process by [`normalize_image`] without touching any PDF tool.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. `tokio::task::spawn_blocking` keeps that work off
//! the async worker threads.

use crate::config::{OcrConfig, RasterBackend};
use crate::error::OcrPdfError;
use crate::pipeline::command::{run_blocking, run_tool, CancelFlag, ToolFailure};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One rasterised page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed page number.
    pub index: usize,
    /// PNG file inside the document's workspace.
    pub path: PathBuf,
}

/// Canonical file name for page `index`, e.g. `page-0007.png`.
pub fn page_image_name(index: usize) -> String {
    format!("page-{index:04}.png")
}

/// Converts a PDF into page images at a fixed DPI.
///
/// Implementations write one PNG per page into `out_dir` and return them in
/// page order, numbered from 1.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Tool name used in logs and timeout errors.
    fn name(&self) -> &'static str;

    async fn rasterize(
        &self,
        pdf: &Path,
        dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, ToolFailure>;
}

/// Build the rasteriser selected in `config`.
pub fn rasterizer_for(config: &OcrConfig) -> Arc<dyn Rasterizer> {
    let timeout = Duration::from_secs(config.tool_timeout_secs);
    match config.raster_backend {
        RasterBackend::Pdfium => Arc::new(PdfiumRasterizer {
            lib_path: config.pdfium_lib_path.clone(),
            timeout,
        }),
        RasterBackend::Pdftoppm => Arc::new(PdftoppmRasterizer {
            program: config.pdftoppm_path.clone(),
            timeout,
        }),
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Renders pages in-process through `pdfium-render`.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    pub lib_path: Option<PathBuf>,
    pub timeout: Duration,
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    async fn rasterize(
        &self,
        pdf: &Path,
        dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, ToolFailure> {
        let lib = self.lib_path.clone();
        let pdf = pdf.to_path_buf();
        let out = out_dir.to_path_buf();

        run_blocking(self.timeout, move |cancel| {
            render_pdf_blocking(lib.as_deref(), &pdf, dpi, &out, cancel)
        })
        .await
    }
}

/// Blocking implementation of pdfium rendering.
fn render_pdf_blocking(
    lib: Option<&Path>,
    pdf: &Path,
    dpi: u32,
    out_dir: &Path,
    cancel: &CancelFlag,
) -> Result<Vec<PageImage>, ToolFailure> {
    let pdfium = bind_pdfium(lib).map_err(|e| ToolFailure::Backend(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_file(pdf, None)
        .map_err(|e| ToolFailure::Backend(format!("cannot open PDF: {e:?}")))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let mut results = Vec::with_capacity(pages.len() as usize);
    for (i, page) in pages.iter().enumerate() {
        let index = i + 1;
        if cancel.is_cancelled() {
            return Err(ToolFailure::Backend(format!("cancelled before page {index}")));
        }
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ToolFailure::Backend(format!("page {index}: {e:?}")))?;

        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        let path = out_dir.join(page_image_name(index));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ToolFailure::Backend(format!("page {index}: {e}")))?;

        debug!(
            "Rendered page {} → {}x{} px",
            index,
            image.width(),
            image.height()
        );
        results.push(PageImage { index, path });
    }

    Ok(results)
}

/// Bind to a pdfium shared library.
///
/// Lookup order: `lib_path`, then `PDFIUM_LIB_PATH`, then the working
/// directory, then the system library path. A directory is expanded to the
/// platform library name inside it.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, OcrPdfError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            let path = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(&path)
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| OcrPdfError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

// ── pdftoppm ─────────────────────────────────────────────────────────────

/// Renders pages with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    pub program: PathBuf,
    pub timeout: Duration,
}

/// Output root handed to pdftoppm; it appends `-N.png` (zero-padded to the
/// width of the page count).
const PDFTOPPM_ROOT: &str = "raster";

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    async fn rasterize(
        &self,
        pdf: &Path,
        dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, ToolFailure> {
        let dpi = dpi.to_string();
        let root = out_dir.join(PDFTOPPM_ROOT);
        run_tool(
            &self.program,
            &[
                OsStr::new("-r"),
                OsStr::new(&dpi),
                OsStr::new("-png"),
                pdf.as_os_str(),
                root.as_os_str(),
            ],
            self.timeout,
        )
        .await?;

        let numbered = collect_numbered_pages(out_dir, PDFTOPPM_ROOT)
            .map_err(|e| ToolFailure::Backend(format!("reading pdftoppm output: {e}")))?;

        let mut pages = Vec::with_capacity(numbered.len());
        for (i, (_, produced)) in numbered.into_iter().enumerate() {
            let index = i + 1;
            let path = out_dir.join(page_image_name(index));
            tokio::fs::rename(&produced, &path)
                .await
                .map_err(|e| ToolFailure::Backend(format!("page {index}: {e}")))?;
            pages.push(PageImage { index, path });
        }
        Ok(pages)
    }
}

/// Find `<root>-<N>.png` files in `dir`, sorted by N numerically.
fn collect_numbered_pages(dir: &Path, root: &str) -> std::io::Result<Vec<(usize, PathBuf)>> {
    let prefix = format!("{root}-");
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let number = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(n) = number {
            found.push((n, path));
        }
    }
    found.sort_by_key(|(n, _)| *n);
    Ok(found)
}

// ── images ───────────────────────────────────────────────────────────────

/// Decode an uploaded PNG/JPEG and write it to `dest` as a 3-channel PNG.
///
/// Alpha is dropped so the OCR engine and the final PDF see the same pixels
/// regardless of the upload's colour model.
pub fn normalize_image(bytes: &[u8], dest: &Path) -> Result<(u32, u32), ToolFailure> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ToolFailure::Backend(format!("cannot decode image: {e}")))?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    rgb.save_with_format(dest, ImageFormat::Png)
        .map_err(|e| ToolFailure::Backend(format!("cannot write PNG: {e}")))?;
    Ok((rgb.width(), rgb.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn page_names_are_zero_padded() {
        assert_eq!(page_image_name(1), "page-0001.png");
        assert_eq!(page_image_name(123), "page-0123.png");
    }

    #[test]
    fn normalize_drops_alpha() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 128])));
        let mut png = Vec::new();
        rgba.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .expect("encode");

        let dest = dir.path().join(page_image_name(1));
        let dims = normalize_image(&png, &dest).expect("normalize");
        assert_eq!(dims, (4, 3));

        let reloaded = image::open(&dest).expect("reload");
        assert_eq!(reloaded.color(), ColorType::Rgb8);
    }

    #[test]
    fn normalize_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = normalize_image(b"definitely not an image", &dir.path().join("x.png"))
            .unwrap_err();
        assert!(matches!(err, ToolFailure::Backend(_)));
    }

    #[test]
    fn numbered_pages_sort_numerically() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["raster-10.png", "raster-2.png", "raster-01.png", "source.pdf", "raster-x.png"] {
            std::fs::write(dir.path().join(name), b"").expect("write");
        }
        let found = collect_numbered_pages(dir.path(), "raster").expect("scan");
        let numbers: Vec<usize> = found.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
    }

    #[test]
    fn rasterizer_follows_config() {
        let config = OcrConfig::builder()
            .raster_backend(RasterBackend::Pdftoppm)
            .build()
            .unwrap();
        assert_eq!(rasterizer_for(&config).name(), "pdftoppm");
        assert_eq!(rasterizer_for(&OcrConfig::default()).name(), "pdfium");
    }

    #[tokio::test]
    async fn missing_pdftoppm_is_spawn_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = PdftoppmRasterizer {
            program: PathBuf::from("no-such-pdftoppm-9931"),
            timeout: Duration::from_secs(5),
        };
        let err = r
            .rasterize(&dir.path().join("in.pdf"), 150, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolFailure::Spawn(_)));
    }
}
