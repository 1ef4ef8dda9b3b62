//! One document, start to finish: workspace → rasterise → OCR → merge.
//!
//! Every intermediate file lives in the document's [`Workspace`], which is
//! removed before [`PageAssembler::assemble`] returns on every path. The
//! caller only ever sees the merged bytes.

use crate::config::OcrConfig;
use crate::error::{DocumentError, MergeError};
use crate::output::OcrResult;
use crate::pipeline::command::ToolFailure;
use crate::pipeline::input::{DocumentKind, InputDocument};
use crate::pipeline::merge::{merge_pdfs, page_count};
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::render::{normalize_image, page_image_name, rasterizer_for, PageImage, Rasterizer};
use crate::pipeline::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Drives the rasteriser and OCR engine over the pages of one document.
pub struct PageAssembler {
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    config: OcrConfig,
}

impl PageAssembler {
    /// Assembler using the adapters selected in `config`.
    pub fn new(config: OcrConfig) -> Self {
        let rasterizer = rasterizer_for(&config);
        let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractEngine::from_config(&config));
        Self::with_adapters(config, rasterizer, ocr)
    }

    /// Assembler with caller-supplied adapters.
    pub fn with_adapters(
        config: OcrConfig,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            rasterizer,
            ocr,
            config,
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Produce the searchable PDF for `doc`.
    ///
    /// Returns `Ok(None)` when the upload already carries the `-ocr` marker.
    /// `index` is the 1-indexed upload position recorded on the result.
    pub async fn assemble(
        &self,
        doc: &InputDocument,
        index: usize,
    ) -> Result<Option<OcrResult>, DocumentError> {
        let start = Instant::now();
        let ws = Workspace::create(&self.config.work_root(), &doc.base_name())
            .map_err(|e| workspace_error(doc, e))?;

        if doc.is_already_ocr() {
            info!("Skipping '{}': already OCR'd", doc.name());
            ws.close();
            return Ok(None);
        }

        let built = self.build(&ws, doc).await;
        ws.close();
        let (bytes, pages) = built?;

        let result = OcrResult {
            file_name: doc.output_name(),
            source_name: doc.name().to_string(),
            source_index: index,
            page_count: pages,
            duration_ms: start.elapsed().as_millis() as u64,
            bytes,
        };
        info!(
            "'{}' → {} ({} pages, {}ms)",
            result.source_name, result.file_name, result.page_count, result.duration_ms
        );
        Ok(Some(result))
    }

    /// Everything that touches the workspace. Returns merged bytes and page count.
    async fn build(
        &self,
        ws: &Workspace,
        doc: &InputDocument,
    ) -> Result<(Vec<u8>, usize), DocumentError> {
        let name = doc.name();

        let size = doc.bytes().len() as u64;
        if size > self.config.max_input_bytes {
            return Err(DocumentError::InputTooLarge {
                name: name.to_string(),
                size,
                limit: self.config.max_input_bytes,
            });
        }
        let kind = doc.kind().ok_or_else(|| DocumentError::UnsupportedFormat {
            name: name.to_string(),
        })?;

        let source = ws.file(&format!("source.{}", kind.extension()));
        tokio::fs::write(&source, doc.bytes())
            .await
            .map_err(|e| workspace_error(doc, e))?;

        let pages = if kind.is_image() {
            self.rasterize_image(source, ws.file(&page_image_name(1)))
                .await
                .map_err(|f| rasterize_error(name, "image", f))?
        } else {
            self.check_page_limit(doc, kind)?;
            self.rasterizer
                .rasterize(&source, self.config.dpi, ws.path())
                .await
                .map_err(|f| rasterize_error(name, self.rasterizer.name(), f))?
        };

        if pages.is_empty() {
            return Err(DocumentError::RasterizationFailed {
                name: name.to_string(),
                detail: "document has no pages".to_string(),
            });
        }
        if pages.len() > self.config.max_pages {
            return Err(DocumentError::TooManyPages {
                name: name.to_string(),
                pages: pages.len(),
                limit: self.config.max_pages,
            });
        }
        debug!("'{}': {} page images", name, pages.len());

        let mut page_pdfs = Vec::with_capacity(pages.len());
        for page in &pages {
            let pdf = self
                .ocr
                .recognize(page, ws.path())
                .await
                .map_err(|f| match f {
                    ToolFailure::Timeout { secs } => DocumentError::ToolTimeout {
                        name: name.to_string(),
                        tool: self.ocr.name().to_string(),
                        secs,
                    },
                    other => DocumentError::RecognitionFailed {
                        name: name.to_string(),
                        page: page.index,
                        detail: other.to_string(),
                    },
                })?;
            page_pdfs.push(pdf.path);
        }

        let bytes = merge_page_files(page_pdfs)
            .await
            .map_err(|source| DocumentError::Merge {
                name: name.to_string(),
                source,
            })?;
        Ok((bytes, pages.len()))
    }

    /// Decode and normalise a single uploaded image off the async threads.
    async fn rasterize_image(
        &self,
        source: PathBuf,
        dest: PathBuf,
    ) -> Result<Vec<PageImage>, ToolFailure> {
        let path = dest.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&source)
                .map_err(|e| ToolFailure::Backend(format!("cannot read upload: {e}")))?;
            normalize_image(&bytes, &dest)
        })
        .await
        .map_err(|e| ToolFailure::Backend(format!("image task panicked: {e}")))??;

        Ok(vec![PageImage {
            index: 1,
            path,
        }])
    }

    /// Reject oversized PDFs before spending time on rasterisation. PDFs the
    /// object parser cannot read are left to the rasteriser to judge.
    fn check_page_limit(&self, doc: &InputDocument, kind: DocumentKind) -> Result<(), DocumentError> {
        if kind != DocumentKind::Pdf {
            return Ok(());
        }
        if let Ok(pages) = page_count(doc.bytes()) {
            if pages > self.config.max_pages {
                return Err(DocumentError::TooManyPages {
                    name: doc.name().to_string(),
                    pages,
                    limit: self.config.max_pages,
                });
            }
        }
        Ok(())
    }
}

/// Read page PDFs in order and merge them on the blocking pool.
async fn merge_page_files(paths: Vec<PathBuf>) -> Result<Vec<u8>, MergeError> {
    tokio::task::spawn_blocking(move || {
        let streams = paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                std::fs::read(path).map_err(|e| MergeError::Unreadable {
                    index,
                    detail: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        merge_pdfs(&streams)
    })
    .await
    .map_err(|e| MergeError::Write(format!("merge task panicked: {e}")))?
}

fn rasterize_error(name: &str, tool: &str, failure: ToolFailure) -> DocumentError {
    match failure {
        ToolFailure::Timeout { secs } => DocumentError::ToolTimeout {
            name: name.to_string(),
            tool: tool.to_string(),
            secs,
        },
        other => DocumentError::RasterizationFailed {
            name: name.to_string(),
            detail: other.to_string(),
        },
    }
}

fn workspace_error(doc: &InputDocument, e: std::io::Error) -> DocumentError {
    DocumentError::Workspace {
        name: doc.name().to_string(),
        detail: e.to_string(),
    }
}
