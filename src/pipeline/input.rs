//! Input handling: turn a path, URL or uploaded buffer into an [`InputDocument`].
//!
//! Uploads arrive as bytes plus the name the user gave them. Everything the
//! pipeline needs to know about an upload (its kind, its output name, whether
//! it was already processed) is derived from that name here.

use crate::error::OcrPdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix that marks an already-processed document.
pub const OCR_SUFFIX: &str = "-ocr";

/// Upload names may carry a `<unix-seconds>_` prefix added at upload time.
static UPLOAD_TIMESTAMP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{9,}_").expect("static regex"));

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
}

impl DocumentKind {
    /// Classify by file extension, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" => Some(DocumentKind::Png),
            "jpg" | "jpeg" => Some(DocumentKind::Jpeg),
            _ => None,
        }
    }

    /// Single raster image rather than a paginated document.
    pub fn is_image(self) -> bool {
        !matches!(self, DocumentKind::Pdf)
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Png => "png",
            DocumentKind::Jpeg => "jpg",
        }
    }
}

/// One uploaded document. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct InputDocument {
    name: String,
    bytes: Vec<u8>,
    kind: Option<DocumentKind>,
}

impl InputDocument {
    /// Wrap an upload. The kind is taken from `name`'s extension; an
    /// unsupported extension is reported when the document is processed.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let kind = DocumentKind::from_name(&name);
        Self {
            name,
            bytes: bytes.into(),
            kind,
        }
    }

    /// Name as supplied by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        self.kind
    }

    /// File stem with any upload timestamp prefix removed.
    ///
    /// `1700000000_invoice.pdf` → `invoice`.
    pub fn base_name(&self) -> String {
        base_name(&self.name)
    }

    /// `<base>-ocr.pdf`.
    pub fn output_name(&self) -> String {
        format!("{}{}.pdf", self.base_name(), OCR_SUFFIX)
    }

    /// True when the base name already ends in `-ocr`.
    pub fn is_already_ocr(&self) -> bool {
        self.base_name().ends_with(OCR_SUFFIX)
    }
}

/// File stem of `name` without directories or upload timestamp prefix.
pub fn base_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let stripped = UPLOAD_TIMESTAMP_PREFIX.replace(stem, "");
    if stripped.is_empty() {
        stem.to_string()
    } else {
        stripped.into_owned()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local path or download a URL into an [`InputDocument`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputDocument, OcrPdfError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

/// Read a local file, mapping the common failure modes to typed errors.
async fn load_local(path_str: &str) -> Result<InputDocument, OcrPdfError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(OcrPdfError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(OcrPdfError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(OcrPdfError::PermissionDenied { path });
        }
        Err(_) => return Err(OcrPdfError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path_str)
        .to_string();

    debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
    Ok(InputDocument::new(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputDocument, OcrPdfError> {
    info!("Downloading from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OcrPdfError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            OcrPdfError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            OcrPdfError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(OcrPdfError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| OcrPdfError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(InputDocument::new(name, bytes.to_vec()))
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_name("a.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_name("a.png"), Some(DocumentKind::Png));
        assert_eq!(DocumentKind::from_name("a.JPeG"), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::from_name("a.jpg"), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::from_name("a.tiff"), None);
        assert_eq!(DocumentKind::from_name("noext"), None);
        assert!(DocumentKind::Png.is_image());
        assert!(!DocumentKind::Pdf.is_image());
    }

    #[test]
    fn base_name_strips_upload_timestamp() {
        assert_eq!(base_name("1699999999_invoice.pdf"), "invoice");
        assert_eq!(base_name("invoice.pdf"), "invoice");
        assert_eq!(base_name("2024_report.pdf"), "2024_report");
        assert_eq!(base_name("/home/u/1699999999_scan.png"), "scan");
    }

    #[test]
    fn output_name_inserts_ocr_suffix() {
        let doc = InputDocument::new("1699999999_photo.jpg", vec![]);
        assert_eq!(doc.output_name(), "photo-ocr.pdf");
        assert!(!doc.is_already_ocr());

        let done = InputDocument::new("invoice-ocr.pdf", vec![]);
        assert!(done.is_already_ocr());
    }

    #[test]
    fn filename_from_url_falls_back() {
        assert_eq!(filename_from_url("https://x.org/files/scan.pdf"), "scan.pdf");
        assert_eq!(filename_from_url("https://x.org/files/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn resolve_missing_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, OcrPdfError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn resolve_local_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"not really a png").expect("write");

        let doc = resolve_input(path.to_str().unwrap(), 5).await.expect("load");
        assert_eq!(doc.name(), "scan.png");
        assert_eq!(doc.kind(), Some(DocumentKind::Png));
        assert_eq!(doc.bytes(), b"not really a png");
    }
}
