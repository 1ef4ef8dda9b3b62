//! End-to-end integration tests for edgequake-ocrpdf.
//!
//! These tests run the real tools: tesseract, and pdfium or pdftoppm for
//! rasterisation. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium cargo test --test e2e -- --nocapture
//!
//! Use the poppler backend instead of pdfium:
//!   E2E_ENABLED=1 E2E_BACKEND=pdftoppm cargo test --test e2e -- --nocapture

use edgequake_ocrpdf::{
    check_tools, page_count, write_outputs, BatchPipeline, InputDocument, OcrConfig,
    RasterBackend, COMBINED_FILE_NAME,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;

// ── Test helpers ─────────────────────────────────────────────────────────────

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn e2e_config(work: &std::path::Path) -> OcrConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("edgequake_ocrpdf=debug"))
        .with_test_writer()
        .try_init();
    let backend = std::env::var("E2E_BACKEND")
        .ok()
        .and_then(|b| b.parse::<RasterBackend>().ok())
        .unwrap_or_default();
    OcrConfig::builder()
        .work_dir(work)
        .raster_backend(backend)
        .tool_timeout_secs(120)
        .build()
        .expect("config")
}

/// A text PDF: one line of large Helvetica per page.
fn text_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let tree_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut kids = Vec::new();
    for line in lines {
        let content = format!("BT /F1 36 Tf 72 600 Td ({line}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => tree_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        tree_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(lines.len() as i64),
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => tree_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save");
    out
}

fn photo_jpeg() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([240, 240, 240])));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .expect("encode");
    out
}

/// Tesseract's PDF renderer always embeds its invisible-text font.
fn has_text_layer(pdf: &[u8]) -> bool {
    pdf.windows(b"GlyphLessFont".len())
        .any(|w| w == b"GlyphLessFont")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tools_available() {
    e2e_skip_unless_enabled!();
    let work = tempfile::tempdir().unwrap();
    let checks = check_tools(&e2e_config(work.path())).await;
    for c in &checks {
        println!("{:<10} {:<5} {}", c.tool, c.available, c.detail);
    }
    assert!(checks.iter().all(|c| c.available));
}

#[tokio::test]
async fn test_invoice_and_photo() {
    e2e_skip_unless_enabled!();
    let work = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let docs = vec![
        InputDocument::new("invoice.pdf", text_pdf(&["INVOICE 2024", "TOTAL DUE"])),
        InputDocument::new("photo.jpg", photo_jpeg()),
    ];
    let batch = BatchPipeline::new(e2e_config(work.path())).run(docs).await;

    for (name, err) in batch.failures() {
        println!("FAILED {name}: {err}");
    }
    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.results[0].file_name, "invoice-ocr.pdf");
    assert_eq!(page_count(&batch.results[0].bytes).unwrap(), 2);
    assert_eq!(batch.results[1].file_name, "photo-ocr.pdf");
    assert_eq!(page_count(&batch.results[1].bytes).unwrap(), 1);
    assert!(has_text_layer(&batch.results[0].bytes));

    let combined = batch.combined.as_ref().expect("combined");
    assert_eq!(page_count(&combined.bytes).unwrap(), 3);

    let written = write_outputs(&batch, out.path()).await.unwrap();
    assert_eq!(written.len(), 3);
    assert!(out.path().join(COMBINED_FILE_NAME).is_file());
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_language_fails_document() {
    e2e_skip_unless_enabled!();
    let work = tempfile::tempdir().unwrap();
    let config = OcrConfig::builder()
        .work_dir(work.path())
        .language("no_such_language_pack")
        .build()
        .unwrap();
    let docs = vec![InputDocument::new("photo.png", {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([255, 255, 255])))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    })];

    let batch = BatchPipeline::new(config).run(docs).await;
    assert!(batch.results.is_empty());
    assert_eq!(batch.stats.failed, 1);
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}
