//! Concatenate PDFs page-for-page, preserving order.
//!
//! Used twice with the same contract: page PDFs → one document, and document
//! PDFs → `All_OCR_PDFs.pdf`.
//!
//! The merge works on the object graph with `lopdf`: every input is
//! renumbered into a disjoint id range, its pages are lifted out of their
//! page tree (pulling down inherited `MediaBox`/`Resources`/… so nothing is
//! lost with the old tree), and a fresh catalog + single flat page tree is
//! written over them. Page content streams are copied byte-for-byte.

use crate::error::MergeError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page-tree nodes and navigation objects that are rebuilt, not copied.
const STRUCTURAL: [&[u8]; 5] = [b"Catalog", b"Pages", b"Page", b"Outlines", b"Outline"];

/// Merge `streams` into one PDF. Output page count is the sum of the inputs'.
///
/// # Errors
/// * [`MergeError::Empty`] when `streams` is empty
/// * [`MergeError::Unreadable`] / [`MergeError::NoPageTree`] naming the
///   offending input (0-indexed)
pub fn merge_pdfs<B: AsRef<[u8]>>(streams: &[B]) -> Result<Vec<u8>, MergeError> {
    if streams.is_empty() {
        return Err(MergeError::Empty);
    }

    let mut merged = Document::with_version("1.5");
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut next_id = 1;

    for (index, bytes) in streams.iter().enumerate() {
        let mut doc = Document::load_mem(bytes.as_ref()).map_err(|e| MergeError::Unreadable {
            index,
            detail: e.to_string(),
        })?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        if doc.version > merged.version {
            merged.version = doc.version.clone();
        }

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(MergeError::NoPageTree { index });
        }
        for id in page_ids {
            let page = flatten_page(&doc, id).ok_or(MergeError::NoPageTree { index })?;
            pages.push((id, page));
        }

        for (id, object) in doc.objects {
            if !is_structural(&object) {
                merged.objects.insert(id, object);
            }
        }
    }

    merged.max_id = next_id;
    let tree_id = merged.new_object_id();
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let page_count = pages.len();

    for (id, mut page) in pages {
        page.set("Parent", tree_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }
    merged.objects.insert(
        tree_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count as i64),
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => tree_id,
    });
    merged.trailer.set("Root", catalog_id);
    // Drop what only the discarded trees referenced (outline items, old Info).
    merged.prune_objects();
    merged.renumber_objects();

    let mut out = Vec::new();
    merged
        .save_to(&mut out)
        .map_err(|e| MergeError::Write(e.to_string()))?;

    debug!(
        "Merged {} inputs → {} pages, {} bytes",
        streams.len(),
        page_count,
        out.len()
    );
    Ok(out)
}

/// Number of pages in a PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize, MergeError> {
    let doc = Document::load_mem(bytes).map_err(|e| MergeError::Unreadable {
        index: 0,
        detail: e.to_string(),
    })?;
    Ok(doc.get_pages().len())
}

/// Copy of the page dictionary with inherited attributes made explicit and
/// the old `Parent` link removed.
fn flatten_page(doc: &Document, id: ObjectId) -> Option<Dictionary> {
    let mut page = doc.get_object(id).and_then(Object::as_dict).ok()?.clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        // Guard against cyclic Parent chains in damaged files.
        if depth > 64 {
            break;
        }
        let Ok(node) = doc.get_object(parent_id).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    page.remove(b"Parent");
    Some(page)
}

fn is_structural(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => dict
            .get(b"Type")
            .and_then(Object::as_name)
            .map(|name| STRUCTURAL.contains(&name))
            .unwrap_or(false),
        _ => false,
    }
}
