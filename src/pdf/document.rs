//! Document loading and page-tree walking on top of lopdf

use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::path::Path;

/// Guards against cyclic `Parent` chains in malformed page trees
const MAX_TREE_DEPTH: usize = 64;

/// Nested Form XObjects deeper than this are not searched for images
const MAX_FORM_DEPTH: usize = 16;

/// Reference to an image XObject discovered on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Object id of the image stream
    pub id: ObjectId,
    /// Resource name the image is registered under (e.g. `Im1`)
    pub name: String,
}

/// Open a PDF from a file path
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;
    open_bytes(&data)
}

/// Open a PDF from bytes
pub fn open_bytes(data: &[u8]) -> Result<Document> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    Ok(Document::load_mem(data)?)
}

/// Page object ids in document order (index 0 is the first page)
pub fn page_ids(document: &Document) -> Vec<ObjectId> {
    document.get_pages().into_values().collect()
}

/// List the image XObjects used by a page.
///
/// Images are reported in the order their resource dictionary lists them.
/// Form XObjects are searched recursively, so an image drawn through a form
/// appears at the form's position. Each image object is listed at most once
/// per page.
pub fn page_images(document: &Document, page_id: ObjectId) -> Result<Vec<ImageRef>> {
    let mut images = Vec::new();
    let mut seen = HashSet::new();

    if let Some(resources) = page_resources(document, page_id)? {
        collect_images(document, resources, &mut seen, &mut images, 0);
    }

    Ok(images)
}

/// Resolve the resource dictionary of a page, honouring inheritance from
/// ancestor `Pages` nodes.
fn page_resources(document: &Document, page_id: ObjectId) -> Result<Option<&Dictionary>> {
    let mut node = document.get_dictionary(page_id)?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            let (_, resolved) = document.dereference(resources)?;
            return Ok(resolved.as_dict().ok());
        }

        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node = document.get_dictionary(parent)?,
            Err(_) => return Ok(None),
        }
    }

    Ok(None)
}

fn collect_images(
    document: &Document,
    resources: &Dictionary,
    seen: &mut HashSet<ObjectId>,
    images: &mut Vec<ImageRef>,
    depth: usize,
) {
    let Some(xobjects) = resolve_dict(document, resources, b"XObject") else {
        return;
    };

    for (name, value) in xobjects.iter() {
        // Streams are always indirect objects
        let Ok(id) = value.as_reference() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let Ok(stream) = document.get_object(id).and_then(Object::as_stream) else {
            continue;
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => images.push(ImageRef {
                id,
                name: String::from_utf8_lossy(name).into_owned(),
            }),
            Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                if let Some(form_resources) = resolve_dict(document, &stream.dict, b"Resources") {
                    collect_images(document, form_resources, seen, images, depth + 1);
                }
            }
            _ => {}
        }
    }
}

/// Look up `key` in `dict`, following an indirect reference if needed.
pub(crate) fn resolve_dict<'a>(
    document: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    let value = dict.get(key).ok()?;
    let (_, resolved) = document.dereference(value).ok()?;
    resolved.as_dict().ok()
}
