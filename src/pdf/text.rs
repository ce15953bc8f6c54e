//! Plain text extraction

use crate::error::Result;
use lopdf::Document;
use std::path::Path;

/// Extract the text of every page, concatenated in page order.
///
/// A page whose content cannot be decoded contributes nothing; the failure is
/// logged and the remaining pages are still extracted.
pub fn extract_text(document: &Document) -> String {
    let mut text = String::new();

    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "failed to extract page text");
            }
        }
    }

    text
}

/// Open a PDF file and extract its text
pub fn extract_text_from_path<P: AsRef<Path>>(path: P) -> Result<String> {
    let document = super::open_path(path)?;
    Ok(extract_text(&document))
}
