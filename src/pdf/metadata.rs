//! Document information dictionary reader

use crate::error::Result;
use lopdf::{Dictionary, Document, Object};
use schemars::JsonSchema;
use serde::Serialize;
use std::path::Path;

/// Value substituted for any property the document does not provide
pub const NOT_AVAILABLE: &str = "Not available";

/// The nine document properties, keyed by their names in the info dictionary
pub const METADATA_KEYS: [&str; 9] = [
    "Title",
    "Author",
    "Subject",
    "Keywords",
    "Creator",
    "Producer",
    "CreationDate",
    "ModDate",
    "Trapped",
];

/// Document properties with every field always present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MetadataRecord {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: String,
    pub creator: String,
    pub producer: String,
    pub creation_date: String,
    pub mod_date: String,
    pub trapped: String,
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            title: NOT_AVAILABLE.to_string(),
            author: NOT_AVAILABLE.to_string(),
            subject: NOT_AVAILABLE.to_string(),
            keywords: NOT_AVAILABLE.to_string(),
            creator: NOT_AVAILABLE.to_string(),
            producer: NOT_AVAILABLE.to_string(),
            creation_date: NOT_AVAILABLE.to_string(),
            mod_date: NOT_AVAILABLE.to_string(),
            trapped: NOT_AVAILABLE.to_string(),
        }
    }
}

impl MetadataRecord {
    /// Look up a field by its info dictionary key
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "Title" => &self.title,
            "Author" => &self.author,
            "Subject" => &self.subject,
            "Keywords" => &self.keywords,
            "Creator" => &self.creator,
            "Producer" => &self.producer,
            "CreationDate" => &self.creation_date,
            "ModDate" => &self.mod_date,
            "Trapped" => &self.trapped,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "Title" => Some(&mut self.title),
            "Author" => Some(&mut self.author),
            "Subject" => Some(&mut self.subject),
            "Keywords" => Some(&mut self.keywords),
            "Creator" => Some(&mut self.creator),
            "Producer" => Some(&mut self.producer),
            "CreationDate" => Some(&mut self.creation_date),
            "ModDate" => Some(&mut self.mod_date),
            "Trapped" => Some(&mut self.trapped),
            _ => None,
        }
    }

    /// `(key, value)` pairs in fixed key order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        METADATA_KEYS
            .iter()
            .map(move |key| (*key, self.get(key).unwrap_or(NOT_AVAILABLE)))
    }

    /// True when no property carries a real value
    pub fn is_all_sentinel(&self) -> bool {
        self.fields().all(|(_, value)| value == NOT_AVAILABLE)
    }

    /// Build a record from an info dictionary, defaulting each missing key
    pub fn from_info(document: &Document, info: &Dictionary) -> Self {
        let mut record = Self::default();

        for key in METADATA_KEYS {
            let value = info
                .get(key.as_bytes())
                .ok()
                .and_then(|v| document.dereference(v).ok())
                .and_then(|(_, v)| render_value(v));

            if let (Some(value), Some(slot)) = (value, record.slot(key)) {
                *slot = value;
            }
        }

        record
    }
}

/// Read the metadata of a PDF file.
///
/// Never fails: an unreadable or corrupt file yields the all-sentinel record.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> MetadataRecord {
    let path = path.as_ref();
    match super::open_path(path).and_then(|document| read_document_metadata(&document)) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "metadata unreadable, using defaults");
            MetadataRecord::default()
        }
    }
}

/// Read the metadata of a PDF held in memory, with the same defaulting as
/// [`read_metadata`]
pub fn metadata_from_bytes(data: &[u8]) -> MetadataRecord {
    match super::open_bytes(data).and_then(|document| read_document_metadata(&document)) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, "metadata unreadable, using defaults");
            MetadataRecord::default()
        }
    }
}

/// Read the metadata of an already opened document
pub fn read_document_metadata(document: &Document) -> Result<MetadataRecord> {
    let Ok(info) = document.trailer.get(b"Info") else {
        return Ok(MetadataRecord::default());
    };
    let (_, info) = document.dereference(info)?;
    let info = info.as_dict()?;

    Ok(MetadataRecord::from_info(document, info))
}

fn render_value(value: &Object) -> Option<String> {
    match value {
        Object::String(bytes, _) => Some(
            lopdf::decode_text_string(value)
                .map(|text| text.trim_start_matches('\u{feff}').to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
        ),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
