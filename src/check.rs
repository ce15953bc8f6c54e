//! Metadata quality checks

use crate::pdf::{MetadataRecord, NOT_AVAILABLE};

/// Decides whether a document's metadata looks trustworthy
pub trait MetadataCheck: Send + Sync {
    fn check(&self, metadata: &MetadataRecord) -> bool;
}

/// Passes when every listed field carries a real, non-blank value
#[derive(Debug, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl MetadataCheck for RequiredFields {
    fn check(&self, metadata: &MetadataRecord) -> bool {
        self.fields.iter().all(|field| {
            metadata
                .get(field)
                .map(|value| value != NOT_AVAILABLE && !value.trim().is_empty())
                .unwrap_or(false)
        })
    }
}
