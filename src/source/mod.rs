//! Source resolution and document storage

pub mod resolver;
pub mod store;

pub use resolver::{resolve_base64, resolve_path, ResolvedPdf};
pub use store::{DocumentStore, StoredDocument, StoredDocumentInfo};
