pub mod opensearch;

pub use opensearch::{FieldKind, IndexField, IndexSchema, OpenSearchIndex};
