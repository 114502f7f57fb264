use crate::block::BlockKind;
use crate::document::Document;

/// Variables every new document starts with, in display order.
pub const DEFAULT_VARIABLES: [(&str, &str); 5] = [
    ("product_name", "Awesome Product"),
    ("release_date", "2025-01-01"),
    ("price", "1000"),
    ("tax", "0.2"),
    ("total", "{{price}}*{{tax}}"),
];

/// Blocks every new document starts with.
pub const DEFAULT_BLOCKS: [BlockKind; 3] = [BlockKind::Heading, BlockKind::Paragraph, BlockKind::Table];

impl Document {
    /// The starter document used when nothing has been saved.
    pub fn bootstrap() -> Document {
        let mut doc = Document::new();
        for (key, value) in DEFAULT_VARIABLES {
            doc.variables.create(key, value);
        }
        for kind in DEFAULT_BLOCKS {
            doc.create_block(kind);
        }
        doc
    }
}
