//! Markdown export.

use crate::block::{Block, BlockContent};
use crate::document::Document;

impl Document {
    /// The whole document as Markdown, variables substituted.
    ///
    /// Blocks follow document order with one blank line between them.
    /// Groups leave no trace in the output.
    pub fn generate(&self) -> String {
        let mut out = String::new();
        for block in self.flattened() {
            out.push_str(without_trailing_blank_lines(&self.render_block(block)));
            out.push_str("\n\n");
        }
        without_leading_blank_lines(without_trailing_blank_lines(&out)).to_string()
    }

    /// One block's Markdown, variables substituted.
    pub fn render_block(&self, block: &Block) -> String {
        match block.content() {
            BlockContent::Text(text) => self.variables.substitute(text),
            BlockContent::Table(table) => table.to_markdown(|cell| self.variables.substitute(cell)),
        }
    }
}

/// Drops trailing lines that hold nothing but whitespace, and the final
/// line break.
fn without_trailing_blank_lines(text: &str) -> &str {
    let mut end = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            end = offset + line.trim_end_matches(['\n', '\r']).len();
        }
        offset += line.len();
    }
    &text[..end]
}

fn without_leading_blank_lines(text: &str) -> &str {
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &text[start..]
}
