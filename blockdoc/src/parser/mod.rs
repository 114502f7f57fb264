mod classify;
pub mod error;

pub use error::{ImportError, ImportWarning};

use std::ops::Range;
use std::path::Path;

use crate::block::BlockKind;

/// File name offered for exported documents.
pub const EXPORT_FILE_NAME: &str = "document.md";
/// MIME type of exported documents.
pub const EXPORT_MIME: &str = "text/markdown";
/// Extensions accepted by [`read_import_file`].
pub const IMPORT_EXTENSIONS: [&str; 2] = ["md", "txt"];

/// A block recognised in imported Markdown, before it gets an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedBlock {
    pub kind: BlockKind,
    pub content: String,
    /// Source bytes the block came from.
    pub span: Range<usize>,
}

/// Result of classifying one Markdown source.
#[derive(Debug, Clone, Default)]
pub struct Import {
    pub blocks: Vec<ImportedBlock>,
    pub warnings: Vec<ImportWarning>,
}

/// Import entry point.
pub struct Importer<'a> {
    source: &'a str,
    file_id: usize,
}

impl<'a> Importer<'a> {
    pub fn new(source: &'a str, file_id: usize) -> Self {
        Importer { source, file_id }
    }

    /// Classify the source into a flat list of blocks. Never fails; odd
    /// input is reported through `warnings`.
    pub fn parse(&self) -> Import {
        let (blocks, warnings) = classify::classify(self.source, self.file_id);
        Import { blocks, warnings }
    }
}

/// Reject files that are not `.md` or `.txt`.
pub fn check_import_path(path: &Path) -> Result<(), ImportError> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMPORT_EXTENSIONS.iter().any(|ok| ext.eq_ignore_ascii_case(ok)));
    if supported {
        Ok(())
    } else {
        Err(ImportError::UnsupportedFile {
            path: path.to_path_buf(),
        })
    }
}

/// Read a Markdown or plain text file for import.
pub fn read_import_file(path: &Path) -> Result<String, ImportError> {
    check_import_path(path)?;
    std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_filter() {
        assert!(check_import_path(Path::new("notes.md")).is_ok());
        assert!(check_import_path(Path::new("dir/README.TXT")).is_ok());
        assert!(matches!(
            check_import_path(Path::new("page.html")),
            Err(ImportError::UnsupportedFile { .. })
        ));
        assert!(check_import_path(Path::new("Makefile")).is_err());
    }

    #[test]
    fn read_import_file_reports_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.md");
        let err = read_import_file(&path).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));

        std::fs::write(&path, "# Hi\n").unwrap();
        assert_eq!(read_import_file(&path).unwrap(), "# Hi\n");
    }

    #[test]
    fn importer_keeps_file_id() {
        let import = Importer::new("```\nopen", 7).parse();
        assert_eq!(import.blocks.len(), 1);
        assert_eq!(import.warnings[0].to_diagnostic().labels[0].file_id, 7);
    }
}
