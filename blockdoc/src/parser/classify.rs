use std::ops::Range;

use crate::block::BlockKind;
use crate::parser::{ImportWarning, ImportedBlock};

const FENCE: &str = "```";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split Markdown into typed blocks, one line at a time.
///
/// This is a best-effort classifier, not a CommonMark parser: headings are
/// single lines, fences toggle code, `- `/`* ` lines gather into lists, and
/// any other text continues whatever block is open.
pub fn classify(source: &str, file_id: usize) -> (Vec<ImportedBlock>, Vec<ImportWarning>) {
    let mut state = ClassifyState::new(file_id);
    for (line, span) in lines(source) {
        state.push_line(line, span);
    }
    state.finish()
}

/// Lines without their terminators, each with its byte range in `source`.
fn lines(source: &str) -> impl Iterator<Item = (&str, Range<usize>)> {
    let mut offset = 0;
    source.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        (line, start..start + line.len())
    })
}

// ---------------------------------------------------------------------------
// Classifier state
// ---------------------------------------------------------------------------

struct ClassifyState {
    file_id: usize,
    open: Option<OpenBlock>,
    blocks: Vec<ImportedBlock>,
}

struct OpenBlock {
    kind: BlockKind,
    lines: Vec<String>,
    span: Range<usize>,
}

impl OpenBlock {
    fn new(kind: BlockKind, line: &str, span: Range<usize>) -> Self {
        OpenBlock {
            kind,
            lines: vec![line.to_string()],
            span,
        }
    }

    fn append(&mut self, line: &str, span: &Range<usize>) {
        self.lines.push(line.to_string());
        self.span.end = span.end;
    }

    fn into_block(self) -> ImportedBlock {
        ImportedBlock {
            kind: self.kind,
            content: self.lines.join("\n"),
            span: self.span,
        }
    }
}

impl ClassifyState {
    fn new(file_id: usize) -> Self {
        ClassifyState {
            file_id,
            open: None,
            blocks: Vec::new(),
        }
    }

    fn open_kind(&self) -> Option<BlockKind> {
        self.open.as_ref().map(|b| b.kind)
    }

    fn flush(&mut self) {
        if let Some(open) = self.open.take() {
            self.blocks.push(open.into_block());
        }
    }

    fn start(&mut self, kind: BlockKind, line: &str, span: Range<usize>) {
        self.flush();
        self.open = Some(OpenBlock::new(kind, line, span));
    }

    fn append(&mut self, line: &str, span: &Range<usize>) {
        if let Some(open) = self.open.as_mut() {
            open.append(line, span);
        }
    }

    fn push_line(&mut self, line: &str, span: Range<usize>) {
        let marker = line.trim_start();

        // An open fence swallows everything up to and including its closer.
        if self.open_kind() == Some(BlockKind::Code) {
            self.append(line, &span);
            if marker.starts_with(FENCE) {
                self.flush();
            }
            return;
        }

        if marker.starts_with(FENCE) {
            self.start(BlockKind::Code, line, span);
        } else if marker.starts_with('#') {
            self.start(BlockKind::Heading, line, span);
            self.flush();
        } else if marker.starts_with("- ") || marker.starts_with("* ") {
            if self.open_kind() == Some(BlockKind::List) {
                self.append(line, &span);
            } else {
                self.start(BlockKind::List, line, span);
            }
        } else if marker.is_empty() {
            // Blank lines separate nothing on their own.
        } else if matches!(self.open_kind(), Some(BlockKind::Paragraph | BlockKind::List)) {
            self.append(line, &span);
        } else {
            self.start(BlockKind::Paragraph, line, span);
        }
    }

    fn finish(mut self) -> (Vec<ImportedBlock>, Vec<ImportWarning>) {
        let mut warnings = Vec::new();
        if let Some(open) = &self.open {
            if open.kind == BlockKind::Code {
                let opener = open.span.start..open.span.start + open.lines[0].len();
                warnings.push(
                    ImportWarning::new("code fence is never closed", opener, self.file_id)
                        .with_note("everything after it was imported as code"),
                );
            }
        }
        self.flush();
        (self.blocks, warnings)
    }
}
