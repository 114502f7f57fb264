pub mod table;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::block::table::TableContent;
use crate::ids::{BlockId, GroupId};

/// The kind of content a block holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Paragraph,
    List,
    Code,
    Table,
}

impl BlockKind {
    pub const ALL: [BlockKind; 5] = [
        BlockKind::Heading,
        BlockKind::Paragraph,
        BlockKind::List,
        BlockKind::Code,
        BlockKind::Table,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Heading => "heading",
            BlockKind::Paragraph => "paragraph",
            BlockKind::List => "list",
            BlockKind::Code => "code",
            BlockKind::Table => "table",
        }
    }

    /// Placeholder content for a block created from the palette.
    pub fn default_content(&self) -> BlockContent {
        match self {
            BlockKind::Heading => BlockContent::Text("# New Heading".into()),
            BlockKind::Paragraph => BlockContent::Text("Write your paragraph text here.".into()),
            BlockKind::List => BlockContent::Text("- Item 1\n- Item 2\n- Item 3".into()),
            BlockKind::Code => {
                BlockContent::Text("```\nconsole.log('Hello, world!');\n```".into())
            }
            BlockKind::Table => BlockContent::Table(TableContent::placeholder()),
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Block payload: raw Markdown text, or a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Text(String),
    Table(TableContent),
}

impl BlockContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlockContent::Text(text) => Some(text),
            BlockContent::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableContent> {
        match self {
            BlockContent::Table(table) => Some(table),
            BlockContent::Text(_) => None,
        }
    }

    /// Whether this payload is the right shape for `kind`.
    pub fn fits(&self, kind: BlockKind) -> bool {
        matches!(
            (self, kind),
            (BlockContent::Table(_), BlockKind::Table)
                | (
                    BlockContent::Text(_),
                    BlockKind::Heading | BlockKind::Paragraph | BlockKind::List | BlockKind::Code
                )
        )
    }
}

/// Where a block sits and the `order` it sorts by there.
///
/// A top-level order is compared against other top-level blocks and groups;
/// a member order only against the other members of the same group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    TopLevel { order: f64 },
    Member { group: GroupId, order: f64 },
}

impl Placement {
    pub fn order(&self) -> f64 {
        match self {
            Placement::TopLevel { order } | Placement::Member { order, .. } => *order,
        }
    }

    pub fn group(&self) -> Option<GroupId> {
        match self {
            Placement::TopLevel { .. } => None,
            Placement::Member { group, .. } => Some(*group),
        }
    }

    pub(crate) fn set_order(&mut self, value: f64) {
        match self {
            Placement::TopLevel { order } | Placement::Member { order, .. } => *order = value,
        }
    }
}

/// The atomic unit of a document.
#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) kind: BlockKind,
    pub(crate) content: BlockContent,
    pub(crate) placement: Placement,
    pub(crate) selected: bool,
    /// Creation sequence; only used to break ties between equal orders.
    pub(crate) seq: u64,
}

impl Block {
    pub(crate) fn new(kind: BlockKind, content: BlockContent, placement: Placement, seq: u64) -> Self {
        debug_assert!(content.fits(kind));
        Block {
            id: BlockId::new(),
            kind,
            content,
            placement,
            selected: false,
            seq,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn content(&self) -> &BlockContent {
        &self.content
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    pub fn table(&self) -> Option<&TableContent> {
        self.content.as_table()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.placement.group()
    }

    pub fn order(&self) -> f64 {
        self.placement.order()
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }
}
