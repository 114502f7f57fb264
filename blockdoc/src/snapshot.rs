//! The persisted record of a whole document.
//!
//! Field names and shapes follow the JSON layout older documents were saved
//! in, so those still load: camelCase keys, `type` for the block kind, and
//! variables and groups as `[id, record]` pairs. Fields added later
//! (`order`, `selected`) are optional and defaulted on load.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::block::table::TableContent;
use crate::block::{Block, BlockContent, BlockKind, Placement};
use crate::document::Document;
use crate::group::Group;
use crate::ids::{BlockId, GroupId, VariableId};
use crate::variables::Variable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub variables: Vec<(VariableId, Variable)>,
    #[serde(default)]
    pub groups: Vec<(GroupId, GroupRecord)>,
    #[serde(default)]
    pub group_counter: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub content: RecordContent,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

/// Stored block payload. Anything that is neither text nor a well-formed
/// table is kept as raw JSON until it is repaired on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordContent {
    Text(String),
    Table(TableContent),
    Other(serde_json::Value),
}

impl From<&BlockContent> for RecordContent {
    fn from(content: &BlockContent) -> Self {
        match content {
            BlockContent::Text(text) => RecordContent::Text(text.clone()),
            BlockContent::Table(table) => RecordContent::Table(table.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<GroupId>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

impl Document {
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            blocks: self
                .blocks
                .values()
                .map(|b| BlockRecord {
                    id: b.id,
                    kind: b.kind,
                    content: RecordContent::from(&b.content),
                    group_id: b.group_id(),
                    selected: Some(b.selected),
                    order: Some(b.order()),
                })
                .collect(),
            variables: self.variables.iter().map(|(id, v)| (id, v.clone())).collect(),
            groups: self
                .groups
                .values()
                .map(|g| {
                    let record = GroupRecord {
                        id: Some(g.id),
                        name: g.name.clone(),
                        order: Some(g.order),
                    };
                    (g.id, record)
                })
                .collect(),
            group_counter: self.group_counter,
        }
    }

    /// Rebuild a document, repairing what can be repaired.
    ///
    /// Creation sequence numbers are minted by position, blocks first, so
    /// ties between equal orders break the way the arrays were laid out.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut doc = Document::new();
        doc.group_counter = snapshot.group_counter;

        let known_groups: HashSet<GroupId> = snapshot.groups.iter().map(|(id, _)| *id).collect();

        for (index, record) in snapshot.blocks.into_iter().enumerate() {
            let content = repair_content(record.id, record.kind, record.content);
            let order = record.order.unwrap_or(index as f64);
            let placement = match record.group_id {
                Some(group) if known_groups.contains(&group) => Placement::Member { group, order },
                Some(group) => {
                    warn!(block = %record.id, group = %group, "block refers to a missing group; moving it to the top level");
                    Placement::TopLevel { order }
                }
                None => Placement::TopLevel { order },
            };
            let seq = doc.mint_seq();
            let mut block = Block::new(record.kind, content, placement, seq);
            block.id = record.id;
            block.selected = record.selected.unwrap_or(false);
            if doc.blocks.shift_remove(&block.id).is_some() {
                warn!(block = %record.id, "duplicate block id in snapshot; keeping the later one");
            }
            doc.blocks.insert(block.id, block);
        }

        for (index, (id, record)) in snapshot.groups.into_iter().enumerate() {
            let order = record.order.unwrap_or(index as f64);
            let seq = doc.mint_seq();
            let mut group = Group::new(record.name, order, seq);
            group.id = id;
            doc.groups.insert(id, group);
        }

        for (id, variable) in snapshot.variables {
            doc.variables.insert_with_id(id, variable);
        }
        doc
    }
}

fn repair_content(id: BlockId, kind: BlockKind, content: RecordContent) -> BlockContent {
    let content = match content {
        RecordContent::Text(text) => Some(BlockContent::Text(text)),
        RecordContent::Table(table) => Some(BlockContent::Table(table)),
        RecordContent::Other(_) => None,
    };
    match content {
        Some(content) if content.fits(kind) => content,
        _ => {
            warn!(block = %id, %kind, "stored content does not match block type; using the default");
            kind.default_content()
        }
    }
}
