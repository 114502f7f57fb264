pub mod order;

use indexmap::IndexMap;
use tracing::debug;

use crate::block::table::TableContent;
use crate::block::{Block, BlockContent, BlockKind, Placement};
use crate::group::Group;
use crate::ids::{BlockId, GroupId};
use crate::parser::{Import, ImportWarning, Importer};
use crate::variables::VariableStore;

pub use order::{ItemRef, TopLevel, TopLevelItem};

/// One editable document: blocks, groups and variables.
///
/// Blocks and groups live in insertion-ordered tables keyed by id. Their
/// document position comes from `order` values (see [`order`]), never from
/// table position, except as the final tiebreak through the creation
/// sequence number every entity carries.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub(crate) blocks: IndexMap<BlockId, Block>,
    pub(crate) groups: IndexMap<GroupId, Group>,
    pub(crate) variables: VariableStore,
    pub(crate) group_counter: u64,
    pub(crate) next_seq: u64,
}

impl Document {
    /// An empty document with no blocks, groups or variables.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mint_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// All blocks in creation order (not document order).
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// All groups in creation order, empty ones included.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    pub fn group_counter(&self) -> u64 {
        self.group_counter
    }

    /// Every block in the order it is rendered: top-level items in turn,
    /// with each group expanded to its members.
    pub fn flattened(&self) -> Vec<&Block> {
        let mut out = Vec::with_capacity(self.blocks.len());
        for item in self.top_level() {
            match item {
                TopLevelItem::Block(block) => out.push(block),
                TopLevelItem::Group(group) => out.extend(self.group_members(group.id)),
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Block operations
    // ------------------------------------------------------------------

    /// Add a top-level block of `kind` with placeholder content.
    ///
    /// Its order is the current number of top-level items. Orders are not
    /// renumbered on delete, so after earlier deletions the new block can
    /// sort ahead of blocks that are already there.
    pub fn create_block(&mut self, kind: BlockKind) -> BlockId {
        let order = self.top_level().len() as f64;
        let seq = self.mint_seq();
        let block = Block::new(kind, kind.default_content(), Placement::TopLevel { order }, seq);
        let id = block.id;
        self.blocks.insert(id, block);
        debug!(block = %id, %kind, order, "created block");
        id
    }

    /// Remove a block, grouped or not.
    pub fn delete_block(&mut self, id: BlockId) -> bool {
        let removed = self.blocks.shift_remove(&id).is_some();
        if removed {
            debug!(block = %id, "deleted block");
        }
        removed
    }

    /// Copy a block directly after the original, in the same sequence.
    pub fn duplicate_block(&mut self, id: BlockId) -> Option<BlockId> {
        let original = self.blocks.get(&id)?.clone();
        let item = ItemRef::Block(id);
        let siblings = self.sibling_refs(item)?;
        let position = siblings.iter().position(|s| *s == item)?;

        let seq = self.mint_seq();
        let copy = Block::new(original.kind, original.content, original.placement, seq);
        let copy_id = copy.id;
        self.blocks.insert(copy_id, copy);

        let mut sequence = siblings;
        sequence.insert(position + 1, ItemRef::Block(copy_id));
        self.renumber(&sequence);
        debug!(block = %id, copy = %copy_id, "duplicated block");
        Some(copy_id)
    }

    /// Replace the text of a heading, paragraph, list or code block.
    /// Tables are edited through [`Document::table_mut`] instead.
    pub fn set_text(&mut self, id: BlockId, text: impl Into<String>) -> bool {
        let Some(block) = self.blocks.get_mut(&id) else {
            return false;
        };
        match &mut block.content {
            BlockContent::Text(current) => {
                let text = text.into();
                if *current == text {
                    return false;
                }
                *current = text;
                true
            }
            BlockContent::Table(_) => {
                debug!(block = %id, "ignoring raw text for table block");
                false
            }
        }
    }

    pub fn table_mut(&mut self, id: BlockId) -> Option<&mut TableContent> {
        match &mut self.blocks.get_mut(&id)?.content {
            BlockContent::Table(table) => Some(table),
            BlockContent::Text(_) => None,
        }
    }

    pub fn set_selected(&mut self, id: BlockId, selected: bool) -> bool {
        match self.blocks.get_mut(&id) {
            Some(block) if block.selected != selected => {
                block.selected = selected;
                true
            }
            _ => false,
        }
    }

    pub fn clear_selection(&mut self) -> bool {
        let mut changed = false;
        for block in self.blocks.values_mut() {
            changed |= std::mem::replace(&mut block.selected, false);
        }
        changed
    }

    /// Selected blocks in document order.
    pub fn selected_blocks(&self) -> Vec<BlockId> {
        self.flattened()
            .into_iter()
            .filter(|b| b.selected)
            .map(|b| b.id)
            .collect()
    }

    pub fn rename_group(&mut self, id: GroupId, name: impl Into<String>) -> bool {
        let Some(group) = self.groups.get_mut(&id) else {
            return false;
        };
        let name = name.into();
        if group.name == name {
            return false;
        }
        group.name = name;
        true
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Replace every block with the blocks classified from `markdown`.
    pub fn import(&mut self, markdown: &str) -> Vec<ImportWarning> {
        self.import_parsed(Importer::new(markdown, 0).parse())
    }

    /// Replace every block with already-classified blocks.
    ///
    /// Groups are dropped since none of them can have members afterwards.
    /// Variables and the group counter are untouched.
    pub fn import_parsed(&mut self, import: Import) -> Vec<ImportWarning> {
        self.blocks.clear();
        self.groups.clear();
        for imported in import.blocks {
            let seq = self.mint_seq();
            let content = BlockContent::Text(imported.content);
            let block = Block::new(imported.kind, content, Placement::TopLevel { order: 0.0 }, seq);
            self.blocks.insert(block.id, block);
        }
        // Equal orders fall back to creation sequence, which is source order.
        self.normalize();
        debug!(blocks = self.blocks.len(), warnings = import.warnings.len(), "imported markdown");
        import.warnings
    }
}
