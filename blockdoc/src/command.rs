//! Every user intent as one value, applied to a [`Document`] in one call.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::BlockKind;
use crate::block::table::TableEdit;
use crate::document::{Document, ItemRef};
use crate::ids::{BlockId, GroupId, VariableId};
use crate::parser::ImportWarning;
use crate::variables::VariableField;

/// A single mutation request.
///
/// Deserializes from records tagged by `op`, e.g.
/// `{ op = "set_cell", block = "…", row = 0, column = 1, text = "x" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    AddBlock {
        kind: BlockKind,
    },
    DeleteBlock {
        block: BlockId,
    },
    DuplicateBlock {
        block: BlockId,
    },
    SetText {
        block: BlockId,
        text: String,
    },
    Select {
        block: BlockId,
        #[serde(default = "selected_default")]
        selected: bool,
    },
    ClearSelection,
    MoveUp {
        item: ItemRef,
    },
    MoveDown {
        item: ItemRef,
    },
    Reorder {
        item: ItemRef,
        index: usize,
    },
    MoveIntoGroup {
        block: BlockId,
        group: GroupId,
        #[serde(default)]
        index: usize,
    },
    MoveToTopLevel {
        block: BlockId,
        #[serde(default)]
        index: usize,
    },
    GroupSelection,
    Ungroup {
        group: GroupId,
    },
    DeleteGroup {
        group: GroupId,
    },
    RenameGroup {
        group: GroupId,
        name: String,
    },
    AddRow {
        block: BlockId,
    },
    AddColumn {
        block: BlockId,
    },
    DeleteRow {
        block: BlockId,
        index: usize,
    },
    DeleteColumn {
        block: BlockId,
        index: usize,
    },
    SetHeader {
        block: BlockId,
        index: usize,
        text: String,
    },
    SetCell {
        block: BlockId,
        row: usize,
        column: usize,
        text: String,
    },
    AddVariable {
        key: String,
        #[serde(default)]
        value: String,
    },
    UpdateVariable {
        variable: VariableId,
        field: VariableField,
        text: String,
    },
    DeleteVariable {
        variable: VariableId,
    },
    Import {
        markdown: String,
    },
}

fn selected_default() -> bool {
    true
}

/// What a successfully applied command did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Changed,
    /// Nothing to do: unknown id, boundary move, or a guarded table edit.
    Unchanged,
    CreatedBlock(BlockId),
    CreatedGroup(GroupId),
    CreatedVariable(VariableId),
    Imported { warnings: Vec<ImportWarning> },
}

impl Applied {
    pub fn is_change(&self) -> bool {
        !matches!(self, Applied::Unchanged)
    }

    fn from_flag(changed: bool) -> Self {
        if changed { Applied::Changed } else { Applied::Unchanged }
    }
}

/// Failures that must be shown to the user. Everything else degrades to
/// [`Applied::Unchanged`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("select at least 2 ungrouped blocks to group (got {selected})")]
    InsufficientSelection { selected: usize },
}

impl Document {
    pub fn apply(&mut self, command: Command) -> Result<Applied, CommandError> {
        debug!(?command, "applying command");
        let applied = match command {
            Command::AddBlock { kind } => Applied::CreatedBlock(self.create_block(kind)),
            Command::DeleteBlock { block } => Applied::from_flag(self.delete_block(block)),
            Command::DuplicateBlock { block } => match self.duplicate_block(block) {
                Some(copy) => Applied::CreatedBlock(copy),
                None => Applied::Unchanged,
            },
            Command::SetText { block, text } => Applied::from_flag(self.set_text(block, text)),
            Command::Select { block, selected } => {
                Applied::from_flag(self.set_selected(block, selected))
            }
            Command::ClearSelection => Applied::from_flag(self.clear_selection()),
            Command::MoveUp { item } => Applied::from_flag(self.move_up(item)),
            Command::MoveDown { item } => Applied::from_flag(self.move_down(item)),
            Command::Reorder { item, index } => Applied::from_flag(self.reorder(item, index)),
            Command::MoveIntoGroup {
                block,
                group,
                index,
            } => Applied::from_flag(self.move_into_group(block, group, index)),
            Command::MoveToTopLevel { block, index } => {
                Applied::from_flag(self.move_to_top_level(block, index))
            }
            Command::GroupSelection => Applied::CreatedGroup(self.group_selection()?),
            Command::Ungroup { group } => Applied::from_flag(self.ungroup(group)),
            Command::DeleteGroup { group } => Applied::from_flag(self.delete_group(group)),
            Command::RenameGroup { group, name } => {
                Applied::from_flag(self.rename_group(group, name))
            }
            Command::AddRow { block } => self.edit_table(block, |t| t.add_row()),
            Command::AddColumn { block } => self.edit_table(block, |t| t.add_column()),
            Command::DeleteRow { block, index } => self.edit_table(block, |t| t.delete_row(index)),
            Command::DeleteColumn { block, index } => {
                self.edit_table(block, |t| t.delete_column(index))
            }
            Command::SetHeader { block, index, text } => {
                self.edit_table(block, |t| t.set_header(index, text))
            }
            Command::SetCell {
                block,
                row,
                column,
                text,
            } => self.edit_table(block, |t| t.set_cell(row, column, text)),
            Command::AddVariable { key, value } => {
                Applied::CreatedVariable(self.variables.create(key, value))
            }
            Command::UpdateVariable {
                variable,
                field,
                text,
            } => Applied::from_flag(self.variables.update(variable, field, text)),
            Command::DeleteVariable { variable } => {
                Applied::from_flag(self.variables.delete(variable))
            }
            Command::Import { markdown } => Applied::Imported {
                warnings: self.import(&markdown),
            },
        };
        debug!(?applied, "command applied");
        Ok(applied)
    }

    fn edit_table(
        &mut self,
        block: BlockId,
        edit: impl FnOnce(&mut crate::block::table::TableContent) -> TableEdit,
    ) -> Applied {
        match self.table_mut(block).map(edit) {
            Some(TableEdit::Applied) => Applied::Changed,
            Some(outcome) => {
                debug!(block = %block, ?outcome, "table edit not applied");
                Applied::Unchanged
            }
            None => Applied::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_deserialize_from_toml() {
        let block = BlockId::new();
        let source = format!(
            r#"
            [[commands]]
            op = "add_block"
            kind = "table"

            [[commands]]
            op = "move_up"
            item = {{ block = "{block}" }}

            [[commands]]
            op = "set_cell"
            block = "{block}"
            row = 0
            column = 2
            text = "{{{{price}}}}"

            [[commands]]
            op = "select"
            block = "{block}"

            [[commands]]
            op = "group_selection"
            "#
        );
        #[derive(Deserialize)]
        struct Script {
            commands: Vec<Command>,
        }
        let script: Script = toml::from_str(&source).unwrap();
        assert_eq!(
            script.commands,
            vec![
                Command::AddBlock {
                    kind: BlockKind::Table
                },
                Command::MoveUp {
                    item: ItemRef::Block(block)
                },
                Command::SetCell {
                    block,
                    row: 0,
                    column: 2,
                    text: "{{price}}".into()
                },
                Command::Select {
                    block,
                    selected: true
                },
                Command::GroupSelection,
            ]
        );
    }

    #[test]
    fn commands_deserialize_from_json() {
        let cmd: Command =
            serde_json::from_str(r#"{"op":"add_variable","key":"sku"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::AddVariable {
                key: "sku".into(),
                value: String::new()
            }
        );
    }

    #[test]
    fn guard_refusals_are_unchanged() {
        let mut doc = Document::new();
        let Applied::CreatedBlock(table) = doc.apply(Command::AddBlock { kind: BlockKind::Table }).unwrap() else {
            panic!("expected a created block");
        };
        assert_eq!(doc.apply(Command::DeleteRow { block: table, index: 0 }), Ok(Applied::Changed));
        assert_eq!(doc.apply(Command::DeleteRow { block: table, index: 0 }), Ok(Applied::Unchanged));
        assert_eq!(doc.apply(Command::DeleteColumn { block: table, index: 7 }), Ok(Applied::Unchanged));
        assert_eq!(
            doc.apply(Command::SetText { block: table, text: "raw".into() }),
            Ok(Applied::Unchanged)
        );
        assert_eq!(doc.apply(Command::DeleteBlock { block: BlockId::new() }), Ok(Applied::Unchanged));
    }

    #[test]
    fn insufficient_selection_is_surfaced() {
        let mut doc = Document::new();
        let Applied::CreatedBlock(a) = doc.apply(Command::AddBlock { kind: BlockKind::Heading }).unwrap() else {
            panic!("expected a created block");
        };
        doc.apply(Command::Select { block: a, selected: true }).unwrap();
        let err = doc.apply(Command::GroupSelection).unwrap_err();
        assert_eq!(err, CommandError::InsufficientSelection { selected: 1 });
        assert_eq!(err.to_string(), "select at least 2 ungrouped blocks to group (got 1)");
        assert_eq!(doc.groups().count(), 0);
    }

    #[test]
    fn variable_commands() {
        let mut doc = Document::new();
        let Applied::CreatedVariable(id) = doc
            .apply(Command::AddVariable { key: "price".into(), value: "10".into() })
            .unwrap()
        else {
            panic!("expected a created variable");
        };
        let update = Command::UpdateVariable {
            variable: id,
            field: VariableField::Value,
            text: "12".into(),
        };
        assert!(doc.apply(update.clone()).unwrap().is_change());
        assert!(!doc.apply(update).unwrap().is_change());
        assert_eq!(doc.variables().substitute("{{price}}"), "12");
        assert_eq!(doc.apply(Command::DeleteVariable { variable: id }), Ok(Applied::Changed));
        assert!(doc.variables().is_empty());
    }
}
