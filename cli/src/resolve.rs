//! Turning what a user types into document ids.
//!
//! On the command line a block or group is named by a unique hex prefix of
//! its id, or by `@N` for the N-th (0-based) entry in document order. In
//! command scripts an integer means a position and a string a prefix.
//! Variables are named by key first, then by id prefix.

use anyhow::{Context, Result, anyhow, bail};
use blockdoc::{BlockId, Command, Document, GroupId, ItemRef, TopLevelItem, VariableId};

fn unique<T: Copy>(mut matches: impl Iterator<Item = T>, what: &str, text: &str) -> Result<T> {
    let first = matches.next().ok_or_else(|| anyhow!("no {what} matches '{text}'"))?;
    if matches.next().is_some() {
        bail!("'{text}' matches more than one {what}; use a longer prefix");
    }
    Ok(first)
}

fn position(text: &str) -> Option<Result<usize>> {
    text.strip_prefix('@').map(|n| {
        n.parse::<usize>()
            .with_context(|| format!("'{text}' is not a position like @0"))
    })
}

pub fn block_at(doc: &Document, index: usize) -> Result<BlockId> {
    doc.flattened()
        .get(index)
        .map(|b| b.id())
        .ok_or_else(|| anyhow!("no block at position {index}"))
}

pub fn group_at(doc: &Document, index: usize) -> Result<GroupId> {
    doc.top_level()
        .iter()
        .filter_map(|item| match item {
            TopLevelItem::Group(group) => Some(group.id()),
            TopLevelItem::Block(_) => None,
        })
        .nth(index)
        .ok_or_else(|| anyhow!("no group at position {index}"))
}

pub fn block(doc: &Document, text: &str) -> Result<BlockId> {
    if let Some(index) = position(text) {
        return block_at(doc, index?);
    }
    unique(
        doc.blocks().map(|b| b.id()).filter(|id| id.matches_hex_prefix(text)),
        "block",
        text,
    )
}

pub fn group(doc: &Document, text: &str) -> Result<GroupId> {
    if let Some(index) = position(text) {
        return group_at(doc, index?);
    }
    unique(
        doc.groups().map(|g| g.id()).filter(|id| id.matches_hex_prefix(text)),
        "group",
        text,
    )
}

/// A block or a group. `@N` always means a block position.
pub fn item(doc: &Document, text: &str) -> Result<ItemRef> {
    if let Some(index) = position(text) {
        return Ok(ItemRef::Block(block_at(doc, index?)?));
    }
    let blocks = doc
        .blocks()
        .map(|b| b.id())
        .filter(|id| id.matches_hex_prefix(text))
        .map(ItemRef::Block);
    let groups = doc
        .groups()
        .map(|g| g.id())
        .filter(|id| id.matches_hex_prefix(text))
        .map(ItemRef::Group);
    unique(blocks.chain(groups), "block or group", text)
}

pub fn variable(doc: &Document, text: &str) -> Result<VariableId> {
    if let Some((id, _)) = doc.variables().get_by_key(text) {
        return Ok(id);
    }
    unique(
        doc.variables()
            .iter()
            .map(|(id, _)| id)
            .filter(|id| id.matches_hex_prefix(text)),
        "variable",
        text,
    )
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

const MIN_HANDLE: usize = 8;

/// Shortest prefix of `hex` (at least 8 digits) that no other id in `all`
/// starts with. UUIDv7 ids open with their millisecond timestamp, so ids
/// minted close together need a dozen or more digits.
pub fn handle(hex: &str, all: &[String]) -> String {
    let shared = all
        .iter()
        .filter(|other| other.as_str() != hex)
        .map(|other| hex.bytes().zip(other.bytes()).take_while(|(a, b)| a == b).count())
        .max()
        .unwrap_or(0);
    let len = (shared + 1).max(MIN_HANDLE).min(hex.len());
    hex[..len].to_string()
}

/// Hex ids of every block and group; `item` references search both.
pub fn item_hexes(doc: &Document) -> Vec<String> {
    doc.blocks()
        .map(|b| b.id().to_hex())
        .chain(doc.groups().map(|g| g.id().to_hex()))
        .collect()
}

pub fn variable_hexes(doc: &Document) -> Vec<String> {
    doc.variables().iter().map(|(id, _)| id.to_hex()).collect()
}

// ---------------------------------------------------------------------------
// Script commands
// ---------------------------------------------------------------------------

fn script_index(value: &toml::Value) -> Result<Option<usize>> {
    match value {
        toml::Value::Integer(n) => usize::try_from(*n)
            .map(Some)
            .map_err(|_| anyhow!("position {n} is negative")),
        toml::Value::String(_) => Ok(None),
        other => bail!("expected a position or an id prefix, got {other}"),
    }
}

fn script_text(value: &toml::Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn resolve_block(doc: &Document, value: &toml::Value) -> Result<BlockId> {
    match script_index(value)? {
        Some(index) => block_at(doc, index),
        None => block(doc, script_text(value)),
    }
}

fn resolve_group(doc: &Document, value: &toml::Value) -> Result<GroupId> {
    match script_index(value)? {
        Some(index) => group_at(doc, index),
        None => group(doc, script_text(value)),
    }
}

fn replace_with_id(slot: &mut toml::Value, id: impl ToString) {
    *slot = toml::Value::String(id.to_string());
}

/// Resolve the references in one `[[commands]]` entry against the current
/// state of `doc` and deserialize it.
pub fn command(doc: &Document, mut value: toml::Value) -> Result<Command> {
    let table = value
        .as_table_mut()
        .context("a command must be a table with an `op` key")?;

    if let Some(slot) = table.get_mut("block") {
        let id = resolve_block(doc, slot)?;
        replace_with_id(slot, id);
    }
    if let Some(slot) = table.get_mut("group") {
        let id = resolve_group(doc, slot)?;
        replace_with_id(slot, id);
    }
    if let Some(slot) = table.get_mut("variable") {
        let id = variable(doc, script_text(slot))?;
        replace_with_id(slot, id);
    }
    if let Some(item) = table.get_mut("item").and_then(toml::Value::as_table_mut) {
        if let Some(slot) = item.get_mut("block") {
            let id = resolve_block(doc, slot)?;
            replace_with_id(slot, id);
        } else if let Some(slot) = item.get_mut("group") {
            let id = resolve_group(doc, slot)?;
            replace_with_id(slot, id);
        }
    }

    value.try_into().context("invalid command")
}
