pub mod block;
pub mod bootstrap;
pub mod command;
pub mod document;
pub mod group;
pub mod ids;
pub mod parser;
pub mod render;
pub mod snapshot;
pub mod store;
pub mod variables;

pub use block::table::{TableContent, TableEdit};
pub use block::{Block, BlockContent, BlockKind, Placement};
pub use command::{Applied, Command, CommandError};
pub use document::{Document, ItemRef, TopLevel, TopLevelItem};
pub use group::Group;
pub use ids::{BlockId, GroupId, VariableId};
pub use parser::{ImportError, ImportWarning, Importer};
pub use snapshot::Snapshot;
pub use store::{FileStore, MemoryStore, SnapshotStore, StoreError};
pub use variables::{Variable, VariableField, VariableStore};
