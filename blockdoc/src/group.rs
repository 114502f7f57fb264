use crate::ids::GroupId;

/// A named cluster of blocks occupying one slot in the top-level order.
///
/// Membership lives on the blocks (`Placement::Member`); a group with no
/// members stays in the table but is skipped when the document is walked.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) id: GroupId,
    pub(crate) name: String,
    pub(crate) order: f64,
    pub(crate) seq: u64,
}

impl Group {
    pub(crate) fn new(name: String, order: f64, seq: u64) -> Self {
        Group {
            id: GroupId::new(),
            name,
            order,
            seq,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> f64 {
        self.order
    }
}

/// Display name minted from the document's group counter.
pub(crate) fn numbered_name(counter: u64) -> String {
    format!("Group {counter}")
}
