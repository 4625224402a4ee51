use hedron_common::AccountId;

/// Cursor over the nodes one request is willing to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeList {
    ids: Vec<AccountId>,
    cursor: usize,
}

impl NodeList {
    pub fn new(ids: Vec<AccountId>) -> Self {
        Self { ids, cursor: 0 }
    }

    pub fn ids(&self) -> &[AccountId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn current(&self) -> Option<AccountId> {
        if self.ids.is_empty() {
            None
        } else {
            Some(self.ids[self.cursor % self.ids.len()])
        }
    }

    pub fn advance(&mut self) {
        if !self.ids.is_empty() {
            self.cursor = (self.cursor + 1) % self.ids.len();
        }
    }

    pub fn position(&self, id: AccountId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }
}

/// Which nodes a request may be sent to.
///
/// `Unset` lets the engine pick from the pool (or populate a list at freeze
/// or payment time). `Fixed` is never overwritten by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeSelection {
    #[default]
    Unset,
    Fixed(NodeList),
}

impl NodeSelection {
    /// An empty list is treated as no selection.
    pub fn fixed(ids: Vec<AccountId>) -> Self {
        if ids.is_empty() {
            NodeSelection::Unset
        } else {
            NodeSelection::Fixed(NodeList::new(ids))
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, NodeSelection::Unset)
    }

    pub fn ids(&self) -> &[AccountId] {
        match self {
            NodeSelection::Unset => &[],
            NodeSelection::Fixed(list) => list.ids(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn current(&self) -> Option<AccountId> {
        match self {
            NodeSelection::Unset => None,
            NodeSelection::Fixed(list) => list.current(),
        }
    }

    pub fn advance(&mut self) {
        if let NodeSelection::Fixed(list) = self {
            list.advance();
        }
    }

    /// Fills an `Unset` selection; a `Fixed` one is left alone.
    pub(crate) fn populate(&mut self, ids: Vec<AccountId>) {
        if self.is_unset() {
            *self = NodeSelection::fixed(ids);
        }
    }
}
