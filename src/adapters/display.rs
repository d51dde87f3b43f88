use crate::domain::model::NodeId;
use crate::domain::ports::DisplayTree;
use crate::utils::error::{MapError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Node {
    label: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct TreeState {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    root: NodeId,
    scroll_locked: bool,
    moves: usize,
}

impl TreeState {
    fn detach(&mut self, node: NodeId) {
        let parent = self.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(&node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

/// Retained display tree kept in memory. Nodes are moved, never cloned, so a
/// node keeps its identity wherever it is attached.
#[derive(Debug)]
pub struct InMemoryDisplayTree {
    state: Mutex<TreeState>,
}

impl Default for InMemoryDisplayTree {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDisplayTree {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                label: "body".to_string(),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            state: Mutex::new(TreeState {
                nodes,
                next_id: 1,
                root,
                scroll_locked: false,
                moves: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TreeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> NodeId {
        self.state().root
    }

    /// Creates a node and appends it under `parent`.
    pub fn append(&self, parent: NodeId, label: &str) -> Result<NodeId> {
        let mut state = self.state();
        if !state.nodes.contains_key(&parent) {
            return Err(MapError::WidgetError {
                message: format!("unknown parent {}", parent),
            });
        }
        let id = NodeId(state.next_id);
        state.next_id += 1;
        state.nodes.insert(
            id,
            Node {
                label: label.to_string(),
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        if let Some(p) = state.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Detaches `node` and its subtree from the tree.
    pub fn remove(&self, node: NodeId) {
        self.state().detach(node);
    }

    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.state()
            .nodes
            .get(&parent)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn label(&self, node: NodeId) -> Option<String> {
        self.state().nodes.get(&node).map(|n| n.label.clone())
    }

    /// Number of successful `insert_before` moves.
    pub fn move_count(&self) -> usize {
        self.state().moves
    }
}

impl DisplayTree for InMemoryDisplayTree {
    fn is_attached(&self, node: NodeId) -> bool {
        let state = self.state();
        state.nodes.contains_key(&node) && state.is_ancestor(state.root, node)
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.state().nodes.get(&node).and_then(|n| n.parent)
    }

    fn next_sibling_of(&self, node: NodeId) -> Option<NodeId> {
        let state = self.state();
        let parent = state.nodes.get(&node)?.parent?;
        let siblings = &state.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn insert_before(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> Result<()> {
        let mut state = self.state();
        if !state.nodes.contains_key(&parent) || !state.nodes.contains_key(&node) {
            return Err(MapError::WidgetError {
                message: format!("cannot move {} under {}: unknown node", node, parent),
            });
        }
        if state.is_ancestor(node, parent) {
            return Err(MapError::WidgetError {
                message: format!("cannot move {} into its own subtree", node),
            });
        }
        if let Some(reference) = reference {
            if reference == node || state.nodes.get(&reference).and_then(|n| n.parent) != Some(parent) {
                return Err(MapError::WidgetError {
                    message: format!("{} is not a child of {}", reference, parent),
                });
            }
        }

        state.detach(node);
        if let Some(n) = state.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
        if let Some(p) = state.nodes.get_mut(&parent) {
            let index = reference
                .and_then(|r| p.children.iter().position(|c| *c == r))
                .unwrap_or(p.children.len());
            p.children.insert(index, node);
        }
        state.moves += 1;
        Ok(())
    }

    fn scroll_locked(&self) -> bool {
        self.state().scroll_locked
    }

    fn set_scroll_lock(&self, locked: bool) {
        self.state().scroll_locked = locked;
    }
}
