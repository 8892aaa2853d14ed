use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::domain::scheduler::node::Node;
use crate::domain::utils::id::NodeName;

new_key_type! {
    pub struct NodeKey;
}

/// Nodes known to the manager, unique by name and iterated in insertion order.
#[derive(Debug, Default, Clone)]
pub struct NodePool {
    nodes: SlotMap<NodeKey, Node>,
    order: Vec<NodeKey>,
    name_index: HashMap<NodeName, NodeKey>,
}

impl NodePool {
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key(), order: Vec::new(), name_index: HashMap::new() }
    }

    /// Appends `node` unless a node with the same name is already pooled. Returns the key of the
    /// pooled node and whether it was newly inserted.
    pub fn insert(&mut self, node: Node) -> (NodeKey, bool) {
        if let Some(key) = self.name_index.get(&node.name) {
            return (*key, false);
        }

        let name = node.name.clone();
        let key = self.nodes.insert(node);
        self.order.push(key);
        self.name_index.insert(name, key);
        (key, true)
    }

    pub fn contains(&self, name: &NodeName) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn key_of(&self, name: &NodeName) -> Option<NodeKey> {
        self.name_index.get(name).copied()
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    pub fn get_by_name(&self, name: &NodeName) -> Option<&Node> {
        self.key_of(name).and_then(|key| self.nodes.get(key))
    }

    /// Keys in pool order; a snapshot so nodes can be mutated while walking it.
    pub fn keys(&self) -> Vec<NodeKey> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|key| self.nodes.get(*key))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Drops every node for which `keep` returns false, preserving the order of the rest.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<NodeName>
    where
        F: FnMut(&Node) -> bool,
    {
        let mut dropped = Vec::new();
        self.nodes.retain(|_, node| {
            let kept = keep(node);
            if !kept {
                dropped.push(node.name.clone());
            }
            kept
        });

        for name in &dropped {
            self.name_index.remove(name);
        }
        let nodes = &self.nodes;
        self.order.retain(|key| nodes.contains_key(*key));

        return dropped;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(total, available)` capacity over all nodes that could be read on their last refresh.
    pub fn totals(&self) -> (f64, f64) {
        self.iter()
            .filter(|node| !node.stale)
            .fold((0.0, 0.0), |(total, available), node| (total + node.max_capacity, available + node.available_capacity()))
    }
}
