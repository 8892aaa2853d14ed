use std::collections::HashSet;

use crate::domain::utils::id::NodeName;
use crate::domain::world::topology::NodeCategory;

/// Restricts which nodes may run a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPolicy {
    /// A node carrying any of these categories is not eligible.
    pub forbidden_categories: NodeCategory,

    /// When set, only these nodes are eligible.
    pub allowed_names: Option<HashSet<NodeName>>,

    /// Append the granted concurrency to the job arguments.
    pub forward_concurrency: bool,
}

impl ExecutionPolicy {
    pub fn forbidding(mut self, categories: NodeCategory) -> Self {
        self.forbidden_categories |= categories;
        self
    }

    pub fn allowing_only<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeName>,
    {
        self.allowed_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn forwarding_concurrency(mut self) -> Self {
        self.forward_concurrency = true;
        self
    }
}
