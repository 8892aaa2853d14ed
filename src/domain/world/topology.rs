use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::domain::utils::id::NodeName;
use crate::error::Error;

/// Bitmask of node categories, used by execution policies to exclude whole classes of nodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeCategory(u32);

impl NodeCategory {
    pub const NONE: NodeCategory = NodeCategory(0);
    /// Purchased node, owned by the coordinator.
    pub const OWNED: NodeCategory = NodeCategory(1 << 1);
    /// The local node the coordinator itself runs on.
    pub const PRIVILEGED: NodeCategory = NodeCategory(1 << 2);

    pub const fn from_bits(bits: u32) -> NodeCategory {
        NodeCategory(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(&self, other: NodeCategory) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(&self, other: NodeCategory) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parses a list of category names (`Owned`, `Privileged`) into one mask.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<NodeCategory, Error> {
        let mut mask = NodeCategory::NONE;
        for name in names {
            mask |= name.as_ref().parse::<NodeCategory>()?;
        }
        Ok(mask)
    }
}

impl BitOr for NodeCategory {
    type Output = NodeCategory;

    fn bitor(self, rhs: NodeCategory) -> NodeCategory {
        NodeCategory(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeCategory {
    fn bitor_assign(&mut self, rhs: NodeCategory) {
        self.0 |= rhs.0;
    }
}

impl FromStr for NodeCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Owned" => Ok(NodeCategory::OWNED),
            "Privileged" => Ok(NodeCategory::PRIVILEGED),
            _ => Err(Error::UnknownNodeCategory(s.to_string())),
        }
    }
}

impl fmt::Debug for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(NodeCategory::OWNED) {
            names.push("Owned");
        }
        if self.contains(NodeCategory::PRIVILEGED) {
            names.push("Privileged");
        }
        write!(f, "NodeCategory({})", names.join(" | "))
    }
}

/// What the topology source knows about one node at the time it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub name: NodeName,
    pub max_capacity: f64,
    pub used_capacity: f64,
    pub cores: i64,
    pub categories: NodeCategory,
    pub admin_access: bool,
}

/// Discovers the nodes of the fleet and reports their current state.
pub trait TopologySource: std::fmt::Debug + Send + Sync {
    /// Every node reachable from `root`, including `root` itself.
    fn discover_nodes(&self, root: &NodeName) -> Vec<NodeDescriptor>;

    /// Current state of a single node, `None` if the node no longer exists.
    fn read_node(&self, name: &NodeName) -> Option<NodeDescriptor>;
}
